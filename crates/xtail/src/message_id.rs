//! Stream message IDs.
//!
//! A Redis stream entry is addressed by `<milliseconds>-<sequence>`. IDs are
//! totally ordered by timestamp first, then sequence, which is exactly the
//! order the server assigns them in.

use crate::error::{TailError, TailResult};
use std::fmt;
use std::str::FromStr;

/// Position of a message within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Sequence number within the millisecond.
    pub sequence: u64,
}

impl MessageId {
    /// The smallest possible ID, `0-0`. Never assigned to a stored message.
    pub const MIN: MessageId = MessageId::new(0, 0);

    /// The largest possible ID.
    pub const MAX: MessageId = MessageId::new(u64::MAX, u64::MAX);

    pub const fn new(timestamp: u64, sequence: u64) -> Self {
        Self {
            timestamp,
            sequence,
        }
    }

    /// Parse the textual form `<timestamp>[-<sequence>]`.
    ///
    /// Splits on the first `-`. A missing sequence part means `0`; an empty
    /// one (`"100-"`) is malformed.
    pub fn parse(text: &str) -> TailResult<Self> {
        let (ts_part, seq_part) = match text.split_once('-') {
            Some((ts, seq)) => (ts, Some(seq)),
            None => (text, None),
        };

        let timestamp = parse_component(text, ts_part, "timestamp")?;
        let sequence = match seq_part {
            Some(seq) => parse_component(text, seq, "sequence")?,
            None => 0,
        };

        Ok(Self::new(timestamp, sequence))
    }

    /// The ID immediately preceding this one in stream order.
    ///
    /// Returns `None` for [`MessageId::MIN`], which has no predecessor.
    pub fn prev(self) -> Option<Self> {
        if self.sequence > 0 {
            Some(Self::new(self.timestamp, self.sequence - 1))
        } else if self.timestamp > 0 {
            Some(Self::new(self.timestamp - 1, u64::MAX))
        } else {
            None
        }
    }
}

fn parse_component(input: &str, part: &str, name: &str) -> TailResult<u64> {
    if part.is_empty() {
        return Err(TailError::MalformedId {
            input: input.to_string(),
            reason: format!("empty {name}"),
        });
    }
    // u64::from_str accepts a leading '+', stream IDs don't
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TailError::MalformedId {
            input: input.to_string(),
            reason: format!("{name} {part:?} is not a decimal number"),
        });
    }
    part.parse::<u64>().map_err(|e| TailError::MalformedId {
        input: input.to_string(),
        reason: format!("{name} {part:?}: {e}"),
    })
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.timestamp, self.sequence)
    }
}

impl FromStr for MessageId {
    type Err = TailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering;

    #[test]
    fn test_parse_full_id() {
        let id = MessageId::parse("1526919030474-55").unwrap();
        assert_eq!(id, MessageId::new(1526919030474, 55));
    }

    #[test]
    fn test_parse_without_sequence_defaults_to_zero() {
        assert_eq!(MessageId::parse("1000").unwrap(), MessageId::new(1000, 0));
    }

    #[test]
    fn test_parse_extremes() {
        assert_eq!(MessageId::parse("0-0").unwrap(), MessageId::MIN);
        let max = format!("{}-{}", u64::MAX, u64::MAX);
        assert_eq!(MessageId::parse(&max).unwrap(), MessageId::MAX);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "-",
            "abc",
            "100-",
            "-5",
            "100-x",
            "100-1-2",
            "+100",
            "100-+1",
            " 100",
            "100 ",
            "18446744073709551616",
            "1-18446744073709551616",
            "$",
            "*",
        ] {
            let err = MessageId::parse(bad).unwrap_err();
            assert!(
                matches!(err, TailError::MalformedId { ref input, .. } if input == bad),
                "expected MalformedId for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(MessageId::new(100, 1).to_string(), "100-1");
        assert_eq!(MessageId::parse("100").unwrap().to_string(), "100-0");
    }

    #[test]
    fn test_ordering_timestamp_first() {
        assert!(MessageId::new(1, u64::MAX) < MessageId::new(2, 0));
        assert!(MessageId::new(2, 0) < MessageId::new(2, 1));
        assert_eq!(
            MessageId::new(5, 5).cmp(&MessageId::new(5, 5)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_prev_decrements_sequence() {
        assert_eq!(MessageId::new(100, 1).prev(), Some(MessageId::new(100, 0)));
    }

    #[test]
    fn test_prev_borrows_from_timestamp() {
        assert_eq!(
            MessageId::new(100, 0).prev(),
            Some(MessageId::new(99, u64::MAX))
        );
        assert_eq!(MessageId::new(1, 0).prev(), Some(MessageId::new(0, u64::MAX)));
    }

    #[test]
    fn test_prev_of_min_is_none() {
        assert_eq!(MessageId::MIN.prev(), None);
    }

    #[test]
    fn test_from_str() {
        let id: MessageId = "7-3".parse().unwrap();
        assert_eq!(id, MessageId::new(7, 3));
    }

    fn any_id() -> impl Strategy<Value = MessageId> {
        prop_oneof![
            (any::<u64>(), any::<u64>()).prop_map(|(t, s)| MessageId::new(t, s)),
            // Dense region so that equal timestamps actually occur.
            (0u64..4, 0u64..4).prop_map(|(t, s)| MessageId::new(t, s)),
        ]
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_is_identity(id in any_id()) {
            prop_assert_eq!(MessageId::parse(&id.to_string()).unwrap(), id);
        }

        #[test]
        fn prop_prev_is_immediate_predecessor(id in any_id()) {
            prop_assume!(id != MessageId::MIN);
            let prev = id.prev().unwrap();
            prop_assert!(prev < id);
            // Nothing fits between prev and id: the successor of prev is id.
            let succ = if prev.sequence == u64::MAX {
                MessageId::new(prev.timestamp + 1, 0)
            } else {
                MessageId::new(prev.timestamp, prev.sequence + 1)
            };
            prop_assert_eq!(succ, id);
        }

        #[test]
        fn prop_order_is_antisymmetric(a in any_id(), b in any_id()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            prop_assert_eq!(a.cmp(&b) == Ordering::Equal, a == b);
        }

        #[test]
        fn prop_order_is_transitive(a in any_id(), b in any_id(), c in any_id()) {
            if a <= b && b <= c {
                prop_assert!(a <= c);
            }
        }

        #[test]
        fn prop_order_matches_tuple_order(a in any_id(), b in any_id()) {
            prop_assert_eq!(
                a.cmp(&b),
                (a.timestamp, a.sequence).cmp(&(b.timestamp, b.sequence))
            );
        }
    }
}
