//! Sequence sets for message ranges.

use super::{SeqNum, Uid};

/// Sequence set for specifying message ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSet {
    /// Single sequence number.
    Single(SeqNum),
    /// Range of sequence numbers (inclusive).
    Range(SeqNum, SeqNum),
    /// Range from start to end of mailbox.
    RangeFrom(SeqNum),
    /// All messages (*).
    All,
    /// Multiple sequence specifications.
    Set(Vec<Self>),
}

impl SequenceSet {
    /// Creates a sequence set from a single number.
    #[must_use]
    pub fn single(n: u32) -> Option<Self> {
        SeqNum::new(n).map(Self::Single)
    }

    /// Creates a range sequence set.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Option<Self> {
        Some(Self::Range(SeqNum::new(start)?, SeqNum::new(end)?))
    }
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::All => write!(f, "*"),
            Self::Set(items) => {
                let s: Vec<_> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", s.join(","))
            }
        }
    }
}

/// UID-based sequence set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidSet {
    /// Single UID.
    Single(Uid),
    /// Range of UIDs (inclusive).
    Range(Uid, Uid),
    /// Range from start to highest UID.
    RangeFrom(Uid),
    /// All messages.
    All,
    /// Multiple UID specifications.
    Set(Vec<Self>),
}

impl UidSet {
    /// Creates a UID set from a single UID.
    #[must_use]
    pub const fn single(uid: Uid) -> Self {
        Self::Single(uid)
    }

    /// Creates a UID set from a range.
    #[must_use]
    pub const fn range(start: Uid, end: Uid) -> Self {
        Self::Range(start, end)
    }

    /// Builds the most compact set covering the given UIDs.
    ///
    /// Adjacent values collapse into ranges; the input is deduplicated and
    /// sorted first. Returns `None` for an empty slice.
    #[must_use]
    pub fn from_uids(uids: &[Uid]) -> Option<Self> {
        if uids.is_empty() {
            return None;
        }

        let mut values: Vec<u32> = uids.iter().map(|u| u.get()).collect();
        values.sort_unstable();
        values.dedup();

        let mut parts = Vec::new();
        let mut start = values[0];
        let mut end = values[0];

        for &v in &values[1..] {
            if v == end + 1 {
                end = v;
            } else {
                parts.push(Self::part(start, end)?);
                start = v;
                end = v;
            }
        }
        parts.push(Self::part(start, end)?);

        if parts.len() == 1 {
            parts.pop()
        } else {
            Some(Self::Set(parts))
        }
    }

    fn part(start: u32, end: u32) -> Option<Self> {
        let start = Uid::new(start)?;
        if start.get() == end {
            Some(Self::Single(start))
        } else {
            Some(Self::Range(start, Uid::new(end)?))
        }
    }

    /// Enumerates the UIDs in this set, if it is finite.
    ///
    /// Returns `None` for open-ended sets (`RangeFrom`, `All`), whose
    /// membership depends on server state.
    #[must_use]
    pub fn uids(&self) -> Option<Vec<Uid>> {
        match self {
            Self::Single(uid) => Some(vec![*uid]),
            Self::Range(start, end) => {
                let mut out = Vec::new();
                for n in start.get()..=end.get() {
                    out.push(Uid::new(n)?);
                }
                Some(out)
            }
            Self::RangeFrom(_) | Self::All => None,
            Self::Set(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(item.uids()?);
                }
                Some(out)
            }
        }
    }

    /// Returns true if the given UID is a member of this set.
    ///
    /// Open-ended sets treat the upper bound as unbounded.
    #[must_use]
    pub fn contains(&self, uid: Uid) -> bool {
        match self {
            Self::Single(u) => *u == uid,
            Self::Range(start, end) => (start.get()..=end.get()).contains(&uid.get()),
            Self::RangeFrom(start) => uid.get() >= start.get(),
            Self::All => true,
            Self::Set(items) => items.iter().any(|i| i.contains(uid)),
        }
    }

    /// Converts this UID set to a sequence set for command serialization.
    ///
    /// UID FETCH, UID STORE and friends take the same set grammar as their
    /// sequence-number forms.
    #[must_use]
    pub fn as_sequence_set(&self) -> SequenceSet {
        match self {
            // Both Uid and SeqNum wrap NonZeroU32, so this conversion is infallible
            Self::Single(uid) => SequenceSet::Single(SeqNum(uid.0)),
            Self::Range(start, end) => SequenceSet::Range(SeqNum(start.0), SeqNum(end.0)),
            Self::RangeFrom(start) => SequenceSet::RangeFrom(SeqNum(start.0)),
            Self::All => SequenceSet::All,
            Self::Set(items) => SequenceSet::Set(items.iter().map(Self::as_sequence_set).collect()),
        }
    }
}

impl std::fmt::Display for UidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::All => write!(f, "*"),
            Self::Set(items) => {
                let s: Vec<_> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", s.join(","))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    mod sequence_set_tests {
        use super::*;

        #[test]
        fn single_zero_returns_none() {
            assert!(SequenceSet::single(0).is_none());
        }

        #[test]
        fn display_forms() {
            assert_eq!(SequenceSet::single(42).unwrap().to_string(), "42");
            assert_eq!(SequenceSet::range(1, 100).unwrap().to_string(), "1:100");
            assert_eq!(
                SequenceSet::RangeFrom(SeqNum::new(50).unwrap()).to_string(),
                "50:*"
            );
            assert_eq!(SequenceSet::All.to_string(), "*");
        }

        #[test]
        fn display_set() {
            let set = SequenceSet::Set(vec![
                SequenceSet::single(1).unwrap(),
                SequenceSet::range(5, 10).unwrap(),
            ]);
            assert_eq!(set.to_string(), "1,5:10");
        }
    }

    mod uid_set_tests {
        use super::*;

        #[test]
        fn from_uids_empty() {
            assert!(UidSet::from_uids(&[]).is_none());
        }

        #[test]
        fn from_uids_single() {
            let set = UidSet::from_uids(&[uid(7)]).unwrap();
            assert_eq!(set.to_string(), "7");
        }

        #[test]
        fn from_uids_compresses_runs() {
            let set = UidSet::from_uids(&[uid(1), uid(2), uid(3), uid(7), uid(9), uid(10)]).unwrap();
            assert_eq!(set.to_string(), "1:3,7,9:10");
        }

        #[test]
        fn from_uids_dedups_and_sorts() {
            let set = UidSet::from_uids(&[uid(5), uid(3), uid(4), uid(5)]).unwrap();
            assert_eq!(set.to_string(), "3:5");
        }

        #[test]
        fn uids_enumeration() {
            let set = UidSet::from_uids(&[uid(1), uid(2), uid(5)]).unwrap();
            let listed = set.uids().unwrap();
            assert_eq!(listed, vec![uid(1), uid(2), uid(5)]);
        }

        #[test]
        fn open_ended_sets_do_not_enumerate() {
            assert!(UidSet::All.uids().is_none());
            assert!(UidSet::RangeFrom(uid(3)).uids().is_none());
        }

        #[test]
        fn contains_membership() {
            let set = UidSet::from_uids(&[uid(1), uid(2), uid(3), uid(9)]).unwrap();
            assert!(set.contains(uid(2)));
            assert!(set.contains(uid(9)));
            assert!(!set.contains(uid(4)));
            assert!(UidSet::RangeFrom(uid(5)).contains(uid(1000)));
        }

        #[test]
        fn as_sequence_set_preserves_shape() {
            let set = UidSet::range(uid(1), uid(999));
            assert_eq!(set.as_sequence_set().to_string(), "1:999");
        }
    }

    mod compression_laws {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Compressing a UID list and expanding it again yields the
            /// sorted, deduplicated input.
            #[test]
            fn from_uids_roundtrip(values in proptest::collection::vec(1u32..10_000, 1..64)) {
                let uids: Vec<Uid> = values.iter().map(|&n| Uid::new(n).unwrap()).collect();
                let set = UidSet::from_uids(&uids).unwrap();

                let mut expected: Vec<u32> = values;
                expected.sort_unstable();
                expected.dedup();

                let expanded: Vec<u32> =
                    set.uids().unwrap().into_iter().map(Uid::get).collect();
                prop_assert_eq!(expanded, expected);
            }

            /// Every member of the input is reported as contained.
            #[test]
            fn from_uids_contains_members(values in proptest::collection::vec(1u32..10_000, 1..64)) {
                let uids: Vec<Uid> = values.iter().map(|&n| Uid::new(n).unwrap()).collect();
                let set = UidSet::from_uids(&uids).unwrap();
                for uid in &uids {
                    prop_assert!(set.contains(*uid));
                }
            }
        }
    }
}
