//! QRESYNC and CONDSTORE support (RFC 7162).
//!
//! CONDSTORE attaches a mod-sequence to every message; QRESYNC builds on it
//! so a client can reopen a mailbox and receive only the deltas since a
//! prior known state:
//!
//! 1. While a folder is open, capture a [`SyncState`] (UIDVALIDITY,
//!    HIGHESTMODSEQ, known UIDs).
//! 2. On the next open, pass the state as QRESYNC parameters; the server
//!    answers with `VANISHED (EARLIER)` for expunged messages and FETCH
//!    responses for changed ones.

use crate::types::{ModSeq, SeqNum, Uid, UidSet, UidValidity};

/// State captured from an open folder for later resynchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    /// The UIDVALIDITY at capture time.
    ///
    /// If the server reports a different value on reopen, the mailbox was
    /// rebuilt and every cached UID must be discarded.
    pub uid_validity: UidValidity,

    /// The HIGHESTMODSEQ at capture time.
    pub highest_mod_seq: ModSeq,

    /// UIDs known at capture time.
    ///
    /// Optional but recommended; it lets the server report expunges as
    /// VANISHED (EARLIER) limited to what the client actually knew.
    pub known_uids: Option<UidSet>,
}

impl SyncState {
    /// Creates a new sync state.
    #[must_use]
    pub const fn new(uid_validity: UidValidity, highest_mod_seq: ModSeq) -> Self {
        Self {
            uid_validity,
            highest_mod_seq,
            known_uids: None,
        }
    }

    /// Sets the known UIDs.
    #[must_use]
    pub fn with_known_uids(mut self, uids: UidSet) -> Self {
        self.known_uids = Some(uids);
        self
    }

    /// Creates QRESYNC parameters from this state.
    #[must_use]
    pub fn to_params(&self) -> QresyncParams {
        QresyncParams {
            uid_validity: self.uid_validity,
            mod_seq: self.highest_mod_seq,
            known_uids: self.known_uids.clone(),
            seq_match: None,
        }
    }
}

/// Parameters for a QRESYNC SELECT/EXAMINE.
#[derive(Debug, Clone, PartialEq)]
pub struct QresyncParams {
    /// The last known UIDVALIDITY.
    pub uid_validity: UidValidity,

    /// The last known HIGHESTMODSEQ.
    pub mod_seq: ModSeq,

    /// Optional set of known UIDs.
    pub known_uids: Option<UidSet>,

    /// Optional sequence-to-UID sample for servers to sanity-check
    /// message positions.
    pub seq_match: Option<SeqUidMatch>,
}

impl QresyncParams {
    /// Creates minimal QRESYNC parameters.
    #[must_use]
    pub const fn new(uid_validity: UidValidity, mod_seq: ModSeq) -> Self {
        Self {
            uid_validity,
            mod_seq,
            known_uids: None,
            seq_match: None,
        }
    }

    /// Adds known UIDs to the parameters.
    #[must_use]
    pub fn with_known_uids(mut self, uids: UidSet) -> Self {
        self.known_uids = Some(uids);
        self
    }

    /// Adds a sequence-UID sample to the parameters.
    #[must_use]
    pub fn with_seq_match(mut self, seq_match: SeqUidMatch) -> Self {
        self.seq_match = Some(seq_match);
        self
    }

    /// Serializes the SELECT parameter:
    /// `(QRESYNC (uidvalidity modseq [known-uids] [(seqs uids)]))`.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut parts = vec![
            self.uid_validity.get().to_string(),
            self.mod_seq.get().to_string(),
        ];

        if let Some(uids) = &self.known_uids {
            parts.push(uids.to_string());
        }

        if let Some(seq_match) = &self.seq_match {
            parts.push(format!("({})", seq_match.serialize()));
        }

        format!("(QRESYNC ({}))", parts.join(" "))
    }
}

/// Sequence-to-UID sample for QRESYNC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeqUidMatch {
    /// Sequence number ranges.
    pub seq_set: Vec<(SeqNum, SeqNum)>,
    /// Corresponding UID ranges.
    pub uid_set: Vec<(Uid, Uid)>,
}

impl SeqUidMatch {
    /// Creates an empty mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seq_set: Vec::new(),
            uid_set: Vec::new(),
        }
    }

    /// Adds a mapping from sequence range to UID range.
    pub fn add(&mut self, seq_range: (SeqNum, SeqNum), uid_range: (Uid, Uid)) {
        self.seq_set.push(seq_range);
        self.uid_set.push(uid_range);
    }

    /// Serializes the mapping.
    #[must_use]
    pub fn serialize(&self) -> String {
        fn ranges<T: Copy + PartialEq + std::fmt::Display>(set: &[(T, T)]) -> String {
            set.iter()
                .map(|(start, end)| {
                    if start == end {
                        format!("{start}")
                    } else {
                        format!("{start}:{end}")
                    }
                })
                .collect::<Vec<_>>()
                .join(",")
        }

        format!("{} {}", ranges(&self.seq_set), ranges(&self.uid_set))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn validity() -> UidValidity {
        UidValidity::new(123_456_789).unwrap()
    }

    fn modseq() -> ModSeq {
        ModSeq::from_u64(987_654_321).unwrap()
    }

    #[test]
    fn sync_state_to_params() {
        let state = SyncState::new(validity(), modseq())
            .with_known_uids(UidSet::range(Uid::new(1).unwrap(), Uid::new(10).unwrap()));
        let params = state.to_params();
        assert_eq!(params.uid_validity, validity());
        assert_eq!(params.mod_seq, modseq());
        assert!(params.known_uids.is_some());
    }

    #[test]
    fn params_serialize_minimal() {
        let params = QresyncParams::new(validity(), modseq());
        assert_eq!(
            params.serialize(),
            "(QRESYNC (123456789 987654321))"
        );
    }

    #[test]
    fn params_serialize_with_uids() {
        let params = QresyncParams::new(validity(), modseq())
            .with_known_uids(UidSet::range(Uid::new(1).unwrap(), Uid::new(100).unwrap()));
        assert_eq!(
            params.serialize(),
            "(QRESYNC (123456789 987654321 1:100))"
        );
    }

    #[test]
    fn params_serialize_with_seq_match() {
        let mut seq_match = SeqUidMatch::new();
        seq_match.add(
            (SeqNum::new(1).unwrap(), SeqNum::new(5).unwrap()),
            (Uid::new(1).unwrap(), Uid::new(9).unwrap()),
        );
        let params = QresyncParams::new(validity(), modseq()).with_seq_match(seq_match);
        assert_eq!(
            params.serialize(),
            "(QRESYNC (123456789 987654321 (1:5 1:9)))"
        );
    }
}
