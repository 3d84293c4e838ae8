//! Mapping from source UIDs to destination UIDs for COPY/MOVE/APPEND results.

use super::{Uid, UidValidity, UniqueId};

/// Ordered mapping from source UID to destination UID.
///
/// Produced by COPY, MOVE and APPEND when the server advertises UIDPLUS
/// (RFC 4315) and answers with COPYUID/APPENDUID. Servers without UIDPLUS
/// yield an empty map; callers must treat emptiness as "unknown", not as
/// "nothing copied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueIdMap {
    /// Validity of the source mailbox, when known.
    pub source_validity: Option<UidValidity>,
    /// Validity of the destination mailbox, from the COPYUID/APPENDUID code.
    pub destination_validity: Option<UidValidity>,
    pairs: Vec<(Uid, Uid)>,
}

impl UniqueIdMap {
    /// Creates an empty mapping (server without UIDPLUS, or empty input set).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            source_validity: None,
            destination_validity: None,
            pairs: Vec::new(),
        }
    }

    /// Builds a mapping from a COPYUID response payload.
    ///
    /// Source and destination UID lists pair positionally; a length mismatch
    /// is a malformed response and yields `None`.
    #[must_use]
    pub fn from_copy_uid(
        source_validity: Option<UidValidity>,
        destination_validity: UidValidity,
        source: Vec<Uid>,
        destination: Vec<Uid>,
    ) -> Option<Self> {
        if source.len() != destination.len() {
            return None;
        }
        Some(Self {
            source_validity,
            destination_validity: Some(destination_validity),
            pairs: source.into_iter().zip(destination).collect(),
        })
    }

    /// Number of mapped messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if the server reported no mapping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Looks up the destination UID assigned to a source UID.
    #[must_use]
    pub fn destination_of(&self, source: Uid) -> Option<UniqueId> {
        let validity = self.destination_validity?;
        self.pairs
            .iter()
            .find(|(src, _)| *src == source)
            .map(|(_, dst)| UniqueId::new(validity, *dst))
    }

    /// Iterates source/destination pairs in server order.
    pub fn iter(&self) -> impl Iterator<Item = (Uid, Uid)> + '_ {
        self.pairs.iter().copied()
    }

    /// The destination identifiers in server order.
    #[must_use]
    pub fn destination_ids(&self) -> Vec<UniqueId> {
        let Some(validity) = self.destination_validity else {
            return Vec::new();
        };
        self.pairs
            .iter()
            .map(|(_, dst)| UniqueId::new(validity, *dst))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[test]
    fn empty_map() {
        let map = UniqueIdMap::empty();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert!(map.destination_of(uid(1)).is_none());
        assert!(map.destination_ids().is_empty());
    }

    #[test]
    fn from_copy_uid_pairs_positionally() {
        let dest_v = UidValidity::new(38505).unwrap();
        let map = UniqueIdMap::from_copy_uid(
            UidValidity::new(1234),
            dest_v,
            vec![uid(304), uid(319), uid(320)],
            vec![uid(3956), uid(3957), uid(3958)],
        )
        .unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(
            map.destination_of(uid(319)),
            Some(UniqueId::new(dest_v, uid(3957)))
        );
        assert!(map.destination_of(uid(999)).is_none());
    }

    #[test]
    fn from_copy_uid_rejects_length_mismatch() {
        let dest_v = UidValidity::new(1).unwrap();
        assert!(UniqueIdMap::from_copy_uid(None, dest_v, vec![uid(1)], vec![]).is_none());
    }

    #[test]
    fn destination_ids_carry_validity() {
        let dest_v = UidValidity::new(77).unwrap();
        let map =
            UniqueIdMap::from_copy_uid(None, dest_v, vec![uid(1)], vec![uid(10)]).unwrap();
        let ids = map.destination_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].validity, dest_v);
        assert_eq!(ids[0].uid, uid(10));
    }
}
