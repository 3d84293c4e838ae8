//! Core IMAP types.
//!
//! This module defines the fundamental types used throughout the engine,
//! following RFC 3501 (`IMAP4rev1`) and the extensions the engine speaks.

mod annotation;
mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod sequence;
mod uid_map;

pub use annotation::{Annotation, AnnotationAccess, AnnotationScope, AnnotationValue};
pub use capability::{Capability, Status};
pub use flags::{Flag, Flags};
pub use identifiers::{ModSeq, SeqNum, Tag, Uid, UidValidity, UniqueId};
pub use mailbox::{ListResponse, Mailbox, MailboxAttribute};
pub use response_code::ResponseCode;
pub use sequence::{SequenceSet, UidSet};
pub use uid_map::UniqueIdMap;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn seq_num_new() {
        assert!(SeqNum::new(0).is_none());
        assert_eq!(SeqNum::new(42).unwrap().get(), 42);
    }

    #[test]
    fn uid_new() {
        assert!(Uid::new(0).is_none());
        assert_eq!(Uid::new(123).unwrap().get(), 123);
    }

    #[test]
    fn capability_parse() {
        assert_eq!(Capability::parse("IMAP4rev1"), Capability::Imap4Rev1);
        assert_eq!(
            Capability::parse("AUTH=PLAIN"),
            Capability::Auth("PLAIN".to_string())
        );
        assert_eq!(
            Capability::parse("THREAD=ORDEREDSUBJECT"),
            Capability::Thread("ORDEREDSUBJECT".to_string())
        );
    }

    #[test]
    fn flag_parse() {
        assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
        assert_eq!(Flag::parse("custom"), Flag::Keyword("custom".to_string()));
    }

    #[test]
    fn sequence_set_display() {
        assert_eq!(SequenceSet::single(1).unwrap().to_string(), "1");
        assert_eq!(SequenceSet::range(1, 10).unwrap().to_string(), "1:10");
        assert_eq!(SequenceSet::All.to_string(), "*");
    }

    #[test]
    fn unique_id_cross_validity() {
        let a = UniqueId::new(UidValidity::new(1).unwrap(), Uid::new(2).unwrap());
        let b = UniqueId::new(UidValidity::new(2).unwrap(), Uid::new(2).unwrap());
        assert!(a.partial_cmp(&b).is_none());
    }
}
