//! Response codes.

use super::{Capability, Flags, ModSeq, SeqNum, Uid, UidValidity};

/// Response code attached to a status response.
///
/// These provide additional machine-readable information about command
/// completion or mailbox state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to the user.
    Alert,
    /// CAPABILITY listing embedded in the response.
    Capability(Vec<Capability>),
    /// PARSE: Error parsing a message on the server.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags {
        /// The permanent flag set.
        flags: Flags,
        /// True when the list contained `\*`, i.e. the server accepts
        /// user-defined keywords.
        accepts_keywords: bool,
    },
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY: Mailbox epoch value.
    UidValidity(UidValidity),
    /// UNSEEN: First unseen message sequence number.
    Unseen(SeqNum),
    /// HIGHESTMODSEQ: Highest mod-sequence value (CONDSTORE).
    HighestModSeq(ModSeq),
    /// NOMODSEQ: Server doesn't track mod-sequences for this mailbox.
    NoModSeq,
    /// APPENDUID: UIDs assigned to appended messages (UIDPLUS).
    AppendUid {
        /// UIDVALIDITY of the target mailbox.
        validity: UidValidity,
        /// UIDs assigned, one per appended message.
        uids: Vec<Uid>,
    },
    /// COPYUID: UID mapping for copied messages (UIDPLUS).
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        validity: UidValidity,
        /// Source UIDs.
        source: Vec<Uid>,
        /// Destination UIDs, pairing positionally with `source`.
        destination: Vec<Uid>,
    },
    /// MODIFIED: messages skipped by a conditional STORE (CONDSTORE).
    ///
    /// The numbers are UIDs for UID STORE, sequence numbers otherwise.
    Modified(Vec<u32>),
    /// APPENDLIMIT: per-mailbox append size limit (RFC 7889).
    AppendLimit(u64),
    /// CLOSED: the previously selected mailbox was closed (QRESYNC).
    Closed,
    /// MAILBOXID: stable mailbox identifier (OBJECTID).
    MailboxId(String),
    /// Unknown response code.
    Unknown(String),
}
