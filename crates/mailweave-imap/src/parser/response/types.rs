//! Response data types.

use crate::types::{
    Annotation, Capability, Flags, ListResponse, Mailbox, ModSeq, SeqNum, Uid,
    UidValidity,
};

/// FETCH response item.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchItem {
    /// Message flags.
    Flags(Flags),
    /// Internal date, as the server printed it.
    InternalDate(String),
    /// RFC822 size.
    Rfc822Size(u32),
    /// Envelope.
    Envelope(Box<Envelope>),
    /// UID.
    Uid(Uid),
    /// BODY section payload.
    Body {
        /// Section specifier, e.g. `1.2`, `HEADER`, `HEADER.FIELDS (...)`.
        section: Option<String>,
        /// Origin offset for partial fetches.
        origin: Option<u64>,
        /// Body data; NIL for an absent section.
        data: Option<Vec<u8>>,
    },
    /// BODYSTRUCTURE.
    BodyStructure(BodyStructure),
    /// MODSEQ (CONDSTORE).
    ModSeq(ModSeq),
    /// X-GM-LABELS (Gmail).
    GmailLabels(Vec<String>),
    /// X-GM-MSGID (Gmail, 64-bit).
    GmailMessageId(u64),
    /// X-GM-THRID (Gmail, 64-bit).
    GmailThreadId(u64),
    /// ANNOTATION data (RFC 5257).
    Annotation(Vec<Annotation>),
    /// PREVIEW text (RFC 8970); NIL when the server has none yet.
    Preview(Option<String>),
}

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Email address from envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route (obsolete).
    pub adl: Option<String>,
    /// Mailbox name (local part).
    pub mailbox: Option<String>,
    /// Host name (domain part).
    pub host: Option<String>,
}

impl Address {
    /// Returns the full email address.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// Body structure tree.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyStructure {
    /// Single-part body.
    Basic {
        /// MIME type.
        media_type: String,
        /// MIME subtype.
        media_subtype: String,
        /// Body parameters.
        params: Vec<(String, String)>,
        /// Content-ID.
        id: Option<String>,
        /// Content-Description.
        description: Option<String>,
        /// Content-Transfer-Encoding.
        encoding: String,
        /// Body size in bytes.
        size: u32,
    },
    /// Message/RFC822 body.
    Message {
        /// Envelope of nested message.
        envelope: Box<Envelope>,
        /// Body structure of nested message.
        body: Box<Self>,
        /// Size in lines.
        lines: u32,
    },
    /// Text body.
    Text {
        /// Text subtype.
        subtype: String,
        /// Body parameters.
        params: Vec<(String, String)>,
        /// Content-ID.
        id: Option<String>,
        /// Content-Description.
        description: Option<String>,
        /// Content-Transfer-Encoding.
        encoding: String,
        /// Body size in bytes.
        size: u32,
        /// Size in lines.
        lines: u32,
    },
    /// Multipart body.
    Multipart {
        /// Child body parts.
        bodies: Vec<Self>,
        /// Multipart subtype.
        subtype: String,
    },
}

/// STATUS response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusItem {
    /// Number of messages.
    Messages(u32),
    /// Number of recent messages.
    Recent(u32),
    /// Next UID.
    UidNext(Uid),
    /// UIDVALIDITY value.
    UidValidity(UidValidity),
    /// Number of unseen messages.
    Unseen(u32),
    /// Highest mod-sequence.
    HighestModSeq(ModSeq),
    /// Total mailbox size in octets (RFC 8438).
    Size(u64),
    /// Per-mailbox append limit (RFC 7889).
    AppendLimit(u64),
    /// Stable mailbox id (OBJECTID).
    MailboxId(String),
}

/// A node of a `* THREAD` response, carrying raw message numbers.
///
/// A number of zero marks a placeholder parent the server synthesized for
/// siblings whose common ancestor is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    /// UID (for UID THREAD) or sequence number; `None` for a placeholder.
    pub id: Option<u32>,
    /// Child nodes.
    pub children: Vec<ThreadNode>,
}

/// Parsed `* ESEARCH` response (RFC 4731).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ESearchResponse {
    /// Correlating command tag, if the server echoed one.
    pub tag: Option<String>,
    /// True if the returned numbers are UIDs.
    pub uid: bool,
    /// Lowest matching number.
    pub min: Option<u32>,
    /// Highest matching number.
    pub max: Option<u32>,
    /// Number of matches.
    pub count: Option<u32>,
    /// All matching numbers, range-expanded.
    pub all: Vec<u32>,
    /// Highest mod-sequence among the matches (CONDSTORE).
    pub mod_seq: Option<ModSeq>,
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedResponse {
    /// OK response with optional code.
    Ok {
        /// Optional response code.
        code: Option<crate::types::ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// NO response.
    No {
        /// Optional response code.
        code: Option<crate::types::ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BAD response.
    Bad {
        /// Optional response code.
        code: Option<crate::types::ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// PREAUTH greeting.
    PreAuth {
        /// Optional response code.
        code: Option<crate::types::ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BYE response.
    Bye {
        /// Optional response code.
        code: Option<crate::types::ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// CAPABILITY response.
    Capability(Vec<Capability>),
    /// ENABLED response (RFC 5161).
    Enabled(Vec<Capability>),
    /// LIST response.
    List(ListResponse),
    /// LSUB response.
    Lsub(ListResponse),
    /// FLAGS response.
    Flags(Flags),
    /// EXISTS response (message count).
    Exists(u32),
    /// RECENT response.
    Recent(u32),
    /// EXPUNGE response (message removed).
    Expunge(SeqNum),
    /// VANISHED response (QRESYNC).
    Vanished {
        /// True for `VANISHED (EARLIER)` replays during resynchronization.
        earlier: bool,
        /// UIDs that no longer exist.
        uids: Vec<Uid>,
    },
    /// FETCH response.
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Fetch data items.
        items: Vec<FetchItem>,
    },
    /// SEARCH response; UIDs for UID SEARCH, sequence numbers otherwise.
    Search(Vec<u32>),
    /// SORT response; same numbering rules as SEARCH.
    Sort(Vec<u32>),
    /// THREAD response.
    Thread(Vec<ThreadNode>),
    /// ESEARCH response.
    ESearch(ESearchResponse),
    /// STATUS response.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items.
        items: Vec<StatusItem>,
    },
    /// ID response (RFC 2971); NIL maps to an empty list.
    Id(Vec<(String, String)>),
    /// METADATA response (RFC 5464).
    Metadata {
        /// Mailbox the entries belong to; empty for server metadata.
        mailbox: Mailbox,
        /// Entry name / value pairs; a NIL value removes the entry.
        entries: Vec<(String, Option<String>)>,
    },
    /// Any untagged data the engine does not model.
    ///
    /// Unexpected untagged responses must never kill the session; they are
    /// logged and skipped.
    Unknown {
        /// The leading atom of the response.
        name: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn address_email() {
        let addr = Address {
            name: Some("John Doe".to_string()),
            adl: None,
            mailbox: Some("john".to_string()),
            host: Some("example.com".to_string()),
        };
        assert_eq!(addr.email(), Some("john@example.com".to_string()));

        let partial = Address {
            name: None,
            adl: None,
            mailbox: Some("john".to_string()),
            host: None,
        };
        assert_eq!(partial.email(), None);
    }

    #[test]
    fn default_envelope_is_empty() {
        let env = Envelope::default();
        assert!(env.date.is_none());
        assert!(env.from.is_empty());
        assert!(env.message_id.is_none());
    }

    #[test]
    fn thread_node_placeholder() {
        let node = ThreadNode {
            id: None,
            children: vec![
                ThreadNode {
                    id: Some(3),
                    children: vec![],
                },
                ThreadNode {
                    id: Some(5),
                    children: vec![],
                },
            ],
        };
        assert!(node.id.is_none());
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn esearch_default() {
        let e = ESearchResponse::default();
        assert!(e.all.is_empty());
        assert!(!e.uid);
        assert!(e.min.is_none());
    }
}
