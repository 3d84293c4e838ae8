//! Command-related type definitions.

use crate::request::StoreMode;
use crate::types::{Annotation, Flag, ModSeq};

/// STATUS attributes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
    /// Highest mod-sequence.
    HighestModSeq,
    /// Mailbox size in octets (RFC 8438).
    Size,
    /// Per-mailbox append limit (RFC 7889).
    AppendLimit,
    /// Stable mailbox id (OBJECTID).
    MailboxId,
}

impl StatusAttribute {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
            Self::HighestModSeq => "HIGHESTMODSEQ",
            Self::Size => "SIZE",
            Self::AppendLimit => "APPENDLIMIT",
            Self::MailboxId => "MAILBOXID",
        }
    }

    /// Every attribute the engine knows how to request.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Messages,
            Self::Recent,
            Self::UidNext,
            Self::UidValidity,
            Self::Unseen,
            Self::HighestModSeq,
        ]
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure.
    BodyStructure,
    /// UID.
    Uid,
    /// MODSEQ (CONDSTORE).
    ModSeq,
    /// X-GM-LABELS.
    GmailLabels,
    /// X-GM-MSGID.
    GmailMessageId,
    /// X-GM-THRID.
    GmailThreadId,
    /// All annotation entries, both scopes (RFC 5257).
    Annotation,
    /// PREVIEW text (RFC 8970).
    Preview,
    /// Body section.
    Body {
        /// Section specifier; `None` fetches the whole message.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
        /// Partial fetch range: (offset, octet count).
        partial: Option<(u64, u64)>,
    },
}

impl FetchAttribute {
    /// A `BODY.PEEK[HEADER.FIELDS (...)]` selector for the named headers.
    #[must_use]
    pub fn header_fields(names: &[String]) -> Self {
        Self::Body {
            section: Some(format!(
                "HEADER.FIELDS ({})",
                names
                    .iter()
                    .map(|n| n.to_uppercase())
                    .collect::<Vec<_>>()
                    .join(" ")
            )),
            peek: true,
            partial: None,
        }
    }
}

/// What a STORE mutates.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreTarget {
    /// System flags and keywords.
    Flags(Vec<Flag>),
    /// Gmail labels (X-GM-LABELS).
    Labels(Vec<String>),
    /// Message annotations (RFC 5257). Mode and silence do not apply;
    /// annotation stores are always replace-by-entry.
    Annotations(Vec<Annotation>),
}

/// A fully specified STORE mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSpec {
    /// Add, remove or replace. Ignored for annotation targets.
    pub mode: StoreMode,
    /// What to mutate.
    pub target: StoreTarget,
    /// Suppress the untagged FETCH echo.
    pub silent: bool,
    /// UNCHANGEDSINCE guard (CONDSTORE).
    pub unchanged_since: Option<ModSeq>,
}
