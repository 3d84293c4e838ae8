//! Request types for fetch, append, store, search, sort and thread.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::types::{Annotation, Flag, ModSeq, SequenceSet, UidSet};

/// Fields a fetch should populate in the resulting summaries.
///
/// Coarse fields are booleans; header selectors are an ordered list. UID is
/// always fetched so results can be addressed durably.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Message flags and keywords.
    pub flags: bool,
    /// INTERNALDATE.
    pub internal_date: bool,
    /// RFC822.SIZE.
    pub size: bool,
    /// ENVELOPE.
    pub envelope: bool,
    /// BODYSTRUCTURE.
    pub body_structure: bool,
    /// X-GM-LABELS (requires `X-GM-EXT-1`).
    pub gmail_labels: bool,
    /// X-GM-MSGID (requires `X-GM-EXT-1`).
    pub gmail_message_id: bool,
    /// X-GM-THRID (requires `X-GM-EXT-1`).
    pub gmail_thread_id: bool,
    /// MODSEQ (requires CONDSTORE).
    pub mod_seq: bool,
    /// ANNOTATION entries (requires ANNOTATE).
    pub annotations: bool,
    /// References header, fetched via HEADER.FIELDS.
    pub references: bool,
    /// PREVIEW text (requires the server to offer it).
    pub preview_text: bool,
    /// Additional header fields to fetch, in order.
    pub headers: Vec<String>,
    /// Only return messages changed since this mod-sequence (CONDSTORE).
    pub changed_since: Option<ModSeq>,
}

impl FetchRequest {
    /// An empty request; only UID will be fetched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags-only request, the cheapest useful poll.
    #[must_use]
    pub fn flags_only() -> Self {
        Self {
            flags: true,
            ..Self::default()
        }
    }

    /// The fields a message list view needs.
    #[must_use]
    pub fn metadata() -> Self {
        Self {
            flags: true,
            internal_date: true,
            size: true,
            envelope: true,
            ..Self::default()
        }
    }

    /// Requests flags.
    #[must_use]
    pub const fn with_flags(mut self) -> Self {
        self.flags = true;
        self
    }

    /// Requests the envelope.
    #[must_use]
    pub const fn with_envelope(mut self) -> Self {
        self.envelope = true;
        self
    }

    /// Requests the body structure.
    #[must_use]
    pub const fn with_body_structure(mut self) -> Self {
        self.body_structure = true;
        self
    }

    /// Requests mod-sequences.
    #[must_use]
    pub const fn with_mod_seq(mut self) -> Self {
        self.mod_seq = true;
        self
    }

    /// Adds a header field selector.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>) -> Self {
        self.headers.push(name.into());
        self
    }

    /// Restricts the fetch to messages changed since the given mod-sequence.
    #[must_use]
    pub const fn with_changed_since(mut self, mod_seq: ModSeq) -> Self {
        self.changed_since = Some(mod_seq);
        self
    }

    /// True if any Gmail-specific item is requested.
    #[must_use]
    pub const fn wants_gmail_items(&self) -> bool {
        self.gmail_labels || self.gmail_message_id || self.gmail_thread_id
    }
}

/// A message to append (or to replace an existing message with).
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRequest {
    /// The full message octets (RFC 5322 format).
    pub message: Vec<u8>,
    /// Flags to set on the stored message.
    pub flags: Vec<Flag>,
    /// INTERNALDATE to record; the server picks the current time if absent.
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// Annotations to attach (requires ANNOTATE).
    pub annotations: Vec<Annotation>,
}

impl AppendRequest {
    /// Creates a request for the given message octets.
    #[must_use]
    pub fn new(message: Vec<u8>) -> Self {
        Self {
            message,
            flags: Vec::new(),
            internal_date: None,
            annotations: Vec::new(),
        }
    }

    /// Adds a flag.
    #[must_use]
    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    /// Sets the internal date.
    #[must_use]
    pub fn with_internal_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.internal_date = Some(date);
        self
    }

    /// Attaches an annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// A replacement message for REPLACE (RFC 8508).
///
/// Same payload shape as an append; the operation targets an existing UID.
pub type ReplaceRequest = AppendRequest;

/// How a store mutates the target set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Add the listed flags/labels.
    Add,
    /// Remove the listed flags/labels.
    Remove,
    /// Replace the full set.
    Set,
}

/// A flag mutation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFlagsRequest {
    /// Add, remove or replace.
    pub mode: StoreMode,
    /// System flags and keywords to apply.
    pub flags: Vec<Flag>,
    /// Suppress the untagged FETCH echo.
    pub silent: bool,
    /// Skip messages whose mod-sequence exceeds this value (CONDSTORE).
    pub unchanged_since: Option<ModSeq>,
}

impl StoreFlagsRequest {
    /// Creates a request with the given mode and flags.
    #[must_use]
    pub fn new(mode: StoreMode, flags: Vec<Flag>) -> Self {
        Self {
            mode,
            flags,
            silent: false,
            unchanged_since: None,
        }
    }

    /// Suppresses the untagged FETCH echo.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Applies the conditional-store guard.
    #[must_use]
    pub const fn unchanged_since(mut self, mod_seq: ModSeq) -> Self {
        self.unchanged_since = Some(mod_seq);
        self
    }
}

/// A Gmail label mutation request (requires `X-GM-EXT-1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLabelsRequest {
    /// Add, remove or replace.
    pub mode: StoreMode,
    /// Labels to apply.
    pub labels: Vec<String>,
    /// Suppress the untagged FETCH echo.
    pub silent: bool,
    /// Skip messages whose mod-sequence exceeds this value (CONDSTORE).
    pub unchanged_since: Option<ModSeq>,
}

impl StoreLabelsRequest {
    /// Creates a request with the given mode and labels.
    #[must_use]
    pub fn new(mode: StoreMode, labels: Vec<String>) -> Self {
        Self {
            mode,
            labels,
            silent: false,
            unchanged_since: None,
        }
    }

    /// Suppresses the untagged FETCH echo.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Applies the conditional-store guard.
    #[must_use]
    pub const fn unchanged_since(mut self, mod_seq: ModSeq) -> Self {
        self.unchanged_since = Some(mod_seq);
        self
    }
}

/// A search query tree.
///
/// Every atomic term lowers to exactly one SEARCH key; conjunctions
/// concatenate, disjunctions wrap in `OR a b`, negations prefix `NOT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// All messages.
    All,
    /// Messages with \Answered.
    Answered,
    /// Messages with \Deleted.
    Deleted,
    /// Messages with \Draft.
    Draft,
    /// Messages with \Flagged.
    Flagged,
    /// Messages with \Seen.
    Seen,
    /// Messages with \Recent.
    Recent,
    /// Recent messages without \Seen.
    New,
    /// Messages without \Answered.
    Unanswered,
    /// Messages without \Deleted.
    Undeleted,
    /// Messages without \Draft.
    Undraft,
    /// Messages without \Flagged.
    Unflagged,
    /// Messages without \Seen.
    Unseen,
    /// Messages carrying the keyword.
    Keyword(String),
    /// Messages not carrying the keyword.
    Unkeyword(String),
    /// Sequence number set membership.
    SequenceSet(SequenceSet),
    /// UID set membership.
    UidSet(UidSet),
    /// Subject contains text.
    Subject(String),
    /// From contains text.
    From(String),
    /// To contains text.
    To(String),
    /// Cc contains text.
    Cc(String),
    /// Bcc contains text.
    Bcc(String),
    /// Body contains text.
    Body(String),
    /// Header or body contains text.
    Text(String),
    /// Named header contains text.
    Header(String, String),
    /// Internal date on or after.
    Since(NaiveDate),
    /// Internal date before.
    Before(NaiveDate),
    /// Internal date equals.
    On(NaiveDate),
    /// Date header on or after.
    SentSince(NaiveDate),
    /// Date header before.
    SentBefore(NaiveDate),
    /// Date header equals.
    SentOn(NaiveDate),
    /// Larger than size in octets.
    Larger(u32),
    /// Smaller than size in octets.
    Smaller(u32),
    /// Mod-sequence at least this value (CONDSTORE).
    ModSeq(ModSeq),
    /// Received within the last n seconds (WITHIN).
    Younger(u32),
    /// Received more than n seconds ago (WITHIN).
    Older(u32),
    /// Annotation entry/attribute matches (ANNOTATE).
    Annotation {
        /// Entry name, e.g. `/comment`.
        entry: String,
        /// Attribute, e.g. `value.priv`.
        attribute: String,
        /// Match value; `None` matches entry presence.
        value: Option<String>,
    },
    /// Raw Gmail search expression (X-GM-RAW).
    GmailRaw(String),
    /// Gmail message id (X-GM-MSGID).
    GmailMessageId(u64),
    /// Gmail thread id (X-GM-THRID).
    GmailThreadId(u64),
    /// Gmail label (X-GM-LABELS).
    GmailLabel(String),
    /// Conjunction; terms concatenate.
    And(Vec<Self>),
    /// Disjunction.
    Or(Box<Self>, Box<Self>),
    /// Negation.
    Not(Box<Self>),
}

impl SearchQuery {
    /// True if any string term carries non-ASCII bytes.
    ///
    /// Charset is declared on the wire only in that case.
    #[must_use]
    pub fn contains_non_ascii(&self) -> bool {
        match self {
            Self::Subject(s)
            | Self::From(s)
            | Self::To(s)
            | Self::Cc(s)
            | Self::Bcc(s)
            | Self::Body(s)
            | Self::Text(s)
            | Self::Keyword(s)
            | Self::Unkeyword(s)
            | Self::GmailRaw(s)
            | Self::GmailLabel(s) => !s.is_ascii(),
            Self::Header(name, value) => !name.is_ascii() || !value.is_ascii(),
            Self::Annotation { value, .. } => {
                value.as_ref().is_some_and(|v| !v.is_ascii())
            }
            Self::And(terms) => terms.iter().any(Self::contains_non_ascii),
            Self::Or(a, b) => a.contains_non_ascii() || b.contains_non_ascii(),
            Self::Not(inner) => inner.contains_non_ascii(),
            _ => false,
        }
    }

    /// True if the query uses any Gmail search extension.
    #[must_use]
    pub fn uses_gmail_terms(&self) -> bool {
        match self {
            Self::GmailRaw(_)
            | Self::GmailMessageId(_)
            | Self::GmailThreadId(_)
            | Self::GmailLabel(_) => true,
            Self::And(terms) => terms.iter().any(Self::uses_gmail_terms),
            Self::Or(a, b) => a.uses_gmail_terms() || b.uses_gmail_terms(),
            Self::Not(inner) => inner.uses_gmail_terms(),
            _ => false,
        }
    }

    /// True if the query carries a mod-sequence floor anywhere.
    #[must_use]
    pub fn uses_mod_seq(&self) -> bool {
        match self {
            Self::ModSeq(_) => true,
            Self::And(terms) => terms.iter().any(Self::uses_mod_seq),
            Self::Or(a, b) => a.uses_mod_seq() || b.uses_mod_seq(),
            Self::Not(inner) => inner.uses_mod_seq(),
            _ => false,
        }
    }
}

/// ESEARCH return options (RFC 4731).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Return the lowest matching number.
    pub min: bool,
    /// Return the highest matching number.
    pub max: bool,
    /// Return the full match set.
    pub all: bool,
    /// Return the match count.
    pub count: bool,
    /// Save the result on the server (SEARCHRES).
    pub save: bool,
}

impl SearchOptions {
    /// Returns true when no return option is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.min || self.max || self.all || self.count || self.save)
    }
}

/// SORT ordering keys (RFC 5256).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Internal date.
    Arrival,
    /// First Cc mailbox.
    Cc,
    /// Sent date.
    Date,
    /// First From mailbox.
    From,
    /// Message size.
    Size,
    /// Base subject (stripped of reply prefixes).
    Subject,
    /// First To mailbox.
    To,
    /// Reverse the wrapped key.
    Reverse(Box<SortKey>),
}

impl SortKey {
    /// Writes the wire form of this key.
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            Self::Arrival => "ARRIVAL".to_string(),
            Self::Cc => "CC".to_string(),
            Self::Date => "DATE".to_string(),
            Self::From => "FROM".to_string(),
            Self::Size => "SIZE".to_string(),
            Self::Subject => "SUBJECT".to_string(),
            Self::To => "TO".to_string(),
            Self::Reverse(inner) => format!("REVERSE {}", inner.to_wire()),
        }
    }
}

/// Threading algorithms (RFC 5256 plus the REFS refinement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadingAlgorithm {
    /// Group by base subject only.
    OrderedSubject,
    /// Full References-header threading.
    References,
    /// References-based with subject grouping (THREAD=REFS).
    Refs,
}

impl ThreadingAlgorithm {
    /// The wire token for this algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderedSubject => "ORDEREDSUBJECT",
            Self::References => "REFERENCES",
            Self::Refs => "REFS",
        }
    }

    /// Parses a THREAD= capability token.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ORDEREDSUBJECT" => Some(Self::OrderedSubject),
            "REFERENCES" => Some(Self::References),
            "REFS" => Some(Self::Refs),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThreadingAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fetch_request_builders() {
        let req = FetchRequest::metadata().with_mod_seq().with_header("List-Id");
        assert!(req.flags && req.envelope && req.size && req.internal_date);
        assert!(req.mod_seq);
        assert_eq!(req.headers, vec!["List-Id".to_string()]);
        assert!(!req.wants_gmail_items());
    }

    #[test]
    fn fetch_request_gmail_detection() {
        let req = FetchRequest {
            gmail_thread_id: true,
            ..FetchRequest::default()
        };
        assert!(req.wants_gmail_items());
    }

    #[test]
    fn append_request_builder() {
        let req = AppendRequest::new(b"From: a@b\r\n\r\nhi".to_vec())
            .with_flag(Flag::Seen)
            .with_annotation(crate::types::Annotation::private("/comment", "x"));
        assert_eq!(req.flags, vec![Flag::Seen]);
        assert_eq!(req.annotations.len(), 1);
    }

    #[test]
    fn charset_detection() {
        assert!(!SearchQuery::Subject("hello".to_string()).contains_non_ascii());
        assert!(SearchQuery::Subject("héllo".to_string()).contains_non_ascii());
        let nested = SearchQuery::And(vec![
            SearchQuery::Unseen,
            SearchQuery::Or(
                Box::new(SearchQuery::From("bob".to_string())),
                Box::new(SearchQuery::Body("día".to_string())),
            ),
        ]);
        assert!(nested.contains_non_ascii());
    }

    #[test]
    fn gmail_term_detection() {
        let query = SearchQuery::Not(Box::new(SearchQuery::GmailLabel("work".to_string())));
        assert!(query.uses_gmail_terms());
        assert!(!SearchQuery::Unseen.uses_gmail_terms());
    }

    #[test]
    fn sort_key_wire_forms() {
        assert_eq!(SortKey::Arrival.to_wire(), "ARRIVAL");
        assert_eq!(
            SortKey::Reverse(Box::new(SortKey::Date)).to_wire(),
            "REVERSE DATE"
        );
    }

    #[test]
    fn threading_algorithm_roundtrip() {
        for algo in [
            ThreadingAlgorithm::OrderedSubject,
            ThreadingAlgorithm::References,
            ThreadingAlgorithm::Refs,
        ] {
            assert_eq!(ThreadingAlgorithm::parse(algo.as_str()), Some(algo));
        }
        assert_eq!(ThreadingAlgorithm::parse("BOGUS"), None);
    }

    #[test]
    fn search_options_empty() {
        assert!(SearchOptions::default().is_empty());
        let opts = SearchOptions {
            count: true,
            ..SearchOptions::default()
        };
        assert!(!opts.is_empty());
    }
}
