//! Command serialization helpers.
//!
//! Encoding produces a sequence of segments: plain data, and wait points
//! where a synchronizing literal needs a `+` continuation from the server
//! before the payload may follow. LITERAL+ / LITERAL- collapse the wait
//! points into the surrounding data.

use crate::request::{SearchQuery, SortKey, StoreMode};
use crate::types::{Annotation, Mailbox};

use super::types::{FetchAttribute, StoreSpec, StoreTarget};

/// Bound above which LITERAL- falls back to synchronizing literals.
const LITERAL_MINUS_MAX: usize = 4096;

/// How literals may be sent without waiting for a continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiteralMode {
    /// Plain RFC 3501: every literal waits for `+`.
    #[default]
    Synchronizing,
    /// LITERAL+ (RFC 7888): `{N+}` for any size.
    NonSynchronizing,
    /// LITERAL- (RFC 7888): `{N+}` only up to 4096 octets.
    NonSyncBounded,
}

impl LiteralMode {
    const fn allows_nonsync(self, len: usize) -> bool {
        match self {
            Self::Synchronizing => false,
            Self::NonSynchronizing => true,
            Self::NonSyncBounded => len <= LITERAL_MINUS_MAX,
        }
    }
}

/// One step of an encoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Bytes to put on the wire.
    Data(Vec<u8>),
    /// Wait for a `+` continuation before sending what follows.
    WaitForContinuation,
}

/// A command encoded into wire segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    /// The segments, in wire order.
    pub segments: Vec<Segment>,
}

impl EncodedCommand {
    /// True if the command needs at least one continuation exchange.
    #[must_use]
    pub fn needs_continuation(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::WaitForContinuation))
    }

    /// Flattens the segments into one buffer, ignoring wait points.
    ///
    /// Only valid for display/testing and for commands without
    /// synchronizing literals.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for segment in &self.segments {
            if let Segment::Data(data) = segment {
                out.extend_from_slice(data);
            }
        }
        out
    }
}

/// Incremental writer assembling an [`EncodedCommand`].
pub struct CommandWriter {
    mode: LiteralMode,
    segments: Vec<Segment>,
    line: Vec<u8>,
}

impl CommandWriter {
    /// Creates a writer for the given literal mode.
    #[must_use]
    pub const fn new(mode: LiteralMode) -> Self {
        Self {
            mode,
            segments: Vec::new(),
            line: Vec::new(),
        }
    }

    /// Appends raw bytes to the current line.
    pub fn put(&mut self, bytes: &[u8]) {
        self.line.extend_from_slice(bytes);
    }

    /// Appends a string to the current line.
    pub fn put_str(&mut self, s: &str) {
        self.line.extend_from_slice(s.as_bytes());
    }

    /// Appends a single space.
    pub fn put_space(&mut self) {
        self.line.push(b' ');
    }

    /// Writes an astring: atom, quoted string, or literal.
    ///
    /// Strings with 8-bit or control bytes go out as literals; strings
    /// needing quoting are quoted; everything else stays a bare atom.
    pub fn put_astring(&mut self, s: &str) {
        if s.bytes().any(|b| b >= 0x80 || b == b'\r' || b == b'\n') {
            self.put_literal(s.as_bytes());
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            self.line.push(b'"');
            for b in s.bytes() {
                if b == b'"' || b == b'\\' {
                    self.line.push(b'\\');
                }
                self.line.push(b);
            }
            self.line.push(b'"');
        } else {
            self.line.extend_from_slice(s.as_bytes());
        }
    }

    /// Writes a mailbox name.
    pub fn put_mailbox(&mut self, mailbox: &Mailbox) {
        self.put_astring(mailbox.as_str());
    }

    /// Writes a literal, splitting at a continuation point when the mode
    /// requires synchronization.
    pub fn put_literal(&mut self, data: &[u8]) {
        if self.mode.allows_nonsync(data.len()) {
            self.put_str(&format!("{{{}+}}\r\n", data.len()));
            self.put(data);
        } else {
            self.put_str(&format!("{{{}}}\r\n", data.len()));
            self.flush_line();
            self.segments.push(Segment::WaitForContinuation);
            self.put(data);
        }
    }

    fn flush_line(&mut self) {
        if !self.line.is_empty() {
            self.segments.push(Segment::Data(std::mem::take(&mut self.line)));
        }
    }

    /// Terminates the command with CRLF and returns the encoding.
    #[must_use]
    pub fn finish(mut self) -> EncodedCommand {
        self.put(b"\r\n");
        self.flush_line();
        EncodedCommand {
            segments: self.segments,
        }
    }
}

/// Returns true if the byte forces quoting of an astring.
///
/// Covers every printable byte the tokenizer refuses in an atom; `[`
/// matters in practice for mailbox names like `[Gmail]/All Mail`.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'}' | b'%' | b'*' | b'[' | b']'
    ) || b < 0x20
        || b == 0x7F
}

/// Writes a parenthesized flag list.
pub fn write_flag_list(w: &mut CommandWriter, flags: &[crate::types::Flag]) {
    w.put(b"(");
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            w.put_space();
        }
        w.put_str(flag.as_str());
    }
    w.put(b")");
}

/// Writes a FETCH attribute list.
pub fn write_fetch_attributes(w: &mut CommandWriter, attrs: &[FetchAttribute]) {
    if attrs.len() == 1 {
        write_fetch_attribute(w, &attrs[0]);
        return;
    }

    w.put(b"(");
    for (i, attr) in attrs.iter().enumerate() {
        if i > 0 {
            w.put_space();
        }
        write_fetch_attribute(w, attr);
    }
    w.put(b")");
}

/// Writes a single FETCH attribute.
pub fn write_fetch_attribute(w: &mut CommandWriter, attr: &FetchAttribute) {
    match attr {
        FetchAttribute::Flags => w.put_str("FLAGS"),
        FetchAttribute::InternalDate => w.put_str("INTERNALDATE"),
        FetchAttribute::Rfc822Size => w.put_str("RFC822.SIZE"),
        FetchAttribute::Envelope => w.put_str("ENVELOPE"),
        FetchAttribute::BodyStructure => w.put_str("BODYSTRUCTURE"),
        FetchAttribute::Uid => w.put_str("UID"),
        FetchAttribute::ModSeq => w.put_str("MODSEQ"),
        FetchAttribute::GmailLabels => w.put_str("X-GM-LABELS"),
        FetchAttribute::GmailMessageId => w.put_str("X-GM-MSGID"),
        FetchAttribute::GmailThreadId => w.put_str("X-GM-THRID"),
        FetchAttribute::Annotation => w.put_str("ANNOTATION (/* (value.priv value.shared))"),
        FetchAttribute::Preview => w.put_str("PREVIEW"),
        FetchAttribute::Body {
            section,
            peek,
            partial,
        } => {
            if *peek {
                w.put_str("BODY.PEEK[");
            } else {
                w.put_str("BODY[");
            }
            if let Some(s) = section {
                w.put_str(s);
            }
            w.put(b"]");
            if let Some((start, len)) = partial {
                w.put_str(&format!("<{start}.{len}>"));
            }
        }
    }
}

/// Writes a STORE action: modifier, item name, value list.
pub fn write_store_spec(w: &mut CommandWriter, spec: &StoreSpec) {
    if let Some(modseq) = spec.unchanged_since {
        w.put_str(&format!("(UNCHANGEDSINCE {modseq}) "));
    }

    match &spec.target {
        StoreTarget::Flags(flags) => {
            write_store_prefix(w, spec.mode, "FLAGS", spec.silent);
            w.put_space();
            write_flag_list(w, flags);
        }
        StoreTarget::Labels(labels) => {
            write_store_prefix(w, spec.mode, "X-GM-LABELS", spec.silent);
            w.put_space();
            w.put(b"(");
            for (i, label) in labels.iter().enumerate() {
                if i > 0 {
                    w.put_space();
                }
                w.put_astring(label);
            }
            w.put(b")");
        }
        StoreTarget::Annotations(annotations) => {
            w.put_str("ANNOTATION ");
            write_annotation_list(w, annotations);
        }
    }
}

fn write_store_prefix(w: &mut CommandWriter, mode: StoreMode, item: &str, silent: bool) {
    match mode {
        StoreMode::Add => w.put(b"+"),
        StoreMode::Remove => w.put(b"-"),
        StoreMode::Set => {}
    }
    w.put_str(item);
    if silent {
        w.put_str(".SILENT");
    }
}

/// Writes an annotation list: `(/comment (value.priv "x" value.shared NIL))`.
pub fn write_annotation_list(w: &mut CommandWriter, annotations: &[Annotation]) {
    w.put(b"(");
    for (i, annotation) in annotations.iter().enumerate() {
        if i > 0 {
            w.put_space();
        }
        w.put_str(&annotation.entry);
        w.put_str(" (");
        for (j, value) in annotation.values.iter().enumerate() {
            if j > 0 {
                w.put_space();
            }
            w.put_str(&value.attribute);
            w.put_space();
            match &value.value {
                Some(v) => w.put_astring(v),
                None => w.put_str("NIL"),
            }
        }
        w.put(b")");
    }
    w.put(b")");
}

/// Formats a date for SEARCH terms: `1-Feb-1994`.
fn search_date(date: chrono::NaiveDate) -> String {
    // %e pads with a space; IMAP wants no padding
    let day = date.format("%d").to_string();
    let day = day.trim_start_matches('0');
    format!("{}-{}", day, date.format("%b-%Y"))
}

/// Lowers a search query to its wire form.
///
/// Atomic terms map to one key each; AND concatenates, OR wraps, NOT
/// prefixes.
pub fn write_search_query(w: &mut CommandWriter, query: &SearchQuery) {
    match query {
        SearchQuery::All => w.put_str("ALL"),
        SearchQuery::Answered => w.put_str("ANSWERED"),
        SearchQuery::Deleted => w.put_str("DELETED"),
        SearchQuery::Draft => w.put_str("DRAFT"),
        SearchQuery::Flagged => w.put_str("FLAGGED"),
        SearchQuery::Seen => w.put_str("SEEN"),
        SearchQuery::Recent => w.put_str("RECENT"),
        SearchQuery::New => w.put_str("NEW"),
        SearchQuery::Unanswered => w.put_str("UNANSWERED"),
        SearchQuery::Undeleted => w.put_str("UNDELETED"),
        SearchQuery::Undraft => w.put_str("UNDRAFT"),
        SearchQuery::Unflagged => w.put_str("UNFLAGGED"),
        SearchQuery::Unseen => w.put_str("UNSEEN"),
        SearchQuery::Keyword(k) => {
            w.put_str("KEYWORD ");
            w.put_astring(k);
        }
        SearchQuery::Unkeyword(k) => {
            w.put_str("UNKEYWORD ");
            w.put_astring(k);
        }
        SearchQuery::SequenceSet(set) => w.put_str(&set.to_string()),
        SearchQuery::UidSet(set) => {
            w.put_str("UID ");
            w.put_str(&set.to_string());
        }
        SearchQuery::Subject(s) => {
            w.put_str("SUBJECT ");
            w.put_astring(s);
        }
        SearchQuery::From(s) => {
            w.put_str("FROM ");
            w.put_astring(s);
        }
        SearchQuery::To(s) => {
            w.put_str("TO ");
            w.put_astring(s);
        }
        SearchQuery::Cc(s) => {
            w.put_str("CC ");
            w.put_astring(s);
        }
        SearchQuery::Bcc(s) => {
            w.put_str("BCC ");
            w.put_astring(s);
        }
        SearchQuery::Body(s) => {
            w.put_str("BODY ");
            w.put_astring(s);
        }
        SearchQuery::Text(s) => {
            w.put_str("TEXT ");
            w.put_astring(s);
        }
        SearchQuery::Header(name, value) => {
            w.put_str("HEADER ");
            w.put_astring(name);
            w.put_space();
            w.put_astring(value);
        }
        SearchQuery::Since(d) => w.put_str(&format!("SINCE {}", search_date(*d))),
        SearchQuery::Before(d) => w.put_str(&format!("BEFORE {}", search_date(*d))),
        SearchQuery::On(d) => w.put_str(&format!("ON {}", search_date(*d))),
        SearchQuery::SentSince(d) => w.put_str(&format!("SENTSINCE {}", search_date(*d))),
        SearchQuery::SentBefore(d) => w.put_str(&format!("SENTBEFORE {}", search_date(*d))),
        SearchQuery::SentOn(d) => w.put_str(&format!("SENTON {}", search_date(*d))),
        SearchQuery::Larger(n) => w.put_str(&format!("LARGER {n}")),
        SearchQuery::Smaller(n) => w.put_str(&format!("SMALLER {n}")),
        SearchQuery::ModSeq(m) => w.put_str(&format!("MODSEQ {m}")),
        SearchQuery::Younger(n) => w.put_str(&format!("YOUNGER {n}")),
        SearchQuery::Older(n) => w.put_str(&format!("OLDER {n}")),
        SearchQuery::Annotation {
            entry,
            attribute,
            value,
        } => {
            w.put_str("ANNOTATION ");
            w.put_str(entry);
            w.put_space();
            w.put_str(attribute);
            w.put_space();
            match value {
                Some(v) => w.put_astring(v),
                None => w.put_str("NIL"),
            }
        }
        SearchQuery::GmailRaw(s) => {
            w.put_str("X-GM-RAW ");
            w.put_astring(s);
        }
        SearchQuery::GmailMessageId(id) => w.put_str(&format!("X-GM-MSGID {id}")),
        SearchQuery::GmailThreadId(id) => w.put_str(&format!("X-GM-THRID {id}")),
        SearchQuery::GmailLabel(label) => {
            w.put_str("X-GM-LABELS ");
            w.put_astring(label);
        }
        SearchQuery::And(terms) => {
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    w.put_space();
                }
                write_search_query(w, term);
            }
        }
        SearchQuery::Or(a, b) => {
            w.put_str("OR ");
            write_search_query(w, a);
            w.put_space();
            write_search_query(w, b);
        }
        SearchQuery::Not(inner) => {
            w.put_str("NOT ");
            write_search_query(w, inner);
        }
    }
}

/// Writes SORT keys: `(SUBJECT REVERSE DATE)`.
pub fn write_sort_keys(w: &mut CommandWriter, keys: &[SortKey]) {
    w.put(b"(");
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            w.put_space();
        }
        w.put_str(&key.to_wire());
    }
    w.put(b")");
}
