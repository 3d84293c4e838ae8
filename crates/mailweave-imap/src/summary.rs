//! Message summaries, thread forests and search results.

use chrono::{DateTime, FixedOffset};

use crate::parser::{BodyStructure, Envelope, FetchItem, ThreadNode};
use crate::types::{
    Annotation, Flags, ModSeq, SeqNum, Uid, UidValidity, UniqueId,
};

/// A fetched body section payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSection {
    /// Section specifier; `None` is the whole message.
    pub section: Option<String>,
    /// Origin offset for partial fetches.
    pub origin: Option<u64>,
    /// The octets.
    pub data: Vec<u8>,
}

/// A sparse record of everything known about one message.
///
/// Addressed by (folder, sequence number, `UniqueId`). Fields are populated
/// only when the corresponding fetch item was requested or volunteered by
/// the server; everything else stays `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageSummary {
    /// Full name of the folder the message lives in.
    pub folder: String,
    /// Sequence number at fetch time; shifts on expunge.
    pub seq: Option<SeqNum>,
    /// Durable identifier, present when UID was fetched and the folder
    /// validity is known.
    pub id: Option<UniqueId>,
    /// Message flags and keywords.
    pub flags: Option<Flags>,
    /// INTERNALDATE.
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// RFC822.SIZE.
    pub size: Option<u32>,
    /// ENVELOPE.
    pub envelope: Option<Envelope>,
    /// BODYSTRUCTURE tree.
    pub body_structure: Option<BodyStructure>,
    /// Mod-sequence (CONDSTORE).
    pub mod_seq: Option<ModSeq>,
    /// Gmail labels.
    pub gmail_labels: Option<Vec<String>>,
    /// Gmail message id.
    pub gmail_message_id: Option<u64>,
    /// Gmail thread id.
    pub gmail_thread_id: Option<u64>,
    /// Annotations.
    pub annotations: Option<Vec<Annotation>>,
    /// References header message-ids, when fetched.
    pub references: Option<Vec<String>>,
    /// Preview text.
    pub preview: Option<String>,
    /// Raw body sections fetched alongside the summary.
    pub sections: Vec<FetchedSection>,
}

impl MessageSummary {
    /// Creates an empty summary for a message in the given folder.
    #[must_use]
    pub fn new(folder: impl Into<String>, seq: SeqNum) -> Self {
        Self {
            folder: folder.into(),
            seq: Some(seq),
            ..Self::default()
        }
    }

    /// The bare UID, if known.
    #[must_use]
    pub fn uid(&self) -> Option<Uid> {
        self.id.map(|id| id.uid)
    }

    /// Merges one fetch item into the summary.
    ///
    /// `validity` qualifies any UID item into a [`UniqueId`].
    pub fn merge(&mut self, item: FetchItem, validity: Option<UidValidity>) {
        match item {
            FetchItem::Flags(flags) => self.flags = Some(flags),
            FetchItem::InternalDate(raw) => {
                self.internal_date = parse_internal_date(&raw);
            }
            FetchItem::Rfc822Size(size) => self.size = Some(size),
            FetchItem::Envelope(env) => self.envelope = Some(*env),
            FetchItem::Uid(uid) => {
                if let Some(validity) = validity {
                    self.id = Some(UniqueId::new(validity, uid));
                }
            }
            FetchItem::BodyStructure(bs) => self.body_structure = Some(bs),
            FetchItem::ModSeq(m) => self.mod_seq = Some(m),
            FetchItem::GmailLabels(labels) => self.gmail_labels = Some(labels),
            FetchItem::GmailMessageId(id) => self.gmail_message_id = Some(id),
            FetchItem::GmailThreadId(id) => self.gmail_thread_id = Some(id),
            FetchItem::Annotation(annotations) => self.annotations = Some(annotations),
            FetchItem::Preview(text) => self.preview = text,
            FetchItem::Body {
                section,
                origin,
                data,
            } => {
                let data = data.unwrap_or_default();
                if section
                    .as_deref()
                    .is_some_and(|s| s.to_uppercase().starts_with("HEADER.FIELDS (REFERENCES"))
                {
                    self.references = Some(parse_references(&data));
                }
                self.sections.push(FetchedSection {
                    section,
                    origin,
                    data,
                });
            }
        }
    }

    /// The payload of a fetched section, by specifier.
    #[must_use]
    pub fn section(&self, section: Option<&str>) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|s| s.section.as_deref() == section)
            .map(|s| s.data.as_slice())
    }
}

/// Parses an INTERNALDATE string like `17-Jul-1996 02:44:25 -0700`.
#[must_use]
pub fn parse_internal_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw.trim(), "%d-%b-%Y %H:%M:%S %z").ok()
}

/// Formats a date into the INTERNALDATE wire form.
#[must_use]
pub fn format_internal_date(date: &DateTime<FixedOffset>) -> String {
    date.format("%d-%b-%Y %H:%M:%S %z").to_string()
}

/// Extracts message-ids from a raw References header block.
fn parse_references(data: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(data);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut inside = false;

    for c in text.chars() {
        match c {
            '<' => {
                inside = true;
                current.clear();
                current.push('<');
            }
            '>' if inside => {
                current.push('>');
                out.push(std::mem::take(&mut current));
                inside = false;
            }
            _ if inside => current.push(c),
            _ => {}
        }
    }

    out
}

/// A node in a threading forest.
///
/// The root carries either a durable identifier or a placeholder (the
/// server groups siblings under a synthetic parent when their common
/// ancestor no longer exists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageThread {
    /// The message at this node; `None` for a placeholder.
    pub id: Option<UniqueId>,
    /// Child threads.
    pub children: Vec<MessageThread>,
}

impl MessageThread {
    /// Builds a thread from a raw parsed node, qualifying UIDs with the
    /// folder validity.
    #[must_use]
    pub fn from_node(node: &ThreadNode, validity: UidValidity) -> Self {
        Self {
            id: node
                .id
                .and_then(Uid::new)
                .map(|uid| UniqueId::new(validity, uid)),
            children: node
                .children
                .iter()
                .map(|c| Self::from_node(c, validity))
                .collect(),
        }
    }

    /// Total number of real messages in this thread.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.id.is_some())
            + self.children.iter().map(Self::len).sum::<usize>()
    }

    /// True if the thread holds no real messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth-first iteration over the identifiers in the thread.
    #[must_use]
    pub fn ids(&self) -> Vec<UniqueId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<UniqueId>) {
        if let Some(id) = self.id {
            out.push(id);
        }
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

/// Results of a search or sort.
///
/// Plain `* SEARCH`/`* SORT` responses populate only `ids`; ESEARCH
/// responses also carry the summary statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Matching identifiers, in server order (sorted for SORT).
    pub ids: Vec<UniqueId>,
    /// Lowest matching UID (ESEARCH MIN).
    pub min: Option<UniqueId>,
    /// Highest matching UID (ESEARCH MAX).
    pub max: Option<UniqueId>,
    /// Number of matches (ESEARCH COUNT).
    pub count: Option<u32>,
    /// Highest mod-sequence among matches (CONDSTORE).
    pub mod_seq: Option<ModSeq>,
}

impl SearchResults {
    /// The bare UIDs of the matches.
    #[must_use]
    pub fn uids(&self) -> Vec<Uid> {
        self.ids.iter().map(|id| id.uid).collect()
    }
}
