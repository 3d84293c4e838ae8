//! The folder subsystem: per-mailbox state, invariants and change events.
//!
//! A [`MailFolder`] is mutated only by the engine (during response
//! dispatch) and by explicit caller operations; observers read it and
//! receive synchronous [`FolderEvent`]s. Counts are adjusted before the
//! corresponding event fires, so observers always see consistent state.

mod events;
mod registry;

pub use events::{
    CollectedEvents, CollectingObserver, FolderEvent, FolderObserver, LoggingObserver,
    NoopObserver,
};
pub use registry::FolderRegistry;

use crate::parser::{FetchItem, StatusItem, UntaggedResponse};
use crate::qresync::SyncState;
use crate::request::ThreadingAlgorithm;
use crate::summary::MessageSummary;
use crate::types::{
    AnnotationAccess, AnnotationScope, Flags, ListResponse, Mailbox, MailboxAttribute, ModSeq,
    ResponseCode, SeqNum, Uid, UidValidity,
};
use crate::{Error, Result};

/// Access mode of an open folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderAccess {
    /// Not open.
    #[default]
    None,
    /// Open via EXAMINE or a read-only SELECT.
    ReadOnly,
    /// Open via SELECT with write access.
    ReadWrite,
}

/// A node in the mailbox hierarchy.
///
/// Folders are created when the server lists them; identity is the
/// server-authoritative `full_name` unless the server supplies a stable
/// OBJECTID `id`. The parent relation is resolved through the registry,
/// never owned.
pub struct MailFolder {
    full_name: String,
    name: String,
    delimiter: Option<char>,
    attributes: Vec<MailboxAttribute>,

    access: FolderAccess,
    is_open: bool,
    exists_on_server: bool,
    is_subscribed: bool,
    is_namespace: bool,

    permanent_flags: Flags,
    accepted_flags: Flags,
    accepts_custom_keywords: bool,

    uid_validity: Option<UidValidity>,
    uid_next: Option<Uid>,
    highest_mod_seq: Option<ModSeq>,

    count: u32,
    recent: u32,
    unread: Option<u32>,
    first_unread: Option<SeqNum>,
    size: Option<u64>,
    append_limit: Option<u64>,
    id: Option<String>,

    annotation_access: AnnotationAccess,
    annotation_scopes: Vec<AnnotationScope>,
    max_annotation_size: Option<u64>,
    threading_algorithms: Vec<ThreadingAlgorithm>,

    observers: Vec<Box<dyn FolderObserver>>,
}

impl std::fmt::Debug for MailFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailFolder")
            .field("full_name", &self.full_name)
            .field("access", &self.access)
            .field("is_open", &self.is_open)
            .field("uid_validity", &self.uid_validity)
            .field("uid_next", &self.uid_next)
            .field("highest_mod_seq", &self.highest_mod_seq)
            .field("count", &self.count)
            .field("recent", &self.recent)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl MailFolder {
    /// Creates a folder from a LIST response.
    #[must_use]
    pub fn from_list(list: &ListResponse) -> Self {
        let full_name = list.mailbox.as_str().to_string();
        let name = list.mailbox.leaf(list.delimiter).to_string();
        Self {
            full_name,
            name,
            delimiter: list.delimiter,
            attributes: list.attributes.clone(),
            access: FolderAccess::None,
            is_open: false,
            exists_on_server: !list.attributes.contains(&MailboxAttribute::NonExistent),
            is_subscribed: list.attributes.contains(&MailboxAttribute::Subscribed),
            is_namespace: false,
            permanent_flags: Flags::new(),
            accepted_flags: Flags::new(),
            accepts_custom_keywords: false,
            uid_validity: None,
            uid_next: None,
            highest_mod_seq: None,
            count: 0,
            recent: 0,
            unread: None,
            first_unread: None,
            size: None,
            append_limit: None,
            id: None,
            annotation_access: AnnotationAccess::None,
            annotation_scopes: Vec::new(),
            max_annotation_size: None,
            threading_algorithms: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Creates a folder known only by name (before any LIST confirmed it).
    #[must_use]
    pub fn from_name(name: impl Into<String>, delimiter: Option<char>) -> Self {
        let mailbox = Mailbox::new(name);
        let leaf = mailbox.leaf(delimiter).to_string();
        let mut folder = Self::from_list(&ListResponse {
            attributes: Vec::new(),
            delimiter,
            mailbox,
        });
        folder.name = leaf;
        folder
    }

    // === Attribute accessors ===

    /// Server-authoritative full path.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Leaf name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hierarchy separator.
    #[must_use]
    pub const fn directory_separator(&self) -> Option<char> {
        self.delimiter
    }

    /// Full name of the parent folder, if there is one.
    #[must_use]
    pub fn parent_name(&self) -> Option<&str> {
        let sep = self.delimiter?;
        let idx = self.full_name.rfind(sep)?;
        (idx > 0).then(|| &self.full_name[..idx])
    }

    /// LIST attributes.
    #[must_use]
    pub fn attributes(&self) -> &[MailboxAttribute] {
        &self.attributes
    }

    /// True if the folder cannot be selected.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.attributes.contains(&MailboxAttribute::NoSelect)
            && !self.attributes.contains(&MailboxAttribute::NonExistent)
    }

    /// The folder's special-use role, if the server advertised one.
    #[must_use]
    pub fn special_use(&self) -> Option<MailboxAttribute> {
        self.attributes
            .iter()
            .copied()
            .find(|a| a.is_special_use())
    }

    /// Current access mode.
    #[must_use]
    pub const fn access(&self) -> FolderAccess {
        self.access
    }

    /// True while this folder is the selected one.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.is_open
    }

    /// True if the folder exists on the server.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists_on_server
    }

    /// True if the folder is subscribed.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.is_subscribed
    }

    /// True if this node is a namespace prefix, not a real mailbox.
    #[must_use]
    pub const fn is_namespace(&self) -> bool {
        self.is_namespace
    }

    /// Marks this node as a namespace prefix.
    pub fn set_namespace(&mut self, is_namespace: bool) {
        self.is_namespace = is_namespace;
    }

    /// Flags the server stores permanently.
    #[must_use]
    pub const fn permanent_flags(&self) -> &Flags {
        &self.permanent_flags
    }

    /// Flags the server accepts in this folder.
    #[must_use]
    pub const fn accepted_flags(&self) -> &Flags {
        &self.accepted_flags
    }

    /// True if the server accepts user-defined keywords here.
    #[must_use]
    pub const fn accepts_custom_keywords(&self) -> bool {
        self.accepts_custom_keywords
    }

    /// Permanently storable keywords.
    #[must_use]
    pub fn permanent_keywords(&self) -> Vec<&str> {
        self.permanent_flags.keywords().collect()
    }

    /// Accepted keywords.
    #[must_use]
    pub fn accepted_keywords(&self) -> Vec<&str> {
        self.accepted_flags.keywords().collect()
    }

    /// Mailbox epoch.
    #[must_use]
    pub const fn uid_validity(&self) -> Option<UidValidity> {
        self.uid_validity
    }

    /// Next UID the server will assign.
    #[must_use]
    pub const fn uid_next(&self) -> Option<Uid> {
        self.uid_next
    }

    /// Highest mod-sequence (CONDSTORE).
    #[must_use]
    pub const fn highest_mod_seq(&self) -> Option<ModSeq> {
        self.highest_mod_seq
    }

    /// Exact number of messages currently in the folder.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Recent count.
    #[must_use]
    pub const fn recent(&self) -> u32 {
        self.recent
    }

    /// Unread count, when known.
    #[must_use]
    pub const fn unread(&self) -> Option<u32> {
        self.unread
    }

    /// Sequence number of the first unread message, when known.
    #[must_use]
    pub const fn first_unread(&self) -> Option<SeqNum> {
        self.first_unread
    }

    /// Total size in octets, when known.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        self.size
    }

    /// Per-mailbox append limit, when known.
    #[must_use]
    pub const fn append_limit(&self) -> Option<u64> {
        self.append_limit
    }

    /// Stable id (OBJECTID), surviving renames.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Annotation access level.
    #[must_use]
    pub const fn annotation_access(&self) -> AnnotationAccess {
        self.annotation_access
    }

    /// Supported annotation scopes.
    #[must_use]
    pub fn annotation_scopes(&self) -> &[AnnotationScope] {
        &self.annotation_scopes
    }

    /// Maximum annotation size, when the server caps it.
    #[must_use]
    pub const fn max_annotation_size(&self) -> Option<u64> {
        self.max_annotation_size
    }

    /// Threading algorithms available for this folder.
    #[must_use]
    pub fn threading_algorithms(&self) -> &[ThreadingAlgorithm] {
        &self.threading_algorithms
    }

    /// Installs the threading algorithms advertised by the server.
    pub fn set_threading_algorithms(&mut self, algorithms: Vec<ThreadingAlgorithm>) {
        self.threading_algorithms = algorithms;
    }

    /// Sets annotation capabilities for this folder.
    pub fn set_annotation_support(
        &mut self,
        access: AnnotationAccess,
        scopes: Vec<AnnotationScope>,
        max_size: Option<u64>,
    ) {
        self.annotation_access = access;
        self.annotation_scopes = scopes;
        self.max_annotation_size = max_size;
    }

    /// Sets the append limit (from the APPENDLIMIT capability or STATUS).
    pub fn set_append_limit(&mut self, limit: Option<u64>) {
        self.append_limit = limit;
    }

    /// Captures resynchronization state for the next open.
    ///
    /// Requires the folder to have seen UIDVALIDITY and HIGHESTMODSEQ.
    #[must_use]
    pub fn sync_state(&self) -> Option<SyncState> {
        Some(SyncState::new(self.uid_validity?, self.highest_mod_seq?))
    }

    // === Observers ===

    /// Subscribes an observer to this folder's events.
    pub fn add_observer(&mut self, observer: Box<dyn FolderObserver>) {
        self.observers.push(observer);
    }

    /// Number of subscribed observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&mut self, event: &FolderEvent) {
        for observer in &mut self.observers {
            observer.on_event(&self.full_name, event);
        }
    }

    // === Lifecycle transitions (driven by the session) ===

    pub(crate) fn mark_opened(&mut self, access: FolderAccess) {
        self.access = access;
        self.is_open = true;
        self.exists_on_server = true;
        self.notify(&FolderEvent::Opened);
    }

    pub(crate) fn mark_closed(&mut self) {
        if self.is_open {
            self.is_open = false;
            self.access = FolderAccess::None;
            self.recent = 0;
            self.notify(&FolderEvent::Closed);
        }
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.notify(&FolderEvent::Deleted);
        self.exists_on_server = false;
        self.is_open = false;
        self.access = FolderAccess::None;
    }

    pub(crate) fn mark_renamed(&mut self, new_full_name: &str) {
        self.full_name = new_full_name.to_string();
        self.name = Mailbox::new(new_full_name)
            .leaf(self.delimiter)
            .to_string();
        let event = FolderEvent::Renamed {
            new_parent: self.parent_name().map(ToString::to_string),
            new_name: self.name.clone(),
        };
        self.notify(&event);
    }

    pub(crate) fn mark_subscribed(&mut self, subscribed: bool) {
        if self.is_subscribed != subscribed {
            self.is_subscribed = subscribed;
            if subscribed {
                self.notify(&FolderEvent::Subscribed);
            } else {
                self.notify(&FolderEvent::Unsubscribed);
            }
        }
    }

    pub(crate) fn absorb_list(&mut self, list: &ListResponse) {
        self.attributes = list.attributes.clone();
        self.delimiter = list.delimiter.or(self.delimiter);
        self.name = list.mailbox.leaf(self.delimiter).to_string();
        self.exists_on_server = !list.attributes.contains(&MailboxAttribute::NonExistent);
        if list.attributes.contains(&MailboxAttribute::Subscribed) {
            self.is_subscribed = true;
        }
    }

    // === Response dispatch ===

    /// Applies an untagged update to this folder.
    ///
    /// State is mutated before the corresponding event fires. Returns a
    /// protocol violation when the server breaks a hard invariant.
    pub(crate) fn apply_untagged(&mut self, response: &UntaggedResponse) -> Result<()> {
        match response {
            UntaggedResponse::Exists(n) => {
                self.count = *n;
                self.notify(&FolderEvent::CountChanged(*n));
            }
            UntaggedResponse::Recent(n) => {
                self.recent = *n;
                self.notify(&FolderEvent::RecentChanged(*n));
            }
            UntaggedResponse::Expunge(seq) => {
                self.count = self.count.saturating_sub(1);
                let index = *seq;
                self.notify(&FolderEvent::MessageExpunged { index });
                self.notify(&FolderEvent::CountChanged(self.count));
            }
            UntaggedResponse::Vanished { earlier, uids } => {
                if !earlier {
                    let gone = u32::try_from(uids.len()).unwrap_or(u32::MAX);
                    self.count = self.count.saturating_sub(gone);
                }
                let event = FolderEvent::MessagesVanished {
                    uids: uids.clone(),
                    earlier: *earlier,
                };
                self.notify(&event);
                if !earlier {
                    self.notify(&FolderEvent::CountChanged(self.count));
                }
            }
            UntaggedResponse::Fetch { seq, items } => {
                self.apply_fetch(*seq, items);
            }
            UntaggedResponse::Flags(flags) => {
                self.accepted_flags = flags.clone();
            }
            UntaggedResponse::Ok { code: Some(code), .. }
            | UntaggedResponse::No { code: Some(code), .. }
            | UntaggedResponse::Bad { code: Some(code), .. } => {
                self.apply_response_code(code)?;
            }
            UntaggedResponse::Status { items, .. } => {
                self.apply_status(items);
            }
            UntaggedResponse::Metadata { entries, .. } => {
                for (entry, value) in entries {
                    let event = FolderEvent::MetadataChanged {
                        entry: entry.clone(),
                        value: value.clone(),
                    };
                    self.notify(&event);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Applies a FETCH update, classifying it into change events.
    fn apply_fetch(&mut self, seq: SeqNum, items: &[FetchItem]) {
        let uid = items.iter().find_map(|i| match i {
            FetchItem::Uid(uid) => Some(*uid),
            _ => None,
        });
        let mod_seq = items.iter().find_map(|i| match i {
            FetchItem::ModSeq(m) => Some(*m),
            _ => None,
        });

        if let Some(m) = mod_seq {
            if self.highest_mod_seq.is_none_or(|current| m > current) {
                self.highest_mod_seq = Some(m);
            }
        }

        let mut classified = false;

        for item in items {
            match item {
                FetchItem::Flags(flags) => {
                    classified = true;
                    let event = FolderEvent::MessageFlagsChanged {
                        index: Some(seq),
                        uid,
                        flags: flags.clone(),
                        mod_seq,
                    };
                    self.notify(&event);
                }
                FetchItem::GmailLabels(labels) => {
                    classified = true;
                    let event = FolderEvent::MessageLabelsChanged {
                        index: Some(seq),
                        uid,
                        labels: labels.clone(),
                        mod_seq,
                    };
                    self.notify(&event);
                }
                FetchItem::Annotation(annotations) => {
                    classified = true;
                    let event = FolderEvent::AnnotationsChanged {
                        index: Some(seq),
                        uid,
                        annotations: annotations.clone(),
                        mod_seq,
                    };
                    self.notify(&event);
                }
                _ => {}
            }
        }

        if !classified {
            if let Some(m) = mod_seq {
                let event = FolderEvent::ModSeqChanged {
                    index: Some(seq),
                    uid,
                    mod_seq: m,
                };
                self.notify(&event);
            }
        }

        // Anything beyond flag/label/annotation/modseq churn is a summary
        let substantive = items.iter().any(|i| {
            matches!(
                i,
                FetchItem::Envelope(_)
                    | FetchItem::BodyStructure(_)
                    | FetchItem::InternalDate(_)
                    | FetchItem::Rfc822Size(_)
                    | FetchItem::Body { .. }
                    | FetchItem::Preview(_)
                    | FetchItem::GmailMessageId(_)
                    | FetchItem::GmailThreadId(_)
            )
        });
        if substantive {
            let mut summary = MessageSummary::new(self.full_name.clone(), seq);
            for item in items {
                summary.merge(item.clone(), self.uid_validity);
            }
            self.notify(&FolderEvent::MessageSummaryFetched(Box::new(summary)));
        }
    }

    /// Applies a status response code.
    pub(crate) fn apply_response_code(&mut self, code: &ResponseCode) -> Result<()> {
        match code {
            ResponseCode::UidValidity(validity) => self.note_uid_validity(*validity)?,
            ResponseCode::UidNext(uid) => {
                if self.uid_next.is_none_or(|current| *uid >= current) {
                    self.uid_next = Some(*uid);
                    self.notify(&FolderEvent::UidNextChanged(*uid));
                } else {
                    tracing::warn!(
                        folder = %self.full_name,
                        old = ?self.uid_next,
                        new = uid.get(),
                        "ignoring decreasing UIDNEXT"
                    );
                }
            }
            ResponseCode::HighestModSeq(mod_seq) => {
                if self.highest_mod_seq.is_none_or(|current| *mod_seq >= current) {
                    self.highest_mod_seq = Some(*mod_seq);
                    self.notify(&FolderEvent::HighestModSeqChanged(*mod_seq));
                } else {
                    tracing::warn!(
                        folder = %self.full_name,
                        new = mod_seq.get(),
                        "ignoring decreasing HIGHESTMODSEQ"
                    );
                }
            }
            ResponseCode::NoModSeq => {
                self.highest_mod_seq = None;
            }
            ResponseCode::PermanentFlags {
                flags,
                accepts_keywords,
            } => {
                self.permanent_flags = flags.clone();
                self.accepts_custom_keywords = *accepts_keywords;
            }
            ResponseCode::Unseen(seq) => {
                self.first_unread = Some(*seq);
            }
            ResponseCode::ReadOnly => {
                if self.is_open {
                    self.access = FolderAccess::ReadOnly;
                }
            }
            ResponseCode::ReadWrite => {
                if self.is_open {
                    self.access = FolderAccess::ReadWrite;
                }
            }
            ResponseCode::AppendLimit(limit) => {
                self.append_limit = Some(*limit);
            }
            ResponseCode::MailboxId(id) => {
                if self.id.as_deref() != Some(id.as_str()) {
                    self.id = Some(id.clone());
                    self.notify(&FolderEvent::IdChanged(id.clone()));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Records an observed UIDVALIDITY.
    ///
    /// A change while the folder is open is a protocol violation and
    /// terminates the session. A change observed at open time invalidates
    /// every cached UID: subscribers receive `UidValidityChanged` followed
    /// by `DiscardCache`.
    fn note_uid_validity(&mut self, validity: UidValidity) -> Result<()> {
        match self.uid_validity {
            Some(current) if current == validity => Ok(()),
            Some(current) if self.is_open => {
                self.notify(&FolderEvent::UidValidityChanged(validity));
                self.notify(&FolderEvent::DiscardCache);
                Err(Error::Protocol(format!(
                    "UIDVALIDITY changed from {} to {} while {} was open",
                    current.get(),
                    validity.get(),
                    self.full_name
                )))
            }
            Some(_) => {
                self.uid_validity = Some(validity);
                self.notify(&FolderEvent::UidValidityChanged(validity));
                self.notify(&FolderEvent::DiscardCache);
                Ok(())
            }
            None => {
                self.uid_validity = Some(validity);
                self.notify(&FolderEvent::UidValidityChanged(validity));
                Ok(())
            }
        }
    }

    /// Applies STATUS items.
    fn apply_status(&mut self, items: &[StatusItem]) {
        for item in items {
            match item {
                StatusItem::Messages(n) => {
                    if self.count != *n {
                        self.count = *n;
                        self.notify(&FolderEvent::CountChanged(*n));
                    }
                }
                StatusItem::Recent(n) => {
                    if self.recent != *n {
                        self.recent = *n;
                        self.notify(&FolderEvent::RecentChanged(*n));
                    }
                }
                StatusItem::Unseen(n) => {
                    if self.unread != Some(*n) {
                        self.unread = Some(*n);
                        self.notify(&FolderEvent::UnreadChanged(*n));
                    }
                }
                StatusItem::UidNext(uid) => {
                    if self.uid_next.is_none_or(|current| *uid >= current) {
                        self.uid_next = Some(*uid);
                        self.notify(&FolderEvent::UidNextChanged(*uid));
                    }
                }
                StatusItem::UidValidity(validity) => {
                    // STATUS runs on unopened folders; a change discards
                    // caches but is not a violation.
                    let _ = self.note_uid_validity(*validity);
                }
                StatusItem::HighestModSeq(m) => {
                    if self.highest_mod_seq.is_none_or(|current| *m >= current) {
                        self.highest_mod_seq = Some(*m);
                        self.notify(&FolderEvent::HighestModSeqChanged(*m));
                    }
                }
                StatusItem::Size(n) => {
                    if self.size != Some(*n) {
                        self.size = Some(*n);
                        self.notify(&FolderEvent::SizeChanged(*n));
                    }
                }
                StatusItem::AppendLimit(n) => {
                    self.append_limit = Some(*n);
                }
                StatusItem::MailboxId(id) => {
                    if self.id.as_deref() != Some(id.as_str()) {
                        self.id = Some(id.clone());
                        self.notify(&FolderEvent::IdChanged(id.clone()));
                    }
                }
            }
        }
    }
}
