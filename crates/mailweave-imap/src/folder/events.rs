//! Folder change events and the observer surface.
//!
//! Folders notify observers synchronously during response dispatch, in
//! wire-arrival order, before the tagged completion that followed them is
//! surfaced to the caller. Observer callbacks must not re-enter the engine.

use crate::types::{
    Annotation, Flags, ModSeq, SeqNum, Uid, UidValidity,
};

/// A change reported by a folder.
#[derive(Debug, Clone, PartialEq)]
pub enum FolderEvent {
    /// The folder was opened (selected or examined).
    Opened,
    /// The folder was closed.
    Closed,
    /// The folder was deleted on the server.
    Deleted,
    /// The folder was renamed.
    Renamed {
        /// New parent path, if any.
        new_parent: Option<String>,
        /// New leaf name.
        new_name: String,
    },
    /// The folder was subscribed.
    Subscribed,
    /// The folder was unsubscribed.
    Unsubscribed,
    /// A message was expunged; later sequence numbers shift down by one.
    MessageExpunged {
        /// Sequence number of the removed message.
        index: SeqNum,
    },
    /// Messages vanished (QRESYNC).
    MessagesVanished {
        /// The UIDs that no longer exist.
        uids: Vec<Uid>,
        /// True when replaying history during resynchronization.
        earlier: bool,
    },
    /// A message's flags changed.
    MessageFlagsChanged {
        /// Sequence number, when known.
        index: Option<SeqNum>,
        /// UID, when the server included it.
        uid: Option<Uid>,
        /// The full new flag set.
        flags: Flags,
        /// Mod-sequence after the change.
        mod_seq: Option<ModSeq>,
    },
    /// A message's Gmail labels changed.
    MessageLabelsChanged {
        /// Sequence number, when known.
        index: Option<SeqNum>,
        /// UID, when the server included it.
        uid: Option<Uid>,
        /// The full new label set.
        labels: Vec<String>,
        /// Mod-sequence after the change.
        mod_seq: Option<ModSeq>,
    },
    /// A message's annotations changed.
    AnnotationsChanged {
        /// Sequence number, when known.
        index: Option<SeqNum>,
        /// UID, when the server included it.
        uid: Option<Uid>,
        /// The changed annotations.
        annotations: Vec<Annotation>,
        /// Mod-sequence after the change.
        mod_seq: Option<ModSeq>,
    },
    /// A message's mod-sequence advanced without other visible changes.
    ModSeqChanged {
        /// Sequence number, when known.
        index: Option<SeqNum>,
        /// UID, when the server included it.
        uid: Option<Uid>,
        /// The new mod-sequence.
        mod_seq: ModSeq,
    },
    /// A full summary arrived for a message.
    MessageSummaryFetched(Box<crate::summary::MessageSummary>),
    /// A mailbox metadata entry changed (RFC 5464).
    MetadataChanged {
        /// Entry name.
        entry: String,
        /// New value; `None` removes the entry.
        value: Option<String>,
    },
    /// HIGHESTMODSEQ advanced.
    HighestModSeqChanged(ModSeq),
    /// UIDNEXT advanced.
    UidNextChanged(Uid),
    /// UIDVALIDITY changed.
    UidValidityChanged(UidValidity),
    /// Cached UIDs for this folder are no longer valid and must be
    /// discarded. Always follows a [`FolderEvent::UidValidityChanged`]
    /// for a folder that had a prior validity.
    DiscardCache,
    /// The stable folder id changed (OBJECTID).
    IdChanged(String),
    /// The total folder size changed.
    SizeChanged(u64),
    /// The message count changed.
    CountChanged(u32),
    /// The recent count changed.
    RecentChanged(u32),
    /// The unread count changed.
    UnreadChanged(u32),
}

/// Observer of folder changes.
///
/// Callbacks fire synchronously during response dispatch and must not
/// issue engine operations.
pub trait FolderObserver: Send {
    /// Called for every folder event, in wire-arrival order.
    fn on_event(&mut self, folder: &str, event: &FolderEvent);
}

/// An observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FolderObserver for NoopObserver {
    fn on_event(&mut self, _folder: &str, _event: &FolderEvent) {}
}

/// An observer that logs events through tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl FolderObserver for LoggingObserver {
    fn on_event(&mut self, folder: &str, event: &FolderEvent) {
        match event {
            FolderEvent::MessageExpunged { index } => {
                tracing::debug!(folder, index = index.get(), "message expunged");
            }
            FolderEvent::CountChanged(count) => {
                tracing::debug!(folder, count, "count changed");
            }
            FolderEvent::UidValidityChanged(validity) => {
                tracing::info!(folder, validity = validity.get(), "uidvalidity changed");
            }
            FolderEvent::DiscardCache => {
                tracing::warn!(folder, "cached uids invalidated");
            }
            other => {
                tracing::trace!(folder, event = ?other, "folder event");
            }
        }
    }
}

/// An observer that records events for later inspection.
///
/// Useful for tests and batch processing.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: std::sync::Arc<std::sync::Mutex<Vec<(String, FolderEvent)>>>,
}

impl CollectingObserver {
    /// Creates a new collecting observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that shares this observer's event buffer.
    #[must_use]
    pub fn handle(&self) -> CollectedEvents {
        CollectedEvents {
            events: std::sync::Arc::clone(&self.events),
        }
    }
}

impl FolderObserver for CollectingObserver {
    fn on_event(&mut self, folder: &str, event: &FolderEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((folder.to_string(), event.clone()));
        }
    }
}

/// Shared view over a [`CollectingObserver`]'s buffer.
#[derive(Debug, Clone)]
pub struct CollectedEvents {
    events: std::sync::Arc<std::sync::Mutex<Vec<(String, FolderEvent)>>>,
}

impl CollectedEvents {
    /// Takes all recorded events.
    #[must_use]
    pub fn take(&self) -> Vec<(String, FolderEvent)> {
        self.events.lock().map(|mut e| std::mem::take(&mut *e)).unwrap_or_default()
    }

    /// Copies the recorded events without clearing them.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, FolderEvent)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn collecting_observer_records_in_order() {
        let mut observer = CollectingObserver::new();
        let handle = observer.handle();

        observer.on_event("INBOX", &FolderEvent::CountChanged(3));
        observer.on_event("INBOX", &FolderEvent::RecentChanged(1));

        let events = handle.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1, FolderEvent::CountChanged(3));
        assert_eq!(events[1].1, FolderEvent::RecentChanged(1));

        let taken = handle.take();
        assert_eq!(taken.len(), 2);
        assert!(handle.is_empty());
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let mut observer = NoopObserver;
        observer.on_event("INBOX", &FolderEvent::Opened);
        observer.on_event("INBOX", &FolderEvent::DiscardCache);
    }
}
