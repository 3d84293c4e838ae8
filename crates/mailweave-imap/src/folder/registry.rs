//! The folder registry: the namespace of known mailboxes.
//!
//! Folders are owned by the registry, keyed by `full_name`; the parent
//! relation is resolved through the registry rather than owned, which
//! keeps the hierarchy acyclic. At most one folder is open per session;
//! selecting a new folder implicitly closes the previous one.

use std::collections::BTreeMap;

use crate::parser::UntaggedResponse;
use crate::types::ListResponse;
use crate::{Error, Result};

use super::{FolderAccess, MailFolder};

/// Registry of known folders, keyed by full name.
#[derive(Debug, Default)]
pub struct FolderRegistry {
    folders: BTreeMap<String, MailFolder>,
    selected: Option<String>,
    opening: Option<String>,
}

impl FolderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a folder by full name.
    #[must_use]
    pub fn get(&self, full_name: &str) -> Option<&MailFolder> {
        self.folders.get(full_name)
    }

    /// Looks up a folder mutably by full name.
    pub fn get_mut(&mut self, full_name: &str) -> Option<&mut MailFolder> {
        self.folders.get_mut(full_name)
    }

    /// The currently selected folder's full name.
    #[must_use]
    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The currently selected folder.
    #[must_use]
    pub fn selected(&self) -> Option<&MailFolder> {
        self.folders.get(self.selected.as_deref()?)
    }

    /// The currently selected folder, mutably.
    pub fn selected_mut(&mut self) -> Option<&mut MailFolder> {
        let name = self.selected.clone()?;
        self.folders.get_mut(&name)
    }

    /// Iterates all known folders in name order.
    pub fn iter(&self) -> impl Iterator<Item = &MailFolder> {
        self.folders.values()
    }

    /// Number of known folders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    /// True if no folders are known yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// The parent of a folder, resolved through the registry.
    #[must_use]
    pub fn parent_of(&self, full_name: &str) -> Option<&MailFolder> {
        let folder = self.get(full_name)?;
        self.get(folder.parent_name()?)
    }

    /// Direct children of a folder.
    #[must_use]
    pub fn children_of(&self, full_name: &str) -> Vec<&MailFolder> {
        self.folders
            .values()
            .filter(|f| f.parent_name() == Some(full_name))
            .collect()
    }

    /// Inserts or refreshes a folder from a LIST response.
    pub fn upsert_list(&mut self, list: &ListResponse) -> &mut MailFolder {
        use std::collections::btree_map::Entry;

        match self.folders.entry(list.mailbox.as_str().to_string()) {
            Entry::Occupied(entry) => {
                let folder = entry.into_mut();
                folder.absorb_list(list);
                folder
            }
            Entry::Vacant(entry) => entry.insert(MailFolder::from_list(list)),
        }
    }

    /// Ensures a folder exists for the given name, creating a placeholder
    /// if the server has not listed it yet.
    pub fn ensure(&mut self, full_name: &str) -> &mut MailFolder {
        let delimiter = self
            .folders
            .values()
            .find_map(MailFolder::directory_separator);
        self.folders
            .entry(full_name.to_string())
            .or_insert_with(|| MailFolder::from_name(full_name, delimiter))
    }

    /// Starts an open: the named folder becomes the pending selection.
    ///
    /// The previously selected folder is implicitly closed now, matching
    /// the single-selected-folder invariant.
    pub fn begin_open(&mut self, full_name: &str) {
        if let Some(previous) = self.selected.take() {
            if previous != full_name {
                if let Some(folder) = self.folders.get_mut(&previous) {
                    folder.mark_closed();
                }
            } else if let Some(folder) = self.folders.get_mut(&previous) {
                // Re-selecting the same folder still closes and reopens it
                folder.mark_closed();
            }
        }
        self.ensure(full_name);
        self.opening = Some(full_name.to_string());
    }

    /// Completes a successful open with the granted access mode.
    pub fn complete_open(&mut self, access: FolderAccess) -> Result<()> {
        let name = self
            .opening
            .take()
            .ok_or_else(|| Error::InvalidState("no open in progress".to_string()))?;
        let folder = self
            .folders
            .get_mut(&name)
            .ok_or_else(|| Error::InvalidState(format!("unknown folder {name}")))?;
        folder.mark_opened(access);
        self.selected = Some(name);
        Ok(())
    }

    /// Abandons a failed open.
    pub fn abort_open(&mut self) {
        self.opening = None;
    }

    /// Closes the selected folder, if any.
    pub fn close_selected(&mut self) {
        if let Some(name) = self.selected.take() {
            if let Some(folder) = self.folders.get_mut(&name) {
                folder.mark_closed();
            }
        }
    }

    /// Removes a folder after a successful DELETE.
    pub fn remove(&mut self, full_name: &str) {
        if self.selected.as_deref() == Some(full_name) {
            self.selected = None;
        }
        if let Some(mut folder) = self.folders.remove(full_name) {
            folder.mark_deleted();
        }
    }

    /// Re-keys a folder (and its children) after a successful RENAME.
    pub fn rename(&mut self, from: &str, to: &str) {
        let mut renames: Vec<(String, String)> = Vec::new();
        for name in self.folders.keys() {
            if name == from {
                renames.push((name.clone(), to.to_string()));
            } else if let Some(folder) = self.folders.get(name) {
                if let Some(sep) = folder.directory_separator() {
                    let prefix = format!("{from}{sep}");
                    if let Some(rest) = name.strip_prefix(&prefix) {
                        renames.push((name.clone(), format!("{to}{sep}{rest}")));
                    }
                }
            }
        }

        for (old, new) in renames {
            if let Some(mut folder) = self.folders.remove(&old) {
                folder.mark_renamed(&new);
                if self.selected.as_deref() == Some(old.as_str()) {
                    self.selected = Some(new.clone());
                }
                self.folders.insert(new, folder);
            }
        }
    }

    /// Routes an untagged response into folder state.
    ///
    /// Selected-folder updates go to the open (or opening) folder; LIST,
    /// STATUS and METADATA updates are routed by mailbox name.
    pub fn apply_untagged(&mut self, response: &UntaggedResponse) -> Result<()> {
        match response {
            UntaggedResponse::List(list) | UntaggedResponse::Lsub(list) => {
                let folder = self.upsert_list(list);
                if matches!(response, UntaggedResponse::Lsub(_)) {
                    folder.mark_subscribed(true);
                }
                Ok(())
            }
            UntaggedResponse::Status { mailbox, .. }
            | UntaggedResponse::Metadata { mailbox, .. } => {
                self.ensure(mailbox.as_str()).apply_untagged(response)
            }
            UntaggedResponse::Exists(_)
            | UntaggedResponse::Recent(_)
            | UntaggedResponse::Expunge(_)
            | UntaggedResponse::Vanished { .. }
            | UntaggedResponse::Fetch { .. }
            | UntaggedResponse::Flags(_) => {
                if let Some(folder) = self.dispatch_target() {
                    folder.apply_untagged(response)
                } else {
                    tracing::debug!("dropping mailbox update with no folder selected");
                    Ok(())
                }
            }
            UntaggedResponse::Ok { code: Some(_), .. }
            | UntaggedResponse::No { code: Some(_), .. }
            | UntaggedResponse::Bad { code: Some(_), .. } => {
                if let Some(folder) = self.dispatch_target() {
                    folder.apply_untagged(response)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// The folder mailbox updates should land in: the one being opened,
    /// else the selected one.
    fn dispatch_target(&mut self) -> Option<&mut MailFolder> {
        let name = self.opening.clone().or_else(|| self.selected.clone())?;
        self.folders.get_mut(&name)
    }

    /// Clears selection state after a disconnect.
    pub fn reset_selection(&mut self) {
        self.opening = None;
        self.close_selected();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::folder::{CollectingObserver, FolderEvent};
    use crate::types::{Mailbox, MailboxAttribute};

    fn list(name: &str) -> ListResponse {
        ListResponse {
            attributes: vec![],
            delimiter: Some('/'),
            mailbox: Mailbox::new(name),
        }
    }

    #[test]
    fn upsert_and_lookup() {
        let mut registry = FolderRegistry::new();
        registry.upsert_list(&list("INBOX"));
        registry.upsert_list(&list("Work"));
        registry.upsert_list(&list("Work/Reports"));

        assert_eq!(registry.len(), 3);
        assert!(registry.get("Work/Reports").is_some());
    }

    #[test]
    fn parent_resolved_through_registry() {
        let mut registry = FolderRegistry::new();
        registry.upsert_list(&list("Work"));
        registry.upsert_list(&list("Work/Reports"));

        let parent = registry.parent_of("Work/Reports").unwrap();
        assert_eq!(parent.full_name(), "Work");

        let children = registry.children_of("Work");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].full_name(), "Work/Reports");
    }

    #[test]
    fn only_one_folder_open() {
        let mut registry = FolderRegistry::new();
        registry.upsert_list(&list("INBOX"));
        registry.upsert_list(&list("Archive"));

        registry.begin_open("INBOX");
        registry.complete_open(FolderAccess::ReadWrite).unwrap();
        assert!(registry.get("INBOX").unwrap().is_open());

        registry.begin_open("Archive");
        registry.complete_open(FolderAccess::ReadOnly).unwrap();

        assert!(!registry.get("INBOX").unwrap().is_open());
        assert!(registry.get("Archive").unwrap().is_open());
        assert_eq!(registry.selected_name(), Some("Archive"));

        let open_count = registry.iter().filter(|f| f.is_open()).count();
        assert_eq!(open_count, 1);
    }

    #[test]
    fn updates_route_to_opening_folder() {
        let mut registry = FolderRegistry::new();
        registry.upsert_list(&list("INBOX"));
        registry.begin_open("INBOX");

        registry
            .apply_untagged(&UntaggedResponse::Exists(7))
            .unwrap();
        registry.complete_open(FolderAccess::ReadWrite).unwrap();

        assert_eq!(registry.get("INBOX").unwrap().count(), 7);
    }

    #[test]
    fn ensure_creates_placeholder() {
        let mut registry = FolderRegistry::new();
        registry.upsert_list(&list("INBOX"));
        let folder = registry.ensure("Drafts");
        assert_eq!(folder.full_name(), "Drafts");
        // Placeholder inherits the known delimiter
        assert_eq!(folder.directory_separator(), Some('/'));
    }

    #[test]
    fn rename_rekeys_children() {
        let mut registry = FolderRegistry::new();
        registry.upsert_list(&list("Work"));
        registry.upsert_list(&list("Work/Reports"));
        registry.upsert_list(&list("Work/Reports/2026"));

        registry.rename("Work", "Projects");

        assert!(registry.get("Work").is_none());
        assert!(registry.get("Projects").is_some());
        assert!(registry.get("Projects/Reports").is_some());
        assert!(registry.get("Projects/Reports/2026").is_some());
    }

    #[test]
    fn remove_emits_deleted() {
        let mut registry = FolderRegistry::new();
        registry.upsert_list(&list("Trash"));

        let observer = CollectingObserver::new();
        let handle = observer.handle();
        registry
            .get_mut("Trash")
            .unwrap()
            .add_observer(Box::new(observer));

        registry.remove("Trash");
        assert!(registry.get("Trash").is_none());
        assert_eq!(handle.take()[0].1, FolderEvent::Deleted);
    }

    #[test]
    fn lsub_marks_subscribed() {
        let mut registry = FolderRegistry::new();
        registry
            .apply_untagged(&UntaggedResponse::Lsub(list("Letters")))
            .unwrap();
        assert!(registry.get("Letters").unwrap().is_subscribed());
    }

    #[test]
    fn special_use_attribute_survives_upsert() {
        let mut registry = FolderRegistry::new();
        registry.upsert_list(&ListResponse {
            attributes: vec![MailboxAttribute::Trash],
            delimiter: Some('/'),
            mailbox: Mailbox::new("Deleted Items"),
        });
        assert_eq!(
            registry.get("Deleted Items").unwrap().special_use(),
            Some(MailboxAttribute::Trash)
        );
    }
}
