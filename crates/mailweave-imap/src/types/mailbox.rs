//! Mailbox naming and LIST attributes.

/// Mailbox name.
///
/// Server-authoritative full path, hierarchy encoded with the directory
/// separator the server reports in LIST.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The INBOX mailbox (case-insensitive per RFC).
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this names the INBOX.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0.eq_ignore_ascii_case("INBOX")
    }

    /// The leaf name, given the hierarchy separator.
    #[must_use]
    pub fn leaf(&self, separator: Option<char>) -> &str {
        match separator {
            Some(sep) => self.0.rsplit(sep).next().unwrap_or(&self.0),
            None => &self.0,
        }
    }

    /// The parent path, given the hierarchy separator.
    #[must_use]
    pub fn parent(&self, separator: Option<char>) -> Option<&str> {
        let sep = separator?;
        let idx = self.0.rfind(sep)?;
        if idx == 0 { None } else { Some(&self.0[..idx]) }
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mailbox attributes from LIST responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// Mailbox cannot be selected.
    NoSelect,
    /// Mailbox cannot have children.
    NoInferiors,
    /// Mailbox has no children.
    HasNoChildren,
    /// Mailbox has children.
    HasChildren,
    /// Mailbox is marked for attention.
    Marked,
    /// Mailbox is not marked.
    Unmarked,
    /// Mailbox is subscribed (LIST-EXTENDED).
    Subscribed,
    /// Mailbox resides on a remote server (LIST-EXTENDED).
    Remote,
    /// Mailbox does not exist (LIST-EXTENDED).
    NonExistent,
    // SPECIAL-USE mailbox attributes (RFC 6154)
    /// All messages (virtual mailbox).
    All,
    /// Mailbox is the archive folder.
    Archive,
    /// Mailbox is the drafts folder.
    Drafts,
    /// Flagged/starred messages (virtual mailbox).
    Flagged,
    /// Mailbox is the junk/spam folder.
    Junk,
    /// Mailbox is the sent folder.
    Sent,
    /// Mailbox is the trash folder.
    Trash,
    /// Important messages (RFC 8457).
    Important,
    /// The inbox role, as some servers advertise it explicitly.
    Inbox,
}

impl MailboxAttribute {
    /// Parses a mailbox attribute string.
    ///
    /// Unrecognized attributes yield `None`; LIST responses keep them out
    /// of the typed set rather than failing the whole line.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let attr = match s.to_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\SUBSCRIBED" => Self::Subscribed,
            "\\REMOTE" => Self::Remote,
            "\\NONEXISTENT" => Self::NonExistent,
            // RFC 6154 SPECIAL-USE
            "\\ALL" => Self::All,
            "\\ARCHIVE" => Self::Archive,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            // RFC 8457
            "\\IMPORTANT" => Self::Important,
            "\\INBOX" => Self::Inbox,
            _ => return None,
        };
        Some(attr)
    }

    /// Returns the wire form of the attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSelect => "\\Noselect",
            Self::NoInferiors => "\\Noinferiors",
            Self::HasNoChildren => "\\HasNoChildren",
            Self::HasChildren => "\\HasChildren",
            Self::Marked => "\\Marked",
            Self::Unmarked => "\\Unmarked",
            Self::Subscribed => "\\Subscribed",
            Self::Remote => "\\Remote",
            Self::NonExistent => "\\NonExistent",
            Self::All => "\\All",
            Self::Archive => "\\Archive",
            Self::Drafts => "\\Drafts",
            Self::Flagged => "\\Flagged",
            Self::Junk => "\\Junk",
            Self::Sent => "\\Sent",
            Self::Trash => "\\Trash",
            Self::Important => "\\Important",
            Self::Inbox => "\\Inbox",
        }
    }

    /// Returns true for a SPECIAL-USE role attribute.
    #[must_use]
    pub const fn is_special_use(self) -> bool {
        matches!(
            self,
            Self::All
                | Self::Archive
                | Self::Drafts
                | Self::Flagged
                | Self::Junk
                | Self::Sent
                | Self::Trash
                | Self::Important
                | Self::Inbox
        )
    }
}

/// LIST/LSUB response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_detection() {
        assert!(Mailbox::inbox().is_inbox());
        assert!(Mailbox::new("inbox").is_inbox());
        assert!(!Mailbox::new("Sent").is_inbox());
    }

    #[test]
    fn leaf_and_parent() {
        let mb = Mailbox::new("Work/Projects/2026");
        assert_eq!(mb.leaf(Some('/')), "2026");
        assert_eq!(mb.parent(Some('/')), Some("Work/Projects"));
        assert_eq!(Mailbox::new("INBOX").parent(Some('/')), None);
        assert_eq!(Mailbox::new("flat").leaf(None), "flat");
    }

    #[test]
    fn parse_core_attributes() {
        assert_eq!(
            MailboxAttribute::parse("\\NoSelect"),
            Some(MailboxAttribute::NoSelect)
        );
        assert_eq!(
            MailboxAttribute::parse("\\HasChildren"),
            Some(MailboxAttribute::HasChildren)
        );
        assert_eq!(
            MailboxAttribute::parse("\\Noinferiors"),
            Some(MailboxAttribute::NoInferiors)
        );
    }

    #[test]
    fn parse_special_use() {
        assert_eq!(
            MailboxAttribute::parse("\\Trash"),
            Some(MailboxAttribute::Trash)
        );
        assert_eq!(
            MailboxAttribute::parse("\\Spam"),
            Some(MailboxAttribute::Junk)
        );
        assert!(MailboxAttribute::Trash.is_special_use());
        assert!(!MailboxAttribute::Marked.is_special_use());
    }

    #[test]
    fn parse_unknown_is_none() {
        assert_eq!(MailboxAttribute::parse("\\XCustom"), None);
    }
}
