//! IMAP command builder.
//!
//! Commands encode to wire segments; synchronizing literals introduce wait
//! points where the engine pauses for a `+` continuation before sending
//! the payload.

mod serialize;
mod tag_generator;
mod types;

use chrono::{DateTime, FixedOffset};

use crate::qresync::QresyncParams;
use crate::request::{SearchOptions, SearchQuery, SortKey, ThreadingAlgorithm};
use crate::summary::format_internal_date;
use crate::types::{Annotation, Flag, Mailbox, MailboxAttribute, ModSeq, SequenceSet, UidSet};

pub use serialize::{CommandWriter, EncodedCommand, LiteralMode, Segment};
pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, StatusAttribute, StoreSpec, StoreTarget};

use serialize::{
    write_fetch_attributes, write_flag_list, write_search_query, write_sort_keys,
    write_store_spec,
};

/// One message of an APPEND (or the payload of a REPLACE).
#[derive(Debug, Clone, PartialEq)]
pub struct AppendData {
    /// Flags to set on the stored message.
    pub flags: Vec<Flag>,
    /// INTERNALDATE to record.
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// Annotations to attach (RFC 5257 APPEND extension).
    pub annotations: Vec<Annotation>,
    /// The message octets.
    pub message: Vec<u8>,
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command, optionally with a SASL-IR initial response.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Initial response (base64), when SASL-IR is available.
        initial_response: Option<String>,
    },

    // Authenticated State Commands
    /// ID command (RFC 2971).
    Id {
        /// Client identification field/value pairs; `None` sends `ID NIL`.
        parameters: Option<Vec<(String, String)>>,
    },
    /// ENABLE command (RFC 5161).
    Enable {
        /// Capability tokens to enable.
        capabilities: Vec<String>,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
        /// Request CONDSTORE mod-sequence tracking.
        condstore: bool,
        /// QRESYNC resynchronization parameters.
        qresync: Option<QresyncParams>,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
        /// Request CONDSTORE mod-sequence tracking.
        condstore: bool,
        /// QRESYNC resynchronization parameters.
        qresync: Option<QresyncParams>,
    },
    /// CREATE command, optionally with SPECIAL-USE attributes (RFC 6154).
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
        /// Requested special-use roles.
        use_attributes: Vec<MailboxAttribute>,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: Mailbox,
    },
    /// RENAME command.
    Rename {
        /// Current mailbox name.
        from: Mailbox,
        /// New mailbox name.
        to: Mailbox,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Mailbox to subscribe.
        mailbox: Mailbox,
    },
    /// UNSUBSCRIBE command.
    Unsubscribe {
        /// Mailbox to unsubscribe.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// LSUB command.
    Lsub {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items to request.
        items: Vec<StatusAttribute>,
    },
    /// APPEND command; more than one message uses MULTIAPPEND (RFC 3502).
    Append {
        /// Target mailbox.
        mailbox: Mailbox,
        /// Messages to append.
        messages: Vec<AppendData>,
    },

    // Selected State Commands
    /// CHECK command.
    Check,
    /// CLOSE command.
    Close,
    /// UNSELECT command (RFC 3691).
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315 UIDPLUS).
    UidExpunge {
        /// UIDs to expunge.
        uids: UidSet,
    },
    /// SEARCH command.
    Search {
        /// Search criteria.
        query: SearchQuery,
        /// Use UIDs.
        uid: bool,
        /// ESEARCH return options.
        options: SearchOptions,
        /// Charset declaration; only present for non-ASCII terms.
        charset: Option<String>,
    },
    /// SORT command (RFC 5256).
    Sort {
        /// Ordering keys.
        keys: Vec<SortKey>,
        /// Search criteria selecting the messages to sort.
        query: SearchQuery,
        /// Use UIDs.
        uid: bool,
        /// Charset; mandatory in the SORT grammar.
        charset: String,
        /// ESEARCH-style return options (ESORT).
        options: SearchOptions,
    },
    /// THREAD command (RFC 5256).
    Thread {
        /// Threading algorithm.
        algorithm: ThreadingAlgorithm,
        /// Search criteria selecting the messages to thread.
        query: SearchQuery,
        /// Use UIDs.
        uid: bool,
        /// Charset; mandatory in the THREAD grammar.
        charset: String,
    },
    /// FETCH command.
    Fetch {
        /// Sequence or UID set.
        set: SequenceSet,
        /// Use UIDs.
        uid: bool,
        /// Items to fetch.
        attributes: Vec<FetchAttribute>,
        /// CHANGEDSINCE modifier (CONDSTORE).
        changed_since: Option<ModSeq>,
    },
    /// STORE command (flags, labels or annotations).
    Store {
        /// Sequence or UID set.
        set: SequenceSet,
        /// Use UIDs.
        uid: bool,
        /// The mutation.
        spec: StoreSpec,
    },
    /// COPY command.
    Copy {
        /// Sequence or UID set.
        set: SequenceSet,
        /// Use UIDs.
        uid: bool,
        /// Target mailbox.
        mailbox: Mailbox,
    },
    /// MOVE command (RFC 6851).
    Move {
        /// Sequence or UID set.
        set: SequenceSet,
        /// Use UIDs.
        uid: bool,
        /// Target mailbox.
        mailbox: Mailbox,
    },
    /// REPLACE command (RFC 8508).
    Replace {
        /// Message to replace (single sequence number or UID).
        target: u32,
        /// Use UIDs.
        uid: bool,
        /// Mailbox receiving the replacement.
        mailbox: Mailbox,
        /// The replacement message.
        message: AppendData,
    },
    /// IDLE command (RFC 2177).
    Idle,
    /// DONE (to end IDLE; sent without a tag).
    Done,
}

impl Command {
    /// A short wire name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Id { .. } => "ID",
            Self::Enable { .. } => "ENABLE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { .. } => "SEARCH",
            Self::Sort { .. } => "SORT",
            Self::Thread { .. } => "THREAD",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Move { .. } => "MOVE",
            Self::Replace { .. } => "REPLACE",
            Self::Idle => "IDLE",
            Self::Done => "DONE",
        }
    }

    /// Encodes the command under the given tag and literal mode.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn encode(&self, tag: &str, mode: LiteralMode) -> EncodedCommand {
        let mut w = CommandWriter::new(mode);

        // DONE doesn't get a tag (it terminates IDLE)
        if !matches!(self, Self::Done) {
            w.put_str(tag);
            w.put_space();
        }

        match self {
            Self::Capability => w.put_str("CAPABILITY"),
            Self::Noop => w.put_str("NOOP"),
            Self::Logout => w.put_str("LOGOUT"),
            Self::StartTls => w.put_str("STARTTLS"),

            Self::Login { username, password } => {
                w.put_str("LOGIN ");
                w.put_astring(username);
                w.put_space();
                w.put_astring(password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                w.put_str("AUTHENTICATE ");
                w.put_str(mechanism);
                if let Some(resp) = initial_response {
                    w.put_space();
                    w.put_str(resp);
                }
            }

            Self::Id { parameters } => {
                w.put_str("ID ");
                if let Some(params) = parameters {
                    w.put(b"(");
                    for (i, (key, value)) in params.iter().enumerate() {
                        if i > 0 {
                            w.put_space();
                        }
                        w.put_astring(key);
                        w.put_space();
                        w.put_astring(value);
                    }
                    w.put(b")");
                } else {
                    w.put_str("NIL");
                }
            }

            Self::Enable { capabilities } => {
                w.put_str("ENABLE");
                for cap in capabilities {
                    w.put_space();
                    w.put_str(cap);
                }
            }

            Self::Select {
                mailbox,
                condstore,
                qresync,
            }
            | Self::Examine {
                mailbox,
                condstore,
                qresync,
            } => {
                if matches!(self, Self::Select { .. }) {
                    w.put_str("SELECT ");
                } else {
                    w.put_str("EXAMINE ");
                }
                w.put_mailbox(mailbox);
                if let Some(params) = qresync {
                    w.put_space();
                    w.put_str(&params.serialize());
                } else if *condstore {
                    w.put_str(" (CONDSTORE)");
                }
            }

            Self::Create {
                mailbox,
                use_attributes,
            } => {
                w.put_str("CREATE ");
                w.put_mailbox(mailbox);
                if !use_attributes.is_empty() {
                    w.put_str(" (USE (");
                    for (i, attr) in use_attributes.iter().enumerate() {
                        if i > 0 {
                            w.put_space();
                        }
                        w.put_str(attr.as_str());
                    }
                    w.put_str("))");
                }
            }

            Self::Delete { mailbox } => {
                w.put_str("DELETE ");
                w.put_mailbox(mailbox);
            }

            Self::Rename { from, to } => {
                w.put_str("RENAME ");
                w.put_mailbox(from);
                w.put_space();
                w.put_mailbox(to);
            }

            Self::Subscribe { mailbox } => {
                w.put_str("SUBSCRIBE ");
                w.put_mailbox(mailbox);
            }

            Self::Unsubscribe { mailbox } => {
                w.put_str("UNSUBSCRIBE ");
                w.put_mailbox(mailbox);
            }

            Self::List { reference, pattern } | Self::Lsub { reference, pattern } => {
                if matches!(self, Self::List { .. }) {
                    w.put_str("LIST ");
                } else {
                    w.put_str("LSUB ");
                }
                w.put_astring(reference);
                w.put_space();
                w.put_astring(pattern);
            }

            Self::Status { mailbox, items } => {
                w.put_str("STATUS ");
                w.put_mailbox(mailbox);
                w.put_str(" (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        w.put_space();
                    }
                    w.put_str(item.as_str());
                }
                w.put(b")");
            }

            Self::Append { mailbox, messages } => {
                w.put_str("APPEND ");
                w.put_mailbox(mailbox);
                for message in messages {
                    write_append_data(&mut w, message);
                }
            }

            Self::Check => w.put_str("CHECK"),
            Self::Close => w.put_str("CLOSE"),
            Self::Unselect => w.put_str("UNSELECT"),
            Self::Expunge => w.put_str("EXPUNGE"),

            Self::UidExpunge { uids } => {
                w.put_str("UID EXPUNGE ");
                w.put_str(&uids.to_string());
            }

            Self::Search {
                query,
                uid,
                options,
                charset,
            } => {
                if *uid {
                    w.put_str("UID ");
                }
                w.put_str("SEARCH ");
                if !options.is_empty() {
                    w.put_str("RETURN (");
                    write_search_options(&mut w, options);
                    w.put_str(") ");
                }
                if let Some(cs) = charset {
                    w.put_str("CHARSET ");
                    w.put_str(cs);
                    w.put_space();
                }
                write_search_query(&mut w, query);
            }

            Self::Sort {
                keys,
                query,
                uid,
                charset,
                options,
            } => {
                if *uid {
                    w.put_str("UID ");
                }
                w.put_str("SORT ");
                if !options.is_empty() {
                    w.put_str("RETURN (");
                    write_search_options(&mut w, options);
                    w.put_str(") ");
                }
                write_sort_keys(&mut w, keys);
                w.put_space();
                w.put_str(charset);
                w.put_space();
                write_search_query(&mut w, query);
            }

            Self::Thread {
                algorithm,
                query,
                uid,
                charset,
            } => {
                if *uid {
                    w.put_str("UID ");
                }
                w.put_str("THREAD ");
                w.put_str(algorithm.as_str());
                w.put_space();
                w.put_str(charset);
                w.put_space();
                write_search_query(&mut w, query);
            }

            Self::Fetch {
                set,
                uid,
                attributes,
                changed_since,
            } => {
                if *uid {
                    w.put_str("UID ");
                }
                w.put_str("FETCH ");
                w.put_str(&set.to_string());
                w.put_space();
                write_fetch_attributes(&mut w, attributes);
                if let Some(modseq) = changed_since {
                    w.put_str(&format!(" (CHANGEDSINCE {modseq})"));
                }
            }

            Self::Store { set, uid, spec } => {
                if *uid {
                    w.put_str("UID ");
                }
                w.put_str("STORE ");
                w.put_str(&set.to_string());
                w.put_space();
                write_store_spec(&mut w, spec);
            }

            Self::Copy { set, uid, mailbox } => {
                if *uid {
                    w.put_str("UID ");
                }
                w.put_str("COPY ");
                w.put_str(&set.to_string());
                w.put_space();
                w.put_mailbox(mailbox);
            }

            Self::Move { set, uid, mailbox } => {
                if *uid {
                    w.put_str("UID ");
                }
                w.put_str("MOVE ");
                w.put_str(&set.to_string());
                w.put_space();
                w.put_mailbox(mailbox);
            }

            Self::Replace {
                target,
                uid,
                mailbox,
                message,
            } => {
                if *uid {
                    w.put_str("UID ");
                }
                w.put_str("REPLACE ");
                w.put_str(&target.to_string());
                w.put_space();
                w.put_mailbox(mailbox);
                write_append_data(&mut w, message);
            }

            Self::Idle => w.put_str("IDLE"),
            Self::Done => w.put_str("DONE"),
        }

        w.finish()
    }

    /// Convenience encoding for commands without synchronizing literals.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        self.encode(tag, LiteralMode::NonSynchronizing).to_bytes()
    }
}

/// Writes one append-data group: flags, date, annotations, literal.
fn write_append_data(w: &mut CommandWriter, data: &AppendData) {
    if !data.flags.is_empty() {
        w.put_space();
        write_flag_list(w, &data.flags);
    }
    if let Some(date) = &data.internal_date {
        w.put_space();
        w.put(b"\"");
        w.put_str(&format_internal_date(date));
        w.put(b"\"");
    }
    if !data.annotations.is_empty() {
        w.put_str(" ANNOTATION ");
        serialize::write_annotation_list(w, &data.annotations);
    }
    w.put_space();
    w.put_literal(&data.message);
}

fn write_search_options(w: &mut CommandWriter, options: &SearchOptions) {
    let mut first = true;
    let mut item = |w: &mut CommandWriter, name: &str| {
        if !first {
            w.put_space();
        }
        w.put_str(name);
        first = false;
    };
    if options.min {
        item(w, "MIN");
    }
    if options.max {
        item(w, "MAX");
    }
    if options.all {
        item(w, "ALL");
    }
    if options.count {
        item(w, "COUNT");
    }
    if options.save {
        item(w, "SAVE");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::request::StoreMode;
    use crate::types::{Uid, UidValidity};

    #[test]
    fn capability_command() {
        let cmd = Command::Capability;
        assert_eq!(cmd.serialize("A001"), b"A001 CAPABILITY\r\n");
    }

    #[test]
    fn login_command() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert_eq!(cmd.serialize("A001"), b"A001 LOGIN user pass\r\n");
    }

    #[test]
    fn login_quoted() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word".to_string(),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 LOGIN user@example.com \"pass word\"\r\n"
        );
    }

    #[test]
    fn authenticate_with_initial_response() {
        let cmd = Command::Authenticate {
            mechanism: "PLAIN".to_string(),
            initial_response: Some("AGJvYgBzZWNyZXQ=".to_string()),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 AUTHENTICATE PLAIN AGJvYgBzZWNyZXQ=\r\n"
        );
    }

    #[test]
    fn select_plain() {
        let cmd = Command::Select {
            mailbox: Mailbox::inbox(),
            condstore: false,
            qresync: None,
        };
        assert_eq!(cmd.serialize("A001"), b"A001 SELECT INBOX\r\n");
    }

    #[test]
    fn select_condstore() {
        let cmd = Command::Select {
            mailbox: Mailbox::inbox(),
            condstore: true,
            qresync: None,
        };
        assert_eq!(cmd.serialize("A001"), b"A001 SELECT INBOX (CONDSTORE)\r\n");
    }

    #[test]
    fn select_qresync() {
        let params = QresyncParams::new(
            UidValidity::new(67_890_007).unwrap(),
            ModSeq::from_u64(90_060_115).unwrap(),
        );
        let cmd = Command::Select {
            mailbox: Mailbox::inbox(),
            condstore: false,
            qresync: Some(params),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 SELECT INBOX (QRESYNC (67890007 90060115))\r\n"
        );
    }

    #[test]
    fn create_with_special_use() {
        let cmd = Command::Create {
            mailbox: Mailbox::new("Everything"),
            use_attributes: vec![MailboxAttribute::Archive],
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 CREATE Everything (USE (\\Archive))\r\n"
        );
    }

    #[test]
    fn status_command() {
        let cmd = Command::Status {
            mailbox: Mailbox::new("Archive"),
            items: vec![StatusAttribute::Messages, StatusAttribute::UidNext],
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 STATUS Archive (MESSAGES UIDNEXT)\r\n"
        );
    }

    #[test]
    fn fetch_command() {
        let cmd = Command::Fetch {
            set: SequenceSet::range(1, 10).unwrap(),
            uid: false,
            attributes: vec![FetchAttribute::Flags, FetchAttribute::Uid],
            changed_since: None,
        };
        assert_eq!(cmd.serialize("A001"), b"A001 FETCH 1:10 (FLAGS UID)\r\n");
    }

    #[test]
    fn uid_fetch_changed_since() {
        let cmd = Command::Fetch {
            set: SequenceSet::All,
            uid: true,
            attributes: vec![FetchAttribute::Flags],
            changed_since: ModSeq::from_u64(12345),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 UID FETCH * FLAGS (CHANGEDSINCE 12345)\r\n"
        );
    }

    #[test]
    fn store_command() {
        let cmd = Command::Store {
            set: SequenceSet::single(1).unwrap(),
            uid: false,
            spec: StoreSpec {
                mode: StoreMode::Add,
                target: StoreTarget::Flags(vec![Flag::Seen]),
                silent: true,
                unchanged_since: None,
            },
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 STORE 1 +FLAGS.SILENT (\\Seen)\r\n"
        );
    }

    #[test]
    fn uid_store_unchanged_since() {
        let cmd = Command::Store {
            set: SequenceSet::range(5, 6).unwrap(),
            uid: true,
            spec: StoreSpec {
                mode: StoreMode::Add,
                target: StoreTarget::Flags(vec![Flag::Deleted]),
                silent: false,
                unchanged_since: ModSeq::from_u64(700),
            },
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 UID STORE 5:6 (UNCHANGEDSINCE 700) +FLAGS (\\Deleted)\r\n"
        );
    }

    #[test]
    fn search_with_options_and_charset() {
        let cmd = Command::Search {
            query: SearchQuery::Unseen,
            uid: true,
            options: SearchOptions {
                min: true,
                count: true,
                ..SearchOptions::default()
            },
            charset: Some("UTF-8".to_string()),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 UID SEARCH RETURN (MIN COUNT) CHARSET UTF-8 UNSEEN\r\n"
        );
    }

    #[test]
    fn sort_command() {
        let cmd = Command::Sort {
            keys: vec![SortKey::Subject],
            query: SearchQuery::All,
            uid: true,
            charset: "US-ASCII".to_string(),
            options: SearchOptions::default(),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 UID SORT (SUBJECT) US-ASCII ALL\r\n"
        );
    }

    #[test]
    fn thread_command() {
        let cmd = Command::Thread {
            algorithm: ThreadingAlgorithm::References,
            query: SearchQuery::All,
            uid: true,
            charset: "US-ASCII".to_string(),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 UID THREAD REFERENCES US-ASCII ALL\r\n"
        );
    }

    #[test]
    fn append_literal_waits_for_continuation() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("Drafts"),
            messages: vec![AppendData {
                flags: vec![Flag::Draft],
                internal_date: None,
                annotations: vec![],
                message: b"From: me\r\n\r\nbody".to_vec(),
            }],
        };
        let enc = cmd.encode("A003", LiteralMode::Synchronizing);
        assert!(enc.needs_continuation());
        assert_eq!(
            enc.segments[0],
            Segment::Data(b"A003 APPEND Drafts (\\Draft) {16}\r\n".to_vec())
        );
        assert_eq!(enc.segments[1], Segment::WaitForContinuation);
        assert_eq!(
            enc.segments[2],
            Segment::Data(b"From: me\r\n\r\nbody\r\n".to_vec())
        );
    }

    #[test]
    fn append_literal_plus_is_single_shot() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("Drafts"),
            messages: vec![AppendData {
                flags: vec![],
                internal_date: None,
                annotations: vec![],
                message: b"hello".to_vec(),
            }],
        };
        let enc = cmd.encode("A003", LiteralMode::NonSynchronizing);
        assert!(!enc.needs_continuation());
        assert_eq!(enc.to_bytes(), b"A003 APPEND Drafts {5+}\r\nhello\r\n");
    }

    #[test]
    fn multiappend_groups() {
        let cmd = Command::Append {
            mailbox: Mailbox::inbox(),
            messages: vec![
                AppendData {
                    flags: vec![],
                    internal_date: None,
                    annotations: vec![],
                    message: b"one".to_vec(),
                },
                AppendData {
                    flags: vec![Flag::Seen],
                    internal_date: None,
                    annotations: vec![],
                    message: b"two".to_vec(),
                },
            ],
        };
        assert_eq!(
            cmd.serialize("A004"),
            b"A004 APPEND INBOX {3+}\r\none (\\Seen) {3+}\r\ntwo\r\n"
        );
    }

    #[test]
    fn replace_command() {
        let cmd = Command::Replace {
            target: 45,
            uid: true,
            mailbox: Mailbox::inbox(),
            message: AppendData {
                flags: vec![],
                internal_date: None,
                annotations: vec![],
                message: b"fixed".to_vec(),
            },
        };
        assert_eq!(
            cmd.serialize("A005"),
            b"A005 UID REPLACE 45 INBOX {5+}\r\nfixed\r\n"
        );
    }

    #[test]
    fn uid_expunge_command() {
        let cmd = Command::UidExpunge {
            uids: UidSet::range(Uid::new(100).unwrap(), Uid::new(200).unwrap()),
        };
        assert_eq!(cmd.serialize("A001"), b"A001 UID EXPUNGE 100:200\r\n");
    }

    #[test]
    fn id_command_nil() {
        let cmd = Command::Id { parameters: None };
        assert_eq!(cmd.serialize("A001"), b"A001 ID NIL\r\n");
    }

    #[test]
    fn enable_command() {
        let cmd = Command::Enable {
            capabilities: vec!["QRESYNC".to_string(), "CONDSTORE".to_string()],
        };
        assert_eq!(cmd.serialize("A001"), b"A001 ENABLE QRESYNC CONDSTORE\r\n");
    }

    #[test]
    fn idle_and_done() {
        assert_eq!(Command::Idle.serialize("A001"), b"A001 IDLE\r\n");
        assert_eq!(Command::Done.serialize(""), b"DONE\r\n");
    }
}
