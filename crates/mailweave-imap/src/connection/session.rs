//! The session driver.
//!
//! A [`Session`] owns the transport and the sans-I/O engine, drives
//! commands to completion, and routes untagged updates into the folder
//! registry (whose observers fire before any completion is surfaced).
//! All operations are `&mut self`: one logical executor drives the wire,
//! and callers on multiple threads serialize through an outer mutex.
//!
//! Cancellation is by disconnect: IMAP has no selective command abort,
//! so a cancellation observed after bytes hit the wire tears the session
//! down. The exception is IDLE, which ends with DONE (see
//! [`super::idle::IdleHandle`]).

use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::{
    AppendData, Command, FetchAttribute, StatusAttribute, StoreSpec, StoreTarget,
};
use crate::folder::{FolderAccess, FolderObserver, FolderRegistry, MailFolder};
use crate::protocol::{CommandHandle, CommandResult, Engine, EngineEvent, SessionState};
use crate::qresync::SyncState;
use crate::quirks::ServerType;
use crate::request::{
    AppendRequest, FetchRequest, SearchOptions, SearchQuery, SortKey, StoreFlagsRequest,
    StoreLabelsRequest, ThreadingAlgorithm,
};
use crate::summary::{MessageSummary, MessageThread, SearchResults};
use crate::types::{
    Annotation, AnnotationAccess, AnnotationScope, Capability, Mailbox, MailboxAttribute, ModSeq,
    ResponseCode, SeqNum, SequenceSet, Status, Uid, UidSet, UidValidity, UniqueId, UniqueIdMap,
};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::{Error, Result};

use super::config::{Config, Security};
use super::framed::FramedStream;
use super::sasl::SaslMechanism;
use super::stream::{self, ImapStream};

/// Observer of byte-transfer progress.
pub trait TransferProgress: Send {
    /// Called after each transferred chunk.
    fn on_progress(&mut self, transferred: u64, total: Option<u64>);
}

/// Outcome of an I/O attempt, resolved outside the select so the handler
/// may mutate the session.
enum IoOutcome<T> {
    Done(T),
    Cancelled,
    TimedOut,
    Failed(Error),
}

/// An authenticated, full-duplex IMAP session.
pub struct Session<S = ImapStream> {
    pub(crate) framed: FramedStream<S>,
    pub(crate) engine: Engine,
    pub(crate) folders: FolderRegistry,
    pub(crate) config: Config,
    pub(crate) server_type: ServerType,
    pub(crate) greeting_text: Option<String>,
    pub(crate) expecting_bye: bool,
}

impl Session<ImapStream> {
    /// Connects the transport and consumes the greeting.
    ///
    /// For `Security::StartTls` the connection is upgraded before this
    /// returns; capabilities are re-queried across the TLS boundary.
    ///
    /// # Errors
    ///
    /// Connection, TLS or greeting failures; a `BYE` greeting surfaces as
    /// [`Error::Bye`].
    pub async fn connect(config: Config) -> Result<Self> {
        let transport = stream::connect(&config).await?;
        let wants_starttls = config.security == Security::StartTls;
        let mut session = Self::from_stream(transport, config).await?;
        if wants_starttls {
            session = session.upgrade_tls().await?;
        }
        Ok(session)
    }

    /// Issues STARTTLS and upgrades the transport.
    async fn upgrade_tls(mut self) -> Result<Self> {
        if !self.engine.has_capability(&Capability::StartTls) {
            return Err(Error::CapabilityUnavailable("STARTTLS".to_string()));
        }

        let result = self.run(&Command::StartTls).await?;
        self.finish(result)?;

        let Self {
            framed,
            engine,
            folders,
            config,
            server_type,
            greeting_text,
            expecting_bye,
        } = self;

        // No second greeting follows STARTTLS; the session stays in
        // NotAuthenticated with the capability registry cleared.
        let upgraded = framed.into_inner().upgrade_to_tls(&config.host).await?;

        let mut session = Self {
            framed: FramedStream::new(upgraded),
            engine,
            folders,
            config,
            server_type,
            greeting_text,
            expecting_bye,
        };
        session.refresh_capabilities().await?;
        Ok(session)
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Builds a session over an established transport and consumes the
    /// server greeting.
    ///
    /// # Errors
    ///
    /// Greeting parse failures are protocol violations; a `BYE` greeting
    /// is [`Error::Bye`].
    pub async fn from_stream(transport: S, config: Config) -> Result<Self> {
        let mut session = Self {
            framed: FramedStream::new(transport),
            engine: Engine::new(),
            folders: FolderRegistry::new(),
            config,
            server_type: ServerType::Unknown,
            greeting_text: None,
            expecting_bye: false,
        };
        session.engine.connect_started();

        let bytes = session.read_response_raw().await?;
        let events = session.dispatch(&bytes)?;

        let Some(EngineEvent::Greeting { status, text, .. }) = events.into_iter().next() else {
            session.teardown();
            return Err(Error::Protocol("expected server greeting".to_string()));
        };

        if status == Status::Bye {
            return Err(Error::Bye(text));
        }

        session.greeting_text = Some(text);

        if session.engine.capabilities().is_empty() {
            session.refresh_capabilities().await?;
        }
        session.server_type = ServerType::detect(
            session.engine.capabilities(),
            session.greeting_text.as_deref(),
        );

        Ok(session)
    }

    // === Introspection ===

    /// The current session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        self.engine.state()
    }

    /// The server capabilities as last advertised.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        self.engine.capabilities()
    }

    /// Checks a capability gate.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.engine.has_capability(cap)
    }

    /// The detected server family.
    #[must_use]
    pub const fn server_type(&self) -> ServerType {
        self.server_type
    }

    /// The greeting text the server sent.
    #[must_use]
    pub fn greeting(&self) -> Option<&str> {
        self.greeting_text.as_deref()
    }

    /// Looks up a known folder.
    #[must_use]
    pub fn folder(&self, full_name: &str) -> Option<&MailFolder> {
        self.folders.get(full_name)
    }

    /// Iterates all known folders.
    pub fn folders(&self) -> impl Iterator<Item = &MailFolder> {
        self.folders.iter()
    }

    /// The currently selected folder.
    #[must_use]
    pub fn selected_folder(&self) -> Option<&MailFolder> {
        self.folders.selected()
    }

    /// Subscribes an observer to a folder's events.
    ///
    /// The folder is created as a placeholder if the server has not
    /// listed it yet, so observers can be attached before the first open.
    pub fn add_observer(&mut self, full_name: &str, observer: Box<dyn FolderObserver>) {
        self.folders.ensure(full_name).add_observer(observer);
    }

    /// Captures QRESYNC state from the selected folder.
    #[must_use]
    pub fn sync_state(&self) -> Option<SyncState> {
        self.folders.selected().and_then(MailFolder::sync_state)
    }

    // === Authentication ===

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Fails client-side when the server advertises LOGINDISABLED.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.require_state(|s| matches!(s, SessionState::NotAuthenticated), "login")?;
        if self.has_capability(&Capability::LoginDisabled) {
            return Err(Error::CapabilityUnavailable("LOGINDISABLED".to_string()));
        }
        if username.is_empty() {
            return Err(Error::Argument("empty username".to_string()));
        }

        let result = self
            .run(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.finish(result)?;
        self.ensure_capabilities().await
    }

    /// Authenticates with a SASL mechanism.
    ///
    /// The exchange forwards opaque base64 tokens between server and
    /// mechanism; with SASL-IR the first token rides on the command line.
    ///
    /// # Errors
    ///
    /// Fails client-side when the mechanism is not advertised.
    pub async fn authenticate(&mut self, mechanism: &mut dyn SaslMechanism) -> Result<()> {
        self.require_state(|s| matches!(s, SessionState::NotAuthenticated), "authenticate")?;
        let name = mechanism.name().to_string();
        if !self.engine.supports_auth(&name) {
            return Err(Error::CapabilityUnavailable(format!("AUTH={name}")));
        }

        let initial_response = if self.has_capability(&Capability::SaslIr) {
            mechanism.initial_response()
        } else {
            None
        };

        let handle = self.engine.queue(&Command::Authenticate {
            mechanism: name,
            initial_response,
        })?;
        self.flush_outbound().await?;

        loop {
            let bytes = self.read_response_raw().await?;
            let events = self.dispatch(&bytes)?;
            for event in events {
                match event {
                    EngineEvent::Continuation { text } => {
                        let token = match mechanism.respond(&text) {
                            Ok(token) => token,
                            Err(e) => {
                                // An abort line keeps the session alive
                                self.engine.queue_raw_line(b"*");
                                self.flush_outbound().await?;
                                let _ = self.await_completion(&handle).await;
                                return Err(e);
                            }
                        };
                        self.engine.queue_raw_line(token.as_bytes());
                        self.flush_outbound().await?;
                    }
                    EngineEvent::CommandComplete { handle: done, result } if done == handle => {
                        self.finish(result)?;
                        return self.ensure_capabilities().await;
                    }
                    EngineEvent::Disconnected { text } => {
                        self.teardown();
                        return Err(Error::Bye(text));
                    }
                    _ => {}
                }
            }
        }
    }

    /// Enables extensions (RFC 5161), e.g. QRESYNC before a QRESYNC open.
    ///
    /// # Errors
    ///
    /// Fails client-side without the ENABLE capability.
    pub async fn enable(&mut self, capabilities: &[Capability]) -> Result<Vec<Capability>> {
        self.require_authenticated("enable")?;
        if !self.has_capability(&Capability::Enable) {
            return Err(Error::CapabilityUnavailable("ENABLE".to_string()));
        }

        let result = self
            .run(&Command::Enable {
                capabilities: capabilities.iter().map(ToString::to_string).collect(),
            })
            .await?;
        let responses = self.finish(result)?;

        Ok(responses
            .into_iter()
            .find_map(|r| match r {
                UntaggedResponse::Enabled(caps) => Some(caps),
                _ => None,
            })
            .unwrap_or_default())
    }

    /// Exchanges client/server identification (RFC 2971).
    ///
    /// # Errors
    ///
    /// Fails client-side without the ID capability.
    pub async fn id(
        &mut self,
        parameters: Option<Vec<(String, String)>>,
    ) -> Result<Vec<(String, String)>> {
        if !self.has_capability(&Capability::Id) {
            return Err(Error::CapabilityUnavailable("ID".to_string()));
        }

        let result = self.run(&Command::Id { parameters }).await?;
        let responses = self.finish(result)?;

        Ok(responses
            .into_iter()
            .find_map(|r| match r {
                UntaggedResponse::Id(fields) => Some(fields),
                _ => None,
            })
            .unwrap_or_default())
    }

    /// Sends NOOP, picking up any pending unsolicited updates.
    ///
    /// # Errors
    ///
    /// Transport or protocol failures.
    pub async fn noop(&mut self) -> Result<()> {
        let result = self.run(&Command::Noop).await?;
        self.finish(result).map(|_| ())
    }

    /// Logs out and closes the session.
    ///
    /// # Errors
    ///
    /// Transport failures; the expected `BYE` is not an error here.
    pub async fn logout(&mut self) -> Result<()> {
        self.expecting_bye = true;
        let result = self.run(&Command::Logout).await;
        self.expecting_bye = false;
        let result = result?;
        self.finish(result)?;
        self.folders.reset_selection();
        Ok(())
    }

    // === Folder listing ===

    /// Lists folders matching the pattern, refreshing the registry.
    ///
    /// Returns the full names in server order.
    ///
    /// # Errors
    ///
    /// Transport, protocol or server refusals.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<String>> {
        self.require_authenticated("list")?;
        let result = self
            .run(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        let responses = self.finish(result)?;

        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::List(list) => Some(list.mailbox.as_str().to_string()),
                _ => None,
            })
            .collect())
    }

    /// Lists subscribed folders.
    ///
    /// # Errors
    ///
    /// Transport, protocol or server refusals.
    pub async fn list_subscribed(&mut self, reference: &str, pattern: &str) -> Result<Vec<String>> {
        self.require_authenticated("lsub")?;
        let result = self
            .run(&Command::Lsub {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        let responses = self.finish(result)?;

        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Lsub(list) => Some(list.mailbox.as_str().to_string()),
                _ => None,
            })
            .collect())
    }

    // === Folder lifecycle ===

    /// Opens a folder, implicitly closing any previously selected one.
    ///
    /// `qresync` replays deltas since a captured [`SyncState`]; it
    /// requires QRESYNC to have been ENABLEd. Returns the access the
    /// server actually granted.
    ///
    /// # Errors
    ///
    /// `not-authenticated`, `no-such-folder` (as tagged NO), capability
    /// gates, and protocol violations (e.g. a UIDVALIDITY regression).
    pub async fn open(
        &mut self,
        full_name: &str,
        access: FolderAccess,
        qresync: Option<&SyncState>,
    ) -> Result<FolderAccess> {
        self.require_authenticated("open")?;
        if full_name.is_empty() {
            return Err(Error::Argument("empty folder name".to_string()));
        }
        if matches!(access, FolderAccess::None) {
            return Err(Error::Argument("access mode cannot be none".to_string()));
        }
        if qresync.is_some() && !self.engine.is_enabled(&Capability::QResync) {
            return Err(Error::CapabilityUnavailable(
                "QRESYNC (not enabled)".to_string(),
            ));
        }

        let condstore = self.has_capability(&Capability::CondStore);
        let qresync_params = qresync.map(SyncState::to_params);
        let mailbox = Mailbox::new(full_name);

        let command = if matches!(access, FolderAccess::ReadOnly) {
            Command::Examine {
                mailbox,
                condstore,
                qresync: qresync_params,
            }
        } else {
            Command::Select {
                mailbox,
                condstore,
                qresync: qresync_params,
            }
        };

        self.folders.begin_open(full_name);
        let result = match self.run(&command).await {
            Ok(result) => result,
            Err(e) => {
                self.folders.abort_open();
                return Err(e);
            }
        };
        if let Err(e) = self.check_status(&result) {
            self.folders.abort_open();
            return self.fatal_check(e);
        }

        let granted = if self.engine.state().is_read_only() {
            FolderAccess::ReadOnly
        } else {
            FolderAccess::ReadWrite
        };
        self.folders.complete_open(granted)?;

        let algorithms = self.engine.threading_algorithms();
        let append_limit = self.engine.append_limit();
        let annotate = self.has_capability(&Capability::Annotate);
        if let Some(folder) = self.folders.get_mut(full_name) {
            folder.set_threading_algorithms(algorithms);
            if folder.append_limit().is_none() {
                folder.set_append_limit(append_limit);
            }
            if annotate {
                let annotation_access = match granted {
                    FolderAccess::ReadWrite => AnnotationAccess::ReadWrite,
                    _ => AnnotationAccess::ReadOnly,
                };
                folder.set_annotation_support(
                    annotation_access,
                    vec![AnnotationScope::Private, AnnotationScope::Shared],
                    None,
                );
            }
        }

        Ok(granted)
    }

    /// Closes the selected folder.
    ///
    /// `expunge = true` issues CLOSE (which silently expunges);
    /// `expunge = false` issues UNSELECT, which requires the capability.
    ///
    /// # Errors
    ///
    /// `not-open`, capability gates, server refusals.
    pub async fn close(&mut self, expunge: bool) -> Result<()> {
        self.require_selected("close")?;

        let command = if expunge {
            Command::Close
        } else if self.has_capability(&Capability::Unselect) {
            Command::Unselect
        } else {
            return Err(Error::CapabilityUnavailable("UNSELECT".to_string()));
        };

        let result = self.run(&command).await?;
        self.finish(result)?;
        self.folders.close_selected();
        Ok(())
    }

    /// Creates a folder, optionally with SPECIAL-USE roles.
    ///
    /// # Errors
    ///
    /// `name-conflict` (as tagged NO), argument and capability gates.
    pub async fn create(
        &mut self,
        full_name: &str,
        special_uses: &[MailboxAttribute],
    ) -> Result<()> {
        self.require_authenticated("create")?;
        if full_name.is_empty() {
            return Err(Error::Argument("empty folder name".to_string()));
        }
        if !special_uses.is_empty() {
            if !self.has_capability(&Capability::SpecialUse) {
                return Err(Error::CapabilityUnavailable("SPECIAL-USE".to_string()));
            }
            if let Some(bad) = special_uses.iter().find(|a| !a.is_special_use()) {
                return Err(Error::Argument(format!(
                    "{} is not a special-use attribute",
                    bad.as_str()
                )));
            }
        }

        let result = self
            .run(&Command::Create {
                mailbox: Mailbox::new(full_name),
                use_attributes: special_uses.to_vec(),
            })
            .await?;
        self.finish(result)?;
        self.folders.ensure(full_name);
        Ok(())
    }

    /// Renames a folder (possibly to a new parent).
    ///
    /// # Errors
    ///
    /// `not-found`/`permission` (as tagged NO), argument errors.
    pub async fn rename(
        &mut self,
        full_name: &str,
        new_parent: Option<&str>,
        new_name: &str,
    ) -> Result<()> {
        self.require_authenticated("rename")?;
        if new_name.is_empty() {
            return Err(Error::Argument("empty folder name".to_string()));
        }

        let separator = self
            .folders
            .get(full_name)
            .and_then(MailFolder::directory_separator);

        let new_full_name = match (new_parent, separator) {
            (Some(parent), Some(sep)) if !parent.is_empty() => {
                format!("{parent}{sep}{new_name}")
            }
            (Some(parent), None) if !parent.is_empty() => {
                return Err(Error::Argument(format!(
                    "folder {parent} has no hierarchy separator"
                )));
            }
            _ => new_name.to_string(),
        };

        let result = self
            .run(&Command::Rename {
                from: Mailbox::new(full_name),
                to: Mailbox::new(new_full_name.clone()),
            })
            .await?;
        self.finish(result)?;
        self.folders.rename(full_name, &new_full_name);
        Ok(())
    }

    /// Deletes a folder.
    ///
    /// # Errors
    ///
    /// `not-found`/`not-empty` (as tagged NO).
    pub async fn delete(&mut self, full_name: &str) -> Result<()> {
        self.require_authenticated("delete")?;
        let result = self
            .run(&Command::Delete {
                mailbox: Mailbox::new(full_name),
            })
            .await?;
        self.finish(result)?;
        self.folders.remove(full_name);
        Ok(())
    }

    /// Subscribes to a folder.
    ///
    /// # Errors
    ///
    /// `not-found` (as tagged NO).
    pub async fn subscribe(&mut self, full_name: &str) -> Result<()> {
        self.require_authenticated("subscribe")?;
        let result = self
            .run(&Command::Subscribe {
                mailbox: Mailbox::new(full_name),
            })
            .await?;
        self.finish(result)?;
        self.folders.ensure(full_name).mark_subscribed(true);
        Ok(())
    }

    /// Unsubscribes from a folder.
    ///
    /// # Errors
    ///
    /// `not-found` (as tagged NO).
    pub async fn unsubscribe(&mut self, full_name: &str) -> Result<()> {
        self.require_authenticated("unsubscribe")?;
        let result = self
            .run(&Command::Unsubscribe {
                mailbox: Mailbox::new(full_name),
            })
            .await?;
        self.finish(result)?;
        self.folders.ensure(full_name).mark_subscribed(false);
        Ok(())
    }

    /// Refreshes folder attributes with STATUS.
    ///
    /// STATUS against the selected folder is forbidden; poll it with
    /// NOOP instead.
    ///
    /// # Errors
    ///
    /// `forbidden-while-open`, server refusals.
    pub async fn status(&mut self, full_name: &str, items: &[StatusAttribute]) -> Result<()> {
        self.require_authenticated("status")?;
        if self.folders.selected_name() == Some(full_name) {
            return Err(Error::InvalidState(
                "STATUS is forbidden for the selected folder".to_string(),
            ));
        }

        let items = if items.is_empty() {
            StatusAttribute::all().to_vec()
        } else {
            items.to_vec()
        };

        self.folders.ensure(full_name);
        let result = self
            .run(&Command::Status {
                mailbox: Mailbox::new(full_name),
                items,
            })
            .await?;
        self.finish(result).map(|_| ())
    }

    /// Requests a server checkpoint of the selected folder.
    ///
    /// # Errors
    ///
    /// `not-open`.
    pub async fn check(&mut self) -> Result<()> {
        self.require_selected("check")?;
        let result = self.run(&Command::Check).await?;
        self.finish(result).map(|_| ())
    }

    /// Expunges deleted messages, optionally restricted to a UID set.
    ///
    /// Returns the expunged sequence numbers.
    ///
    /// # Errors
    ///
    /// `not-open`, `read-only`, capability gates.
    pub async fn expunge(&mut self, uids: Option<&[Uid]>) -> Result<Vec<SeqNum>> {
        self.require_selected("expunge")?;
        self.require_writable("expunge")?;

        let command = match uids {
            Some([]) => return Ok(Vec::new()),
            Some(uids) => {
                if !self.has_capability(&Capability::UidPlus) {
                    return Err(Error::CapabilityUnavailable("UIDPLUS".to_string()));
                }
                let set = UidSet::from_uids(uids)
                    .ok_or_else(|| Error::Argument("empty UID set".to_string()))?;
                Command::UidExpunge { uids: set }
            }
            None => Command::Expunge,
        };

        let result = self.run(&command).await?;
        let responses = self.finish(result)?;

        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Expunge(seq) => Some(seq),
                _ => None,
            })
            .collect())
    }

    // === Append / replace ===

    /// Appends messages to a folder.
    ///
    /// More than one message uses MULTIAPPEND. Returns the assigned
    /// identifiers when the server supports UIDPLUS; otherwise an empty
    /// list.
    ///
    /// # Errors
    ///
    /// `append-limit-exceeded` fails client-side before any wire traffic;
    /// capability gates for MULTIAPPEND and ANNOTATE.
    pub async fn append(
        &mut self,
        full_name: &str,
        requests: &[AppendRequest],
    ) -> Result<Vec<UniqueId>> {
        self.require_authenticated("append")?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        if requests.len() > 1 && !self.has_capability(&Capability::MultiAppend) {
            return Err(Error::CapabilityUnavailable("MULTIAPPEND".to_string()));
        }
        if requests.iter().any(|r| !r.annotations.is_empty())
            && !self.has_capability(&Capability::Annotate)
        {
            return Err(Error::CapabilityUnavailable(
                "ANNOTATE-EXPERIMENT-1".to_string(),
            ));
        }

        let limit = self
            .folders
            .get(full_name)
            .and_then(MailFolder::append_limit)
            .or_else(|| self.engine.append_limit());
        if let Some(limit) = limit {
            for request in requests {
                if request.message.len() as u64 > limit {
                    return Err(Error::Argument(format!(
                        "message of {} octets exceeds the append limit of {limit}",
                        request.message.len()
                    )));
                }
            }
        }

        let messages = requests
            .iter()
            .map(|r| AppendData {
                flags: r.flags.clone(),
                internal_date: r.internal_date,
                annotations: r.annotations.clone(),
                message: r.message.clone(),
            })
            .collect();

        let result = self
            .run(&Command::Append {
                mailbox: Mailbox::new(full_name),
                messages,
            })
            .await?;
        let code = result.code.clone();
        self.finish(result)?;

        Ok(match code {
            Some(ResponseCode::AppendUid { validity, uids }) => uids
                .into_iter()
                .map(|uid| UniqueId::new(validity, uid))
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Replaces a message in the selected folder (RFC 8508).
    ///
    /// Returns the new identifier when the server reports it.
    ///
    /// # Errors
    ///
    /// Capability gate on REPLACE; `not-found` as tagged NO.
    pub async fn replace(
        &mut self,
        uid: Uid,
        request: &AppendRequest,
    ) -> Result<Option<UniqueId>> {
        self.require_selected("replace")?;
        self.require_writable("replace")?;
        if !self.has_capability(&Capability::Replace) {
            return Err(Error::CapabilityUnavailable("REPLACE".to_string()));
        }

        let mailbox = Mailbox::new(
            self.folders
                .selected_name()
                .ok_or_else(|| Error::InvalidState("no folder selected".to_string()))?,
        );

        let result = self
            .run(&Command::Replace {
                target: uid.get(),
                uid: true,
                mailbox,
                message: AppendData {
                    flags: request.flags.clone(),
                    internal_date: request.internal_date,
                    annotations: request.annotations.clone(),
                    message: request.message.clone(),
                },
            })
            .await?;
        let code = result.code.clone();
        self.finish(result)?;

        Ok(match code {
            Some(ResponseCode::AppendUid { validity, mut uids }) => {
                uids.pop().map(|uid| UniqueId::new(validity, uid))
            }
            _ => None,
        })
    }

    // === Copy / move ===

    /// Copies messages to another folder.
    ///
    /// An empty input set is a no-op that never touches the wire.
    ///
    /// # Errors
    ///
    /// `not-found`/`permission` as tagged NO.
    pub async fn copy_to(&mut self, uids: &[Uid], destination: &str) -> Result<UniqueIdMap> {
        self.require_selected("copy")?;
        if uids.is_empty() {
            return Ok(UniqueIdMap::empty());
        }
        let set = UidSet::from_uids(uids)
            .ok_or_else(|| Error::Argument("empty UID set".to_string()))?;

        let result = self
            .run(&Command::Copy {
                set: set.as_sequence_set(),
                uid: true,
                mailbox: Mailbox::new(destination),
            })
            .await?;
        self.extract_uid_map(result)
    }

    /// Moves messages to another folder (RFC 6851).
    ///
    /// An empty input set is a no-op that never touches the wire.
    ///
    /// # Errors
    ///
    /// Capability gate on MOVE; `not-found`/`permission` as tagged NO.
    pub async fn move_to(&mut self, uids: &[Uid], destination: &str) -> Result<UniqueIdMap> {
        self.require_selected("move")?;
        if !self.has_capability(&Capability::Move) {
            return Err(Error::CapabilityUnavailable("MOVE".to_string()));
        }
        if uids.is_empty() {
            return Ok(UniqueIdMap::empty());
        }
        let set = UidSet::from_uids(uids)
            .ok_or_else(|| Error::Argument("empty UID set".to_string()))?;

        let result = self
            .run(&Command::Move {
                set: set.as_sequence_set(),
                uid: true,
                mailbox: Mailbox::new(destination),
            })
            .await?;
        self.extract_uid_map(result)
    }

    /// Pulls a COPYUID mapping out of a COPY/MOVE completion.
    ///
    /// MOVE servers put COPYUID on an untagged OK rather than the tagged
    /// completion, so both places are checked.
    fn extract_uid_map(&mut self, result: CommandResult) -> Result<UniqueIdMap> {
        let source_validity = self.selected_validity();
        let tagged_code = result.code.clone();
        let responses = self.finish(result)?;

        let copy_code = tagged_code.into_iter().find_map(as_copy_uid).or_else(|| {
            responses.into_iter().find_map(|r| match r {
                UntaggedResponse::Ok { code: Some(code), .. } => as_copy_uid(code),
                _ => None,
            })
        });

        Ok(copy_code
            .and_then(|(validity, source, destination)| {
                UniqueIdMap::from_copy_uid(source_validity, validity, source, destination)
            })
            .unwrap_or_else(UniqueIdMap::empty))
    }

    // === Fetch ===

    /// Fetches summaries for a UID set.
    ///
    /// Large sets split into batches; batches pipeline when enabled.
    ///
    /// # Errors
    ///
    /// `not-open`, capability gates (Gmail items, CHANGEDSINCE).
    pub async fn fetch(
        &mut self,
        uids: &[Uid],
        request: &FetchRequest,
    ) -> Result<Vec<MessageSummary>> {
        self.require_selected("fetch")?;
        self.check_fetch_gates(request)?;
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let attributes = self.build_fetch_attributes(request);
        let batch = self.config.fetch_batch_size.max(1);

        let mut sets = Vec::new();
        for chunk in uids.chunks(batch) {
            if let Some(set) = UidSet::from_uids(chunk) {
                sets.push(set.as_sequence_set());
            }
        }

        self.run_fetch_batches(sets, true, attributes, request.changed_since)
            .await
    }

    /// Fetches summaries for a sequence-number range.
    ///
    /// This is the low-level escape hatch; identifiers retained across a
    /// reconnect must come from the UID path. `max == -1` denotes the
    /// open-ended upper bound. An empty folder yields an empty list
    /// without touching the wire.
    ///
    /// # Errors
    ///
    /// `not-open`, argument errors, capability gates.
    pub async fn fetch_range(
        &mut self,
        min: u32,
        max: i64,
        request: &FetchRequest,
    ) -> Result<Vec<MessageSummary>> {
        self.require_selected("fetch")?;
        self.check_fetch_gates(request)?;

        let start = SeqNum::new(min)
            .ok_or_else(|| Error::Argument("sequence numbers start at 1".to_string()))?;
        let end = if max < 0 {
            None
        } else {
            let end = u32::try_from(max)
                .ok()
                .and_then(SeqNum::new)
                .ok_or_else(|| Error::Argument(format!("invalid range end {max}")))?;
            if end < start {
                return Err(Error::Argument(format!("descending range {min}:{max}")));
            }
            Some(end)
        };

        let count = self
            .folders
            .selected()
            .map_or(0, MailFolder::count);
        if count == 0 {
            return Ok(Vec::new());
        }

        let set = match end {
            None => SequenceSet::RangeFrom(start),
            Some(end) if end == start => SequenceSet::Single(start),
            Some(end) => SequenceSet::Range(start, end),
        };

        let attributes = self.build_fetch_attributes(request);
        self.run_fetch_batches(vec![set], false, attributes, request.changed_since)
            .await
    }

    async fn run_fetch_batches(
        &mut self,
        sets: Vec<SequenceSet>,
        uid: bool,
        attributes: Vec<FetchAttribute>,
        changed_since: Option<ModSeq>,
    ) -> Result<Vec<MessageSummary>> {
        let mut summaries = Vec::new();
        let depth = if self.config.pipeline.enabled {
            self.config.pipeline.max_depth.max(1)
        } else {
            1
        };

        for group in sets.chunks(depth) {
            let mut handles = Vec::with_capacity(group.len());
            for set in group {
                let handle = self.engine.queue(&Command::Fetch {
                    set: set.clone(),
                    uid,
                    attributes: attributes.clone(),
                    changed_since,
                })?;
                handles.push(handle);
            }
            let results = self.drive_until(&handles).await?;
            for result in results {
                let responses = self.finish(result)?;
                self.collect_summaries(&responses, &mut summaries);
            }
        }

        Ok(summaries)
    }

    fn check_fetch_gates(&self, request: &FetchRequest) -> Result<()> {
        if request.wants_gmail_items() && !self.has_capability(&Capability::GmailExt1) {
            return Err(Error::CapabilityUnavailable("X-GM-EXT-1".to_string()));
        }
        if request.annotations && !self.has_capability(&Capability::Annotate) {
            return Err(Error::CapabilityUnavailable(
                "ANNOTATE-EXPERIMENT-1".to_string(),
            ));
        }
        if request.changed_since.is_some() && !self.has_capability(&Capability::CondStore) {
            return Err(Error::CapabilityUnavailable("CONDSTORE".to_string()));
        }
        Ok(())
    }

    /// Lowers a [`FetchRequest`] to wire attributes. UID always rides
    /// along so results stay addressable.
    fn build_fetch_attributes(&self, request: &FetchRequest) -> Vec<FetchAttribute> {
        let mut attrs = vec![FetchAttribute::Uid];
        if request.flags {
            attrs.push(FetchAttribute::Flags);
        }
        if request.internal_date {
            attrs.push(FetchAttribute::InternalDate);
        }
        if request.size {
            attrs.push(FetchAttribute::Rfc822Size);
        }
        if request.envelope {
            attrs.push(FetchAttribute::Envelope);
        }
        if request.body_structure {
            attrs.push(FetchAttribute::BodyStructure);
        }
        if request.mod_seq && self.has_capability(&Capability::CondStore) {
            attrs.push(FetchAttribute::ModSeq);
        }
        if request.gmail_labels {
            attrs.push(FetchAttribute::GmailLabels);
        }
        if request.gmail_message_id {
            attrs.push(FetchAttribute::GmailMessageId);
        }
        if request.gmail_thread_id {
            attrs.push(FetchAttribute::GmailThreadId);
        }
        if request.annotations {
            attrs.push(FetchAttribute::Annotation);
        }
        if request.preview_text {
            attrs.push(FetchAttribute::Preview);
        }

        let mut headers = Vec::new();
        if request.references {
            headers.push("References".to_string());
        }
        headers.extend(request.headers.iter().cloned());
        if !headers.is_empty() {
            attrs.push(FetchAttribute::header_fields(&headers));
        }

        attrs
    }

    fn collect_summaries(
        &self,
        responses: &[UntaggedResponse],
        out: &mut Vec<MessageSummary>,
    ) {
        let folder_name = self
            .folders
            .selected_name()
            .unwrap_or_default()
            .to_string();
        let validity = self.selected_validity();

        for response in responses {
            if let UntaggedResponse::Fetch { seq, items } = response {
                let mut summary = MessageSummary::new(folder_name.clone(), *seq);
                for item in items {
                    summary.merge(item.clone(), validity);
                }
                out.push(summary);
            }
        }
    }

    // === Raw message access ===

    /// Fetches the header block of a message.
    ///
    /// # Errors
    ///
    /// `not-found` when the UID does not exist.
    pub async fn get_headers(&mut self, uid: Uid) -> Result<Vec<u8>> {
        self.fetch_section_once(uid, Some("HEADER"), None).await
    }

    /// Fetches a body part by section specifier (e.g. `1.2`).
    ///
    /// # Errors
    ///
    /// `not-found` when the UID or section does not exist.
    pub async fn get_body_part(&mut self, uid: Uid, section: &str) -> Result<Vec<u8>> {
        self.fetch_section_once(uid, Some(section), None).await
    }

    /// Fetches the complete message octets, in bounded chunks.
    ///
    /// # Errors
    ///
    /// `not-found` when the UID does not exist.
    pub async fn get_message(
        &mut self,
        uid: Uid,
        progress: Option<&mut dyn TransferProgress>,
    ) -> Result<Vec<u8>> {
        self.require_selected("fetch")?;

        // Learn the size first so progress can report a total
        let summaries = self
            .fetch(&[uid], &FetchRequest {
                size: true,
                ..FetchRequest::default()
            })
            .await?;
        let total = summaries.first().and_then(|s| s.size).map(u64::from);

        let Some(total) = total else {
            // Size unknown; stream until the server runs dry
            return self
                .stream_section(uid, None, 0, u64::MAX, None, progress)
                .await;
        };

        self.stream_section(uid, None, 0, total, Some(total), progress)
            .await
    }

    /// Fetches a byte range of a message (or of one section).
    ///
    /// `offset >= message size` yields an empty buffer; a range reaching
    /// past the end is truncated by the server.
    ///
    /// # Errors
    ///
    /// `not-open` or transport failures.
    pub async fn get_stream(
        &mut self,
        uid: Uid,
        section: Option<&str>,
        offset: u64,
        count: u64,
        progress: Option<&mut dyn TransferProgress>,
    ) -> Result<Vec<u8>> {
        self.require_selected("fetch")?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.stream_section(uid, section, offset, count, None, progress)
            .await
    }

    async fn stream_section(
        &mut self,
        uid: Uid,
        section: Option<&str>,
        offset: u64,
        count: u64,
        total: Option<u64>,
        mut progress: Option<&mut dyn TransferProgress>,
    ) -> Result<Vec<u8>> {
        let chunk_size = self.config.transfer_chunk_size.max(1024);
        let mut out = Vec::new();
        let mut position = offset;
        let mut remaining = count;

        while remaining > 0 {
            let chunk = remaining.min(chunk_size);
            let data = self
                .fetch_section_once(uid, section, Some((position, chunk)))
                .await?;
            let got = data.len() as u64;
            if got == 0 {
                break;
            }
            out.extend_from_slice(&data);
            position += got;
            remaining = remaining.saturating_sub(got);

            if let Some(observer) = progress.as_deref_mut() {
                observer.on_progress(out.len() as u64, total);
            }

            // A short read means the server hit the end of the data
            if got < chunk {
                break;
            }
        }

        Ok(out)
    }

    /// One BODY.PEEK fetch for a section, returning its raw payload.
    async fn fetch_section_once(
        &mut self,
        uid: Uid,
        section: Option<&str>,
        partial: Option<(u64, u64)>,
    ) -> Result<Vec<u8>> {
        self.require_selected("fetch")?;

        let set = UidSet::single(uid).as_sequence_set();
        let attribute = FetchAttribute::Body {
            section: section.map(ToString::to_string),
            peek: true,
            partial,
        };
        let result = self
            .run(&Command::Fetch {
                set,
                uid: true,
                attributes: vec![FetchAttribute::Uid, attribute],
                changed_since: None,
            })
            .await?;
        let responses = self.finish(result)?;

        for response in &responses {
            if let UntaggedResponse::Fetch { items, .. } = response {
                for item in items {
                    if let FetchItem::Body { data, .. } = item {
                        return Ok(data.clone().unwrap_or_default());
                    }
                }
            }
        }

        Err(Error::No {
            text: format!("no data returned for uid {uid}"),
            code: None,
        })
    }

    // === Store ===

    /// Mutates flags on the given messages.
    ///
    /// With `unchanged_since`, the server skips messages whose
    /// mod-sequence has moved past the guard; their UIDs are returned as
    /// the not-updated list, which is a normal outcome, not an error.
    ///
    /// # Errors
    ///
    /// `not-open`, `read-only`, capability gate on the guard.
    pub async fn store_flags(
        &mut self,
        uids: &[Uid],
        request: &StoreFlagsRequest,
    ) -> Result<Vec<Uid>> {
        if request.unchanged_since.is_some() && !self.has_capability(&Capability::CondStore) {
            return Err(Error::CapabilityUnavailable("CONDSTORE".to_string()));
        }
        self.store(
            uids,
            StoreSpec {
                mode: request.mode,
                target: StoreTarget::Flags(request.flags.clone()),
                silent: request.silent,
                unchanged_since: request.unchanged_since,
            },
        )
        .await
    }

    /// Mutates Gmail labels on the given messages.
    ///
    /// # Errors
    ///
    /// Gated on `X-GM-EXT-1`.
    pub async fn store_labels(
        &mut self,
        uids: &[Uid],
        request: &StoreLabelsRequest,
    ) -> Result<Vec<Uid>> {
        if !self.has_capability(&Capability::GmailExt1) {
            return Err(Error::CapabilityUnavailable("X-GM-EXT-1".to_string()));
        }
        if request.unchanged_since.is_some() && !self.has_capability(&Capability::CondStore) {
            return Err(Error::CapabilityUnavailable("CONDSTORE".to_string()));
        }
        self.store(
            uids,
            StoreSpec {
                mode: request.mode,
                target: StoreTarget::Labels(request.labels.clone()),
                silent: request.silent,
                unchanged_since: request.unchanged_since,
            },
        )
        .await
    }

    /// Stores annotations on the given messages (RFC 5257).
    ///
    /// # Errors
    ///
    /// Gated on ANNOTATE; `permission` as tagged NO.
    pub async fn store_annotations(
        &mut self,
        uids: &[Uid],
        unchanged_since: Option<ModSeq>,
        annotations: &[Annotation],
    ) -> Result<Vec<Uid>> {
        if !self.has_capability(&Capability::Annotate) {
            return Err(Error::CapabilityUnavailable(
                "ANNOTATE-EXPERIMENT-1".to_string(),
            ));
        }
        if unchanged_since.is_some() && !self.has_capability(&Capability::CondStore) {
            return Err(Error::CapabilityUnavailable("CONDSTORE".to_string()));
        }
        self.store(
            uids,
            StoreSpec {
                mode: crate::request::StoreMode::Set,
                target: StoreTarget::Annotations(annotations.to_vec()),
                silent: false,
                unchanged_since,
            },
        )
        .await
    }

    async fn store(&mut self, uids: &[Uid], spec: StoreSpec) -> Result<Vec<Uid>> {
        self.require_selected("store")?;
        self.require_writable("store")?;
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let set = UidSet::from_uids(uids)
            .ok_or_else(|| Error::Argument("empty UID set".to_string()))?;

        let result = self
            .run(&Command::Store {
                set: set.as_sequence_set(),
                uid: true,
                spec,
            })
            .await?;
        let code = result.code.clone();
        self.finish(result)?;

        // MODIFIED carries the UIDs the guard skipped
        Ok(match code {
            Some(ResponseCode::Modified(numbers)) => {
                numbers.into_iter().filter_map(Uid::new).collect()
            }
            _ => Vec::new(),
        })
    }

    // === Search / sort / thread ===

    /// Searches the selected folder.
    ///
    /// Results are UID-based. `options` requests ESEARCH statistics and
    /// needs the ESEARCH capability.
    ///
    /// # Errors
    ///
    /// `not-open`, capability gates (Gmail terms, MODSEQ, ESEARCH).
    pub async fn search(
        &mut self,
        query: &SearchQuery,
        options: Option<&SearchOptions>,
    ) -> Result<SearchResults> {
        self.require_selected("search")?;
        self.check_query_gates(query)?;
        let options = options.copied().unwrap_or_default();
        if !options.is_empty() && !self.has_capability(&Capability::ESearch) {
            return Err(Error::CapabilityUnavailable("ESEARCH".to_string()));
        }
        if options.save && !self.has_capability(&Capability::SearchRes) {
            return Err(Error::CapabilityUnavailable("SEARCHRES".to_string()));
        }

        let charset = query
            .contains_non_ascii()
            .then(|| "UTF-8".to_string());

        let result = self
            .run(&Command::Search {
                query: query.clone(),
                uid: true,
                options,
                charset,
            })
            .await?;
        let responses = self.finish(result)?;
        self.build_search_results(responses)
    }

    /// Server-side sort of the selected folder (RFC 5256).
    ///
    /// # Errors
    ///
    /// `unsupported-algorithm` style gates on SORT/ESORT.
    pub async fn sort(
        &mut self,
        query: &SearchQuery,
        order_by: &[SortKey],
        options: Option<&SearchOptions>,
    ) -> Result<SearchResults> {
        self.require_selected("sort")?;
        if !self.has_capability(&Capability::Sort) {
            return Err(Error::CapabilityUnavailable("SORT".to_string()));
        }
        if order_by.is_empty() {
            return Err(Error::Argument("sort requires at least one key".to_string()));
        }
        self.check_query_gates(query)?;
        let options = options.copied().unwrap_or_default();
        if !options.is_empty() && !self.has_capability(&Capability::ESort) {
            return Err(Error::CapabilityUnavailable("ESORT".to_string()));
        }

        let charset = if query.contains_non_ascii() {
            "UTF-8".to_string()
        } else {
            "US-ASCII".to_string()
        };

        let result = self
            .run(&Command::Sort {
                keys: order_by.to_vec(),
                query: query.clone(),
                uid: true,
                charset,
                options,
            })
            .await?;
        let responses = self.finish(result)?;
        self.build_search_results(responses)
    }

    /// Threads the selected folder (RFC 5256).
    ///
    /// The algorithm is verified against the folder's advertised set
    /// before anything is transmitted.
    ///
    /// # Errors
    ///
    /// `unsupported-algorithm` fails client-side.
    pub async fn thread(
        &mut self,
        algorithm: ThreadingAlgorithm,
        query: &SearchQuery,
    ) -> Result<Vec<MessageThread>> {
        self.require_selected("thread")?;
        self.check_query_gates(query)?;

        let supported = self
            .folders
            .selected()
            .is_some_and(|f| f.threading_algorithms().contains(&algorithm));
        if !supported {
            return Err(Error::CapabilityUnavailable(format!(
                "THREAD={algorithm}"
            )));
        }

        let validity = self.selected_validity().ok_or_else(|| {
            Error::Protocol("selected folder has no UIDVALIDITY".to_string())
        })?;

        let charset = if query.contains_non_ascii() {
            "UTF-8".to_string()
        } else {
            "US-ASCII".to_string()
        };

        let result = self
            .run(&Command::Thread {
                algorithm,
                query: query.clone(),
                uid: true,
                charset,
            })
            .await?;
        let responses = self.finish(result)?;

        Ok(responses
            .into_iter()
            .find_map(|r| match r {
                UntaggedResponse::Thread(roots) => Some(
                    roots
                        .iter()
                        .map(|node| MessageThread::from_node(node, validity))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default())
    }

    fn check_query_gates(&self, query: &SearchQuery) -> Result<()> {
        if query.uses_gmail_terms() && !self.has_capability(&Capability::GmailExt1) {
            return Err(Error::CapabilityUnavailable("X-GM-EXT-1".to_string()));
        }
        if query.uses_mod_seq() && !self.has_capability(&Capability::CondStore) {
            return Err(Error::CapabilityUnavailable("CONDSTORE".to_string()));
        }
        Ok(())
    }

    fn build_search_results(
        &mut self,
        responses: Vec<UntaggedResponse>,
    ) -> Result<SearchResults> {
        let validity = self.selected_validity().ok_or_else(|| {
            Error::Protocol("selected folder has no UIDVALIDITY".to_string())
        })?;
        let qualify = |n: u32| Uid::new(n).map(|uid| UniqueId::new(validity, uid));

        let mut results = SearchResults::default();
        for response in responses {
            match response {
                UntaggedResponse::Search(numbers) | UntaggedResponse::Sort(numbers) => {
                    results.ids.extend(numbers.into_iter().filter_map(qualify));
                }
                UntaggedResponse::ESearch(esearch) => {
                    results.min = esearch.min.and_then(qualify);
                    results.max = esearch.max.and_then(qualify);
                    results.count = esearch.count;
                    results.mod_seq = esearch.mod_seq;
                    results
                        .ids
                        .extend(esearch.all.into_iter().filter_map(qualify));
                }
                _ => {}
            }
        }
        Ok(results)
    }

    // === Internals ===

    fn selected_validity(&self) -> Option<UidValidity> {
        self.folders.selected().and_then(MailFolder::uid_validity)
    }

    fn require_state(
        &self,
        predicate: impl Fn(&SessionState) -> bool,
        operation: &str,
    ) -> Result<()> {
        if predicate(self.engine.state()) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "{operation} is not valid in state {:?}",
                self.engine.state()
            )))
        }
    }

    fn require_authenticated(&self, operation: &str) -> Result<()> {
        self.require_state(SessionState::is_authenticated, operation)
    }

    fn require_selected(&self, operation: &str) -> Result<()> {
        self.require_state(SessionState::is_selected, operation)
    }

    fn require_writable(&self, operation: &str) -> Result<()> {
        if self.engine.state().is_read_only() {
            Err(Error::InvalidState(format!(
                "{operation} requires a read-write folder"
            )))
        } else {
            Ok(())
        }
    }

    async fn ensure_capabilities(&mut self) -> Result<()> {
        if self.engine.capabilities().is_empty() {
            self.refresh_capabilities().await?;
        }
        Ok(())
    }

    async fn refresh_capabilities(&mut self) -> Result<()> {
        let result = self.run(&Command::Capability).await?;
        self.finish(result).map(|_| ())
    }

    /// Queues a command and drives it to completion.
    pub(crate) async fn run(&mut self, command: &Command) -> Result<CommandResult> {
        let handle = self.engine.queue(command)?;
        let mut results = self.drive_until(std::slice::from_ref(&handle)).await?;
        results
            .pop()
            .ok_or_else(|| Error::Protocol("command completed without a result".to_string()))
    }

    /// Awaits one specific completion (used by the SASL exchange).
    async fn await_completion(&mut self, handle: &CommandHandle) -> Result<CommandResult> {
        let mut results = self.drive_until(std::slice::from_ref(handle)).await?;
        results
            .pop()
            .ok_or_else(|| Error::Protocol("command completed without a result".to_string()))
    }

    /// Flushes transmits and reads until every handle has completed.
    ///
    /// Untagged updates are applied to folder state (firing observers)
    /// strictly before completions are collected, so callers always see
    /// the updates a command triggered before its result.
    async fn drive_until(&mut self, handles: &[CommandHandle]) -> Result<Vec<CommandResult>> {
        let mut slots: Vec<Option<CommandResult>> = (0..handles.len()).map(|_| None).collect();
        let mut remaining = handles.len();

        self.flush_outbound().await?;

        while remaining > 0 {
            let bytes = self.read_response_raw().await?;
            let events = self.dispatch(&bytes)?;

            for event in events {
                match event {
                    EngineEvent::CommandComplete { handle, result } => {
                        if let Some(index) = handles.iter().position(|h| *h == handle) {
                            if slots[index].is_none() {
                                remaining -= 1;
                            }
                            slots[index] = Some(result);
                        }
                    }
                    EngineEvent::Disconnected { text } => {
                        if !self.expecting_bye {
                            self.teardown();
                            return Err(Error::Bye(text));
                        }
                    }
                    EngineEvent::Continuation { .. } | EngineEvent::Greeting { .. } => {}
                }
            }

            // A satisfied continuation may have released literal bytes
            self.flush_outbound().await?;
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Parses and routes one response, tearing the session down on
    /// protocol violations.
    pub(crate) fn dispatch(&mut self, bytes: &[u8]) -> Result<Vec<EngineEvent>> {
        match self.engine.handle_response(bytes, &mut self.folders) {
            Ok(events) => Ok(events),
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    pub(crate) async fn flush_outbound(&mut self) -> Result<()> {
        while let Some(transmit) = self.engine.poll_transmit() {
            self.write_raw(&transmit.data).await?;
        }
        Ok(())
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let io_timeout = self.config.io_timeout;
        let cancel = self.config.cancellation.clone();

        let outcome = {
            let write = self.framed.write_all(data);
            tokio::pin!(write);
            tokio::select! {
                biased;
                () = cancel.cancelled() => IoOutcome::Cancelled,
                result = tokio::time::timeout(io_timeout, &mut write) => match result {
                    Err(_) => IoOutcome::TimedOut,
                    Ok(Ok(())) => IoOutcome::Done(()),
                    Ok(Err(e)) => IoOutcome::Failed(e),
                },
            }
        };

        match outcome {
            IoOutcome::Done(()) => Ok(()),
            IoOutcome::Cancelled => {
                // Bytes may already be on the wire; integrity requires a
                // disconnect
                self.teardown();
                Err(Error::Cancelled)
            }
            IoOutcome::TimedOut => {
                self.teardown();
                Err(Error::Timeout(io_timeout))
            }
            IoOutcome::Failed(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    pub(crate) async fn read_response_raw(&mut self) -> Result<Vec<u8>> {
        let io_timeout = self.config.io_timeout;
        let cancel = self.config.cancellation.clone();

        let outcome = {
            let read = self.framed.read_response();
            tokio::pin!(read);
            tokio::select! {
                biased;
                () = cancel.cancelled() => IoOutcome::Cancelled,
                result = tokio::time::timeout(io_timeout, &mut read) => match result {
                    Err(_) => IoOutcome::TimedOut,
                    Ok(Ok(bytes)) => IoOutcome::Done(bytes),
                    Ok(Err(e)) => IoOutcome::Failed(e),
                },
            }
        };

        match outcome {
            IoOutcome::Done(bytes) => Ok(bytes),
            IoOutcome::Cancelled => {
                self.teardown();
                Err(Error::Cancelled)
            }
            IoOutcome::TimedOut => {
                // A read timeout is terminal for the session
                self.teardown();
                Err(Error::Timeout(io_timeout))
            }
            IoOutcome::Failed(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    /// Converts a completion into its responses, applying the error
    /// taxonomy and tearing down on fatal outcomes.
    pub(crate) fn finish(&mut self, result: CommandResult) -> Result<Vec<UntaggedResponse>> {
        match result.into_result() {
            Ok(responses) => Ok(responses),
            Err(e) => self.fatal_check(e),
        }
    }

    fn check_status(&mut self, result: &CommandResult) -> Result<()> {
        match result.status {
            Status::Ok | Status::PreAuth => Ok(()),
            Status::No => Err(Error::No {
                text: result.text.clone(),
                code: result.code.clone(),
            }),
            Status::Bad => Err(Error::Bad(result.text.clone())),
            Status::Bye => Err(Error::Bye(result.text.clone())),
        }
    }

    fn fatal_check<T>(&mut self, e: Error) -> Result<T> {
        if e.is_fatal() {
            self.teardown();
        }
        Err(e)
    }

    /// Abandons the session after a fatal failure.
    pub(crate) fn teardown(&mut self) {
        let abandoned = self.engine.take_pending();
        if !abandoned.is_empty() {
            tracing::warn!(count = abandoned.len(), "abandoning in-flight commands");
        }
        self.engine.mark_disconnected();
        self.folders.reset_selection();
    }
}

fn as_copy_uid(code: ResponseCode) -> Option<(UidValidity, Vec<Uid>, Vec<Uid>)> {
    match code {
        ResponseCode::CopyUid {
            validity,
            source,
            destination,
        } => Some((validity, source, destination)),
        _ => None,
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("state", self.engine.state())
            .field("server_type", &self.server_type)
            .field("folders", &self.folders.len())
            .finish_non_exhaustive()
    }
}
