//! Sans-I/O engine core.
//!
//! The [`Engine`] owns the session state machine, the tag allocator, the
//! capability registry and the in-flight command queue. It never touches
//! the network: commands are queued and drained as [`Transmit`]s, complete
//! response lines are fed back in, and typed events come out.
//!
//! Untagged responses are applied to folder state (through the
//! [`UpdateSink`]) as they arrive, strictly before the tagged completion
//! that follows them is surfaced, so callers observing a command result have
//! already seen every update it triggered.

mod state;
mod transmit;

use std::collections::VecDeque;

pub use state::{SelectedState, SessionState};
pub use transmit::Transmit;

use crate::command::{Command, LiteralMode, Segment, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::request::ThreadingAlgorithm;
use crate::types::{Capability, ResponseCode, Status, Tag};
use crate::{Error, Result};

/// Receiver of untagged updates during response dispatch.
///
/// The folder registry implements this; tests may substitute their own.
pub trait UpdateSink {
    /// Applies one untagged response to mailbox state.
    ///
    /// Observer callbacks fire inside this call, which is what guarantees
    /// they precede the tagged completion.
    fn apply(&mut self, response: &UntaggedResponse) -> Result<()>;
}

/// A sink that ignores all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl UpdateSink for NoopSink {
    fn apply(&mut self, _response: &UntaggedResponse) -> Result<()> {
        Ok(())
    }
}

impl UpdateSink for crate::folder::FolderRegistry {
    fn apply(&mut self, response: &UntaggedResponse) -> Result<()> {
        self.apply_untagged(response)
    }
}

/// A handle to a pending command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandHandle {
    tag: Tag,
}

impl CommandHandle {
    /// Returns the tag associated with this command.
    #[must_use]
    pub const fn tag(&self) -> &Tag {
        &self.tag
    }
}

/// Result of a completed command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Completion status.
    pub status: Status,
    /// Optional response code.
    pub code: Option<ResponseCode>,
    /// Human-readable text.
    pub text: String,
    /// Untagged responses collected while this command was in flight.
    pub responses: Vec<UntaggedResponse>,
}

impl CommandResult {
    /// Returns true if the command succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Converts to a Result, applying the error taxonomy: NO is local,
    /// BAD and BYE are fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if the status is NO, BAD, or BYE.
    pub fn into_result(self) -> Result<Vec<UntaggedResponse>> {
        match self.status {
            Status::Ok | Status::PreAuth => Ok(self.responses),
            Status::No => Err(Error::No {
                text: self.text,
                code: self.code,
            }),
            Status::Bad => Err(Error::Bad(self.text)),
            Status::Bye => Err(Error::Bye(self.text)),
        }
    }
}

/// Events produced by the engine.
#[derive(Debug)]
pub enum EngineEvent {
    /// Server greeting received.
    Greeting {
        /// Greeting status (OK, PREAUTH or BYE).
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Greeting text.
        text: String,
    },
    /// A command completed.
    CommandComplete {
        /// The command handle.
        handle: CommandHandle,
        /// The result.
        result: CommandResult,
    },
    /// Continuation request not consumed by literal pacing (IDLE ready,
    /// SASL challenge).
    Continuation {
        /// Continuation text; a SASL challenge is base64 here.
        text: String,
    },
    /// Server closed the session with BYE.
    Disconnected {
        /// BYE text.
        text: String,
    },
}

/// What a command does to the state machine when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CommandKind {
    Login,
    Authenticate,
    StartTls,
    Select { mailbox: String, read_only: bool },
    Deselect,
    Logout,
    Idle,
    Other,
}

impl CommandKind {
    fn of(command: &Command) -> Self {
        match command {
            Command::Login { .. } => Self::Login,
            Command::Authenticate { .. } => Self::Authenticate,
            Command::StartTls => Self::StartTls,
            Command::Select { mailbox, .. } => Self::Select {
                mailbox: mailbox.as_str().to_string(),
                read_only: false,
            },
            Command::Examine { mailbox, .. } => Self::Select {
                mailbox: mailbox.as_str().to_string(),
                read_only: true,
            },
            Command::Close | Command::Unselect => Self::Deselect,
            Command::Logout => Self::Logout,
            Command::Idle => Self::Idle,
            _ => Self::Other,
        }
    }
}

/// A command in flight.
struct PendingCommand {
    handle: CommandHandle,
    kind: CommandKind,
    exclusive: bool,
    responses: Vec<UntaggedResponse>,
}

/// Sans-I/O IMAP engine.
pub struct Engine {
    state: SessionState,
    tag_gen: TagGenerator,
    capabilities: Vec<Capability>,
    enabled: Vec<Capability>,
    pending: VecDeque<PendingCommand>,
    outbound: VecDeque<Transmit>,
    awaiting_continuation: bool,
    greeting_received: bool,
    idle_tag: Option<Tag>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates a new engine in the disconnected state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            tag_gen: TagGenerator::default(),
            capabilities: Vec::new(),
            enabled: Vec::new(),
            pending: VecDeque::new(),
            outbound: VecDeque::new(),
            awaiting_continuation: false,
            greeting_received: false,
            idle_tag: None,
        }
    }

    /// The current session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Marks the transport as being established.
    pub fn connect_started(&mut self) {
        self.state = SessionState::Connecting;
    }

    /// Marks the transport as gone; in-flight commands are abandoned.
    pub fn mark_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
        self.pending.clear();
        self.outbound.clear();
        self.awaiting_continuation = false;
        self.idle_tag = None;
    }

    /// The server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks for a capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Checks whether an AUTH= mechanism is advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| matches!(c, Capability::Auth(m) if m.eq_ignore_ascii_case(mechanism)))
    }

    /// Extensions switched on with ENABLE.
    #[must_use]
    pub fn enabled(&self) -> &[Capability] {
        &self.enabled
    }

    /// Checks whether an extension has been enabled.
    #[must_use]
    pub fn is_enabled(&self, cap: &Capability) -> bool {
        self.enabled.contains(cap)
    }

    /// The literal mode the server permits.
    #[must_use]
    pub fn literal_mode(&self) -> LiteralMode {
        if self.has_capability(&Capability::LiteralPlus) {
            LiteralMode::NonSynchronizing
        } else if self.has_capability(&Capability::LiteralMinus) {
            LiteralMode::NonSyncBounded
        } else {
            LiteralMode::Synchronizing
        }
    }

    /// Threading algorithms the server advertises.
    #[must_use]
    pub fn threading_algorithms(&self) -> Vec<ThreadingAlgorithm> {
        self.capabilities
            .iter()
            .filter_map(|c| match c {
                Capability::Thread(algo) => ThreadingAlgorithm::parse(algo),
                _ => None,
            })
            .collect()
    }

    /// The advertised APPENDLIMIT, if any.
    #[must_use]
    pub fn append_limit(&self) -> Option<u64> {
        self.capabilities.iter().find_map(|c| match c {
            Capability::AppendLimit(limit) => *limit,
            _ => None,
        })
    }

    /// Returns true while an IDLE is in progress.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.idle_tag.is_some()
    }

    /// Number of commands in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// True if a synchronizing literal is waiting for its continuation.
    #[must_use]
    pub const fn awaiting_continuation(&self) -> bool {
        self.awaiting_continuation
    }

    /// Queues a command, enforcing the pipelining gates.
    ///
    /// A command may join the pipeline only when no in-flight command still
    /// owes a continuation and no exclusive command (IDLE, AUTHENTICATE,
    /// STARTTLS, LOGIN, SELECT/EXAMINE) is in flight; exclusive commands
    /// additionally require an empty pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when a gate rejects the command.
    pub fn queue(&mut self, command: &Command) -> Result<CommandHandle> {
        if !self.state.is_usable() && !matches!(self.state, SessionState::Connecting) {
            return Err(Error::InvalidState(format!(
                "cannot issue {} while disconnected",
                command.name()
            )));
        }
        if self.idle_tag.is_some() {
            return Err(Error::InvalidState(
                "IDLE in progress; send DONE first".to_string(),
            ));
        }
        if self.awaiting_continuation {
            return Err(Error::InvalidState(
                "a literal continuation is outstanding".to_string(),
            ));
        }
        if self.pending.iter().any(|p| p.exclusive) {
            return Err(Error::InvalidState(
                "an exclusive command is in flight".to_string(),
            ));
        }

        let exclusive = command.is_exclusive();
        if exclusive && !self.pending.is_empty() {
            return Err(Error::InvalidState(format!(
                "{} requires an empty pipeline",
                command.name()
            )));
        }

        let tag = self.tag_gen.next();
        let encoded = command.encode(&tag, self.literal_mode());

        if encoded.needs_continuation() && !self.pending.is_empty() {
            return Err(Error::InvalidState(
                "literal-bearing commands cannot join a pipeline".to_string(),
            ));
        }

        let mut transmits: Vec<Transmit> = Vec::new();
        for segment in encoded.segments {
            match segment {
                Segment::Data(data) => transmits.push(Transmit::new(data)),
                Segment::WaitForContinuation => {
                    if let Some(last) = transmits.last_mut() {
                        last.awaits_continuation = true;
                    }
                }
            }
        }
        self.outbound.extend(transmits);

        let handle = CommandHandle {
            tag: Tag::new(&tag),
        };

        if matches!(command, Command::Idle) {
            self.idle_tag = Some(handle.tag.clone());
        }

        tracing::debug!(tag, command = command.name(), "queued");

        self.pending.push_back(PendingCommand {
            handle: handle.clone(),
            kind: CommandKind::of(command),
            exclusive,
            responses: Vec::new(),
        });

        Ok(handle)
    }

    /// Queues the tagless DONE that terminates IDLE.
    pub fn queue_done(&mut self) {
        self.outbound
            .push_back(Transmit::new(b"DONE\r\n".to_vec()));
        // idle_tag clears when the tagged IDLE completion arrives
    }

    /// Queues raw bytes (a SASL challenge response plus CRLF).
    pub fn queue_raw_line(&mut self, line: &[u8]) {
        let mut data = line.to_vec();
        data.extend_from_slice(b"\r\n");
        self.outbound.push_back(Transmit::new(data));
    }

    /// Returns the next transmit, honoring continuation pacing.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        if self.awaiting_continuation {
            return None;
        }
        let transmit = self.outbound.pop_front()?;
        if transmit.awaits_continuation {
            self.awaiting_continuation = true;
        }
        Some(transmit)
    }

    /// Processes one complete response, applying untagged updates to the
    /// sink before any completion is surfaced.
    ///
    /// # Errors
    ///
    /// Parse failures, unknown tags and sink-reported invariant violations
    /// are protocol violations, fatal to the session.
    pub fn handle_response(
        &mut self,
        bytes: &[u8],
        sink: &mut dyn UpdateSink,
    ) -> Result<Vec<EngineEvent>> {
        let response = ResponseParser::parse(bytes)?;
        let mut events = Vec::new();

        match response {
            Response::Tagged {
                tag,
                status,
                code,
                text,
            } => {
                if let Some(event) = self.handle_tagged(tag, status, code, text)? {
                    events.push(event);
                }
            }
            Response::Untagged(untagged) => {
                if let Some(event) = self.handle_untagged(untagged, sink)? {
                    events.push(event);
                }
            }
            Response::Continuation { text } => {
                if self.awaiting_continuation {
                    // A paced literal may now flow
                    self.awaiting_continuation = false;
                } else {
                    events.push(EngineEvent::Continuation {
                        text: text.unwrap_or_default(),
                    });
                }
            }
        }

        Ok(events)
    }

    /// Handles a tagged completion.
    fn handle_tagged(
        &mut self,
        tag: Tag,
        status: Status,
        code: Option<ResponseCode>,
        text: String,
    ) -> Result<Option<EngineEvent>> {
        let position = self
            .pending
            .iter()
            .position(|p| p.handle.tag == tag)
            .ok_or_else(|| {
                Error::Protocol(format!("tagged response for unknown tag {tag}"))
            })?;

        let pending = self
            .pending
            .remove(position)
            .ok_or_else(|| Error::Protocol("pending queue desynchronized".to_string()))?;

        if self.idle_tag.as_ref() == Some(&tag) {
            self.idle_tag = None;
        }

        if let Some(ResponseCode::Capability(caps)) = &code {
            self.capabilities.clone_from(caps);
        }

        self.apply_transition(&pending, status, code.as_ref());

        Ok(Some(EngineEvent::CommandComplete {
            handle: pending.handle,
            result: CommandResult {
                status,
                code,
                text,
                responses: pending.responses,
            },
        }))
    }

    /// Applies the state transition a completed command implies.
    fn apply_transition(
        &mut self,
        pending: &PendingCommand,
        status: Status,
        code: Option<&ResponseCode>,
    ) {
        match (&pending.kind, status) {
            (CommandKind::Login | CommandKind::Authenticate, Status::Ok) => {
                self.state = SessionState::Authenticated;
                // Capabilities changed across the auth boundary; drop them
                // unless this exchange already refreshed the registry.
                let refreshed = matches!(code, Some(ResponseCode::Capability(_)))
                    || pending
                        .responses
                        .iter()
                        .any(|r| matches!(r, UntaggedResponse::Capability(_)));
                if !refreshed {
                    self.capabilities.clear();
                }
            }
            (CommandKind::StartTls, Status::Ok) => {
                // Pre-TLS capabilities are untrustworthy
                self.capabilities.clear();
            }
            (CommandKind::Select { mailbox, read_only }, Status::Ok) => {
                let read_only = match code {
                    Some(ResponseCode::ReadOnly) => true,
                    Some(ResponseCode::ReadWrite) => false,
                    _ => *read_only,
                };
                self.state = SessionState::Selected(SelectedState {
                    mailbox: mailbox.clone(),
                    read_only,
                });
            }
            (CommandKind::Select { .. }, Status::No) => {
                // A failed SELECT leaves no mailbox selected
                self.state = SessionState::Authenticated;
            }
            (CommandKind::Deselect, Status::Ok) => {
                self.state = SessionState::Authenticated;
            }
            (CommandKind::Logout, _) => {
                self.state = SessionState::Closed;
            }
            _ => {}
        }
    }

    /// Handles an untagged response.
    fn handle_untagged(
        &mut self,
        untagged: UntaggedResponse,
        sink: &mut dyn UpdateSink,
    ) -> Result<Option<EngineEvent>> {
        // Greeting: the very first untagged status response
        if !self.greeting_received {
            if let UntaggedResponse::Ok { code, text }
            | UntaggedResponse::PreAuth { code, text }
            | UntaggedResponse::Bye { code, text } = &untagged
            {
                return Ok(Some(self.consume_greeting(&untagged, code.clone(), text.clone())));
            }
        }

        match &untagged {
            UntaggedResponse::Capability(caps) => {
                self.capabilities.clone_from(caps);
            }
            UntaggedResponse::Enabled(caps) => {
                for cap in caps {
                    if !self.enabled.contains(cap) {
                        self.enabled.push(cap.clone());
                    }
                }
            }
            UntaggedResponse::Ok {
                code: Some(ResponseCode::Capability(caps)),
                ..
            } => {
                self.capabilities.clone_from(caps);
            }
            UntaggedResponse::Bye { text, .. } => {
                self.state = SessionState::Closed;
                return Ok(Some(EngineEvent::Disconnected { text: text.clone() }));
            }
            _ => {}
        }

        // Mailbox state first, then bookkeeping: observers see the update
        // before any completion is surfaced.
        sink.apply(&untagged)?;

        if let Some(front) = self.pending.front_mut() {
            front.responses.push(untagged);
        }

        Ok(None)
    }

    /// Consumes the connection greeting.
    fn consume_greeting(
        &mut self,
        untagged: &UntaggedResponse,
        code: Option<ResponseCode>,
        text: String,
    ) -> EngineEvent {
        self.greeting_received = true;

        let status = match untagged {
            UntaggedResponse::PreAuth { .. } => {
                self.state = SessionState::Authenticated;
                Status::PreAuth
            }
            UntaggedResponse::Bye { .. } => {
                self.state = SessionState::Closed;
                Status::Bye
            }
            _ => {
                self.state = SessionState::NotAuthenticated;
                Status::Ok
            }
        };

        if let Some(ResponseCode::Capability(caps)) = &code {
            self.capabilities.clone_from(caps);
        }

        tracing::debug!(?status, "greeting consumed");

        EngineEvent::Greeting { status, code, text }
    }

    /// Abandons all in-flight commands, returning their handles.
    ///
    /// Used when the transport fails; the session surfaces the failure to
    /// each caller with a retry hint.
    pub fn take_pending(&mut self) -> Vec<CommandHandle> {
        self.pending.drain(..).map(|p| p.handle).collect()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities.len())
            .field("pending", &self.pending.len())
            .field("outbound", &self.outbound.len())
            .field("awaiting_continuation", &self.awaiting_continuation)
            .field("is_idle", &self.idle_tag.is_some())
            .finish_non_exhaustive()
    }
}
