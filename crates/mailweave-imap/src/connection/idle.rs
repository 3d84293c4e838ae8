//! IMAP IDLE support (RFC 2177).
//!
//! IDLE parks the session so the server can stream untagged updates
//! without polling. The handle ends the command with `DONE`; cancellation
//! during IDLE is the one case that does not disconnect: `DONE` is
//! written and the normal completion awaited, leaving the session in
//! Selected.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::Command;
use crate::parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
use crate::protocol::{CommandHandle, EngineEvent};
use crate::types::{Capability, Flags, SeqNum, Uid};
use crate::{Error, Result};

use super::session::Session;

/// Event received during IDLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleEvent {
    /// New message count (EXISTS).
    Exists(u32),
    /// Recent count changed.
    Recent(u32),
    /// Message expunged.
    Expunge(SeqNum),
    /// Messages vanished (QRESYNC).
    Vanished {
        /// The gone UIDs.
        uids: Vec<Uid>,
        /// True for historical replays.
        earlier: bool,
    },
    /// Message flags changed.
    Fetch {
        /// Sequence number.
        seq: SeqNum,
        /// Updated flags.
        flags: Flags,
    },
    /// The wait deadline passed without an event.
    Timeout,
    /// The wait was cancelled; DONE has been sent and acknowledged, and
    /// the session remains selected.
    Cancelled,
    /// The server ended the IDLE on its own.
    ServerEnded,
}

/// Handle for an active IDLE session.
pub struct IdleHandle<'a, S> {
    session: &'a mut Session<S>,
    handle: CommandHandle,
    finished: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Enters IDLE mode.
    ///
    /// Waits for the server's continuation before returning the handle.
    ///
    /// # Errors
    ///
    /// Gated on the IDLE capability and a selected folder; a server
    /// refusal surfaces as the usual tagged error.
    pub async fn idle(&mut self) -> Result<IdleHandle<'_, S>> {
        if !self.has_capability(&Capability::Idle) {
            return Err(Error::CapabilityUnavailable("IDLE".to_string()));
        }
        if !self.state().is_selected() {
            return Err(Error::InvalidState("idle requires a selected folder".to_string()));
        }

        let handle = self.engine.queue(&Command::Idle)?;
        self.flush_outbound().await?;

        loop {
            let bytes = self.read_response_raw().await?;
            let events = self.dispatch(&bytes)?;
            for event in events {
                match event {
                    EngineEvent::Continuation { .. } => {
                        return Ok(IdleHandle {
                            session: self,
                            handle,
                            finished: false,
                        });
                    }
                    EngineEvent::CommandComplete { handle: done, result } if done == handle => {
                        // The server refused IDLE before the continuation
                        return match self.finish(result) {
                            Ok(_) => Err(Error::Protocol(
                                "IDLE completed without a continuation".to_string(),
                            )),
                            Err(e) => Err(e),
                        };
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
}

impl<S> IdleHandle<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Waits for the next server event, the deadline, or cancellation.
    ///
    /// # Errors
    ///
    /// Transport failures and protocol violations. Cancellation is not an
    /// error here: `DONE` is written, the completion awaited, and
    /// [`IdleEvent::Cancelled`] returned with the session still selected.
    pub async fn wait(&mut self, duration: Duration) -> Result<IdleEvent> {
        if self.finished {
            return Err(Error::InvalidState("IDLE already finished".to_string()));
        }

        let deadline = tokio::time::Instant::now() + duration;
        let cancel = self.session.config.cancellation.clone();

        loop {
            enum Wakeup {
                Data(Result<Vec<u8>>),
                Deadline,
                Cancelled,
            }

            let wakeup = {
                let read = self.session.framed.read_response();
                tokio::pin!(read);
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Wakeup::Cancelled,
                    () = tokio::time::sleep_until(deadline) => Wakeup::Deadline,
                    result = &mut read => Wakeup::Data(result),
                }
            };

            let bytes = match wakeup {
                Wakeup::Cancelled => {
                    self.terminate().await?;
                    return Ok(IdleEvent::Cancelled);
                }
                Wakeup::Deadline => return Ok(IdleEvent::Timeout),
                Wakeup::Data(Err(e)) => {
                    self.finished = true;
                    self.session.teardown();
                    return Err(e);
                }
                Wakeup::Data(Ok(bytes)) => bytes,
            };

            // Classify for the caller before routing into folder state
            let parsed = ResponseParser::parse(&bytes);

            let events = self.session.dispatch(&bytes)?;
            for event in events {
                match event {
                    EngineEvent::CommandComplete { handle, .. } if handle == self.handle => {
                        self.finished = true;
                        return Ok(IdleEvent::ServerEnded);
                    }
                    EngineEvent::Disconnected { text } => {
                        self.finished = true;
                        self.session.teardown();
                        return Err(Error::Bye(text));
                    }
                    _ => {}
                }
            }

            if let Ok(Response::Untagged(untagged)) = parsed {
                if let Some(event) = classify(untagged) {
                    return Ok(event);
                }
            }
            // Anything else (OK pings, unknown data) keeps waiting
        }
    }

    /// Exits IDLE mode by sending DONE and awaiting the completion.
    ///
    /// # Errors
    ///
    /// Transport failures or a tagged error completing the IDLE.
    pub async fn done(mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.terminate().await
    }

    /// Writes DONE and drains until the IDLE completion.
    ///
    /// Reads bypass the session's cancellation check: terminating an IDLE
    /// after cancellation is exactly the path that must keep the session
    /// alive.
    async fn terminate(&mut self) -> Result<()> {
        self.finished = true;

        let io_timeout = self.session.config.io_timeout;

        let write = self.session.framed.write_all(b"DONE\r\n");
        match tokio::time::timeout(io_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.session.teardown();
                return Err(e);
            }
            Err(_) => {
                self.session.teardown();
                return Err(Error::Timeout(io_timeout));
            }
        }

        loop {
            let read = self.session.framed.read_response();
            let bytes = match tokio::time::timeout(io_timeout, read).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    self.session.teardown();
                    return Err(e);
                }
                Err(_) => {
                    self.session.teardown();
                    return Err(Error::Timeout(io_timeout));
                }
            };

            let events = self.session.dispatch(&bytes)?;
            for event in events {
                match event {
                    EngineEvent::CommandComplete { handle, result } if handle == self.handle => {
                        return self.session.finish(result).map(|_| ());
                    }
                    EngineEvent::Disconnected { text } => {
                        self.session.teardown();
                        return Err(Error::Bye(text));
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Maps an untagged response to the event surface IDLE callers see.
fn classify(untagged: UntaggedResponse) -> Option<IdleEvent> {
    match untagged {
        UntaggedResponse::Exists(n) => Some(IdleEvent::Exists(n)),
        UntaggedResponse::Recent(n) => Some(IdleEvent::Recent(n)),
        UntaggedResponse::Expunge(seq) => Some(IdleEvent::Expunge(seq)),
        UntaggedResponse::Vanished { earlier, uids } => {
            Some(IdleEvent::Vanished { uids, earlier })
        }
        UntaggedResponse::Fetch { seq, items } => {
            let flags = items
                .into_iter()
                .find_map(|item| match item {
                    FetchItem::Flags(f) => Some(f),
                    _ => None,
                })
                .unwrap_or_default();
            Some(IdleEvent::Fetch { seq, flags })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_exists() {
        assert_eq!(
            classify(UntaggedResponse::Exists(12)),
            Some(IdleEvent::Exists(12))
        );
    }

    #[test]
    fn classify_fetch_extracts_flags() {
        let seq = SeqNum::new(3).expect("nonzero");
        let event = classify(UntaggedResponse::Fetch {
            seq,
            items: vec![FetchItem::Flags(Flags::from_vec(vec![
                crate::types::Flag::Seen,
            ]))],
        });
        match event {
            Some(IdleEvent::Fetch { seq: got, flags }) => {
                assert_eq!(got, seq);
                assert!(flags.is_seen());
            }
            other => panic!("Expected fetch event, got {other:?}"),
        }
    }

    #[test]
    fn classify_ignores_status_pings() {
        let event = classify(UntaggedResponse::Ok {
            code: None,
            text: "still here".to_string(),
        });
        assert!(event.is_none());
    }
}
