//! # mailweave-imap
//!
//! An IMAP4rev1 client engine (RFC 3501 plus the extensions modern
//! servers actually speak): a library that maintains an authenticated,
//! full-duplex session with an IMAP server and exposes mailbox operations
//! to higher-level callers.
//!
//! ## Features
//!
//! - **Sans-I/O engine core**: the session state machine, tag allocator,
//!   capability registry and pipelining gates are pure state
//!   ([`protocol::Engine`]), driven by an async [`Session`]
//! - **Folder subsystem**: per-mailbox state with UIDVALIDITY/UIDNEXT/
//!   HIGHESTMODSEQ invariants and a synchronous observer event surface
//! - **Full operation set**: select/examine, fetch/store/search/sort/
//!   thread, append/replace, copy/move, expunge, quick resynchronization
//!   with QRESYNC, conditional stores with CONDSTORE, and IDLE
//! - **Extension aware**: UIDPLUS, MOVE, ESEARCH/ESORT, LITERAL+/-,
//!   MULTIAPPEND, SPECIAL-USE, OBJECTID, REPLACE, ANNOTATE, METADATA and
//!   the Gmail `X-GM-EXT-1` vendor surface, all behind capability gates
//! - **TLS via rustls**: implicit TLS or STARTTLS, without OpenSSL
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailweave_imap::{Config, FetchRequest, FolderAccess, Session};
//!
//! #[tokio::main]
//! async fn main() -> mailweave_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let mut session = Session::connect(config).await?;
//!     session.login("user@example.com", "password").await?;
//!
//!     for name in session.list("", "*").await? {
//!         println!("folder: {name}");
//!     }
//!
//!     session.open("INBOX", FolderAccess::ReadWrite, None).await?;
//!     let folder = session.selected_folder().expect("selected");
//!     println!("{} messages", folder.count());
//!
//!     let summaries = session
//!         .fetch_range(1, -1, &FetchRequest::metadata())
//!         .await?;
//!     for summary in &summaries {
//!         if let Some(envelope) = &summary.envelope {
//!             println!("{:?}", envelope.subject);
//!         }
//!     }
//!
//!     session.logout().await
//! }
//! ```
//!
//! ## Layering
//!
//! Requests flow down and responses flow up through five layers:
//!
//! ```text
//! caller ──► Session / folder operations      (connection, folder)
//!              │
//!              ▼
//!            Engine: states, tags, pipeline   (protocol, pipeline)
//!              │
//!              ▼
//!            wire codec: commands, responses  (command, parser)
//!              │
//!              ▼
//!            framed transport, TLS            (connection::framed, stream)
//! ```
//!
//! Unsolicited untagged updates travel the other way and are reconciled
//! into [`folder::MailFolder`] state *before* the command that triggered
//! them completes; observers therefore never see a completion precede its
//! own updates.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod folder;
pub mod parser;
pub mod pipeline;
pub mod protocol;
pub mod qresync;
pub mod quirks;
mod request;
mod summary;
pub mod types;

pub use command::{Command, FetchAttribute, StatusAttribute, TagGenerator};
pub use connection::{
    Config, ConfigBuilder, FramedStream, IdleEvent, IdleHandle, ImapStream, SaslMechanism,
    Security, Session, TransferProgress,
};
pub use error::{Error, Result};
pub use folder::{
    CollectingObserver, FolderAccess, FolderEvent, FolderObserver, FolderRegistry,
    LoggingObserver, MailFolder,
};
pub use parser::{Envelope, FetchItem, Response, ResponseParser, UntaggedResponse};
pub use protocol::{Engine, EngineEvent, SessionState};
pub use qresync::{QresyncParams, SyncState};
pub use quirks::ServerType;
pub use request::{
    AppendRequest, FetchRequest, ReplaceRequest, SearchOptions, SearchQuery, SortKey,
    StoreFlagsRequest, StoreLabelsRequest, StoreMode, ThreadingAlgorithm,
};
pub use summary::{MessageSummary, MessageThread, SearchResults};
pub use types::{
    Annotation, Capability, Flag, Flags, Mailbox, MailboxAttribute, ModSeq, SeqNum, SequenceSet,
    Status, Tag, Uid, UidSet, UidValidity, UniqueId, UniqueIdMap,
};

/// IMAP protocol version implemented.
pub const IMAP_VERSION: &str = "IMAP4rev1";
