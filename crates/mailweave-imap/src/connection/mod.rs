//! Connection management.
//!
//! This module owns everything between the engine core and the network:
//! - Configuration (host, port, security, timeouts, cancellation)
//! - The transport adapter (plain/TLS byte stream)
//! - Framed I/O (response lines with committed literals)
//! - The session driver exposing the folder operations
//! - IDLE support for server-pushed updates
//! - The SASL mechanism seam

mod config;
mod framed;
mod idle;
mod sasl;
mod session;
mod stream;

pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use idle::{IdleEvent, IdleHandle};
pub use sasl::SaslMechanism;
pub use session::{Session, TransferProgress};
pub use stream::{ImapStream, connect, create_tls_connector};
