//! Alice Session - protocol engine for the Alice conversational gateway.
//!
//! The gateway speaks JSON over a persistent WebSocket. A question may be
//! answered in several parts ("continuations"), and the gateway may drop the
//! session at any time with a `GoAway` directive.
//!
//! ## Architecture
//!
//! ```text
//! AliceClient.ask → SessionEngine ─→ EnvelopeBuilder → DuplexChannel.send
//!                        ↑                                   ↓
//!                        └── reply::parse ←──────── DuplexChannel.recv
//! ```
//!
//! - [`identity`]: opaque and numeric ids
//! - [`envelope`]: request documents and session state
//! - [`reply`]: reply parsing and teardown detection
//! - [`transport`]: duplex channel trait and the WebSocket implementation
//! - [`session`]: send/receive/continue loop and reconnect handling
//! - [`version`]: client version lookup
//! - [`client`]: shareable handle with busy detection

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod client;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod reply;
pub mod session;
pub mod transport;
pub mod version;

// Re-export commonly used types
pub use client::{AliceClient, SessionInfo};
pub use envelope::{DeviceProfile, Envelope, EnvelopeBuilder, EnvelopeKind, SessionState};
pub use error::{SessionError, SessionResult};
pub use identity::IdGenerator;
pub use reply::{FragmentShape, Reply, ReplyPart};
pub use session::{EngineOptions, Phase, SessionEngine, SessionEvent};
pub use transport::{Connector, DuplexChannel, Incoming, WsConnector};
pub use tokio_util::sync::CancellationToken;
