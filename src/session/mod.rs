// session/mod.rs - Chat Session

//! Actor owning all trust and chat state for one chatroom.
//!
//! - `ChatSession` - validator, identity, outbox, roster and pending fetches
//! - `SyncTransport` - network seam; completions come back as messages
//! - `ChatView` - rendering seam
//! - `DiscoveryView` - rendering seam for [`crate::chatroom::DiscoveryService`]
//!
//! Validation chains that need a certificate park their continuation in the
//! fetch tracker and resume when `DataFetched` or `FetchTimedOut` arrives.
//! Late completions for settled fetches are dropped.
//!
//! # Example
//!
//! ```ignore
//! use chronos_chat::session::*;
//!
//! let session = ChatSession::new(settings, identity, validator, transport, view).start();
//!
//! session.send(SendChat { text: "hello".into() }).await??;
//! session.do_send(TreeUpdate { missing });
//! ```

mod actor;
mod messages;
mod transport;

pub use actor::{ChatSession, SessionSettings};
pub use messages::*;
pub use transport::{
    ChatView, DiscoveryView, MemoryTransport, RecordingView, SyncTransport, TransportLog,
    ViewLog,
};
