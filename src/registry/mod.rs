//! Listener registry and broadcast fan-out
//!
//! The registry owns one bounded channel per connected listener. The active
//! pump hands every paced chunk to [`ClientRegistry::broadcast`], which copies
//! it to all live listeners.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ClientRegistry>
//!                  ┌──────────────────────────────┐
//!                  │ listeners: HashMap<Id,       │
//!                  │   mpsc::Sender<Bytes>>       │
//!                  └──────────────┬───────────────┘
//!                                 │
//!     [ThrottledPump] ──► broadcast(chunk)
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!    [Listener 1]            [Listener 2]            [Listener N]
//!    rx.recv()               rx.recv()               rx.recv()
//! ```
//!
//! # Delivery policy
//!
//! Sends use `try_send`, so a slow listener never stalls the others or the
//! pump. A listener whose buffer is full is dropped; one whose receiver is gone
//! is removed. Both are pruned in the same call that detects them. Chunks are
//! `bytes::Bytes`, so every listener shares one allocation.

pub mod config;
pub mod listener;
pub mod store;

pub use config::RegistryConfig;
pub use listener::{Listener, ListenerId};
pub use store::ClientRegistry;
