//! Listener handle

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Opaque listener identifier, never reused within a process
pub type ListenerId = u64;

/// Receiving end of a listener's output channel
///
/// Dropping the handle closes the channel; the registry notices on the next
/// broadcast and removes the entry.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    rx: mpsc::Receiver<Bytes>,
}

impl Listener {
    pub(super) fn new(id: ListenerId, rx: mpsc::Receiver<Bytes>) -> Self {
        Self { id, rx }
    }

    /// Registry key for this listener
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next chunk
    ///
    /// Returns `None` once the listener has been removed from the registry
    /// and its buffer is drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a buffered chunk without waiting
    pub fn try_recv(&mut self) -> Result<Bytes, TryRecvError> {
        self.rx.try_recv()
    }

    /// Close the receiving side, keeping already-buffered chunks readable
    pub fn close(&mut self) {
        self.rx.close();
    }
}
