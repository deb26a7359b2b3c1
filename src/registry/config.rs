//! Registry configuration

/// Configuration for the listener registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Per-listener buffer, in chunks. A listener that falls this far behind is dropped.
    pub listener_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            // ~6s of audio at the default 100ms pacing tick
            listener_buffer: 64,
        }
    }
}

impl RegistryConfig {
    /// Set the per-listener buffer size (minimum 1)
    pub fn listener_buffer(mut self, chunks: usize) -> Self {
        self.listener_buffer = chunks.max(1);
        self
    }
}
