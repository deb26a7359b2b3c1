//! Broadcast session implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::command::{Command, CommandReply};
use super::config::BroadcastConfig;
use super::state::PipelineState;
use crate::error::{Error, Result};
use crate::media::{find_effect, AssetStore, FileStore};
use crate::mixer::{AudioMixer, SoxMixer};
use crate::probe::{resolve_bitrate, BitrateProbe, SoxProbe};
use crate::pump::{PumpId, Quiesced, ThrottledPump};
use crate::registry::{ClientRegistry, Listener, ListenerId};
use crate::stats::{BroadcastStats, StatsSnapshot};

/// Session bound to the filesystem and the `sox` tool
pub type SoxSession = BroadcastSession<FileStore, SoxProbe, SoxMixer>;

/// The broadcast orchestrator
///
/// Owns the listener registry and the single active pump. Share it behind an
/// `Arc`; every method takes `&self`.
pub struct BroadcastSession<S, P, M> {
    store: S,
    probe: P,
    mixer: M,
    config: BroadcastConfig,
    registry: Arc<ClientRegistry>,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    state: PipelineState,
    source: Option<PathBuf>,
    bitrate_bps: u64,
    active: Option<ThrottledPump>,
    effects: Vec<PathBuf>,
}

impl SessionInner {
    fn transition(&mut self, next: PipelineState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            tracing::error!(from = %self.state, to = %next, "Invalid pipeline transition ignored");
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
    }
}

impl SoxSession {
    /// Build a production session from configuration
    pub fn from_config(config: BroadcastConfig) -> Self {
        let store = FileStore::new(&config.fx_dir);
        let probe = SoxProbe::new(&config.sox_program, config.probe_timeout);
        let mixer = SoxMixer::new(&config.sox_program, &config.audio_format)
            .startup_timeout(config.mix_startup_timeout);
        Self::new(config, store, probe, mixer)
    }
}

impl<S, P, M> BroadcastSession<S, P, M>
where
    S: AssetStore,
    P: BitrateProbe,
    M: AudioMixer,
{
    /// Create an idle session
    pub fn new(config: BroadcastConfig, store: S, probe: P, mixer: M) -> Self {
        let stats = Arc::new(BroadcastStats::new());
        let registry = Arc::new(ClientRegistry::with_stats(config.registry.clone(), stats));

        Self {
            store,
            probe,
            mixer,
            config,
            registry,
            inner: Mutex::new(SessionInner {
                state: PipelineState::Idle,
                source: None,
                bitrate_bps: 0,
                active: None,
                effects: Vec::new(),
            }),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Listener registry fed by the active pump
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Start broadcasting the configured program
    ///
    /// No-op unless idle. A missing program asset leaves the session idle.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.state != PipelineState::Idle {
            tracing::debug!(state = %inner.state, "Start ignored, already broadcasting");
            return Ok(());
        }

        let asset = &self.config.program;
        tracing::info!(program = %asset.display(), "Starting broadcast");

        let bitrate = resolve_bitrate(&self.probe, asset, self.config.pump.fallback_bitrate).await;
        let source = self
            .store
            .open(asset)
            .await
            .map_err(|e| Error::source_unavailable(asset, Some(e)))?;

        let pump = ThrottledPump::spawn(
            source,
            bitrate,
            &self.config.pump,
            Arc::clone(&self.registry),
        );

        tracing::info!(pump = %pump.id(), bitrate = bitrate, "Broadcast started");

        inner.active = Some(pump);
        inner.source = Some(asset.clone());
        inner.bitrate_bps = bitrate;
        inner.transition(PipelineState::Playing);

        Ok(())
    }

    /// Stop broadcasting
    ///
    /// Tears down any effect splice along with the pump. Once this returns no
    /// listener receives new bytes until the next `start()`. No-op when idle.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;

        if inner.state == PipelineState::Idle {
            tracing::debug!("Stop ignored, already idle");
            return;
        }

        if let Some(pump) = inner.active.take() {
            let id = pump.id();
            let exit = pump.stop().await;
            tracing::info!(pump = %id, exit = ?exit, "Broadcast stopped");
        }

        inner.effects.clear();
        inner.transition(PipelineState::Idle);
    }

    /// Splice an effect into the live broadcast
    ///
    /// The effect is found by case-insensitive substring match. Its path is
    /// returned on success. Injections are serialized: each one quiesces the
    /// then-active pump, mixes the effect over that pump's upstream, and
    /// swaps a fresh pump in before the old one is closed.
    ///
    /// If the mixer can't be started, the upstream is resumed unmixed on a
    /// fresh pump and the error is returned. The successor pump continues the
    /// quiesced pump's pacing clock, so splices never speed up delivery.
    pub async fn inject_effect(&self, name: &str) -> Result<PathBuf> {
        if name.trim().is_empty() {
            return Err(Error::UnknownCommand(name.to_string()));
        }

        let effects = self.store.effects().await?;
        let effect = find_effect(&effects, name)
            .ok_or_else(|| Error::EffectNotFound(name.trim().to_string()))?;

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if !inner.state.is_broadcasting() {
            return Err(Error::NotBroadcasting);
        }

        let (next, inlet) = ThrottledPump::pending(
            inner.bitrate_bps,
            &self.config.pump,
            Arc::clone(&self.registry),
        );

        let source = inner.source.clone().unwrap_or_default();
        let current = match inner.active.as_mut() {
            Some(current) => current,
            None => return Err(Error::source_unavailable(source, None)),
        };
        let old_id = current.id();

        let Quiesced { upstream, resume_at } = match current.quiesce().await {
            Some(quiesced) => quiesced,
            None => {
                // Source already ran out; retire the finished pump
                if let Some(ended) = inner.active.take() {
                    let exit = ended.close().await;
                    tracing::info!(pump = %old_id, exit = ?exit, "Active pump had already ended");
                }
                return Err(Error::source_unavailable(source, None));
            }
        };

        let (stream, mix_error) = match self.mixer.mix(upstream, &effect, self.config.gains).await {
            Ok(mixed) => (mixed, None),
            Err(rejected) => {
                let (program, error) = rejected.into_parts();
                (program, Some(error))
            }
        };

        let next = match inlet.resume(stream, resume_at) {
            Ok(()) => next,
            Err(stream) => {
                tracing::warn!(pump = %next.id(), "Successor pump gone, respawning");
                ThrottledPump::spawn(
                    stream,
                    inner.bitrate_bps,
                    &self.config.pump,
                    Arc::clone(&self.registry),
                )
            }
        };
        let new_id = next.id();

        if let Some(old) = inner.active.replace(next) {
            old.close().await;
        }

        match mix_error {
            None => {
                inner.effects.push(effect.clone());
                inner.transition(PipelineState::Mixing);
                self.registry.stats().record_splice();

                tracing::info!(
                    effect = %effect.display(),
                    from = %old_id,
                    to = %new_id,
                    layers = inner.effects.len(),
                    "Effect spliced"
                );
                Ok(effect)
            }
            Some(error) => {
                self.registry.stats().record_mix_failure();

                tracing::warn!(
                    effect = %effect.display(),
                    error = %error,
                    pump = %new_id,
                    "Mix failed, resumed without effect"
                );
                Err(Error::Mix(error))
            }
        }
    }

    /// Interpret and run a listener command
    ///
    /// Never fails: errors are folded into the reply.
    pub async fn handle_command(&self, text: &str) -> CommandReply {
        tracing::info!(command = %text, "Command received");

        let result = match Command::parse(text) {
            Ok(Command::Start) => self.start().await,
            Ok(Command::Stop) => {
                self.stop().await;
                Ok(())
            }
            Ok(Command::Effect(name)) => self.inject_effect(&name).await.map(|effect| {
                tracing::debug!(effect = %effect.display(), "Added effect");
            }),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => CommandReply::ok(text.trim()),
            Err(e) => {
                tracing::warn!(command = %text, error = %e, "Command failed");
                CommandReply::from(e)
            }
        }
    }

    /// Connect a new listener
    pub async fn new_listener(&self) -> Listener {
        self.registry.register().await
    }

    /// Disconnect a listener; unknown ids are ignored
    pub async fn close_listener(&self, id: ListenerId) {
        self.registry.unregister(id).await;
    }

    /// Current pipeline state
    pub async fn state(&self) -> PipelineState {
        self.inner.lock().await.state
    }

    /// Identity of the pump currently feeding listeners
    pub async fn active_pump(&self) -> Option<PumpId> {
        self.inner.lock().await.active.as_ref().map(|p| p.id())
    }

    /// Bitrate of the current broadcast, 0 before the first start
    pub async fn bitrate(&self) -> u64 {
        self.inner.lock().await.bitrate_bps
    }

    /// Program asset being broadcast
    pub async fn current_source(&self) -> Option<PathBuf> {
        self.inner.lock().await.source.clone()
    }

    /// Effects layered into the current broadcast, oldest first
    pub async fn active_effects(&self) -> Vec<PathBuf> {
        self.inner.lock().await.effects.clone()
    }

    /// Snapshot of broadcast statistics
    pub fn stats(&self) -> StatsSnapshot {
        self.registry.stats().snapshot()
    }

    /// Path of the configured program asset
    pub fn program(&self) -> &Path {
        &self.config.program
    }
}
