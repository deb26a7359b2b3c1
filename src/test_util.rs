//! In-memory stand-ins for the external collaborators

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytes::Bytes;

use crate::media::{AssetStore, ProgramStream};
use crate::mixer::{AudioMixer, MixError, MixGains, MixRejected};
use crate::probe::{BitrateProbe, ProbeError};

/// Probe returning a fixed answer
pub(crate) struct FakeProbe {
    result: Option<u64>,
    calls: AtomicUsize,
}

impl FakeProbe {
    pub(crate) fn fixed(bps: u64) -> Self {
        Self {
            result: Some(bps),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            result: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BitrateProbe for FakeProbe {
    async fn probe(&self, _asset: &Path) -> Result<u64, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .ok_or_else(|| ProbeError::Reported("error!".to_string()))
    }
}

/// Store serving one in-memory program and a fixed effect list
pub(crate) struct FakeStore {
    program: Option<Bytes>,
    effects: Option<Vec<PathBuf>>,
}

impl FakeStore {
    /// Program of `len` patterned bytes
    pub(crate) fn new(len: usize) -> Self {
        let program: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        Self {
            program: Some(Bytes::from(program)),
            effects: Some(vec![
                PathBuf::from("audio/fx/Applause Sound Effect HD.mp3"),
                PathBuf::from("audio/fx/Boo! Sound Effect.mp3"),
            ]),
        }
    }

    pub(crate) fn missing_program() -> Self {
        Self {
            program: None,
            ..Self::new(0)
        }
    }

    pub(crate) fn without_effects_dir(mut self) -> Self {
        self.effects = None;
        self
    }

    pub(crate) fn program_bytes(&self) -> &[u8] {
        self.program.as_deref().unwrap_or_default()
    }
}

impl AssetStore for FakeStore {
    async fn open(&self, asset: &Path) -> io::Result<ProgramStream> {
        match &self.program {
            Some(program) => Ok(Box::new(Cursor::new(program.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", asset.display()),
            )),
        }
    }

    async fn effects(&self) -> io::Result<Vec<PathBuf>> {
        self.effects
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no effects directory"))
    }
}

/// Mixer that hands the program back unchanged, or refuses to launch
pub(crate) struct FakeMixer {
    fail: bool,
    calls: AtomicUsize,
    mixed: Mutex<Vec<PathBuf>>,
}

impl FakeMixer {
    pub(crate) fn passthrough() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
            mixed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::passthrough()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Effects successfully mixed, in order
    pub(crate) fn mixed(&self) -> Vec<PathBuf> {
        self.mixed.lock().unwrap().clone()
    }
}

impl AudioMixer for FakeMixer {
    async fn mix(
        &self,
        program: ProgramStream,
        effect: &Path,
        _gains: MixGains,
    ) -> Result<ProgramStream, MixRejected> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            let error = io::Error::new(io::ErrorKind::NotFound, "sox not found");
            return Err(MixRejected::new(program, MixError::Launch(error)));
        }

        self.mixed.lock().unwrap().push(effect.to_path_buf());
        Ok(program)
    }
}
