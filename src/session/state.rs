//! Pipeline state

/// What the session is currently broadcasting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing is flowing
    Idle,
    /// The plain program is flowing
    Playing,
    /// The program is flowing with one or more effects spliced in
    Mixing,
}

impl PipelineState {
    /// Whether moving from `self` to `next` is a valid transition
    ///
    /// Staying in the same state is not a transition and is rejected here;
    /// callers treat it as a no-op instead.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Playing)
                | (Playing, Mixing)
                | (Mixing, Playing)
                | (Playing, Idle)
                | (Mixing, Idle)
        )
    }

    /// Whether a pump should be feeding listeners in this state
    pub fn is_broadcasting(self) -> bool {
        !matches!(self, PipelineState::Idle)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Playing => "playing",
            PipelineState::Mixing => "mixing",
        };
        f.write_str(name)
    }
}
