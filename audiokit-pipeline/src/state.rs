//! Per-stage lifecycle tracking for the pull-based pipelines.

/// Lifecycle of one codec stage inside a running pipeline.
///
/// A stage moves strictly forward: it accepts input while `Feeding`, stops
/// accepting input once upstream has signalled end of stream (`Draining`),
/// emits any internally buffered output (`Flushing`), and is `Done` once its
/// end-of-stream marker has been observed downstream. Replacing ad-hoc
/// boolean flags with this enum makes illegal regressions (a done stage
/// accepting input again) unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Accepting input samples.
    Feeding,
    /// Input exhausted, end of stream queued, still producing output.
    Draining,
    /// No more input will arrive; emitting buffered output.
    Flushing,
    /// End-of-stream marker has passed through this stage.
    Done,
}

impl StageState {
    /// Whether the stage still accepts input.
    pub fn accepts_input(self) -> bool {
        matches!(self, StageState::Feeding)
    }

    /// Whether the stage may still produce output.
    pub fn may_produce(self) -> bool {
        !matches!(self, StageState::Done)
    }

    /// Advance past the feeding phase. No-op if already past it.
    pub fn finish_feeding(&mut self) {
        if *self == StageState::Feeding {
            *self = StageState::Draining;
        }
    }

    /// Mark that the stage's end-of-stream output was observed.
    pub fn finish(&mut self) {
        *self = StageState::Done;
    }
}

impl Default for StageState {
    fn default() -> Self {
        StageState::Feeding
    }
}

/// Counters accumulated while a pipeline runs, reported in completion logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineStats {
    /// Encoded samples pulled from the source.
    pub source_samples: u64,
    /// PCM buffers produced by the decoder.
    pub decoded_buffers: u64,
    /// Encoded samples written to the sink.
    pub muxed_samples: u64,
    /// Total bytes written to the sink.
    pub muxed_bytes: u64,
    /// Last presentation timestamp written, in microseconds.
    pub last_pts_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_state_progression() {
        let mut state = StageState::default();
        assert!(state.accepts_input());
        assert!(state.may_produce());

        state.finish_feeding();
        assert_eq!(state, StageState::Draining);
        assert!(!state.accepts_input());
        assert!(state.may_produce());

        // Second call does not regress or skip ahead.
        state.finish_feeding();
        assert_eq!(state, StageState::Draining);

        state.finish();
        assert_eq!(state, StageState::Done);
        assert!(!state.may_produce());
    }
}
