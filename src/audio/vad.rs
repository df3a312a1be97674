//! Energy-based voice-activity gate.
//!
//! A chunk whose root-mean-square amplitude exceeds the configured threshold
//! is treated as containing voice.  This is a heuristic gate, not a
//! classifier: chunks it rejects are silence as far as the rest of the system
//! is concerned and are discarded before they ever reach the transcription
//! queue.

/// RMS amplitude gate.
#[derive(Debug, Clone)]
pub struct EnergyGate {
    /// Chunks with RMS at or below this value are treated as silence.
    threshold: f32,
}

impl EnergyGate {
    /// Create a gate with the given RMS threshold.
    ///
    /// `0.01` is a reasonable default for a quiet room; raise it in noisy
    /// environments.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Threshold currently in use.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Root-mean-square amplitude of `samples`; `0.0` for an empty slice.
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let mean_sq = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
        mean_sq.sqrt()
    }

    /// Returns `true` when `samples` contains voice activity.
    pub fn is_voice(&self, samples: &[f32]) -> bool {
        Self::rms(samples) > self.threshold
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_rejected() {
        let gate = EnergyGate::new(0.01);
        assert!(!gate.is_voice(&vec![0.0_f32; 8_000]));
    }

    #[test]
    fn loud_signal_passes() {
        let gate = EnergyGate::new(0.01);
        assert!(gate.is_voice(&vec![0.5_f32; 8_000]));
    }

    #[test]
    fn empty_chunk_is_rejected() {
        let gate = EnergyGate::new(0.01);
        assert!(!gate.is_voice(&[]));
    }

    #[test]
    fn rms_of_constant_signal() {
        // RMS of a constant-amplitude signal equals the amplitude.
        let rms = EnergyGate::rms(&vec![0.25_f32; 1_000]);
        assert!((rms - 0.25).abs() < 1e-6);
    }

    #[test]
    fn threshold_is_exclusive() {
        // RMS exactly at the threshold does not count as voice.
        let gate = EnergyGate::new(0.25);
        assert!(!gate.is_voice(&vec![0.25_f32; 100]));
        assert!(gate.is_voice(&vec![0.26_f32; 100]));
    }
}
