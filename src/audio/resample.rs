//! Channel downmix and sample-rate conversion.
//!
//! The capture callback uses [`mix_to_mono`] to collapse interleaved device
//! frames; the whisper engine uses [`resample`] to convert chunks captured at
//! the device's native rate down to the 16 kHz it requires.

/// Mix interleaved multi-channel audio down to mono by averaging channels.
///
/// Output length is `samples.len() / channels`.  `channels == 1` copies the
/// input unchanged; `channels == 0` yields an empty vector.
pub fn mix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample `samples` from `source_rate` Hz to `target_rate` Hz by linear
/// interpolation.
///
/// Equal rates are a copying no-op.  Output length is approximately
/// `samples.len() × target_rate / source_rate`.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
