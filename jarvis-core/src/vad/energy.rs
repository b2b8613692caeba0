//! Energy-based voice activity detection.
//!
//! Uses mean absolute amplitude as a simple energy metric.

/// Compute the energy level of an audio chunk.
///
/// Returns the mean absolute value of the samples, a simple proxy for
/// signal energy that works well enough for speech/silence discrimination.
pub fn detect(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f32 = chunk.iter().map(|s| s.abs()).sum();
    sum / chunk.len() as f32
}

/// Whether `chunk` is loud enough to count as speech.
pub fn is_speech(chunk: &[f32], threshold: f32) -> bool {
    detect(chunk) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_is_mean_absolute_amplitude() {
        assert_eq!(detect(&[0.5, -0.5, 0.0, 1.0]), 0.5);
        assert_eq!(detect(&[]), 0.0);
    }

    #[test]
    fn test_is_speech_threshold_inclusive() {
        assert!(is_speech(&[0.01, -0.01], 0.01));
        assert!(!is_speech(&[0.001; 4], 0.01));
    }
}
