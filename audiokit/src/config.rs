//! Configuration types and defaults

use std::time::Duration;

/// Toolkit-wide defaults applied to every operation.
#[derive(Debug, Clone)]
pub struct ToolkitConfig {
    /// Target bit rate for encoded output, in bits per second
    pub bit_rate: u32,
    /// Sample rate used when the source does not declare one, in Hz
    pub sample_rate: u32,
    /// Waveform amplitudes produced per second of audio
    pub samples_per_second: u32,
    /// Bounded-poll timeout for codec dequeues
    pub poll_timeout: Duration,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            bit_rate: 128_000,
            sample_rate: 44_100,
            samples_per_second: 100,
            poll_timeout: Duration::from_millis(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ToolkitConfig::default();
        assert_eq!(config.bit_rate, 128_000);
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.samples_per_second, 100);
        assert_eq!(config.poll_timeout, Duration::from_millis(10));
    }
}
