mod mailbox;

#[cfg(feature = "microphone")]
mod imp_cpal;

pub use mailbox::Mailbox;

#[cfg(feature = "microphone")]
pub use imp_cpal::{list_devices, CpalAudioCapture};

use thiserror::Error;

use crate::config::AudioSettings;

/// Samples per frame pushed by the capture callback (0.5 s at 16 kHz)
pub const FRAME_SAMPLES: usize = 8000;

#[derive(Error, Debug)]
pub enum AudioCaptureError {
    #[error("Audio device error: {0}")]
    Device(String),
    #[error("Audio stream error: {0}")]
    Stream(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Audio support not compiled in (enable the `microphone` feature)")]
    Unsupported,
}

/// Audio capture configuration
#[derive(Debug, Clone)]
pub struct AudioCaptureConfig {
    /// Device name or index (None = default device)
    pub device: Option<String>,
    /// Channel to capture (0-based index)
    pub channel: u32,
    pub sample_rate: u32,
    pub frame_samples: usize,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            channel: 0,
            sample_rate: 16_000,
            frame_samples: FRAME_SAMPLES,
        }
    }
}

impl From<&AudioSettings> for AudioCaptureConfig {
    fn from(settings: &AudioSettings) -> Self {
        Self {
            device: settings.input_device.clone(),
            sample_rate: settings.sample_rate,
            ..Default::default()
        }
    }
}

/// Audio device information
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    pub channel_count: u32,
}

/// Mono 16-bit PCM in capture order
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Take one channel out of interleaved samples
pub fn extract_channel<T: Copy>(interleaved: &[T], channel: usize, channels: usize) -> Vec<T> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .filter_map(|frame| frame.get(channel).copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_channel() {
        let stereo = [1i16, -1, 2, -2, 3, -3];
        assert_eq!(extract_channel(&stereo, 0, 2), vec![1, 2, 3]);
        assert_eq!(extract_channel(&stereo, 1, 2), vec![-1, -2, -3]);
        assert_eq!(extract_channel(&stereo, 0, 1), stereo.to_vec());
    }

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(vec![0; 8000], 16_000);
        assert!((frame.duration_secs() - 0.5).abs() < f32::EPSILON);
        assert_eq!(AudioFrame::new(vec![0; 10], 0).duration_secs(), 0.0);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = AudioSettings {
            input_device: Some("2".to_string()),
            sample_rate: 44_100,
        };
        let config = AudioCaptureConfig::from(&settings);
        assert_eq!(config.device.as_deref(), Some("2"));
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.frame_samples, FRAME_SAMPLES);
    }
}
