use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, FromSample, Host, Sample, SampleFormat, SizedSample, Stream as CpalStream,
};
use std::sync::Arc;

use super::{AudioCaptureConfig, AudioCaptureError, AudioDeviceInfo, AudioFrame, Mailbox};

/// Microphone capture driven by the audio driver's callback thread.
///
/// Every completed frame is posted to the shared mailbox; the stream stops
/// when this value is dropped.
pub struct CpalAudioCapture {
    config: AudioCaptureConfig,
    stream: Option<CpalStream>,
    _host: Host,
}

fn find_device(host: &Host, wanted: Option<&str>) -> Result<Device, AudioCaptureError> {
    let Some(wanted) = wanted else {
        return host
            .default_input_device()
            .ok_or_else(|| AudioCaptureError::Device("No default input device found".into()));
    };

    let devices: Vec<Device> = host
        .input_devices()
        .map_err(|e| AudioCaptureError::Device(e.to_string()))?
        .collect();

    // Numeric values select by index, as listed by `--list-devices`
    if let Ok(index) = wanted.parse::<usize>() {
        return devices
            .into_iter()
            .nth(index)
            .ok_or_else(|| AudioCaptureError::Device(format!("No input device #{}", index)));
    }

    devices
        .into_iter()
        .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
        .ok_or_else(|| AudioCaptureError::Device(format!("Device not found: {}", wanted)))
}

impl CpalAudioCapture {
    pub fn start(
        config: AudioCaptureConfig,
        frames: Arc<Mailbox<AudioFrame>>,
    ) -> Result<Self, AudioCaptureError> {
        let host = cpal::default_host();
        let device = find_device(&host, config.device.as_deref())?;
        let sample_rate = config.sample_rate;

        let supported_configs: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| AudioCaptureError::Config(e.to_string()))?
            .collect();

        // The recognizer is told the configured rate, so the device must run at it
        let supported_config = supported_configs
            .iter()
            .find(|c| {
                c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate
            })
            .map(|c| c.with_sample_rate(cpal::SampleRate(sample_rate)))
            .ok_or_else(|| {
                AudioCaptureError::Config(format!(
                    "Input device does not support {} Hz",
                    sample_rate
                ))
            })?;

        if config.channel >= u32::from(supported_config.channels()) {
            return Err(AudioCaptureError::Config(format!(
                "Selected channel {} is not available (device has {} channels)",
                config.channel,
                supported_config.channels()
            )));
        }

        let stream_config = cpal::StreamConfig {
            channels: supported_config.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        log::info!(
            "Audio capture configured: {} channels @ {}Hz (format: {:?})",
            stream_config.channels,
            sample_rate,
            supported_config.sample_format()
        );

        let stream = match supported_config.sample_format() {
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &stream_config, &config, frames)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &stream_config, &config, frames)?,
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &stream_config, &config, frames)?,
            other => {
                return Err(AudioCaptureError::Config(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| AudioCaptureError::Stream(e.to_string()))?;

        Ok(Self {
            config,
            stream: Some(stream),
            _host: host,
        })
    }

    fn build_stream<T>(
        device: &Device,
        stream_config: &cpal::StreamConfig,
        config: &AudioCaptureConfig,
        frames: Arc<Mailbox<AudioFrame>>,
    ) -> Result<CpalStream, AudioCaptureError>
    where
        T: Sample + SizedSample + Send + Sync + 'static,
        i16: FromSample<T>,
    {
        let frame_samples = config.frame_samples.max(1);
        let sample_rate = config.sample_rate;
        let channel = config.channel as usize;
        let channels = stream_config.channels as usize;
        let mut buffer: Vec<i16> = Vec::with_capacity(frame_samples);

        device
            .build_input_stream(
                stream_config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels) {
                        if let Some(sample) = frame.get(channel) {
                            buffer.push(i16::from_sample(*sample));
                            if buffer.len() >= frame_samples {
                                let samples = std::mem::replace(
                                    &mut buffer,
                                    Vec::with_capacity(frame_samples),
                                );
                                frames.post(AudioFrame::new(samples, sample_rate));
                            }
                        }
                    }
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioCaptureError::Stream(e.to_string()))
    }

    pub fn config(&self) -> &AudioCaptureConfig {
        &self.config
    }

    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::info!("🎤 Audio capture stopped");
        }
    }
}

impl Drop for CpalAudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn list_devices() -> Result<Vec<AudioDeviceInfo>, AudioCaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioCaptureError::Device(e.to_string()))?;

    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut result = Vec::new();
    for (index, device) in devices.enumerate() {
        let Ok(name) = device.name() else {
            continue;
        };
        let channel_count = device
            .default_input_config()
            .map(|c| u32::from(c.channels()))
            .unwrap_or(0);
        result.push(AudioDeviceInfo {
            index,
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            channel_count,
        });
    }

    Ok(result)
}
