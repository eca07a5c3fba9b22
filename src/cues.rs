use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::config::ConfigStore;

#[derive(Error, Debug)]
pub enum CueError {
    #[error("Sound file not found: {0}")]
    Missing(PathBuf),
    #[error("Failed to decode WAV: {0}")]
    Decode(#[from] hound::Error),
    #[error("Audio output error: {0}")]
    Output(String),
}

/// Short audio cues played at fixed points of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SoundCue {
    Startup,
    Shutdown,
    /// Wake word heard and notify-tagged commands
    Notification,
    /// Wake timeout
    Click,
}

/// Join handle for a cue playing in the background
#[derive(Debug, Default)]
pub struct CueHandle(Option<JoinHandle<()>>);

impl CueHandle {
    pub fn finished() -> Self {
        Self(None)
    }

    /// Block until the cue is done
    pub fn wait(self) {
        if let Some(handle) = self.0 {
            if handle.join().is_err() {
                log::warn!("⚠️ Cue playback thread panicked");
            }
        }
    }
}

/// Plays named cues; `blocking` waits for the end of playback
pub trait CuePlayer: Send + Sync {
    fn play(&self, cue: SoundCue, blocking: bool) -> CueHandle;
}

/// Decoded mono clip, samples in -1.0..=1.0
#[derive(Debug, Clone)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Clip {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Read a WAV file and mix it down to mono
pub fn load_wav(path: &Path) -> Result<Clip, CueError> {
    if !path.exists() {
        return Err(CueError::Missing(path.to_path_buf()));
    }
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(Clip {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Cue player reading WAV files from `sounds.<name>` or `<sounds dir>/<name>.wav`
#[derive(Debug, Clone)]
pub struct SoundBoard {
    store: ConfigStore,
    sounds_dir: PathBuf,
}

impl SoundBoard {
    pub fn new(store: ConfigStore, sounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            sounds_dir: sounds_dir.into(),
        }
    }

    /// `sounds/` next to the running executable
    pub fn beside_executable(store: ConfigStore) -> Self {
        let dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(store, dir.join("sounds"))
    }

    pub fn path_for(&self, cue: SoundCue) -> PathBuf {
        let name: &'static str = cue.into();
        let configured: String = self.store.get_entry("sounds", name, String::new());
        if configured.trim().is_empty() {
            self.sounds_dir.join(format!("{}.wav", name))
        } else {
            PathBuf::from(configured)
        }
    }
}

impl CuePlayer for SoundBoard {
    fn play(&self, cue: SoundCue, blocking: bool) -> CueHandle {
        let path = self.path_for(cue);
        let spawned = thread::Builder::new()
            .name(format!("cue-{}", cue))
            .spawn(move || {
                let result = load_wav(&path).and_then(|clip| output::play(&clip));
                if let Err(e) = result {
                    log::warn!("⚠️ Could not play {} cue: {}", cue, e);
                }
            });

        let handle = match spawned {
            Ok(handle) => CueHandle(Some(handle)),
            Err(e) => {
                log::error!("❌ Failed to start cue thread: {}", e);
                CueHandle::finished()
            }
        };

        if blocking {
            handle.wait();
            CueHandle::finished()
        } else {
            handle
        }
    }
}

#[cfg(feature = "microphone")]
mod output {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, Sample, SampleFormat, SizedSample};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Clip, CueError};

    pub fn play(clip: &Clip) -> Result<(), CueError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| CueError::Output("No output device found".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| CueError::Output(e.to_string()))?;

        let config = supported.config();
        let samples = Arc::new(clip.samples.clone());
        let position = Arc::new(AtomicUsize::new(0));
        let cursor = Arc::clone(&position);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, clip.sample_rate, samples, cursor)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, clip.sample_rate, samples, cursor)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, clip.sample_rate, samples, cursor)?,
            other => {
                return Err(CueError::Output(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream.play().map_err(|e| CueError::Output(e.to_string()))?;
        std::thread::sleep(Duration::from_secs_f32(clip.duration_secs()) + Duration::from_millis(100));
        log::trace!("Cue played {} frames", position.load(Ordering::Relaxed));
        Ok(())
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        clip_rate: u32,
        samples: Arc<Vec<f32>>,
        cursor: Arc<AtomicUsize>,
    ) -> Result<cpal::Stream, CueError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let channels = usize::from(config.channels);
        let step = clip_rate as f32 / config.sample_rate.0 as f32;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let start = cursor.load(Ordering::Relaxed);
                    let end = fill(data, channels, step, &samples, start);
                    cursor.store(end, Ordering::Relaxed);
                },
                |err| log::error!("Cue stream error: {}", err),
                None,
            )
            .map_err(|e| CueError::Output(e.to_string()))
    }

    /// Write the clip into an interleaved output buffer starting at output
    /// frame `frame_index`, resampling by `step` source samples per frame.
    /// Returns the next frame index.
    pub(super) fn fill<T: Sample + FromSample<f32>>(
        data: &mut [T],
        channels: usize,
        step: f32,
        samples: &[f32],
        mut frame_index: usize,
    ) -> usize {
        for frame in data.chunks_mut(channels.max(1)) {
            let source = (frame_index as f32 * step) as usize;
            let sample = samples.get(source).copied().unwrap_or(0.0);
            for out in frame.iter_mut() {
                *out = T::from_sample(sample);
            }
            frame_index += 1;
        }
        frame_index
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_fill_integer_formats() {
            let clip = [0.5f32, -0.5];

            let mut pcm = [0i16; 4];
            assert_eq!(fill(&mut pcm, 2, 1.0, &clip, 0), 2);
            assert_eq!(pcm[0], pcm[1]);
            assert!(pcm[0] > 16_000 && pcm[2] < -16_000);

            // Unsigned silence sits at the midpoint
            let mut unsigned = [0u16; 2];
            fill(&mut unsigned, 1, 1.0, &clip, 5);
            assert_eq!(unsigned, [u16::from_sample(0.0f32); 2]);
        }
    }
}

#[cfg(not(feature = "microphone"))]
mod output {
    use super::{Clip, CueError};

    pub fn play(clip: &Clip) -> Result<(), CueError> {
        log::info!("🔔 Cue ({:.2}s, audio output not compiled in)", clip.duration_secs());
        Ok(())
    }
}

/// Cue player that only logs; used when sound is disabled and in tests
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCues;

impl CuePlayer for SilentCues {
    fn play(&self, cue: SoundCue, _blocking: bool) -> CueHandle {
        log::debug!("🔔 {} cue", cue);
        CueHandle::finished()
    }
}
