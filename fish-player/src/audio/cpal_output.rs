//! Audio output using cpal
//!
//! The device stream lives on its own thread for the life of the process
//! (cpal streams are not `Send` on every host). Players are voices in a
//! shared [`Mixer`] that the stream callback drains.

use crate::audio::mixer::Mixer;
use crate::audio::output::{
    choose_stream_format, ensure_format, AudioOutput, PlayerHandle, StreamFormatRange,
    StreamSampleFormat,
};
use crate::audio::types::{PcmBuffer, PcmFormat, OUTPUT_SAMPLE_RATE};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Real audio device output
pub struct CpalOutput {
    mixer: Mixer,
    format: PcmFormat,
    /// Dropping this ends the stream thread
    _shutdown: mpsc::Sender<()>,
}

impl CpalOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open the output device and start a silent stream.
    ///
    /// `device_name` of `None` selects the host default. A named device that
    /// cannot be found falls back to the default.
    pub fn open(device_name: Option<String>) -> Result<Self> {
        let mixer = Mixer::new();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<PcmFormat>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let stream_mixer = mixer.clone();
        thread::Builder::new()
            .name("fish-audio-out".to_string())
            .spawn(move || {
                let stream = match start_stream(device_name, stream_mixer) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Blocks until the sender is dropped
                let _ = shutdown_rx.recv();
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause audio stream: {}", e);
                }
                info!("Audio stream stopped");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        let format = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during setup".to_string()))??;

        Ok(Self {
            mixer,
            format,
            _shutdown: shutdown_tx,
        })
    }
}

impl AudioOutput for CpalOutput {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn new_player(&self, buffer: &PcmBuffer) -> Result<Box<dyn PlayerHandle>> {
        ensure_format(self.format, buffer)?;
        Ok(Box::new(self.mixer.add_voice(buffer.samples())))
    }
}

fn start_stream(device_name: Option<String>, mixer: Mixer) -> Result<(Stream, PcmFormat)> {
    let device = select_device(device_name.as_deref())?;
    let (config, sample_format) = get_best_config(&device)?;

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let stream = match sample_format {
        StreamSampleFormat::I16 => build_stream_i16(&device, &config, mixer)?,
        StreamSampleFormat::F32 => build_stream_f32(&device, &config, mixer)?,
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

    info!("Audio stream started successfully");
    Ok((stream, PcmFormat::new(config.sample_rate.0, config.channels)))
}

fn select_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Using requested audio device: {}", name);
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
    info!(
        "Using default audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );
    Ok(device)
}

/// Stereo is required; 44.1kHz i16 (our internal format) is preferred and
/// any other rate is resampled to upstream
fn get_best_config(device: &Device) -> Result<(StreamConfig, StreamSampleFormat)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
        .filter_map(|config| {
            let sample_format = match config.sample_format() {
                SampleFormat::I16 => StreamSampleFormat::I16,
                SampleFormat::F32 => StreamSampleFormat::F32,
                _ => return None,
            };
            let range = StreamFormatRange {
                channels: config.channels(),
                min_rate: config.min_sample_rate().0,
                max_rate: config.max_sample_rate().0,
                sample_format,
            };
            Some((config, range))
        })
        .collect();

    let ranges: Vec<StreamFormatRange> = supported.iter().map(|(_, range)| *range).collect();
    let (index, rate) = choose_stream_format(&ranges).ok_or_else(|| {
        Error::AudioOutput("Device has no stereo i16 or f32 output configuration".to_string())
    })?;

    let (config, range) = &supported[index];
    if rate != OUTPUT_SAMPLE_RATE {
        warn!("No 44.1kHz stereo config available, using {}Hz", rate);
    }
    let config = config.clone().with_sample_rate(cpal::SampleRate(rate));
    Ok((config.config(), range.sample_format))
}

fn build_stream_i16(device: &Device, config: &StreamConfig, mixer: Mixer) -> Result<Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| mixer.fill(data),
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

fn build_stream_f32(device: &Device, config: &StreamConfig, mixer: Mixer) -> Result<Stream> {
    let mut scratch: Vec<i16> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0);
                mixer.fill(&mut scratch);
                for (dst, &src) in data.iter_mut().zip(&scratch) {
                    *dst = src as f32 / i16::MAX as f32;
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

