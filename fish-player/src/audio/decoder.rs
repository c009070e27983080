//! Audio decoding to 16-bit PCM
//!
//! - WAV: RIFF/WAVE parsed with hound (8/16/24/32-bit integer and 32-bit float)
//! - MP3: symphonia probe + decode
//!
//! Output is always interleaved s16le at the source's own rate and channel count;
//! conversion to the device format happens separately.

use crate::audio::types::{PcmBuffer, PcmFormat};
use crate::error::{Error, Result};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Container formats the player can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    Wav,
    Mp3,
}

impl AudioKind {
    /// Pick the decoder from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "wav" => Some(AudioKind::Wav),
            "mp3" => Some(AudioKind::Mp3),
            _ => None,
        }
    }
}

/// Stateless decoder front-end
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode in-memory file contents, choosing the decoder by `name`'s extension.
    pub fn decode_named(name: &str, data: Vec<u8>) -> Result<PcmBuffer> {
        match AudioKind::from_path(Path::new(name)) {
            Some(AudioKind::Wav) => Self::decode_wav(&data),
            Some(AudioKind::Mp3) => Self::decode_mp3(data),
            None => Err(Error::UnsupportedFormat(name.to_string())),
        }
    }

    /// Decode a RIFF/WAVE byte buffer.
    pub fn decode_wav(data: &[u8]) -> Result<PcmBuffer> {
        let reader = hound::WavReader::new(Cursor::new(data))
            .map_err(|e| Error::Decode(format!("Invalid WAV header: {}", e)))?;

        let spec = reader.spec();
        let format = PcmFormat::new(spec.sample_rate, spec.channels);

        debug!(
            "WAV format: sample_rate={}, channels={}, bits={}, {:?}",
            spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
        );

        let samples = read_wav_samples(reader, spec)?;
        Ok(PcmBuffer::from_samples(&samples, format))
    }

    /// Decode an MP3 byte buffer.
    pub fn decode_mp3(data: Vec<u8>) -> Result<PcmBuffer> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut pcm_format = track
            .codec_params
            .sample_rate
            .zip(track.codec_params.channels)
            .map(|(rate, channels)| PcmFormat::new(rate, channels.count() as u16));

        let mut samples: Vec<i16> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<i16>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream");
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable frame: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
            };

            let spec = *decoded.spec();
            if pcm_format.is_none() {
                pcm_format = Some(PcmFormat::new(spec.rate, spec.channels.count() as u16));
            }

            let buf = sample_buf
                .get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }

        let pcm_format = pcm_format
            .ok_or_else(|| Error::Decode("Sample rate or channel count not found".to_string()))?;

        debug!(
            "Decoded {} samples ({} frames) at {}Hz/{}ch",
            samples.len(),
            samples.len() / pcm_format.channels.max(1) as usize,
            pcm_format.sample_rate,
            pcm_format.channels
        );

        Ok(PcmBuffer::from_samples(&samples, pcm_format))
    }
}

fn read_wav_samples<R: std::io::Read>(
    mut reader: hound::WavReader<R>,
    spec: hound::WavSpec,
) -> Result<Vec<i16>> {
    let decode_err = |e: hound::Error| Error::Decode(format!("Failed to read WAV data: {}", e));

    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
        (hound::SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| (v as i16) << 8))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
        (hound::SampleFormat::Int, bits @ (24 | 32)) => {
            let shift = bits - 16;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_err)
        }
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
        (format, bits) => Err(Error::Decode(format!(
            "Unsupported WAV sample format: {:?} {}-bit",
            format, bits
        ))),
    }
}
