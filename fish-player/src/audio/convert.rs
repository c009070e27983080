//! PCM format conversion
//!
//! Brings decoded audio to the output device format. Operates on signed
//! 16-bit little-endian PCM only and is a pure function of its input.
//!
//! - Channels: mono is duplicated into stereo. Every other combination keeps
//!   its channel layout untouched (no downmix).
//! - Rate: linear interpolation between the two nearest source frames, producing
//!   `ceil(frames * to_rate / from_rate)` frames. Positions past the last source
//!   frame repeat that frame.

use crate::audio::types::{bytes_to_samples, samples_to_bytes, PcmBuffer, PcmFormat};
use tracing::debug;

/// Convert a PCM byte buffer between sample rates and channel counts.
pub fn convert(
    pcm: &[u8],
    from_rate: u32,
    from_channels: u16,
    to_rate: u32,
    to_channels: u16,
) -> Vec<u8> {
    if from_rate == to_rate && from_channels == to_channels {
        return pcm.to_vec();
    }

    let (samples, channels) = convert_channels(bytes_to_samples(pcm), from_channels, to_channels);

    let samples = if from_rate != to_rate && from_rate > 0 && to_rate > 0 {
        resample_linear(&samples, channels, from_rate, to_rate)
    } else {
        samples
    };

    samples_to_bytes(&samples)
}

/// Convert a buffer to `target`, returning it unchanged when formats already match
pub fn convert_buffer(buffer: &PcmBuffer, target: PcmFormat) -> PcmBuffer {
    let source = buffer.format();
    if source == target {
        return buffer.clone();
    }

    debug!(
        "Converting {}Hz/{}ch to {}Hz/{}ch ({} bytes)",
        source.sample_rate,
        source.channels,
        target.sample_rate,
        target.channels,
        buffer.bytes().len()
    );

    let bytes = convert(
        buffer.bytes(),
        source.sample_rate,
        source.channels,
        target.sample_rate,
        target.channels,
    );

    // Unsupported channel conversions pass through, so report what we actually hold
    let channels = if source.channels == 1 && target.channels == 2 {
        2
    } else {
        source.channels
    };
    let sample_rate = if source.sample_rate > 0 && target.sample_rate > 0 {
        target.sample_rate
    } else {
        source.sample_rate
    };

    PcmBuffer::new(bytes, PcmFormat::new(sample_rate, channels))
}

/// Returns the samples together with the channel count they are laid out in
fn convert_channels(samples: Vec<i16>, from: u16, to: u16) -> (Vec<i16>, u16) {
    match (from, to) {
        (1, 2) => {
            let stereo = samples.iter().flat_map(|&s| [s, s]).collect();
            (stereo, 2)
        }
        _ => (samples, from),
    }
}

fn resample_linear(samples: &[i16], channels: u16, from_rate: u32, to_rate: u32) -> Vec<i16> {
    let channels = channels.max(1) as usize;
    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }

    let out_frames = (frames as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let last = frames - 1;

    let mut output = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let position = i as f64 * step;
        let index = position as usize;

        if index >= last {
            output.extend_from_slice(&samples[last * channels..(last + 1) * channels]);
            continue;
        }

        let frac = position - index as f64;
        for ch in 0..channels {
            let s1 = samples[index * channels + ch] as f64;
            let s2 = samples[(index + 1) * channels + ch] as f64;
            output.push((s1 + (s2 - s1) * frac) as i16);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples_to_bytes(samples)
    }

    #[test]
    fn test_same_format_is_identity() {
        let input = pcm(&[1, -2, 300, -400, 5000]);
        for (rate, channels) in [(44100, 2), (22050, 1), (8000, 6)] {
            assert_eq!(convert(&input, rate, channels, rate, channels), input);
        }
    }

    #[test]
    fn test_identity_keeps_odd_trailing_byte() {
        let input = vec![1u8, 0, 7];
        assert_eq!(convert(&input, 44100, 1, 44100, 1), input);
    }

    #[test]
    fn test_empty_input() {
        assert!(convert(&[], 22050, 1, 44100, 2).is_empty());
        assert!(convert(&[], 48000, 2, 44100, 2).is_empty());
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let source = [10i16, -20, 30, i16::MIN];
        let out = bytes_to_samples(&convert(&pcm(&source), 44100, 1, 44100, 2));

        assert_eq!(out.len(), source.len() * 2);
        for (i, &s) in source.iter().enumerate() {
            assert_eq!(out[2 * i], s);
            assert_eq!(out[2 * i + 1], s);
        }
    }

    #[test]
    fn test_other_channel_combinations_pass_through() {
        let input = pcm(&[1, 2, 3, 4]);
        assert_eq!(convert(&input, 44100, 2, 44100, 1), input);
        assert_eq!(convert(&input, 44100, 4, 44100, 2), input);
    }

    #[test]
    fn test_upsample_length_and_interpolation() {
        let out = bytes_to_samples(&convert(&pcm(&[0, 100, 200]), 22050, 1, 44100, 1));

        assert_eq!(out.len(), 6);
        // Midpoints are interpolated, positions past the end clamp to the last sample
        assert_eq!(out, vec![0, 50, 100, 150, 200, 200]);
    }

    #[test]
    fn test_downsample_length() {
        let source: Vec<i16> = (0..1000).map(|i| i as i16).collect();
        let out = bytes_to_samples(&convert(&pcm(&source), 48000, 1, 44100, 1));

        // ceil(1000 * 44100 / 48000) = 919
        assert_eq!(out.len(), 919);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn test_resample_length_tracks_ratio() {
        let source = vec![0i16; 4410 * 2];
        let bytes = convert(&pcm(&source), 44100, 2, 22050, 2);
        let expected = source.len() * 2 / 2;
        assert!((bytes.len() as i64 - expected as i64).abs() <= 4);
    }

    #[test]
    fn test_stereo_channels_are_not_mixed() {
        // Left is constant 1000, right constant -1000
        let source: Vec<i16> = (0..64).flat_map(|_| [1000i16, -1000]).collect();
        let out = bytes_to_samples(&convert(&pcm(&source), 16000, 2, 44100, 2));

        for frame in out.chunks_exact(2) {
            assert_eq!(frame, [1000, -1000]);
        }
    }

    #[test]
    fn test_speech_format_to_output() {
        // 22.05 kHz mono speech becomes 44.1 kHz stereo
        let source = [0i16, 1000, 2000, 3000];
        let out = bytes_to_samples(&convert(&pcm(&source), 22050, 1, 44100, 2));
        assert_eq!(out.len(), 16);
        assert_eq!(&out[..4], &[0, 0, 500, 500]);
    }

    #[test]
    fn test_convert_buffer_reports_actual_format() {
        let mono = PcmBuffer::from_samples(&[1, 2, 3, 4], PcmFormat::new(22050, 1));
        let converted = convert_buffer(&mono, PcmFormat::output());
        assert_eq!(converted.format(), PcmFormat::output());
        assert_eq!(converted.frames(), 8);

        let quad = PcmBuffer::from_samples(&[0; 8], PcmFormat::new(44100, 4));
        assert_eq!(
            convert_buffer(&quad, PcmFormat::output()).format(),
            PcmFormat::new(44100, 4)
        );
    }
}
