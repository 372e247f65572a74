use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::media::AudioBuffer;

/// Size of the canonical RIFF/WAVE header
const HEADER_LEN: usize = 44;

/// Serialize a decoded sample buffer into a canonical 16-bit PCM WAV byte
/// stream: 44-byte RIFF/WAVE header followed by channel-interleaved
/// little-endian samples at the buffer's native rate and channel count.
///
/// Pure and deterministic; inputs are well-formed by the time they reach
/// this stage, so there is no failure path.
pub fn encode_wav(buffer: &AudioBuffer) -> Vec<u8> {
    let num_channels = buffer.channels.len() as u16;
    let frame_count = buffer.frame_count();
    let data_len = frame_count * num_channels as usize * 2;
    let total_len = HEADER_LEN + data_len;

    let mut out = Vec::with_capacity(total_len);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((total_len - 8) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&num_channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate.to_le_bytes());
    let byte_rate = buffer.sample_rate * num_channels as u32 * 2;
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&(num_channels * 2).to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());

    for frame in 0..frame_count {
        for channel in &buffer.channels {
            out.extend_from_slice(&quantize(channel[frame]).to_le_bytes());
        }
    }

    out
}

/// Encode and base64 the WAV stream, ready for backend submission
pub fn encode_wav_base64(buffer: &AudioBuffer) -> String {
    BASE64.encode(encode_wav(buffer))
}

/// Map a floating-point sample to 16-bit signed PCM.
///
/// Asymmetric scaling: negative values scale by 32768, positive by 32767,
/// so +1.0 cannot overflow. Callers rely on this exact rounding rule for
/// round-trip fidelity.
fn quantize(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stereo_buffer() -> AudioBuffer {
        AudioBuffer {
            sample_rate: 44100,
            channels: vec![vec![0.0, 0.5, -0.5, 1.0], vec![1.0, -1.0, 0.25, -0.25]],
        }
    }

    #[test]
    fn test_header_layout() {
        let wav = encode_wav(&stereo_buffer());

        // 4 frames * 2 channels * 2 bytes
        assert_eq!(wav.len(), 44 + 16);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), (44 + 16 - 8) as u32);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(wav[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(wav[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 44100);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 44100 * 2 * 2);
        assert_eq!(u16::from_le_bytes(wav[32..34].try_into().unwrap()), 4);
        assert_eq!(u16::from_le_bytes(wav[34..36].try_into().unwrap()), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 16);
    }

    #[test]
    fn test_asymmetric_quantization() {
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(0.5), 16383);
        assert_eq!(quantize(-0.5), -16384);
        // out-of-range input clamps instead of wrapping
        assert_eq!(quantize(2.0), 32767);
        assert_eq!(quantize(-3.0), -32768);
    }

    #[test]
    fn test_channel_interleaving() {
        let wav = encode_wav(&stereo_buffer());
        let first = i16::from_le_bytes(wav[44..46].try_into().unwrap());
        let second = i16::from_le_bytes(wav[46..48].try_into().unwrap());

        // sample 0 of channel 0, then sample 0 of channel 1
        assert_eq!(first, 0);
        assert_eq!(second, 32767);
    }

    #[test]
    fn test_round_trip_within_quantization_error() {
        // one cycle of a 440Hz sine at 8kHz, mono
        let sample_rate = 8000u32;
        let samples: Vec<f32> = (0..sample_rate)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let buffer = AudioBuffer {
            sample_rate,
            channels: vec![samples.clone()],
        };

        let wav = encode_wav(&buffer);
        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, sample_rate);
        assert_eq!(spec.bits_per_sample, 16);

        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded.len(), samples.len());
        for (original, quantized) in samples.iter().zip(&decoded) {
            let reconstructed = if *quantized < 0 {
                *quantized as f32 / 32768.0
            } else {
                *quantized as f32 / 32767.0
            };
            assert!((original - reconstructed).abs() <= 1.0 / 32767.0);
        }
    }

    #[test]
    fn test_base64_output_decodes_to_same_bytes() {
        let buffer = stereo_buffer();
        let encoded = encode_wav_base64(&buffer);
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(decoded, encode_wav(&buffer));
    }
}
