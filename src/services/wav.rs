//! Wrap raw PCM speech output in a WAV container.
//!
//! Speech endpoints stream headerless little-endian PCM tagged with a mime type
//! like `audio/L16;codec=pcm;rate=24000`. Players need a RIFF header in front
//! of it, which [`hound`] writes for us.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Sample format parsed from an audio mime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub bits_per_sample: u16,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
            sample_rate: 24_000,
            channels: 1,
        }
    }
}

impl PcmFormat {
    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: SampleFormat::Int,
        }
    }
}

/// Read `L<bits>` and `rate=<hz>` from `mime_type`; anything unparsable keeps
/// the default (16-bit, 24 kHz, mono).
pub fn parse_audio_mime_type(mime_type: &str) -> PcmFormat {
    let mut format = PcmFormat::default();
    for param in mime_type.split(';').map(str::trim) {
        if let Some(rate) = param
            .strip_prefix("rate=")
            .or_else(|| param.strip_prefix("RATE="))
        {
            if let Ok(rate) = rate.parse() {
                format.sample_rate = rate;
            }
        } else if let Some(bits) = param.strip_prefix("audio/L") {
            if let Ok(bits) = bits.parse() {
                format.bits_per_sample = bits;
            }
        }
    }
    format
}

/// Whether `mime_type` names headerless PCM that needs [`pcm_to_wav`].
pub fn is_raw_pcm(mime_type: &str) -> bool {
    let lower = mime_type.to_ascii_lowercase();
    lower.starts_with("audio/l16") || lower.starts_with("audio/pcm") || lower.contains("codec=pcm")
}

/// Encode little-endian integer `pcm` samples as a WAV file.
///
/// # Arguments
///
/// * `pcm` - Interleaved sample bytes, exactly as the speech endpoint sent them
/// * `format` - Sample width, rate and channel count from [`parse_audio_mime_type`]
///
/// # Errors
///
/// Fails for sample widths other than 8, 16, 24 or 32 bits, and when `pcm` does
/// not hold a whole number of samples.
pub fn pcm_to_wav(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>, hound::Error> {
    let width = match format.bits_per_sample {
        8 | 16 | 24 | 32 => usize::from(format.bits_per_sample / 8),
        _ => return Err(hound::Error::Unsupported),
    };
    if pcm.len() % width != 0 {
        return Err(hound::Error::FormatError("PCM data ends mid-sample"));
    }

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len()));
    let mut writer = WavWriter::new(&mut cursor, format.spec())?;
    for sample in pcm.chunks_exact(width) {
        match sample {
            [b] => writer.write_sample(*b as i8)?,
            [lo, hi] => writer.write_sample(i16::from_le_bytes([*lo, *hi]))?,
            [b0, b1, b2] => writer.write_sample(i32::from_le_bytes([0, *b0, *b1, *b2]) >> 8)?,
            [b0, b1, b2, b3] => writer.write_sample(i32::from_le_bytes([*b0, *b1, *b2, *b3]))?,
            _ => unreachable!("chunks_exact yields {width}-byte samples"),
        }
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}
