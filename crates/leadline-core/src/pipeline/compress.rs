//! Compress stage: normalize a found recording into a small upload artifact.
//!
//! WAV inputs are re-encoded as mono 16-bit PCM at 22.05 kHz, which cuts a
//! typical stereo 44.1 kHz recorder file to a quarter of its size. Other
//! container formats are already compressed by the recorder; those are
//! copied into the scratch directory unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const TARGET_SAMPLE_RATE: u32 = 22_050;

/// Output of the Compress stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedFile {
    pub path: PathBuf,
    pub size: i64,
    /// Decoded duration; `None` for pass-through formats.
    pub duration_secs: Option<i64>,
    pub format: String,
}

/// Compress `input` into `scratch_dir`, named after the recording id.
pub fn compress_recording(
    recording_id: &str,
    input: &Path,
    format: &str,
    scratch_dir: &Path,
) -> Result<CompressedFile> {
    fs::create_dir_all(scratch_dir)?;

    if format.eq_ignore_ascii_case("wav") {
        compress_wav(recording_id, input, scratch_dir)
    } else {
        pass_through(recording_id, input, format, scratch_dir)
    }
}

fn compress_wav(recording_id: &str, input: &Path, scratch_dir: &Path) -> Result<CompressedFile> {
    let mut reader = hound::WavReader::open(input)
        .map_err(|error| Error::Pipeline(format!("cannot read WAV {}: {error}", input.display())))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(Error::Pipeline(format!(
            "WAV {} has an invalid header",
            input.display()
        )));
    }

    let samples = decode_pcm16(&mut reader)?;
    let mono = downmix_mono(&samples, spec.channels);
    let resampled = resample(&mono, spec.sample_rate, TARGET_SAMPLE_RATE);
    let duration_secs = (resampled.len() as i64) / i64::from(TARGET_SAMPLE_RATE);

    let out_path = scratch_dir.join(format!("{recording_id}.wav"));
    let out_spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&out_path, out_spec)
        .map_err(|error| Error::Pipeline(format!("cannot create WAV writer: {error}")))?;
    for sample in &resampled {
        writer
            .write_sample(*sample)
            .map_err(|error| Error::Pipeline(format!("cannot write WAV sample: {error}")))?;
    }
    writer
        .finalize()
        .map_err(|error| Error::Pipeline(format!("cannot finalize WAV: {error}")))?;

    let size = i64::try_from(fs::metadata(&out_path)?.len()).unwrap_or(i64::MAX);
    Ok(CompressedFile {
        path: out_path,
        size,
        duration_secs: Some(duration_secs),
        format: "wav".to_string(),
    })
}

fn pass_through(
    recording_id: &str,
    input: &Path,
    format: &str,
    scratch_dir: &Path,
) -> Result<CompressedFile> {
    let out_path = scratch_dir.join(format!("{recording_id}.{format}"));
    fs::copy(input, &out_path)?;
    let size = i64::try_from(fs::metadata(&out_path)?.len()).unwrap_or(i64::MAX);
    tracing::debug!(
        format,
        size,
        "recording passed through uncompressed"
    );
    Ok(CompressedFile {
        path: out_path,
        size,
        duration_secs: None,
        format: format.to_lowercase(),
    })
}

fn decode_pcm16<R: std::io::Read>(reader: &mut hound::WavReader<R>) -> Result<Vec<i16>> {
    let spec = reader.spec();
    let samples: std::result::Result<Vec<i16>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Int if spec.bits_per_sample <= 16 => {
            reader.samples::<i16>().collect()
        }
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| {
                let shift = spec.bits_per_sample - 16;
                s.map(|v| i16::try_from(v >> shift).unwrap_or(i16::MAX))
            })
            .collect(),
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect(),
    };
    samples.map_err(|error| Error::Pipeline(format!("cannot decode WAV samples: {error}")))
}

fn downmix_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| {
            let sum: i64 = frame.iter().map(|&s| i64::from(s)).sum();
            i16::try_from(sum / frame.len() as i64).unwrap_or(i16::MAX)
        })
        .collect()
}

fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let out_len = (samples.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    (0..out_len)
        .map(|i| {
            let src = i as u64 * u64::from(from_rate) / u64::from(to_rate);
            samples[src as usize]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write_stereo_wav(path: &Path, sample_rate: u32, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..(sample_rate * seconds) {
            let sample = ((i % 100) as i16 - 50) * 100;
            writer.write_sample(sample).unwrap(); // left
            writer.write_sample(-sample).unwrap(); // right
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_wav_is_downmixed_and_resampled() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("in.wav");
        write_stereo_wav(&input, 44_100, 2);

        let out = compress_recording("rec1", &input, "wav", &tmp.path().join("scratch")).unwrap();
        assert_eq!(out.format, "wav");
        assert_eq!(out.duration_secs, Some(2));

        let reader = hound::WavReader::open(&out.path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);

        let in_size = std::fs::metadata(&input).unwrap().len();
        assert!(out.size < i64::try_from(in_size).unwrap() / 2);
    }

    #[test]
    fn test_non_wav_passes_through_unchanged() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("in.m4a");
        std::fs::write(&input, b"opaque aac payload").unwrap();

        let out = compress_recording("rec2", &input, "m4a", &tmp.path().join("scratch")).unwrap();
        assert_eq!(out.format, "m4a");
        assert_eq!(out.duration_secs, None);
        assert_eq!(std::fs::read(&out.path).unwrap(), b"opaque aac payload");
    }

    #[test]
    fn test_unreadable_wav_is_a_pipeline_error() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("broken.wav");
        std::fs::write(&input, b"not a wav").unwrap();

        let err =
            compress_recording("rec3", &input, "wav", &tmp.path().join("scratch")).unwrap_err();
        assert!(matches!(err, Error::Pipeline(_)));
    }

    #[test]
    fn test_downmix_averages_channels() {
        assert_eq!(downmix_mono(&[100, -100, 50, 150], 2), vec![0, 100]);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<i16> = (0..1000).map(|i| i as i16).collect();
        let out = resample(&samples, 44_100, 22_050);
        assert_eq!(out.len(), 500);
    }
}
