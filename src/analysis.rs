//! Offline analysis of recorded audio: level statistics, a histogram of
//! sample values, an RMS envelope and a magnitude spectrum.

use crate::TransposableIter;

use hound::{SampleFormat, WavReader};
use rustfft::{num_complex::Complex, FftPlanner};
use std::{borrow::Cow, f32::consts::PI, fmt, path::Path};

/// An interleaved recording loaded from a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Frames per second
    pub sample_rate: u32,
    /// Samples per frame
    pub channels: u16,
    /// Interleaved samples at their native scale (e.g. ±32768 for 16 bit)
    pub samples: Vec<f32>,
}

/// Why a recording could not be analysed.
#[derive(Debug)]
pub enum AnalysisError {
    /// Reading or decoding the WAV file failed.
    HoundError(hound::Error),
    /// The requested channel does not exist.
    NoSuchChannel {
        /// Zero-based channel asked for
        requested: usize,
        /// Channels in the recording
        available: u16,
    },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            AnalysisError::HoundError(error) => Cow::from(format!("wav error: {}", error)),
            AnalysisError::NoSuchChannel {
                requested,
                available,
            } => Cow::from(format!(
                "channel {} requested but the recording has {}",
                requested, available
            )),
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for AnalysisError {}

impl From<hound::Error> for AnalysisError {
    fn from(value: hound::Error) -> Self {
        Self::HoundError(value)
    }
}

/// Reads a whole WAV file.
pub fn load_wav(path: impl AsRef<Path>) -> Result<Recording, AnalysisError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32))
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(Recording {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

impl Recording {
    /// The samples of one channel, de-interleaved.
    pub fn channel(&self, index: usize) -> Result<Vec<f32>, AnalysisError> {
        let channels = self.channels as usize;
        if index >= channels {
            return Err(AnalysisError::NoSuchChannel {
                requested: index,
                available: self.channels,
            });
        }
        if self.samples.len() < channels {
            return Ok(Vec::new());
        }

        Ok(self
            .samples
            .chunks_exact(channels)
            .transpose()
            .nth(index)
            .map(|column| column.into_iter().copied().collect())
            .unwrap_or_default())
    }

    /// Length of the recording in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.channels as f64 / self.sample_rate as f64
    }
}

/// Level statistics of a block of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioStats {
    /// Arithmetic mean, the DC offset
    pub mean: f32,
    /// Population standard deviation
    pub std_dev: f32,
    /// Largest absolute sample
    pub max_abs: f32,
    /// Root mean square level
    pub rms: f32,
}

/// Computes [`AudioStats`], or `None` for an empty block.
pub fn stats(samples: &[f32]) -> Option<AudioStats> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let mean_square = samples.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / n;
    let max_abs = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));

    Some(AudioStats {
        mean: mean as f32,
        std_dev: variance.sqrt() as f32,
        max_abs,
        rms: mean_square.sqrt() as f32,
    })
}

/// Equal-width bins spanning the smallest to the largest sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Lower edge of the first bin
    pub min: f32,
    /// Upper edge of the last bin
    pub max: f32,
    /// Samples per bin
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Width shared by every bin.
    pub fn bin_width(&self) -> f32 {
        (self.max - self.min) / self.counts.len() as f32
    }

    /// Lower edge of every bin.
    pub fn edges(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.counts.len()).map(move |i| self.min + i as f32 * self.bin_width())
    }
}

/// Buckets `samples` into `bins` equal-width bins. A constant signal puts
/// every sample in the first bin. `None` when there is nothing to count.
pub fn histogram(samples: &[f32], bins: usize) -> Option<Histogram> {
    if samples.is_empty() || bins == 0 {
        return None;
    }
    let min = samples.iter().copied().fold(f32::INFINITY, f32::min);
    let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut counts = vec![0; bins];
    let span = max - min;
    for &s in samples {
        let idx = if span > 0.0 {
            (((s - min) / span) * bins as f32) as usize
        } else {
            0
        };
        counts[idx.min(bins - 1)] += 1;
    }

    Some(Histogram { min, max, counts })
}

/// RMS of consecutive windows of `window` samples; the last may be short.
pub fn rms_envelope(samples: &[f32], window: usize) -> Vec<f32> {
    if window == 0 {
        return Vec::new();
    }
    samples
        .chunks(window)
        .map(|w| (w.iter().map(|s| s * s).sum::<f32>() / w.len() as f32).sqrt())
        .collect()
}

fn hann_window(samples: &[f32]) -> Vec<f32> {
    let n = samples.len();
    if n < 2 {
        return samples.to_vec();
    }
    samples
        .iter()
        .enumerate()
        .map(|(i, s)| s * 0.5 * (1.0 - (2.0 * PI * i as f32 / (n - 1) as f32).cos()))
        .collect()
}

/// Single-sided magnitude spectrum as `(frequency_hz, magnitude)` pairs
/// from DC to Nyquist, Hann windowed.
pub fn spectrum(samples: &[f32], sample_rate: u32) -> Vec<(f32, f32)> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buf: Vec<Complex<f32>> = hann_window(samples)
        .into_iter()
        .map(|re| Complex { re, im: 0.0 })
        .collect();
    let mut planner: FftPlanner<f32> = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buf);

    let resolution = sample_rate as f32 / n as f32;
    buf[..=n / 2]
        .iter()
        .enumerate()
        .map(|(i, c)| (i as f32 * resolution, c.norm() * 2.0 / n as f32))
        .collect()
}

/// The frequency with the largest magnitude, ignoring DC.
pub fn dominant_frequency(spectrum: &[(f32, f32)]) -> Option<f32> {
    spectrum
        .iter()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|&(f, _)| f)
}
