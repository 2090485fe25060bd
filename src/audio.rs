use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Single-pole smoothing factor for the `_att` features.
pub const SMOOTHING: f32 = 0.8;

const BASS_HZ: f32 = 250.0;
const MID_HZ: f32 = 2000.0;
const TREB_HZ: f32 = 11025.0;
/// Steepness of the energy compression curve.
const ENERGY_GAIN: f32 = 3.0;

/// Time-domain input for one frame. `mono` is required; `left`/`right` are
/// optional independent channels and default to the mono signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindows {
    pub mono: Vec<f32>,
    pub left: Option<Vec<f32>>,
    pub right: Option<Vec<f32>>,
}

impl SampleWindows {
    pub fn silence(len: usize) -> Self {
        Self::mono(vec![0.0; len])
    }

    pub fn mono(samples: Vec<f32>) -> Self {
        Self {
            mono: samples,
            left: None,
            right: None,
        }
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>) -> Self {
        let mono = left
            .iter()
            .zip(&right)
            .map(|(l, r)| 0.5 * (l + r))
            .collect();
        Self {
            mono,
            left: Some(left),
            right: Some(right),
        }
    }
}

/// The scalar features the equations see.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioLevels {
    pub bass: f32,
    pub mid: f32,
    pub treb: f32,
    pub bass_att: f32,
    pub mid_att: f32,
    pub treb_att: f32,
    pub vol: f32,
    pub vol_att: f32,
}

#[derive(Debug, Clone)]
pub struct AudioFeatures {
    pub levels: AudioLevels,
    /// Sanitized windows of exactly the configured length.
    pub mono: Vec<f32>,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    /// Normalized magnitudes in [0, 1], `fft_size / 2` bins.
    pub spectrum: Vec<f32>,
}

impl AudioFeatures {
    fn silent(n: usize) -> Self {
        Self {
            levels: AudioLevels::default(),
            mono: vec![0.0; n],
            left: vec![0.0; n],
            right: vec![0.0; n],
            spectrum: vec![0.0; n / 2],
        }
    }

    pub fn bass(&self) -> f32 {
        self.levels.bass
    }

    pub fn energy(&self) -> f32 {
        self.levels.vol
    }
}

/// Turns sample windows into band energies. Stateful only through the
/// smoothing filter; `process` never blocks and never fails.
pub struct AudioFeatureExtractor {
    n: usize,
    sample_rate: u32,
    smoothing: f32,
    hann: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_buf: Vec<Complex<f32>>,
    band_bins: [(usize, usize); 3],
    features: AudioFeatures,
    warned_length: bool,
}

impl AudioFeatureExtractor {
    /// `fft_size` is the window length; half as many bins are analysed.
    pub fn new(fft_size: usize, sample_rate: u32) -> Self {
        let n = fft_size.max(2);
        let hann = (0..n)
            .map(|i| 0.5 - 0.5 * ((2.0 * PI * i as f32) / (n as f32)).cos())
            .collect();
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        Self {
            n,
            sample_rate: sample_rate.max(1),
            smoothing: SMOOTHING,
            hann,
            fft,
            fft_buf: vec![Complex { re: 0.0, im: 0.0 }; n],
            band_bins: band_bins(n, sample_rate.max(1)),
            features: AudioFeatures::silent(n),
            warned_length: false,
        }
    }

    pub fn with_smoothing(mut self, factor: f32) -> Self {
        self.smoothing = factor.clamp(0.0, 0.999);
        self
    }

    pub fn window_len(&self) -> usize {
        self.n
    }

    pub fn bins(&self) -> usize {
        self.n / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn features(&self) -> &AudioFeatures {
        &self.features
    }

    pub fn reset(&mut self) {
        self.features = AudioFeatures::silent(self.n);
    }

    /// Analyses one frame. `None` is treated as a silent window.
    pub fn process(&mut self, windows: Option<&SampleWindows>) -> &AudioFeatures {
        match windows {
            Some(w) => {
                let lengths_ok = w.mono.len() == self.n
                    && w.left.as_ref().is_none_or(|c| c.len() == self.n)
                    && w.right.as_ref().is_none_or(|c| c.len() == self.n);
                if !lengths_ok && !self.warned_length {
                    self.warned_length = true;
                    log::warn!(
                        "sample window length {} != configured {}; padding/truncating",
                        w.mono.len(),
                        self.n
                    );
                }
                copy_sanitized(&w.mono, &mut self.features.mono);
                let left = w.left.as_deref().unwrap_or(&w.mono);
                let right = w.right.as_deref().unwrap_or(&w.mono);
                copy_sanitized(left, &mut self.features.left);
                copy_sanitized(right, &mut self.features.right);
            }
            None => {
                self.features.mono.fill(0.0);
                self.features.left.fill(0.0);
                self.features.right.fill(0.0);
            }
        }

        for (i, c) in self.fft_buf.iter_mut().enumerate() {
            c.re = self.features.mono[i] * self.hann[i];
            c.im = 0.0;
        }
        self.fft.process(&mut self.fft_buf);

        let norm = 4.0 / self.n as f32;
        let half = self.n / 2;
        for (dst, c) in self.features.spectrum.iter_mut().zip(self.fft_buf.iter().take(half)) {
            let m = (c.re * c.re + c.im * c.im).sqrt() * norm;
            *dst = if m.is_finite() { m.clamp(0.0, 1.0) } else { 0.0 };
        }

        let spectrum = &self.features.spectrum;
        let [bass, mid, treb] = self.band_bins.map(|(lo, hi)| band_energy(&spectrum[lo..hi]));
        let vol = band_energy(&spectrum[self.band_bins[0].0..self.band_bins[2].1]);

        let s = self.smoothing;
        let l = &mut self.features.levels;
        l.bass = bass;
        l.mid = mid;
        l.treb = treb;
        l.vol = vol;
        l.bass_att = smooth(l.bass_att, bass, s);
        l.mid_att = smooth(l.mid_att, mid, s);
        l.treb_att = smooth(l.treb_att, treb, s);
        l.vol_att = smooth(l.vol_att, vol, s);
        &self.features
    }
}

fn copy_sanitized(src: &[f32], dst: &mut [f32]) {
    for (i, d) in dst.iter_mut().enumerate() {
        let v = src.get(i).copied().unwrap_or(0.0);
        *d = if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
    }
}

fn smooth(prev: f32, cur: f32, factor: f32) -> f32 {
    let v = prev * factor + cur * (1.0 - factor);
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

/// Maps magnitude power in a band to [0, 1).
fn band_energy(bins: &[f32]) -> f32 {
    let power: f32 = bins.iter().map(|m| m * m).sum();
    let e = 1.0 - (-ENERGY_GAIN * power.sqrt()).exp();
    if e.is_finite() { e.clamp(0.0, 1.0) } else { 0.0 }
}

/// Half-open bin ranges for bass, mid and treble. Bin 0 (DC) is skipped.
fn band_bins(n: usize, sample_rate: u32) -> [(usize, usize); 3] {
    let half = n / 2;
    let hz_per_bin = sample_rate as f32 / n as f32;
    let to_bin = |hz: f32| ((hz / hz_per_bin).ceil() as usize).clamp(1, half);
    let b = to_bin(BASS_HZ);
    let m = to_bin(MID_HZ).max(b);
    let t = to_bin(TREB_HZ).max(m);
    [(1usize.min(half), b), (b, m), (m, t)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_partition_the_spectrum() {
        let [bass, mid, treb] = band_bins(1024, 44_100);
        assert_eq!(bass.0, 1);
        assert_eq!(bass.1, mid.0);
        assert_eq!(mid.1, treb.0);
        assert!(treb.1 <= 512);
        // 250 Hz at ~43 Hz per bin.
        assert_eq!(bass.1, 6);
    }

    #[test]
    fn energy_curve_is_bounded() {
        assert_eq!(band_energy(&[]), 0.0);
        assert!(band_energy(&[1.0; 512]) <= 1.0);
        assert!(band_energy(&[0.1]) > 0.0);
    }
}
