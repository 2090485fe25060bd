use std::f32::consts::PI;

use warpviz::audio::{AudioFeatureExtractor, AudioLevels, SMOOTHING, SampleWindows};

const N: usize = 1024;
const SR: u32 = 44_100;

fn sine(freq: f32, amp: f32) -> Vec<f32> {
    (0..N)
        .map(|i| amp * (2.0 * PI * freq * i as f32 / SR as f32).sin())
        .collect()
}

fn levels_in_unit_range(l: &AudioLevels) -> bool {
    [
        l.bass, l.mid, l.treb, l.bass_att, l.mid_att, l.treb_att, l.vol, l.vol_att,
    ]
    .iter()
    .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
}

#[test]
fn silence_yields_zero_features() {
    let mut ex = AudioFeatureExtractor::new(N, SR);
    let f = ex.process(Some(&SampleWindows::silence(N)));
    assert_eq!(f.levels, AudioLevels::default());
    assert!(f.spectrum.iter().all(|m| *m == 0.0));
    assert_eq!(f.spectrum.len(), N / 2);
}

#[test]
fn missing_window_is_treated_as_silence() {
    let mut ex = AudioFeatureExtractor::new(N, SR);
    ex.process(Some(&SampleWindows::mono(sine(100.0, 0.8))));
    let f = ex.process(None);
    assert_eq!(f.levels.bass, 0.0);
    assert!(f.mono.iter().all(|s| *s == 0.0));
    // The smoothed value decays rather than dropping to zero.
    assert!(f.levels.bass_att > 0.0);
}

#[test]
fn energies_stay_bounded_for_wild_input() {
    let mut ex = AudioFeatureExtractor::new(N, SR);
    let mut rng = fastrand::Rng::with_seed(9);
    for round in 0..20 {
        let mut mono: Vec<f32> = (0..N).map(|_| (rng.f32() - 0.5) * 1e6).collect();
        if round % 3 == 0 {
            mono[5] = f32::NAN;
            mono[6] = f32::INFINITY;
            mono[7] = f32::NEG_INFINITY;
        }
        let f = ex.process(Some(&SampleWindows::mono(mono)));
        assert!(levels_in_unit_range(&f.levels), "{:?}", f.levels);
        assert!(f.spectrum.iter().all(|m| (0.0..=1.0).contains(m)));
        assert!(f.mono.iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}

#[test]
fn tones_land_in_their_bands() {
    let mut ex = AudioFeatureExtractor::new(N, SR);
    let low = ex.process(Some(&SampleWindows::mono(sine(120.0, 0.5)))).levels;
    assert!(low.bass > 0.1, "{low:?}");
    assert!(low.bass > low.treb * 4.0, "{low:?}");

    let mut ex = AudioFeatureExtractor::new(N, SR);
    let high = ex.process(Some(&SampleWindows::mono(sine(6_000.0, 0.5)))).levels;
    assert!(high.treb > 0.1, "{high:?}");
    assert!(high.treb > high.bass * 4.0, "{high:?}");
}

#[test]
fn attenuated_levels_follow_a_single_pole() {
    let mut ex = AudioFeatureExtractor::new(N, SR);
    let loud = SampleWindows::mono(sine(120.0, 0.9));
    let first = ex.process(Some(&loud)).levels;
    assert!((first.bass_att - first.bass * (1.0 - SMOOTHING)).abs() < 1e-6);

    let second = ex.process(Some(&loud)).levels;
    let expected = first.bass_att * SMOOTHING + second.bass * (1.0 - SMOOTHING);
    assert!((second.bass_att - expected).abs() < 1e-6);
    assert!(second.bass_att > first.bass_att);
}

#[test]
fn wrong_length_windows_are_fitted() {
    let mut ex = AudioFeatureExtractor::new(N, SR);
    let short = ex.process(Some(&SampleWindows::mono(vec![0.5; 100])));
    assert_eq!(short.mono.len(), N);
    assert_eq!(short.mono[99], 0.5);
    assert_eq!(short.mono[100], 0.0);

    let long = ex.process(Some(&SampleWindows::mono(vec![0.25; 4 * N])));
    assert_eq!(long.mono.len(), N);
    assert!(levels_in_unit_range(&long.levels));
}

#[test]
fn stereo_channels_stay_independent() {
    let mut ex = AudioFeatureExtractor::new(N, SR);
    let left = sine(220.0, 0.5);
    let right = vec![0.0; N];
    let f = ex.process(Some(&SampleWindows::stereo(left.clone(), right)));
    assert_eq!(f.left, left);
    assert!(f.right.iter().all(|s| *s == 0.0));
    assert!((f.mono[10] - left[10] * 0.5).abs() < 1e-6);
}

#[test]
fn reset_clears_history() {
    let mut ex = AudioFeatureExtractor::new(N, SR);
    ex.process(Some(&SampleWindows::mono(sine(120.0, 0.9))));
    ex.reset();
    assert_eq!(ex.features().levels, AudioLevels::default());
    assert_eq!(ex.window_len(), N);
    assert_eq!(ex.bins(), N / 2);
}
