use std::time::{Duration, Instant};

use warpviz::audio::SampleWindows;
use warpviz::builtin::builtin_presets;
use warpviz::config::RenderConfig;
use warpviz::crossfade::CompositorState;
use warpviz::eqn::LoadError;
use warpviz::preset::Preset;
use warpviz::visualizer::Visualizer;

const W: usize = 16;
const H: usize = 12;

fn secs(v: f32) -> Duration {
    Duration::from_secs_f32(v)
}

fn viz() -> Visualizer {
    let cfg = RenderConfig {
        seed: Some(7),
        fft_size: 256,
        mesh_cols: Some(8),
        mesh_rows: Some(6),
        ..RenderConfig::default()
    };
    Visualizer::new(cfg, W, H).expect("valid config")
}

fn red() -> Preset {
    let mut p = Preset::new("red").with_equations("", "wave_a = 0", "");
    p.base.decay = 1.0;
    p.base.ib_size = 0.5;
    p.base.ib = warpviz::preset::Rgba::new(1.0, 0.0, 0.0, 1.0);
    p
}

fn blue() -> Preset {
    let mut p = Preset::new("blue").with_equations("", "wave_a = 0", "");
    p.base.decay = 1.0;
    p.base.ib_size = 0.5;
    p.base.ib = warpviz::preset::Rgba::new(0.0, 0.0, 1.0, 1.0);
    p
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn first_install_is_a_cut_even_with_a_blend_requested() {
    let mut v = viz();
    assert_eq!(v.state(), CompositorState::Idle);
    let t0 = Instant::now();
    v.load_preset(&red(), secs(2.0), t0).expect("loads");
    assert_eq!(v.state(), CompositorState::Warming);
    assert!(!v.compositor().is_blending());
    v.render(t0, None);
    assert_eq!(v.state(), CompositorState::Active);
    assert_eq!(v.compositor().disposed_count(), 0);
}

#[test]
fn blend_runs_on_wall_clock_and_disposes_the_outgoing_slot() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);

    v.load_preset(&blue(), secs(2.0), t0).expect("loads");
    assert_eq!(v.state(), CompositorState::Blending);

    v.render(t0 + secs(1.0), None);
    let (new, old) = v.compositor().blend_alphas().expect("installed");
    assert!(approx(new, 0.5) && approx(old, 0.5), "{new} {old}");
    assert!(approx(new + old, 1.0));
    assert_eq!(v.compositor().disposed_count(), 0);

    v.render(t0 + secs(2.0), None);
    assert_eq!(v.compositor().blend_alphas(), Some((1.0, 0.0)));
    assert!(!v.compositor().is_blending());
    assert_eq!(v.state(), CompositorState::Active);
    assert_eq!(v.compositor().disposed_count(), 1);
    assert_eq!(v.current_name(), Some("blue"));
}

#[test]
fn mix_never_moves_backwards() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);
    v.load_preset(&blue(), secs(4.0), t0).expect("loads");

    let mut last = 0.0;
    for ms in [500u64, 1500, 1000, 2500, 2000] {
        v.render(t0 + Duration::from_millis(ms), None);
        let mix = v.mix();
        assert!(mix >= last, "{mix} < {last}");
        let (a, b) = v.compositor().blend_alphas().expect("installed");
        assert!(approx(a + b, 1.0));
        last = mix;
    }
}

#[test]
fn slots_render_into_separate_buffers() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);
    v.load_preset(&blue(), secs(2.0), t0).expect("loads");
    v.render(t0 + secs(0.5), None);

    let (incoming, outgoing) = v.compositor().slot_outputs().expect("blending");
    assert!(!std::ptr::eq(incoming, outgoing));
    assert!(!std::ptr::eq(incoming, v.output()));
    assert_ne!(incoming.pixels(), outgoing.pixels());
}

#[test]
fn blended_output_sits_between_the_two_slots() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);
    v.load_preset(&blue(), secs(2.0), t0).expect("loads");
    v.render(t0 + secs(1.0), None);

    let (incoming, outgoing) = v.compositor().slot_outputs().expect("blending");
    let (x, y) = (W / 2, H / 2);
    let (n, o, out) = (incoming.get(x, y), outgoing.get(x, y), v.output().get(x, y));
    for k in 0..3 {
        let expect = (f32::from(n[k]) + f32::from(o[k])) * 0.5;
        assert!((f32::from(out[k]) - expect).abs() <= 1.0, "{out:?} vs {n:?}/{o:?}");
    }
}

#[test]
fn a_new_switch_mid_blend_disposes_the_interrupted_source() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);
    v.load_preset(&blue(), secs(2.0), t0).expect("loads");
    v.render(t0 + secs(0.5), None);

    v.load_preset(&red(), secs(2.0), t0 + secs(0.5)).expect("loads");
    assert_eq!(v.compositor().disposed_count(), 1);
    assert!(v.compositor().is_blending());
    let outgoing = v.compositor().blend().expect("blending").outgoing().name().to_string();
    assert_eq!(outgoing, "blue");
}

#[test]
fn a_zero_duration_switch_cuts() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);
    v.load_preset(&blue(), Duration::ZERO, t0).expect("loads");
    assert!(!v.compositor().is_blending());
    assert_eq!(v.compositor().disposed_count(), 1);
    assert_eq!(v.state(), CompositorState::Warming);
}

#[test]
fn resize_mid_blend_reallocates_both_slots() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);
    v.load_preset(&blue(), secs(2.0), t0).expect("loads");
    v.render(t0 + secs(0.5), None);

    v.resize(24, 20);
    {
        let (a, b) = v.compositor().slot_outputs().expect("still blending");
        assert_eq!(a.dims(), (24, 20));
        assert_eq!(b.dims(), (24, 20));
    }
    assert_eq!(v.output().dims(), (24, 20));
    v.render(t0 + secs(1.0), None);
    assert!(v.compositor().is_blending());
    assert_eq!(v.output().dims(), (24, 20));
}

#[test]
fn mesh_override_applies_to_every_live_slot() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);
    v.load_preset(&blue(), secs(2.0), t0).expect("loads");

    v.set_mesh_size(Some((10, 4)));
    let c = v.compositor();
    assert_eq!(c.current().expect("current").pipeline().mesh().dims(), (10, 4));
    let outgoing = c.blend().expect("blending").outgoing();
    assert_eq!(outgoing.pipeline().mesh().dims(), (10, 4));

    v.set_mesh_size(None);
    let hints = blue().mesh_hints();
    let mesh = v.compositor().current().expect("current").pipeline().mesh().dims();
    assert_eq!(mesh, (hints.cols, hints.rows));
}

#[test]
fn a_rejected_preset_keeps_the_running_one() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);

    let mut broken = blue();
    broken.equations.vertex = None;
    let err = v.load_preset(&broken, secs(1.0), t0).expect_err("rejected");
    assert!(matches!(err, LoadError::Structure { .. }));

    let garbled = Preset::new("garbled").with_equations("", "zoom = (1 +", "");
    let err = v.load_preset(&garbled, secs(1.0), t0).expect_err("rejected");
    assert!(matches!(err, LoadError::Parse { .. }));

    assert_eq!(v.state(), CompositorState::Active);
    assert_eq!(v.current_name(), Some("red"));
    assert!(!v.compositor().is_blending());
    assert_eq!(v.compositor().disposed_count(), 0);
}

#[test]
fn surface_loss_keeps_presets_running() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);
    v.on_surface_lost();
    assert_eq!(v.output().dims(), (W, H));
    v.render(t0 + secs(0.1), None);
    assert_eq!(v.current_name(), Some("red"));
    assert_eq!(v.compositor().current().expect("current").frames(), 2);
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = || {
        let mut v = viz();
        let presets = builtin_presets();
        let t0 = Instant::now();
        let windows = SampleWindows::mono(
            (0..256).map(|i| (i as f32 * 0.07).sin() * 0.6).collect(),
        );
        v.load_preset(&presets[3], Duration::ZERO, t0).expect("loads");
        for i in 0..6u32 {
            v.render(t0 + Duration::from_millis(16 * u64::from(i)), Some(&windows));
        }
        v.load_preset(&presets[0], secs(0.2), t0 + secs(0.1)).expect("loads");
        for i in 6..12u32 {
            v.render(t0 + Duration::from_millis(16 * u64::from(i)), Some(&windows));
        }
        v.output().pixels().to_vec()
    };
    assert_eq!(run(), run());
}

#[test]
fn switching_again_before_the_first_blended_frame_keeps_fading_from_the_screen() {
    let mut v = viz();
    let t0 = Instant::now();
    v.load_preset(&red(), Duration::ZERO, t0).expect("loads");
    v.render(t0, None);

    let mut green = blue();
    green.name = "green".to_string();
    green.base.ib = warpviz::preset::Rgba::new(0.0, 1.0, 0.0, 1.0);

    v.load_preset(&blue(), secs(2.0), t0).expect("loads");
    v.load_preset(&green, secs(2.0), t0).expect("loads");
    assert!(v.compositor().is_blending());
    assert_eq!(v.state(), CompositorState::Blending);
    assert_eq!(v.compositor().disposed_count(), 1);
    let outgoing = v.compositor().blend().expect("blending").outgoing().name().to_string();
    assert_eq!(outgoing, "red");
    assert_eq!(v.current_name(), Some("green"));

    v.render(t0 + secs(1.0), None);
    let (new, old) = v.compositor().blend_alphas().expect("installed");
    assert!(approx(new, 0.5) && approx(old, 0.5), "{new} {old}");
}
