use std::time::{Duration, Instant};

use crate::audio::{AudioFeatureExtractor, AudioFeatures, SampleWindows};
use crate::capability::probe_backends;
use crate::config::{ConfigError, RenderConfig};
use crate::crossfade::{CompositorState, CrossfadeCompositor};
use crate::eqn::backend::BackendKind;
use crate::eqn::{EquationEngine, FrameInputs, LoadError};
use crate::preset::{MeshHints, Preset};
use crate::render::{CompositeStage, Surface};

const SEED_STEP: u64 = 0x9E37_79B9_7F4A_7C15;

/// The per-frame entry point: audio features in, composited surface out.
pub struct Visualizer {
    cfg: RenderConfig,
    engine: EquationEngine,
    backend_status: String,
    extractor: AudioFeatureExtractor,
    compositor: CrossfadeCompositor,
    loads: u64,
}

impl Visualizer {
    /// Probes the backends once and builds the pipeline for a `w`×`h` surface.
    pub fn new(cfg: RenderConfig, w: usize, h: usize) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let caps = probe_backends(cfg.backend);
        let status = caps.status_label();
        let engine = EquationEngine::new(&caps);
        let mut viz = Self::with_engine(cfg, engine, w, h)?;
        viz.backend_status = status;
        Ok(viz)
    }

    /// Uses an already constructed engine instead of probing.
    pub fn with_engine(
        cfg: RenderConfig,
        engine: EquationEngine,
        w: usize,
        h: usize,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let extractor = AudioFeatureExtractor::new(cfg.fft_size, cfg.sample_rate);
        let mut compositor = CrossfadeCompositor::new(CompositeStage::from_config(&cfg), w, h);
        compositor.set_mesh_size(mesh_override(&cfg));
        let chain: Vec<&str> = engine.chain().iter().map(|k| k.label()).collect();
        Ok(Self {
            backend_status: chain.join(">"),
            cfg,
            engine,
            extractor,
            compositor,
            loads: 0,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.cfg
    }

    pub fn engine(&self) -> &EquationEngine {
        &self.engine
    }

    pub fn compositor(&self) -> &CrossfadeCompositor {
        &self.compositor
    }

    pub fn features(&self) -> &AudioFeatures {
        self.extractor.features()
    }

    pub fn window_len(&self) -> usize {
        self.extractor.window_len()
    }

    pub fn backend_status(&self) -> &str {
        &self.backend_status
    }

    pub fn state(&self) -> CompositorState {
        self.compositor.state()
    }

    pub fn mix(&self) -> f32 {
        self.compositor.mix()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.compositor.current().map(|s| s.name())
    }

    pub fn current_backend(&self) -> Option<BackendKind> {
        self.compositor.current().map(|s| s.module().backend())
    }

    pub fn output(&self) -> &Surface {
        self.compositor.output()
    }

    fn next_seed(&mut self) -> u64 {
        let n = self.loads;
        self.loads += 1;
        match self.cfg.seed {
            Some(seed) => seed.wrapping_add(n.wrapping_mul(SEED_STEP)),
            None => fastrand::u64(..),
        }
    }

    /// Loads `preset` and switches to it over `blend`. A rejected preset
    /// leaves whatever is currently running untouched.
    pub fn load_preset(&mut self, preset: &Preset, blend: Duration, now: Instant) -> Result<(), LoadError> {
        self.compositor.begin_load();
        let seed = self.next_seed();
        match self.engine.load(preset, seed) {
            Ok(module) => {
                self.compositor.install(preset.clone(), module, blend, now);
                Ok(())
            }
            Err(e) => {
                log::warn!("{e}");
                self.compositor.abort_load();
                Err(e)
            }
        }
    }

    /// Renders one frame. Missing audio is replaced by a silent window.
    pub fn render(&mut self, now: Instant, windows: Option<&SampleWindows>) -> &Surface {
        let features = self.extractor.process(windows);
        let (w, h) = self.compositor.dims();
        let (aspectx, aspecty) = aspect(w, h);
        let template = FrameInputs {
            fps: f64::from(self.cfg.fps),
            audio: features.levels,
            aspectx,
            aspecty,
            ..FrameInputs::default()
        };
        self.compositor.render(now, &mut self.engine, features, &template)
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        self.compositor.resize(w, h);
    }

    pub fn set_mesh_size(&mut self, mesh: Option<(usize, usize)>) {
        self.compositor.set_mesh_size(mesh);
    }

    pub fn on_surface_lost(&mut self) {
        self.compositor.on_surface_lost();
    }

    /// Flips the blur passes on or off; returns the new setting.
    pub fn toggle_blur(&mut self) -> bool {
        let stage = self.compositor.stage_mut();
        let on = !stage.blur_enabled();
        stage.set_blur_enabled(on);
        on
    }
}

fn mesh_override(cfg: &RenderConfig) -> Option<(usize, usize)> {
    if cfg.mesh_cols.is_none() && cfg.mesh_rows.is_none() {
        return None;
    }
    let d = MeshHints::default();
    Some((cfg.mesh_cols.unwrap_or(d.cols), cfg.mesh_rows.unwrap_or(d.rows)))
}

/// Scales the short axis so the warp stays circular on non-square surfaces.
fn aspect(w: usize, h: usize) -> (f64, f64) {
    if w == 0 || h == 0 {
        return (1.0, 1.0);
    }
    let (w, h) = (w as f64, h as f64);
    let ax = if h > w { w / h } else { 1.0 };
    let ay = if w > h { h / w } else { 1.0 };
    (ax, ay)
}
