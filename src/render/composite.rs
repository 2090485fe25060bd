use super::mesh::{Mesh, MeshWarpStage, WarpContext};
use super::overlay::{draw_borders, draw_main_wave, draw_shape, draw_wave};
use super::surface::{Surface, to_u8};
use super::warp::warp_pass;
use crate::audio::AudioFeatures;
use crate::config::RenderConfig;
use crate::eqn::{EquationEngine, EquationModule, FrameInputs, FrameParams, WavePoint};
use crate::preset::BaseParams;

/// Luma difference (0..=255) above which the output pass smooths a pixel.
const EDGE_THRESHOLD: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassKind {
    Warp,
    Composite,
    Blur { radius: usize, mix: f32 },
    Output { antialias: bool },
}

/// The ordered pass list. Always `Warp, Composite, Blur*, Output`; only the
/// blur entries and the antialias flag come from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeStage {
    passes: Vec<PassKind>,
    blur_enabled: bool,
}

impl CompositeStage {
    pub fn new(blur: &[f32], antialias: bool) -> Self {
        let mut passes = vec![PassKind::Warp, PassKind::Composite];
        for (i, &mix) in blur.iter().enumerate() {
            passes.push(PassKind::Blur {
                radius: 1 << i.min(4),
                mix: mix.clamp(0.0, 1.0),
            });
        }
        passes.push(PassKind::Output { antialias });
        Self {
            passes,
            blur_enabled: true,
        }
    }

    pub fn from_config(cfg: &RenderConfig) -> Self {
        Self::new(&cfg.blur, cfg.antialias)
    }

    pub fn passes(&self) -> &[PassKind] {
        &self.passes
    }

    pub fn blur_enabled(&self) -> bool {
        self.blur_enabled
    }

    /// Blur passes stay in the list while disabled; they are skipped at run time.
    pub fn set_blur_enabled(&mut self, on: bool) {
        self.blur_enabled = on;
    }

    pub fn blur_pass_count(&self) -> usize {
        self.passes
            .iter()
            .filter(|p| matches!(p, PassKind::Blur { .. }))
            .count()
    }
}

/// Everything one slot needs to render: its mesh and its own buffers.
/// `feedback` carries the previous frame into the next warp pass.
#[derive(Debug, Clone)]
pub struct SlotPipeline {
    mesh: Mesh,
    feedback: Surface,
    warped: Surface,
    output: Surface,
    scratch: Surface,
}

impl SlotPipeline {
    pub fn new(w: usize, h: usize, cols: usize, rows: usize) -> Self {
        Self {
            mesh: Mesh::new(cols, rows),
            feedback: Surface::new(w, h),
            warped: Surface::new(w, h),
            output: Surface::new(w, h),
            scratch: Surface::new(w, h),
        }
    }

    /// A freshly allocated pipeline of the new size. The feedback image is
    /// resampled so the animation does not restart from black.
    pub fn rebuilt(&self, w: usize, h: usize, cols: usize, rows: usize) -> Self {
        let mut next = Self::new(w, h, cols, rows);
        next.feedback = self.feedback.resampled(w, h);
        next
    }

    pub fn output(&self) -> &Surface {
        &self.output
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn dims(&self) -> (usize, usize) {
        self.output.dims()
    }

    /// Renders one frame of `module` through every pass of `stage`.
    pub fn render(
        &mut self,
        stage: &CompositeStage,
        engine: &mut EquationEngine,
        module: &mut EquationModule,
        base: &BaseParams,
        features: &AudioFeatures,
        inputs: &FrameInputs,
    ) -> FrameParams {
        let frame = engine.run_frame(module, inputs);
        for pass in stage.passes() {
            match *pass {
                PassKind::Warp => {
                    let ctx = WarpContext {
                        time: inputs.time as f32,
                        aspectx: inputs.aspectx as f32,
                        aspecty: inputs.aspecty as f32,
                        warp_speed: base.warp_speed,
                        warp_scale: base.warp_scale,
                    };
                    MeshWarpStage.apply(engine, module, &frame, &ctx, &mut self.mesh);
                    warp_pass(&self.feedback, &self.mesh, base.wrap, &mut self.warped);
                }
                PassKind::Composite => {
                    draw_overlays(&mut self.warped, engine, module, &frame, features, inputs);
                    std::mem::swap(&mut self.feedback, &mut self.warped);
                    composite_pass(&self.feedback, &frame, &mut self.output);
                }
                PassKind::Blur { radius, mix } => {
                    if stage.blur_enabled {
                        box_blur(&mut self.output, &mut self.scratch, radius, mix);
                    }
                }
                PassKind::Output { antialias: true } => {
                    edge_antialias(&self.output, &mut self.scratch);
                    std::mem::swap(&mut self.output, &mut self.scratch);
                }
                PassKind::Output { antialias: false } => {}
            }
        }
        frame
    }
}

fn draw_overlays(
    target: &mut Surface,
    engine: &mut EquationEngine,
    module: &mut EquationModule,
    frame: &FrameParams,
    features: &AudioFeatures,
    inputs: &FrameInputs,
) {
    for i in 0..module.shape_count() {
        if let Some(shape) = engine.run_shape(module, i, inputs) {
            draw_shape(target, &shape);
        }
    }

    let mut points: Vec<WavePoint> = Vec::new();
    for i in 0..module.wave_count() {
        let Some(def) = module.wave_def(i).cloned() else {
            continue;
        };
        let Some(wave) = engine.run_wave(module, i, inputs) else {
            continue;
        };
        let (src_l, src_r): (&[f32], &[f32]) = if def.spectrum {
            (&features.spectrum, &features.spectrum)
        } else {
            (&features.left, &features.right)
        };
        let n = wave.samples.max(2);
        let smoothing = def.smoothing.clamp(0.0, 0.99);
        let (mut v1, mut v2) = (0.0f32, 0.0f32);
        points.clear();
        for k in 0..n {
            let sample = k as f32 / (n - 1) as f32;
            let l = pick(src_l, sample) * def.scaling;
            let r = pick(src_r, sample) * def.scaling;
            if k == 0 {
                (v1, v2) = (l, r);
            } else {
                v1 = v1 * smoothing + l * (1.0 - smoothing);
                v2 = v2 * smoothing + r * (1.0 - smoothing);
            }
            points.push(engine.run_wave_point(
                module,
                i,
                f64::from(sample),
                f64::from(v1),
                f64::from(v2),
                f64::from(sample),
                f64::from(0.5 + v1 * 0.5),
                wave.color,
            ));
        }
        draw_wave(target, &points, def.dots, def.thick, def.additive);
    }

    draw_main_wave(target, frame, &features.mono);
    draw_borders(target, frame);
}

fn pick(data: &[f32], t: f32) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let idx = (t * (data.len() - 1) as f32).round() as usize;
    data[idx.min(data.len() - 1)]
}

/// Echo, then the colour post-effects, from `src` into `out`.
pub fn composite_pass(src: &Surface, frame: &FrameParams, out: &mut Surface) {
    let (w, h) = src.dims();
    if out.dims() != (w, h) || src.is_empty() {
        return;
    }
    let echo = frame.echo_alpha > 0.0 && frame.echo_zoom.is_finite() && frame.echo_zoom.abs() > 1e-3;
    let flip_x = frame.echo_orient & 1 != 0;
    let flip_y = frame.echo_orient & 2 != 0;

    for y in 0..h {
        for x in 0..w {
            let p = src.get(x, y);
            let mut c = [
                f32::from(p[0]) / 255.0,
                f32::from(p[1]) / 255.0,
                f32::from(p[2]) / 255.0,
            ];
            if echo {
                let mut u = (x as f32 + 0.5) / w as f32;
                let mut v = (y as f32 + 0.5) / h as f32;
                if flip_x {
                    u = 1.0 - u;
                }
                if flip_y {
                    v = 1.0 - v;
                }
                u = (u - 0.5) / frame.echo_zoom + 0.5;
                v = (v - 0.5) / frame.echo_zoom + 0.5;
                let e = src.sample(u, v, false);
                let a = frame.echo_alpha;
                for k in 0..3 {
                    c[k] = c[k] * (1.0 - a) + e[k] / 255.0 * a;
                }
            }
            for ch in &mut c {
                let mut v = *ch * frame.gamma;
                if frame.brighten {
                    v = v.clamp(0.0, 1.0).sqrt();
                }
                if frame.darken {
                    v *= v;
                }
                if frame.solarize {
                    let s = v.clamp(0.0, 1.0);
                    v = s * (1.0 - s) * 4.0;
                }
                if frame.invert {
                    v = 1.0 - v.clamp(0.0, 1.0);
                }
                *ch = v * 255.0;
            }
            out.put(x, y, c);
        }
    }
}

/// Separable box blur of `radius`, mixed back over `img` by `mix`.
pub fn box_blur(img: &mut Surface, scratch: &mut Surface, radius: usize, mix: f32) {
    let (w, h) = img.dims();
    if img.is_empty() || scratch.dims() != (w, h) || radius == 0 || mix <= 0.0 {
        return;
    }
    let r = radius as isize;
    let taps = (2 * r + 1) as f32;

    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 3];
            for dx in -r..=r {
                let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                let p = img.get(sx, y);
                for k in 0..3 {
                    acc[k] += f32::from(p[k]);
                }
            }
            scratch.put(x, y, acc.map(|v| v / taps));
        }
    }

    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 3];
            for dy in -r..=r {
                let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                let p = scratch.get(x, sy);
                for k in 0..3 {
                    acc[k] += f32::from(p[k]);
                }
            }
            let orig = img.get(x, y);
            let mut out = [0.0f32; 3];
            for k in 0..3 {
                out[k] = f32::from(orig[k]) * (1.0 - mix) + acc[k] / taps * mix;
            }
            img.put(x, y, out);
        }
    }
}

fn luma(p: [u8; 4]) -> f32 {
    0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2])
}

/// Softens pixels that sit on a high-contrast luma edge.
pub fn edge_antialias(src: &Surface, out: &mut Surface) {
    let (w, h) = src.dims();
    if out.dims() != (w, h) {
        return;
    }
    out.copy_from(src);
    if w < 3 || h < 3 {
        return;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let c = src.get(x, y);
            let n = [
                src.get(x - 1, y),
                src.get(x + 1, y),
                src.get(x, y - 1),
                src.get(x, y + 1),
            ];
            let lc = luma(c);
            let (mut lo, mut hi) = (lc, lc);
            for p in &n {
                let l = luma(*p);
                lo = lo.min(l);
                hi = hi.max(l);
            }
            if hi - lo <= EDGE_THRESHOLD {
                continue;
            }
            let mut acc = [0.0f32; 3];
            for k in 0..3 {
                acc[k] = f32::from(c[k]) * 4.0;
                for p in &n {
                    acc[k] += f32::from(p[k]);
                }
            }
            let i = (y * w + x) * 4;
            let px = out.pixels_mut();
            for k in 0..3 {
                px[i + k] = to_u8(acc[k] / 8.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_order_is_fixed() {
        let stage = CompositeStage::new(&[0.5, 0.25], true);
        assert_eq!(
            stage.passes(),
            &[
                PassKind::Warp,
                PassKind::Composite,
                PassKind::Blur { radius: 1, mix: 0.5 },
                PassKind::Blur { radius: 2, mix: 0.25 },
                PassKind::Output { antialias: true },
            ]
        );
        assert_eq!(stage.blur_pass_count(), 2);
    }

    #[test]
    fn blur_of_flat_image_is_flat() {
        let mut img = Surface::new(6, 4);
        for y in 0..4 {
            for x in 0..6 {
                img.put(x, y, [90.0, 90.0, 90.0]);
            }
        }
        let before = img.clone();
        let mut scratch = Surface::new(6, 4);
        box_blur(&mut img, &mut scratch, 2, 1.0);
        assert_eq!(img, before);
    }
}
