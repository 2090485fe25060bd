//! Dual-slot preset compositor. The incoming preset and, during a blend, the
//! outgoing one each own an equation module and a render pipeline; their
//! outputs are alpha-blended into a third buffer.

use std::fmt;
use std::time::{Duration, Instant};

use crate::audio::AudioFeatures;
use crate::eqn::{EquationEngine, EquationModule, FrameInputs, FrameParams};
use crate::preset::{MeshHints, Preset};
use crate::render::{CompositeStage, SlotPipeline, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorState {
    /// Nothing has been installed yet.
    Idle,
    /// A preset is being parsed and instantiated.
    Loading,
    /// Installed but not rendered yet.
    Warming,
    Active,
    Blending,
}

impl CompositorState {
    pub fn label(self) -> &'static str {
        match self {
            CompositorState::Idle => "idle",
            CompositorState::Loading => "loading",
            CompositorState::Warming => "warming",
            CompositorState::Active => "active",
            CompositorState::Blending => "blending",
        }
    }
}

impl fmt::Display for CompositorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One running preset instance.
pub struct PresetSlot {
    preset: Preset,
    module: EquationModule,
    pipeline: SlotPipeline,
    started: Instant,
    frames: u64,
    last_frame: Option<FrameParams>,
}

impl PresetSlot {
    fn new(preset: Preset, module: EquationModule, pipeline: SlotPipeline, now: Instant) -> Self {
        Self {
            preset,
            module,
            pipeline,
            started: now,
            frames: 0,
            last_frame: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.preset.name
    }

    pub fn module(&self) -> &EquationModule {
        &self.module
    }

    pub fn pipeline(&self) -> &SlotPipeline {
        &self.pipeline
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameParams> {
        self.last_frame.as_ref()
    }

    fn render(
        &mut self,
        now: Instant,
        progress: f32,
        stage: &CompositeStage,
        engine: &mut EquationEngine,
        features: &AudioFeatures,
        template: &FrameInputs,
    ) {
        let (pixelsx, pixelsy) = self.pipeline.dims();
        let (meshx, meshy) = self.pipeline.mesh().dims();
        let inputs = FrameInputs {
            time: now.saturating_duration_since(self.started).as_secs_f64(),
            frame: self.frames,
            progress: f64::from(progress),
            meshx,
            meshy,
            pixelsx,
            pixelsy,
            ..*template
        };
        let frame = self.pipeline.render(
            stage,
            engine,
            &mut self.module,
            &self.preset.base,
            features,
            &inputs,
        );
        self.frames += 1;
        self.last_frame = Some(frame);
    }
}

/// An in-progress crossfade. Holds the outgoing slot until `mix` reaches 1.
pub struct BlendState {
    outgoing: PresetSlot,
    started: Instant,
    duration: Duration,
    mix: f32,
}

impl BlendState {
    pub fn outgoing(&self) -> &PresetSlot {
        &self.outgoing
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Advances `mix` from wall-clock time. Never moves backwards.
    fn advance(&mut self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f32();
        let t = (elapsed / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        self.mix = self.mix.max(t);
        self.mix
    }
}

pub struct CrossfadeCompositor {
    stage: CompositeStage,
    w: usize,
    h: usize,
    mesh_override: Option<(usize, usize)>,
    current: Option<PresetSlot>,
    blend: Option<BlendState>,
    output: Surface,
    state: CompositorState,
    resume_state: CompositorState,
    disposed: u64,
}

impl CrossfadeCompositor {
    pub fn new(stage: CompositeStage, w: usize, h: usize) -> Self {
        Self {
            stage,
            w,
            h,
            mesh_override: None,
            current: None,
            blend: None,
            output: Surface::new(w, h),
            state: CompositorState::Idle,
            resume_state: CompositorState::Idle,
            disposed: 0,
        }
    }

    pub fn state(&self) -> CompositorState {
        self.state
    }

    pub fn stage(&self) -> &CompositeStage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut CompositeStage {
        &mut self.stage
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    pub fn current(&self) -> Option<&PresetSlot> {
        self.current.as_ref()
    }

    pub fn blend(&self) -> Option<&BlendState> {
        self.blend.as_ref()
    }

    pub fn is_blending(&self) -> bool {
        self.blend.is_some()
    }

    /// Number of slots (equation module + buffers) dropped so far.
    pub fn disposed_count(&self) -> u64 {
        self.disposed
    }

    /// Blend progress; 1.0 whenever no blend is running.
    pub fn mix(&self) -> f32 {
        self.blend.as_ref().map(|b| b.mix).unwrap_or(1.0)
    }

    /// `(alpha_new, alpha_old)` as of the last render. `None` before any
    /// preset is installed.
    pub fn blend_alphas(&self) -> Option<(f32, f32)> {
        self.current.as_ref()?;
        let alpha_new = self.mix();
        Some((alpha_new, 1.0 - alpha_new))
    }

    /// Output buffers of the incoming and outgoing slot while blending.
    pub fn slot_outputs(&self) -> Option<(&Surface, &Surface)> {
        let cur = self.current.as_ref()?;
        let blend = self.blend.as_ref()?;
        Some((cur.pipeline.output(), blend.outgoing.pipeline.output()))
    }

    pub fn output(&self) -> &Surface {
        &self.output
    }

    fn set_state(&mut self, next: CompositorState) {
        if self.state != next {
            log::debug!("compositor: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn dispose(&mut self, slot: PresetSlot, why: &str) {
        self.disposed += 1;
        log::debug!("disposed '{}' after {} frame(s) ({why})", slot.name(), slot.frames);
    }

    /// Marks the start of a load. A failed load calls [`Self::abort_load`].
    pub fn begin_load(&mut self) {
        if self.state != CompositorState::Loading {
            self.resume_state = self.state;
        }
        self.set_state(CompositorState::Loading);
    }

    /// Returns to whatever was running before [`Self::begin_load`].
    pub fn abort_load(&mut self) {
        if self.state == CompositorState::Loading {
            self.set_state(self.resume_state);
        }
    }

    /// Makes `module` the current preset. Blends over `duration` when a
    /// rendered preset is on screen; otherwise cuts.
    pub fn install(&mut self, preset: Preset, module: EquationModule, duration: Duration, now: Instant) {
        let (cols, rows) = mesh_dims(&preset, self.mesh_override);
        let pipeline = SlotPipeline::new(self.w, self.h, cols, rows);
        let slot = PresetSlot::new(preset, module, pipeline, now);

        if let Some(interrupted) = self.blend.take() {
            // An incoming slot that never drew has nothing on screen; the
            // interrupted source stays the picture to fade from.
            let unseen = self.current.take_if(|c| c.frames == 0);
            match unseen {
                Some(skipped) => {
                    self.dispose(skipped, "replaced before first frame");
                    self.current = Some(interrupted.outgoing);
                }
                None => self.dispose(interrupted.outgoing, "blend interrupted"),
            }
        }

        let source_ready = self.current.as_ref().is_some_and(|c| c.frames > 0);
        if duration.is_zero() || !source_ready {
            if let Some(old) = self.current.take() {
                self.dispose(old, "cut");
            }
            log::debug!("cut to '{}'", slot.name());
            self.current = Some(slot);
            self.set_state(CompositorState::Warming);
            return;
        }

        let Some(outgoing) = self.current.take() else {
            return;
        };
        log::debug!(
            "blending '{}' -> '{}' over {:.2}s",
            outgoing.name(),
            slot.name(),
            duration.as_secs_f32()
        );
        self.blend = Some(BlendState {
            outgoing,
            started: now,
            duration,
            mix: 0.0,
        });
        self.current = Some(slot);
        self.set_state(CompositorState::Blending);
    }

    /// Renders one frame at `now` and returns the composited output.
    pub fn render(
        &mut self,
        now: Instant,
        engine: &mut EquationEngine,
        features: &AudioFeatures,
        template: &FrameInputs,
    ) -> &Surface {
        let Some(current) = self.current.as_mut() else {
            self.output.clear();
            return &self.output;
        };

        let mix = match self.blend.as_mut() {
            Some(b) => b.advance(now),
            None => 1.0,
        };
        current.render(now, mix, &self.stage, engine, features, template);

        if mix >= 1.0 {
            if let Some(done) = self.blend.take() {
                self.dispose(done.outgoing, "blend complete");
            }
        }

        let Some(cur) = self.current.as_ref() else {
            return &self.output;
        };
        if let Some(blend) = self.blend.as_mut() {
            blend
                .outgoing
                .render(now, 1.0, &self.stage, engine, features, template);
            alpha_over(
                cur.pipeline.output(),
                blend.outgoing.pipeline.output(),
                mix,
                &mut self.output,
            );
        } else {
            self.output.copy_from(cur.pipeline.output());
            self.set_state(CompositorState::Active);
        }
        &self.output
    }

    /// Reallocates the output and every live slot at the new size. All new
    /// buffers are built before any is swapped in.
    pub fn resize(&mut self, w: usize, h: usize) {
        if (w, h) == (self.w, self.h) {
            return;
        }
        log::info!("resize {}x{} -> {w}x{h}", self.w, self.h);
        self.w = w;
        self.h = h;
        self.rebuild(false);
    }

    /// Overrides every slot's mesh resolution; `None` returns to preset hints.
    pub fn set_mesh_size(&mut self, mesh: Option<(usize, usize)>) {
        if self.mesh_override == mesh {
            return;
        }
        log::info!("mesh override {:?} -> {:?}", self.mesh_override, mesh);
        self.mesh_override = mesh;
        self.rebuild(false);
    }

    /// Drops all pixel state and reallocates at the current size.
    pub fn on_surface_lost(&mut self) {
        log::info!("surface lost; reallocating {}x{}", self.w, self.h);
        self.rebuild(true);
    }

    fn rebuild(&mut self, discard: bool) {
        let (w, h, mesh) = (self.w, self.h, self.mesh_override);
        let fresh = |slot: &PresetSlot| {
            let (cols, rows) = mesh_dims(&slot.preset, mesh);
            if discard {
                SlotPipeline::new(w, h, cols, rows)
            } else {
                slot.pipeline.rebuilt(w, h, cols, rows)
            }
        };
        let cur = self.current.as_ref().map(&fresh);
        let old = self.blend.as_ref().map(|b| fresh(&b.outgoing));
        let output = Surface::new(w, h);

        if let (Some(slot), Some(p)) = (self.current.as_mut(), cur) {
            slot.pipeline = p;
        }
        if let (Some(blend), Some(p)) = (self.blend.as_mut(), old) {
            blend.outgoing.pipeline = p;
        }
        self.output = output;
    }
}

fn mesh_dims(preset: &Preset, mesh_override: Option<(usize, usize)>) -> (usize, usize) {
    mesh_override.unwrap_or_else(|| {
        let MeshHints { cols, rows } = preset.mesh_hints();
        (cols, rows)
    })
}

/// Opaque alpha-over: `new` at `alpha_new`, `old` underneath at the complement.
fn alpha_over(new: &Surface, old: &Surface, alpha_new: f32, out: &mut Surface) {
    if new.dims() != out.dims() || old.dims() != out.dims() {
        return;
    }
    let a = alpha_new.clamp(0.0, 1.0);
    let b = 1.0 - a;
    let (src_new, src_old) = (new.pixels(), old.pixels());
    for (i, px) in out.pixels_mut().chunks_exact_mut(4).enumerate() {
        let j = i * 4;
        for k in 0..3 {
            let v = f32::from(src_new[j + k]) * a + f32::from(src_old[j + k]) * b;
            px[k] = v.round().clamp(0.0, 255.0) as u8;
        }
        px[3] = 255;
    }
}
