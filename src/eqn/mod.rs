//! Preset equation language: parsing, the backend chain, and the per-preset
//! execution state.

pub mod ast;
pub mod backend;
pub mod bytecode;
pub mod env;
pub mod funcs;
pub mod interp;
pub mod parser;

use thiserror::Error;

use crate::audio::AudioLevels;
use crate::capability::BackendCapabilities;
use crate::preset::{BaseParams, MAX_SHAPE_SIDES, Preset, PresetError, Rgba, ShapeDef, WaveDef};
use ast::{Statements, VarId, writes_of};
use backend::{Backend, BackendHealth, BackendKind, Executable};
use bytecode::BytecodeBackend;
use env::{Q_BASE, Q_COUNT, SymbolTable, T_BASE, T_COUNT, VariableEnvironment, var};
use interp::{Interpreted, InterpreterBackend};
pub use parser::ParseError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("preset '{name}' rejected: {source}")]
    Structure {
        name: String,
        #[source]
        source: PresetError,
    },
    #[error("preset '{name}' {group} equations: {source}")]
    Parse {
        name: String,
        group: String,
        #[source]
        source: ParseError,
    },
}

/// Per-frame values the host supplies to the equations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInputs {
    pub time: f64,
    pub frame: u64,
    pub fps: f64,
    /// Fraction of the current blend already elapsed, 1.0 when not blending.
    pub progress: f64,
    pub audio: AudioLevels,
    pub aspectx: f64,
    pub aspecty: f64,
    pub meshx: usize,
    pub meshy: usize,
    pub pixelsx: usize,
    pub pixelsy: usize,
}

/// Frame-level parameters read back after the per-frame equations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub zoom: f32,
    pub zoomexp: f32,
    pub rot: f32,
    pub warp: f32,
    pub cx: f32,
    pub cy: f32,
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,
    pub decay: f32,
    pub echo_zoom: f32,
    pub echo_alpha: f32,
    pub echo_orient: u8,
    pub gamma: f32,
    pub brighten: bool,
    pub darken: bool,
    pub solarize: bool,
    pub invert: bool,
    pub wave_mode: u8,
    pub wave: Rgba,
    pub wave_x: f32,
    pub wave_y: f32,
    pub wave_scale: f32,
    pub ob_size: f32,
    pub ob: Rgba,
    pub ib_size: f32,
    pub ib: Rgba,
}

impl FrameParams {
    /// The parameters a preset produces with no per-frame equations.
    pub fn from_base(base: &BaseParams) -> Self {
        let mut env = VariableEnvironment::new(env::BUILTIN_SLOTS, 0);
        apply(&mut env, &frame_base(base));
        read_frame_params(&env)
    }
}

/// Mesh-warp parameters for one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexOutputs {
    pub zoom: f32,
    pub zoomexp: f32,
    pub rot: f32,
    pub warp: f32,
    pub cx: f32,
    pub cy: f32,
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeInstance {
    pub x: f32,
    pub y: f32,
    pub rad: f32,
    pub ang: f32,
    pub sides: u32,
    pub additive: bool,
    pub thick: bool,
    pub inner: Rgba,
    pub outer: Rgba,
    pub border: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveFrame {
    pub samples: usize,
    pub color: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavePoint {
    pub x: f32,
    pub y: f32,
    pub color: Rgba,
}

/// One equation group with its instantiated executable. The statements are
/// kept so the group can be rebuilt on the interpreter after a runtime fault.
pub struct Program {
    stmts: Statements,
    exec: Box<dyn Executable>,
}

impl Program {
    pub fn kind(&self) -> BackendKind {
        self.exec.kind()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

/// A shape or wave with its own namespace and register file.
pub struct OverlayModule {
    enabled: bool,
    symbols: SymbolTable,
    env: VariableEnvironment,
    init: Program,
    frame: Program,
    point: Option<Program>,
    base: Vec<(VarId, f64)>,
    point_writes: Vec<VarId>,
    point_snapshot: Vec<(VarId, f64)>,
}

impl OverlayModule {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn env(&self) -> &VariableEnvironment {
        &self.env
    }
}

/// Executable form of one preset instance, bound to its own registers.
/// Owned by exactly one compositor slot.
pub struct EquationModule {
    name: String,
    symbols: SymbolTable,
    env: VariableEnvironment,
    init: Program,
    frame: Program,
    vertex: Program,
    base: Vec<(VarId, f64)>,
    vertex_writes: Vec<VarId>,
    vertex_restore: Vec<(VarId, f64)>,
    shapes: Vec<(ShapeDef, OverlayModule)>,
    waves: Vec<(WaveDef, OverlayModule)>,
    initialized: bool,
    frames_run: u64,
}

impl EquationModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend executing the per-frame group.
    pub fn backend(&self) -> BackendKind {
        self.frame.kind()
    }

    pub fn backends(&self) -> [BackendKind; 3] {
        [self.init.kind(), self.frame.kind(), self.vertex.kind()]
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn env(&self) -> &VariableEnvironment {
        &self.env
    }

    /// Reads a main-namespace variable by name; unknown names read as 0.
    pub fn var(&self, name: &str) -> f64 {
        self.symbols.get(name).map(|id| self.env.get(id)).unwrap_or(0.0)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    pub fn has_vertex_equations(&self) -> bool {
        !self.vertex.is_empty()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    pub fn wave_def(&self, index: usize) -> Option<&WaveDef> {
        self.waves.get(index).map(|(def, _)| def)
    }

    pub fn shape(&self, index: usize) -> Option<&OverlayModule> {
        self.shapes.get(index).map(|(_, m)| m)
    }

    pub fn wave(&self, index: usize) -> Option<&OverlayModule> {
        self.waves.get(index).map(|(_, m)| m)
    }

    pub fn set_shape_enabled(&mut self, index: usize, on: bool) {
        if let Some((_, m)) = self.shapes.get_mut(index) {
            m.enabled = on;
        }
    }

    pub fn set_wave_enabled(&mut self, index: usize, on: bool) {
        if let Some((_, m)) = self.waves.get_mut(index) {
            m.enabled = on;
        }
    }
}

/// Owns the backend chain and its session-wide health. One per process,
/// passed to whoever loads or runs modules.
pub struct EquationEngine {
    backends: Vec<Box<dyn Backend>>,
    health: BackendHealth,
}

impl EquationEngine {
    pub fn new(caps: &BackendCapabilities) -> Self {
        let mut backends: Vec<Box<dyn Backend>> = Vec::new();
        for kind in caps.chain() {
            match kind {
                BackendKind::Optimized => backends.push(Box::new(BytecodeBackend::optimized())),
                BackendKind::Basic => backends.push(Box::new(BytecodeBackend::basic())),
                BackendKind::Interpreted => backends.push(Box::new(InterpreterBackend)),
            }
        }
        Self::with_backends(backends)
    }

    /// Uses `backends` in priority order. The interpreter is always the
    /// implicit last resort.
    pub fn with_backends(backends: Vec<Box<dyn Backend>>) -> Self {
        Self {
            backends,
            health: BackendHealth::new(),
        }
    }

    pub fn chain(&self) -> Vec<BackendKind> {
        self.backends.iter().map(|b| b.kind()).collect()
    }

    pub fn health(&self) -> &BackendHealth {
        &self.health
    }

    /// Validates, parses and instantiates every equation group of `preset`.
    pub fn load(&mut self, preset: &Preset, seed: u64) -> Result<EquationModule, LoadError> {
        preset.validate().map_err(|source| LoadError::Structure {
            name: preset.name.clone(),
            source,
        })?;
        let parse_err = |group: &str, source: ParseError| LoadError::Parse {
            name: preset.name.clone(),
            group: group.to_string(),
            source,
        };

        let groups = &preset.equations;
        let mut symbols = SymbolTable::with_builtins();
        let init = parse(groups.init.as_deref(), &mut symbols).map_err(|e| parse_err("init", e))?;
        let frame =
            parse(groups.frame.as_deref(), &mut symbols).map_err(|e| parse_err("per-frame", e))?;
        let vertex =
            parse(groups.vertex.as_deref(), &mut symbols).map_err(|e| parse_err("per-vertex", e))?;

        let mut shapes = Vec::with_capacity(preset.shapes.len());
        for (i, def) in preset.shapes.iter().enumerate() {
            let group = format!("shape #{i}");
            let overlay = self
                .load_overlay(
                    &def.init_eqs,
                    &def.frame_eqs,
                    None,
                    def.enabled,
                    shape_base(def),
                    overlay_seed(seed, i),
                )
                .map_err(|e| parse_err(&group, e))?;
            shapes.push((def.clone(), overlay));
        }
        let mut waves = Vec::with_capacity(preset.waves.len());
        for (i, def) in preset.waves.iter().enumerate() {
            let group = format!("wave #{i}");
            let overlay = self
                .load_overlay(
                    &def.init_eqs,
                    &def.frame_eqs,
                    Some(&def.point_eqs),
                    def.enabled,
                    wave_base(def),
                    overlay_seed(seed, 64 + i),
                )
                .map_err(|e| parse_err(&group, e))?;
            waves.push((def.clone(), overlay));
        }

        let vertex_writes = writes_of(&vertex);
        let init = self.instantiate(init, &symbols);
        let frame = self.instantiate(frame, &symbols);
        let vertex = self.instantiate(vertex, &symbols);
        log::debug!(
            "loaded '{}' (init: {}, frame: {}, vertex: {})",
            preset.name,
            init.kind(),
            frame.kind(),
            vertex.kind()
        );

        let env = VariableEnvironment::new(symbols.len(), seed);
        Ok(EquationModule {
            name: preset.name.clone(),
            symbols,
            env,
            init,
            frame,
            vertex,
            base: frame_base(&preset.base),
            vertex_writes,
            vertex_restore: Vec::new(),
            shapes,
            waves,
            initialized: false,
            frames_run: 0,
        })
    }

    fn load_overlay(
        &mut self,
        init_src: &str,
        frame_src: &str,
        point_src: Option<&str>,
        enabled: bool,
        base: Vec<(VarId, f64)>,
        seed: u64,
    ) -> Result<OverlayModule, ParseError> {
        let mut symbols = SymbolTable::with_builtins();
        let init = parse(Some(init_src), &mut symbols)?;
        let frame = parse(Some(frame_src), &mut symbols)?;
        let point = match point_src {
            Some(src) => Some(parse(Some(src), &mut symbols)?),
            None => None,
        };
        let point_writes: Vec<VarId> = point
            .as_deref()
            .map(writes_of)
            .unwrap_or_default()
            .into_iter()
            .filter(|id| !(T_BASE..T_BASE + T_COUNT).contains(id))
            .collect();
        let init = self.instantiate(init, &symbols);
        let frame = self.instantiate(frame, &symbols);
        let point = point.map(|p| self.instantiate(p, &symbols));
        let env = VariableEnvironment::new(symbols.len(), seed);
        Ok(OverlayModule {
            enabled,
            symbols,
            env,
            init,
            frame,
            point,
            base,
            point_writes,
            point_snapshot: Vec::new(),
        })
    }

    /// Walks the chain, skipping tripped tiers. Never fails: the interpreter
    /// is used when every compiled tier refuses.
    fn instantiate(&mut self, stmts: Statements, symbols: &SymbolTable) -> Program {
        for backend in &self.backends {
            let kind = backend.kind();
            if self.health.is_tripped(kind) {
                continue;
            }
            match backend.build(&stmts, symbols) {
                Ok(exec) => return Program { stmts, exec },
                Err(e) => {
                    self.health.record_failure(kind, &e);
                }
            }
        }
        let exec = Box::new(Interpreted::new(stmts.clone()));
        Program { stmts, exec }
    }

    fn execute(&mut self, program: &mut Program, env: &mut VariableEnvironment) {
        if program.stmts.is_empty() {
            return;
        }
        let (slots, rng) = env.split_mut();
        let Err(fault) = program.exec.run(slots, rng) else {
            return;
        };
        let kind = program.exec.kind();
        self.health.record_failure(kind, &fault);
        program.exec = Box::new(Interpreted::new(program.stmts.clone()));
        let (slots, rng) = env.split_mut();
        if let Err(fault) = program.exec.run(slots, rng) {
            log::error!("interpreter fault: {fault}");
        }
    }

    /// Runs the init group (and every overlay's) exactly once per module.
    /// Returns `false` when the module was already initialized.
    pub fn run_init(&mut self, module: &mut EquationModule) -> bool {
        if module.initialized {
            return false;
        }
        module.initialized = true;
        apply(&mut module.env, &module.base);
        self.execute(&mut module.init, &mut module.env);
        let shapes = module.shapes.iter_mut().map(|(_, m)| m);
        let waves = module.waves.iter_mut().map(|(_, m)| m);
        for overlay in shapes.chain(waves) {
            apply(&mut overlay.env, &overlay.base);
            self.execute(&mut overlay.init, &mut overlay.env);
        }
        true
    }

    /// Runs the per-frame group once and returns the resulting frame parameters.
    pub fn run_frame(&mut self, module: &mut EquationModule, inputs: &FrameInputs) -> FrameParams {
        if !module.initialized {
            self.run_init(module);
        }
        set_inputs(&mut module.env, inputs);
        apply(&mut module.env, &module.base);
        self.execute(&mut module.frame, &mut module.env);
        module.frames_run += 1;

        module.vertex_restore.clear();
        for &id in &module.vertex_writes {
            module.vertex_restore.push((id, module.env.get(id)));
        }
        read_frame_params(&module.env)
    }

    /// Evaluates the per-vertex group for one mesh vertex. `x`/`y` are in
    /// [0, 1]; `rad`/`ang` are the polar coordinates around the centre.
    /// Every vertex starts from the state the last `run_frame` left.
    pub fn run_vertex(
        &mut self,
        module: &mut EquationModule,
        x: f64,
        y: f64,
        rad: f64,
        ang: f64,
    ) -> VertexOutputs {
        let env = &mut module.env;
        env.set(var::X, x);
        env.set(var::Y, y);
        env.set(var::RAD, rad);
        env.set(var::ANG, ang);
        self.execute(&mut module.vertex, env);
        let out = read_vertex_outputs(env);
        apply(env, &module.vertex_restore);
        out
    }

    /// Runs shape `index`'s per-frame group. `None` when disabled or absent.
    pub fn run_shape(
        &mut self,
        module: &mut EquationModule,
        index: usize,
        inputs: &FrameInputs,
    ) -> Option<ShapeInstance> {
        let q = q_values(&module.env);
        let (_, overlay) = module.shapes.get_mut(index)?;
        if !overlay.enabled {
            return None;
        }
        prepare_overlay(overlay, inputs, &q);
        self.execute(&mut overlay.frame, &mut overlay.env);
        let env = &overlay.env;
        let color = |r, g, b, a| {
            Rgba::new(
                env.get_f32(r).clamp(0.0, 1.0),
                env.get_f32(g).clamp(0.0, 1.0),
                env.get_f32(b).clamp(0.0, 1.0),
                env.get_f32(a).clamp(0.0, 1.0),
            )
        };
        let sides = env
            .get(var::SIDES)
            .round()
            .clamp(3.0, f64::from(MAX_SHAPE_SIDES));
        Some(ShapeInstance {
            x: env.get_f32(var::X),
            y: env.get_f32(var::Y),
            rad: env.get_f32(var::RAD),
            ang: env.get_f32(var::ANG),
            sides: sides as u32,
            additive: funcs::truthy(env.get(var::ADDITIVE)),
            thick: funcs::truthy(env.get(var::THICK)),
            inner: color(var::R, var::G, var::B, var::A),
            outer: color(var::R2, var::G2, var::B2, var::A2),
            border: color(var::BORDER_R, var::BORDER_G, var::BORDER_B, var::BORDER_A),
        })
    }

    /// Runs wave `index`'s per-frame group. `None` when disabled or absent.
    pub fn run_wave(
        &mut self,
        module: &mut EquationModule,
        index: usize,
        inputs: &FrameInputs,
    ) -> Option<WaveFrame> {
        let q = q_values(&module.env);
        let (def, overlay) = module.waves.get_mut(index)?;
        if !overlay.enabled {
            return None;
        }
        prepare_overlay(overlay, inputs, &q);
        self.execute(&mut overlay.frame, &mut overlay.env);

        overlay.point_snapshot.clear();
        for &id in &overlay.point_writes {
            overlay.point_snapshot.push((id, overlay.env.get(id)));
        }
        let env = &overlay.env;
        let samples = env
            .get(var::SAMPLES)
            .round()
            .clamp(2.0, def.samples as f64) as usize;
        Some(WaveFrame {
            samples,
            color: Rgba::new(
                env.get_f32(var::R),
                env.get_f32(var::G),
                env.get_f32(var::B),
                env.get_f32(var::A),
            ),
        })
    }

    /// Evaluates wave `index`'s per-point group for one point. `sample` is the
    /// point position in [0, 1]; `x`/`y` are the default placement.
    #[allow(clippy::too_many_arguments)]
    pub fn run_wave_point(
        &mut self,
        module: &mut EquationModule,
        index: usize,
        sample: f64,
        value1: f64,
        value2: f64,
        x: f64,
        y: f64,
        color: Rgba,
    ) -> WavePoint {
        let Some((_, overlay)) = module.waves.get_mut(index) else {
            return WavePoint {
                x: x as f32,
                y: y as f32,
                color,
            };
        };
        let env = &mut overlay.env;
        env.set(var::SAMPLE, sample);
        env.set(var::VALUE1, value1);
        env.set(var::VALUE2, value2);
        env.set(var::X, x);
        env.set(var::Y, y);
        env.set(var::R, f64::from(color.r));
        env.set(var::G, f64::from(color.g));
        env.set(var::B, f64::from(color.b));
        env.set(var::A, f64::from(color.a));
        if let Some(point) = overlay.point.as_mut() {
            self.execute(point, env);
        }
        let out = WavePoint {
            x: env.get_f32(var::X),
            y: env.get_f32(var::Y),
            color: Rgba::new(
                env.get_f32(var::R).clamp(0.0, 1.0),
                env.get_f32(var::G).clamp(0.0, 1.0),
                env.get_f32(var::B).clamp(0.0, 1.0),
                env.get_f32(var::A).clamp(0.0, 1.0),
            ),
        };
        apply(env, &overlay.point_snapshot);
        out
    }
}

fn parse(src: Option<&str>, symbols: &mut SymbolTable) -> Result<Statements, ParseError> {
    parser::parse_program(src.unwrap_or(""), symbols)
}

fn overlay_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn apply(env: &mut VariableEnvironment, values: &[(VarId, f64)]) {
    for &(id, v) in values {
        env.set(id, v);
    }
}

fn q_values(env: &VariableEnvironment) -> [f64; Q_COUNT] {
    let mut q = [0.0; Q_COUNT];
    for (i, v) in q.iter_mut().enumerate() {
        *v = env.get(Q_BASE + i);
    }
    q
}

fn set_inputs(env: &mut VariableEnvironment, inputs: &FrameInputs) {
    let a = &inputs.audio;
    let values = [
        (var::TIME, inputs.time),
        (var::FRAME, inputs.frame as f64),
        (var::FPS, inputs.fps),
        (var::PROGRESS, inputs.progress),
        (var::BASS, f64::from(a.bass)),
        (var::MID, f64::from(a.mid)),
        (var::TREB, f64::from(a.treb)),
        (var::BASS_ATT, f64::from(a.bass_att)),
        (var::MID_ATT, f64::from(a.mid_att)),
        (var::TREB_ATT, f64::from(a.treb_att)),
        (var::VOL, f64::from(a.vol)),
        (var::VOL_ATT, f64::from(a.vol_att)),
        (var::ASPECTX, inputs.aspectx),
        (var::ASPECTY, inputs.aspecty),
        (var::MESHX, inputs.meshx as f64),
        (var::MESHY, inputs.meshy as f64),
        (var::PIXELSX, inputs.pixelsx as f64),
        (var::PIXELSY, inputs.pixelsy as f64),
    ];
    for (id, v) in values {
        env.set(id, funcs::sanitize(v));
    }
}

fn prepare_overlay(overlay: &mut OverlayModule, inputs: &FrameInputs, q: &[f64; Q_COUNT]) {
    set_inputs(&mut overlay.env, inputs);
    for (i, v) in q.iter().enumerate() {
        overlay.env.set(Q_BASE + i, *v);
    }
    apply(&mut overlay.env, &overlay.base);
}

fn rgba_vars(out: &mut Vec<(VarId, f64)>, ids: [VarId; 4], c: Rgba) {
    out.extend([
        (ids[0], f64::from(c.r)),
        (ids[1], f64::from(c.g)),
        (ids[2], f64::from(c.b)),
        (ids[3], f64::from(c.a)),
    ]);
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn frame_base(b: &BaseParams) -> Vec<(VarId, f64)> {
    let mut out = vec![
        (var::ZOOM, f64::from(b.zoom)),
        (var::ZOOMEXP, f64::from(b.zoomexp)),
        (var::ROT, f64::from(b.rot)),
        (var::WARP, f64::from(b.warp)),
        (var::CX, f64::from(b.cx)),
        (var::CY, f64::from(b.cy)),
        (var::DX, f64::from(b.dx)),
        (var::DY, f64::from(b.dy)),
        (var::SX, f64::from(b.sx)),
        (var::SY, f64::from(b.sy)),
        (var::DECAY, f64::from(b.decay)),
        (var::ECHO_ZOOM, f64::from(b.echo_zoom)),
        (var::ECHO_ALPHA, f64::from(b.echo_alpha)),
        (var::ECHO_ORIENT, f64::from(b.echo_orient)),
        (var::GAMMA, f64::from(b.gamma)),
        (var::BRIGHTEN, flag(b.brighten)),
        (var::DARKEN, flag(b.darken)),
        (var::SOLARIZE, flag(b.solarize)),
        (var::INVERT, flag(b.invert)),
        (var::WAVE_MODE, f64::from(b.wave_mode)),
        (var::WAVE_X, f64::from(b.wave_x)),
        (var::WAVE_Y, f64::from(b.wave_y)),
        (var::WAVE_SCALE, f64::from(b.wave_scale)),
        (var::OB_SIZE, f64::from(b.ob_size)),
        (var::IB_SIZE, f64::from(b.ib_size)),
    ];
    rgba_vars(&mut out, [var::WAVE_R, var::WAVE_G, var::WAVE_B, var::WAVE_A], b.wave);
    rgba_vars(&mut out, [var::OB_R, var::OB_G, var::OB_B, var::OB_A], b.ob);
    rgba_vars(&mut out, [var::IB_R, var::IB_G, var::IB_B, var::IB_A], b.ib);
    out
}

fn shape_base(s: &ShapeDef) -> Vec<(VarId, f64)> {
    let mut out = vec![
        (var::X, f64::from(s.x)),
        (var::Y, f64::from(s.y)),
        (var::RAD, f64::from(s.rad)),
        (var::ANG, f64::from(s.ang)),
        (var::SIDES, f64::from(s.sides)),
        (var::ADDITIVE, flag(s.additive)),
        (var::THICK, flag(s.thick)),
    ];
    rgba_vars(&mut out, [var::R, var::G, var::B, var::A], s.inner);
    rgba_vars(&mut out, [var::R2, var::G2, var::B2, var::A2], s.outer);
    rgba_vars(
        &mut out,
        [var::BORDER_R, var::BORDER_G, var::BORDER_B, var::BORDER_A],
        s.border,
    );
    out
}

fn wave_base(w: &WaveDef) -> Vec<(VarId, f64)> {
    let mut out = vec![(var::SAMPLES, w.samples as f64)];
    rgba_vars(&mut out, [var::R, var::G, var::B, var::A], w.color);
    out
}

fn read_frame_params(env: &VariableEnvironment) -> FrameParams {
    let f = |id| env.get_f32(id);
    let rgba = |r, g, b, a| {
        Rgba::new(
            f(r).clamp(0.0, 1.0),
            f(g).clamp(0.0, 1.0),
            f(b).clamp(0.0, 1.0),
            f(a).clamp(0.0, 1.0),
        )
    };
    FrameParams {
        zoom: f(var::ZOOM),
        zoomexp: f(var::ZOOMEXP),
        rot: f(var::ROT),
        warp: f(var::WARP),
        cx: f(var::CX),
        cy: f(var::CY),
        dx: f(var::DX),
        dy: f(var::DY),
        sx: f(var::SX),
        sy: f(var::SY),
        decay: f(var::DECAY).clamp(0.0, 1.0),
        echo_zoom: f(var::ECHO_ZOOM),
        echo_alpha: f(var::ECHO_ALPHA).clamp(0.0, 1.0),
        echo_orient: (env.get(var::ECHO_ORIENT).round() as i64).rem_euclid(4) as u8,
        gamma: f(var::GAMMA).max(0.0),
        brighten: funcs::truthy(env.get(var::BRIGHTEN)),
        darken: funcs::truthy(env.get(var::DARKEN)),
        solarize: funcs::truthy(env.get(var::SOLARIZE)),
        invert: funcs::truthy(env.get(var::INVERT)),
        wave_mode: (env.get(var::WAVE_MODE).round() as i64).clamp(0, 7) as u8,
        wave: rgba(var::WAVE_R, var::WAVE_G, var::WAVE_B, var::WAVE_A),
        wave_x: f(var::WAVE_X),
        wave_y: f(var::WAVE_Y),
        wave_scale: f(var::WAVE_SCALE),
        ob_size: f(var::OB_SIZE).clamp(0.0, 0.5),
        ob: rgba(var::OB_R, var::OB_G, var::OB_B, var::OB_A),
        ib_size: f(var::IB_SIZE).clamp(0.0, 0.5),
        ib: rgba(var::IB_R, var::IB_G, var::IB_B, var::IB_A),
    }
}

fn read_vertex_outputs(env: &VariableEnvironment) -> VertexOutputs {
    VertexOutputs {
        zoom: env.get_f32(var::ZOOM),
        zoomexp: env.get_f32(var::ZOOMEXP),
        rot: env.get_f32(var::ROT),
        warp: env.get_f32(var::WARP),
        cx: env.get_f32(var::CX),
        cy: env.get_f32(var::CY),
        dx: env.get_f32(var::DX),
        dy: env.get_f32(var::DY),
        sx: env.get_f32(var::SX),
        sy: env.get_f32(var::SY),
    }
}
