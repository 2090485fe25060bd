use std::time::Duration;

use thiserror::Error;

/// Mesh columns/rows accepted from hints and configuration.
pub const MESH_MIN: usize = 2;
pub const MESH_MAX: usize = 192;
pub const MAX_SHAPE_SIDES: u32 = 100;
pub const MAX_WAVE_SAMPLES: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("preset has no name")]
    Unnamed,
    #[error("missing {0} equation group")]
    MissingGroup(&'static str),
    #[error("missing mesh hints")]
    MissingMesh,
    #[error("mesh {cols}x{rows} outside {MESH_MIN}..={MESH_MAX}")]
    MeshRange { cols: usize, rows: usize },
    #[error("base parameter '{0}' is not finite")]
    NonFinite(&'static str),
    #[error("base parameter '{name}' = {value} out of range")]
    OutOfRange { name: &'static str, value: String },
    #[error("shape #{index}: {message}")]
    Shape { index: usize, message: String },
    #[error("wave #{index}: {message}")]
    Wave { index: usize, message: String },
}

/// The three main equation groups. `None` means the loader never supplied
/// the group, which is a structural fault; an empty string is a valid no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquationGroups {
    pub init: Option<String>,
    pub frame: Option<String>,
    pub vertex: Option<String>,
}

impl EquationGroups {
    pub fn new(init: &str, frame: &str, vertex: &str) -> Self {
        Self {
            init: Some(init.to_string()),
            frame: Some(frame.to_string()),
            vertex: Some(vertex.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshHints {
    pub cols: usize,
    pub rows: usize,
}

impl Default for MeshHints {
    fn default() -> Self {
        Self { cols: 48, rows: 36 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }
}

/// Values every frame starts from before the frame equations run.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseParams {
    pub decay: f32,
    pub zoom: f32,
    pub zoomexp: f32,
    pub rot: f32,
    pub warp: f32,
    pub warp_speed: f32,
    pub warp_scale: f32,
    pub cx: f32,
    pub cy: f32,
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,
    /// Texture wrap for the feedback sample; clamp otherwise.
    pub wrap: bool,
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
    /// Preferred blend duration in seconds when switching to this preset.
    pub blend_hint: Option<f32>,
}

impl Default for BaseParams {
    fn default() -> Self {
        Self {
            decay: 0.98,
            zoom: 1.0,
            zoomexp: 1.0,
            rot: 0.0,
            warp: 1.0,
            warp_speed: 1.0,
            warp_scale: 1.0,
            cx: 0.5,
            cy: 0.5,
            dx: 0.0,
            dy: 0.0,
            sx: 1.0,
            sy: 1.0,
            wrap: true,
            echo_zoom: 1.0,
            echo_alpha: 0.0,
            echo_orient: 0,
            gamma: 1.0,
            brighten: false,
            darken: false,
            solarize: false,
            invert: false,
            wave_mode: 0,
            wave: Rgba::new(1.0, 1.0, 1.0, 0.8),
            wave_x: 0.5,
            wave_y: 0.5,
            wave_scale: 1.0,
            ob_size: 0.0,
            ob: Rgba::new(0.0, 0.0, 0.0, 0.0),
            ib_size: 0.0,
            ib: Rgba::new(0.0, 0.0, 0.0, 0.0),
            blend_hint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDef {
    pub enabled: bool,
    pub sides: u32,
    pub additive: bool,
    pub thick: bool,
    pub x: f32,
    pub y: f32,
    pub rad: f32,
    pub ang: f32,
    pub inner: Rgba,
    pub outer: Rgba,
    pub border: Rgba,
    pub init_eqs: String,
    pub frame_eqs: String,
}

impl Default for ShapeDef {
    fn default() -> Self {
        Self {
            enabled: true,
            sides: 4,
            additive: false,
            thick: false,
            x: 0.5,
            y: 0.5,
            rad: 0.1,
            ang: 0.0,
            inner: Rgba::new(1.0, 0.0, 0.0, 1.0),
            outer: Rgba::new(0.0, 1.0, 0.0, 0.0),
            border: Rgba::new(1.0, 1.0, 1.0, 0.0),
            init_eqs: String::new(),
            frame_eqs: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveDef {
    pub enabled: bool,
    pub samples: usize,
    pub spectrum: bool,
    pub dots: bool,
    pub additive: bool,
    pub thick: bool,
    pub scaling: f32,
    pub smoothing: f32,
    pub color: Rgba,
    pub init_eqs: String,
    pub frame_eqs: String,
    pub point_eqs: String,
}

impl Default for WaveDef {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 128,
            spectrum: false,
            dots: false,
            additive: false,
            thick: false,
            scaling: 1.0,
            smoothing: 0.5,
            color: Rgba::new(1.0, 1.0, 1.0, 1.0),
            init_eqs: String::new(),
            frame_eqs: String::new(),
            point_eqs: String::new(),
        }
    }
}

/// A loaded preset. Immutable once handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub equations: EquationGroups,
    pub base: BaseParams,
    pub shapes: Vec<ShapeDef>,
    pub waves: Vec<WaveDef>,
    pub mesh: Option<MeshHints>,
}

impl Preset {
    /// A structurally complete preset with empty equations and default parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            equations: EquationGroups::new("", "", ""),
            base: BaseParams::default(),
            shapes: Vec::new(),
            waves: Vec::new(),
            mesh: Some(MeshHints::default()),
        }
    }

    pub fn with_equations(mut self, init: &str, frame: &str, vertex: &str) -> Self {
        self.equations = EquationGroups::new(init, frame, vertex);
        self
    }

    pub fn mesh_hints(&self) -> MeshHints {
        self.mesh.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), PresetError> {
        if self.name.trim().is_empty() {
            return Err(PresetError::Unnamed);
        }
        if self.equations.init.is_none() {
            return Err(PresetError::MissingGroup("init"));
        }
        if self.equations.frame.is_none() {
            return Err(PresetError::MissingGroup("per-frame"));
        }
        if self.equations.vertex.is_none() {
            return Err(PresetError::MissingGroup("per-vertex"));
        }
        let mesh = self.mesh.ok_or(PresetError::MissingMesh)?;
        let range = MESH_MIN..=MESH_MAX;
        if !range.contains(&mesh.cols) || !range.contains(&mesh.rows) {
            return Err(PresetError::MeshRange {
                cols: mesh.cols,
                rows: mesh.rows,
            });
        }
        validate_base(&self.base)?;

        for (index, s) in self.shapes.iter().enumerate() {
            let fail = |message: &str| PresetError::Shape {
                index,
                message: message.to_string(),
            };
            if !(3..=MAX_SHAPE_SIDES).contains(&s.sides) {
                return Err(fail("sides must be in 3..=100"));
            }
            let finite = [s.x, s.y, s.rad, s.ang].iter().all(|v| v.is_finite());
            if !finite || !s.inner.is_finite() || !s.outer.is_finite() || !s.border.is_finite() {
                return Err(fail("non-finite parameter"));
            }
        }
        for (index, w) in self.waves.iter().enumerate() {
            let fail = |message: &str| PresetError::Wave {
                index,
                message: message.to_string(),
            };
            if !(2..=MAX_WAVE_SAMPLES).contains(&w.samples) {
                return Err(fail("samples must be in 2..=512"));
            }
            if !w.scaling.is_finite() || !w.color.is_finite() {
                return Err(fail("non-finite parameter"));
            }
            if !(0.0..=1.0).contains(&w.smoothing) {
                return Err(fail("smoothing must be in [0, 1]"));
            }
        }
        Ok(())
    }
}

fn validate_base(b: &BaseParams) -> Result<(), PresetError> {
    let scalars: [(&'static str, f32); 20] = [
        ("decay", b.decay),
        ("zoom", b.zoom),
        ("zoomexp", b.zoomexp),
        ("rot", b.rot),
        ("warp", b.warp),
        ("warp_speed", b.warp_speed),
        ("warp_scale", b.warp_scale),
        ("cx", b.cx),
        ("cy", b.cy),
        ("dx", b.dx),
        ("dy", b.dy),
        ("sx", b.sx),
        ("sy", b.sy),
        ("echo_zoom", b.echo_zoom),
        ("echo_alpha", b.echo_alpha),
        ("gamma", b.gamma),
        ("wave_x", b.wave_x),
        ("wave_y", b.wave_y),
        ("wave_scale", b.wave_scale),
        ("ob_size", b.ob_size),
    ];
    for (name, v) in scalars {
        if !v.is_finite() {
            return Err(PresetError::NonFinite(name));
        }
    }
    if !b.ib_size.is_finite() || !b.wave.is_finite() || !b.ob.is_finite() || !b.ib.is_finite() {
        return Err(PresetError::NonFinite("colour"));
    }
    let out_of_range = |name: &'static str, v: f32| PresetError::OutOfRange {
        name,
        value: v.to_string(),
    };
    if !(0.0..=1.0).contains(&b.decay) {
        return Err(out_of_range("decay", b.decay));
    }
    if !(0.0..=1.0).contains(&b.echo_alpha) {
        return Err(out_of_range("echo_alpha", b.echo_alpha));
    }
    if b.echo_orient > 3 {
        return Err(out_of_range("echo_orient", f32::from(b.echo_orient)));
    }
    if let Some(hint) = b.blend_hint {
        if Duration::try_from_secs_f32(hint).is_err() {
            return Err(out_of_range("blend_hint", hint));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_is_complete() {
        assert_eq!(Preset::new("x").validate(), Ok(()));
    }

    #[test]
    fn missing_vertex_group_is_rejected() {
        let mut p = Preset::new("x");
        p.equations.vertex = None;
        assert_eq!(p.validate(), Err(PresetError::MissingGroup("per-vertex")));
    }
}
