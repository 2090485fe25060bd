use crate::eqn::{EquationEngine, EquationModule, FrameParams, VertexOutputs};
use crate::preset::{MESH_MAX, MESH_MIN};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Where this vertex samples the previous frame, normalized.
    pub u: f32,
    pub v: f32,
    pub color: [f32; 4],
}

/// `(cols + 1) × (rows + 1)` warp vertices. Never resized in place: a
/// different size means a new `Mesh`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    cols: usize,
    rows: usize,
    vertices: Vec<Vertex>,
}

impl Mesh {
    pub fn new(cols: usize, rows: usize) -> Self {
        let cols = cols.clamp(MESH_MIN, MESH_MAX);
        let rows = rows.clamp(MESH_MIN, MESH_MAX);
        let mut vertices = Vec::with_capacity((cols + 1) * (rows + 1));
        for j in 0..=rows {
            for i in 0..=cols {
                vertices.push(Vertex {
                    u: i as f32 / cols as f32,
                    v: j as f32 / rows as f32,
                    color: [1.0, 1.0, 1.0, 1.0],
                });
            }
        }
        Self {
            cols,
            rows,
            vertices,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Row stride in vertices.
    pub fn stride(&self) -> usize {
        self.cols + 1
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, i: usize, j: usize) -> Vertex {
        let idx = j.min(self.rows) * self.stride() + i.min(self.cols);
        self.vertices[idx]
    }
}

/// Per-frame values the warp math needs beyond the equation outputs.
#[derive(Debug, Clone, Copy)]
pub struct WarpContext {
    pub time: f32,
    pub aspectx: f32,
    pub aspecty: f32,
    pub warp_speed: f32,
    pub warp_scale: f32,
}

/// Runs the per-vertex equations across a mesh and writes warped UVs and
/// vertex colours.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeshWarpStage;

impl MeshWarpStage {
    pub fn apply(
        &self,
        engine: &mut EquationEngine,
        module: &mut EquationModule,
        frame: &FrameParams,
        ctx: &WarpContext,
        mesh: &mut Mesh,
    ) {
        let per_vertex = module.has_vertex_equations();
        let warp = WarpTerms::new(ctx);
        let color = [frame.decay, frame.decay, frame.decay, 1.0];
        let (cols, rows) = mesh.dims();
        let stride = mesh.stride();

        for j in 0..=rows {
            let y = j as f32 / rows as f32;
            for i in 0..=cols {
                let x = i as f32 / cols as f32;
                let xn = (x * 2.0 - 1.0) * ctx.aspectx;
                let yn = (y * 2.0 - 1.0) * ctx.aspecty;
                let rad = (xn * xn + yn * yn).sqrt() / std::f32::consts::SQRT_2;
                let ang = (-yn).atan2(xn);

                let p = if per_vertex {
                    engine.run_vertex(module, x as f64, y as f64, rad as f64, ang as f64)
                } else {
                    frame_outputs(frame)
                };
                let (u, v) = warp_uv(&p, xn, yn, rad, &warp, ctx);
                mesh.vertices[j * stride + i] = Vertex { u, v, color };
            }
        }
    }
}

fn frame_outputs(f: &FrameParams) -> VertexOutputs {
    VertexOutputs {
        zoom: f.zoom,
        zoomexp: f.zoomexp,
        rot: f.rot,
        warp: f.warp,
        cx: f.cx,
        cy: f.cy,
        dx: f.dx,
        dy: f.dy,
        sx: f.sx,
        sy: f.sy,
    }
}

/// Time-dependent factors of the classic warp wobble, shared by every vertex.
struct WarpTerms {
    time: f32,
    scale_inv: f32,
    f: [f32; 4],
}

impl WarpTerms {
    fn new(ctx: &WarpContext) -> Self {
        let t = ctx.time * ctx.warp_speed;
        let scale_inv = if ctx.warp_scale.abs() > 1e-6 {
            1.0 / ctx.warp_scale
        } else {
            1.0
        };
        Self {
            time: t,
            scale_inv,
            f: [
                11.68 + 4.0 * (t * 1.413 + 10.0).cos(),
                8.77 + 3.0 * (t * 1.113 + 7.0).cos(),
                10.54 + 3.0 * (t * 1.233 + 3.0).cos(),
                11.49 + 4.0 * (t * 0.933 + 5.0).cos(),
            ],
        }
    }
}

fn warp_uv(
    p: &VertexOutputs,
    xn: f32,
    yn: f32,
    rad: f32,
    w: &WarpTerms,
    ctx: &WarpContext,
) -> (f32, f32) {
    let zoom2 = p.zoom.powf(p.zoomexp.powf(rad * 2.0 - 1.0));
    let zoom_inv = if zoom2.is_finite() && zoom2.abs() > 1e-6 {
        1.0 / zoom2
    } else {
        1.0
    };
    let mut u = xn * 0.5 * zoom_inv + 0.5;
    let mut v = yn * 0.5 * zoom_inv + 0.5;

    let sx = if p.sx.abs() > 1e-6 { p.sx } else { 1.0 };
    let sy = if p.sy.abs() > 1e-6 { p.sy } else { 1.0 };
    u = (u - p.cx) / sx + p.cx;
    v = (v - p.cy) / sy + p.cy;

    if p.warp != 0.0 {
        let amp = p.warp * 0.0035;
        let [f0, f1, f2, f3] = w.f;
        let s = w.scale_inv;
        u += amp * (w.time * 0.333 + s * (xn * f0 - yn * f3)).sin();
        v += amp * (w.time * 0.375 - s * (xn * f2 + yn * f1)).cos();
        u += amp * (w.time * 0.753 - s * (xn * f1 - yn * f2)).cos();
        v += amp * (w.time * 0.825 + s * (xn * f0 + yn * f3)).sin();
    }

    let (sin_r, cos_r) = p.rot.sin_cos();
    let u2 = u - p.cx;
    let v2 = v - p.cy;
    u = u2 * cos_r - v2 * sin_r + p.cx;
    v = u2 * sin_r + v2 * cos_r + p.cy;

    u -= p.dx;
    v -= p.dy;

    u = (u - 0.5) / ctx.aspectx + 0.5;
    v = (v - 0.5) / ctx.aspecty + 0.5;
    (sanitize(u, 0.5), sanitize(v, 0.5))
}

fn sanitize(v: f32, fallback: f32) -> f32 {
    if v.is_finite() { v } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_dimensions_are_clamped() {
        let m = Mesh::new(1, 500);
        assert_eq!(m.dims(), (MESH_MIN, MESH_MAX));
        assert_eq!(m.vertices().len(), (MESH_MIN + 1) * (MESH_MAX + 1));
    }

    #[test]
    fn identity_params_leave_uv_in_place() {
        let ctx = WarpContext {
            time: 0.0,
            aspectx: 1.0,
            aspecty: 1.0,
            warp_speed: 1.0,
            warp_scale: 1.0,
        };
        let p = VertexOutputs {
            zoom: 1.0,
            zoomexp: 1.0,
            rot: 0.0,
            warp: 0.0,
            cx: 0.5,
            cy: 0.5,
            dx: 0.0,
            dy: 0.0,
            sx: 1.0,
            sy: 1.0,
        };
        let (u, v) = warp_uv(&p, 0.5, -0.25, 0.4, &WarpTerms::new(&ctx), &ctx);
        assert!((u - 0.75).abs() < 1e-6);
        assert!((v - 0.375).abs() < 1e-6);
    }
}
