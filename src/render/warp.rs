use super::mesh::Mesh;
use super::surface::Surface;

/// Samples `prev` through the warped mesh into `out`. UVs and colours are
/// bilinearly interpolated inside each mesh cell; the sampled colour is
/// multiplied by the interpolated vertex colour.
pub fn warp_pass(prev: &Surface, mesh: &Mesh, wrap: bool, out: &mut Surface) {
    let (w, h) = out.dims();
    if w == 0 || h == 0 {
        return;
    }
    let (cols, rows) = mesh.dims();
    let stride = mesh.stride();
    let verts = mesh.vertices();

    for py in 0..h {
        let gy = (py as f32 + 0.5) / h as f32 * rows as f32;
        let j = (gy.floor() as usize).min(rows - 1);
        let ty = gy - j as f32;
        for px in 0..w {
            let gx = (px as f32 + 0.5) / w as f32 * cols as f32;
            let i = (gx.floor() as usize).min(cols - 1);
            let tx = gx - i as f32;

            let a = verts[j * stride + i];
            let b = verts[j * stride + i + 1];
            let c = verts[(j + 1) * stride + i];
            let d = verts[(j + 1) * stride + i + 1];

            let lerp2 = |fa: f32, fb: f32, fc: f32, fd: f32| {
                let top = fa + (fb - fa) * tx;
                let bot = fc + (fd - fc) * tx;
                top + (bot - top) * ty
            };
            let u = lerp2(a.u, b.u, c.u, d.u);
            let v = lerp2(a.v, b.v, c.v, d.v);
            let rgb = prev.sample(u, v, wrap);
            let mut px_out = [0.0f32; 3];
            for k in 0..3 {
                let tint = lerp2(a.color[k], b.color[k], c.color[k], d.color[k]);
                px_out[k] = rgb[k] * tint;
            }
            out.put(px, py, px_out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mesh_copies_the_frame() {
        let mut prev = Surface::new(8, 6);
        for y in 0..6 {
            for x in 0..8 {
                prev.put(x, y, [(x * 30) as f32, (y * 40) as f32, 7.0]);
            }
        }
        let mesh = Mesh::new(4, 3);
        let mut out = Surface::new(8, 6);
        warp_pass(&prev, &mesh, false, &mut out);
        assert_eq!(out, prev);
    }
}
