//! Geometry drawn over the warped frame: custom shapes, custom waves, the
//! main waveform and the outer/inner borders. Overlay coordinates have
//! y = 0 at the bottom.

use std::f32::consts::PI;

use super::surface::Surface;
use crate::eqn::{FrameParams, ShapeInstance, WavePoint};
use crate::preset::Rgba;

fn rgba(c: Rgba) -> [f32; 4] {
    [c.r, c.g, c.b, c.a]
}

fn lerp4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let mut out = [0.0; 4];
    for k in 0..4 {
        out[k] = a[k] + (b[k] - a[k]) * t;
    }
    out
}

fn to_px(s: &Surface, x: f32, y: f32) -> (f32, f32) {
    (x * s.w() as f32, (1.0 - y) * s.h() as f32)
}

/// Filled regular polygon with a radial gradient from `inner` (centre) to
/// `outer` (edge), plus an optional border.
pub fn draw_shape(s: &mut Surface, shape: &ShapeInstance) {
    if s.is_empty() || shape.rad <= 0.0 || !shape.rad.is_finite() {
        return;
    }
    let (cx, cy) = to_px(s, shape.x, shape.y);
    let r = shape.rad * s.w().min(s.h()) as f32;
    if !(r.is_finite() && cx.is_finite() && cy.is_finite()) {
        return;
    }
    let sides = shape.sides.max(3) as f32;
    let half_sector = PI / sides;
    let border_px = if shape.thick { 2.0 } else { 1.0 };
    let inner = rgba(shape.inner);
    let outer = rgba(shape.outer);
    let border = rgba(shape.border);

    let x0 = (cx - r - 1.0).floor().max(0.0) as isize;
    let x1 = (cx + r + 1.0).ceil().min(s.w() as f32) as isize;
    let y0 = (cy - r - 1.0).floor().max(0.0) as isize;
    let y1 = (cy + r + 1.0).ceil().min(s.h() as f32) as isize;

    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f32 + 0.5 - cx;
            let dy = cy - (py as f32 + 0.5);
            let d = (dx * dx + dy * dy).sqrt();
            let phi = (dy.atan2(dx) - shape.ang).rem_euclid(2.0 * PI);
            let in_sector = phi % (2.0 * half_sector) - half_sector;
            let edge = r * half_sector.cos() / in_sector.cos();
            if d > edge {
                continue;
            }
            let t = if edge > 0.0 { d / edge } else { 0.0 };
            let fill = lerp4(inner, outer, t);
            s.blend(px, py, fill, shape.additive);
            if border[3] > 0.0 && edge - d <= border_px {
                s.blend(px, py, border, shape.additive);
            }
        }
    }
}

/// Alpha-blended line; thick lines are drawn 2 px wide.
pub fn draw_line(s: &mut Surface, a: (f32, f32), b: (f32, f32), color: [f32; 4], thick: bool, additive: bool) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let steps = dx.abs().max(dy.abs()).ceil().clamp(1.0, 4096.0) as usize;
    for k in 0..=steps {
        let t = k as f32 / steps as f32;
        let x = (a.0 + dx * t).floor() as isize;
        let y = (a.1 + dy * t).floor() as isize;
        s.blend(x, y, color, additive);
        if thick {
            s.blend(x + 1, y, color, additive);
            s.blend(x, y + 1, color, additive);
        }
    }
}

pub fn draw_wave(s: &mut Surface, points: &[WavePoint], dots: bool, thick: bool, additive: bool) {
    if s.is_empty() {
        return;
    }
    if dots {
        for p in points {
            let (x, y) = to_px(s, p.x, p.y);
            let (x, y) = (x.floor() as isize, y.floor() as isize);
            s.blend(x, y, rgba(p.color), additive);
            if thick {
                s.blend(x + 1, y, rgba(p.color), additive);
                s.blend(x, y + 1, rgba(p.color), additive);
                s.blend(x + 1, y + 1, rgba(p.color), additive);
            }
        }
        return;
    }
    for pair in points.windows(2) {
        let a = to_px(s, pair[0].x, pair[0].y);
        let b = to_px(s, pair[1].x, pair[1].y);
        draw_line(s, a, b, rgba(pair[0].color), thick, additive);
    }
}

/// Built-in waveform: mode 0 is a circle around (`wave_x`, `wave_y`), any
/// other mode a horizontal line through `wave_y`.
pub fn draw_main_wave(s: &mut Surface, frame: &FrameParams, mono: &[f32]) {
    if s.is_empty() || mono.len() < 2 || frame.wave.a <= 0.0 {
        return;
    }
    let count = mono.len().min(256);
    let step = mono.len() as f32 / count as f32;
    let sample = |k: usize| mono[((k as f32 * step) as usize).min(mono.len() - 1)];
    let color = rgba(frame.wave);
    let scale = frame.wave_scale;

    let mut pts: Vec<(f32, f32)> = Vec::with_capacity(count + 1);
    match frame.wave_mode {
        0 => {
            let aspect = s.h() as f32 / s.w().max(1) as f32;
            for k in 0..=count {
                let a = k as f32 / count as f32 * 2.0 * PI;
                let r = 0.25 + sample(k % count) * 0.1 * scale;
                let x = frame.wave_x + r * a.cos() * aspect;
                let y = frame.wave_y + r * a.sin();
                pts.push(to_px(s, x, y));
            }
        }
        _ => {
            for k in 0..count {
                let x = k as f32 / (count - 1).max(1) as f32;
                let y = frame.wave_y + sample(k) * 0.25 * scale;
                pts.push(to_px(s, x, y));
            }
        }
    }
    for pair in pts.windows(2) {
        draw_line(s, pair[0], pair[1], color, false, false);
    }
}

/// Outer border of `ob_size`, then inner border of `ib_size` inside it.
/// Sizes are fractions of the smaller dimension.
pub fn draw_borders(s: &mut Surface, frame: &FrameParams) {
    if s.is_empty() {
        return;
    }
    let min_dim = s.w().min(s.h()) as f32;
    let ob = (frame.ob_size * min_dim).round() as usize;
    let ib = (frame.ib_size * min_dim).round() as usize;
    if ob > 0 && frame.ob.a > 0.0 {
        frame_rect(s, 0, ob, rgba(frame.ob));
    }
    if ib > 0 && frame.ib.a > 0.0 {
        frame_rect(s, ob, ob + ib, rgba(frame.ib));
    }
}

/// Fills the ring between `from` and `to` pixels in from each edge.
fn frame_rect(s: &mut Surface, from: usize, to: usize, color: [f32; 4]) {
    let (w, h) = s.dims();
    for y in 0..h {
        let dy = y.min(h - 1 - y);
        for x in 0..w {
            let d = dy.min(x.min(w - 1 - x));
            if d >= from && d < to {
                s.blend(x as isize, y as isize, color, false);
            }
        }
    }
}
