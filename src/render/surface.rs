/// RGBA8 pixel buffer, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    w: usize,
    h: usize,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(w: usize, h: usize) -> Self {
        let mut pixels = vec![0u8; w.saturating_mul(h).saturating_mul(4)];
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self { w, h, pixels }
    }

    pub fn w(&self) -> usize {
        self.w
    }

    pub fn h(&self) -> usize {
        self.h
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn clear(&mut self) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
    }

    pub fn copy_from(&mut self, other: &Surface) {
        if self.dims() == other.dims() {
            self.pixels.copy_from_slice(&other.pixels);
        }
    }

    /// A fresh allocation of `w`×`h` with this surface's content resampled into it.
    pub fn resampled(&self, w: usize, h: usize) -> Surface {
        let mut out = Surface::new(w, h);
        if self.is_empty() || out.is_empty() {
            return out;
        }
        for y in 0..h {
            let v = (y as f32 + 0.5) / h as f32;
            for x in 0..w {
                let u = (x as f32 + 0.5) / w as f32;
                let [r, g, b] = self.sample(u, v, false);
                out.put(x, y, [r, g, b]);
            }
        }
        out
    }

    pub fn get(&self, x: usize, y: usize) -> [u8; 4] {
        if x >= self.w || y >= self.h {
            return [0, 0, 0, 0];
        }
        let i = (y * self.w + x) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    /// Writes an opaque pixel from channel values in 0..=255.
    pub fn put(&mut self, x: usize, y: usize, rgb: [f32; 3]) {
        if x >= self.w || y >= self.h {
            return;
        }
        let i = (y * self.w + x) * 4;
        self.pixels[i] = to_u8(rgb[0]);
        self.pixels[i + 1] = to_u8(rgb[1]);
        self.pixels[i + 2] = to_u8(rgb[2]);
        self.pixels[i + 3] = 255;
    }

    /// Blends a colour with components in [0, 1] over the pixel at (`x`, `y`).
    pub fn blend(&mut self, x: isize, y: isize, rgba: [f32; 4], additive: bool) {
        if x < 0 || y < 0 || x as usize >= self.w || y as usize >= self.h {
            return;
        }
        let i = (y as usize * self.w + x as usize) * 4;
        let a = rgba[3].clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        for c in 0..3 {
            let dst = self.pixels[i + c] as f32;
            let src = rgba[c].clamp(0.0, 1.0) * 255.0;
            let v = if additive {
                dst + src * a
            } else {
                dst * (1.0 - a) + src * a
            };
            self.pixels[i + c] = to_u8(v);
        }
    }

    /// Bilinear sample at normalized (`u`, `v`); returns channels in 0..=255.
    pub fn sample(&self, u: f32, v: f32, wrap: bool) -> [f32; 3] {
        if self.is_empty() {
            return [0.0; 3];
        }
        let fx = u * self.w as f32 - 0.5;
        let fy = v * self.h as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as isize, y0 as isize);

        let texel = |x: isize, y: isize| -> [f32; 3] {
            let (xx, yy) = if wrap {
                (
                    x.rem_euclid(self.w as isize) as usize,
                    y.rem_euclid(self.h as isize) as usize,
                )
            } else {
                (
                    x.clamp(0, self.w as isize - 1) as usize,
                    y.clamp(0, self.h as isize - 1) as usize,
                )
            };
            let i = (yy * self.w + xx) * 4;
            [
                self.pixels[i] as f32,
                self.pixels[i + 1] as f32,
                self.pixels[i + 2] as f32,
            ]
        };

        let a = texel(x0, y0);
        let b = texel(x0 + 1, y0);
        let c = texel(x0, y0 + 1);
        let d = texel(x0 + 1, y0 + 1);
        let mut out = [0.0f32; 3];
        for k in 0..3 {
            let top = a[k] + (b[k] - a[k]) * tx;
            let bot = c[k] + (d[k] - c[k]) * tx;
            out[k] = top + (bot - top) * ty;
        }
        out
    }
}

#[inline]
pub fn to_u8(v: f32) -> u8 {
    if v.is_finite() {
        v.round().clamp(0.0, 255.0) as u8
    } else {
        0
    }
}
