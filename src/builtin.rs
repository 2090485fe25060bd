//! Presets compiled into the binary so the host has something to show
//! without a preset loader.

use crate::preset::{MeshHints, Preset, Rgba, ShapeDef, WaveDef};

pub fn builtin_presets() -> Vec<Preset> {
    vec![tunnel(), bloom(), spiral_bars(), lattice(), nebula()]
}

/// Looks a preset up by list index or case-insensitive name substring.
pub fn find_preset(presets: &[Preset], query: &str) -> Option<usize> {
    if let Ok(i) = query.trim().parse::<usize>() {
        return (i < presets.len()).then_some(i);
    }
    let q = query.trim().to_lowercase();
    presets.iter().position(|p| p.name.to_lowercase().contains(&q))
}

fn tunnel() -> Preset {
    let mut p = Preset::new("Bass Tunnel").with_equations(
        "reg00 = 0; q2 = 1",
        "reg00 = reg00 + bass_att * 0.02;\n\
         zoom = 1.02 + 0.06 * bass_att;\n\
         rot = 0.01 * sin(time * 0.4) + 0.02 * (treb_att - 0.5);\n\
         wave_r = 0.5 + 0.5 * sin(time * 1.1);\n\
         wave_g = 0.5 + 0.5 * sin(time * 1.3 + 2);\n\
         wave_b = 0.5 + 0.5 * sin(time * 0.7 + 4);\n\
         q1 = reg00",
        "zoom = zoom + 0.04 * rad * sin(q1 + ang * 3);",
    );
    p.base.decay = 0.96;
    p.base.warp = 0.4;
    p.base.wave_mode = 0;
    p.base.ob_size = 0.01;
    p.base.ob = Rgba::new(0.0, 0.0, 0.0, 0.8);
    p
}

fn bloom() -> Preset {
    let mut p = Preset::new("Petal Bloom").with_equations(
        "",
        "zoom = 0.98 + 0.03 * mid_att;\n\
         decay = 0.94 + 0.04 * (1 - vol);\n\
         q1 = time * 0.5;\n\
         q2 = bass",
        "",
    );
    p.base.echo_alpha = 0.35;
    p.base.echo_zoom = 1.3;
    p.base.echo_orient = 1;
    p.base.wave.a = 0.0;
    p.shapes.push(ShapeDef {
        sides: 6,
        additive: true,
        rad: 0.12,
        inner: Rgba::new(1.0, 0.4, 0.7, 0.9),
        outer: Rgba::new(0.2, 0.0, 0.5, 0.0),
        frame_eqs: "ang = q1; rad = 0.1 + 0.15 * q2; t1 = t1 + 0.01;\n\
                    x = 0.5 + 0.2 * cos(t1 * 3); y = 0.5 + 0.2 * sin(t1 * 2)"
            .to_string(),
        ..ShapeDef::default()
    });
    p.shapes.push(ShapeDef {
        sides: 3,
        thick: true,
        rad: 0.06,
        inner: Rgba::new(1.0, 1.0, 0.6, 0.7),
        outer: Rgba::new(1.0, 0.6, 0.0, 0.2),
        border: Rgba::new(1.0, 1.0, 1.0, 0.6),
        frame_eqs: "ang = -q1 * 2; x = 1 - (0.5 + 0.2 * cos(q1)); y = 0.5 + 0.2 * sin(q1)"
            .to_string(),
        ..ShapeDef::default()
    });
    p
}

fn spiral_bars() -> Preset {
    let mut p = Preset::new("Spectrum Spiral").with_equations(
        "",
        "rot = 0.02 + 0.03 * treb_att;\n\
         zoom = 0.99;\n\
         dx = 0.002 * sin(time)",
        "rot = rot + 0.05 * (1 - rad);",
    );
    p.base.decay = 0.97;
    p.base.wave_mode = 1;
    p.base.wave_y = 0.2;
    p.base.gamma = 1.2;
    p.waves.push(WaveDef {
        samples: 96,
        spectrum: true,
        thick: true,
        scaling: 2.0,
        smoothing: 0.3,
        color: Rgba::new(0.3, 0.9, 1.0, 0.9),
        frame_eqs: "g = 0.6 + 0.4 * sin(time)".to_string(),
        point_eqs: "r = sample; t2 = sample * 6.2832 + time;\n\
                    x = 0.5 + (0.15 + value1 * 0.3) * cos(t2);\n\
                    y = 0.5 + (0.15 + value1 * 0.3) * sin(t2)"
            .to_string(),
        ..WaveDef::default()
    });
    p
}

fn lattice() -> Preset {
    let mut p = Preset::new("Lattice Drift").with_equations(
        "reg01 = rand(100) / 100",
        "cx = 0.5 + 0.1 * sin(time * 0.3 + reg01 * 6);\n\
         cy = 0.5 + 0.1 * cos(time * 0.37);\n\
         sx = 1 + 0.01 * above(bass, 0.5);\n\
         invert = above(treb, 0.9);\n\
         ib_size = 0.02; ib_r = bass; ib_g = mid; ib_b = treb; ib_a = 0.5",
        "dx = 0.004 * sin(y * 20 + time);\n\
         dy = 0.004 * cos(x * 20 + time);",
    );
    p.mesh = Some(MeshHints { cols: 32, rows: 24 });
    p.base.wrap = false;
    p.base.warp = 0.0;
    p.base.decay = 0.99;
    p.waves.push(WaveDef {
        samples: 64,
        dots: true,
        color: Rgba::new(1.0, 0.8, 0.2, 1.0),
        point_eqs: "y = y + 0.2 * value2".to_string(),
        ..WaveDef::default()
    });
    p
}

fn nebula() -> Preset {
    let mut p = Preset::new("Nebula").with_equations(
        "",
        "warp = 1.5 + vol_att;\n\
         zoom = 1.01;\n\
         brighten = above(vol, 0.6);\n\
         q3 = sin(time * 0.2)",
        "rot = rot + 0.02 * q3 * rad;\n\
         zoom = zoom - 0.02 * sqr(rad);",
    );
    p.base.warp_speed = 0.6;
    p.base.warp_scale = 1.4;
    p.base.decay = 0.985;
    p.base.wave = Rgba::new(0.6, 0.4, 1.0, 0.6);
    p.base.wave_scale = 1.5;
    p.shapes.push(ShapeDef {
        sides: 40,
        additive: true,
        rad: 0.05,
        inner: Rgba::new(0.8, 0.8, 1.0, 0.5),
        outer: Rgba::new(0.1, 0.0, 0.3, 0.0),
        frame_eqs: "rad = 0.04 + 0.1 * bass_att".to_string(),
        ..ShapeDef::default()
    });
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_index_and_name() {
        let presets = builtin_presets();
        assert_eq!(find_preset(&presets, "1"), Some(1));
        assert_eq!(find_preset(&presets, "nebula"), Some(4));
        assert_eq!(find_preset(&presets, "99"), None);
        assert_eq!(find_preset(&presets, "nope"), None);
    }
}
