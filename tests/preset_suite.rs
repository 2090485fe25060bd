use warpviz::builtin::{builtin_presets, find_preset};
use warpviz::capability::probe_backends;
use warpviz::config::BackendPreference;
use warpviz::eqn::EquationEngine;
use warpviz::preset::{MeshHints, Preset, PresetError, ShapeDef, WaveDef};

#[test]
fn builtin_presets_are_valid_and_load() {
    let presets = builtin_presets();
    assert!(presets.len() >= 5);
    let mut engine = EquationEngine::new(&probe_backends(BackendPreference::Auto));
    for p in &presets {
        assert_eq!(p.validate(), Ok(()), "{}", p.name);
        let module = engine.load(p, 3).unwrap_or_else(|e| panic!("{}: {e}", p.name));
        assert_eq!(module.shape_count(), p.shapes.len());
        assert_eq!(module.wave_count(), p.waves.len());
    }
}

#[test]
fn names_are_unique() {
    let presets = builtin_presets();
    for (i, p) in presets.iter().enumerate() {
        assert_eq!(find_preset(&presets, &p.name), Some(i));
    }
}

#[test]
fn structural_gaps_are_reported() {
    let mut p = Preset::new("  ");
    assert_eq!(p.validate(), Err(PresetError::Unnamed));

    p = Preset::new("x");
    p.equations.init = None;
    assert_eq!(p.validate(), Err(PresetError::MissingGroup("init")));

    p = Preset::new("x");
    p.equations.frame = None;
    assert_eq!(p.validate(), Err(PresetError::MissingGroup("per-frame")));

    p = Preset::new("x");
    p.mesh = None;
    assert_eq!(p.validate(), Err(PresetError::MissingMesh));

    p = Preset::new("x");
    p.mesh = Some(MeshHints { cols: 1, rows: 24 });
    assert_eq!(p.validate(), Err(PresetError::MeshRange { cols: 1, rows: 24 }));
}

#[test]
fn base_parameters_are_range_checked() {
    let mut p = Preset::new("x");
    p.base.zoom = f32::NAN;
    assert_eq!(p.validate(), Err(PresetError::NonFinite("zoom")));

    p = Preset::new("x");
    p.base.decay = 1.5;
    assert!(matches!(p.validate(), Err(PresetError::OutOfRange { name: "decay", .. })));

    p = Preset::new("x");
    p.base.echo_orient = 4;
    assert!(matches!(p.validate(), Err(PresetError::OutOfRange { name: "echo_orient", .. })));

    p = Preset::new("x");
    p.base.blend_hint = Some(-1.0);
    assert!(matches!(p.validate(), Err(PresetError::OutOfRange { name: "blend_hint", .. })));
}

#[test]
fn overlay_definitions_are_checked() {
    let mut p = Preset::new("x");
    p.shapes.push(ShapeDef::default());
    p.shapes.push(ShapeDef {
        sides: 2,
        ..ShapeDef::default()
    });
    assert!(matches!(p.validate(), Err(PresetError::Shape { index: 1, .. })));

    let mut p = Preset::new("x");
    p.waves.push(WaveDef {
        samples: 1,
        ..WaveDef::default()
    });
    assert!(matches!(p.validate(), Err(PresetError::Wave { index: 0, .. })));

    let mut p = Preset::new("x");
    p.waves.push(WaveDef {
        smoothing: 2.0,
        ..WaveDef::default()
    });
    assert!(matches!(p.validate(), Err(PresetError::Wave { index: 0, .. })));
}

#[test]
fn blend_hints_must_fit_a_duration() {
    let mut p = Preset::new("x");
    p.base.blend_hint = Some(1e20);
    assert!(matches!(p.validate(), Err(PresetError::OutOfRange { name: "blend_hint", .. })));

    p.base.blend_hint = Some(f32::INFINITY);
    assert!(matches!(p.validate(), Err(PresetError::OutOfRange { name: "blend_hint", .. })));

    p.base.blend_hint = Some(3.0);
    assert_eq!(p.validate(), Ok(()));
}
