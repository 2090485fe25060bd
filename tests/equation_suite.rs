use std::cell::Cell;
use std::rc::Rc;

use warpviz::eqn::ast::Expr;
use warpviz::eqn::backend::{
    Backend, BackendKind, CompileError, ExecFault, Executable, FAILURE_THRESHOLD,
};
use warpviz::eqn::bytecode::BytecodeBackend;
use warpviz::eqn::env::{SymbolTable, VariableEnvironment, var};
use warpviz::eqn::interp::InterpreterBackend;
use warpviz::eqn::parser::parse_program;
use warpviz::eqn::{EquationEngine, FrameInputs, LoadError};
use warpviz::preset::{Preset, ShapeDef, WaveDef};

const EPS: f64 = 1e-9;

const CORPUS: &[&str] = &[
    // trigonometric
    "zoom = 1 + 0.1 * sin(time * 2.3) * cos(bass * 3.1); rot = atan2(sin(time), cos(time * 0.5)) * 0.1;",
    "reg10 = tan(time * 0.1) + asin(min(1, mid)) - acos(max(-1, -treb)); x = sqr(reg10) + sqrt(abs(reg10));",
    // persistent register accumulation
    "reg00 = reg00 + bass * 0.5; reg01 = reg01 * 0.9 + reg00 * 0.1; q1 = reg01 % 3;",
    "reg02 += treb; reg03 -= mid * 2; reg04 *= 1.01; reg04 = if(equal(reg04, 0), 1, reg04); reg05 /= 2;",
    "myacc = myacc + 1; other = pow(myacc, 1.5) ^ 0.5 + fmod(myacc, 7) + int(myacc / 3);",
    // conditional / threshold
    "q2 = above(bass, 0.5) * 2 + below(mid, 0.25) + equal(floor(time), 3);",
    "q3 = if(bass > mid && treb < 0.9, sign(bass - 0.4), if(!(mid >= 0.2) || treb == 0, -1, 0.5));",
    "q4 = band(bass, mid) + bor(0, treb) + bnot(q4) + sigmoid(time - 2, 3);",
    "decay = 0.9 + 0.1 * (bass >= 0.3) - 0.05 * (treb <= 0.2) + (mid != 0.5) * 0.01;",
    // faults that must be sanitized identically
    "reg06 = 1 / (bass - bass); reg07 = log(0) + log10(-1); reg08 = sqrt(-mid) + exp(1000); reg09 = 5 % 0;",
    // nested assignments and rand from the seeded source
    "a = (b = time * 2) + (c = b * b); d = rand(10) + rand(0); e = -(-a) + +c;",
];

fn run_backend(backend: &dyn Backend, src: &str, frames: usize) -> Vec<f64> {
    let mut symbols = SymbolTable::with_builtins();
    let stmts = parse_program(src, &mut symbols).expect("parse");
    let exec = backend.build(&stmts, &symbols).expect("build");
    let mut env = VariableEnvironment::new(symbols.len(), 7);
    for f in 0..frames {
        let t = f as f64 / 60.0;
        env.set(var::TIME, t);
        env.set(var::BASS, (t * 3.0).sin().abs());
        env.set(var::MID, (t * 5.0).cos().abs());
        env.set(var::TREB, (t * 11.0).sin() * 0.5 + 0.5);
        let (slots, rng) = env.split_mut();
        exec.run(slots, rng).expect("run");
    }
    env.slots().to_vec()
}

#[test]
fn backends_agree_on_the_equation_corpus() {
    for src in CORPUS {
        let reference = run_backend(&InterpreterBackend, src, 240);
        for backend in [BytecodeBackend::optimized(), BytecodeBackend::basic()] {
            let got = run_backend(&backend, src, 240);
            assert_eq!(reference.len(), got.len());
            for (slot, (a, b)) in reference.iter().zip(&got).enumerate() {
                assert!(a.is_finite() && b.is_finite(), "{src}: slot {slot} not finite");
                assert!(
                    (a - b).abs() <= EPS * a.abs().max(1.0),
                    "{} disagrees on slot {slot} for `{src}`: {a} vs {b}",
                    backend.kind()
                );
            }
        }
    }
}

struct Trapping;

struct TrapExec;

impl Executable for TrapExec {
    fn kind(&self) -> BackendKind {
        BackendKind::Optimized
    }

    fn run(&self, _slots: &mut [f64], _rng: &mut fastrand::Rng) -> Result<(), ExecFault> {
        Err(ExecFault::Trap("unreachable".into()))
    }
}

impl Backend for Trapping {
    fn kind(&self) -> BackendKind {
        BackendKind::Optimized
    }

    fn build(&self, _: &[Expr], _: &SymbolTable) -> Result<Box<dyn Executable>, CompileError> {
        Ok(Box::new(TrapExec))
    }
}

struct Refusing {
    builds: Rc<Cell<u32>>,
}

impl Backend for Refusing {
    fn kind(&self) -> BackendKind {
        BackendKind::Basic
    }

    fn build(&self, _: &[Expr], _: &SymbolTable) -> Result<Box<dyn Executable>, CompileError> {
        self.builds.set(self.builds.get() + 1);
        Err(CompileError::Unavailable("refused".into()))
    }
}

fn counter_preset() -> Preset {
    Preset::new("counter").with_equations("reg00 = 10", "reg00 = reg00 + 1; zoom = zoom + 0.5", "")
}

#[test]
fn runtime_fault_reruns_on_the_interpreter() {
    let mut engine = EquationEngine::with_backends(vec![Box::new(Trapping)]);
    let mut module = engine.load(&counter_preset(), 1).expect("load");
    assert_eq!(module.backend(), BackendKind::Optimized);

    let frame = engine.run_frame(&mut module, &FrameInputs::default());
    assert_eq!(module.var("reg00"), 11.0);
    assert!((frame.zoom - 1.5).abs() < 1e-6);
    assert_eq!(module.backend(), BackendKind::Interpreted);
    assert!(engine.health().failures(BackendKind::Optimized) >= 1);

    engine.run_frame(&mut module, &FrameInputs::default());
    assert_eq!(module.var("reg00"), 12.0);
}

#[test]
fn breaker_stops_asking_a_failing_backend() {
    let builds = Rc::new(Cell::new(0));
    let mut engine = EquationEngine::with_backends(vec![
        Box::new(Refusing {
            builds: builds.clone(),
        }),
        Box::new(InterpreterBackend),
    ]);

    let module = engine.load(&counter_preset(), 1).expect("load");
    assert_eq!(module.backends(), [BackendKind::Interpreted; 3]);
    assert_eq!(builds.get(), FAILURE_THRESHOLD);
    assert!(engine.health().is_tripped(BackendKind::Basic));

    let mut again = engine.load(&counter_preset(), 2).expect("load");
    assert_eq!(builds.get(), FAILURE_THRESHOLD);
    engine.run_frame(&mut again, &FrameInputs::default());
    assert_eq!(again.var("reg00"), 11.0);
}

#[test]
fn init_runs_exactly_once() {
    let mut engine = EquationEngine::with_backends(vec![Box::new(BytecodeBackend::optimized())]);
    let preset = Preset::new("init").with_equations("reg00 = reg00 + 1", "reg01 = reg01 + reg00", "");
    let mut module = engine.load(&preset, 3).expect("load");
    assert!(!module.is_initialized());
    for _ in 0..5 {
        engine.run_frame(&mut module, &FrameInputs::default());
    }
    assert!(!engine.run_init(&mut module));
    assert_eq!(module.var("reg00"), 1.0);
    assert_eq!(module.var("reg01"), 5.0);
    assert_eq!(module.frames_run(), 5);
}

#[test]
fn frame_params_reset_but_registers_persist() {
    let mut engine = EquationEngine::with_backends(vec![Box::new(BytecodeBackend::basic())]);
    let preset = Preset::new("reset").with_equations("", "zoom = zoom + 0.1; reg00 = reg00 + 0.1", "");
    let mut module = engine.load(&preset, 3).expect("load");
    let mut zoom = 0.0;
    for _ in 0..4 {
        zoom = engine.run_frame(&mut module, &FrameInputs::default()).zoom;
    }
    assert!((zoom - 1.1).abs() < 1e-6);
    assert!((module.var("reg00") - 0.4).abs() < 1e-12);
}

#[test]
fn vertex_writes_do_not_leak_between_vertices() {
    let mut engine = EquationEngine::with_backends(vec![Box::new(BytecodeBackend::optimized())]);
    let preset = Preset::new("vertex").with_equations(
        "",
        "q1 = 2; reg02 = 5",
        "reg02 = reg02 + x; zoom = zoom + q1 + reg02",
    );
    let mut module = engine.load(&preset, 3).expect("load");
    engine.run_frame(&mut module, &FrameInputs::default());

    let first = engine.run_vertex(&mut module, 0.25, 0.5, 0.1, 0.0);
    let second = engine.run_vertex(&mut module, 0.25, 0.5, 0.1, 0.0);
    assert_eq!(first, second);
    assert!((first.zoom - 8.25).abs() < 1e-6);
    assert_eq!(module.var("reg02"), 5.0);
}

#[test]
fn faults_are_sanitized_before_they_persist() {
    for backend in [
        Box::new(InterpreterBackend) as Box<dyn Backend>,
        Box::new(BytecodeBackend::optimized()),
    ] {
        let mut engine = EquationEngine::with_backends(vec![backend]);
        let preset = Preset::new("faults").with_equations(
            "",
            "reg00 = 1 / 0; reg01 = sqrt(-1); reg02 = log(0); reg03 = undefined_thing * 3; zoom = reg01 + 1",
            "",
        );
        let mut module = engine.load(&preset, 3).expect("load");
        let frame = engine.run_frame(&mut module, &FrameInputs::default());
        for name in ["reg00", "reg01", "reg02", "reg03", "undefined_thing"] {
            assert_eq!(module.var(name), 0.0, "{name}");
        }
        assert_eq!(frame.zoom, 1.0);
    }
}

#[test]
fn overlays_see_q_values_and_keep_t_values() {
    let mut engine = EquationEngine::with_backends(vec![Box::new(BytecodeBackend::optimized())]);
    let mut preset = Preset::new("overlay").with_equations("", "q1 = 0.25", "");
    preset.shapes.push(ShapeDef {
        frame_eqs: "x = q1; t1 = t1 + 1; rad = t1 * 0.1; reg00 = reg00 + 1".to_string(),
        ..ShapeDef::default()
    });
    preset.shapes.push(ShapeDef {
        enabled: false,
        ..ShapeDef::default()
    });
    let mut module = engine.load(&preset, 3).expect("load");
    let inputs = FrameInputs::default();
    let mut last = None;
    for _ in 0..3 {
        engine.run_frame(&mut module, &inputs);
        last = engine.run_shape(&mut module, 0, &inputs);
    }
    let shape = last.expect("shape enabled");
    assert!((shape.x - 0.25).abs() < 1e-6);
    assert!((shape.rad - 0.3).abs() < 1e-6);
    assert_eq!(module.var("reg00"), 0.0);
    assert!(engine.run_shape(&mut module, 1, &inputs).is_none());
    assert!(engine.run_shape(&mut module, 7, &inputs).is_none());

    module.set_shape_enabled(0, false);
    assert!(engine.run_shape(&mut module, 0, &inputs).is_none());
}

#[test]
fn wave_points_start_from_the_frame_state() {
    let mut engine = EquationEngine::with_backends(vec![Box::new(InterpreterBackend)]);
    let mut preset = Preset::new("wave");
    preset.waves.push(WaveDef {
        point_eqs: "t1 = t1 + 1; x = t1; reg05 = reg05 + 1; y = reg05 + value1".to_string(),
        ..WaveDef::default()
    });
    let mut module = engine.load(&preset, 3).expect("load");
    let inputs = FrameInputs::default();
    engine.run_frame(&mut module, &inputs);
    let wave = engine.run_wave(&mut module, 0, &inputs).expect("wave");
    let color = wave.color;
    let a = engine.run_wave_point(&mut module, 0, 0.0, 0.5, 0.0, 0.0, 0.5, color);
    let b = engine.run_wave_point(&mut module, 0, 1.0, 0.25, 0.0, 1.0, 0.5, color);
    assert_eq!((a.x, a.y), (1.0, 1.5));
    assert_eq!((b.x, b.y), (2.0, 1.25));
}

#[test]
fn rand_is_reproducible_per_seed() {
    let preset = Preset::new("rng").with_equations("", "reg00 = rand(1000); reg01 = reg01 + reg00", "");
    let run = |seed| {
        let mut engine = EquationEngine::with_backends(vec![Box::new(BytecodeBackend::optimized())]);
        let mut module = engine.load(&preset, seed).expect("load");
        for _ in 0..10 {
            engine.run_frame(&mut module, &FrameInputs::default());
        }
        module.var("reg01")
    };
    assert_eq!(run(42), run(42));
    assert!((0.0..10_000.0).contains(&run(42)));
}

#[test]
fn load_rejects_bad_presets() {
    let mut engine = EquationEngine::with_backends(vec![Box::new(InterpreterBackend)]);

    let mut missing = Preset::new("missing");
    missing.equations.vertex = None;
    assert!(matches!(
        engine.load(&missing, 1),
        Err(LoadError::Structure { .. })
    ));

    let broken = Preset::new("broken").with_equations("", "zoom = (1 + ", "");
    match engine.load(&broken, 1) {
        Err(LoadError::Parse { group, .. }) => assert_eq!(group, "per-frame"),
        other => panic!("expected parse error, got {:?}", other.err()),
    }
}

#[test]
fn long_operator_chains_are_rejected_at_load() {
    use warpviz::eqn::parser::MAX_NESTING;

    let chain = |terms: usize| format!("reg00 = 0{}", " + 1".repeat(terms));
    let mut engine = EquationEngine::with_backends(vec![Box::new(BytecodeBackend::optimized())]);

    let long = Preset::new("long").with_equations("", &chain(MAX_NESTING * 4), "");
    match engine.load(&long, 1) {
        Err(LoadError::Parse { group, .. }) => assert_eq!(group, "per-frame"),
        other => panic!("expected parse error, got {:?}", other.err()),
    }

    let fits = Preset::new("fits").with_equations("", &chain(MAX_NESTING / 2), "");
    let mut module = engine.load(&fits, 1).expect("loads");
    engine.run_frame(&mut module, &FrameInputs::default());
    assert_eq!(module.var("reg00"), (MAX_NESTING / 2) as f64);
}
