use std::sync::OnceLock;

use crate::config::BackendPreference;
use crate::eqn::backend::{Backend, BackendKind};
use crate::eqn::bytecode::BytecodeBackend;
use crate::eqn::env::{SymbolTable, VariableEnvironment};
use crate::eqn::interp::InterpreterBackend;
use crate::eqn::parser::parse_program;

const PROBE_PROGRAM: &str = "\
    reg00 = reg00 + sin(time * 1.7) * 0.5;\
    zoom = 1 + 0.1 * above(bass, 0.3) + if(mid > treb, 0.05, -0.05);\
    rot = atan2(cy - 0.5, cx - 0.5) + sqr(reg00) / 3;\
    q1 = (bass > 0.2 && mid < 0.8) || !treb;\
    x = pow(2, 1.5) % 2 + min(3, max(-1, zoom));";

const PROBE_EPSILON: f64 = 1e-9;

/// Which backend tiers this process may use. Probed once at startup.
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    pub requested: BackendPreference,
    compiled: bool,
    chain: Vec<BackendKind>,
    notes: Vec<String>,
}

impl BackendCapabilities {
    pub fn chain(&self) -> &[BackendKind] {
        &self.chain
    }

    pub fn compiled_available(&self) -> bool {
        self.compiled
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn status_label(&self) -> String {
        let chain: Vec<&str> = self.chain.iter().map(|k| k.label()).collect();
        if self.compiled || self.requested == BackendPreference::Interpreted {
            format!("ok {}", chain.join(">"))
        } else {
            format!("fallback {}", chain.join(">"))
        }
    }
}

/// Whether the compiled tiers run here and agree with the interpreter on a
/// fixed probe program. Evaluated on first use and shared by the process.
pub fn compiled_support() -> &'static Result<(), String> {
    static SUPPORT: OnceLock<Result<(), String>> = OnceLock::new();
    SUPPORT.get_or_init(|| {
        if compiled_disabled_by_env() {
            return Err("disabled by WARPVIZ_DISABLE_COMPILED".to_string());
        }
        let result = probe_compiled();
        log::debug!("compiled backend probe: {result:?}");
        result
    })
}

/// Orders the backend chain for `requested` using the process-wide
/// [`compiled_support`] result.
pub fn probe_backends(requested: BackendPreference) -> BackendCapabilities {
    let mut caps = BackendCapabilities {
        requested,
        compiled: false,
        chain: Vec::new(),
        notes: Vec::new(),
    };

    match compiled_support() {
        Ok(()) => caps.compiled = true,
        Err(reason) => caps.push_note(format!("compiled backends unavailable: {reason}")),
    }

    let wanted: &[BackendKind] = match requested {
        BackendPreference::Auto | BackendPreference::Optimized => &BackendKind::ALL,
        BackendPreference::Basic => &[BackendKind::Basic, BackendKind::Interpreted],
        BackendPreference::Interpreted => &[BackendKind::Interpreted],
    };
    caps.chain = wanted
        .iter()
        .copied()
        .filter(|k| caps.compiled || !k.is_compiled())
        .collect();

    if caps.notes.is_empty() {
        caps.push_note("probe selected requested backend chain with no fallback");
    }
    for note in &caps.notes {
        log::info!("backend probe: {note}");
    }
    caps
}

fn probe_compiled() -> Result<(), String> {
    let mut symbols = SymbolTable::with_builtins();
    let stmts = parse_program(PROBE_PROGRAM, &mut symbols).map_err(|e| e.to_string())?;

    let reference = run_probe(&InterpreterBackend, &stmts, &symbols)?;
    for backend in [BytecodeBackend::optimized(), BytecodeBackend::basic()] {
        let got = run_probe(&backend, &stmts, &symbols)?;
        let mismatch = reference
            .iter()
            .zip(&got)
            .position(|(a, b)| (a - b).abs() > PROBE_EPSILON);
        if let Some(slot) = mismatch {
            let name = symbols.name(slot).unwrap_or("?");
            return Err(format!("{} disagrees on '{name}'", backend.kind()));
        }
    }
    Ok(())
}

fn run_probe(
    backend: &dyn Backend,
    stmts: &[crate::eqn::ast::Expr],
    symbols: &SymbolTable,
) -> Result<Vec<f64>, String> {
    let exec = backend.build(stmts, symbols).map_err(|e| e.to_string())?;
    let mut env = VariableEnvironment::new(symbols.len(), 1);
    let inputs = [("time", 1.25), ("bass", 0.6), ("mid", 0.4), ("treb", 0.2), ("cx", 0.3), ("cy", 0.7)];
    for (name, v) in inputs {
        if let Some(id) = symbols.get(name) {
            env.set(id, v);
        }
    }
    for _ in 0..3 {
        let (slots, rng) = env.split_mut();
        exec.run(slots, rng).map_err(|e| e.to_string())?;
    }
    Ok(env.slots().to_vec())
}

fn compiled_disabled_by_env() -> bool {
    match std::env::var("WARPVIZ_DISABLE_COMPILED") {
        Ok(v) => {
            let s = v.trim().to_ascii_lowercase();
            s == "1" || s == "true" || s == "yes" || s == "on"
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreted_preference_skips_compiled_tiers() {
        let caps = probe_backends(BackendPreference::Interpreted);
        assert_eq!(caps.chain(), &[BackendKind::Interpreted]);
    }

    #[test]
    fn compiled_tiers_agree_with_interpreter() {
        assert_eq!(probe_compiled(), Ok(()));
    }

    #[test]
    fn compiled_probe_runs_once_per_process() {
        let first = compiled_support();
        let again = compiled_support();
        assert!(std::ptr::eq(first, again));
        let auto = probe_backends(BackendPreference::Auto);
        assert_eq!(auto.compiled_available(), first.is_ok());
    }
}
