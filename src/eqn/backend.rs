use std::fmt;

use thiserror::Error;

use super::ast::Expr;
use super::env::SymbolTable;

/// Number of failures after which a backend tier is skipped for the session.
pub const FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Optimized,
    Basic,
    Interpreted,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Optimized, Self::Basic, Self::Interpreted];

    pub fn label(self) -> &'static str {
        match self {
            Self::Optimized => "compiled-opt",
            Self::Basic => "compiled",
            Self::Interpreted => "interpreted",
        }
    }

    pub fn is_compiled(self) -> bool {
        !matches!(self, Self::Interpreted)
    }

    fn index(self) -> usize {
        match self {
            Self::Optimized => 0,
            Self::Basic => 1,
            Self::Interpreted => 2,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("stack depth {depth} exceeds limit {limit}")]
    StackDepth { depth: usize, limit: usize },
    #[error("unbalanced stack at pc {pc}")]
    Unbalanced { pc: usize },
    #[error("slot {slot} out of range ({len} slots)")]
    SlotRange { slot: usize, len: usize },
    #[error("invalid jump at pc {pc} to {target}")]
    Jump { pc: usize, target: usize },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecFault {
    #[error("register file has {have} slots, program needs {need}")]
    RegisterFile { have: usize, need: usize },
    #[error("stack fault at pc {pc}")]
    Stack { pc: usize },
    #[error("trap: {0}")]
    Trap(String),
}

/// An instantiated equation group.
pub trait Executable {
    fn kind(&self) -> BackendKind;
    fn run(&self, slots: &mut [f64], rng: &mut fastrand::Rng) -> Result<(), ExecFault>;
}

/// Turns parsed statements into an [`Executable`].
pub trait Backend {
    fn kind(&self) -> BackendKind;
    fn build(&self, stmts: &[Expr], symbols: &SymbolTable)
    -> Result<Box<dyn Executable>, CompileError>;
}

/// Session-wide failure accounting for the compiled tiers.
#[derive(Debug, Clone, Default)]
pub struct BackendHealth {
    failures: [u32; 3],
    warned: [bool; 3],
}

impl BackendHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self, kind: BackendKind) -> u32 {
        self.failures[kind.index()]
    }

    pub fn is_tripped(&self, kind: BackendKind) -> bool {
        kind.is_compiled() && self.failures[kind.index()] >= FAILURE_THRESHOLD
    }

    /// Records one failure. Returns `true` when this failure trips the breaker.
    pub fn record_failure(&mut self, kind: BackendKind, what: &dyn fmt::Display) -> bool {
        let i = kind.index();
        self.failures[i] = self.failures[i].saturating_add(1);
        if !self.warned[i] {
            self.warned[i] = true;
            log::warn!("{kind} backend failed ({what}); falling back");
        }
        let tripped = kind.is_compiled() && self.failures[i] == FAILURE_THRESHOLD;
        if tripped {
            log::warn!("{kind} backend disabled for this session after {FAILURE_THRESHOLD} failures");
        }
        tripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_trips_at_threshold_once() {
        let mut h = BackendHealth::new();
        assert!(!h.record_failure(BackendKind::Basic, &"x"));
        assert!(!h.record_failure(BackendKind::Basic, &"x"));
        assert!(h.record_failure(BackendKind::Basic, &"x"));
        assert!(!h.record_failure(BackendKind::Basic, &"x"));
        assert!(h.is_tripped(BackendKind::Basic));
        assert!(!h.is_tripped(BackendKind::Optimized));
    }

    #[test]
    fn interpreter_never_trips() {
        let mut h = BackendHealth::new();
        for _ in 0..10 {
            h.record_failure(BackendKind::Interpreted, &"x");
        }
        assert!(!h.is_tripped(BackendKind::Interpreted));
    }
}
