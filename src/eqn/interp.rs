use super::ast::{BinaryOp, Expr};
use super::backend::{Backend, BackendKind, CompileError, ExecFault, Executable};
use super::env::SymbolTable;
use super::funcs::{self, sanitize, truthy};

/// Tree-walking evaluator. Always available; the last link of the fallback chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpreterBackend;

impl Backend for InterpreterBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Interpreted
    }

    fn build(
        &self,
        stmts: &[Expr],
        _symbols: &SymbolTable,
    ) -> Result<Box<dyn Executable>, CompileError> {
        Ok(Box::new(Interpreted::new(stmts.to_vec())))
    }
}

#[derive(Debug, Clone)]
pub struct Interpreted {
    stmts: Vec<Expr>,
}

impl Interpreted {
    pub fn new(stmts: Vec<Expr>) -> Self {
        Self { stmts }
    }
}

impl Executable for Interpreted {
    fn kind(&self) -> BackendKind {
        BackendKind::Interpreted
    }

    fn run(&self, slots: &mut [f64], rng: &mut fastrand::Rng) -> Result<(), ExecFault> {
        for s in &self.stmts {
            eval(s, slots, rng);
        }
        Ok(())
    }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

pub fn eval(expr: &Expr, slots: &mut [f64], rng: &mut fastrand::Rng) -> f64 {
    match expr {
        Expr::Num(v) => *v,
        Expr::Var(id) => slots.get(*id).copied().unwrap_or(0.0),
        Expr::Unary(op, e) => funcs::unary(*op, eval(e, slots, rng)),
        Expr::Binary(BinaryOp::And, a, b) => {
            if truthy(eval(a, slots, rng)) {
                flag(truthy(eval(b, slots, rng)))
            } else {
                0.0
            }
        }
        Expr::Binary(BinaryOp::Or, a, b) => {
            if truthy(eval(a, slots, rng)) {
                1.0
            } else {
                flag(truthy(eval(b, slots, rng)))
            }
        }
        Expr::Binary(op, a, b) => {
            let lhs = eval(a, slots, rng);
            let rhs = eval(b, slots, rng);
            funcs::binary(*op, lhs, rhs)
        }
        Expr::Call(f, args) => match args.as_slice() {
            [a] => {
                let a = eval(a, slots, rng);
                funcs::call1(*f, a, rng)
            }
            [a, b] => {
                let a = eval(a, slots, rng);
                let b = eval(b, slots, rng);
                funcs::call2(*f, a, b)
            }
            _ => 0.0,
        },
        Expr::If(c, t, e) => {
            if truthy(eval(c, slots, rng)) {
                eval(t, slots, rng)
            } else {
                eval(e, slots, rng)
            }
        }
        Expr::Assign(id, op, value) => {
            let current = slots.get(*id).copied().unwrap_or(0.0);
            let rhs = eval(value, slots, rng);
            let v = sanitize(match op {
                Some(op) => funcs::binary(*op, current, rhs),
                None => rhs,
            });
            if let Some(slot) = slots.get_mut(*id) {
                *slot = v;
            }
            v
        }
    }
}
