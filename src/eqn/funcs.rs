//! Numeric semantics shared by every backend. The interpreter and the bytecode
//! machine both call into this module, so a value computed by one is bit-identical
//! to the value computed by the other.

use super::ast::{BinaryOp, UnaryOp};

/// Threshold used for truthiness and approximate equality.
pub const EPSILON: f64 = 0.00001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sqrt,
    Sqr,
    Pow,
    Exp,
    Log,
    Log10,
    Abs,
    Sign,
    Min,
    Max,
    Floor,
    Ceil,
    Int,
    Fmod,
    Sigmoid,
    Above,
    Below,
    Equal,
    Bnot,
    Band,
    Bor,
    Rand,
}

impl Func {
    pub fn lookup(name: &str) -> Option<Self> {
        let f = match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "atan2" => Self::Atan2,
            "sqrt" => Self::Sqrt,
            "sqr" => Self::Sqr,
            "pow" => Self::Pow,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "log10" => Self::Log10,
            "abs" => Self::Abs,
            "sign" => Self::Sign,
            "min" => Self::Min,
            "max" => Self::Max,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "int" => Self::Int,
            "fmod" => Self::Fmod,
            "sigmoid" => Self::Sigmoid,
            "above" => Self::Above,
            "below" => Self::Below,
            "equal" => Self::Equal,
            "bnot" => Self::Bnot,
            "band" => Self::Band,
            "bor" => Self::Bor,
            "rand" => Self::Rand,
            _ => return None,
        };
        Some(f)
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Atan2
            | Self::Pow
            | Self::Min
            | Self::Max
            | Self::Fmod
            | Self::Sigmoid
            | Self::Above
            | Self::Below
            | Self::Equal
            | Self::Band
            | Self::Bor => 2,
            _ => 1,
        }
    }

    /// Pure functions may be folded at compile time.
    pub fn is_pure(self) -> bool {
        !matches!(self, Self::Rand)
    }
}

pub fn truthy(v: f64) -> bool {
    v.abs() > EPSILON
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Replaces values that must never reach a register.
pub fn sanitize(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

pub fn unary(op: UnaryOp, a: f64) -> f64 {
    match op {
        UnaryOp::Neg => -a,
        UnaryOp::Not => flag(!truthy(a)),
    }
}

/// Strict (non short-circuit) binary operators. `And`/`Or` evaluated here
/// produce the same result as the lazy forms because operands have no effects
/// by the time both are known.
pub fn binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        BinaryOp::Mod => int_mod(a, b),
        BinaryOp::Pow => a.powf(b),
        BinaryOp::Lt => flag(a < b),
        BinaryOp::Gt => flag(a > b),
        BinaryOp::Le => flag(a <= b),
        BinaryOp::Ge => flag(a >= b),
        BinaryOp::Eq => flag((a - b).abs() < EPSILON),
        BinaryOp::Ne => flag((a - b).abs() >= EPSILON),
        BinaryOp::And => flag(truthy(a) && truthy(b)),
        BinaryOp::Or => flag(truthy(a) || truthy(b)),
    }
}

fn int_mod(a: f64, b: f64) -> f64 {
    if !a.is_finite() || !b.is_finite() {
        return 0.0;
    }
    let bi = b.trunc() as i64;
    if bi == 0 {
        return 0.0;
    }
    (a.trunc() as i64).wrapping_rem(bi) as f64
}

pub fn call1(f: Func, a: f64, rng: &mut fastrand::Rng) -> f64 {
    match f {
        Func::Sin => a.sin(),
        Func::Cos => a.cos(),
        Func::Tan => a.tan(),
        Func::Asin => a.asin(),
        Func::Acos => a.acos(),
        Func::Atan => a.atan(),
        Func::Sqrt => a.abs().sqrt(),
        Func::Sqr => a * a,
        Func::Exp => a.exp(),
        Func::Log => a.ln(),
        Func::Log10 => a.log10(),
        Func::Abs => a.abs(),
        Func::Sign => {
            if a > 0.0 {
                1.0
            } else if a < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        Func::Floor | Func::Int => a.floor(),
        Func::Ceil => a.ceil(),
        Func::Bnot => flag(!truthy(a)),
        Func::Rand => {
            let n = a.floor();
            if n < 1.0 {
                rng.f64()
            } else {
                (rng.f64() * n).floor()
            }
        }
        // Binary functions called with one argument see a zero second operand.
        other => call2(other, a, 0.0),
    }
}

pub fn call2(f: Func, a: f64, b: f64) -> f64 {
    match f {
        Func::Atan2 => a.atan2(b),
        Func::Pow => a.powf(b),
        Func::Min => a.min(b),
        Func::Max => a.max(b),
        Func::Fmod => {
            if b == 0.0 {
                0.0
            } else {
                a % b
            }
        }
        Func::Sigmoid => {
            let t = 1.0 + (-a * b).exp();
            if t.abs() > EPSILON { 1.0 / t } else { 0.0 }
        }
        Func::Above => flag(a > b),
        Func::Below => flag(a < b),
        Func::Equal => flag((a - b).abs() < EPSILON),
        Func::Band => flag(truthy(a) && truthy(b)),
        Func::Bor => flag(truthy(a) || truthy(b)),
        _ => 0.0,
    }
}

pub fn apply(f: Func, args: &[f64], rng: &mut fastrand::Rng) -> f64 {
    match args {
        [a] => call1(f, *a, rng),
        [a, b] => call2(f, *a, *b),
        _ => 0.0,
    }
}
