//! Stack-machine compiler for equation groups.
//!
//! Code is verified once at instantiation: every reachable instruction has a
//! single known stack depth, depth never exceeds [`MAX_STACK`], jumps only go
//! forward, and register operands are in range. The run loop can therefore use
//! a fixed-size stack.

use super::ast::{BinaryOp, Expr, UnaryOp, VarId};
use super::backend::{Backend, BackendKind, CompileError, ExecFault, Executable};
use super::env::SymbolTable;
use super::funcs::{self, Func, sanitize, truthy};

pub const MAX_STACK: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Const(f64),
    Load(VarId),
    /// Sanitize, store, keep the value on the stack.
    Store(VarId),
    /// Sanitize, store, pop.
    StorePop(VarId),
    Pop,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Call1(Func),
    Call2(Func),
    /// Normalizes the top of stack to 0.0 / 1.0.
    Bool,
    JumpIfFalse(usize),
    JumpIfTrue(usize),
    Jump(usize),
}

impl Op {
    fn stack_effect(self) -> (usize, usize) {
        match self {
            Op::Const(_) | Op::Load(_) => (0, 1),
            Op::Store(_) | Op::Unary(_) | Op::Call1(_) | Op::Bool => (1, 1),
            Op::StorePop(_) | Op::Pop | Op::JumpIfFalse(_) | Op::JumpIfTrue(_) => (1, 0),
            Op::Binary(_) | Op::Call2(_) => (2, 1),
            Op::Jump(_) => (0, 0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bytecode {
    code: Vec<Op>,
    slot_count: usize,
    max_depth: usize,
    optimized: bool,
}

impl Bytecode {
    pub fn ops(&self) -> &[Op] {
        &self.code
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BytecodeBackend {
    pub optimize: bool,
}

impl BytecodeBackend {
    pub fn optimized() -> Self {
        Self { optimize: true }
    }

    pub fn basic() -> Self {
        Self { optimize: false }
    }
}

impl Backend for BytecodeBackend {
    fn kind(&self) -> BackendKind {
        if self.optimize {
            BackendKind::Optimized
        } else {
            BackendKind::Basic
        }
    }

    fn build(
        &self,
        stmts: &[Expr],
        symbols: &SymbolTable,
    ) -> Result<Box<dyn Executable>, CompileError> {
        Ok(Box::new(compile(stmts, symbols.len(), self.optimize)?))
    }
}

/// Compiles and verifies a statement list for a register file of `slot_count` slots.
pub fn compile(stmts: &[Expr], slot_count: usize, optimize: bool) -> Result<Bytecode, CompileError> {
    let mut emitter = Emitter {
        code: Vec::new(),
        barrier: 0,
        optimize,
    };
    for stmt in stmts {
        if optimize {
            emitter.expr(&fold(stmt));
        } else {
            emitter.expr(stmt);
        }
        emitter.end_statement();
    }
    let max_depth = verify(&emitter.code, slot_count)?;
    Ok(Bytecode {
        code: emitter.code,
        slot_count,
        max_depth,
        optimized: optimize,
    })
}

struct Emitter {
    code: Vec<Op>,
    /// Position of the most recently bound jump label.
    barrier: usize,
    optimize: bool,
}

impl Emitter {
    fn emit(&mut self, op: Op) -> usize {
        self.code.push(op);
        self.code.len() - 1
    }

    fn bind(&mut self, at: usize) {
        let here = self.code.len();
        if let Some(op) = self.code.get_mut(at) {
            *op = match *op {
                Op::JumpIfFalse(_) => Op::JumpIfFalse(here),
                Op::JumpIfTrue(_) => Op::JumpIfTrue(here),
                Op::Jump(_) => Op::Jump(here),
                other => other,
            };
        }
        self.barrier = here;
    }

    fn end_statement(&mut self) {
        let here = self.code.len();
        if self.optimize && self.barrier != here {
            if let Some(Op::Store(id)) = self.code.last().copied() {
                self.code.pop();
                self.emit(Op::StorePop(id));
                return;
            }
        }
        self.emit(Op::Pop);
    }

    fn expr(&mut self, e: &Expr) {
        match e {
            Expr::Num(v) => {
                self.emit(Op::Const(*v));
            }
            Expr::Var(id) => {
                self.emit(Op::Load(*id));
            }
            Expr::Unary(op, a) => {
                self.expr(a);
                self.emit(Op::Unary(*op));
            }
            Expr::Binary(BinaryOp::And, a, b) => {
                self.expr(a);
                let to_false = self.emit(Op::JumpIfFalse(0));
                self.expr(b);
                self.emit(Op::Bool);
                let to_end = self.emit(Op::Jump(0));
                self.bind(to_false);
                self.emit(Op::Const(0.0));
                self.bind(to_end);
            }
            Expr::Binary(BinaryOp::Or, a, b) => {
                self.expr(a);
                let to_true = self.emit(Op::JumpIfTrue(0));
                self.expr(b);
                self.emit(Op::Bool);
                let to_end = self.emit(Op::Jump(0));
                self.bind(to_true);
                self.emit(Op::Const(1.0));
                self.bind(to_end);
            }
            Expr::Binary(op, a, b) => {
                self.expr(a);
                self.expr(b);
                self.emit(Op::Binary(*op));
            }
            Expr::Call(f, args) => {
                for a in args {
                    self.expr(a);
                }
                match args.len() {
                    1 => self.emit(Op::Call1(*f)),
                    2 => self.emit(Op::Call2(*f)),
                    // The parser enforces arity; anything else evaluates to zero.
                    n => {
                        for _ in 0..n {
                            self.emit(Op::Pop);
                        }
                        self.emit(Op::Const(0.0))
                    }
                };
            }
            Expr::If(c, t, f) => {
                self.expr(c);
                let to_else = self.emit(Op::JumpIfFalse(0));
                self.expr(t);
                let to_end = self.emit(Op::Jump(0));
                self.bind(to_else);
                self.expr(f);
                self.bind(to_end);
            }
            Expr::Assign(id, op, value) => {
                match op {
                    Some(op) => {
                        self.emit(Op::Load(*id));
                        self.expr(value);
                        self.emit(Op::Binary(*op));
                    }
                    None => self.expr(value),
                }
                self.emit(Op::Store(*id));
            }
        }
    }
}

/// Constant folding over pure subtrees.
fn fold(e: &Expr) -> Expr {
    match e {
        Expr::Num(_) | Expr::Var(_) => e.clone(),
        Expr::Unary(op, a) => {
            let a = fold(a);
            match a.as_num() {
                Some(v) => Expr::Num(funcs::unary(*op, v)),
                None => Expr::Unary(*op, Box::new(a)),
            }
        }
        Expr::Binary(op, a, b) => {
            let a = fold(a);
            let b = fold(b);
            match (a.as_num(), b.as_num()) {
                (Some(x), Some(y)) => Expr::Num(funcs::binary(*op, x, y)),
                _ => Expr::Binary(*op, Box::new(a), Box::new(b)),
            }
        }
        Expr::Call(f, args) => {
            let args: Vec<Expr> = args.iter().map(fold).collect();
            let consts: Option<Vec<f64>> = args.iter().map(Expr::as_num).collect();
            match consts {
                Some(values) if f.is_pure() => {
                    // Pure functions never draw from the generator.
                    let mut unused = fastrand::Rng::with_seed(0);
                    Expr::Num(funcs::apply(*f, &values, &mut unused))
                }
                _ => Expr::Call(*f, args),
            }
        }
        Expr::If(c, t, f) => {
            let c = fold(c);
            match c.as_num() {
                Some(v) if truthy(v) => fold(t),
                Some(_) => fold(f),
                None => Expr::If(Box::new(c), Box::new(fold(t)), Box::new(fold(f))),
            }
        }
        Expr::Assign(id, op, value) => Expr::Assign(*id, *op, Box::new(fold(value))),
    }
}

fn merge(depth_at: &mut [Option<usize>], at: usize, depth: usize, pc: usize) -> Result<(), CompileError> {
    match depth_at[at] {
        None => {
            depth_at[at] = Some(depth);
            Ok(())
        }
        Some(d) if d == depth => Ok(()),
        Some(_) => Err(CompileError::Unbalanced { pc }),
    }
}

fn verify(code: &[Op], slot_count: usize) -> Result<usize, CompileError> {
    let mut depth_at: Vec<Option<usize>> = vec![None; code.len() + 1];
    depth_at[0] = Some(0);
    let mut max_depth = 0usize;

    for (pc, op) in code.iter().enumerate() {
        let depth = depth_at[pc].ok_or(CompileError::Unbalanced { pc })?;
        let (pops, pushes) = op.stack_effect();
        if depth < pops {
            return Err(CompileError::Unbalanced { pc });
        }
        let after = depth - pops + pushes;
        if after > MAX_STACK {
            return Err(CompileError::StackDepth {
                depth: after,
                limit: MAX_STACK,
            });
        }
        max_depth = max_depth.max(after);

        match *op {
            Op::Load(slot) | Op::Store(slot) | Op::StorePop(slot) if slot >= slot_count => {
                return Err(CompileError::SlotRange {
                    slot,
                    len: slot_count,
                });
            }
            Op::JumpIfFalse(target) | Op::JumpIfTrue(target) | Op::Jump(target) => {
                if target <= pc || target > code.len() {
                    return Err(CompileError::Jump { pc, target });
                }
                merge(&mut depth_at, target, after, pc)?;
            }
            _ => {}
        }
        if !matches!(op, Op::Jump(_)) {
            merge(&mut depth_at, pc + 1, after, pc)?;
        }
    }

    match depth_at[code.len()] {
        Some(0) => Ok(max_depth),
        _ => Err(CompileError::Unbalanced { pc: code.len() }),
    }
}

impl Executable for Bytecode {
    fn kind(&self) -> BackendKind {
        if self.optimized {
            BackendKind::Optimized
        } else {
            BackendKind::Basic
        }
    }

    fn run(&self, slots: &mut [f64], rng: &mut fastrand::Rng) -> Result<(), ExecFault> {
        if slots.len() < self.slot_count {
            return Err(ExecFault::RegisterFile {
                have: slots.len(),
                need: self.slot_count,
            });
        }
        let mut stack = [0.0f64; MAX_STACK];
        let mut sp = 0usize;
        let mut pc = 0usize;

        macro_rules! pop {
            () => {{
                if sp == 0 {
                    return Err(ExecFault::Stack { pc });
                }
                sp -= 1;
                stack[sp]
            }};
        }
        macro_rules! push {
            ($v:expr) => {{
                let v = $v;
                if sp >= MAX_STACK {
                    return Err(ExecFault::Stack { pc });
                }
                stack[sp] = v;
                sp += 1;
            }};
        }

        while let Some(&op) = self.code.get(pc) {
            pc += 1;
            match op {
                Op::Const(v) => push!(v),
                Op::Load(id) => push!(slots[id]),
                Op::Store(id) => {
                    let v = sanitize(pop!());
                    slots[id] = v;
                    push!(v);
                }
                Op::StorePop(id) => {
                    slots[id] = sanitize(pop!());
                }
                Op::Pop => {
                    pop!();
                }
                Op::Unary(u) => {
                    let a = pop!();
                    push!(funcs::unary(u, a));
                }
                Op::Binary(b) => {
                    let rhs = pop!();
                    let lhs = pop!();
                    push!(funcs::binary(b, lhs, rhs));
                }
                Op::Call1(f) => {
                    let a = pop!();
                    push!(funcs::call1(f, a, rng));
                }
                Op::Call2(f) => {
                    let b = pop!();
                    let a = pop!();
                    push!(funcs::call2(f, a, b));
                }
                Op::Bool => {
                    let a = pop!();
                    push!(if truthy(a) { 1.0 } else { 0.0 });
                }
                Op::JumpIfFalse(target) => {
                    if !truthy(pop!()) {
                        pc = target;
                    }
                }
                Op::JumpIfTrue(target) => {
                    if truthy(pop!()) {
                        pc = target;
                    }
                }
                Op::Jump(target) => pc = target,
            }
        }
        Ok(())
    }
}
