use super::funcs::Func;

/// Slot index into a `SymbolTable` / `VariableEnvironment`.
pub type VarId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(VarId),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `target = value` or `target op= value`; evaluates to the stored value.
    Assign(VarId, Option<BinaryOp>, Box<Expr>),
}

impl Expr {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// Every slot this expression may write, in first-seen order.
    pub fn collect_writes(&self, out: &mut Vec<VarId>) {
        match self {
            Self::Num(_) | Self::Var(_) => {}
            Self::Unary(_, e) => e.collect_writes(out),
            Self::Binary(_, a, b) => {
                a.collect_writes(out);
                b.collect_writes(out);
            }
            Self::Call(_, args) => {
                for a in args {
                    a.collect_writes(out);
                }
            }
            Self::If(c, t, e) => {
                c.collect_writes(out);
                t.collect_writes(out);
                e.collect_writes(out);
            }
            Self::Assign(id, _, value) => {
                if !out.contains(id) {
                    out.push(*id);
                }
                value.collect_writes(out);
            }
        }
    }

    pub fn max_slot(&self) -> Option<VarId> {
        match self {
            Self::Num(_) => None,
            Self::Var(id) => Some(*id),
            Self::Unary(_, e) => e.max_slot(),
            Self::Binary(_, a, b) => a.max_slot().max(b.max_slot()),
            Self::Call(_, args) => args.iter().filter_map(Expr::max_slot).max(),
            Self::If(c, t, e) => c.max_slot().max(t.max_slot()).max(e.max_slot()),
            Self::Assign(id, _, value) => Some(*id).max(value.max_slot()),
        }
    }
}

/// A parsed equation group: statements run in order.
pub type Statements = Vec<Expr>;

pub fn writes_of(stmts: &[Expr]) -> Vec<VarId> {
    let mut out = Vec::new();
    for s in stmts {
        s.collect_writes(&mut out);
    }
    out
}
