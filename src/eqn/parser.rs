use thiserror::Error;

use super::ast::{BinaryOp, Expr, Statements, UnaryOp};
use super::env::SymbolTable;
use super::funcs::Func;

/// Deepest expression nesting accepted before the source is rejected.
pub const MAX_NESTING: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {line}:{col}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Semi,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    col: usize,
}

const OPERATORS: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "%",
    "^", "<", ">", "=", "!",
];

fn lex(src: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    let mut line = 1usize;
    let mut line_start = 0usize;

    let err = |line: usize, col: usize, message: String| ParseError { line, col, message };

    while i < bytes.len() {
        let c = bytes[i];
        let col = i - line_start + 1;
        match c {
            b'\n' => {
                i += 1;
                line += 1;
                line_start = i;
            }
            b' ' | b'\t' | b'\r' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let (start_line, start_col) = (line, col);
                i += 2;
                loop {
                    if i + 1 >= bytes.len() {
                        return Err(err(start_line, start_col, "unterminated comment".into()));
                    }
                    if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        i += 2;
                        break;
                    }
                    if bytes[i] == b'\n' {
                        line += 1;
                        line_start = i + 1;
                    }
                    i += 1;
                }
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        while j < bytes.len() && bytes[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text = &src[start..i];
                let v = text
                    .parse::<f64>()
                    .map_err(|_| err(line, col, format!("invalid number '{text}'")))?;
                out.push(Token { tok: Tok::Num(v), line, col });
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let name = src[start..i].to_ascii_lowercase();
                out.push(Token { tok: Tok::Ident(name), line, col });
            }
            b'(' | b')' | b',' | b';' => {
                let tok = match c {
                    b'(' => Tok::LParen,
                    b')' => Tok::RParen,
                    b',' => Tok::Comma,
                    _ => Tok::Semi,
                };
                out.push(Token { tok, line, col });
                i += 1;
            }
            _ => {
                let rest = &src[i..];
                match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                    Some(op) => {
                        out.push(Token { tok: Tok::Op(op), line, col });
                        i += op.len();
                    }
                    None => {
                        let ch = rest.chars().next().unwrap_or('?');
                        return Err(err(line, col, format!("unexpected character '{ch}'")));
                    }
                }
            }
        }
    }
    let col = i - line_start + 1;
    out.push(Token { tok: Tok::Eof, line, col });
    Ok(out)
}

fn infix(op: &str) -> Option<(BinaryOp, u8, u8)> {
    let entry = match op {
        "||" => (BinaryOp::Or, 2, 3),
        "&&" => (BinaryOp::And, 4, 5),
        "==" => (BinaryOp::Eq, 6, 7),
        "!=" => (BinaryOp::Ne, 6, 7),
        "<" => (BinaryOp::Lt, 8, 9),
        ">" => (BinaryOp::Gt, 8, 9),
        "<=" => (BinaryOp::Le, 8, 9),
        ">=" => (BinaryOp::Ge, 8, 9),
        "+" => (BinaryOp::Add, 10, 11),
        "-" => (BinaryOp::Sub, 10, 11),
        "*" => (BinaryOp::Mul, 12, 13),
        "/" => (BinaryOp::Div, 12, 13),
        "%" => (BinaryOp::Mod, 12, 13),
        "^" => (BinaryOp::Pow, 17, 16),
        _ => return None,
    };
    Some(entry)
}

const PREFIX_BP: u8 = 14;

fn assignment(op: &str) -> Option<Option<BinaryOp>> {
    match op {
        "=" => Some(None),
        "+=" => Some(Some(BinaryOp::Add)),
        "-=" => Some(Some(BinaryOp::Sub)),
        "*=" => Some(Some(BinaryOp::Mul)),
        "/=" => Some(Some(BinaryOp::Div)),
        "%=" => Some(Some(BinaryOp::Mod)),
        _ => None,
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    symbols: &'a mut SymbolTable,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)].tok
    }

    fn bump(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let t = self.peek();
        ParseError {
            line: t.line,
            col: t.col,
            message: message.into(),
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ParseError> {
        if self.peek().tok == tok {
            self.bump();
            Ok(())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    fn program(&mut self) -> Result<Statements, ParseError> {
        let mut out = Vec::new();
        loop {
            while self.peek().tok == Tok::Semi {
                self.bump();
            }
            if self.peek().tok == Tok::Eof {
                return Ok(out);
            }
            let (stmt, _) = self.expr(0)?;
            out.push(stmt);
            match self.peek().tok {
                Tok::Semi => {
                    self.bump();
                }
                Tok::Eof => return Ok(out),
                _ => return Err(self.error_here("expected ';'")),
            }
        }
    }

    /// Parses one expression and returns it with the depth of its tree.
    fn expr(&mut self, min_bp: u8) -> Result<(Expr, usize), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here("expression nested too deeply"));
        }
        let result = self.expr_inner(min_bp);
        self.depth -= 1;
        result
    }

    /// One level above a subtree of `depth`. Long operator chains grow the
    /// tree without recursing here, so the limit applies to the tree itself.
    fn deeper(&self, depth: usize) -> Result<usize, ParseError> {
        let depth = depth + 1;
        if depth > MAX_NESTING {
            return Err(self.error_here("expression nested too deeply"));
        }
        Ok(depth)
    }

    fn expr_inner(&mut self, min_bp: u8) -> Result<(Expr, usize), ParseError> {
        let (mut lhs, mut depth) = self.prefix()?;
        loop {
            let Tok::Op(op) = self.peek().tok else { break };
            let Some((bin, lbp, rbp)) = infix(op) else { break };
            if lbp < min_bp {
                break;
            }
            self.bump();
            let (rhs, rhs_depth) = self.expr(rbp)?;
            depth = self.deeper(depth.max(rhs_depth))?;
            lhs = Expr::Binary(bin, Box::new(lhs), Box::new(rhs));
        }
        Ok((lhs, depth))
    }

    fn prefix(&mut self) -> Result<(Expr, usize), ParseError> {
        let token = self.bump();
        match token.tok {
            Tok::Num(v) => Ok((Expr::Num(v), 1)),
            Tok::LParen => {
                let inner = self.expr(0)?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::Op("-") => {
                let (operand, depth) = self.expr(PREFIX_BP)?;
                Ok((Expr::Unary(UnaryOp::Neg, Box::new(operand)), self.deeper(depth)?))
            }
            Tok::Op("+") => self.expr(PREFIX_BP),
            Tok::Op("!") => {
                let (operand, depth) = self.expr(PREFIX_BP)?;
                Ok((Expr::Unary(UnaryOp::Not, Box::new(operand)), self.deeper(depth)?))
            }
            Tok::Ident(name) => {
                if self.peek().tok == Tok::LParen {
                    return self.call(&name, token.line, token.col);
                }
                if let Tok::Op(op) = *self.peek_at(0) {
                    if let Some(compound) = assignment(op) {
                        self.bump();
                        let id = self.symbols.resolve(&name);
                        let (value, depth) = self.expr(0)?;
                        let depth = self.deeper(depth)?;
                        return Ok((Expr::Assign(id, compound, Box::new(value)), depth));
                    }
                }
                Ok((Expr::Var(self.symbols.resolve(&name)), 1))
            }
            Tok::Eof => Err(ParseError {
                line: token.line,
                col: token.col,
                message: "unexpected end of input".into(),
            }),
            other => Err(ParseError {
                line: token.line,
                col: token.col,
                message: format!("unexpected token {}", describe(&other)),
            }),
        }
    }

    fn call(&mut self, name: &str, line: usize, col: usize) -> Result<(Expr, usize), ParseError> {
        self.expect(Tok::LParen, "'('")?;
        let mut args = Vec::new();
        let mut depth = 0;
        if self.peek().tok != Tok::RParen {
            loop {
                let (arg, arg_depth) = self.expr(0)?;
                depth = depth.max(arg_depth);
                args.push(arg);
                if self.peek().tok == Tok::Comma {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(Tok::RParen, "')'")?;
        let depth = self.deeper(depth)?;

        let arity_error = |want: usize, got: usize| ParseError {
            line,
            col,
            message: format!("{name}() takes {want} argument(s), got {got}"),
        };

        if name == "if" {
            if args.len() != 3 {
                return Err(arity_error(3, args.len()));
            }
            let mut it = args.into_iter();
            return match (it.next(), it.next(), it.next()) {
                (Some(c), Some(t), Some(e)) => {
                    Ok((Expr::If(Box::new(c), Box::new(t), Box::new(e)), depth))
                }
                _ => Err(arity_error(3, 0)),
            };
        }

        let func = Func::lookup(name).ok_or_else(|| ParseError {
            line,
            col,
            message: format!("unknown function '{name}'"),
        })?;
        if args.len() != func.arity() {
            return Err(arity_error(func.arity(), args.len()));
        }
        Ok((Expr::Call(func, args), depth))
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Num(v) => format!("number {v}"),
        Tok::Ident(n) => format!("'{n}'"),
        Tok::Op(op) => format!("'{op}'"),
        Tok::LParen => "'('".into(),
        Tok::RParen => "')'".into(),
        Tok::Comma => "','".into(),
        Tok::Semi => "';'".into(),
        Tok::Eof => "end of input".into(),
    }
}

/// Parses one equation group. Identifiers are resolved (and allocated) in `symbols`.
pub fn parse_program(src: &str, symbols: &mut SymbolTable) -> Result<Statements, ParseError> {
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        symbols,
    };
    parser.program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eqn::env::var;

    fn parse(src: &str) -> Result<Statements, ParseError> {
        let mut symbols = SymbolTable::with_builtins();
        parse_program(src, &mut symbols)
    }

    #[test]
    fn power_binds_tighter_than_negation() {
        let stmts = parse("-2^2").expect("parse");
        assert_eq!(
            stmts[0],
            Expr::Unary(
                UnaryOp::Neg,
                Box::new(Expr::Binary(
                    BinaryOp::Pow,
                    Box::new(Expr::Num(2.0)),
                    Box::new(Expr::Num(2.0))
                ))
            )
        );
    }

    #[test]
    fn compound_assignment_and_comments() {
        let stmts = parse("// lead\nZoom += 0.1; /* block\n */ rot = 1").expect("parse");
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0], Expr::Assign(id, Some(BinaryOp::Add), _) if id == var::ZOOM));
        assert!(matches!(stmts[1], Expr::Assign(id, None, _) if id == var::ROT));
    }

    #[test]
    fn reports_position_of_errors() {
        let err = parse("zoom = 1;\nrot = sin(1, 2)").expect_err("arity");
        assert_eq!(err.line, 2);
        let err = parse("zoom = (1").expect_err("paren");
        assert!(err.message.contains("')'"));
        let err = parse("x = 1 @ 2").expect_err("char");
        assert_eq!(err.col, 7);
    }

    #[test]
    fn rejects_runaway_nesting() {
        let src = format!("{}1{}", "(".repeat(MAX_NESTING + 4), ")".repeat(MAX_NESTING + 4));
        assert!(parse(&src).is_err());
    }

    #[test]
    fn long_operator_chains_count_toward_nesting() {
        let chain = |terms: usize| format!("reg00 = 0{}", " + 1".repeat(terms));
        assert!(parse(&chain(MAX_NESTING / 2)).is_ok());
        let err = parse(&chain(MAX_NESTING * 4)).expect_err("too deep");
        assert!(err.message.contains("nested too deeply"));
    }
}
