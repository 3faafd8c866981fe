//! The arithmetic formula parser and evaluator used by `Formula` fields
//! (spec §4.D.2). Formulas parse once, at descriptor-commit time, into an
//! arena-indexed AST; evaluation walks the arena with no recursion through
//! back-pointers, so the AST is cycle-free by construction.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{ExprError, ParseError};
use logic_core::ValueType;

pub type NodeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryFn {
    Abs,
    Sin,
    Cos,
    Sqrt,
    Ln,
    ToCard,
    ToFloat,
    ToInt,
    Signed,
    Unsigned,
    Negate,
}

#[derive(Clone, Debug, PartialEq)]
enum Node {
    IntLiteral(i64),
    FloatLiteral(f64),
    FieldRef(usize),
    Unary { func: UnaryFn, arg: NodeId },
    Binary { op: BinOp, lhs: NodeId, rhs: NodeId },
}

/// An arena of formula nodes reachable from `root`. Indices only ever
/// point at nodes already present in the arena, so the graph is a DAG
/// with no cycles possible (spec §4.D.2: "cycle-free by construction").
#[derive(Clone, Debug, PartialEq)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A parsed, not-yet-evaluated formula. Parsing happens once at commit
/// time; `eval` is cheap and repeated every tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    source_text: String,
    ast: Ast,
}

impl Formula {
    /// A formula must be wrapped in outer parentheses at the top level
    /// (spec §4.D.2: `(2 + 2)`, `(%(1) * %(2))`), so this checks the
    /// trimmed source opens with `(` and that its matching `)` is the
    /// last character before handing the whole thing to the recursive-
    /// descent parser (the outer parens parse as an ordinary grouped
    /// operand from there).
    pub fn parse(source_text: &str) -> Result<Formula, ParseError> {
        let trimmed = source_text.trim();
        if !trimmed.starts_with('(') {
            return Err(ParseError::new(0, "a formula must be wrapped in outer parentheses"));
        }
        let close = matching_paren(trimmed)
            .ok_or_else(|| ParseError::new(trimmed.len(), "unbalanced outer parentheses"))?;
        if close != trimmed.len() - 1 {
            return Err(ParseError::new(
                close + 1,
                "trailing characters after the outer parentheses",
            ));
        }

        let mut parser = Parser {
            chars: trimmed.chars().peekable(),
            pos: 0,
            nodes: Vec::new(),
        };
        let root = parser.parse_expr()?;
        parser.skip_ws();
        if parser.peek().is_some() {
            return Err(ParseError::new(parser.pos, "trailing characters after expression"));
        }
        Ok(Formula {
            source_text: source_text.to_string(),
            ast: Ast { nodes: parser.nodes, root },
        })
    }

    /// Highest `%(n)` index referenced anywhere in the AST, if any (spec
    /// §4.D.2, §8 invariant 4: checked against `sources.len()` at commit
    /// time, not only lazily during `eval`).
    pub fn max_field_ref(&self) -> Option<usize> {
        self.ast.nodes.iter().filter_map(|n| match n {
            Node::FieldRef(idx) => Some(*idx),
            _ => None,
        }).max()
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Evaluates the formula against `field_refs` (the current numeric
    /// value of each `%(n)` source, in declaration order), coercing the
    /// final result to `result_type`.
    pub fn eval(&self, field_refs: &[f64], result_type: ValueType) -> Result<NumValue, ExprError> {
        let value = eval_node(&self.ast, self.ast.root, field_refs)?;
        coerce_to(value, result_type)?;
        Ok(value)
    }
}

/// An intermediate evaluation result before coercion to the field's
/// declared `ValueType`. Keeps integer arithmetic exact until the final
/// coercion step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumValue {
    Int(i64),
    Float(f64),
}

impl NumValue {
    pub fn as_f64(self) -> f64 {
        match self {
            NumValue::Int(v) => v as f64,
            NumValue::Float(v) => v,
        }
    }
}

pub fn coerce_to(value: NumValue, result_type: ValueType) -> Result<NumValue, ExprError> {
    match (value, result_type) {
        (NumValue::Int(v), ValueType::U32) if v >= 0 && v <= u32::MAX as i64 => Ok(value),
        (NumValue::Int(_), ValueType::U32) => Err(ExprError::ResultCoercion),
        (NumValue::Int(v), ValueType::I32) if v >= i32::MIN as i64 && v <= i32::MAX as i64 => {
            Ok(value)
        }
        (NumValue::Int(_), ValueType::I32) => Err(ExprError::ResultCoercion),
        (NumValue::Int(_), ValueType::F64) => Ok(value),
        (NumValue::Float(v), ValueType::F64) => {
            if v.is_finite() {
                Ok(value)
            } else {
                Err(ExprError::ResultCoercion)
            }
        }
        (NumValue::Float(v), ValueType::U32) if v >= 0.0 && v <= u32::MAX as f64 => {
            Ok(NumValue::Int(v as i64))
        }
        (NumValue::Float(_), ValueType::U32) => Err(ExprError::ResultCoercion),
        (NumValue::Float(v), ValueType::I32) if v >= i32::MIN as f64 && v <= i32::MAX as f64 => {
            Ok(NumValue::Int(v as i64))
        }
        (NumValue::Float(_), ValueType::I32) => Err(ExprError::ResultCoercion),
        _ => Err(ExprError::ResultCoercion),
    }
}

fn eval_node(ast: &Ast, id: NodeId, field_refs: &[f64]) -> Result<NumValue, ExprError> {
    match &ast.nodes[id] {
        Node::IntLiteral(v) => Ok(NumValue::Int(*v)),
        Node::FloatLiteral(v) => Ok(NumValue::Float(*v)),
        Node::FieldRef(idx) => field_refs
            .get(*idx)
            .copied()
            .map(NumValue::Float)
            .ok_or(ExprError::FieldRefOutOfRange(*idx, field_refs.len())),
        Node::Unary { func, arg } => eval_unary(*func, eval_node(ast, *arg, field_refs)?),
        Node::Binary { op, lhs, rhs } => eval_binary(
            *op,
            eval_node(ast, *lhs, field_refs)?,
            eval_node(ast, *rhs, field_refs)?,
        ),
    }
}

fn eval_unary(func: UnaryFn, v: NumValue) -> Result<NumValue, ExprError> {
    Ok(match func {
        UnaryFn::Abs => match v {
            NumValue::Int(i) => NumValue::Int(i.checked_abs().ok_or(ExprError::Overflow)?),
            NumValue::Float(f) => NumValue::Float(f.abs()),
        },
        UnaryFn::Sin => NumValue::Float(v.as_f64().sin()),
        UnaryFn::Cos => NumValue::Float(v.as_f64().cos()),
        UnaryFn::Sqrt => NumValue::Float(v.as_f64().sqrt()),
        UnaryFn::Ln => NumValue::Float(v.as_f64().ln()),
        UnaryFn::ToCard => NumValue::Int(v.as_f64().max(0.0) as i64),
        UnaryFn::ToFloat => NumValue::Float(v.as_f64()),
        UnaryFn::ToInt => NumValue::Int(v.as_f64() as i64),
        UnaryFn::Signed => NumValue::Int(v.as_f64() as i64),
        UnaryFn::Unsigned => NumValue::Int(v.as_f64().abs() as i64),
        UnaryFn::Negate => match v {
            NumValue::Int(i) => NumValue::Int(i.checked_neg().ok_or(ExprError::Overflow)?),
            NumValue::Float(f) => NumValue::Float(-f),
        },
    })
}

fn eval_binary(op: BinOp, lhs: NumValue, rhs: NumValue) -> Result<NumValue, ExprError> {
    use NumValue::{Float, Int};
    match op {
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            let (a, b) = (as_bits(lhs)?, as_bits(rhs)?);
            Ok(Int(match op {
                BinOp::BitAnd => a & b,
                BinOp::BitOr => a | b,
                BinOp::BitXor => a ^ b,
                _ => unreachable!(),
            }))
        }
        _ => match (lhs, rhs) {
            (Int(a), Int(b)) => eval_int(op, a, b),
            _ => eval_float(op, lhs.as_f64(), rhs.as_f64()),
        },
    }
}

fn as_bits(v: NumValue) -> Result<i64, ExprError> {
    match v {
        NumValue::Int(i) => Ok(i),
        NumValue::Float(_) => Err(ExprError::ResultCoercion),
    }
}

fn eval_int(op: BinOp, a: i64, b: i64) -> Result<NumValue, ExprError> {
    Ok(NumValue::Int(match op {
        BinOp::Add => a.checked_add(b).ok_or(ExprError::Overflow)?,
        BinOp::Sub => a.checked_sub(b).ok_or(ExprError::Overflow)?,
        BinOp::Mul => a.checked_mul(b).ok_or(ExprError::Overflow)?,
        BinOp::Div => {
            if b == 0 {
                return Err(ExprError::DivideByZero);
            }
            a.checked_div(b).ok_or(ExprError::Overflow)?
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(ExprError::DivideByZero);
            }
            a.checked_rem(b).ok_or(ExprError::Overflow)?
        }
        BinOp::Pow => {
            if b < 0 {
                return Ok(NumValue::Float((a as f64).powi(b as i32)));
            }
            a.checked_pow(b as u32).ok_or(ExprError::Overflow)?
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => unreachable!(),
    }))
}

fn eval_float(op: BinOp, a: f64, b: f64) -> Result<NumValue, ExprError> {
    Ok(NumValue::Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(ExprError::DivideByZero);
            }
            a / b
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(ExprError::DivideByZero);
            }
            a % b
        }
        BinOp::Pow => a.powf(b),
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => return Err(ExprError::ResultCoercion),
    }))
}

/// Index of the `)` matching the `(` at position 0, if `s` starts with one.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Recursive-descent parser over the grammar:
/// `expr := clause (('+' | '-' | '&' | '|' | '^') clause)*`
/// `clause := operand (('*' | '/' | '%' | '**') operand)*`
/// `operand := '-' operand | func '(' expr ')' | fieldref | literal | '(' expr ')'`
struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        self.skip_ws();
        if self.bump() == Some(c) {
            Ok(())
        } else {
            Err(ParseError::new(self.pos, format!("expected '{c}'")))
        }
    }

    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_clause()?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some('+') => BinOp::Add,
                Some('-') => BinOp::Sub,
                Some('&') => BinOp::BitAnd,
                Some('|') => BinOp::BitOr,
                Some('^') => BinOp::BitXor,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_clause()?;
            lhs = self.push(Node::Binary { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn parse_clause(&mut self) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_operand()?;
        loop {
            self.skip_ws();
            let op = if self.starts_with("**") {
                self.bump();
                self.bump();
                BinOp::Pow
            } else {
                match self.peek() {
                    Some('*') => BinOp::Mul,
                    Some('/') => BinOp::Div,
                    Some('%') => BinOp::Mod,
                    _ => break,
                }
            };
            if !matches!(op, BinOp::Pow) {
                self.bump();
            }
            let rhs = self.parse_operand()?;
            lhs = self.push(Node::Binary { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn starts_with(&self, s: &str) -> bool {
        let mut iter = self.chars.clone();
        for expected in s.chars() {
            if iter.next() != Some(expected) {
                return false;
            }
        }
        true
    }

    fn parse_operand(&mut self) -> Result<NodeId, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('-') => {
                self.bump();
                let arg = self.parse_operand()?;
                Ok(self.push(Node::Unary { func: UnaryFn::Negate, arg }))
            }
            Some('(') => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some('%') => {
                self.bump();
                self.expect('(')?;
                let idx = self.parse_uint()?;
                self.expect(')')?;
                Ok(self.push(Node::FieldRef(idx)))
            }
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_func_call(),
            _ => Err(ParseError::new(self.pos, "expected an operand")),
        }
    }

    fn parse_uint(&mut self) -> Result<usize, ParseError> {
        self.skip_ws();
        let start = self.pos;
        let mut digits = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            digits.push(self.bump().unwrap());
        }
        digits
            .parse()
            .map_err(|_| ParseError::new(start, "expected an unsigned integer"))
    }

    fn parse_number(&mut self) -> Result<NodeId, ParseError> {
        let start = self.pos;
        let mut text = String::new();
        let mut is_float = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            if self.peek() == Some('.') {
                is_float = true;
            }
            text.push(self.bump().unwrap());
        }
        if is_float {
            let v: f64 = text
                .parse()
                .map_err(|_| ParseError::new(start, "malformed float literal"))?;
            Ok(self.push(Node::FloatLiteral(v)))
        } else {
            let v: i64 = text
                .parse()
                .map_err(|_| ParseError::new(start, "malformed integer literal"))?;
            Ok(self.push(Node::IntLiteral(v)))
        }
    }

    fn parse_func_call(&mut self) -> Result<NodeId, ParseError> {
        let start = self.pos;
        let mut name = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            name.push(self.bump().unwrap());
        }
        let func = match name.as_str() {
            "abs" => UnaryFn::Abs,
            "sin" => UnaryFn::Sin,
            "cos" => UnaryFn::Cos,
            "sqrt" => UnaryFn::Sqrt,
            "ln" => UnaryFn::Ln,
            "card" => UnaryFn::ToCard,
            "float" => UnaryFn::ToFloat,
            "int" => UnaryFn::ToInt,
            "signed" => UnaryFn::Signed,
            "unsigned" => UnaryFn::Unsigned,
            _ => return Err(ParseError::new(start, format!("unknown function '{name}'"))),
        };
        self.expect('(')?;
        let arg = self.parse_expr()?;
        self.expect(')')?;
        Ok(self.push(Node::Unary { func, arg }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_ok(src: &str, refs: &[f64]) -> NumValue {
        Formula::parse(src).unwrap().eval(refs, ValueType::F64).unwrap()
    }

    #[test]
    fn parses_and_evaluates_simple_arithmetic() {
        assert_eq!(eval_ok("(2 + 3 * 4)", &[]).as_f64(), 14.0);
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(eval_ok("((2 + 3) * 4)", &[]).as_f64(), 20.0);
    }

    #[test]
    fn field_refs_resolve_by_index() {
        assert_eq!(eval_ok("(%(0) + %(1))", &[1.5, 2.5]).as_f64(), 4.0);
    }

    #[test]
    fn unary_functions_parse() {
        assert_eq!(eval_ok("(sqrt(16))", &[]).as_f64(), 4.0);
        assert_eq!(eval_ok("(abs(-5))", &[]).as_f64(), 5.0);
    }

    #[test]
    fn bitwise_operators_apply_to_integers() {
        let v = Formula::parse("(6 & 3)").unwrap().eval(&[], ValueType::I32).unwrap();
        assert_eq!(v.as_f64(), 2.0);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let result = Formula::parse("(1 / 0)").unwrap().eval(&[], ValueType::F64);
        assert!(matches!(result, Err(ExprError::DivideByZero)));
    }

    #[test]
    fn out_of_range_field_ref_is_an_error() {
        let result = Formula::parse("(%(3))").unwrap().eval(&[1.0], ValueType::F64);
        assert!(matches!(result, Err(ExprError::FieldRefOutOfRange(3, 1))));
    }

    #[test]
    fn missing_outer_parentheses_is_a_parse_error() {
        assert!(Formula::parse("2 + 2").is_err());
    }

    #[test]
    fn trailing_garbage_is_a_parse_error() {
        assert!(Formula::parse("(1 + 2))").is_err());
    }

    #[test]
    fn unknown_function_is_a_parse_error() {
        assert!(Formula::parse("(bogus(1))").is_err());
    }

    #[test]
    fn result_out_of_range_for_i32_is_coercion_error() {
        let huge = Formula::parse("(99999999999)").unwrap();
        let result = huge.eval(&[], ValueType::I32);
        assert!(matches!(result, Err(ExprError::ResultCoercion)));
    }

    #[test]
    fn max_field_ref_reports_the_highest_index_used() {
        assert_eq!(Formula::parse("(%(0) + %(2))").unwrap().max_field_ref(), Some(2));
        assert_eq!(Formula::parse("(1 + 2)").unwrap().max_field_ref(), None);
    }
}
