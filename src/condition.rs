//! Conditional expressions attached to breakpoints and watchpoints.
//!
//! A condition always carries the exact text it was parsed from, so saving a
//! record never has to print the parsed form back out.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Read access to the emulated machine for condition evaluation.
pub trait MachineState {
    fn register(&self, name: &str) -> Option<u64>;
}

pub trait Expression: Send + Sync + fmt::Debug {
    fn evaluate(&self, machine: &dyn MachineState) -> bool;
}

pub trait ConditionParser {
    /// `None` when the text is not a valid expression.
    fn parse(&self, text: &str) -> Option<Arc<dyn Expression>>;
}

#[derive(Clone)]
pub struct Condition {
    text: String,
    expr: Arc<dyn Expression>,
}

impl Condition {
    /// Parse `text`. An unparsable condition is dropped with a warning, which
    /// leaves its record unconditional.
    pub fn parse(parser: &dyn ConditionParser, text: &str) -> Option<Self> {
        match parser.parse(text) {
            Some(expr) => Some(Self {
                text: text.to_owned(),
                expr,
            }),
            None => {
                log::warn!("dropping unparsable condition {text:?}");
                None
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// A missing condition always passes.
    pub fn evaluate(condition: Option<&Condition>, machine: &dyn MachineState) -> bool {
        condition.map_or(true, |c| c.expr.evaluate(machine))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.text).finish()
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

// Only the text is meaningful outside the process.
impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Register(String),
    Literal(u64),
}

impl Operand {
    fn parse(token: &str) -> Option<Self> {
        if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16).ok().map(Operand::Literal);
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            return token.parse().ok().map(Operand::Literal);
        }
        let mut chars = token.chars();
        let first = chars.next()?;
        if (first.is_ascii_alphabetic() || first == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            Some(Operand::Register(token.to_owned()))
        } else {
            None
        }
    }

    fn value(&self, machine: &dyn MachineState) -> Option<u64> {
        match self {
            Operand::Register(name) => machine.register(name),
            Operand::Literal(value) => Some(*value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparison {
    lhs: Operand,
    op: CompareOp,
    rhs: Operand,
}

impl Comparison {
    fn evaluate(&self, machine: &dyn MachineState) -> bool {
        let (Some(lhs), Some(rhs)) = (self.lhs.value(machine), self.rhs.value(machine)) else {
            return false;
        };
        match self.op {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

/// `a || b && c` style expression: a disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComparisonExpr {
    any_of: Vec<Vec<Comparison>>,
}

impl Expression for ComparisonExpr {
    fn evaluate(&self, machine: &dyn MachineState) -> bool {
        self.any_of
            .iter()
            .any(|all_of| all_of.iter().all(|c| c.evaluate(machine)))
    }
}

/// Parser for simple register comparisons such as `r3 == 5 && pc != 0x80001000`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComparisonParser;

impl ComparisonParser {
    fn parse_comparison(text: &str) -> Option<Comparison> {
        // Two-character operators first so `<=` is not read as `<`.
        const OPS: [(&str, CompareOp); 6] = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ];
        let (index, symbol, op) = OPS
            .iter()
            .filter_map(|(symbol, op)| text.find(symbol).map(|i| (i, *symbol, *op)))
            .min_by_key(|(i, symbol, _)| (*i, usize::MAX - symbol.len()))?;
        let lhs = Operand::parse(text[..index].trim())?;
        let rhs = Operand::parse(text[index + symbol.len()..].trim())?;
        Some(Comparison { lhs, op, rhs })
    }
}

impl ConditionParser for ComparisonParser {
    fn parse(&self, text: &str) -> Option<Arc<dyn Expression>> {
        let any_of = text
            .split("||")
            .map(|clause| {
                clause
                    .split("&&")
                    .map(Self::parse_comparison)
                    .collect::<Option<Vec<_>>>()
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Arc::new(ComparisonExpr { any_of }))
    }
}
