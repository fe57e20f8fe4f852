//! Expression tree consumed by the evaluator.
//!
//! Four node kinds only: symbol references (plain or boolean), literal
//! constants, and named calls with positional arguments. Operators in source
//! text are parsed into calls on the arithmetic kernels, so the tree never
//! needs an operator node of its own.

use std::collections::BTreeMap;
use std::fmt;

use hb_core::Result;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Literal constant held by [`Expr::Const`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    /// A single real number.
    Number(OrderedFloat<f64>),
    /// An ordered sequence of reals (bin edges).
    Sequence(Vec<OrderedFloat<f64>>),
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a column by name.
    Name(String),
    /// Reference to a column by name, read as booleans.
    Predicate(String),
    /// Literal constant.
    Const(Literal),
    /// Named kernel call.
    Call {
        /// Kernel name in the [`Library`](crate::Library).
        fcn: String,
        /// Positional arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parse source text without definitions.
    pub fn parse(input: &str) -> Result<Self> {
        crate::parse::parse(input, &BTreeMap::new())
    }

    /// Parse source text, substituting names found in `defs` by their
    /// parsed definitions.
    pub fn parse_with_defs(input: &str, defs: &BTreeMap<String, String>) -> Result<Self> {
        crate::parse::parse(input, defs)
    }

    /// Symbol reference.
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    /// Boolean symbol reference.
    pub fn predicate(name: impl Into<String>) -> Self {
        Expr::Predicate(name.into())
    }

    /// Numeric constant.
    pub fn number(v: f64) -> Self {
        Expr::Const(Literal::Number(OrderedFloat(v)))
    }

    /// Sequence constant.
    pub fn sequence(values: &[f64]) -> Self {
        Expr::Const(Literal::Sequence(values.iter().copied().map(OrderedFloat).collect()))
    }

    /// Kernel call.
    pub fn call(fcn: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call { fcn: fcn.into(), args }
    }

    /// Whether this node is a literal constant.
    pub fn is_const(&self) -> bool {
        matches!(self, Expr::Const(_))
    }

    /// Distinct symbol names referenced anywhere in the tree, in order of
    /// first occurrence.
    pub fn symbols(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Name(n) | Expr::Predicate(n) => {
                if !out.contains(&n.as_str()) {
                    out.push(n);
                }
            }
            Expr::Const(_) => {}
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_symbols(out)),
        }
    }

    /// Call names used anywhere in the tree, depth first.
    pub fn calls(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            if let Expr::Call { fcn, args } = e {
                out.push(fcn.as_str());
                stack.extend(args.iter().rev());
            }
        }
        out
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Call { fcn, args } => match (infix(fcn), args.len()) {
                (Some((_, p)), 2) => p,
                _ if unary(fcn).is_some() && args.len() == 1 => UNARY,
                _ => ATOM,
            },
            Expr::Const(Literal::Number(v)) if v.0 < 0.0 => UNARY,
            _ => ATOM,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        let paren = self.precedence() < min;
        if paren {
            write!(f, "(")?;
        }
        match self {
            Expr::Name(n) | Expr::Predicate(n) => write!(f, "{n}")?,
            Expr::Const(Literal::Number(v)) => write!(f, "{}", v.0)?,
            Expr::Const(Literal::Sequence(vs)) => {
                write!(f, "[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v.0)?;
                }
                write!(f, "]")?;
            }
            Expr::Call { fcn, args } => match (infix(fcn), unary(fcn), args.as_slice()) {
                (Some((op, p)), _, [lhs, rhs]) => {
                    // comparisons do not chain
                    let left_min = if p == COMPARE { p + 1 } else { p };
                    lhs.fmt_prec(f, left_min)?;
                    write!(f, " {op} ")?;
                    rhs.fmt_prec(f, p + 1)?;
                }
                (_, Some(op), [arg]) => {
                    write!(f, "{op}")?;
                    arg.fmt_prec(f, UNARY)?;
                }
                _ => {
                    write!(f, "{}(", surface_name(fcn))?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        a.fmt_prec(f, 0)?;
                    }
                    write!(f, ")")?;
                }
            },
        }
        if paren {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

const OR: u8 = 1;
const AND: u8 = 2;
const COMPARE: u8 = 3;
const ADD: u8 = 4;
const MUL: u8 = 5;
const UNARY: u8 = 6;
const ATOM: u8 = 7;

/// Operator symbol and precedence for kernels rendered infix.
pub(crate) fn infix(fcn: &str) -> Option<(&'static str, u8)> {
    Some(match fcn {
        "logical_or" => ("||", OR),
        "logical_and" => ("&&", AND),
        "equal" => ("==", COMPARE),
        "not_equal" => ("!=", COMPARE),
        "less" => ("<", COMPARE),
        "less_equal" => ("<=", COMPARE),
        "greater" => (">", COMPARE),
        "greater_equal" => (">=", COMPARE),
        "add" => ("+", ADD),
        "subtract" => ("-", ADD),
        "multiply" => ("*", MUL),
        "divide" => ("/", MUL),
        _ => return None,
    })
}

pub(crate) fn unary(fcn: &str) -> Option<&'static str> {
    match fcn {
        "negative" => Some("-"),
        "logical_not" => Some("!"),
        _ => None,
    }
}

/// Kernel name for a function name written in source text.
pub(crate) fn kernel_name(surface: &str) -> &str {
    match surface {
        "pow" => "power",
        "min" => "minimum",
        "max" => "maximum",
        other => other,
    }
}

fn surface_name(kernel: &str) -> &str {
    match kernel {
        "power" => "pow",
        "minimum" => "min",
        "maximum" => "max",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_minimal_parens() {
        let e = Expr::call(
            "multiply",
            vec![Expr::call("add", vec![Expr::name("a"), Expr::name("b")]), Expr::name("c")],
        );
        assert_eq!(e.to_string(), "(a + b) * c");

        let e = Expr::call(
            "subtract",
            vec![Expr::name("a"), Expr::call("subtract", vec![Expr::name("b"), Expr::name("c")])],
        );
        assert_eq!(e.to_string(), "a - (b - c)");
    }

    #[test]
    fn display_function_calls() {
        let e = Expr::call("power", vec![Expr::name("x"), Expr::number(2.0)]);
        assert_eq!(e.to_string(), "pow(x, 2)");
        let e = Expr::call("partitionUONL", vec![Expr::name("x"), Expr::sequence(&[0.0, 1.5])]);
        assert_eq!(e.to_string(), "partitionUONL(x, [0, 1.5])");
    }

    #[test]
    fn symbols_in_first_occurrence_order() {
        let e = Expr::parse("b * a + b").unwrap();
        assert_eq!(e.symbols(), vec!["b", "a"]);
    }

    #[test]
    fn equal_trees_hash_equal() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Expr::parse("x + 1").unwrap());
        assert!(set.contains(&Expr::parse("x+1").unwrap()));
        assert!(!set.contains(&Expr::parse("x + 2").unwrap()));
    }

    #[test]
    fn calls_depth_first() {
        let e = Expr::parse("sqrt(x) + abs(y)").unwrap();
        assert_eq!(e.calls(), vec!["add", "sqrt", "abs"]);
    }
}
