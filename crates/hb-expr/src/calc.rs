//! Recursive evaluation of expression trees against a symbol table.

use hb_core::{Error, Result, Symbols};

use crate::expr::{Expr, Literal};
use crate::kernels::Library;
use crate::value::Value;

/// Evaluate `expr` against `symbols`.
///
/// Symbol references are looked up by name, constants are returned as held,
/// and calls resolve their kernel first and then evaluate their arguments
/// left to right. Nothing is cached; repeated sub-expressions are evaluated
/// each time they occur.
pub fn calculate(expr: &Expr, symbols: &Symbols) -> Result<Value> {
    step(expr, symbols, |arg| calculate(arg, symbols))
}

/// Evaluate one node, delegating call arguments to `arg`.
pub(crate) fn step<'e>(
    expr: &'e Expr,
    symbols: &Symbols,
    mut arg: impl FnMut(&'e Expr) -> Result<Value>,
) -> Result<Value> {
    match expr {
        Expr::Name(name) => lookup(name, symbols),
        Expr::Predicate(name) => match lookup(name, symbols)? {
            v @ Value::Bool(_) => Ok(v),
            v => Ok(Value::Bool(v.bools()?.into_owned())),
        },
        Expr::Const(lit) => Ok(literal(lit)),
        Expr::Call { fcn, args } => {
            let kernel =
                Library::global().get(fcn).ok_or_else(|| Error::Unresolved(expr.to_string()))?;
            let args = args.iter().map(&mut arg).collect::<Result<Vec<_>>>()?;
            kernel(&args)
        }
    }
}

/// Invoke the kernel named `fcn` on already-evaluated arguments.
pub fn apply(fcn: &str, args: &[Value]) -> Result<Value> {
    let kernel = Library::global().get(fcn).ok_or_else(|| Error::Unresolved(fcn.to_string()))?;
    kernel(args)
}

fn lookup(name: &str, symbols: &Symbols) -> Result<Value> {
    symbols
        .get(name)
        .map(|c| Value::from(c.clone()))
        .ok_or_else(|| Error::UnknownSymbol(name.to_string()))
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Number(v) => Value::Scalar(v.0),
        Literal::Sequence(vs) => Value::Sequence(vs.iter().map(|v| v.0).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hb_core::Column;

    fn symbols() -> Symbols {
        let mut s = Symbols::new();
        s.insert("x".into(), Column::from(vec![1.0, 4.0, 9.0]));
        s.insert("flag".into(), Column::from(vec![1.0, 0.0, 2.0]));
        s
    }

    #[test]
    fn name_and_const() {
        let s = symbols();
        assert_eq!(calculate(&Expr::name("x"), &s).unwrap(), Value::Real(vec![1.0, 4.0, 9.0]));
        assert_eq!(calculate(&Expr::number(2.5), &s).unwrap(), Value::Scalar(2.5));
        assert_eq!(
            calculate(&Expr::sequence(&[0.0, 1.0]), &s).unwrap(),
            Value::Sequence(vec![0.0, 1.0])
        );
    }

    #[test]
    fn predicate_coerces_to_bool() {
        let v = calculate(&Expr::predicate("flag"), &symbols()).unwrap();
        assert_eq!(v, Value::Bool(vec![true, false, true]));
    }

    #[test]
    fn nested_calls() {
        let e = Expr::parse("sqrt(x) * 2 + 1").unwrap();
        let Value::Real(v) = calculate(&e, &symbols()).unwrap() else {
            panic!("expected reals");
        };
        assert_relative_eq!(v[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], 5.0, epsilon = 1e-12);
        assert_relative_eq!(v[2], 7.0, epsilon = 1e-12);
    }

    #[test]
    fn binning_call() {
        let e = Expr::call(
            "bin___L",
            vec![Expr::name("x"), Expr::number(2.0), Expr::number(0.0), Expr::number(8.0)],
        );
        assert_eq!(calculate(&e, &symbols()).unwrap(), Value::Index(vec![Some(0), Some(1), None]));
    }

    #[test]
    fn missing_symbol() {
        let err = calculate(&Expr::name("y"), &symbols()).unwrap_err();
        assert!(matches!(err, Error::UnknownSymbol(ref n) if n == "y"));
    }

    #[test]
    fn missing_kernel_reported_before_arguments() {
        // the unknown symbol in the argument is never reached
        let e = Expr::call("frobnicate", vec![Expr::name("nope")]);
        let err = calculate(&e, &symbols()).unwrap_err();
        assert!(matches!(err, Error::Unresolved(_)));
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn apply_by_name() {
        let out = apply("subtract", &[Value::Scalar(5.0), Value::Scalar(2.0)]).unwrap();
        assert_eq!(out, Value::Scalar(3.0));
        assert!(apply("nope", &[]).is_err());
    }
}
