use calcex::{
    arithmetic::{apply, map_unwrapped, ArithOp},
    ExErrorKind, ExResult, FunctionDef, Node, Rational, Value,
};
use std::cmp::Ordering;
mod utils;

fn int(n: i64) -> Value {
    Value::from(n)
}

#[test]
fn test_rational_exactness() -> ExResult<()> {
    let third = Rational::new(1, 3)?;
    let sum = third
        .checked_add(&third)
        .and_then(|s| s.checked_add(&third))
        .unwrap();
    assert_eq!(sum, Rational::new(1, 1)?);
    assert_eq!(Rational::new(2, -4)?, Rational::new(-1, 2)?);
    assert_eq!(Rational::new(2, -4)?.numer(), -1);
    assert_eq!(Rational::new(2, -4)?.denom(), 2);
    assert_eq!(Rational::new(1, 0).unwrap_err().kind, ExErrorKind::Arithmetic);
    let v = Value::Rational(third);
    assert_eq!(v.add(&v)?.add(&v)?, int(1));
    Ok(())
}

#[test]
fn test_rational_approximation() {
    let approx = Rational::from_f64(std::f64::consts::PI, 1e-3, 32).unwrap();
    assert!((approx.to_f64() - std::f64::consts::PI).abs() < 1e-3);
    let approx = Rational::from_f64(0.1, 1e-12, 32).unwrap();
    assert_eq!(approx, Rational::new(1, 10).unwrap());
    assert!(Rational::from_f64(f64::NAN, 1e-10, 32).is_none());
}

#[test]
fn test_transformers() -> ExResult<()> {
    let v = Value::from(vec![1.0, 2.0, 3.5]);
    utils::assert_float_eq_f64(v.to_number()?, 6.5);
    assert_eq!(int(4).to_vector()?, vec![int(4)]);
    let nested = Value::Vector(vec![Value::from(vec![1.0, 2.0]), Value::from(vec![3.0, 4.0])]);
    assert_eq!(nested.to_matrix()?.len(), 2);
    assert_eq!(Value::Boolean(true).to_number()?, 1.0);
    let f = Value::from(FunctionDef {
        identifier: "f".to_string(),
        params: vec!["x".to_string()],
        body: "x + 1".parse::<Node>()?,
    });
    assert_eq!(f.to_number().unwrap_err().kind, ExErrorKind::TypeMismatch);
    assert_eq!(format!("{}", f), "f(x) := x+1");
    Ok(())
}

#[test]
fn test_compare_and_equality() -> ExResult<()> {
    let a = Value::from(vec![1.0, 2.0]);
    let b = Value::from(vec![3.0]);
    assert_eq!(a.compare(&b)?, Ordering::Equal);
    assert_ne!(a, b);
    assert_eq!(Value::Percent(50.0).compare(&Value::Double(0.4))?, Ordering::Greater);
    assert_eq!(int(1), Value::Double(1.0));
    let nan = Value::Double(f64::NAN);
    assert_eq!(nan.compare(&int(1)).unwrap_err().kind, ExErrorKind::NotANumber);
    Ok(())
}

#[test]
fn test_dispatch_order() -> ExResult<()> {
    // vectors take precedence over percentages on the right
    let res = apply(
        ArithOp::Add,
        &Value::Percent(10.0),
        &Value::Vector(vec![Value::Percent(5.0), int(1)]),
    )?;
    assert_eq!(res, Value::Vector(vec![Value::Percent(15.0), Value::Double(1.1)]));
    // percentages on the right of a vector are broadcast
    let res = apply(ArithOp::Mul, &Value::from(vec![2.0]), &Value::Percent(50.0))?;
    assert_eq!(res, Value::from(vec![1.0]));
    // a vector combined with a matrix is a one-row matrix
    let m = Value::Matrix(vec![vec![int(1), int(2)], vec![int(3), int(4)]]);
    let res = apply(ArithOp::Add, &Value::Vector(vec![int(1), int(1)]), &m)?;
    assert_eq!(
        res,
        Value::Matrix(vec![vec![int(2), int(3)], vec![int(3), int(4)]])
    );
    Ok(())
}

#[test]
fn test_percent_formulas() -> ExResult<()> {
    let p = |x| Value::Percent(x);
    assert_eq!(p(10.0).add(&p(5.0))?, p(15.0));
    assert_eq!(p(10.0).subtract(&p(5.0))?, p(5.0));
    assert_eq!(p(10.0).multiply(&p(5.0))?, p(50.0));
    assert_eq!(p(10.0).divide(&p(5.0))?, p(2.0));
    assert_eq!(p(2.0).pow(&p(3.0))?, p(8.0));
    utils::assert_float_eq_f64(p(10.0).to_number()?, 0.1);
    Ok(())
}

#[test]
fn test_scalar_unwrap() -> ExResult<()> {
    let sin = |x: &Value| Ok(Value::Double(x.to_number()?.sin()));
    assert!(matches!(map_unwrapped(&int(1), &sin)?, Value::Double(_)));
    let res = map_unwrapped(&Value::Vector(vec![int(1)]), &sin)?;
    assert!(matches!(res, Value::Vector(v) if v.len() == 1));
    Ok(())
}
