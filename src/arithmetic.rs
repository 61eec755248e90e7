//! Double dispatch of the arithmetic operators over the numeric tower.
//!
//! The overload is chosen by the runtime variant of the right operand in the fixed order
//! vector, matrix, percent, number and then by the variant of the left operand.
//! Structures of different sizes are padded with zeros before elementwise application.

use crate::{exerr, ExError, ExResult, Rational, Value};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Rem,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Pow => "^",
            ArithOp::Rem => "mod",
        }
    }

    fn apply_f64(&self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Pow => a.powf(b),
            ArithOp::Rem => a % b,
        }
    }

    fn apply_rational(&self, a: &Rational, b: &Rational) -> Option<Rational> {
        match self {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Div => a.checked_div(b),
            ArithOp::Pow => a.checked_pow(b),
            ArithOp::Rem => a.checked_rem(b),
        }
    }
}

fn mismatch(op: ArithOp, a: &Value, b: &Value) -> ExError {
    exerr!(
        TypeMismatch,
        "cannot apply '{}' to {} and {}",
        op.symbol(),
        a.type_name(),
        b.type_name()
    )
}

/// Applies `op` to `a` and `b`.
///
/// ```rust
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// #
/// use calcex::{arithmetic::{apply, ArithOp}, Rational, Value};
/// let third = Value::Rational(Rational::new(1, 3)?);
/// let res = apply(ArithOp::Add, &third, &third)?;
/// assert_eq!(res, Value::Rational(Rational::new(2, 3)?));
/// let res = apply(ArithOp::Mul, &Value::from(2i64), &Value::from(vec![1.0, 2.0]))?;
/// assert_eq!(res, Value::from(vec![2.0, 4.0]));
/// #
/// #     Ok(())
/// # }
/// ```
///
/// # Errors
///
/// A [`TypeMismatch`](crate::ExErrorKind::TypeMismatch) that names both operand types if a
/// function takes part.
pub fn apply(op: ArithOp, a: &Value, b: &Value) -> ExResult<Value> {
    match b {
        Value::Vector(bs) => with_vector(op, a, b, bs),
        Value::Matrix(bm) => with_matrix(op, a, b, bm),
        Value::Percent(pb) => with_percent(op, a, b, *pb),
        Value::Double(_) | Value::Rational(_) | Value::Boolean(_) => with_number(op, a, b),
        Value::Function(_) => Err(mismatch(op, a, b)),
    }
}

fn broadcast_left(op: ArithOp, elts: &[Value], b: &Value) -> ExResult<Vec<Value>> {
    elts.iter().map(|x| apply(op, x, b)).collect()
}

fn broadcast_right(op: ArithOp, a: &Value, elts: &[Value]) -> ExResult<Vec<Value>> {
    elts.iter().map(|y| apply(op, a, y)).collect()
}

fn broadcast_matrix_left(op: ArithOp, rows: &[Vec<Value>], b: &Value) -> ExResult<Value> {
    rows.iter()
        .map(|row| broadcast_left(op, row, b))
        .collect::<ExResult<Vec<_>>>()
        .map(Value::Matrix)
}

fn broadcast_matrix_right(op: ArithOp, a: &Value, rows: &[Vec<Value>]) -> ExResult<Value> {
    rows.iter()
        .map(|row| broadcast_right(op, a, row))
        .collect::<ExResult<Vec<_>>>()
        .map(Value::Matrix)
}

/// Elementwise application after padding the shorter side with zeros up to `len`.
fn zip_padded(op: ArithOp, xs: &[Value], ys: &[Value], len: usize) -> ExResult<Vec<Value>> {
    let zero = Value::zero();
    (0..len)
        .map(|i| apply(op, xs.get(i).unwrap_or(&zero), ys.get(i).unwrap_or(&zero)))
        .collect()
}

fn zip_matrices(op: ArithOp, am: &[Vec<Value>], bm: &[Vec<Value>]) -> ExResult<Value> {
    let n_rows = am.len().max(bm.len());
    let n_cols = am.iter().chain(bm.iter()).map(|row| row.len()).max().unwrap_or(0);
    let empty: Vec<Value> = vec![];
    (0..n_rows)
        .map(|i| {
            let ra = am.get(i).unwrap_or(&empty);
            let rb = bm.get(i).unwrap_or(&empty);
            zip_padded(op, ra, rb, n_cols)
        })
        .collect::<ExResult<Vec<_>>>()
        .map(Value::Matrix)
}

fn with_vector(op: ArithOp, a: &Value, b: &Value, bs: &[Value]) -> ExResult<Value> {
    match a {
        Value::Vector(xs) => zip_padded(op, xs, bs, xs.len().max(bs.len())).map(Value::Vector),
        Value::Matrix(am) => zip_matrices(op, am, &b.to_matrix()?),
        Value::Function(_) => Err(mismatch(op, a, b)),
        _ => broadcast_right(op, a, bs).map(Value::Vector),
    }
}

fn with_matrix(op: ArithOp, a: &Value, b: &Value, bm: &[Vec<Value>]) -> ExResult<Value> {
    match a {
        Value::Matrix(am) => zip_matrices(op, am, bm),
        Value::Vector(_) => zip_matrices(op, &a.to_matrix()?, bm),
        Value::Function(_) => Err(mismatch(op, a, b)),
        _ => broadcast_matrix_right(op, a, bm),
    }
}

fn percent_with_percent(op: ArithOp, pa: f64, pb: f64) -> Value {
    // percentages combine on their raw magnitudes
    Value::Percent(op.apply_f64(pa, pb))
}

fn with_percent(op: ArithOp, a: &Value, b: &Value, pb: f64) -> ExResult<Value> {
    match a {
        Value::Percent(pa) => Ok(percent_with_percent(op, *pa, pb)),
        Value::Vector(xs) => broadcast_left(op, xs, b).map(Value::Vector),
        Value::Matrix(am) => broadcast_matrix_left(op, am, b),
        Value::Function(_) => Err(mismatch(op, a, b)),
        Value::Double(_) | Value::Rational(_) | Value::Boolean(_) => {
            Ok(Value::Double(op.apply_f64(a.to_number()?, pb / 100.0)))
        }
    }
}

fn with_number(op: ArithOp, a: &Value, b: &Value) -> ExResult<Value> {
    match (a, b) {
        (Value::Vector(xs), _) => broadcast_left(op, xs, b).map(Value::Vector),
        (Value::Matrix(am), _) => broadcast_matrix_left(op, am, b),
        (Value::Function(_), _) => Err(mismatch(op, a, b)),
        (Value::Rational(ra), Value::Rational(rb)) => Ok(match op.apply_rational(ra, rb) {
            Some(exact) => Value::Rational(exact),
            None => Value::Double(op.apply_f64(ra.to_f64(), rb.to_f64())),
        }),
        _ => Ok(Value::Double(op.apply_f64(a.to_number()?, b.to_number()?))),
    }
}

/// Applies `f` to every scalar leaf of a possibly nested vector or matrix and keeps the shape.
/// Scalars are passed to `f` directly.
pub fn map_elementwise<F>(value: &Value, f: &F) -> ExResult<Value>
where
    F: Fn(&Value) -> ExResult<Value>,
{
    match value {
        Value::Vector(elts) => elts
            .iter()
            .map(|e| map_elementwise(e, f))
            .collect::<ExResult<Vec<_>>>()
            .map(Value::Vector),
        Value::Matrix(rows) => rows
            .iter()
            .map(|row| row.iter().map(|e| map_elementwise(e, f)).collect())
            .collect::<ExResult<Vec<_>>>()
            .map(Value::Matrix),
        Value::Function(def) => Err(exerr!(
            TypeMismatch,
            "cannot apply an elementwise operator to function '{}'",
            def.identifier
        )),
        _ => f(value),
    }
}

/// Elementwise application of a function on doubles.
pub fn map_f64(value: &Value, f: fn(f64) -> f64) -> ExResult<Value> {
    map_elementwise(value, &|x: &Value| Ok(Value::Double(f(x.to_number()?))))
}

/// Wraps the argument into a vector, maps it elementwise, and unwraps a one-element result
/// if the argument was a scalar in the first place. Matrices keep their shape.
pub fn map_unwrapped<F>(value: &Value, f: &F) -> ExResult<Value>
where
    F: Fn(&Value) -> ExResult<Value>,
{
    if let Value::Matrix(_) = value {
        return map_elementwise(value, f);
    }
    let mut mapped = value
        .to_vector()?
        .iter()
        .map(|e| map_elementwise(e, f))
        .collect::<ExResult<Vec<_>>>()?;
    if mapped.len() == 1 && value.is_scalar() {
        Ok(mapped.remove(0))
    } else {
        Ok(Value::Vector(mapped))
    }
}

#[cfg(test)]
mod test {
    use super::{apply, map_f64, map_unwrapped, ArithOp};
    use crate::{expression::Node, ExErrorKind, FunctionDef, Rational, Value};

    const ALL_OPS: [ArithOp; 6] = [
        ArithOp::Add,
        ArithOp::Sub,
        ArithOp::Mul,
        ArithOp::Div,
        ArithOp::Pow,
        ArithOp::Rem,
    ];

    fn int(n: i64) -> Value {
        Value::from(n)
    }

    fn rat(n: i64, d: i64) -> Value {
        Value::Rational(Rational::new(n, d).unwrap())
    }

    fn vec_of(elts: &[Value]) -> Value {
        Value::Vector(elts.to_vec())
    }

    #[test]
    fn test_rational_exactness() {
        let third = rat(1, 3);
        let sum = apply(ArithOp::Add, &apply(ArithOp::Add, &third, &third).unwrap(), &third).unwrap();
        assert!(matches!(sum, Value::Rational(_)));
        assert_eq!(sum, int(1));
        assert_eq!(apply(ArithOp::Div, &int(1), &int(3)).unwrap(), third);
        assert_eq!(apply(ArithOp::Pow, &rat(2, 3), &int(2)).unwrap(), rat(4, 9));
    }

    #[test]
    fn test_widening_to_double() {
        let res = apply(ArithOp::Add, &rat(1, 2), &Value::Double(0.25)).unwrap();
        assert!(matches!(res, Value::Double(x) if x == 0.75));
        let res = apply(ArithOp::Add, &Value::Boolean(true), &int(1)).unwrap();
        assert!(matches!(res, Value::Double(x) if x == 2.0));
        // non-integral exponent and overflow fall back to floating point
        let res = apply(ArithOp::Pow, &int(4), &rat(1, 2)).unwrap();
        assert!(matches!(res, Value::Double(x) if x == 2.0));
        let res = apply(ArithOp::Mul, &int(i64::MAX), &int(2)).unwrap();
        assert!(matches!(res, Value::Double(_)));
        let res = apply(ArithOp::Div, &int(1), &int(0)).unwrap();
        assert!(matches!(res, Value::Double(x) if x.is_infinite()));
    }

    #[test]
    fn test_percent() {
        let p10 = Value::Percent(10.0);
        let p5 = Value::Percent(5.0);
        assert_eq!(apply(ArithOp::Add, &p10, &p5).unwrap(), Value::Percent(15.0));
        assert_eq!(apply(ArithOp::Sub, &p10, &p5).unwrap(), Value::Percent(5.0));
        assert_eq!(apply(ArithOp::Mul, &p10, &p5).unwrap(), Value::Percent(50.0));
        assert_eq!(apply(ArithOp::Div, &p10, &p5).unwrap(), Value::Percent(2.0));
        assert_eq!(
            apply(ArithOp::Pow, &p10, &Value::Percent(2.0)).unwrap(),
            Value::Percent(100.0)
        );
        let res = apply(ArithOp::Mul, &int(200), &p10).unwrap();
        assert!(matches!(res, Value::Double(x) if (x - 20.0).abs() < 1e-12));
        let res = apply(ArithOp::Add, &p10, &int(1)).unwrap();
        assert!(matches!(res, Value::Double(x) if (x - 1.1).abs() < 1e-12));
    }

    #[test]
    fn test_broadcast() {
        for op in ALL_OPS {
            let five = int(5);
            let (a, b) = (rat(3, 2), Value::Double(0.5));
            let res = apply(op, &five, &vec_of(&[a.clone(), b.clone()])).unwrap();
            let reference = vec_of(&[apply(op, &five, &a).unwrap(), apply(op, &five, &b).unwrap()]);
            assert_eq!(res, reference);
            let res = apply(op, &vec_of(&[a.clone(), b.clone()]), &five).unwrap();
            let reference = vec_of(&[apply(op, &a, &five).unwrap(), apply(op, &b, &five).unwrap()]);
            assert_eq!(res, reference);
        }
        let m = Value::Matrix(vec![vec![int(1), int(2)], vec![int(3), int(4)]]);
        let res = apply(ArithOp::Mul, &int(2), &m).unwrap();
        assert_eq!(
            res,
            Value::Matrix(vec![vec![int(2), int(4)], vec![int(6), int(8)]])
        );
        let res = apply(ArithOp::Add, &m, &Value::Percent(50.0)).unwrap();
        assert!(matches!(res, Value::Matrix(ref rows) if rows[1][1] == Value::Double(4.5)));
    }

    #[test]
    fn test_zero_padding() {
        let a = vec_of(&[int(1), int(2), int(3)]);
        let b = vec_of(&[int(10), int(20)]);
        assert_eq!(
            apply(ArithOp::Add, &a, &b).unwrap(),
            vec_of(&[int(11), int(22), int(3)])
        );
        assert_eq!(
            apply(ArithOp::Sub, &b, &a).unwrap(),
            vec_of(&[int(9), int(18), int(-3)])
        );
        let am = Value::Matrix(vec![vec![int(1), int(2)], vec![int(3), int(4)]]);
        let bm = Value::Matrix(vec![vec![int(1)]]);
        assert_eq!(
            apply(ArithOp::Add, &am, &bm).unwrap(),
            Value::Matrix(vec![vec![int(2), int(2)], vec![int(3), int(4)]])
        );
    }

    #[test]
    fn test_nested_recursion() {
        let a = vec_of(&[int(1), vec_of(&[int(2), int(3)])]);
        let b = vec_of(&[int(10), vec_of(&[int(20)])]);
        assert_eq!(
            apply(ArithOp::Add, &a, &b).unwrap(),
            vec_of(&[int(11), vec_of(&[int(22), int(3)])])
        );
        let res = apply(ArithOp::Mul, &a, &int(2)).unwrap();
        assert_eq!(res, vec_of(&[int(2), vec_of(&[int(4), int(6)])]));
    }

    #[test]
    fn test_dispatch_order() {
        // the right operand decides first, a vector on the right wins over a percent on the left
        let res = apply(ArithOp::Add, &Value::Percent(10.0), &vec_of(&[Value::Percent(5.0)])).unwrap();
        assert_eq!(res, vec_of(&[Value::Percent(15.0)]));
        // matrix on the left and vector on the right combine as matrices
        let m = Value::Matrix(vec![vec![int(1), int(2)], vec![int(3), int(4)]]);
        let res = apply(ArithOp::Add, &m, &vec_of(&[int(10), int(20)])).unwrap();
        assert_eq!(
            res,
            Value::Matrix(vec![vec![int(11), int(22)], vec![int(3), int(4)]])
        );
        let res = apply(ArithOp::Add, &vec_of(&[int(10), int(20)]), &m).unwrap();
        assert!(matches!(res, Value::Matrix(_)));
    }

    #[test]
    fn test_function_mismatch() {
        let f = Value::from(FunctionDef {
            identifier: "f".to_string(),
            params: vec![],
            body: Node::Literal(int(1)),
        });
        for (a, b) in [(&f, &f), (&f, &int(1)), (&int(1), &f), (&Value::Percent(1.0), &f)] {
            let err = apply(ArithOp::Add, a, b).unwrap_err();
            assert_eq!(err.kind, ExErrorKind::TypeMismatch);
            assert!(err.msg.contains(a.type_name()));
            assert!(err.msg.contains(b.type_name()));
        }
        let err = apply(ArithOp::Add, &vec_of(&[int(1)]), &f).unwrap_err();
        assert_eq!(err.kind, ExErrorKind::TypeMismatch);
    }

    #[test]
    fn test_maps() {
        let res = map_f64(&vec_of(&[int(1), vec_of(&[int(4)])]), f64::sqrt).unwrap();
        assert_eq!(res, vec_of(&[Value::Double(1.0), vec_of(&[Value::Double(2.0)])]));
        let negate = |x: &Value| Ok(Value::Double(-x.to_number()?));
        let res = map_unwrapped(&int(3), &negate).unwrap();
        assert!(matches!(res, Value::Double(x) if x == -3.0));
        let res = map_unwrapped(&vec_of(&[int(3)]), &negate).unwrap();
        assert_eq!(res, vec_of(&[Value::Double(-3.0)]));
        let m = Value::Matrix(vec![vec![int(1)]]);
        assert!(matches!(map_unwrapped(&m, &negate).unwrap(), Value::Matrix(_)));
    }
}
