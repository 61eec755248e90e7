use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    arithmetic::{self, ArithOp},
    exerr,
    expression::Node,
    ExResult, Rational,
};

/// A user-defined function `identifier(params) := body`. The body is evaluated with the
/// parameters bound to the arguments on top of the global environment.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionDef {
    pub identifier: String,
    pub params: Vec<String>,
    pub body: Node,
}

impl Display for FunctionDef {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{}({}) := {}",
            self.identifier,
            self.params.join(", "),
            self.body
        )
    }
}

/// Resolved result of evaluating a [`Node`](crate::Node).
///
/// The variants form a numeric tower. Two rationals combine exactly, a rational and a double
/// combine to a double. Percentages store their raw magnitude, i.e., `Percent(10.0)` is worth
/// `0.1`. Booleans behave like `0` and `1` in arithmetic.
///
/// ```rust
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// #
/// use calcex::Value;
/// let sum = Value::Percent(10.0).add(&Value::Percent(5.0))?;
/// assert_eq!(sum, Value::Percent(15.0));
/// assert_eq!(Value::Percent(10.0).to_number()?, 0.1);
/// let padded = Value::from(vec![1.0, 2.0, 3.0]).add(&Value::from(vec![10.0, 20.0]))?;
/// assert_eq!(padded, Value::from(vec![11.0, 22.0, 3.0]));
/// #
/// #     Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Double(f64),
    Rational(Rational),
    Percent(f64),
    Boolean(bool),
    Vector(Vec<Value>),
    Matrix(Vec<Vec<Value>>),
    Function(Box<FunctionDef>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Double(_) => "double",
            Value::Rational(_) => "rational",
            Value::Percent(_) => "percent",
            Value::Boolean(_) => "boolean",
            Value::Vector(_) => "vector",
            Value::Matrix(_) => "matrix",
            Value::Function(_) => "function",
        }
    }

    pub fn zero() -> Value {
        Value::Rational(Rational::zero())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Double(_) | Value::Rational(_) | Value::Percent(_) | Value::Boolean(_)
        )
    }

    /// Coerces into a double. Vectors and matrices reduce to the sum of their elements.
    ///
    /// # Errors
    ///
    /// Functions have no numeric representation.
    pub fn to_number(&self) -> ExResult<f64> {
        match self {
            Value::Double(x) => Ok(*x),
            Value::Rational(r) => Ok(r.to_f64()),
            Value::Percent(magnitude) => Ok(magnitude / 100.0),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Vector(elts) => elts.iter().map(|v| v.to_number()).sum(),
            Value::Matrix(rows) => rows.iter().flatten().map(|v| v.to_number()).sum(),
            Value::Function(def) => Err(exerr!(
                TypeMismatch,
                "function '{}' cannot be used as a number",
                def.identifier
            )),
        }
    }

    /// Coerces into a vector. A scalar becomes a vector with one element, the rows of a
    /// matrix become vector elements.
    pub fn to_vector(&self) -> ExResult<Vec<Value>> {
        match self {
            Value::Vector(elts) => Ok(elts.clone()),
            Value::Matrix(rows) => Ok(rows.iter().cloned().map(Value::Vector).collect()),
            Value::Function(def) => Err(exerr!(
                TypeMismatch,
                "function '{}' cannot be used as a vector",
                def.identifier
            )),
            scalar => Ok(vec![scalar.clone()]),
        }
    }

    /// Coerces into a matrix. A vector of vectors becomes a matrix with one row per element,
    /// any other vector becomes a matrix with one row, a scalar a 1x1 matrix.
    pub fn to_matrix(&self) -> ExResult<Vec<Vec<Value>>> {
        match self {
            Value::Matrix(rows) => Ok(rows.clone()),
            Value::Vector(elts) if !elts.is_empty() && elts.iter().all(|e| matches!(e, Value::Vector(_))) => {
                elts.iter().map(|e| e.to_vector()).collect()
            }
            Value::Vector(elts) => Ok(vec![elts.clone()]),
            Value::Function(def) => Err(exerr!(
                TypeMismatch,
                "function '{}' cannot be used as a matrix",
                def.identifier
            )),
            scalar => Ok(vec![vec![scalar.clone()]]),
        }
    }

    /// Orders two values. Exact for two rationals, otherwise the values are coerced with
    /// [`to_number`](Value::to_number) which reduces vectors and matrices to their sums.
    ///
    /// # Errors
    ///
    /// Functions cannot be ordered and neither can `NaN`.
    pub fn compare(&self, other: &Value) -> ExResult<Ordering> {
        match (self, other) {
            (Value::Rational(a), Value::Rational(b)) => Ok(a.cmp(b)),
            (Value::Percent(a), Value::Percent(b)) => a
                .partial_cmp(b)
                .ok_or_else(|| exerr!(NotANumber, "cannot order {}% and {}%", a, b)),
            _ => {
                let (a, b) = (self.to_number()?, other.to_number()?);
                a.partial_cmp(&b)
                    .ok_or_else(|| exerr!(NotANumber, "cannot order {} and {}", a, b))
            }
        }
    }

    pub fn add(&self, other: &Value) -> ExResult<Value> {
        arithmetic::apply(ArithOp::Add, self, other)
    }
    pub fn subtract(&self, other: &Value) -> ExResult<Value> {
        arithmetic::apply(ArithOp::Sub, self, other)
    }
    pub fn multiply(&self, other: &Value) -> ExResult<Value> {
        arithmetic::apply(ArithOp::Mul, self, other)
    }
    pub fn divide(&self, other: &Value) -> ExResult<Value> {
        arithmetic::apply(ArithOp::Div, self, other)
    }
    pub fn pow(&self, other: &Value) -> ExResult<Value> {
        arithmetic::apply(ArithOp::Pow, self, other)
    }
}

/// Structural equality. Vectors are equal if they have the same length and pairwise equal
/// elements, there is no reduction to sums as in [`compare`](Value::compare). Scalars of
/// different variants are compared by their numeric value.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Rational(a), Value::Rational(b)) => a == b,
            (Value::Percent(a), Value::Percent(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Matrix(a), Value::Matrix(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (a, b) if a.is_scalar() && b.is_scalar() => match (a.to_number(), b.to_number()) {
                (Ok(x), Ok(y)) => x == y,
                _ => false,
            },
            _ => false,
        }
    }
}

fn write_elts(f: &mut Formatter, elts: &[Value]) -> fmt::Result {
    write!(f, "{{")?;
    for (i, elt) in elts.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", elt)?;
    }
    write!(f, "}}")
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Double(x) => write!(f, "{:?}", x),
            Value::Rational(r) => write!(f, "{}", r),
            Value::Percent(magnitude) => write!(f, "{}%", magnitude),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Vector(elts) => write_elts(f, elts),
            Value::Matrix(rows) => {
                write!(f, "{{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_elts(f, row)?;
                }
                write!(f, "}}")
            }
            Value::Function(def) => write!(f, "{}", def),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Rational(Rational::from_integer(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Rational> for Value {
    fn from(r: Rational) -> Self {
        Value::Rational(r)
    }
}

impl From<Vec<f64>> for Value {
    fn from(elts: Vec<f64>) -> Self {
        Value::Vector(elts.into_iter().map(Value::Double).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(elts: Vec<Value>) -> Self {
        Value::Vector(elts)
    }
}

impl From<FunctionDef> for Value {
    fn from(def: FunctionDef) -> Self {
        Value::Function(Box::new(def))
    }
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use crate::{expression::Node, ExErrorKind, FunctionDef, Rational, Value};

    fn int(n: i64) -> Value {
        Value::from(n)
    }

    fn rat(n: i64, d: i64) -> Value {
        Value::Rational(Rational::new(n, d).unwrap())
    }

    fn function() -> Value {
        Value::from(FunctionDef {
            identifier: "f".to_string(),
            params: vec!["x".to_string()],
            body: Node::Variable("x".to_string()),
        })
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::Double(2.5).to_number().unwrap(), 2.5);
        assert_eq!(rat(1, 4).to_number().unwrap(), 0.25);
        assert_eq!(Value::Percent(10.0).to_number().unwrap(), 0.1);
        assert_eq!(Value::Boolean(true).to_number().unwrap(), 1.0);
        assert_eq!(Value::from(vec![1.0, 2.0, 3.5]).to_number().unwrap(), 6.5);
        let m = Value::Matrix(vec![vec![int(1), int(2)], vec![int(3), int(4)]]);
        assert_eq!(m.to_number().unwrap(), 10.0);
        assert_eq!(
            function().to_number().unwrap_err().kind,
            ExErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_to_vector_matrix() {
        assert_eq!(Value::Double(2.0).to_vector().unwrap(), vec![Value::Double(2.0)]);
        assert_eq!(
            Value::Double(2.0).to_matrix().unwrap(),
            vec![vec![Value::Double(2.0)]]
        );
        let nested = Value::Vector(vec![
            Value::from(vec![1.0, 2.0]),
            Value::from(vec![3.0]),
        ]);
        let m = nested.to_matrix().unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m[1], vec![Value::Double(3.0)]);
        let flat = Value::from(vec![1.0, 2.0]).to_matrix().unwrap();
        assert_eq!(flat, vec![vec![Value::Double(1.0), Value::Double(2.0)]]);
        let rows = Value::Matrix(m).to_vector().unwrap();
        assert_eq!(rows[0], Value::from(vec![1.0, 2.0]));
        assert!(function().to_vector().is_err());
    }

    #[test]
    fn test_compare_and_equals() {
        assert_eq!(rat(1, 3).compare(&rat(1, 2)).unwrap(), Ordering::Less);
        assert_eq!(
            Value::Double(0.5).compare(&rat(1, 2)).unwrap(),
            Ordering::Equal
        );
        // ordering reduces to sums, equality does not
        let a = Value::from(vec![1.0, 2.0]);
        let b = Value::from(vec![3.0]);
        assert_eq!(a.compare(&b).unwrap(), Ordering::Equal);
        assert_ne!(a, b);
        assert_ne!(Value::from(vec![1.0, 2.0]), Value::from(vec![2.0, 1.0]));
        assert_eq!(Value::from(vec![1.0, 2.0]), Value::Vector(vec![int(1), int(2)]));
        assert_eq!(Value::Boolean(true), Value::Double(1.0));
        assert_ne!(Value::Double(3.0), Value::from(vec![3.0]));
        assert!(Value::Double(f64::NAN).compare(&Value::Double(1.0)).is_err());
        assert!(function().compare(&Value::Double(1.0)).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Double(2.0)), "2.0");
        assert_eq!(format!("{}", rat(2, 4)), "1/2");
        assert_eq!(format!("{}", Value::Percent(12.5)), "12.5%");
        assert_eq!(format!("{}", Value::Vector(vec![int(1), rat(1, 2)])), "{1, 1/2}");
        let m = Value::Matrix(vec![vec![int(1), int(2)], vec![int(3), int(4)]]);
        assert_eq!(format!("{}", m), "{{1, 2}, {3, 4}}");
        assert_eq!(format!("{}", function()), "f(x) := x");
    }
}
