use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
};

use lazy_static::lazy_static;

use crate::{
    arithmetic::{self, map_elementwise, map_f64, map_unwrapped, ArithOp},
    config::{AngleUnit, EvalConfig},
    exerr, ExError, ExResult, Rational, Value,
};

/// Priorities of binary operators. A binary operation with a higher number binds tighter.
pub const PRIO_LOGICAL: i32 = 1;
pub const PRIO_COMPARISON: i32 = 2;
pub const PRIO_ADDITIVE: i32 = 3;
pub const PRIO_MULTIPLICATIVE: i32 = 4;
pub const PRIO_POWER: i32 = 5;

/// Read-only state operators may consult while they are applied. Operators themselves are
/// immutable and shared between all evaluators.
#[derive(Clone, Copy, Debug)]
pub struct OpContext<'a> {
    pub angle_unit: AngleUnit,
    pub config: &'a EvalConfig,
}

impl<'a> OpContext<'a> {
    pub fn new(angle_unit: AngleUnit, config: &'a EvalConfig) -> Self {
        OpContext { angle_unit, config }
    }
}

pub type BinFn = fn(&Value, &Value, &OpContext) -> ExResult<Value>;
pub type UnaryFn = fn(&Value, &OpContext) -> ExResult<Value>;

/// A binary operator that consists of a function pointer and a priority.
#[derive(Copy, Clone)]
pub struct BinOp {
    /// Implementation of the binary operation.
    pub apply: BinFn,
    /// Priority of the binary operation, see the `PRIO_*` constants.
    pub prio: i32,
    /// `2^3^2` is `2^(3^2)` for right associative operators.
    pub is_right_assoc: bool,
}

impl Debug for BinOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "BinOp {{ prio: {}, is_right_assoc: {} }}",
            self.prio, self.is_right_assoc
        )
    }
}

/// Operators whose operand is not evaluated eagerly by the evaluator.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SpecialForm {
    /// `if(condition, then, else)` only evaluates the selected branch.
    Conditional,
    /// `convert(value, from_unit, to_unit)` takes bare unit names.
    Conversion,
}

/// An operator with all its textual spellings. The first spelling is the canonical one
/// that is used when expressions are unparsed.
#[derive(Copy, Clone)]
pub struct Operator {
    reprs: &'static [&'static str],
    bin_op: Option<BinOp>,
    unary_op: Option<UnaryFn>,
    special: Option<SpecialForm>,
}

fn make_op_not_available_error(repr: &str, kind: &str) -> ExError {
    exerr!(Syntax, "operator '{}' is not {}", repr, kind)
}

impl Operator {
    pub const fn make_bin(reprs: &'static [&'static str], bin_op: BinOp) -> Operator {
        Operator {
            reprs,
            bin_op: Some(bin_op),
            unary_op: None,
            special: None,
        }
    }
    pub const fn make_unary(reprs: &'static [&'static str], unary_op: UnaryFn) -> Operator {
        Operator {
            reprs,
            bin_op: None,
            unary_op: Some(unary_op),
            special: None,
        }
    }
    pub const fn make_bin_unary(
        reprs: &'static [&'static str],
        bin_op: BinOp,
        unary_op: UnaryFn,
    ) -> Operator {
        Operator {
            reprs,
            bin_op: Some(bin_op),
            unary_op: Some(unary_op),
            special: None,
        }
    }
    const fn make_special(
        reprs: &'static [&'static str],
        unary_op: UnaryFn,
        special: SpecialForm,
    ) -> Operator {
        Operator {
            reprs,
            bin_op: None,
            unary_op: Some(unary_op),
            special: Some(special),
        }
    }

    pub fn repr(&self) -> &'static str {
        self.reprs[0]
    }
    pub fn reprs(&self) -> &'static [&'static str] {
        self.reprs
    }
    pub fn bin(&self) -> ExResult<BinOp> {
        self.bin_op
            .ok_or_else(|| make_op_not_available_error(self.repr(), "binary"))
    }
    pub fn unary(&self) -> ExResult<UnaryFn> {
        self.unary_op
            .ok_or_else(|| make_op_not_available_error(self.repr(), "unary"))
    }
    pub fn has_bin(&self) -> bool {
        self.bin_op.is_some()
    }
    pub fn has_unary(&self) -> bool {
        self.unary_op.is_some()
    }
    pub fn special(&self) -> Option<SpecialForm> {
        self.special
    }

    /// Applies the binary variant to two operands and the unary variant to one operand.
    pub fn apply(&self, operands: &[Value], ctx: &OpContext) -> ExResult<Value> {
        match operands {
            [a, b] => (self.bin()?.apply)(a, b, ctx),
            [a] => (self.unary()?)(a, ctx),
            _ => Err(exerr!(
                Syntax,
                "operator '{}' takes one or two operands, got {}",
                self.repr(),
                operands.len()
            )),
        }
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.repr() == other.repr()
    }
}

impl Debug for Operator {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Operator {{ reprs: {:?}, bin_op: {:?}, has_unary: {}, special: {:?} }}",
            self.reprs,
            self.bin_op,
            self.has_unary(),
            self.special
        )
    }
}

const fn bin(apply: BinFn, prio: i32) -> BinOp {
    BinOp {
        apply,
        prio,
        is_right_assoc: false,
    }
}

pub(crate) fn truthy(v: &Value) -> ExResult<bool> {
    Ok(v.to_number()? != 0.0)
}

fn compare_with(a: &Value, b: &Value, accept: fn(Ordering) -> bool) -> ExResult<Value> {
    Ok(Value::Boolean(accept(a.compare(b)?)))
}

fn negate(v: &Value, _: &OpContext) -> ExResult<Value> {
    map_elementwise(v, &|x: &Value| {
        Ok(match x {
            Value::Rational(r) => Value::Rational(r.neg()),
            Value::Percent(magnitude) => Value::Percent(-magnitude),
            _ => Value::Double(-x.to_number()?),
        })
    })
}

fn abs(v: &Value, _: &OpContext) -> ExResult<Value> {
    map_elementwise(v, &|x: &Value| {
        Ok(match x {
            Value::Rational(r) => Value::Rational(r.abs()),
            Value::Percent(magnitude) => Value::Percent(magnitude.abs()),
            _ => Value::Double(x.to_number()?.abs()),
        })
    })
}

fn sign(v: &Value, _: &OpContext) -> ExResult<Value> {
    map_elementwise(v, &|x: &Value| {
        Ok(match x {
            Value::Rational(r) => Value::from(r.signum()),
            _ => {
                let x = x.to_number()?;
                // f64::signum maps 0 to 1
                Value::Double(if x == 0.0 { 0.0 } else { x.signum() })
            }
        })
    })
}

fn rounding(v: &Value, exact: fn(&Rational) -> Rational, float: fn(f64) -> f64) -> ExResult<Value> {
    map_elementwise(v, &|x: &Value| {
        Ok(match x {
            Value::Rational(r) => Value::Rational(exact(r)),
            _ => Value::Double(float(x.to_number()?)),
        })
    })
}

fn round_rational(r: &Rational) -> Rational {
    if r.is_integer() {
        *r
    } else {
        Rational::from_integer(r.to_f64().round() as i64)
    }
}

fn trig(v: &Value, ctx: &OpContext, f: fn(f64) -> f64) -> ExResult<Value> {
    let unit = ctx.angle_unit;
    map_unwrapped(v, &|x: &Value| {
        Ok(Value::Double(f(unit.to_radians(x.to_number()?))))
    })
}

fn inverse_trig(v: &Value, ctx: &OpContext, f: fn(f64) -> f64) -> ExResult<Value> {
    let unit = ctx.angle_unit;
    map_unwrapped(v, &|x: &Value| {
        Ok(Value::Double(unit.from_radians(f(x.to_number()?))))
    })
}

/// Largest `n` such that `n!` is finite as a double.
const MAX_FINITE_FACTORIAL: i64 = 170;

fn factorial(v: &Value, _: &OpContext) -> ExResult<Value> {
    map_elementwise(v, &|x: &Value| {
        let n = match x {
            Value::Rational(r) if r.is_integer() && r.numer() >= 0 => r.numer(),
            _ => {
                let f = x.to_number()?;
                if !(f >= 0.0 && f.fract() == 0.0) {
                    return Err(exerr!(
                        Arithmetic,
                        "factorial is only defined for non-negative integers, got {}",
                        x
                    ));
                }
                f.min((MAX_FINITE_FACTORIAL + 1) as f64) as i64
            }
        };
        if n > MAX_FINITE_FACTORIAL {
            return Ok(Value::Double(f64::INFINITY));
        }
        let exact = (2..=n).try_fold(1i64, |acc, k| acc.checked_mul(k));
        Ok(match exact {
            Some(res) => Value::from(res),
            None => Value::Double((2..=n).fold(1.0, |acc, k| acc * k as f64)),
        })
    })
}

fn to_rational(v: &Value, ctx: &OpContext) -> ExResult<Value> {
    let (epsilon, max_terms) = (ctx.config.rational_epsilon, ctx.config.rational_max_terms);
    map_elementwise(v, &|x: &Value| match x {
        Value::Rational(_) => Ok(x.clone()),
        _ => {
            let f = x.to_number()?;
            Rational::from_f64(f, epsilon, max_terms)
                .map(Value::Rational)
                .ok_or_else(|| exerr!(Arithmetic, "cannot approximate {} by a fraction", f))
        }
    })
}

fn leaves(v: &Value) -> ExResult<Vec<Value>> {
    match v {
        Value::Vector(elts) => {
            let nested = elts.iter().map(leaves).collect::<ExResult<Vec<_>>>()?;
            Ok(nested.into_iter().flatten().collect())
        }
        Value::Matrix(rows) => {
            let nested = rows
                .iter()
                .flatten()
                .map(leaves)
                .collect::<ExResult<Vec<_>>>()?;
            Ok(nested.into_iter().flatten().collect())
        }
        Value::Function(def) => Err(exerr!(
            TypeMismatch,
            "cannot reduce function '{}'",
            def.identifier
        )),
        _ => Ok(vec![v.clone()]),
    }
}

fn sum(v: &Value, _: &OpContext) -> ExResult<Value> {
    leaves(v)?
        .iter()
        .try_fold(Value::zero(), |acc, x| arithmetic::apply(ArithOp::Add, &acc, x))
}

fn extremum(v: &Value, wanted: Ordering) -> ExResult<Value> {
    let elts = leaves(v)?;
    let mut iter = elts.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| exerr!(NotANumber, "extremum of an empty vector"))?;
    iter.try_fold(first, |best, x| {
        Ok(if x.compare(&best)? == wanted { x } else { best })
    })
}

fn mean(v: &Value, ctx: &OpContext) -> ExResult<Value> {
    let n = leaves(v)?.len();
    if n == 0 {
        return Err(exerr!(NotANumber, "mean of an empty vector"));
    }
    arithmetic::apply(ArithOp::Div, &sum(v, ctx)?, &Value::from(n as i64))
}

fn transpose(v: &Value, _: &OpContext) -> ExResult<Value> {
    let rows = v.to_matrix()?;
    let n_cols = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let transposed = (0..n_cols)
        .map(|j| {
            rows.iter()
                .map(|row| row.get(j).cloned().unwrap_or_else(Value::zero))
                .collect()
        })
        .collect();
    Ok(Value::Matrix(transposed))
}

fn conditional(v: &Value, _: &OpContext) -> ExResult<Value> {
    match v {
        Value::Vector(elts) if elts.len() == 3 => {
            if truthy(&elts[0])? {
                Ok(elts[1].clone())
            } else {
                Ok(elts[2].clone())
            }
        }
        _ => Err(exerr!(
            TypeMismatch,
            "if expects (condition, then, else), got {}",
            v.type_name()
        )),
    }
}

fn conversion(v: &Value, _: &OpContext) -> ExResult<Value> {
    Err(exerr!(
        Conversion,
        "conversion needs bare unit names as in convert(value, from, to), got {}",
        v.type_name()
    ))
}

/// Returns the default operators.
///
/// |representation|description|
/// |--------------|-----------|
/// | `+`, `plus` | addition, unary plus |
/// | `-`, `minus` | subtraction, negation |
/// | `*`, `times`, `mul`, `multiply` | multiplication |
/// | `/`, `div`, `divide`, `over` | division |
/// | `^`, `**`, `pow` | power, right associative |
/// | `mod`, `rem` | remainder with the sign of the dividend |
/// | `==`, `!=`, `<`, `<=`, `>`, `>=` | comparison, result is a boolean |
/// | `and`, `&&`, `or`, <code>&#124;&#124;</code>, `not`, `!` | logic |
/// | `sin`, `cos`, `tan`, `asin`, `acos`, `atan` | trigonometry in the angle unit of the environment |
/// | `if` | `if(condition, then, else)` |
/// | `convert`, `to`, `in`, `as` | `convert(value, from_unit, to_unit)` |
///
/// Further unary operators are `sinh`, `cosh`, `tanh`, `sqrt`, `cbrt`, `exp`, `ln`, `log`,
/// `log10`, `log2`, `abs`, `sign`, `floor`, `ceil`, `round`, `trunc`, `fract`, `fact`,
/// `rational`, `deg`, `rad`, `sum`, `count`, `min`, `max`, `mean`, and `transpose`.
pub fn make_default_operators() -> Vec<Operator> {
    vec![
        Operator::make_bin_unary(
            &["+", "plus"],
            bin(|a, b, _| arithmetic::apply(ArithOp::Add, a, b), PRIO_ADDITIVE),
            |a, _| map_elementwise(a, &|x: &Value| Ok(x.clone())),
        ),
        Operator::make_bin_unary(
            &["-", "minus"],
            bin(|a, b, _| arithmetic::apply(ArithOp::Sub, a, b), PRIO_ADDITIVE),
            negate,
        ),
        Operator::make_bin(
            &["*", "times", "mul", "multiply"],
            bin(|a, b, _| arithmetic::apply(ArithOp::Mul, a, b), PRIO_MULTIPLICATIVE),
        ),
        Operator::make_bin(
            &["/", "div", "divide", "over"],
            bin(|a, b, _| arithmetic::apply(ArithOp::Div, a, b), PRIO_MULTIPLICATIVE),
        ),
        Operator::make_bin(
            &["mod", "rem"],
            bin(|a, b, _| arithmetic::apply(ArithOp::Rem, a, b), PRIO_MULTIPLICATIVE),
        ),
        Operator::make_bin(
            &["^", "**", "pow"],
            BinOp {
                apply: |a, b, _| arithmetic::apply(ArithOp::Pow, a, b),
                prio: PRIO_POWER,
                is_right_assoc: true,
            },
        ),
        Operator::make_bin(
            &["=="],
            bin(|a, b, _| compare_with(a, b, |o| o == Ordering::Equal), PRIO_COMPARISON),
        ),
        Operator::make_bin(
            &["!=", "<>"],
            bin(|a, b, _| compare_with(a, b, |o| o != Ordering::Equal), PRIO_COMPARISON),
        ),
        Operator::make_bin(
            &["<"],
            bin(|a, b, _| compare_with(a, b, |o| o == Ordering::Less), PRIO_COMPARISON),
        ),
        Operator::make_bin(
            &["<="],
            bin(|a, b, _| compare_with(a, b, |o| o != Ordering::Greater), PRIO_COMPARISON),
        ),
        Operator::make_bin(
            &[">"],
            bin(|a, b, _| compare_with(a, b, |o| o == Ordering::Greater), PRIO_COMPARISON),
        ),
        Operator::make_bin(
            &[">="],
            bin(|a, b, _| compare_with(a, b, |o| o != Ordering::Less), PRIO_COMPARISON),
        ),
        Operator::make_bin(
            &["and", "&&"],
            bin(|a, b, _| Ok(Value::Boolean(truthy(a)? && truthy(b)?)), PRIO_LOGICAL),
        ),
        Operator::make_bin(
            &["or", "||"],
            bin(|a, b, _| Ok(Value::Boolean(truthy(a)? || truthy(b)?)), PRIO_LOGICAL),
        ),
        Operator::make_unary(&["not", "!"], |a, _| {
            map_elementwise(a, &|x: &Value| Ok(Value::Boolean(!truthy(x)?)))
        }),
        Operator::make_unary(&["sin"], |a, ctx| trig(a, ctx, f64::sin)),
        Operator::make_unary(&["cos"], |a, ctx| trig(a, ctx, f64::cos)),
        Operator::make_unary(&["tan"], |a, ctx| trig(a, ctx, f64::tan)),
        Operator::make_unary(&["asin", "arcsin"], |a, ctx| inverse_trig(a, ctx, f64::asin)),
        Operator::make_unary(&["acos", "arccos"], |a, ctx| inverse_trig(a, ctx, f64::acos)),
        Operator::make_unary(&["atan", "arctan"], |a, ctx| inverse_trig(a, ctx, f64::atan)),
        Operator::make_unary(&["sinh"], |a, _| map_f64(a, f64::sinh)),
        Operator::make_unary(&["cosh"], |a, _| map_f64(a, f64::cosh)),
        Operator::make_unary(&["tanh"], |a, _| map_f64(a, f64::tanh)),
        Operator::make_unary(&["sqrt"], |a, _| map_f64(a, f64::sqrt)),
        Operator::make_unary(&["cbrt"], |a, _| map_f64(a, f64::cbrt)),
        Operator::make_unary(&["exp"], |a, _| map_f64(a, f64::exp)),
        Operator::make_unary(&["ln", "log"], |a, _| map_f64(a, f64::ln)),
        Operator::make_unary(&["log10", "lg"], |a, _| map_f64(a, f64::log10)),
        Operator::make_unary(&["log2", "lb"], |a, _| map_f64(a, f64::log2)),
        Operator::make_unary(&["abs"], abs),
        Operator::make_unary(&["sign", "signum", "sgn"], sign),
        Operator::make_unary(&["floor"], |a, _| rounding(a, Rational::floor, f64::floor)),
        Operator::make_unary(&["ceil"], |a, _| rounding(a, Rational::ceil, f64::ceil)),
        Operator::make_unary(&["round"], |a, _| rounding(a, round_rational, f64::round)),
        Operator::make_unary(&["trunc"], |a, _| rounding(a, Rational::trunc, f64::trunc)),
        Operator::make_unary(&["fract"], |a, _| map_f64(a, f64::fract)),
        Operator::make_unary(&["fact", "factorial"], factorial),
        Operator::make_unary(&["rational", "frac"], to_rational),
        Operator::make_unary(&["deg", "degrees"], |a, _| map_f64(a, f64::to_degrees)),
        Operator::make_unary(&["rad", "radians"], |a, _| map_f64(a, f64::to_radians)),
        Operator::make_unary(&["sum"], sum),
        Operator::make_unary(&["count", "len", "length"], |a, _| {
            Ok(Value::from(leaves(a)?.len() as i64))
        }),
        Operator::make_unary(&["min"], |a, _| extremum(a, Ordering::Less)),
        Operator::make_unary(&["max"], |a, _| extremum(a, Ordering::Greater)),
        Operator::make_unary(&["mean", "avg", "average"], mean),
        Operator::make_unary(&["transpose", "trans"], transpose),
        Operator::make_special(&["if"], conditional, SpecialForm::Conditional),
        Operator::make_special(
            &["convert", "to", "in", "as"],
            conversion,
            SpecialForm::Conversion,
        ),
    ]
}

lazy_static! {
    static ref OPERATORS: Vec<Operator> = make_default_operators();
    static ref ALIASES: HashMap<String, usize> = {
        let mut aliases = HashMap::new();
        for (idx, op) in OPERATORS.iter().enumerate() {
            for repr in op.reprs() {
                aliases.insert(repr.to_lowercase(), idx);
            }
        }
        aliases
    };
    static ref SYMBOLIC_REPRS: Vec<&'static str> = {
        let mut reprs = OPERATORS
            .iter()
            .flat_map(|op| op.reprs().iter().copied())
            .filter(|repr| !repr.starts_with(|c: char| c.is_ascii_alphabetic()))
            .collect::<Vec<_>>();
        // longest match first such that `**` is not read as two `*`
        reprs.sort_unstable_by(|r1, r2| r2.len().cmp(&r1.len()).then(r1.cmp(r2)));
        reprs
    };
}

/// All operators shared by every evaluator.
pub fn operators() -> &'static [Operator] {
    &OPERATORS
}

/// Looks up an operator by one of its spellings, case-insensitively.
pub fn find_operator(alias: &str) -> Option<&'static Operator> {
    ALIASES
        .get(&alias.to_lowercase())
        .map(|idx| &OPERATORS[*idx])
}

/// Spellings of operators that do not start with a letter, longest first.
pub fn symbolic_reprs() -> &'static [&'static str] {
    &SYMBOLIC_REPRS
}
