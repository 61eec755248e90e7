use crate::ExResult;

/// Bridge to an external unit-conversion service used by `convert(value, from, to)` and its
/// aliases `to`, `in`, and `as`.
///
/// Closures with the signature of [`convert`](UnitConverter::convert) implement the trait.
/// ```rust
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// #
/// use calcex::{exerr, Evaluator};
/// let mut evaluator = Evaluator::new();
/// evaluator.set_converter(|x: f64, from: &str, to: &str| match (from, to) {
///     ("km", "m") => Ok(x * 1000.0),
///     _ => Err(exerr!(Conversion, "cannot convert {} to {}", from, to)),
/// });
/// assert_eq!(evaluator.evaluate_to_double("to(1.5, km, m)")?, 1500.0);
/// assert!(evaluator.evaluate_to_double("to(1.5, m, km)").is_err());
/// #
/// #     Ok(())
/// # }
/// ```
pub trait UnitConverter {
    /// Converts `value` given in unit `from` into unit `to`.
    fn convert(&self, value: f64, from: &str, to: &str) -> ExResult<f64>;
}

impl<F> UnitConverter for F
where
    F: Fn(f64, &str, &str) -> ExResult<f64>,
{
    fn convert(&self, value: f64, from: &str, to: &str) -> ExResult<f64> {
        self(value, from, to)
    }
}
