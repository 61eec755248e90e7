#![doc(html_root_url = "https://docs.rs/calcex/0.1.0")]
//! Calcex is a small embeddable language for mathematical expressions. Formulas are parsed
//! into trees and evaluated to typed values within an [`Evaluator`] that holds variables,
//! user-defined functions, and the angle unit of trigonometric operators.
//! ```rust
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! #
//! use calcex::{eval_str, Evaluator, Value};
//! assert_eq!(eval_str("5^7/5^3")?, 625.0);
//!
//! let mut evaluator = Evaluator::new();
//! evaluator.bind("x", 2.0)?;
//! assert_eq!(evaluator.evaluate_to_double("x over 4 + 10%")?, 0.6);
//! #
//! #     Ok(())
//! # }
//! ```
//!
//! ## Values
//!
//! Integer literals such as `3` are exact rationals, `1/3 + 1/3 + 1/3` evaluates to exactly
//! `1`. Literals with a decimal point or an exponent are doubles. A rational combined with a
//! double results in a double. Literals with a `%`-suffix are percentages that are added
//! and subtracted on their magnitudes, i.e., `10% + 5%` is `15%`, whereas `2 * 10%` is `0.2`.
//! Vectors are written as `{1, 2, 3}` and matrices as vectors of vectors
//! `{{1, 2}, {3, 4}}`. Scalars are broadcast to all elements of vectors and matrices.
//! Combining vectors of different lengths pads the shorter one with zeros.
//! ```rust
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! #
//! use calcex::{Evaluator, Value};
//! let mut evaluator = Evaluator::new();
//! let res = evaluator.evaluate("{1, 2, 3} + {10, 20}")?;
//! assert_eq!(format!("{}", res), "{11, 22, 3}");
//! let res = evaluator.evaluate("2 * {1, {2, 3}}")?;
//! assert_eq!(format!("{}", res), "{2, {4, 6}}");
//! #
//! #     Ok(())
//! # }
//! ```
//!
//! ## Operators
//!
//! Operators have case-insensitive aliases, e.g., division can be written as `/`, `div`,
//! `divide`, or `over`. The full list is documented in
//! [`make_default_operators`](make_default_operators). From lowest to highest priority the
//! binary operators are logical, comparison, additive, multiplicative, and power operators.
//! Unary operators are applied to their right neighbour before any binary operator, such
//! that `-2^2` is `4`.
//!
//! ## Functions
//!
//! Functions are defined with `:=` and can be redefined at any time.
//! ```rust
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! #
//! use calcex::Evaluator;
//! let mut evaluator = Evaluator::new();
//! evaluator.evaluate("fib(n) := if(n < 2, n, fib(n - 1) + fib(n - 2))")?;
//! assert_eq!(evaluator.evaluate_to_double("fib(12)")?, 144.0);
//! #
//! #     Ok(())
//! # }
//! ```
//!
//! ## Repeated evaluation
//!
//! Trees can be compiled once and evaluated after changing bindings.
//! ```rust
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! #
//! use calcex::Evaluator;
//! let mut evaluator = Evaluator::new();
//! evaluator.bind("x", 0.0)?;
//! let handle = evaluator.compile("x^2 + 1")?;
//! let mut sum = 0.0;
//! for i in 0..4 {
//!     evaluator.bind("x", i as f64)?;
//!     sum += evaluator.evaluate_cached_to_double(handle)?;
//! }
//! assert_eq!(sum, 18.0);
//! #
//! #     Ok(())
//! # }
//! ```
//!
//! ## Serialization
//!
//! With the feature `serde`, values, configurations, and trees implement `Serialize` and
//! `Deserialize`. Trees are serialized as their unparsed text.

pub mod arithmetic;
mod config;
mod convert;
mod definitions;
mod environment;
mod evaluator;
mod expression;
mod operators;
mod parser;
mod rational;
mod result;
mod value;

pub use {
    config::{AngleUnit, EvalConfig},
    convert::UnitConverter,
    environment::{Environment, TreeHandle},
    evaluator::{eval_str, Binding, Evaluator},
    expression::{Expr, Node},
    operators::{
        find_operator, make_default_operators, operators, BinOp, OpContext, Operator,
        SpecialForm,
    },
    parser::parse,
    rational::Rational,
    result::{ExError, ExErrorKind, ExResult},
    value::{FunctionDef, Value},
};
