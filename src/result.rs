use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Category of an [`ExError`](ExError). Callers can match on the kind without parsing messages.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ExErrorKind {
    /// Malformed source text such as unbalanced grouping or an unknown token.
    Syntax,
    /// An operator has no overload for the runtime variants of its operands.
    TypeMismatch,
    /// A variable or function has been referenced but was never bound.
    UnboundIdentifier,
    /// A double was requested but the result is a vector, a matrix, or a function.
    NotANumber,
    /// Explicit domain violation detected by the core, e.g., a zero denominator.
    Arithmetic,
    /// The unit-conversion collaborator is missing or rejected the request.
    Conversion,
    /// Nesting of the source or of function calls is too deep.
    RecursionLimit,
}

impl Display for ExErrorKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            ExErrorKind::Syntax => "syntax error",
            ExErrorKind::TypeMismatch => "type mismatch",
            ExErrorKind::UnboundIdentifier => "unbound identifier",
            ExErrorKind::NotANumber => "not a number",
            ExErrorKind::Arithmetic => "arithmetic failure",
            ExErrorKind::Conversion => "conversion failure",
            ExErrorKind::RecursionLimit => "recursion limit",
        };
        write!(f, "{}", name)
    }
}

/// This will be thrown at you if something within Calcex went wrong. Ok, obviously it is not an
/// exception, so thrown needs to be understood figuratively.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct ExError {
    pub kind: ExErrorKind,
    pub msg: String,
}

impl ExError {
    pub fn new(kind: ExErrorKind, msg: &str) -> ExError {
        ExError {
            kind,
            msg: msg.to_string(),
        }
    }
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }
}

impl Display for ExError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}
impl Error for ExError {}

/// Calcex' result type with [`ExError`](ExError) as error type.
pub type ExResult<U> = Result<U, ExError>;

/// Creates an [`ExError`](ExError) of the given kind with a formatted message.
/// ```rust
/// use calcex::{exerr, ExErrorKind};
/// let err = exerr!(Syntax, "unexpected token {}", ")");
/// assert_eq!(err.kind, ExErrorKind::Syntax);
/// assert_eq!(err.msg, "unexpected token )");
/// ```
#[macro_export]
macro_rules! exerr {
    ($kind:ident, $s:literal $(, $exps:expr)*) => {
        $crate::ExError {
            kind: $crate::ExErrorKind::$kind,
            msg: format!($s $(, $exps)*),
        }
    };
}

#[test]
fn test_display() {
    let err = exerr!(UnboundIdentifier, "unknown variable '{}'", "x");
    assert_eq!(format!("{}", err), "unbound identifier: unknown variable 'x'");
    assert_eq!(err.kind(), ExErrorKind::UnboundIdentifier);
}
