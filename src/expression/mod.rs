use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use crate::{exerr, operators::Operator, parser, ExError, ExResult, Value};

#[cfg(feature = "serde")]
mod serde;

/// An operator applied to one or two operands. The number of operands matches the operator,
/// i.e., binary operators hold exactly two operands and unary operators exactly one.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    op: &'static Operator,
    operands: Vec<Node>,
}

impl Expr {
    /// # Errors
    ///
    /// Returns a syntax error if the operator has no variant for the number of operands.
    pub fn new(op: &'static Operator, operands: Vec<Node>) -> ExResult<Expr> {
        let fits = match operands.len() {
            1 => op.has_unary(),
            2 => op.has_bin(),
            _ => false,
        };
        if fits {
            Ok(Expr { op, operands })
        } else {
            Err(exerr!(
                Syntax,
                "operator '{}' cannot be applied to {} operands",
                op.repr(),
                operands.len()
            ))
        }
    }
    pub fn op(&self) -> &'static Operator {
        self.op
    }
    pub fn operands(&self) -> &[Node] {
        &self.operands
    }
    pub fn is_binary(&self) -> bool {
        self.operands.len() == 2
    }
}

impl Drop for Expr {
    fn drop(&mut self) {
        // long operator chains are deep trees, tear them down without recursion
        let mut pending = std::mem::take(&mut self.operands);
        while let Some(node) = pending.pop() {
            if let Node::Expr(mut e) = node {
                pending.append(&mut e.operands);
            }
        }
    }
}

/// Unevaluated syntax tree as produced by [`parse`](crate::parse).
///
/// Trees are immutable once built. Evaluation happens in an
/// [`Evaluator`](crate::Evaluator) that resolves variables and functions.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Literal(Value),
    Variable(String),
    Expr(Expr),
    /// `name := value` at the top level. Function definitions carry a function literal.
    Assign { name: String, value: Box<Node> },
    /// Vector literal with at least one non-constant entry.
    Vector(Vec<Node>),
    /// Matrix literal with at least one non-constant entry.
    Matrix(Vec<Vec<Node>>),
    /// Invocation of a user-defined function.
    Call { name: String, args: Vec<Node> },
}

impl Node {
    pub fn binary(op: &'static Operator, left: Node, right: Node) -> ExResult<Node> {
        Ok(Node::Expr(Expr::new(op, vec![left, right])?))
    }

    pub fn unary(op: &'static Operator, operand: Node) -> ExResult<Node> {
        Ok(Node::Expr(Expr::new(op, vec![operand])?))
    }

    /// Vector of nodes that is folded into a literal if all entries are literals.
    pub fn vector(elts: Vec<Node>) -> Node {
        match literals(&elts) {
            Some(values) => Node::Literal(Value::Vector(values)),
            None => Node::Vector(elts),
        }
    }

    /// Matrix of nodes that is folded into a literal if all entries are literals.
    pub fn matrix(rows: Vec<Vec<Node>>) -> Node {
        match rows.iter().map(|row| literals(row)).collect::<Option<Vec<_>>>() {
            Some(values) => Node::Literal(Value::Matrix(values)),
            None => Node::Matrix(rows),
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Node::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// Names of all variables and called functions in the tree, sorted and without
    /// duplicates.
    pub fn identifiers(&self) -> Vec<String> {
        fn collect(node: &Node, names: &mut HashSet<String>) {
            match node {
                Node::Literal(_) => (),
                Node::Variable(name) => {
                    names.insert(name.clone());
                }
                Node::Expr(e) => e.operands.iter().for_each(|n| collect(n, names)),
                Node::Assign { value, .. } => collect(value, names),
                Node::Vector(elts) => elts.iter().for_each(|n| collect(n, names)),
                Node::Matrix(rows) => rows.iter().flatten().for_each(|n| collect(n, names)),
                Node::Call { name, args } => {
                    names.insert(name.clone());
                    args.iter().for_each(|n| collect(n, names));
                }
            }
        }
        let mut names = HashSet::new();
        collect(self, &mut names);
        let mut names = names.into_iter().collect::<Vec<_>>();
        names.sort();
        names
    }

    fn bin_prio(&self) -> Option<(i32, bool)> {
        match self {
            Node::Expr(e) if e.is_binary() => e
                .op
                .bin()
                .ok()
                .map(|bin_op| (bin_op.prio, bin_op.is_right_assoc)),
            _ => None,
        }
    }
}

/// Values of the nodes if all of them are literals.
fn literals(nodes: &[Node]) -> Option<Vec<Value>> {
    nodes.iter().map(|n| n.as_literal().cloned()).collect()
}

fn write_list(f: &mut Formatter, nodes: &[Node]) -> fmt::Result {
    for (i, n) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", n)?;
    }
    Ok(())
}

/// Literals that would change their meaning as operands without parentheses.
fn needs_parens(v: &Value) -> bool {
    match v {
        Value::Rational(r) => !r.is_integer() || r.numer() < 0,
        Value::Double(x) | Value::Percent(x) => x.is_sign_negative(),
        Value::Function(_) => true,
        _ => false,
    }
}

fn write_operand(f: &mut Formatter, node: &Node, wrap: bool) -> fmt::Result {
    let wrap = wrap
        || matches!(node, Node::Literal(v) if needs_parens(v))
        || matches!(node, Node::Assign { .. });
    if wrap {
        write!(f, "({})", node)
    } else {
        write!(f, "{}", node)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let repr = self.op.repr();
        match self.operands.as_slice() {
            [left, right] => {
                let (prio, is_right_assoc) = self
                    .op
                    .bin()
                    .map(|bin_op| (bin_op.prio, bin_op.is_right_assoc))
                    .map_err(|_| fmt::Error)?;
                let wrap_left = matches!(
                    left.bin_prio(),
                    Some((p, _)) if p < prio || (p == prio && is_right_assoc)
                );
                let wrap_right = matches!(
                    right.bin_prio(),
                    Some((p, _)) if p < prio || (p == prio && !is_right_assoc)
                );
                write_operand(f, left, wrap_left)?;
                if repr.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    write!(f, " {} ", repr)?;
                } else {
                    write!(f, "{}", repr)?;
                }
                write_operand(f, right, wrap_right)
            }
            [Node::Vector(args)] => {
                write!(f, "{}(", repr)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            [operand] => write!(f, "{}({})", repr, operand),
            _ => Err(fmt::Error),
        }
    }
}

/// Unparses the tree into text that parses to an equal tree.
/// ```rust
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// #
/// use calcex::Node;
/// let node = "(1 plus x) times sin x".parse::<Node>()?;
/// assert_eq!(format!("{}", node), "(1+x)*sin(x)");
/// #
/// #     Ok(())
/// # }
/// ```
impl Display for Node {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Node::Literal(v) => write!(f, "{}", v),
            Node::Variable(name) => write!(f, "{}", name),
            Node::Expr(e) => write!(f, "{}", e),
            Node::Assign { name, value } => match value.as_ref() {
                Node::Literal(Value::Function(def)) if def.identifier == *name => {
                    write!(f, "{}", def)
                }
                _ => write!(f, "{} := {}", name, value),
            },
            Node::Vector(elts) => {
                write!(f, "{{")?;
                write_list(f, elts)?;
                write!(f, "}}")
            }
            Node::Matrix(rows) => {
                write!(f, "{{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{{")?;
                    write_list(f, row)?;
                    write!(f, "}}")?;
                }
                write!(f, "}}")
            }
            Node::Call { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

/// Parses without any known identifiers.
impl FromStr for Node {
    type Err = ExError;
    fn from_str(text: &str) -> ExResult<Node> {
        parser::parse(text, &HashSet::new())
    }
}
