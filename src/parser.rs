use std::collections::HashSet;

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;
use smallvec::SmallVec;

use crate::{
    definitions::{MAX_PARSE_DEPTH, N_TOKENS_ON_STACK},
    exerr,
    expression::Node,
    operators::{find_operator, symbolic_reprs, Operator, SpecialForm},
    ExError, ExResult, FunctionDef, Rational, Value,
};

lazy_static! {
    static ref RE_NAME: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z_0-9]*").unwrap();
    static ref RE_NUMBER: Regex =
        Regex::new(r"^(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?%?").unwrap();
    static ref RE_DEFINITION_HEAD: Regex = Regex::new(
        r"^\s*([a-zA-Z_][a-zA-Z_0-9]*)\s*(?:\(\s*([a-zA-Z_][a-zA-Z_0-9]*(?:\s*,\s*[a-zA-Z_][a-zA-Z_0-9]*)*)?\s*\))?\s*$"
    )
    .unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Paren {
    Open,
    Close,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParsedToken<'a> {
    Num(Value),
    Paren(Paren),
    Brace(Paren),
    Comma,
    Define,
    Op(&'static Operator),
    Ident(&'a str),
}

impl<'a> ParsedToken<'a> {
    fn is_operand(&self) -> bool {
        matches!(self, ParsedToken::Num(_) | ParsedToken::Ident(_))
    }
    fn is_opening(&self) -> bool {
        matches!(
            self,
            ParsedToken::Paren(Paren::Open) | ParsedToken::Brace(Paren::Open)
        )
    }
    fn is_closing(&self) -> bool {
        matches!(
            self,
            ParsedToken::Paren(Paren::Close) | ParsedToken::Brace(Paren::Close)
        )
    }
    /// Tokens after which an operator is in binary position.
    fn ends_operand(&self) -> bool {
        self.is_operand() || self.is_closing()
    }
}

/// Parses a numeric literal. Integers become exact rationals, decimals and exponents become
/// doubles, and a trailing `%` makes a percentage.
fn parse_number(num_str: &str) -> ExResult<Value> {
    let to_f64 = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| exerr!(Syntax, "could not parse number '{}'", num_str))
    };
    if let Some(magnitude) = num_str.strip_suffix('%') {
        Ok(Value::Percent(to_f64(magnitude)?))
    } else if num_str.contains(|c| c == '.' || c == 'e' || c == 'E') {
        Ok(Value::Double(to_f64(num_str)?))
    } else {
        match num_str.parse::<i64>() {
            Ok(n) => Ok(Value::Rational(Rational::from_integer(n))),
            // too large for an exact integer
            Err(_) => Ok(Value::Double(to_f64(num_str)?)),
        }
    }
}

/// Group opened during tokenization.
#[derive(Clone, Copy, Debug)]
struct OpenGroup {
    /// the group holds the arguments of a unit conversion
    is_conversion: bool,
    n_commas: usize,
}

/// Splits a text into tokens. Words contained in `known_identifiers` are identifiers even if
/// they coincide with an operator alias. Other words are operators if they match an alias
/// case-insensitively and identifiers otherwise. The unit names of a conversion call
/// `convert(value, from_unit, to_unit)` are always identifiers, e.g., `convert(90, deg, rad)`.
///
/// # Errors
///
/// Returns a syntax error for characters that start no token and for invalid constellations
/// of tokens, e.g., unbalanced parentheses or two adjacent numbers.
pub fn tokenize_and_analyze<'a>(
    text: &'a str,
    known_identifiers: &HashSet<String>,
) -> ExResult<Vec<ParsedToken<'a>>> {
    if text.chars().any(|c| !c.is_ascii()) {
        return Err(exerr!(Syntax, "only ascii characters are supported"));
    };
    let find_symbolic_op = |text_rest: &str| {
        symbolic_reprs()
            .iter()
            .find(|repr| text_rest.starts_with(**repr))
            .copied()
    };
    let mut res = Vec::new();
    let mut groups: SmallVec<[OpenGroup; N_TOKENS_ON_STACK]> = SmallVec::new();
    let mut cur_offset = 0usize;
    while cur_offset < text.len() {
        let text_rest = &text[cur_offset..];
        let c = text_rest.as_bytes()[0] as char;
        if c.is_ascii_whitespace() {
            cur_offset += 1;
            continue;
        }
        let (token, n_chars) = match c {
            '(' => (ParsedToken::Paren(Paren::Open), 1),
            ')' => (ParsedToken::Paren(Paren::Close), 1),
            '{' => (ParsedToken::Brace(Paren::Open), 1),
            '}' => (ParsedToken::Brace(Paren::Close), 1),
            ',' => (ParsedToken::Comma, 1),
            _ if text_rest.starts_with(":=") => (ParsedToken::Define, 2),
            _ => {
                if let Some(num) = RE_NUMBER.find(text_rest) {
                    let num_str = num.as_str();
                    (ParsedToken::Num(parse_number(num_str)?), num_str.len())
                } else if let Some(name) = RE_NAME.find(text_rest) {
                    let name = name.as_str();
                    let is_unit_slot = matches!(
                        groups.last(),
                        Some(g) if g.is_conversion && g.n_commas > 0
                    );
                    let token = if is_unit_slot || known_identifiers.contains(name) {
                        ParsedToken::Ident(name)
                    } else if let Some(op) = find_operator(name) {
                        ParsedToken::Op(op)
                    } else {
                        ParsedToken::Ident(name)
                    };
                    (token, name.len())
                } else if let Some(repr) = find_symbolic_op(text_rest) {
                    // symbolic aliases are registered, the lookup cannot fail
                    match find_operator(repr) {
                        Some(op) => (ParsedToken::Op(op), repr.len()),
                        None => return Err(exerr!(Syntax, "unknown operator '{}'", repr)),
                    }
                } else {
                    return Err(exerr!(Syntax, "how to parse the beginning of {}", text_rest));
                }
            }
        };
        match &token {
            ParsedToken::Paren(Paren::Open) | ParsedToken::Brace(Paren::Open) => {
                let is_conversion = token == ParsedToken::Paren(Paren::Open)
                    && matches!(
                        res.last(),
                        Some(ParsedToken::Op(op)) if op.special() == Some(SpecialForm::Conversion)
                    );
                groups.push(OpenGroup {
                    is_conversion,
                    n_commas: 0,
                });
            }
            ParsedToken::Paren(Paren::Close) | ParsedToken::Brace(Paren::Close) => {
                groups.pop();
            }
            ParsedToken::Comma => {
                if let Some(g) = groups.last_mut() {
                    g.n_commas += 1;
                }
            }
            _ => (),
        }
        res.push(token);
        cur_offset += n_chars;
    }
    check_parsed_token_preconditions(&res)?;
    Ok(res)
}

struct PairPreCondition {
    apply: fn(&ParsedToken, &ParsedToken) -> bool,
    error_msg: &'static str,
}

fn make_pair_pre_conditions() -> [PairPreCondition; 8] {
    [
        PairPreCondition {
            apply: |left, right| !(left.is_operand() && right.is_operand()),
            error_msg: "a number/variable cannot be next to a number/variable",
        },
        PairPreCondition {
            apply: |left, right| {
                !(left.is_closing() && (right.is_operand() || right.is_opening()))
            },
            error_msg: "an operand cannot be on the right of a closing parenthesis",
        },
        PairPreCondition {
            apply: |left, right| match (left, right) {
                (ParsedToken::Num(_), r) => !r.is_opening(),
                (ParsedToken::Ident(_), ParsedToken::Brace(Paren::Open)) => false,
                _ => true,
            },
            error_msg: "only functions can be followed by an opening parenthesis",
        },
        PairPreCondition {
            apply: |left, right| match right {
                ParsedToken::Op(op) if left.ends_operand() => op.has_bin(),
                _ => true,
            },
            error_msg: "a unary operator cannot be on the right of an operand",
        },
        PairPreCondition {
            apply: |left, right| match (left, right) {
                (ParsedToken::Op(_), ParsedToken::Op(op_r)) => op_r.has_unary(),
                _ => true,
            },
            error_msg: "a binary operator cannot be on the right of an operator",
        },
        PairPreCondition {
            apply: |left, right| match right {
                ParsedToken::Op(op) if left.is_opening() || *left == ParsedToken::Comma => {
                    op.has_unary()
                }
                _ => true,
            },
            error_msg: "a binary operator cannot be on the right of an opening parenthesis or a comma",
        },
        PairPreCondition {
            apply: |left, right| match left {
                ParsedToken::Op(_) => {
                    !(right.is_closing()
                        || *right == ParsedToken::Comma
                        || *right == ParsedToken::Define)
                }
                _ => true,
            },
            error_msg: "an operator cannot be on the left of a closing parenthesis or a comma",
        },
        PairPreCondition {
            apply: |left, right| {
                !((left.is_opening() || *left == ParsedToken::Comma)
                    && *right == ParsedToken::Comma
                    || *left == ParsedToken::Comma && right.is_closing())
            },
            error_msg: "empty element between commas",
        },
    ]
}

/// Tries to give useful error messages for invalid constellations of the parsed tokens
pub fn check_parsed_token_preconditions(parsed_tokens: &[ParsedToken]) -> ExResult<()> {
    if parsed_tokens.is_empty() {
        return Err(exerr!(Syntax, "cannot parse empty string"));
    };

    let pair_pre_conditions = make_pair_pre_conditions();
    for pair in parsed_tokens.windows(2) {
        let failed = pair_pre_conditions
            .iter()
            .find(|ppc| !(ppc.apply)(&pair[0], &pair[1]));
        if let Some(failed_ppc) = failed {
            return Err(exerr!(Syntax, "{}", failed_ppc.error_msg));
        }
    }

    let mut open: SmallVec<[&ParsedToken; N_TOKENS_ON_STACK]> = SmallVec::new();
    for (i, token) in parsed_tokens.iter().enumerate() {
        if token.is_opening() {
            open.push(token);
        } else if token.is_closing() {
            match (open.pop(), token) {
                (Some(ParsedToken::Paren(_)), ParsedToken::Paren(_))
                | (Some(ParsedToken::Brace(_)), ParsedToken::Brace(_)) => (),
                (Some(_), _) => return Err(exerr!(Syntax, "parentheses mismatch")),
                (None, _) => {
                    return Err(exerr!(
                        Syntax,
                        "too many closing parentheses until position {}",
                        i
                    ))
                }
            }
        }
    }
    if !open.is_empty() {
        Err(exerr!(Syntax, "parentheses mismatch"))
    } else if let Some(ParsedToken::Op(_)) = parsed_tokens.last() {
        Err(exerr!(Syntax, "the last element cannot be an operator"))
    } else {
        Ok(())
    }
}

/// Index of the parenthesis or brace closing the one at `open_idx`.
fn find_closing(tokens: &[ParsedToken], open_idx: usize) -> Option<usize> {
    let mut level = 0i32;
    for (i, token) in tokens.iter().enumerate().skip(open_idx) {
        if token.is_opening() {
            level += 1;
        } else if token.is_closing() {
            level -= 1;
            if level == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Splits at commas that are not nested in parentheses or braces.
fn split_commas<'a, 'b>(
    tokens: &'b [ParsedToken<'a>],
) -> SmallVec<[&'b [ParsedToken<'a>]; N_TOKENS_ON_STACK]> {
    let mut items = SmallVec::new();
    if tokens.is_empty() {
        return items;
    }
    let mut level = 0i32;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_opening() {
            level += 1;
        } else if token.is_closing() {
            level -= 1;
        } else if level == 0 && *token == ParsedToken::Comma {
            items.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    items.push(&tokens[start..]);
    items
}

/// `true` if the tokens are exactly one brace literal `{..}`.
fn is_brace_literal(tokens: &[ParsedToken]) -> bool {
    tokens.first() == Some(&ParsedToken::Brace(Paren::Open))
        && find_closing(tokens, 0) == Some(tokens.len() - 1)
}

type Splits = SmallVec<[(usize, &'static Operator); N_TOKENS_ON_STACK]>;

/// Positions and operators of all binary operations with the lowest priority outside of any
/// nesting, from left to right. Operators of equal priority share their associativity.
fn find_splits(tokens: &[ParsedToken]) -> ExResult<Splits> {
    let mut level = 0i32;
    let mut lowest_prio = i32::MAX;
    let mut splits = Splits::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            _ if token.is_opening() => level += 1,
            _ if token.is_closing() => level -= 1,
            ParsedToken::Op(op) if level == 0 && i > 0 && tokens[i - 1].ends_operand() => {
                let prio = op.bin()?.prio;
                if prio < lowest_prio {
                    lowest_prio = prio;
                    splits.clear();
                }
                if prio == lowest_prio {
                    splits.push((i, *op));
                }
            }
            ParsedToken::Comma if level == 0 => {
                return Err(exerr!(Syntax, "unexpected ',' outside of a group"))
            }
            ParsedToken::Define => {
                return Err(exerr!(Syntax, "':=' is only allowed at the top level"))
            }
            _ => (),
        }
    }
    Ok(splits)
}

fn parse_list(items: &[&[ParsedToken]], depth: usize) -> ExResult<Vec<Node>> {
    items
        .iter()
        .map(|item| make_tree(item, depth + 1))
        .collect()
}

fn parse_brace_literal(tokens: &[ParsedToken], depth: usize) -> ExResult<Node> {
    let items = split_commas(&tokens[1..tokens.len() - 1]);
    if !items.is_empty() && items.iter().all(|item| is_brace_literal(item)) {
        let rows = items
            .iter()
            .map(|row| parse_list(&split_commas(&row[1..row.len() - 1]), depth + 1))
            .collect::<ExResult<Vec<_>>>()?;
        let n_cols = rows[0].len();
        if rows.iter().any(|row| row.len() != n_cols) {
            return Err(exerr!(Syntax, "all rows of a matrix need the same length"));
        }
        Ok(Node::matrix(rows))
    } else {
        Ok(Node::vector(parse_list(&items, depth)?))
    }
}

fn parse_operand(tokens: &[ParsedToken], depth: usize) -> ExResult<Node> {
    let last = tokens.len() - 1;
    let group_covers_rest = |open_idx| find_closing(tokens, open_idx) == Some(last);
    match &tokens[0] {
        ParsedToken::Op(op) => {
            if !op.has_unary() {
                return Err(exerr!(
                    Syntax,
                    "binary operator '{}' misses its left operand",
                    op.repr()
                ));
            }
            Node::unary(*op, make_tree(&tokens[1..], depth + 1)?)
        }
        ParsedToken::Num(v) if last == 0 => Ok(Node::Literal(v.clone())),
        ParsedToken::Ident(name) if last == 0 => Ok(Node::Variable(name.to_string())),
        ParsedToken::Ident(name)
            if tokens[1] == ParsedToken::Paren(Paren::Open) && group_covers_rest(1) =>
        {
            let args = parse_list(&split_commas(&tokens[2..last]), depth)?;
            Ok(Node::Call {
                name: name.to_string(),
                args,
            })
        }
        ParsedToken::Paren(Paren::Open) if group_covers_rest(0) => {
            let items = split_commas(&tokens[1..last]);
            match items.len() {
                0 => Err(exerr!(Syntax, "empty parentheses")),
                1 => make_tree(items[0], depth + 1),
                _ => Ok(Node::vector(parse_list(&items, depth)?)),
            }
        }
        ParsedToken::Brace(Paren::Open) if group_covers_rest(0) => {
            parse_brace_literal(tokens, depth)
        }
        _ => Err(exerr!(Syntax, "unexpected token {:?}", tokens[0])),
    }
}

fn make_depth_error() -> ExError {
    exerr!(
        RecursionLimit,
        "expression is nested deeper than {}",
        MAX_PARSE_DEPTH
    )
}

/// Builds the tree by splitting at all operations of the lowest priority and folding the
/// operands in the order of associativity. Without binary operations the tokens form an
/// operand, possibly prefixed by unary operators.
///
/// Only groups, unary operands, and chains of right associative operations count towards the
/// depth. Left associative chains become left-deep trees of any length.
fn make_tree(tokens: &[ParsedToken], depth: usize) -> ExResult<Node> {
    if depth > MAX_PARSE_DEPTH {
        return Err(make_depth_error());
    }
    if tokens.is_empty() {
        return Err(exerr!(Syntax, "empty expression"));
    }
    let splits = find_splits(tokens)?;
    let Some(&(first_idx, first_op)) = splits.first() else {
        return parse_operand(tokens, depth);
    };
    let operand_end = |k: usize| splits.get(k + 1).map_or(tokens.len(), |s| s.0);
    if first_op.bin()?.is_right_assoc {
        let depth = depth + splits.len();
        if depth > MAX_PARSE_DEPTH {
            return Err(make_depth_error());
        }
        let last_start = splits[splits.len() - 1].0 + 1;
        let mut node = make_tree(&tokens[last_start..], depth)?;
        for (k, &(idx, op)) in splits.iter().enumerate().rev() {
            let start = if k == 0 { 0 } else { splits[k - 1].0 + 1 };
            node = Node::binary(op, make_tree(&tokens[start..idx], depth)?, node)?;
        }
        Ok(node)
    } else {
        let mut node = make_tree(&tokens[..first_idx], depth)?;
        for (k, &(idx, op)) in splits.iter().enumerate() {
            node = Node::binary(op, node, make_tree(&tokens[idx + 1..operand_end(k)], depth)?)?;
        }
        Ok(node)
    }
}

fn parse_expression(text: &str, known_identifiers: &HashSet<String>) -> ExResult<Node> {
    let tokens = tokenize_and_analyze(text, known_identifiers)?;
    make_tree(&tokens, 0)
}

/// Parses `text` into a tree.
///
/// Words in `known_identifiers` are treated as identifiers even if they coincide with an
/// operator alias. A top-level `name := expr` assigns a variable and
/// `name(params) := body` defines a function whose parameters are identifiers in the body.
///
/// ```rust
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// #
/// use std::collections::HashSet;
/// use calcex::{parse, Node};
/// let node = parse("2 over x", &HashSet::new())?;
/// assert_eq!(format!("{}", node), "2/x");
/// let node = parse("f(x) := x^2", &HashSet::new())?;
/// assert!(matches!(node, Node::Assign { .. }));
/// #
/// #     Ok(())
/// # }
/// ```
///
/// # Errors
///
/// A syntax error for malformed input and a recursion-limit error for excessive nesting.
pub fn parse(text: &str, known_identifiers: &HashSet<String>) -> ExResult<Node> {
    trace!("parsing '{}'", text);
    let Some(define_pos) = text.find(":=") else {
        return parse_expression(text, known_identifiers);
    };
    let head = &text[..define_pos];
    let body = &text[define_pos + 2..];
    let captures = RE_DEFINITION_HEAD
        .captures(head)
        .ok_or_else(|| exerr!(Syntax, "invalid left-hand side '{}' of ':='", head.trim()))?;
    let name = captures
        .get(1)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| exerr!(Syntax, "missing name on the left-hand side of ':='"))?;
    let has_params = head.contains('(');
    if !has_params {
        let value = parse_expression(body, known_identifiers)?;
        return Ok(Node::Assign {
            name,
            value: Box::new(value),
        });
    }
    let params = captures
        .get(2)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|p| p.trim().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let mut known = known_identifiers.clone();
    known.extend(params.iter().cloned());
    known.insert(name.clone());
    let body = parse_expression(body, &known)?;
    trace!("parsed definition of '{}' with params {:?}", name, params);
    Ok(Node::Assign {
        name: name.clone(),
        value: Box::new(Node::Literal(Value::from(FunctionDef {
            identifier: name,
            params,
            body,
        }))),
    })
}
