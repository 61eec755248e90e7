use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
};

use log::debug;

use crate::{
    arithmetic::map_elementwise,
    environment::{Environment, TreeHandle},
    exerr,
    expression::{Expr, Node},
    operators::{truthy, OpContext, SpecialForm},
    parser, AngleUnit, EvalConfig, ExResult, FunctionDef, UnitConverter, Value,
};

/// What [`Evaluator::bind`] binds to a name, either a value or an expression that is
/// evaluated once at binding time.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding<'a> {
    Value(Value),
    Expression(&'a str),
}

impl<'a> From<Value> for Binding<'a> {
    fn from(v: Value) -> Self {
        Binding::Value(v)
    }
}
impl<'a> From<f64> for Binding<'a> {
    fn from(x: f64) -> Self {
        Binding::Value(Value::Double(x))
    }
}
impl<'a> From<i64> for Binding<'a> {
    fn from(n: i64) -> Self {
        Binding::Value(Value::from(n))
    }
}
impl<'a> From<&'a str> for Binding<'a> {
    fn from(text: &'a str) -> Self {
        Binding::Expression(text)
    }
}

type Locals = HashMap<String, Value>;

/// Parses and evaluates expressions in its own [`Environment`]. Each concurrent user needs
/// its own evaluator, the operators are shared.
///
/// ```rust
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// #
/// use calcex::{AngleUnit, Evaluator, Value};
/// let mut evaluator = Evaluator::new();
/// evaluator.evaluate("f(x) := x + 2")?;
/// evaluator.evaluate("f(x) := x + 5")?;
/// assert_eq!(evaluator.evaluate_to_double("f(2)")?, 7.0);
///
/// evaluator.bind("r", "1/3")?;
/// assert_eq!(format!("{}", evaluator.evaluate("r + r + r")?), "1");
/// assert_eq!(evaluator.get("ans"), Some(&Value::from(1i64)));
///
/// evaluator.set_angle_unit(AngleUnit::Degrees);
/// assert!((evaluator.evaluate_to_double("sin(30)")? - 0.5).abs() < 1e-12);
/// #
/// #     Ok(())
/// # }
/// ```
pub struct Evaluator {
    env: Environment,
    config: EvalConfig,
    converter: Option<Box<dyn UnitConverter>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Evaluator {
            env: Environment::new(config.angle_unit),
            config,
            converter: None,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.env.get(name)
    }

    /// Binds a value or the value of an expression to `name`. Expressions are evaluated in
    /// the current environment without touching `ans`.
    ///
    /// # Errors
    ///
    /// Errors of parsing or evaluating the expression.
    pub fn bind<'a, B: Into<Binding<'a>>>(&mut self, name: &str, binding: B) -> ExResult<()> {
        let value = match binding.into() {
            Binding::Value(v) => v,
            Binding::Expression(text) => {
                let tree = parser::parse(text, &self.env.known_identifiers())?;
                self.eval_node(&tree, None, 0)?
            }
        };
        self.env.bind(name, value);
        Ok(())
    }

    pub fn unbind(&mut self, name: &str) -> Option<Value> {
        self.env.unbind(name)
    }

    /// Defines a function or replaces any binding of `identifier`. The replacement is
    /// visible to the next evaluation.
    pub fn define_or_redefine_function(
        &mut self,
        identifier: &str,
        params: &[&str],
        body: &str,
    ) -> ExResult<()> {
        let params = params.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        let mut known = self.env.known_identifiers();
        known.extend(params.iter().cloned());
        known.insert(identifier.to_string());
        let body = parser::parse(body, &known)?;
        let def = FunctionDef {
            identifier: identifier.to_string(),
            params,
            body,
        };
        self.assign(identifier, Value::from(def));
        Ok(())
    }

    fn assign(&mut self, name: &str, value: Value) {
        let is_function = matches!(value, Value::Function(_));
        let prev = self.env.bind(name, value);
        if is_function {
            if prev.is_some() {
                debug!("redefined '{}'", name);
            } else {
                debug!("defined '{}'", name);
            }
        }
    }

    pub fn angle_unit(&self) -> AngleUnit {
        self.env.angle_unit()
    }

    pub fn set_angle_unit(&mut self, angle_unit: AngleUnit) {
        debug!("angle unit set to {:?}", angle_unit);
        self.env.set_angle_unit(angle_unit);
    }

    pub fn set_converter<C: UnitConverter + 'static>(&mut self, converter: C) {
        self.converter = Some(Box::new(converter));
    }

    /// Parses `text` once and caches the tree. Compiling the same text again returns the
    /// same handle. The text is parsed again if a name that is also an operator alias has
    /// been bound or unbound in the meantime.
    pub fn compile(&mut self, text: &str) -> ExResult<TreeHandle> {
        if let Some(handle) = self.env.cached_handle(text) {
            debug!("cache hit for '{}'", text);
            self.update_compiled(handle)?;
            return Ok(handle);
        }
        let tree = parser::parse(text, &self.env.known_identifiers())?;
        Ok(self.env.cache_tree(text, tree))
    }

    fn update_compiled(&mut self, handle: TreeHandle) -> ExResult<()> {
        let compiled = self
            .env
            .compiled(handle)
            .ok_or_else(|| exerr!(Syntax, "no compiled expression for {:?}", handle))?;
        if self.env.is_outdated(compiled) {
            let tree = parser::parse(&compiled.text, &self.env.known_identifiers())?;
            self.env.recache_tree(handle, tree);
        }
        Ok(())
    }

    /// Removes all compiled trees, see [`Environment::clear_cache`].
    pub fn clear_cache(&mut self) {
        self.env.clear_cache();
    }

    /// Evaluates a compiled tree with the current bindings and rebinds `ans`.
    pub fn evaluate_cached(&mut self, handle: TreeHandle) -> ExResult<Value> {
        self.update_compiled(handle)?;
        let tree = self
            .env
            .tree(handle)
            .ok_or_else(|| exerr!(Syntax, "no compiled expression for {:?}", handle))?;
        let (name, value) = self.eval_top_level(tree)?;
        Ok(self.finish_top_level(name, value))
    }

    pub fn evaluate_cached_to_double(&mut self, handle: TreeHandle) -> ExResult<f64> {
        let value = self.evaluate_cached(handle)?;
        to_double(&value)
    }

    /// Parses and evaluates `text` and rebinds `ans` to the result. Top-level assignments
    /// bind the name and result in the assigned value.
    pub fn evaluate(&mut self, text: &str) -> ExResult<Value> {
        let tree = parser::parse(text, &self.env.known_identifiers())?;
        self.evaluate_tree(&tree)
    }

    /// Evaluates `text` to a double.
    ///
    /// # Errors
    ///
    /// Additionally to the errors of [`evaluate`](Evaluator::evaluate), a not-a-number error
    /// is returned if the result is a vector, a matrix, or a function.
    pub fn evaluate_to_double(&mut self, text: &str) -> ExResult<f64> {
        let value = self.evaluate(text)?;
        to_double(&value)
    }

    /// Evaluates a tree that has been parsed elsewhere and rebinds `ans`.
    pub fn evaluate_tree(&mut self, tree: &Node) -> ExResult<Value> {
        let (name, value) = self.eval_top_level(tree)?;
        Ok(self.finish_top_level(name, value))
    }

    /// Value of a top-level tree and the name it is assigned to, if any.
    fn eval_top_level(&self, tree: &Node) -> ExResult<(Option<String>, Value)> {
        match tree {
            Node::Assign { name, value } => {
                let value = match value.as_ref() {
                    Node::Literal(def @ Value::Function(_)) => def.clone(),
                    _ => self.eval_node(value, None, 0)?,
                };
                Ok((Some(name.clone()), value))
            }
            _ => Ok((None, self.eval_node(tree, None, 0)?)),
        }
    }

    fn finish_top_level(&mut self, name: Option<String>, value: Value) -> Value {
        if let Some(name) = name {
            self.assign(&name, value.clone());
        }
        self.env.set_ans(value.clone());
        value
    }

    fn lookup<'b>(&'b self, name: &str, locals: Option<&'b Locals>) -> Option<&'b Value> {
        locals
            .and_then(|locals| locals.get(name))
            .or_else(|| self.env.get(name))
    }

    fn eval_node(&self, node: &Node, locals: Option<&Locals>, depth: usize) -> ExResult<Value> {
        match node {
            Node::Literal(v) => Ok(v.clone()),
            Node::Variable(name) => self
                .lookup(name, locals)
                .cloned()
                .ok_or_else(|| exerr!(UnboundIdentifier, "unknown variable '{}'", name)),
            Node::Expr(e) => self.eval_expr(e, locals, depth),
            Node::Assign { name, .. } => Err(exerr!(
                Syntax,
                "assignment to '{}' is only allowed at the top level",
                name
            )),
            Node::Vector(elts) => elts
                .iter()
                .map(|n| self.eval_node(n, locals, depth))
                .collect::<ExResult<Vec<_>>>()
                .map(Value::Vector),
            Node::Matrix(rows) => rows
                .iter()
                .map(|row| row.iter().map(|n| self.eval_node(n, locals, depth)).collect())
                .collect::<ExResult<Vec<_>>>()
                .map(Value::Matrix),
            Node::Call { name, args } => self.eval_call(name, args, locals, depth),
        }
    }

    fn eval_call(
        &self,
        name: &str,
        args: &[Node],
        locals: Option<&Locals>,
        depth: usize,
    ) -> ExResult<Value> {
        let def = match self.lookup(name, locals) {
            Some(Value::Function(def)) => def,
            Some(v) => {
                return Err(exerr!(
                    TypeMismatch,
                    "'{}' is a {} and not a function",
                    name,
                    v.type_name()
                ))
            }
            None => return Err(exerr!(UnboundIdentifier, "unknown function '{}'", name)),
        };
        if def.params.len() != args.len() {
            return Err(exerr!(
                TypeMismatch,
                "function '{}' expects {} arguments, got {}",
                name,
                def.params.len(),
                args.len()
            ));
        }
        if depth >= self.config.max_depth {
            return Err(exerr!(
                RecursionLimit,
                "function calls are nested deeper than {}",
                self.config.max_depth
            ));
        }
        let call_locals = def
            .params
            .iter()
            .cloned()
            .zip(args.iter())
            .map(|(param, arg)| Ok((param, self.eval_node(arg, locals, depth)?)))
            .collect::<ExResult<Locals>>()?;
        self.eval_node(&def.body, Some(&call_locals), depth + 1)
    }

    fn eval_expr(&self, e: &Expr, locals: Option<&Locals>, depth: usize) -> ExResult<Value> {
        let op = e.op();
        match (op.special(), e.operands()) {
            (Some(SpecialForm::Conditional), [Node::Vector(branches)]) if branches.len() == 3 => {
                let condition = self.eval_node(&branches[0], locals, depth)?;
                let chosen = if truthy(&condition)? {
                    &branches[1]
                } else {
                    &branches[2]
                };
                self.eval_node(chosen, locals, depth)
            }
            (Some(SpecialForm::Conversion), [Node::Vector(args)]) => {
                self.eval_conversion(args, locals, depth)
            }
            (_, [_, _]) => self.eval_binary_chain(e, locals, depth),
            (_, operands) => {
                let values = operands
                    .iter()
                    .map(|n| self.eval_node(n, locals, depth))
                    .collect::<ExResult<Vec<_>>>()?;
                let ctx = OpContext::new(self.env.angle_unit(), &self.config);
                op.apply(&values, &ctx)
            }
        }
    }

    /// Evaluates a binary operation. Binary operations nested as left operands are walked
    /// iteratively such that long left associative chains like `1+1+...+1` need no recursion.
    fn eval_binary_chain(
        &self,
        e: &Expr,
        locals: Option<&Locals>,
        depth: usize,
    ) -> ExResult<Value> {
        let mut chain = vec![e];
        let mut leftmost = &e.operands()[0];
        while let Node::Expr(inner) = leftmost {
            if !inner.is_binary() {
                break;
            }
            chain.push(inner);
            leftmost = &inner.operands()[0];
        }
        let ctx = OpContext::new(self.env.angle_unit(), &self.config);
        let mut acc = self.eval_node(leftmost, locals, depth)?;
        for expr in chain.iter().rev() {
            let right = self.eval_node(&expr.operands()[1], locals, depth)?;
            acc = expr.op().apply(&[acc, right], &ctx)?;
        }
        Ok(acc)
    }

    fn eval_conversion(
        &self,
        args: &[Node],
        locals: Option<&Locals>,
        depth: usize,
    ) -> ExResult<Value> {
        let (value, from, to) = match args {
            [value, Node::Variable(from), Node::Variable(to)] => (value, from, to),
            _ => {
                return Err(exerr!(
                    Conversion,
                    "expected convert(value, from_unit, to_unit) with bare unit names"
                ))
            }
        };
        let converter = self
            .converter
            .as_ref()
            .ok_or_else(|| exerr!(Conversion, "no unit converter has been set"))?;
        let value = self.eval_node(value, locals, depth)?;
        map_elementwise(&value, &|x: &Value| {
            Ok(Value::Double(converter.convert(x.to_number()?, from, to)?))
        })
    }
}

fn to_double(value: &Value) -> ExResult<f64> {
    match value {
        Value::Vector(_) | Value::Matrix(_) | Value::Function(_) => Err(exerr!(
            NotANumber,
            "expected a number, got a {} '{}'",
            value.type_name(),
            value
        )),
        _ => value.to_number(),
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

impl Debug for Evaluator {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Evaluator {{ env: {:?}, config: {:?}, has_converter: {} }}",
            self.env,
            self.config,
            self.converter.is_some()
        )
    }
}

/// Evaluates `text` in a fresh [`Evaluator`] to a double.
/// ```rust
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// #
/// assert_eq!(calcex::eval_str("(5*2*3)^4")?, 810000.0);
/// #
/// #     Ok(())
/// # }
/// ```
pub fn eval_str(text: &str) -> ExResult<f64> {
    Evaluator::new().evaluate_to_double(text)
}
