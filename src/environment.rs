use std::{
    collections::{HashMap, HashSet},
    f64::consts::{E, PI, TAU},
};

use log::debug;

use crate::{definitions::ANS, operators::find_operator, AngleUnit, Node, Value};

/// Handle to a tree compiled by [`Evaluator::compile`](crate::Evaluator::compile). Handles
/// are only valid for the evaluator that created them and are never reused, also not after
/// [`clear_cache`](Environment::clear_cache).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TreeHandle(usize);

#[derive(Clone, Debug)]
pub(crate) struct CompiledTree {
    pub(crate) text: String,
    pub(crate) tree: Node,
    /// value of the shadowing epoch when the text was parsed
    pub(crate) epoch: u64,
}

/// Symbol table and settings of one evaluator. Constants, variables, and functions share one
/// namespace.
///
/// Compiled trees stay cached until [`clear_cache`](Environment::clear_cache) is called.
#[derive(Clone, Debug)]
pub struct Environment {
    symbols: HashMap<String, Value>,
    angle_unit: AngleUnit,
    trees: HashMap<TreeHandle, CompiledTree>,
    compiled: HashMap<String, TreeHandle>,
    next_handle: usize,
    /// Incremented whenever a name that is also an operator alias is bound or unbound, since
    /// bound names are parsed as identifiers instead of operators.
    shadowing_epoch: u64,
}

impl Environment {
    /// Creates an environment with the constants `pi`, `e`, `tau`, `true`, and `false`.
    pub fn new(angle_unit: AngleUnit) -> Self {
        let symbols = [
            ("pi", Value::Double(PI)),
            ("e", Value::Double(E)),
            ("tau", Value::Double(TAU)),
            ("true", Value::Boolean(true)),
            ("false", Value::Boolean(false)),
        ]
        .into_iter()
        .map(|(name, v)| (name.to_string(), v))
        .collect();
        Environment {
            symbols,
            angle_unit,
            trees: HashMap::new(),
            compiled: HashMap::new(),
            next_handle: 0,
            shadowing_epoch: 0,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.symbols.get(name)
    }

    /// Binds `value` to `name` and returns the previous binding.
    pub fn bind(&mut self, name: &str, value: Value) -> Option<Value> {
        let prev = self.symbols.insert(name.to_string(), value);
        if prev.is_none() {
            self.on_names_changed(name);
        }
        prev
    }

    pub fn unbind(&mut self, name: &str) -> Option<Value> {
        let prev = self.symbols.remove(name);
        if prev.is_some() {
            self.on_names_changed(name);
        }
        prev
    }

    fn on_names_changed(&mut self, name: &str) {
        if find_operator(name).is_some() {
            debug!("'{}' changes between operator and identifier", name);
            self.shadowing_epoch += 1;
        }
    }

    pub fn ans(&self) -> Option<&Value> {
        self.get(ANS)
    }

    pub(crate) fn set_ans(&mut self, value: Value) {
        self.bind(ANS, value);
    }

    /// Names the parser treats as identifiers even if they coincide with an operator alias.
    pub fn known_identifiers(&self) -> HashSet<String> {
        self.symbols.keys().cloned().collect()
    }

    /// Sorted names of all bindings.
    pub fn names(&self) -> Vec<&str> {
        let mut names = self.symbols.keys().map(|k| k.as_str()).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn angle_unit(&self) -> AngleUnit {
        self.angle_unit
    }

    pub fn set_angle_unit(&mut self, angle_unit: AngleUnit) {
        self.angle_unit = angle_unit;
    }

    pub(crate) fn cached_handle(&self, text: &str) -> Option<TreeHandle> {
        self.compiled.get(text).copied()
    }

    /// Caches `tree` under a new handle.
    pub(crate) fn cache_tree(&mut self, text: &str, tree: Node) -> TreeHandle {
        let handle = TreeHandle(self.next_handle);
        self.next_handle += 1;
        self.trees.insert(
            handle,
            CompiledTree {
                text: text.to_string(),
                tree,
                epoch: self.shadowing_epoch,
            },
        );
        self.compiled.insert(text.to_string(), handle);
        debug!("cached tree {:?} for '{}'", handle, text);
        handle
    }

    /// Replaces the tree of an existing handle after its text has been parsed again.
    pub(crate) fn recache_tree(&mut self, handle: TreeHandle, tree: Node) {
        let epoch = self.shadowing_epoch;
        if let Some(compiled) = self.trees.get_mut(&handle) {
            debug!("recached tree {:?} for '{}'", handle, compiled.text);
            compiled.tree = tree;
            compiled.epoch = epoch;
        }
    }

    pub(crate) fn compiled(&self, handle: TreeHandle) -> Option<&CompiledTree> {
        self.trees.get(&handle)
    }

    /// `true` if the names bound since parsing could change the tree of `compiled`.
    pub(crate) fn is_outdated(&self, compiled: &CompiledTree) -> bool {
        compiled.epoch != self.shadowing_epoch
    }

    pub fn tree(&self, handle: TreeHandle) -> Option<&Node> {
        self.trees.get(&handle).map(|compiled| &compiled.tree)
    }

    /// Removes all compiled trees. Their handles become invalid.
    pub fn clear_cache(&mut self) {
        debug!("cleared {} compiled trees", self.trees.len());
        self.trees.clear();
        self.compiled.clear();
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new(AngleUnit::default())
    }
}

#[cfg(test)]
mod test {
    use super::Environment;
    use crate::{AngleUnit, Node, Value};

    #[test]
    fn test_bindings() {
        let mut env = Environment::default();
        assert_eq!(env.names(), vec!["e", "false", "pi", "tau", "true"]);
        assert!(env.ans().is_none());
        assert!(env.bind("x", Value::from(2i64)).is_none());
        assert_eq!(env.bind("x", Value::from(3i64)), Some(Value::from(2i64)));
        assert_eq!(env.get("x"), Some(&Value::from(3i64)));
        assert!(env.known_identifiers().contains("x"));
        assert_eq!(env.unbind("x"), Some(Value::from(3i64)));
        assert!(env.get("x").is_none());
        env.set_ans(Value::Boolean(true));
        assert_eq!(env.ans(), Some(&Value::Boolean(true)));
        env.set_angle_unit(AngleUnit::Gradians);
        assert_eq!(env.angle_unit(), AngleUnit::Gradians);
    }

    #[test]
    fn test_tree_cache() {
        let mut env = Environment::default();
        assert!(env.cached_handle("x").is_none());
        let handle = env.cache_tree("x", Node::Variable("x".to_string()));
        assert_eq!(env.cached_handle("x"), Some(handle));
        assert_eq!(env.tree(handle), Some(&Node::Variable("x".to_string())));
        let other = env.cache_tree("y", Node::Variable("y".to_string()));
        assert_ne!(handle, other);

        let compiled = env.compiled(handle).unwrap();
        assert!(!env.is_outdated(compiled));
        // plain names do not change how texts are parsed, operator aliases do
        env.bind("x", Value::from(1i64));
        assert!(!env.is_outdated(env.compiled(handle).unwrap()));
        env.bind("max", Value::from(1i64));
        assert!(env.is_outdated(env.compiled(handle).unwrap()));
        env.recache_tree(handle, Node::Variable("z".to_string()));
        assert!(!env.is_outdated(env.compiled(handle).unwrap()));
        assert_eq!(env.tree(handle), Some(&Node::Variable("z".to_string())));
        env.unbind("max");
        assert!(env.is_outdated(env.compiled(handle).unwrap()));

        env.clear_cache();
        assert!(env.tree(handle).is_none());
        assert!(env.cached_handle("x").is_none());
        let fresh = env.cache_tree("x", Node::Variable("x".to_string()));
        assert!(fresh != handle && fresh != other);
    }
}
