use crate::source::Position;
use crate::types::{Function, FunctionBody, NativeFn, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("undefined variable '{0}'. {1}")]
    UndefinedVariable(String, Position), // Variable name, position where lookup happened
}

// --- Environment Definition ---

/// Shared handle to a scope frame. Closures hold one of these, and so do
/// the frames nested inside them.
pub type Env = Rc<RefCell<Environment>>;

#[derive(Debug)]
pub struct Environment {
    outer: Option<Env>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Env {
        Rc::new(RefCell::new(Environment {
            outer: None,
            bindings: HashMap::new(),
        }))
    }

    /// A global environment with the native prelude installed.
    pub fn new_global_populated() -> Env {
        let env_ptr = Environment::new(); // Create empty global env
        crate::natives::install(&env_ptr);
        env_ptr
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Env) -> Env {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    /// `pos` is where the variable was referenced, used for error reporting.
    pub fn get(&self, name: &str, pos: Position) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            Ok(value.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, pos),
                // Reached the top-level environment without finding it
                None => Err(EnvError::UndefinedVariable(name.to_string(), pos)),
            }
        }
    }

    /// Looks up a binding of this frame only.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned()
    }

    pub fn remove_local(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    /// Sets the value of an *existing* variable in the environment chain.
    /// Searches outward from the current environment and updates the first frame
    /// where the variable is found. Errors if the variable is not defined.
    pub fn assign(&mut self, name: &str, value: Value, pos: Position) -> Result<(), EnvError> {
        if let Some(slot) = self.bindings.get_mut(name) {
            *slot = value;
            Ok(())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow_mut().assign(name, value, pos),
                None => Err(EnvError::UndefinedVariable(name.to_string(), pos)),
            }
        }
    }

    /// Drops every binding of this frame. Functions capture the frame they
    /// are declared in, so a global frame must be cleared to be freed.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Installs a native function under `name` in this frame. Natives get a
    /// frame of their own for their arguments, detached from `env`.
    pub fn define_native(env: &Env, name: &str, params: &[&str], func: NativeFn) {
        let function = Function {
            name: Some(name.to_string()),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: FunctionBody::Native(func),
            env: Environment::new(),
        };
        env.borrow_mut()
            .define(name, Value::Function(Rc::new(function)));
    }

    fn add_identifiers(&self, mut identifiers: HashSet<String>) -> HashSet<String> {
        identifiers.extend(self.bindings.keys().cloned());
        match &self.outer {
            Some(outer_env_ptr) => outer_env_ptr.borrow().add_identifiers(identifiers),
            None => identifiers,
        }
    }

    /// Gets all identifiers visible from the current environment
    pub fn get_identifiers(&self) -> HashSet<String> {
        self.add_identifiers(HashSet::new())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::number(n)
    }

    fn get(env: &Env, name: &str) -> String {
        env.borrow()
            .get(name, Position::default())
            .map(|v| v.to_string())
            .unwrap_or_else(|e| panic!("lookup failed: {}", e))
    }

    #[test]
    fn test_define_and_get_global() {
        let env = Environment::new();
        env.borrow_mut().define("x", num(10.0));
        assert_eq!(get(&env, "x"), "10");
    }

    #[test]
    fn test_get_undefined() {
        let env = Environment::new_enclosed(Environment::new());
        let pos = Position::new(2, 7);
        let result = env.borrow().get("z", pos);
        assert_eq!(
            result.unwrap_err(),
            EnvError::UndefinedVariable("z".to_string(), pos)
        );
    }

    #[test]
    fn test_undefined_message() {
        let err = EnvError::UndefinedVariable("q".to_string(), Position::new(1, 4));
        assert_eq!(err.to_string(), "undefined variable 'q'. [1,4]");
    }

    #[test]
    fn test_shadowing_does_not_walk_outward() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x", num(10.0));

        let local_env = Environment::new_enclosed(global_env.clone());
        local_env.borrow_mut().define("x", num(50.0));

        assert_eq!(get(&local_env, "x"), "50");
        assert_eq!(get(&global_env, "x"), "10");
    }

    #[test]
    fn test_assign_mutates_owning_frame() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x", num(1.0));
        let block = Environment::new_enclosed(global_env.clone());

        block
            .borrow_mut()
            .assign("x", num(2.0), Position::default())
            .unwrap();

        assert_eq!(get(&global_env, "x"), "2");
        assert!(block.borrow().get_local("x").is_none());
    }

    #[test]
    fn test_assign_undefined_fails() {
        let env = Environment::new();
        let result = env
            .borrow_mut()
            .assign("nope", num(1.0), Position::default());
        assert!(matches!(result, Err(EnvError::UndefinedVariable(name, _)) if name == "nope"));
    }

    #[test]
    fn test_identifiers_include_outer_frames() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("a", num(1.0));
        let inner = Environment::new_enclosed(global_env);
        inner.borrow_mut().define("b", num(2.0));

        let identifiers = inner.borrow().get_identifiers();
        assert!(identifiers.contains("a") && identifiers.contains("b"));
    }

    #[test]
    fn test_populated_global_has_natives() {
        let env = Environment::new_global_populated();
        let echo = env.borrow().get("echo", Position::default()).unwrap();
        assert!(matches!(echo, Value::Function(f) if f.is_native()));
    }

    #[test]
    fn test_prelude_does_not_keep_global_alive() {
        let env = Environment::new_global_populated();
        let weak = Rc::downgrade(&env);
        drop(env);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_clear_breaks_function_cycles() {
        let global_env = Environment::new_global_populated();
        let function = Function {
            name: Some("f".to_string()),
            params: Vec::new(),
            body: FunctionBody::Script(Vec::new().into()),
            env: Environment::new_enclosed(global_env.clone()),
        };
        global_env
            .borrow_mut()
            .define("f", Value::Function(Rc::new(function)));
        let weak = Rc::downgrade(&global_env);

        global_env.borrow_mut().clear();
        assert!(global_env.borrow().get_identifiers().is_empty());
        drop(global_env);
        assert!(weak.upgrade().is_none());
    }
}
