use crate::scope::ScopeChain;
use std::any::Any;
use std::rc::Rc;
use tendril_reactivity::{HostObject, Value};

/// Resolves `$`-prefixed magic properties for one element
pub trait MagicResolver {
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// Everything an expression can see besides its own locals
#[derive(Clone, Default)]
pub struct Env {
    chain: ScopeChain,
    extras: Rc<Vec<(Rc<str>, Value)>>,
    magics: Option<Rc<dyn MagicResolver>>,
}

impl Env {
    pub fn new(chain: ScopeChain) -> Self {
        Self {
            chain,
            ..Self::default()
        }
    }

    pub fn with_magics(mut self, magics: Rc<dyn MagicResolver>) -> Self {
        self.magics = Some(magics);
        self
    }

    /// Add a call-site value such as `$event`
    pub fn with_extra(mut self, name: &str, value: Value) -> Self {
        Rc::make_mut(&mut self.extras).push((Rc::from(name), value));
        self
    }

    pub fn chain(&self) -> &ScopeChain {
        &self.chain
    }

    pub fn extra(&self, name: &str) -> Option<Value> {
        self.extras
            .iter()
            .rev()
            .find(|(key, _)| &**key == name)
            .map(|(_, value)| value.clone())
    }

    /// Extras, then magics, then the scope chain
    pub fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.extra(name) {
            return Some(value);
        }
        if name.starts_with('$') {
            if let Some(value) = self.magics.as_ref().and_then(|magics| magics.resolve(name)) {
                return Some(value);
            }
        }
        self.chain.lookup(name)
    }

    pub fn assign(&self, name: &str, value: Value) -> bool {
        self.chain.assign(name, value)
    }

    /// The merged scope as a value, used as `this` for top-level code and
    /// for functions called without a receiver
    pub fn this_value(&self) -> Value {
        Value::Host(Rc::new(ScopeProxy { env: self.clone() }))
    }
}

/// Host view over an environment: reads resolve like identifiers, writes
/// go to the owning scope
pub struct ScopeProxy {
    env: Env,
}

impl ScopeProxy {
    pub fn env(&self) -> &Env {
        &self.env
    }
}

impl HostObject for ScopeProxy {
    fn type_name(&self) -> &str {
        "Scope"
    }

    fn get(&self, key: &str) -> Value {
        self.env.resolve(key).unwrap_or_default()
    }

    fn set(&self, key: &str, value: Value) -> bool {
        self.env.assign(key, value)
    }

    fn keys(&self) -> Vec<String> {
        self.env.chain.keys().iter().map(|key| key.to_string()).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
