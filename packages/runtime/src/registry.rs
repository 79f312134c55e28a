//! Registration points for directives, magics, data providers and named bindings.
//!
//! A `Registry` belongs to one [`crate::Tendril`] instance. It is filled with the
//! built-ins at construction and only changes through the registration calls.

use crate::context::{DirectiveContext, MagicContext};
use crate::directive::{BUILTIN_ORDER, DEFAULT_SLOT};
use indexmap::IndexMap;
use std::rc::Rc;
use tendril_dom::NodeId;
use tendril_reactivity::Value;
use tracing::debug;

pub trait DirectiveHandler {
    /// Runs as soon as the tree walk reaches the element, before any deferred
    /// handler of the walk
    fn inline(&self, _cx: &DirectiveContext) {}

    fn handle(&self, cx: &DirectiveContext);
}

impl<F> DirectiveHandler for F
where
    F: Fn(&DirectiveContext),
{
    fn handle(&self, cx: &DirectiveContext) {
        self(cx)
    }
}

pub type SharedHandler = Rc<dyn DirectiveHandler>;
pub type MagicFn = Rc<dyn Fn(&MagicContext) -> Value>;
pub type DataProvider = Rc<dyn Fn(Vec<Value>) -> Value>;
pub type BindingProvider = Rc<dyn Fn(NodeId, Vec<Value>) -> Value>;

pub struct Registry {
    directives: IndexMap<String, SharedHandler>,
    order: Vec<String>,
    magics: IndexMap<String, MagicFn>,
    data_providers: IndexMap<String, DataProvider>,
    bindings: IndexMap<String, BindingProvider>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            directives: IndexMap::new(),
            order: BUILTIN_ORDER.iter().map(|kind| kind.to_string()).collect(),
            magics: IndexMap::new(),
            data_providers: IndexMap::new(),
            bindings: IndexMap::new(),
        }
    }

    pub fn add_directive(&mut self, name: &str, handler: SharedHandler) {
        if self.directives.insert(name.to_string(), handler).is_some() {
            debug!(directive = name, "Replaced directive handler");
        }
    }

    /// Run `name` right before `other`
    pub fn order_before(&mut self, name: &str, other: &str) {
        self.order.retain(|kind| kind != name);
        let index = self
            .order
            .iter()
            .position(|kind| kind == other)
            .or_else(|| self.order.iter().position(|kind| kind == DEFAULT_SLOT))
            .unwrap_or(self.order.len());
        self.order.insert(index, name.to_string());
    }

    pub fn directive(&self, name: &str) -> Option<SharedHandler> {
        self.directives.get(name).cloned()
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn add_magic(&mut self, name: &str, magic: MagicFn) {
        self.magics.insert(name.trim_start_matches('$').to_string(), magic);
    }

    pub fn magic(&self, name: &str) -> Option<MagicFn> {
        self.magics.get(name.trim_start_matches('$')).cloned()
    }

    pub fn has_magic(&self, name: &str) -> bool {
        self.magics.contains_key(name.trim_start_matches('$'))
    }

    pub fn add_data_provider(&mut self, name: &str, provider: DataProvider) {
        self.data_providers.insert(name.to_string(), provider);
    }

    pub fn data_providers(&self) -> Vec<(String, DataProvider)> {
        self.data_providers
            .iter()
            .map(|(name, provider)| (name.clone(), provider.clone()))
            .collect()
    }

    pub fn add_binding(&mut self, name: &str, provider: BindingProvider) {
        self.bindings.insert(name.to_string(), provider);
    }

    pub fn bindings(&self) -> Vec<(String, BindingProvider)> {
        self.bindings
            .iter()
            .map(|(name, provider)| (name.clone(), provider.clone()))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
