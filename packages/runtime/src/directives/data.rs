//! `data`: declare a component scope

use crate::context::DirectiveContext;
use crate::runtime::Tendril;
use tendril_evaluator::Binding;
use tendril_reactivity::{FunctionRef, ObjectRef, Value};
use tracing::debug;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("data", data);
}

fn data(cx: &DirectiveContext) {
    let tendril = cx.tendril();
    let el = cx.el();
    let expression = match &cx.directive().expression {
        binding if binding.is_empty() => Binding::from("{}"),
        binding => binding.clone(),
    };

    // Registered providers are callable by name from the expression
    let providers = tendril.inner.registry.borrow().data_providers();
    let extras: Vec<(String, Value)> = providers
        .into_iter()
        .map(|(name, provider)| {
            let function = FunctionRef::named(&name, move |_, args| Ok(provider(args)));
            (name, Value::Function(function))
        })
        .collect();
    let value = tendril
        .evaluate_later(el, expression)
        .value_with(extras.iter().map(|(name, value)| (name.as_str(), value.clone())).collect());

    let scope = match value {
        Value::Object(object) => object,
        _ => ObjectRef::new(),
    };
    debug!(?el, keys = scope.len(), "Component scope created");
    tendril.nodes().add_scope(tendril.dom(), el, scope.clone(), None);

    if let Some(init) = scope.get_raw("init").and_then(|init| init.as_function().cloned()) {
        tendril.evaluate_later(el, Binding::Function(init)).run(|_| {});
    }

    let weak = tendril.downgrade();
    cx.cleanup(move || {
        let Some(tendril) = weak.upgrade() else {
            return;
        };
        if let Some(destroy) = scope.get_raw("destroy").and_then(|destroy| destroy.as_function().cloned()) {
            tendril.evaluate_later(el, Binding::Function(destroy)).run(|_| {});
        }
        tendril.nodes().remove_scope(el, &scope);
    });
}
