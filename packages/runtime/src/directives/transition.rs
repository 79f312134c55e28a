//! `transition`: declare the enter/leave phases `show` and `if` animate with
//!
//! Without an expression the modifiers pick an opacity/scale preset
//! (`.opacity`, `.scale.90`, `.duration.300ms`, `.origin.top`, `.in`, `.out`).
//! With a value the expression is a class list for that stage, as in
//! `transition:enter-start="opacity-0"`.

use crate::context::DirectiveContext;
use crate::diagnostics::DiagnosticKind;
use crate::runtime::Tendril;
use tendril_evaluator::Binding;
use tendril_reactivity::Value;
use tracing::trace;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("transition", transition);
}

fn transition(cx: &DirectiveContext) {
    let tendril = cx.tendril();
    let el = cx.el();
    let classes = match &cx.directive().expression {
        Binding::Function(_) => match cx.evaluate() {
            Value::Bool(false) => return,
            Value::String(classes) => classes.to_string(),
            _ => String::new(),
        },
        Binding::Source(source) => source.trim().to_string(),
    };
    let stage = Some(cx.value()).filter(|value| !value.is_empty());

    if classes.is_empty() {
        trace!(?el, ?stage, "Transition from modifiers");
        let modifiers = cx.directive().modifiers.clone();
        tendril.configure_transition(el, |config| config.apply_helper(&modifiers, stage));
        return;
    }

    let Some(stage) = stage else {
        tendril.warn(
            DiagnosticKind::Misuse,
            format!(
                "`{}` with classes needs a stage such as `{}:enter`",
                cx.directive().original,
                tendril.attribute_name("transition")
            ),
            Some(el),
        );
        return;
    };
    let mut known = true;
    tendril.configure_transition(el, |config| known = config.set_stage_classes(stage, &classes));
    if !known {
        tendril.warn(
            DiagnosticKind::Misuse,
            format!("Unknown transition stage `{stage}`"),
            Some(el),
        );
    }
}
