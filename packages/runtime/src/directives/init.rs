use crate::context::DirectiveContext;
use crate::runtime::Tendril;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("init", init);
    tendril.register_directive("effect", effect);
}

/// Run the expression once. A function value is not called.
fn init(cx: &DirectiveContext) {
    if cx.directive().expression.is_empty() {
        return;
    }
    cx.evaluate_later().without_auto_call().run(|_| {});
}

/// Re-run the expression whenever anything it read changes
fn effect(cx: &DirectiveContext) {
    let evaluation = cx.evaluate_later();
    cx.effect(move || evaluation.run(|_| {}));
}
