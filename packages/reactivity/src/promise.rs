use crate::value::Value;
use futures::channel::oneshot;
use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

pub type Settled = Result<Value, Value>;

type SharedFuture = Shared<LocalBoxFuture<'static, Settled>>;

/// An asynchronous value: a shared local future settling to fulfilled or rejected
#[derive(Clone)]
pub struct PromiseValue {
    future: SharedFuture,
    identity: Rc<()>,
}

impl PromiseValue {
    pub fn from_future(future: impl Future<Output = Settled> + 'static) -> Self {
        Self {
            future: future.boxed_local().shared(),
            identity: Rc::new(()),
        }
    }

    pub fn resolved(value: Value) -> Self {
        Self::from_future(futures::future::ready(Ok(value)))
    }

    pub fn rejected(reason: Value) -> Self {
        Self::from_future(futures::future::ready(Err(reason)))
    }

    /// A pending promise and the handle that settles it
    pub fn deferred() -> (Self, Resolver) {
        let (sender, receiver) = oneshot::channel();
        let promise = Self::from_future(async move {
            match receiver.await {
                Ok(settled) => settled,
                Err(oneshot::Canceled) => Err(Value::from("Promise resolver dropped")),
            }
        });
        (promise, Resolver { sender })
    }

    /// The settled result if it is already available without waiting
    pub fn now_or_never(&self) -> Option<Settled> {
        self.future.clone().now_or_never()
    }

    /// A future resolving to the settled result; may be awaited any number of times
    pub fn settled(&self) -> SharedFuture {
        self.future.clone()
    }

    pub fn ptr_eq(&self, other: &PromiseValue) -> bool {
        Rc::ptr_eq(&self.identity, &other.identity)
    }
}

impl fmt::Debug for PromiseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Promise")
    }
}

pub struct Resolver {
    sender: oneshot::Sender<Settled>,
}

impl Resolver {
    pub fn resolve(self, value: Value) {
        let _ = self.sender.send(Ok(value));
    }

    pub fn reject(self, reason: Value) {
        let _ = self.sender.send(Err(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_is_available_synchronously() {
        let promise = PromiseValue::resolved(Value::from(4.0));
        assert_eq!(promise.now_or_never(), Some(Ok(Value::from(4.0))));
    }

    #[test]
    fn test_deferred_settles_after_resolve() {
        let (promise, resolver) = PromiseValue::deferred();
        assert_eq!(promise.now_or_never(), None);

        resolver.resolve(Value::from("done"));
        assert_eq!(promise.now_or_never(), Some(Ok(Value::from("done"))));
        // Shared futures can be observed repeatedly
        assert!(promise.clone().now_or_never().is_some());
    }

    #[test]
    fn test_dropped_resolver_rejects() {
        let (promise, resolver) = PromiseValue::deferred();
        drop(resolver);
        assert!(matches!(promise.now_or_never(), Some(Err(_))));
    }
}
