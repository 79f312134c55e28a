pub mod array;
pub mod convert;
pub mod effect;
pub mod error;
pub mod function;
pub mod graph;
pub mod host;
pub mod object;
pub mod promise;
pub mod scheduler;
pub mod tracked;
pub mod value;

pub use array::{checked_length, ArrayRef, MAX_ARRAY_LENGTH, MAX_DENSE_LENGTH};
pub use convert::{from_json, make_reactive, to_json};
pub use effect::{effect, effect_with_scheduler, release, trigger, untracked, EffectHandle};
pub use error::{CallError, CallResult};
pub use function::{Callable, FunctionRef};
pub use graph::{graph_stats, track, GraphStats, Key, TargetId};
pub use host::{HostObject, HostRef};
pub use object::ObjectRef;
pub use promise::{PromiseValue, Resolver, Settled};
pub use scheduler::{Job, Scheduler};
pub use tracked::Tracked;
pub use value::{format_number, RefValue, Value};
