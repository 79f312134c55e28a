//! Reactive behavior for server-rendered markup.
//!
//! Elements opt in through prefixed attributes (`x-data`, `x-bind:class`,
//! `x-on:click`, ...). A [`Tendril`] walks the document, binds each attribute
//! to its registered directive and keeps the DOM in step with reactive state.

mod bridge;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod directive;
pub mod directives;
pub mod error;
pub mod host;
pub mod keyed;
mod lifecycle;
mod magics;
pub mod nodes;
pub mod registry;
pub mod runtime;
mod store;
mod ticks;
pub mod transition;

#[cfg(test)]
mod tests_directives;

#[cfg(test)]
mod tests_lifecycle;

#[cfg(test)]
mod tests_transitions;

pub use config::{Config, DEFAULT_CONFIG_NAME};
pub use context::{DirectiveContext, Evaluation, MagicContext};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use directive::Directive;
pub use directives::{bind_attribute, bind_value, listen, Listen};
pub use error::{TendrilError, TendrilResult};
pub use host::{element_of, event_detail, ElementHost, EventHost};
pub use keyed::{diff_keys, first_occurrences, KeyedDiff};
pub use nodes::{Cleanup, Cleanups};
pub use registry::DirectiveHandler;
pub use runtime::{DirectiveOrder, ErrorHook, Tendril, WeakTendril};
pub use transition::{Direction, InFlight, Phases, StageSet, TransitionConfig};
