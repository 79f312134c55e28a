//! Arena-backed virtual DOM used as the host document for the runtime.

pub mod document;
pub mod error;
pub mod events;
pub mod form;
pub mod markup;
pub mod node;
pub mod observer;
pub mod selector;
pub mod style;

pub use document::Dom;
pub use error::{DomError, DomResult};
pub use events::{Event, EventTarget, KeyModifiers, Listener, ListenerId, ListenerOptions};
pub use markup::decode_entities;
pub use node::{is_void_element, ElementData, NodeId, NodeKind, NodeType};
pub use observer::{MutationBatch, MutationRecord};
pub use selector::Selector;
pub use style::{parse_declarations, parse_time_list, serialize_declarations};
