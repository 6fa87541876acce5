//! Live page substrate
//!
//! The one crate that knows how to query, mutate, observe and hit-test the
//! page tree; every engine crate talks to the page through [`Page`].

mod errors;
mod input;
mod node;
mod observer;
mod page;
mod selector;
mod style;
mod tree;

pub use errors::DomError;
pub use input::{Handled, InputEvent, InputHandler};
pub use node::Rect;
pub use observer::{MutationKind, MutationRecord, MutationStream, ObserveOptions};
pub use page::{HandlerGuard, ObserverGuard, Page};

pub use tubedeck_core_types::NodeId;
