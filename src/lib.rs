//! Tubedeck: hotkeys, watch-info relocation and element picking for a
//! video watch page.
//!
//! The workspace crates carry the DOM-synchronization engine (waiting,
//! extraction, relocation, watching, picking, selector synthesis); this
//! crate supplies the runtime around it: the storage and messaging
//! collaborators and the [`session::Session`] that wires everything to
//! one page.

pub mod bridge;
pub mod session;
pub mod storage;

pub use bridge::{Bridge, PageMessage, SurfaceMessage};
pub use session::{Session, SessionConfig};
pub use storage::{KeyValueStore, MemoryStore, StorageError, StoreChange};

pub use tubedeck_core_types::{
    CustomShortcut, CustomShortcuts, HotkeyMap, NodeId, PickedElement, Settings, CLONE_ID,
    LAST_TEXT_ATTR,
};
pub use tubedeck_dom::Page;
pub use tubedeck_hotkeys::Hotkeys;
pub use tubedeck_picker::{PickOutcome, Picker};
pub use tubedeck_relocator::{RelocateOptions, RelocateOutcome};
pub use tubedeck_watcher::{InfoWatcher, SwapTiming};

/// Install the global tracing subscriber, honoring `RUST_LOG` with an
/// `info` default. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
