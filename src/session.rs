//! Session runtime.
//!
//! One [`Session`] per page owns every piece of live state: the hotkey
//! bindings, the relocated info clone and its watcher, and the picker.
//! It loads configuration from storage at startup and then reacts to
//! three event sources: storage-change notifications, surface messages,
//! and page navigations. Teardown hooks undo exactly what initialization
//! built, so navigations and feature toggles can cycle features without
//! accumulating observers or overlays.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tubedeck_core_types::{CustomShortcuts, HotkeyMap, NodeId, Settings};
use tubedeck_dom::{HandlerGuard, Page};
use tubedeck_hotkeys::Hotkeys;
use tubedeck_picker::{PickOutcome, Picker};
use tubedeck_relocator::{
    relocate_watch_info, remove_cloned_info, RelocateOptions, RelocateOutcome,
    INFO_CONTAINER_SELECTOR,
};
use tubedeck_watcher::{InfoWatcher, SwapTiming};

use crate::bridge::{Bridge, PageMessage, SurfaceMessage};
use crate::storage::{
    self, KeyValueStore, StoreChange, KEY_CUSTOM_SHORTCUTS, KEY_HOTKEYS, KEY_PICKED_ELEMENT,
    KEY_SETTINGS,
};

/// Tunables for one session. Defaults match production behavior; tests
/// shrink the timings.
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub relocate: RelocateOptions,
    pub timing: SwapTiming,
}

struct Inner {
    page: Page,
    store: Arc<dyn KeyValueStore>,
    bridge: Bridge,
    config: SessionConfig,
    hotkeys: Hotkeys,
    picker: Picker,
    settings: RwLock<Settings>,
    watcher: Mutex<Option<InfoWatcher>>,
}

/// A running content-script session.
pub struct Session {
    inner: Arc<Inner>,
    // Held for its Drop side effect.
    _hotkey_guard: HandlerGuard,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Load configuration, install the key handler, start the relocation
    /// feature when enabled, and spawn the reaction loops.
    pub async fn initialize(
        page: &Page,
        store: Arc<dyn KeyValueStore>,
        bridge: Bridge,
        config: SessionConfig,
    ) -> Result<Self> {
        let map = match store.get(KEY_HOTKEYS).await? {
            Some(value) => serde_json::from_value(value)?,
            None => HotkeyMap::builtin_defaults(),
        };
        let custom: CustomShortcuts =
            storage::load_or_default(store.as_ref(), KEY_CUSTOM_SHORTCUTS).await?;
        let settings: Settings = storage::load_or_default(store.as_ref(), KEY_SETTINGS).await?;
        info!(
            bindings = map.len(),
            custom = custom.len(),
            relocate = settings.relocate_info,
            "session starting"
        );

        let hotkeys = Hotkeys::new(page, map, custom);
        let hotkey_guard = hotkeys.install();

        let inner = Arc::new(Inner {
            page: page.clone(),
            store: store.clone(),
            bridge,
            config,
            hotkeys,
            picker: Picker::new(page),
            settings: RwLock::new(settings.clone()),
            watcher: Mutex::new(None),
        });

        if settings.relocate_info {
            inner.start_relocation().await;
        }

        let tasks = vec![
            tokio::spawn(storage_loop(inner.clone(), store.subscribe())),
            tokio::spawn(message_loop(inner.clone(), inner.bridge.subscribe_page())),
            tokio::spawn(navigation_loop(inner.clone(), page.subscribe_navigation())),
        ];

        Ok(Self {
            inner,
            _hotkey_guard: hotkey_guard,
            tasks,
        })
    }

    pub fn is_picking(&self) -> bool {
        self.inner.picker.is_active()
    }

    /// Stop every loop and undo the page modifications.
    pub fn shutdown(self) {
        debug!("session shutting down");
        for task in &self.tasks {
            task.abort();
        }
        self.inner.picker.stop();
        self.inner.teardown_relocation();
        // Key handler deregisters as the guard drops.
    }
}

impl Inner {
    /// Run the relocation flow; every failure mode is recovered locally
    /// and only degrades this feature.
    async fn start_relocation(&self) {
        match relocate_watch_info(&self.page, &self.config.relocate).await {
            Ok(RelocateOutcome::Relocated { clone, info }) => self.attach_watcher(info, clone),
            Ok(RelocateOutcome::AlreadyPresent) => debug!("info clone already present"),
            Ok(RelocateOutcome::NotReady) => debug!("watch info not rendered yet"),
            Err(err) => debug!(error = %err, "info relocation skipped"),
        }
    }

    /// Replace the watcher slot, disconnecting any previous pair first.
    fn attach_watcher(&self, info: NodeId, clone: NodeId) {
        let wrapper = self
            .page
            .query_selector(INFO_CONTAINER_SELECTOR)
            .ok()
            .flatten();

        let mut slot = self.watcher.lock();
        if let Some(previous) = slot.take() {
            previous.disconnect();
        }
        match InfoWatcher::attach(&self.page, info, wrapper, clone, self.config.timing) {
            Ok(watcher) => *slot = Some(watcher),
            Err(err) => warn!(error = %err, "could not watch the info source"),
        }
    }

    fn teardown_relocation(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.disconnect();
        }
        if let Err(err) = remove_cloned_info(&self.page) {
            warn!(error = %err, "removing the info clone failed");
        }
    }

    async fn apply_store_change(&self, change: StoreChange) {
        match change.key.as_str() {
            KEY_HOTKEYS => match serde_json::from_value::<HotkeyMap>(change.value) {
                Ok(map) => {
                    info!(bindings = map.len(), "hotkeys updated");
                    self.hotkeys.set_map(map);
                }
                Err(err) => warn!(error = %err, "ignoring malformed hotkeys update"),
            },
            KEY_CUSTOM_SHORTCUTS => {
                match serde_json::from_value::<CustomShortcuts>(change.value) {
                    Ok(custom) => {
                        info!(custom = custom.len(), "custom shortcuts updated");
                        self.hotkeys.set_custom_shortcuts(custom);
                    }
                    Err(err) => warn!(error = %err, "ignoring malformed shortcuts update"),
                }
            }
            KEY_SETTINGS => match serde_json::from_value::<Settings>(change.value) {
                Ok(next) => self.apply_settings(next).await,
                Err(err) => warn!(error = %err, "ignoring malformed settings update"),
            },
            _ => {}
        }
    }

    async fn apply_settings(&self, next: Settings) {
        let previous = {
            let mut settings = self.settings.write();
            std::mem::replace(&mut *settings, next.clone())
        };
        info!(relocate = next.relocate_info, "settings updated");

        if previous.relocate_info && !next.relocate_info {
            self.teardown_relocation();
        } else if next.relocate_info {
            // Idempotent when the clone is already in place.
            self.start_relocation().await;
        }
    }

    /// Begin a pick and forward its outcome to storage and the surface.
    fn start_picker(self: &Arc<Self>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        match self.picker.start(tx) {
            Ok(true) => {}
            // An active session keeps its original outcome channel.
            Ok(false) => return,
            Err(err) => {
                warn!(error = %err, "picker could not start");
                return;
            }
        }

        let inner = self.clone();
        tokio::spawn(async move {
            let Some(outcome) = rx.recv().await else {
                return;
            };
            match outcome {
                PickOutcome::Picked(picked) => {
                    if let Err(err) =
                        storage::save(inner.store.as_ref(), KEY_PICKED_ELEMENT, &picked).await
                    {
                        warn!(error = %err, "persisting the pick failed");
                    }
                    inner
                        .bridge
                        .send_to_surface(SurfaceMessage::PickerResult(picked));
                }
                PickOutcome::Cancelled => {
                    inner.bridge.send_to_surface(SurfaceMessage::PickerCancelled);
                }
            }
            inner.bridge.send_to_surface(SurfaceMessage::OpenEditor);
        });
    }

    /// Page navigation: rebuild the page-coupled features for the new
    /// document state.
    async fn on_navigation(&self, url: &str) {
        debug!(url, "navigation, rebuilding page features");
        self.picker.cancel();
        self.teardown_relocation();
        let relocate = self.settings.read().relocate_info;
        if relocate {
            self.start_relocation().await;
        }
    }
}

async fn storage_loop(inner: Arc<Inner>, mut rx: broadcast::Receiver<StoreChange>) {
    loop {
        match rx.recv().await {
            Ok(change) => inner.apply_store_change(change).await,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "storage notifications lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn message_loop(inner: Arc<Inner>, mut rx: broadcast::Receiver<PageMessage>) {
    loop {
        match rx.recv().await {
            Ok(PageMessage::StartPicker) => inner.start_picker(),
            Ok(PageMessage::StopPicker) => inner.picker.stop(),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "surface messages lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn navigation_loop(inner: Arc<Inner>, mut rx: broadcast::Receiver<String>) {
    loop {
        match rx.recv().await {
            Ok(url) => inner.on_navigation(&url).await,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "navigation events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
