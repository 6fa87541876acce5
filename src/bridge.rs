//! Cross-surface messaging boundary.
//!
//! Two one-directional buses connect the page-resident session to the
//! editing surface: inbound [`PageMessage`]s drive the picker, outbound
//! [`SurfaceMessage`]s report pick results and ask for the editor to be
//! shown. Message kinds mirror the extension wire format (camelCase
//! `action` tags).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use tubedeck_core_types::{PickedElement, TubeError};
use tubedeck_event_bus::InMemoryBus;

/// Messages the session consumes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageMessage {
    StartPicker,
    StopPicker,
}

/// Messages the session produces for the editing surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SurfaceMessage {
    PickerResult(PickedElement),
    PickerCancelled,
    /// Ask the surface to open the shortcut editor.
    OpenEditor,
}

/// Paired buses for one session.
#[derive(Clone)]
pub struct Bridge {
    inbound: Arc<InMemoryBus<PageMessage>>,
    outbound: Arc<InMemoryBus<SurfaceMessage>>,
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            inbound: InMemoryBus::new(32),
            outbound: InMemoryBus::new(32),
        }
    }

    /// Surface side: send a command to the session.
    pub fn send_to_page(&self, message: PageMessage) -> Result<(), TubeError> {
        self.inbound.publish_sync(message)
    }

    /// Session side: report back to the surface. Delivery is best-effort;
    /// with no surface listening the message is dropped.
    pub fn send_to_surface(&self, message: SurfaceMessage) {
        let _ = self.outbound.publish_sync(message);
    }

    pub fn subscribe_page(&self) -> broadcast::Receiver<PageMessage> {
        self.inbound.subscribe()
    }

    pub fn subscribe_surface(&self) -> broadcast::Receiver<SurfaceMessage> {
        self.outbound.subscribe()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_messages_use_action_tags() {
        let json = serde_json::to_value(&PageMessage::StartPicker).unwrap();
        assert_eq!(json["action"], "startPicker");

        let parsed: PageMessage =
            serde_json::from_str("{\"action\":\"stopPicker\"}").unwrap();
        assert_eq!(parsed, PageMessage::StopPicker);
    }

    #[test]
    fn picker_result_carries_the_pick() {
        let message = SurfaceMessage::PickerResult(PickedElement {
            selector: "#share-button".into(),
            label: "Share".into(),
        });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["action"], "pickerResult");
        assert_eq!(json["selector"], "#share-button");
        assert_eq!(json["label"], "Share");
    }

    #[tokio::test]
    async fn bridge_routes_both_directions() {
        let bridge = Bridge::new();
        let mut page_rx = bridge.subscribe_page();
        let mut surface_rx = bridge.subscribe_surface();

        bridge.send_to_page(PageMessage::StartPicker).unwrap();
        assert_eq!(page_rx.recv().await.unwrap(), PageMessage::StartPicker);

        bridge.send_to_surface(SurfaceMessage::OpenEditor);
        assert_eq!(surface_rx.recv().await.unwrap(), SurfaceMessage::OpenEditor);
    }
}
