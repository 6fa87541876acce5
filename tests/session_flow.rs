//! End-to-end session behavior against an in-process page and store.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use tubedeck::{
    storage, Bridge, KeyValueStore, MemoryStore, PageMessage, Session, SessionConfig, Settings,
    SurfaceMessage, SwapTiming, CLONE_ID,
};
use tubedeck_dom::{Page, Rect};
use tubedeck_relocator::RelocateOptions;

fn watch_page(info_text: &str) -> Page {
    let page = Page::new();
    let top_row = page.create_element_with("div", &[("id", "top-row")]);
    page.append_child(page.body(), top_row).unwrap();

    let owner = page.create_element_with("div", &[("id", "owner")]);
    page.append_child(top_row, owner).unwrap();
    let renderer = page.create_element("ytd-video-owner-renderer");
    page.append_child(owner, renderer).unwrap();
    let upload_info = page.create_element_with("div", &[("id", "upload-info")]);
    page.append_child(renderer, upload_info).unwrap();
    let sub_count =
        page.create_element_with("yt-formatted-string", &[("id", "owner-sub-count")]);
    page.append_child(upload_info, sub_count).unwrap();
    let subscribe = page.create_element_with("div", &[("id", "subscribe-button")]);
    page.append_child(top_row, subscribe).unwrap();

    let watch_info = page.create_element("ytd-watch-info-text");
    page.append_child(page.body(), watch_info).unwrap();
    let container = page.create_element_with("div", &[("id", "info-container")]);
    page.append_child(watch_info, container).unwrap();
    let info = page.create_element_with("div", &[("id", "info")]);
    page.append_child(container, info).unwrap();
    let text = page.create_text(info_text);
    page.append_child(info, text).unwrap();

    page
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        relocate: RelocateOptions {
            timeout: Duration::from_millis(500),
            relocate_buttons: false,
        },
        timing: SwapTiming {
            swap_delay: Duration::from_millis(10),
            settle_delay: Duration::from_millis(10),
        },
    }
}

async fn start_session(page: &Page) -> (Session, Arc<MemoryStore>, Bridge) {
    let store = Arc::new(MemoryStore::new());
    let bridge = Bridge::new();
    let session = Session::initialize(page, store.clone(), bridge.clone(), fast_config())
        .await
        .unwrap();
    (session, store, bridge)
}

#[tokio::test]
async fn bootstrap_builds_a_filtered_clone() {
    let page = watch_page("123,456 views  Mar 15, 2024");
    let (session, _store, _bridge) = start_session(&page).await;

    let clone = page
        .query_selector(&format!("#{CLONE_ID}"))
        .unwrap()
        .expect("clone inserted");
    assert_eq!(page.text_content(clone), "123,456 views Mar 15, 2024");

    session.shutdown();
    assert_eq!(page.query_selector(&format!("#{CLONE_ID}")).unwrap(), None);
    assert_eq!(page.observer_count(), 0);
    assert_eq!(page.input_handler_count(), 0);
}

#[tokio::test]
async fn source_mutations_flow_into_the_clone() {
    let page = watch_page("100 views  1 hour ago");
    let (session, _store, _bridge) = start_session(&page).await;

    let info = page.query_selector("#info").unwrap().unwrap();
    page.set_text_content(info, "101 views  1 hour ago").unwrap();
    sleep(Duration::from_millis(100)).await;

    let clone = page.query_selector(&format!("#{CLONE_ID}")).unwrap().unwrap();
    assert_eq!(page.text_content(clone), "101 views 1 hour ago");

    session.shutdown();
}

#[tokio::test]
async fn hotkeys_click_their_controls() {
    let page = watch_page("9 views  1 day ago");
    let like = page.create_element_with("button", &[("aria-label", "like this video")]);
    page.append_child(page.body(), like).unwrap();
    let (session, _store, _bridge) = start_session(&page).await;

    assert!(page.dispatch_key(",").is_consumed());
    assert_eq!(page.click_count(like), 1);

    session.shutdown();
}

#[tokio::test]
async fn picker_flow_reports_and_persists_the_pick() {
    let page = watch_page("9 views  1 day ago");
    let share = page.create_element_with("button", &[("id", "share-button")]);
    page.set_text_content(share, "Share").unwrap();
    page.set_rect(share, Rect::new(200.0, 200.0, 60.0, 24.0)).unwrap();
    page.append_child(page.body(), share).unwrap();

    let (session, store, bridge) = start_session(&page).await;
    let mut surface_rx = bridge.subscribe_surface();

    bridge.send_to_page(PageMessage::StartPicker).unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(session.is_picking());

    page.dispatch_click(210.0, 210.0);
    sleep(Duration::from_millis(50)).await;
    assert!(!session.is_picking());

    match surface_rx.recv().await.unwrap() {
        SurfaceMessage::PickerResult(picked) => {
            assert_eq!(picked.selector, "#share-button");
            assert_eq!(picked.label, "Share");
        }
        other => panic!("unexpected surface message: {other:?}"),
    }
    assert_eq!(surface_rx.recv().await.unwrap(), SurfaceMessage::OpenEditor);

    let stored = store.get("pickedElement").await.unwrap().unwrap();
    assert_eq!(stored["selector"], "#share-button");

    session.shutdown();
}

#[tokio::test]
async fn escape_cancels_and_still_opens_the_editor() {
    let page = watch_page("9 views  1 day ago");
    let (session, _store, bridge) = start_session(&page).await;
    let mut surface_rx = bridge.subscribe_surface();

    bridge.send_to_page(PageMessage::StartPicker).unwrap();
    sleep(Duration::from_millis(50)).await;

    page.dispatch_key("Escape");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(surface_rx.recv().await.unwrap(), SurfaceMessage::PickerCancelled);
    assert_eq!(surface_rx.recv().await.unwrap(), SurfaceMessage::OpenEditor);
    assert!(!session.is_picking());

    session.shutdown();
}

#[tokio::test]
async fn settings_toggle_tears_down_and_rebuilds_the_clone() {
    let page = watch_page("55 views  2 days ago");
    let (session, store, _bridge) = start_session(&page).await;
    assert!(page.query_selector(&format!("#{CLONE_ID}")).unwrap().is_some());

    let mut settings = Settings::default();
    settings.relocate_info = false;
    storage::save(store.as_ref(), "settings", &settings).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(page.query_selector(&format!("#{CLONE_ID}")).unwrap(), None);
    assert_eq!(page.observer_count(), 0);

    settings.relocate_info = true;
    storage::save(store.as_ref(), "settings", &settings).await.unwrap();
    sleep(Duration::from_millis(200)).await;
    assert!(page.query_selector(&format!("#{CLONE_ID}")).unwrap().is_some());

    session.shutdown();
}

#[tokio::test]
async fn navigation_rebuilds_without_duplicating_observers() {
    let page = watch_page("7 views  3 weeks ago");
    page.set_url("https://example.test/watch?v=1");
    let (session, _store, _bridge) = start_session(&page).await;
    let observers_after_boot = page.observer_count();

    page.set_url("https://example.test/watch?v=2");
    sleep(Duration::from_millis(200)).await;

    assert_eq!(
        page.query_selector_all(&format!("#{CLONE_ID}")).unwrap().len(),
        1
    );
    assert_eq!(page.observer_count(), observers_after_boot);

    session.shutdown();
}
