//! Item detail controller tests against a scripted transport.

mod common;

use common::{api_error, identified_movie, movie, ok, ScriptedTransport};
use futures::poll;
use mediashelf::{ItemDetailController, LibraryEvent, LibraryEvents, ShelfError};
use reqwest::Method;
use shared::ImageSource;

fn item_path(id: i64) -> String {
    format!("/api/library/items/{id}")
}

#[tokio::test]
async fn stale_item_never_reaches_the_new_route() {
    let transport = ScriptedTransport::new();
    let five = transport.hold(Method::GET, &item_path(5));
    let seven = transport.hold(Method::GET, &item_path(7));
    let detail = ItemDetailController::new(transport.api());

    let mut mount = Box::pin(detail.mount(5));
    assert!(poll!(&mut mount).is_pending());
    let mut navigate = Box::pin(detail.navigate(7));
    assert!(poll!(&mut navigate).is_pending());

    // 5 lands first while 7 is still outstanding.
    five.reply(ok(movie(5, "Heat")));
    assert!(!mount.await.is_applied());
    assert_eq!(detail.item(), None);
    assert!(detail.state().loading);

    seven.reply(ok(movie(7, "Ronin")));
    assert!(navigate.await.unwrap().is_applied());
    assert_eq!(detail.item().unwrap().item.title, "Ronin");
    assert!(!detail.state().loading);
}

#[tokio::test]
async fn late_response_for_old_id_is_dropped() {
    let transport = ScriptedTransport::new();
    let five = transport.hold(Method::GET, &item_path(5));
    transport.reply(Method::GET, &item_path(7), ok(movie(7, "Ronin")));
    let detail = ItemDetailController::new(transport.api());

    let mut mount = Box::pin(detail.mount(5));
    assert!(poll!(&mut mount).is_pending());
    detail.navigate(7).await.unwrap().into_result().unwrap();

    five.reply(ok(movie(5, "Heat")));
    assert!(!mount.await.is_applied());
    assert_eq!(detail.current_id(), Some(7));
    assert_eq!(detail.item().unwrap().id(), 7);
}

#[tokio::test]
async fn mount_fetches_and_same_id_navigation_does_not() {
    let transport = ScriptedTransport::new();
    transport.reply(Method::GET, &item_path(3), ok(movie(3, "Alien")));
    transport.reply(Method::GET, &item_path(3), ok(movie(3, "Alien")));
    let detail = ItemDetailController::new(transport.api());

    detail.mount(3).await.into_result().unwrap();
    assert!(detail.navigate(3).await.is_none());
    assert_eq!(transport.count(Method::GET, &item_path(3)), 1);

    // A fresh mount with the same id still fetches.
    detail.mount(3).await.into_result().unwrap();
    assert_eq!(transport.count(Method::GET, &item_path(3)), 2);
}

#[tokio::test]
async fn not_found_surfaces_server_message() {
    let transport = ScriptedTransport::new();
    transport.reply(
        Method::GET,
        &item_path(404),
        api_error(404, "Media item not found"),
    );
    let detail = ItemDetailController::new(transport.api());

    let error = detail.mount(404).await.into_result().unwrap_err();
    assert_eq!(
        error,
        ShelfError::Api {
            code: 404,
            message: "Media item not found".into()
        }
    );
    assert_eq!(detail.state().error, Some(error));
    assert_eq!(detail.item(), None);
}

#[tokio::test]
async fn images_resolve_against_the_configured_base() {
    let transport = ScriptedTransport::new();
    transport.reply(
        Method::GET,
        &item_path(7),
        ok(identified_movie(7, "Dune", "2021-09-15")),
    );
    let detail = ItemDetailController::new(transport.api()).with_image_base("http://img.local");

    assert_eq!(detail.poster(), ImageSource::Placeholder);
    detail.mount(7).await.into_result().unwrap();

    assert_eq!(
        detail.poster().url(),
        Some("http://img.local/w500/d5NXSklXo0qyIYkgV94XAgMIckC.jpg")
    );
    assert_eq!(
        detail.backdrop().url(),
        Some("http://img.local/w1280/jYEW5xZkZk2WTrdbMGAPFuBqbDc.jpg")
    );
    let metadata = detail.item().unwrap().metadata.unwrap();
    assert_eq!(metadata.runtime_display().as_deref(), Some("2h 35m"));
}

#[tokio::test]
async fn change_event_refetches_only_the_shown_item() {
    let transport = ScriptedTransport::new();
    transport.reply(Method::GET, &item_path(3), ok(movie(3, "Alien")));
    transport.reply(
        Method::GET,
        &item_path(3),
        ok(identified_movie(3, "Alien", "1979-05-25")),
    );
    let detail = ItemDetailController::new(transport.api());
    detail.mount(3).await.into_result().unwrap();

    assert!(detail.handle_event(&LibraryEvent::ItemChanged(9)).await.is_none());
    detail
        .handle_event(&LibraryEvent::ItemChanged(3))
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(transport.count(Method::GET, &item_path(3)), 2);
    assert_eq!(detail.item().unwrap().display_year(), Some(1979));
}

#[tokio::test]
async fn follow_stops_when_events_close() {
    let transport = ScriptedTransport::new();
    let detail = ItemDetailController::new(transport.api());
    let events = LibraryEvents::new();
    let receiver = events.subscribe();
    events.publish(LibraryEvent::ItemChanged(1));
    drop(events);

    // Nothing mounted, so the queued event is a no-op.
    detail.follow(receiver).await;
    assert!(transport.calls().is_empty());
}
