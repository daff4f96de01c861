use super::*;
use crate::test_support::{identity, session_for, FakeRemote, Gate};
use shared::{error::RemoteError, protocol::AuthChange};

/// Lets spawned listener tasks drain their queues.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn gated_remote(remote: FakeRemote) -> (Arc<FakeRemote>, Arc<Gate>) {
    let gate = Arc::new(Gate::default());
    let remote = FakeRemote {
        get_session_gate: Some(Arc::clone(&gate)),
        ..remote
    };
    (Arc::new(remote), gate)
}

#[tokio::test]
async fn renders_placeholder_until_initial_fetch_completes() {
    let (remote, gate) = gated_remote(FakeRemote::signed_in("u1", "a@b.com"));
    let controller = SessionController::mount(remote.clone());

    gate.entered.notified().await;
    assert_eq!(controller.route(), RootView::Loading);

    gate.release.notify_one();
    let state = controller.ready().await;
    assert!(!state.loading);
    assert_eq!(state.route(), RootView::Profile);
    assert_eq!(
        state.session.map(|session| session.user.id),
        Some(shared::domain::UserId::new("u1"))
    );
}

#[tokio::test]
async fn routes_to_authentication_without_a_session() {
    let controller = SessionController::mount(Arc::new(FakeRemote::default()));
    assert_eq!(controller.ready().await.route(), RootView::Authentication);
}

#[tokio::test]
async fn failed_initial_fetch_still_finishes_loading() {
    let remote = FakeRemote::signed_in("u1", "a@b.com");
    *remote.get_session_error.lock().unwrap() = Some(RemoteError::transport("offline"));
    let controller = SessionController::mount(Arc::new(remote));

    let state = controller.ready().await;
    assert!(!state.loading);
    assert_eq!(state.route(), RootView::Authentication);
}

#[tokio::test]
async fn auth_changes_replace_the_mirrored_session() {
    let remote = Arc::new(FakeRemote::default());
    let controller = SessionController::mount(remote.clone());
    controller.ready().await;

    let user = identity("u1", "a@b.com");
    let mut rx = controller.subscribe();

    remote.hub.emit(AuthChange::signed_in(session_for(&user, "access-1")));
    rx.wait_for(|state| state.session.is_some())
        .await
        .expect("signed in");
    assert_eq!(controller.route(), RootView::Profile);

    remote
        .hub
        .emit(AuthChange::token_refreshed(session_for(&user, "access-2")));
    rx.wait_for(|state| {
        state
            .session
            .as_ref()
            .is_some_and(|session| session.access_token == "access-2")
    })
    .await
    .expect("refreshed");

    remote.hub.emit(AuthChange::signed_out());
    rx.wait_for(|state| state.session.is_none())
        .await
        .expect("signed out");
    assert_eq!(controller.route(), RootView::Authentication);
}

#[tokio::test]
async fn late_signed_out_event_after_local_clear_is_a_no_op() {
    let remote = Arc::new(FakeRemote::signed_in("u1", "a@b.com"));
    let controller = SessionController::mount(remote.clone());
    controller.ready().await;

    let mut rx = controller.subscribe();
    rx.borrow_and_update();

    assert!(controller.clear_session());
    assert_eq!(controller.route(), RootView::Authentication);
    assert!(rx.has_changed().expect("sender alive"));
    rx.borrow_and_update();

    remote.hub.emit(AuthChange::signed_out());
    settle().await;

    assert!(!rx.has_changed().expect("sender alive"));
    assert!(!controller.clear_session());
    assert_eq!(controller.route(), RootView::Authentication);
}

#[tokio::test]
async fn initial_read_never_overrides_a_newer_auth_change() {
    let (remote, gate) = gated_remote(FakeRemote::signed_in("u1", "a@b.com"));
    let controller = SessionController::mount(remote.clone());

    gate.entered.notified().await;
    remote.hub.emit(AuthChange::signed_out());
    settle().await;
    gate.release.notify_one();

    let state = controller.ready().await;
    assert_eq!(state.session, None);
    assert_eq!(state.route(), RootView::Authentication);
}

#[tokio::test]
async fn teardown_releases_the_subscription_once() {
    let remote = Arc::new(FakeRemote::default());
    let controller = SessionController::mount(remote.clone());
    assert_eq!(remote.hub.active_subscriptions(), 1);

    controller.unmount();
    assert_eq!(remote.hub.active_subscriptions(), 0);

    let second = SessionController::mount(remote.clone());
    assert_eq!(remote.hub.active_subscriptions(), 1);
    drop(second);
    assert_eq!(remote.hub.active_subscriptions(), 0);
}

#[tokio::test]
async fn sign_out_callback_is_inert_after_teardown() {
    let remote = Arc::new(FakeRemote::signed_in("u1", "a@b.com"));
    let controller = SessionController::mount(remote);
    controller.ready().await;

    let callback = controller.sign_out_callback();
    callback();
    assert_eq!(controller.route(), RootView::Authentication);

    drop(controller);
    callback();
}

#[test]
fn replacing_with_an_equal_session_reports_no_change() {
    let mut state = SessionState {
        loading: false,
        session: None,
    };
    assert!(!replace_session(&mut state, None));

    let session = session_for(&identity("u1", "a@b.com"), "access-1");
    assert!(replace_session(&mut state, Some(session.clone())));
    assert!(!replace_session(&mut state, Some(session)));
}
