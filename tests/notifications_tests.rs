use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use club_sessions::AppError;
use club_sessions::database::NotificationStore;
use club_sessions::database::models::{
    MemberRole, MembershipStatus, NotificationKind, PreferencesPatch,
};
use club_sessions::services::notifications::ChannelOutcome;

mod common;
use common::{TestApp, utc};

fn app() -> TestApp {
    TestApp::new(utc(2025, 6, 10, 9, 0, 0))
}

#[tokio::test]
async fn test_send_delivers_on_both_channels_and_records_it() {
    let app = app();
    let player = app.player().await;
    let token = app.push_token(&player).await;

    let delivery = app
        .state
        .notifications
        .send(
            player.id,
            NotificationKind::AdminAnnouncement,
            "Courts closed",
            "No play on Monday",
            json!({ "type": "admin_announcement" }),
        )
        .await
        .unwrap();

    assert_eq!(delivery.push, ChannelOutcome::Sent);
    assert_eq!(delivery.email, ChannelOutcome::Sent);
    assert!(delivery.notification.push_sent);
    assert!(delivery.notification.email_sent);
    assert_eq!(
        delivery.notification.email_sent_at,
        Some(utc(2025, 6, 10, 9, 0, 0))
    );

    let calls = app.push.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tokens, vec![token]);
    assert_eq!(calls[0].title, "Courts closed");
    assert_eq!(calls[0].data["type"], "admin_announcement");

    let sent = app.email.sent();
    assert_eq!(sent[0].to, player.email);
    assert_eq!(sent[0].to_name, player.name);
    assert!(sent[0].html.contains("No play on Monday"));

    let history = app
        .state
        .notifications
        .history(player.id, None, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, delivery.notification.id);
}

#[tokio::test]
async fn test_preferences_gate_each_channel_but_audit_row_is_kept() {
    let app = app();
    let player = app.player().await;
    app.push_token(&player).await;

    app.state
        .notifications
        .update_preferences(
            player.id,
            &PreferencesPatch {
                push_enabled: Some(false),
                email_session_reminders: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let delivery = app
        .state
        .notifications
        .send(
            player.id,
            NotificationKind::SessionReminder,
            "Session Reminder (24h)",
            "See you there",
            json!({}),
        )
        .await
        .unwrap();

    assert_eq!(delivery.push, ChannelOutcome::Skipped);
    assert_eq!(delivery.email, ChannelOutcome::Skipped);
    assert!(!delivery.delivered());
    assert!(app.push.calls().is_empty());
    assert!(app.email.sent().is_empty());

    // other kinds still reach email
    let delivery = app
        .state
        .notifications
        .send(
            player.id,
            NotificationKind::WaitlistUpdate,
            "Spot Available!",
            "A spot opened",
            json!({}),
        )
        .await
        .unwrap();
    assert_eq!(delivery.push, ChannelOutcome::Skipped);
    assert_eq!(delivery.email, ChannelOutcome::Sent);

    let history = app
        .state
        .notifications
        .history(player.id, None, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[1].push_sent && !history[1].email_sent);
}

#[tokio::test]
async fn test_preferences_default_to_enabled() {
    let app = app();
    let player = app.player().await;

    let prefs = app.state.notifications.preferences(player.id).await.unwrap();
    assert!(prefs.push_enabled);
    assert!(prefs.email_enabled);
    assert!(prefs.push_rsvp_deadlines);
    assert!(prefs.email_admin_announcements);

    // stable across reads
    let again = app.state.notifications.preferences(player.id).await.unwrap();
    assert_eq!(again.id, prefs.id);
}

#[tokio::test]
async fn test_invalid_push_tokens_are_pruned() {
    let app = app();
    let player = app.player().await;
    let stale = app.push_token(&player).await;
    let live = app.push_token(&player).await;
    app.push.mark_unregistered(&stale);

    let delivery = app
        .state
        .notifications
        .send(
            player.id,
            NotificationKind::WaitlistUpdate,
            "Spot Available!",
            "A spot opened",
            json!({}),
        )
        .await
        .unwrap();
    assert_eq!(delivery.push, ChannelOutcome::Sent);

    let remaining: Vec<String> = app
        .stores
        .notifications
        .list_push_tokens(player.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.token)
        .collect();
    assert_eq!(remaining, vec![live]);
}

#[tokio::test]
async fn test_channel_failure_does_not_fail_send() {
    let app = app();
    let player = app.player().await;
    app.push_token(&player).await;
    app.push.fail.store(true, Ordering::SeqCst);
    app.email.fail.store(true, Ordering::SeqCst);

    let delivery = app
        .state
        .notifications
        .send(
            player.id,
            NotificationKind::AdminAnnouncement,
            "Heads up",
            "Body",
            json!({}),
        )
        .await
        .unwrap();
    assert_eq!(delivery.push, ChannelOutcome::Failed);
    assert_eq!(delivery.email, ChannelOutcome::Failed);
    assert!(delivery.failed());
    assert!(!delivery.notification.push_sent);
}

#[tokio::test]
async fn test_send_to_unknown_member_is_not_found() {
    let app = app();
    let result = app
        .state
        .notifications
        .send(
            Uuid::new_v4(),
            NotificationKind::AdminAnnouncement,
            "Title",
            "Body",
            json!({}),
        )
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_bulk_send_isolates_failing_recipients() {
    let app = app();
    let players = app.players(3).await;
    let mut recipients: Vec<Uuid> = players.iter().map(|p| p.id).collect();
    recipients.push(Uuid::new_v4());

    let report = app
        .state
        .notifications
        .send_bulk(
            &recipients,
            NotificationKind::AdminAnnouncement,
            "Title",
            "Body",
            json!({}),
        )
        .await;

    assert_eq!(report.delivered, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.total(), 4);
}

#[tokio::test]
async fn test_announce_reaches_approved_members_only() {
    let app = app();
    let players = app.players(2).await;
    let admin = app.admin().await;
    app.member(MemberRole::Pending, MembershipStatus::Pending)
        .await;
    app.member(MemberRole::Player, MembershipStatus::Rejected)
        .await;

    let report = app
        .state
        .notifications
        .announce("  Club AGM  ", " Thursday at 7pm ")
        .await
        .unwrap();
    assert_eq!(report.delivered, 3);

    let mut recipients = app.email.recipients();
    recipients.sort();
    let mut expected = vec![
        players[0].email.clone(),
        players[1].email.clone(),
        admin.email.clone(),
    ];
    expected.sort();
    assert_eq!(recipients, expected);
    assert_eq!(app.email.sent()[0].subject, "Club AGM");
    assert_eq!(app.email.sent()[0].text, "Thursday at 7pm");
}

#[tokio::test]
async fn test_announce_requires_title_and_body() {
    let app = app();
    app.player().await;

    for (title, body) in [("", "Body"), ("Title", "   ")] {
        let result = app.state.notifications.announce(title, body).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
    assert!(app.email.sent().is_empty());
}

#[tokio::test]
async fn test_history_is_newest_first_and_paged() {
    let app = app();
    let player = app.player().await;
    for n in 0..5 {
        app.state
            .notifications
            .send(
                player.id,
                NotificationKind::AdminAnnouncement,
                &format!("Notice {}", n),
                "Body",
                json!({}),
            )
            .await
            .unwrap();
    }

    let page = app
        .state
        .notifications
        .history(player.id, Some(2), Some(1))
        .await
        .unwrap();
    let titles: Vec<_> = page.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Notice 3", "Notice 2"]);

    // non-positive limit falls back to the default
    let all = app
        .state
        .notifications
        .history(player.id, Some(0), None)
        .await
        .unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn test_mark_read_only_for_owner() {
    let app = app();
    let owner = app.player().await;
    let other = app.player().await;
    let delivery = app
        .state
        .notifications
        .send(
            owner.id,
            NotificationKind::AdminAnnouncement,
            "Title",
            "Body",
            json!({}),
        )
        .await
        .unwrap();
    let id = delivery.notification.id;

    assert!(matches!(
        app.state.notifications.mark_read(id, other.id).await,
        Err(AppError::NotFound(_))
    ));

    app.state.notifications.mark_read(id, owner.id).await.unwrap();
    let history = app
        .state
        .notifications
        .history(owner.id, None, None)
        .await
        .unwrap();
    assert_eq!(history[0].read_at, Some(utc(2025, 6, 10, 9, 0, 0)));
}

#[tokio::test]
async fn test_push_token_registration_lifecycle() {
    let app = app();
    let first = app.player().await;
    let second = app.player().await;

    assert!(matches!(
        app.state
            .notifications
            .register_push_token(first.id, "  ", None)
            .await,
        Err(AppError::Validation(_))
    ));

    let token = app.push_token(&first).await;
    app.push_token(&first).await;

    // a device moving to another account follows the newest owner
    app.state
        .notifications
        .register_push_token(second.id, &token, Some("shared tablet"))
        .await
        .unwrap();
    let moved = app
        .stores
        .notifications
        .list_push_tokens(second.id)
        .await
        .unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].device_name.as_deref(), Some("shared tablet"));

    let removed = app
        .state
        .notifications
        .unregister_push_token(first.id, None)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let removed = app
        .state
        .notifications
        .unregister_push_token(second.id, Some(&token))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(
        app.stores
            .notifications
            .list_push_tokens(second.id)
            .await
            .unwrap()
            .is_empty()
    );
}
