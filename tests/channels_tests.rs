use std::time::Duration;

use pretty_assertions::assert_eq;
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use club_sessions::database::models::NotificationKind;
use club_sessions::services::channels::{
    ChannelError, Channels, EmailChannel, EmailMessage, HttpEmailChannel, HttpPushChannel,
    PushChannel,
};
use club_sessions::services::notifications::ChannelOutcome;

mod common;
use common::{TestApp, test_config, utc};

fn tokens() -> Vec<String> {
    vec!["device-a".to_string(), "device-b".to_string()]
}

#[tokio::test]
async fn test_push_posts_json_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .and(header("authorization", "Bearer gateway-key"))
        .and(body_json(json!({
            "tokens": ["device-a", "device-b"],
            "title": "Spot Available!",
            "body": "A spot opened",
            "data": { "type": "waitlist_update" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "token": "device-a", "success": true },
                { "token": "device-b", "success": false, "error": "unregistered" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = HttpPushChannel::new(
        Client::new(),
        format!("{}/push", server.uri()),
        Some("gateway-key".to_string()),
    );
    let outcomes = channel
        .send(
            &tokens(),
            "Spot Available!",
            "A spot opened",
            &json!({ "type": "waitlist_update" }),
        )
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].success);
    assert!(!outcomes[0].invalid_token);
    assert!(!outcomes[1].success);
    assert!(outcomes[1].invalid_token);
    assert_eq!(outcomes[1].error.as_deref(), Some("unregistered"));
}

#[tokio::test]
async fn test_push_transient_error_keeps_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "token": "device-a", "success": false, "error": "rate_limited" }]
        })))
        .mount(&server)
        .await;

    let channel = HttpPushChannel::new(Client::new(), server.uri(), None);
    let outcomes = channel
        .send(&tokens()[..1], "Title", "Body", &json!({}))
        .await
        .unwrap();
    assert!(!outcomes[0].success);
    assert!(!outcomes[0].invalid_token);
}

#[tokio::test]
async fn test_push_gateway_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let channel = HttpPushChannel::new(Client::new(), server.uri(), None);
    let result = channel.send(&tokens(), "Title", "Body", &json!({})).await;
    match result {
        Err(ChannelError::Rejected { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected rejection, got {:?}", other.map(|o| o.len())),
    }
}

#[tokio::test]
async fn test_email_posts_message_with_sender() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer mail-key"))
        .and(body_json(json!({
            "to": "sam@example.com",
            "to_name": "Sam",
            "from": "noreply@club.test",
            "from_name": "Riverside Badminton",
            "subject": "RSVP Deadline Approaching",
            "html": "<p>hi</p>",
            "text": "hi"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let channel = HttpEmailChannel::new(
        Client::new(),
        format!("{}/send", server.uri()),
        Some("mail-key".to_string()),
        "noreply@club.test",
        "Riverside Badminton",
    );
    channel
        .send(&EmailMessage {
            to: "sam@example.com".into(),
            to_name: "Sam".into(),
            subject: "RSVP Deadline Approaching".into(),
            html: "<p>hi</p>".into(),
            text: "hi".into(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_email_non_success_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad address"))
        .mount(&server)
        .await;

    let channel = HttpEmailChannel::new(Client::new(), server.uri(), None, "a@b.c", "Club");
    let result = channel
        .send(&EmailMessage {
            to: "nobody".into(),
            to_name: "Nobody".into(),
            subject: "s".into(),
            html: "h".into(),
            text: "t".into(),
        })
        .await;
    assert!(matches!(
        result,
        Err(ChannelError::Rejected { status: 422, .. })
    ));
}

#[tokio::test]
async fn test_slow_provider_fails_only_its_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.push_gateway_url = Some(format!("{}/push", server.uri()));
    config.email_api_url = Some(format!("{}/send", server.uri()));
    config.channel_timeout_seconds = 1;

    let app = TestApp::with_config(utc(2025, 6, 10, 9, 0, 0), config.clone());
    let player = app.player().await;
    app.push_token(&player).await;

    // rebuild the dispatcher over the HTTP channels
    let state = club_sessions::AppState::build(
        config.clone(),
        app.stores.clone(),
        Channels::from_config(&config).unwrap(),
        app.clock.clone(),
    )
    .unwrap();

    let delivery = state
        .notifications
        .send(
            player.id,
            NotificationKind::AdminAnnouncement,
            "Title",
            "Body",
            json!({}),
        )
        .await
        .unwrap();
    assert_eq!(delivery.push, ChannelOutcome::Failed);
    assert_eq!(delivery.email, ChannelOutcome::Sent);
}
