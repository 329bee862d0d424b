use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::{messenger_from_config, DependencyError, MessagingClient, WhatsAppClient};
use shared_utils::test_utils::TestConfig;

fn config_for(server: &MockServer) -> shared_config::AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.whatsapp_api_url = server.uri();
    config
}

#[tokio::test]
async fn test_send_text_posts_cloud_api_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/100200300/messages"))
        .and(header("authorization", "Bearer test-whatsapp-token"))
        .and(body_partial_json(json!({
            "messaging_product": "whatsapp",
            "to": "919876543210",
            "type": "text",
            "text": { "body": "Your appointment is confirmed" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messaging_product": "whatsapp",
            "contacts": [{ "input": "919876543210", "wa_id": "919876543210" }],
            "messages": [{ "id": "wamid.HBgM" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WhatsAppClient::new(&config_for(&server)).unwrap();
    let receipt = client
        .send_text("+91 98765 43210", "Your appointment is confirmed")
        .await
        .unwrap();

    assert_eq!(receipt.destination, "919876543210");
    assert_eq!(receipt.provider_message_id.as_deref(), Some("wamid.HBgM"));
}

#[tokio::test]
async fn test_provider_error_code_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/100200300/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "Recipient phone number not in allowed list",
                "type": "OAuthException",
                "code": 131030
            }
        })))
        .mount(&server)
        .await;

    let client = WhatsAppClient::new(&config_for(&server)).unwrap();
    let err = client.send_text("9876543210", "hello").await.unwrap_err();

    assert_eq!(err.provider_code(), Some(131030));
    assert_matches!(err, DependencyError::Provider { .. });
}

#[tokio::test]
async fn test_non_json_failure_has_no_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = WhatsAppClient::new(&config_for(&server)).unwrap();
    let err = client.send_text("9876543210", "hello").await.unwrap_err();

    assert_eq!(err.provider_code(), None);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/100200300/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({ "messages": [{ "id": "wamid.late" }] })),
        )
        .mount(&server)
        .await;

    // TestConfig caps provider calls at one second
    let client = WhatsAppClient::new(&config_for(&server)).unwrap();
    let started = Instant::now();
    let result = client.send_text("9876543210", "hello").await;

    assert_matches!(result, Err(DependencyError::Transport(_)));
    assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn test_invalid_destination_never_reaches_provider() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = WhatsAppClient::new(&config_for(&server)).unwrap();
    assert_matches!(
        client.send_text("n/a", "hello").await,
        Err(DependencyError::InvalidDestination(_))
    );
}

#[tokio::test]
async fn test_unconfigured_messaging_falls_back_to_logging() {
    let mut config = TestConfig::default().to_app_config();
    config.whatsapp_access_token = String::new();

    assert!(matches!(WhatsAppClient::new(&config), Err(DependencyError::NotConfigured)));

    let messenger = messenger_from_config(&config);
    let receipt = messenger.send_text("9876543210", "hello").await.unwrap();
    assert!(receipt.provider_message_id.is_none());
}
