mod common;

use mass_dispatch::adapters::gateway::{CloudApiGateway, GatewayError, MessageGateway};
use mass_dispatch::config::GatewayConfig;
use mass_dispatch::domain::recipient::normalize;
use phonenumber::country;
use serde_json::json;
use std::io::Write;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> CloudApiGateway {
    let config = GatewayConfig {
        phone_id: Some("1234567890".to_string()),
        token: Some("test-token".to_string()),
        base_url: server.uri(),
        api_version: "v21.0".to_string(),
        timeout_secs: 5,
    };
    let credentials = config.credentials().expect("credentials");
    CloudApiGateway::new(&config, credentials).expect("client")
}

#[tokio::test]
async fn test_send_text_posts_message_envelope() {
    common::setup_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v21.0/1234567890/messages"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "messaging_product": "whatsapp",
            "to": "+5511987654321",
            "type": "text",
            "text": { "body": "Hello there" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messaging_product": "whatsapp",
            "contacts": [{ "input": "+5511987654321", "wa_id": "5511987654321" }],
            "messages": [{ "id": "wamid.HBgM" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let to = normalize("11987654321", country::Id::BR).expect("valid");
    let receipt = gateway(&server).send_text(&to, "Hello there").await.expect("sent");
    assert_eq!(receipt.message_id(), Some("wamid.HBgM"));
}

#[tokio::test]
async fn test_api_error_message_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v21.0/1234567890/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid OAuth access token.", "type": "OAuthException", "code": 190 }
        })))
        .mount(&server)
        .await;

    let to = normalize("11987654321", country::Id::BR).expect("valid");
    let err = gateway(&server).send_text(&to, "Hello").await.unwrap_err();
    match err {
        GatewayError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid OAuth access token.");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_non_json_error_body_is_kept_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let to = normalize("11987654321", country::Id::BR).expect("valid");
    let err = gateway(&server).send_text(&to, "Hello").await.unwrap_err();
    assert!(matches!(err, GatewayError::Api { status: 503, ref message } if message == "upstream unavailable"));
}

#[tokio::test]
async fn test_send_image_uploads_once_per_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v21.0/1234567890/media"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-42" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v21.0/1234567890/messages"))
        .and(body_partial_json(json!({
            "type": "image",
            "image": { "id": "media-42", "caption": "Weekend sale" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.IMG" }] })))
        .expect(2)
        .mount(&server)
        .await;

    let mut image = tempfile::Builder::new().suffix(".png").tempfile().expect("temp image");
    image.write_all(b"\x89PNG\r\n\x1a\nfake").expect("write image");

    let gateway = gateway(&server);
    for raw in ["11987654321", "21987654321"] {
        let to = normalize(raw, country::Id::BR).expect("valid");
        let receipt = gateway.send_image(&to, image.path(), Some("Weekend sale")).await.expect("sent");
        assert_eq!(receipt.message_id(), Some("wamid.IMG"));
    }
}

#[tokio::test]
async fn test_send_image_rejects_unsupported_type_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let image = tempfile::Builder::new().suffix(".gif").tempfile().expect("temp image");
    let to = normalize("11987654321", country::Id::BR).expect("valid");
    let err = gateway(&server).send_image(&to, image.path(), None).await.unwrap_err();
    assert!(matches!(err, GatewayError::UnsupportedMedia(_)));
}

#[tokio::test]
async fn test_receipt_without_id_is_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v21.0/1234567890/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messaging_product": "whatsapp" })))
        .mount(&server)
        .await;

    let to = normalize("11987654321", country::Id::BR).expect("valid");
    let receipt = gateway(&server).send_text(&to, "Hello").await.expect("sent");
    assert_eq!(receipt.message_id(), None);
}
