//! Integration tests for the notification socket

use std::time::Duration;

use futures_util::StreamExt as _;
use hostplane_coordinator::WsMessage;
use reqwest::Client;
use serde_json::json;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Message, client::IntoClientRequest as _, http::HeaderValue},
};

use crate::common::{ADMIN, start_coordinator};

#[tokio::test]
async fn websocket_requires_identity() {
    let (_guard, port) = start_coordinator().await;

    let result = connect_async(format!("ws://127.0.0.1:{port}/ws")).await;
    assert!(result.is_err(), "anonymous websocket upgrade succeeded");
}

#[tokio::test]
async fn admin_socket_receives_submission_notifications() {
    let (_guard, port) = start_coordinator().await;

    let mut request = format!("ws://127.0.0.1:{port}/ws")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("x-forwarded-user", HeaderValue::from_static(ADMIN));
    let (ws_stream, _) = connect_async(request)
        .await
        .expect("failed to connect websocket");
    let (_write, mut read) = ws_stream.split();

    let resp = Client::new()
        .post(format!("http://127.0.0.1:{port}/api/applications"))
        .header("x-forwarded-user", "alice")
        .json(&json!({
            "name": "photo-gallery",
            "git_url": "https://github.com/alice/photo-gallery.git",
            "branch": "main",
            "port": 5000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    // Registration notifications may arrive first.
    let received = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(msg) = read.next().await {
            if let Message::Text(text) = msg.unwrap() {
                let ws_msg: WsMessage = serde_json::from_str(&text).unwrap();
                let WsMessage::Notification { message, .. } = ws_msg;
                if message == "New application submitted: photo-gallery" {
                    return true;
                }
            }
        }
        false
    })
    .await;

    assert_eq!(received, Ok(true), "submission notification not received");
}
