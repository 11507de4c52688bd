//! Web push delivery.
//!
//! Payload encryption and VAPID signing come from `web-push`; the request itself is sent with the
//! shared `reqwest` client.

use async_trait::async_trait;
use eyre::{OptionExt as _, WrapErr as _, bail};
use reqwest::{Client, StatusCode, header};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;

use super::{PushOutcome, PushSender, describe_failure};
use crate::{app::db::Subscription, config::PushConfig};

/// What the service worker receives.
///
/// Keep in sync with the service worker of the dashboard.
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum PushPayload<'a> {
    Notification { message: &'a str },
}

pub(crate) struct WebPushSender {
    http: Client,
    private_key: SecretString,
    ttl: u32,
    subject: Option<String>,
}

impl WebPushSender {
    pub(crate) fn new(http: Client, config: &PushConfig) -> Self {
        Self {
            http,
            private_key: config.private_key.clone(),
            ttl: config.ttl_secs,
            subject: config.subject.clone(),
        }
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    #[tracing::instrument(skip_all, fields(endpoint = %subscription.endpoint), err(Debug))]
    async fn send(
        &self,
        subscription: &Subscription,
        message: &str,
    ) -> eyre::Result<PushOutcome> {
        let subscription_info = web_push::SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );

        let mut vapid_key = web_push::VapidSignatureBuilder::from_pem(
            self.private_key.expose_secret().as_bytes(),
            &subscription_info,
        )?;
        if let Some(ref subject) = self.subject {
            vapid_key.add_claim("sub", subject.as_str());
        }
        let vapid_signature = vapid_key.build()?;

        let content = serde_json::to_vec(&PushPayload::Notification { message })?;
        let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info);
        builder.set_ttl(self.ttl);
        builder.set_payload(web_push::ContentEncoding::Aes128Gcm, &content);
        builder.set_vapid_signature(vapid_signature);
        let push_message = builder.build()?;
        let payload = push_message
            .payload
            .ok_or_eyre("Push message was built without payload")?;

        let mut request = self
            .http
            .post(&subscription.endpoint)
            .header("TTL", push_message.ttl.to_string())
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_ENCODING, "aes128gcm");
        for (name, value) in payload.crypto_headers {
            request = request.header(name, value);
        }

        let response = request
            .body(payload.content)
            .send()
            .await
            .wrap_err("Push request failed")?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(PushOutcome::Gone),
            status if status.is_success() => Ok(PushOutcome::Delivered),
            _ => bail!("Push service rejected message with {}", describe_failure(response).await),
        }
    }
}
