use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;

/// Fire-and-forget messaging port. Implementations report delivery as a
/// plain bool; a failed send must never fail the queue mutation that
/// triggered it.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn send_queue_registered(
        &self,
        phone: &str,
        patient_name: &str,
        queue_number: &str,
        eta_minutes: i64,
    ) -> bool;

    async fn send_turn_now(&self, phone: &str, room_label: &str) -> bool;

    async fn send_turn_soon(&self, phone: &str, queue_number: &str) -> bool;
}

/// Posts templated SMS messages to the clinic's gateway. Any transport or
/// gateway error is logged and swallowed.
pub struct SmsGatewayNotifier {
    client: Client,
    gateway_url: String,
    api_key: String,
}

impl SmsGatewayNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            gateway_url: config.sms_gateway_url.clone(),
            api_key: config.sms_gateway_api_key.clone(),
        }
    }

    async fn dispatch(&self, phone: &str, template: &str, params: serde_json::Value) -> bool {
        let body = json!({
            "to": phone,
            "template": template,
            "params": params,
        });

        let result = self
            .client
            .post(format!("{}/messages", self.gateway_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("SMS '{}' dispatched to {}", template, phone);
                true
            }
            Ok(response) => {
                warn!(
                    "SMS gateway rejected '{}' for {}: {}",
                    template,
                    phone,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("SMS gateway unreachable for '{}': {}", template, e);
                false
            }
        }
    }
}

#[async_trait]
impl NotificationPort for SmsGatewayNotifier {
    async fn send_queue_registered(
        &self,
        phone: &str,
        patient_name: &str,
        queue_number: &str,
        eta_minutes: i64,
    ) -> bool {
        self.dispatch(
            phone,
            "queue_registered",
            json!({
                "patient_name": patient_name,
                "queue_number": queue_number,
                "eta_minutes": eta_minutes,
            }),
        )
        .await
    }

    async fn send_turn_now(&self, phone: &str, room_label: &str) -> bool {
        self.dispatch(phone, "turn_now", json!({ "room": room_label }))
            .await
    }

    async fn send_turn_soon(&self, phone: &str, queue_number: &str) -> bool {
        self.dispatch(phone, "turn_soon", json!({ "queue_number": queue_number }))
            .await
    }
}

/// Used when no SMS gateway is configured; every send is a no-op reported
/// as undelivered.
#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationPort for NoopNotifier {
    async fn send_queue_registered(
        &self,
        phone: &str,
        _patient_name: &str,
        _queue_number: &str,
        _eta_minutes: i64,
    ) -> bool {
        debug!("SMS gateway not configured, skipping registration SMS to {}", phone);
        false
    }

    async fn send_turn_now(&self, phone: &str, _room_label: &str) -> bool {
        debug!("SMS gateway not configured, skipping turn-now SMS to {}", phone);
        false
    }

    async fn send_turn_soon(&self, phone: &str, _queue_number: &str) -> bool {
        debug!("SMS gateway not configured, skipping turn-soon SMS to {}", phone);
        false
    }
}
