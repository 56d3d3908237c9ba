//! Outbound webhook notifications for booking lifecycle changes.
//! Delivery is best-effort: failures are logged with the booking's
//! correlation id and never propagated to the caller.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use bookflow_core::config::IntegrationConfig;
use bookflow_core::domain::booking::{BookingRequest, BookingStatus};

pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(config: &IntegrationConfig) -> Self {
        Self {
            client: Client::new(),
            webhook_url: config.webhook_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// A notifier with no webhook configured; every send is a no-op.
    pub fn disabled() -> Self {
        Self { client: Client::new(), webhook_url: None, timeout: Duration::from_secs(10) }
    }

    pub async fn booking_status_changed(
        &self,
        booking: &BookingRequest,
        previous: BookingStatus,
    ) {
        let Some(url) = &self.webhook_url else {
            return;
        };

        let payload = json!({
            "event": "booking.status_changed",
            "booking_id": booking.id.0,
            "booking_uuid": booking.uuid,
            "org_id": booking.org_id,
            "resource_id": booking.resource_id.0,
            "previous_status": previous.as_str(),
            "status": booking.status.as_str(),
            "source": {
                "service": booking.source.service,
                "object_type": booking.source.object_type,
                "object_id": booking.source.object_id,
            },
            "occurred_at": chrono::Utc::now().to_rfc3339(),
        });

        let result =
            self.client.post(url).timeout(self.timeout).json(&payload).send().await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!(
                    event_name = "integration.webhook.delivered",
                    correlation_id = %booking.uuid,
                    booking_id = booking.id.0,
                    status = booking.status.as_str(),
                    "booking status webhook delivered"
                );
            }
            Ok(response) => {
                warn!(
                    event_name = "integration.webhook.rejected",
                    correlation_id = %booking.uuid,
                    booking_id = booking.id.0,
                    http_status = %response.status(),
                    "booking status webhook rejected by receiver"
                );
            }
            Err(error) => {
                warn!(
                    event_name = "integration.webhook.failed",
                    correlation_id = %booking.uuid,
                    booking_id = booking.id.0,
                    error = %error,
                    "booking status webhook delivery failed"
                );
            }
        }
    }
}
