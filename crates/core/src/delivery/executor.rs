use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    delivery::{CollectorEndpoint, CollectorRequest, RetryPolicy, Transport},
    error::{Result, TelemetryError},
    events::{TrackingEvent, WireBatch},
};

#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered {
        attempts: u32,
    },
    /// Every attempt failed. `batch` is handed back untouched.
    Failed {
        batch: Vec<TrackingEvent>,
        attempts: u32,
        last_error: TelemetryError,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Sends whole batches to the collector with bounded linear backoff. Never
/// sees the scheduler's live buffer, only owned snapshots.
pub struct DeliveryExecutor {
    transport: Arc<dyn Transport>,
    endpoint: CollectorEndpoint,
    policy: RetryPolicy,
}

impl DeliveryExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: CollectorEndpoint,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            endpoint,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn prepare(&self, tenant: &str, batch: &[TrackingEvent]) -> Result<CollectorRequest> {
        let url = self.endpoint.events_url(tenant)?;
        let body = serde_json::to_vec(&WireBatch::from_events(batch))?;
        Ok(CollectorRequest { url, body })
    }

    pub async fn deliver(&self, tenant: &str, batch: Vec<TrackingEvent>) -> DeliveryOutcome {
        let request = match self.prepare(tenant, &batch) {
            Ok(request) => request,
            Err(e) => {
                warn!(tenant, events = batch.len(), "Could not build collector request: {e}");
                return DeliveryOutcome::Failed {
                    batch,
                    attempts: 0,
                    last_error: e,
                };
            }
        };

        let max_attempts = self.policy.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.transport.post(&request).await {
                Ok(response) if response.is_success() => {
                    debug!(
                        tenant,
                        attempt,
                        status = response.status,
                        events = batch.len(),
                        body = %response.body,
                        "Batch delivered"
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Ok(response) => {
                    debug!(tenant, attempt, status = response.status, "Collector rejected batch");
                    last_error = Some(TelemetryError::Rejected {
                        status: response.status,
                    });
                }
                Err(e) => {
                    debug!(tenant, attempt, "Collector request failed: {e}");
                    last_error = Some(e);
                }
            }

            if attempt < max_attempts {
                sleep(self.policy.delay_after(attempt)).await;
            }
        }

        let last_error = last_error.unwrap_or_else(|| TelemetryError::Unreachable {
            reason: "no attempt was made".to_string(),
        });
        warn!(
            tenant,
            attempts = max_attempts,
            events = batch.len(),
            "Giving up on batch: {last_error}"
        );

        DeliveryOutcome::Failed {
            batch,
            attempts: max_attempts,
            last_error,
        }
    }
}
