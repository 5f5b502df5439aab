use std::sync::Arc;

use crate::{
    config::TelemetryConfig,
    delivery::{CollectorEndpoint, DeliveryExecutor, HttpTransport, RetryPolicy, Transport},
    error::Result,
    identity::{FileStore, IdentityManager},
    scheduler::{PageLifecycle, Scheduler},
};

pub struct SchedulerBuilder {
    config: TelemetryConfig,
    identity: Option<IdentityManager>,
    transport: Option<Arc<dyn Transport>>,
    lifecycle: Option<PageLifecycle>,
}

impl SchedulerBuilder {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            identity: None,
            transport: None,
            lifecycle: None,
        }
    }

    pub fn identity(mut self, identity: IdentityManager) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn lifecycle(mut self, lifecycle: PageLifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Defaults: reqwest transport, identity persisted under the user's
    /// data directory (detached when there is none), a fresh lifecycle.
    pub fn build(self) -> Result<Scheduler> {
        self.config.validate()?;
        let endpoint = CollectorEndpoint::parse(&self.config.collector_url)?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));
        let identity = self.identity.unwrap_or_else(|| {
            FileStore::default_location()
                .map(|store| IdentityManager::new(Arc::new(store)))
                .unwrap_or_else(IdentityManager::detached)
        });
        let executor = DeliveryExecutor::new(
            transport,
            endpoint,
            RetryPolicy::from_config(&self.config),
        );

        Ok(Scheduler::new(
            self.config,
            identity,
            executor,
            self.lifecycle.unwrap_or_default(),
        ))
    }
}
