#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use lervi_core::{
    CollectorRequest, CollectorResponse, IdentityManager, MemoryStore, Result, Scheduler,
    TelemetryConfig, TelemetryError, Transport,
};
use serde_json::Value;
use tokio::time::Instant;

pub struct Received {
    pub at: Instant,
    pub url: String,
    pub body: Value,
}

impl Received {
    pub fn events(&self) -> &[Value] {
        self.body["events"].as_array().expect("events array")
    }

    pub fn kinds(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

pub enum Reply {
    Status(u16),
    Offline,
}

/// In-memory collector: answers from a script, then 202 once it runs out.
#[derive(Default)]
pub struct FakeCollector {
    script: Mutex<VecDeque<Reply>>,
    received: Mutex<Vec<Received>>,
}

impl FakeCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into()),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_forever() -> Arc<Self> {
        Self::scripted((0..64).map(|_| Reply::Status(503)).collect())
    }

    pub fn request_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn with_received<R>(&self, f: impl FnOnce(&[Received]) -> R) -> R {
        f(&self.received.lock().unwrap())
    }
}

#[async_trait]
impl Transport for FakeCollector {
    async fn post(&self, request: &CollectorRequest) -> Result<CollectorResponse> {
        let body = serde_json::from_slice(&request.body)?;
        self.received.lock().unwrap().push(Received {
            at: Instant::now(),
            url: request.url.to_string(),
            body,
        });

        match self.script.lock().unwrap().pop_front() {
            Some(Reply::Offline) => Err(TelemetryError::Unreachable {
                reason: "connection refused".to_string(),
            }),
            Some(Reply::Status(status)) => Ok(CollectorResponse {
                status,
                body: String::new(),
            }),
            None => Ok(CollectorResponse {
                status: 202,
                body: r#"{"accepted": 1}"#.to_string(),
            }),
        }
    }
}

pub fn test_config() -> TelemetryConfig {
    TelemetryConfig {
        collector_url: "http://collector.test/api/v1/public".to_string(),
        ..TelemetryConfig::default()
    }
}

pub fn scheduler_with(collector: &Arc<FakeCollector>, config: TelemetryConfig) -> Scheduler {
    Scheduler::builder(config)
        .identity(IdentityManager::new(Arc::new(MemoryStore::new())))
        .transport(Arc::clone(collector) as Arc<dyn Transport>)
        .build()
        .expect("valid scheduler config")
}

pub fn scheduler(collector: &Arc<FakeCollector>) -> Scheduler {
    scheduler_with(collector, test_config())
}
