//! Lervi storefront telemetry.
//!
//! Records visitor behavior (page views, searches, booking funnel steps) and
//! delivers it to the tenant's collector in small batches. Delivery failures,
//! storage failures and overflow are absorbed here and never reach the caller.
//!
//! ```no_run
//! use lervi_core::{EventKind, Scheduler, TelemetryConfig};
//!
//! # async fn page() -> lervi_core::Result<()> {
//! let telemetry = Scheduler::builder(TelemetryConfig::from_env()).build()?;
//! telemetry.initialize("hotel-sol");
//! telemetry.track_page_view("/hotel-sol/habitaciones");
//! telemetry.track(EventKind::StartBooking, None);
//!
//! telemetry.lifecycle().unload();
//! telemetry.drain().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod identity;
pub mod queues;
pub mod scheduler;

pub use config::TelemetryConfig;
pub use delivery::{
    CollectorEndpoint, CollectorRequest, CollectorResponse, DeliveryExecutor, DeliveryOutcome,
    HttpTransport, RetryPolicy, Transport,
};
pub use error::{Result, TelemetryError};
pub use events::{EventKind, Metadata, TrackingEvent};
pub use identity::{FileStore, IdentityManager, KeyValueStore, MemoryStore};
pub use scheduler::{
    FlushOutcome, LifecycleEvent, PageLifecycle, Scheduler, SchedulerBuilder, Visibility,
};
