//! chair-flux - telemetry ingestion and preparation for a posture-sensing chair
//!
//! The chair samples twelve pressure channels about once a second and pushes
//! compact text frames into a day-bucketed remote store. This crate turns
//! those entries into typed readings through two paths:
//!
//! - **Live path**: a throttled, mutex-guarded poller returns the current
//!   posture label and reading, falling back to `Not Sitting` when data is
//!   stale or missing.
//! - **Batch path**: whole days are decoded into reading tables, cleaned by a
//!   rolling-deviation outlier filter, classified and summarized.
//!
//! Readings can also be projected onto seat and backrest grids for heat maps.

pub mod calibration;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod outlier;
pub mod pipeline;
pub mod poller;
pub mod spatial;
pub mod store;
pub mod summary;
pub mod types;

pub use classifier::{PostureClassifier, TemplateClassifier};
pub use config::PipelineConfig;
pub use error::ChairError;
pub use outlier::{filter_outliers, OutlierFilter};
pub use pipeline::ChairPipeline;
pub use poller::{CurrentReading, CurrentReadingPoller};
pub use spatial::{SensorPoint, SpatialGrid, SpatialMapper};
pub use store::{MemoryStore, RemoteStore, StoreLayout};
pub use summary::DaySummary;
pub use types::{ChannelTag, DecodedReading, Posture, ReadingTable, TimestampedReading};

#[cfg(feature = "firebase")]
pub use store::FirebaseStore;

/// Crate version reported by the CLI and in logs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported reports
pub const PRODUCER_NAME: &str = "chair-flux";
