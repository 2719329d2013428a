//! Inhaler Insights - On-device analysis engine for connected inhaler telemetry
//!
//! Turns raw inhale events into clinical doses, daily history, reliever usage
//! grades, dashboard summary messages and inhalation feedback. Every analysis
//! is a pure computation over data supplied by the host application:
//! status decoding → effort classification → dose aggregation → history
//! collation → summary prioritization.
//!
//! ## Modules
//!
//! - **Classification**: [`status`], [`effort`] and [`usage`] rate single events and days
//! - **Aggregation**: [`aggregator`] and [`collator`] build doses and daily history
//! - **Presentation**: [`summary`], [`feedback`] and [`messages`] drive the dashboard
//! - **Integration**: [`pipeline`] and [`ffi`] expose the JSON and C entry points

pub mod aggregator;
pub mod collator;
pub mod config;
pub mod effort;
pub mod error;
pub mod feedback;
pub mod messages;
pub mod pipeline;
pub mod status;
pub mod summary;
pub mod types;
pub mod usage;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::DoseAggregator;
pub use collator::HistoryCollator;
pub use config::AnalysisConfig;
pub use effort::InhalationEffort;
pub use error::AnalysisError;
pub use feedback::{FeedbackDecision, FeedbackEvaluator};
pub use messages::{combine, ChangeNotification, PendingNotifications};
pub use pipeline::{analyze_json, AnalysisInput, AnalysisProcessor, AnalysisReport};
pub use status::{InhaleStatusFlag, StatusFlags, SystemErrorCode};
pub use summary::{SummaryInfo, SummaryMessageQueue, SummaryPrioritizer, SummaryTextId};
pub use types::{
    Device, DoseOutcome, EnvironmentInfo, EventOrder, HistoryDay, HistoryDose, InhaleEvent,
    Medication, MedicationClassification, Prescription,
};
pub use usage::RelieverUsage;

/// Library version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for analysis reports
pub const PRODUCER_NAME: &str = "inhaler-insights";
