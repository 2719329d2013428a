//! Pipeline orchestration
//!
//! This module provides the public API for Inhaler Insights.
//! It runs the full analysis from an input JSON document to a report JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::collator::HistoryCollator;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::feedback::{FeedbackContext, FeedbackDecision, FeedbackEvaluator};
use crate::summary::{SummaryContext, SummaryInfo, SummaryPrioritizer};
use crate::types::{
    Device, EnvironmentInfo, EventOrder, HistoryDay, InhaleEvent, Medication, Prescription,
};
use crate::usage::RelieverUsage;
use crate::{PRODUCER_NAME, VERSION};

fn default_true() -> bool {
    true
}

/// Everything one analysis run needs, supplied by the host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    /// The user's current local day
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<InhaleEvent>,
    /// Direction the events are listed in
    #[serde(default)]
    pub event_order: EventOrder,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub environment: Option<EnvironmentInfo>,
    /// First day of the history window (defaults to `today`)
    #[serde(default)]
    pub history_start: Option<NaiveDate>,
    /// Last day of the history window (defaults to `today`)
    #[serde(default)]
    pub history_end: Option<NaiveDate>,
    /// Connected inhaler count per day
    #[serde(default)]
    pub connection_counts: BTreeMap<NaiveDate, u32>,
    #[serde(default = "default_true")]
    pub good_feedback_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Today's reliever figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayUsage {
    pub day: NaiveDate,
    pub reliever_inhalations: u32,
    pub reliever_usage: RelieverUsage,
    pub is_overdose: bool,
}

/// Result of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_id: Uuid,
    pub producer: ReportProducer,
    pub computed_at: DateTime<Utc>,
    pub history: Vec<HistoryDay>,
    pub today: TodayUsage,
    /// Applicable summary messages, highest priority first
    pub summary: Vec<SummaryInfo>,
    pub feedback: FeedbackDecision,
}

/// Analyze an input JSON document and return the report as JSON.
///
/// Uses the default [`AnalysisConfig`].
///
/// # Example
/// ```ignore
/// let report_json = analyze_json(input_json)?;
/// ```
pub fn analyze_json(input_json: String) -> Result<String, AnalysisError> {
    AnalysisProcessor::new().process_json(&input_json)
}

/// Analysis engine holding runtime configuration.
///
/// Use this when the host tunes the policy values or wants a stable
/// instance id across reports.
pub struct AnalysisProcessor {
    config: AnalysisConfig,
    instance_id: String,
}

impl Default for AnalysisProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisProcessor {
    /// Create a processor with default configuration
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    pub fn with_config(config: AnalysisConfig) -> Self {
        Self {
            config,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load configuration from JSON
    pub fn load_config(&mut self, json: &str) -> Result<(), AnalysisError> {
        self.config = AnalysisConfig::from_json(json)?;
        Ok(())
    }

    /// Save configuration to JSON
    pub fn save_config(&self) -> Result<String, AnalysisError> {
        self.config.to_json()
    }

    /// Run the full analysis.
    ///
    /// Stages:
    /// 1. HistoryCollator - group events into doses and days
    /// 2. Today's reliever usage and overdose flag
    /// 3. SummaryPrioritizer - dashboard messages
    /// 4. FeedbackEvaluator - feedback for the most recent event
    pub fn analyze(&self, input: &AnalysisInput) -> Result<AnalysisReport, AnalysisError> {
        let start = input.history_start.unwrap_or(input.today);
        let end = input.history_end.unwrap_or(input.today);

        // Stage 1: history
        let history = HistoryCollator::collate(
            &input.events,
            input.event_order,
            &input.medications,
            &input.prescriptions,
            start,
            end,
            &input.connection_counts,
        )?;

        // Stage 2: today
        let today = self.today_usage(input, &history)?;

        // Stage 3: summary
        let recent = Self::most_recent_first(&input.events);
        let summary_context = SummaryContext {
            devices: &input.devices,
            medications: &input.medications,
            todays_reliever_inhalations: today.reliever_inhalations,
            last_reliever_medication_name: Self::last_reliever_name(&recent, &input.medications),
            environment: input.environment.as_ref(),
            now: input.now,
        };
        let summary = SummaryPrioritizer::prioritize(&summary_context, &self.config);

        // Stage 4: feedback
        let device = recent
            .first()
            .and_then(|e| input.devices.iter().find(|d| d.serial_number == e.device_serial_number));
        let feedback_context = FeedbackContext {
            recent_events: &recent,
            now: input.now,
            good_feedback_enabled: input.good_feedback_enabled,
            device,
            medications: &input.medications,
        };
        let feedback = FeedbackEvaluator::evaluate(&feedback_context, &self.config);

        debug!(
            events = input.events.len(),
            days = history.len(),
            usage = today.reliever_usage.as_str(),
            "analysis complete"
        );

        Ok(AnalysisReport {
            report_id: Uuid::new_v4(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at: Utc::now(),
            history,
            today,
            summary,
            feedback,
        })
    }

    /// Parse input JSON, analyze it and encode the report as JSON
    pub fn process_json(&self, input_json: &str) -> Result<String, AnalysisError> {
        let input: AnalysisInput =
            serde_json::from_str(input_json).map_err(|e| AnalysisError::ParseError(e.to_string()))?;
        let report = self.analyze(&input)?;
        serde_json::to_string(&report).map_err(|e| AnalysisError::EncodingError(e.to_string()))
    }

    fn today_usage(
        &self,
        input: &AnalysisInput,
        history: &[HistoryDay],
    ) -> Result<TodayUsage, AnalysisError> {
        let day = match history.iter().find(|d| d.day == input.today) {
            Some(day) => day.clone(),
            None => HistoryCollator::collate(
                &input.events,
                input.event_order,
                &input.medications,
                &input.prescriptions,
                input.today,
                input.today,
                &input.connection_counts,
            )?
            .into_iter()
            .next()
            .unwrap_or_else(|| HistoryDay::new(input.today)),
        };

        Ok(TodayUsage {
            day: input.today,
            reliever_inhalations: day.reliever_inhalation_count(),
            reliever_usage: day.reliever_usage(),
            is_overdose: day.is_overdose,
        })
    }

    fn most_recent_first(events: &[InhaleEvent]) -> Vec<InhaleEvent> {
        let mut recent = events.to_vec();
        recent.sort_by(|a, b| {
            b.event_time
                .cmp(&a.event_time)
                .then_with(|| b.event_uid.cmp(&a.event_uid))
        });
        recent
    }

    /// Brand name of the medication in the most recent reliever event
    fn last_reliever_name<'a>(
        recent: &[InhaleEvent],
        medications: &'a [Medication],
    ) -> Option<&'a str> {
        recent.iter().find_map(|event| {
            medications
                .iter()
                .find(|m| m.drug_uid == event.drug_uid && m.is_reliever())
                .map(|m| m.brand_name.as_str())
        })
    }
}
