//! Dashboard summary prioritization
//!
//! Produces the summary messages the dashboard can show, highest priority
//! first. Priority is the declaration order of [`SummaryTextId`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::types::{Device, EnvironmentInfo, Medication};

/// Reliever inhalations in one day above which the overuse message is shown
pub const OVERUSE_THRESHOLD: u32 = 8;

/// Summary message identifiers, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SummaryTextId {
    Overuse = 0,
    NoInhalers = 1,
    EmptyInhaler = 2,
    EnvironmentMessage = 3,
    NeutralMessage = 4,
}

impl SummaryTextId {
    pub fn from_ordinal(ordinal: u8) -> Result<Self, AnalysisError> {
        match ordinal {
            0 => Ok(SummaryTextId::Overuse),
            1 => Ok(SummaryTextId::NoInhalers),
            2 => Ok(SummaryTextId::EmptyInhaler),
            3 => Ok(SummaryTextId::EnvironmentMessage),
            4 => Ok(SummaryTextId::NeutralMessage),
            other => Err(AnalysisError::invalid_ordinal("summary text id", other)),
        }
    }

    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryTextId::Overuse => "OVERUSE",
            SummaryTextId::NoInhalers => "NO_INHALERS",
            SummaryTextId::EmptyInhaler => "EMPTY_INHALER",
            SummaryTextId::EnvironmentMessage => "ENVIRONMENT_MESSAGE",
            SummaryTextId::NeutralMessage => "NEUTRAL_MESSAGE",
        }
    }
}

/// A summary message and its string replacement parameters.
///
/// Equality and ordering consider `id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryInfo {
    pub id: SummaryTextId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,
}

impl SummaryInfo {
    pub fn new(id: SummaryTextId) -> Self {
        Self { id, parameters: None }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

impl PartialEq for SummaryInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SummaryInfo {}

impl PartialOrd for SummaryInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SummaryInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// Sorted set of summary messages, at most one per id
#[derive(Debug, Clone, Default)]
pub struct SummaryMessageQueue {
    messages: BTreeSet<SummaryInfo>,
}

impl SummaryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message; returns false if a message with the same id is queued
    pub fn add_message(&mut self, message: SummaryInfo) -> bool {
        self.messages.insert(message)
    }

    /// Remove the message with `id`; returns whether one was queued
    pub fn remove_message(&mut self, id: SummaryTextId) -> bool {
        self.messages.remove(&SummaryInfo::new(id))
    }

    /// Highest-priority message
    pub fn top_message(&self) -> Option<&SummaryInfo> {
        self.messages.first()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_vec(self) -> Vec<SummaryInfo> {
        self.messages.into_iter().collect()
    }
}

/// Inputs the prioritizer evaluates, all supplied by the caller
#[derive(Debug, Clone)]
pub struct SummaryContext<'a> {
    pub devices: &'a [Device],
    pub medications: &'a [Medication],
    /// Reliever inhalations recorded today
    pub todays_reliever_inhalations: u32,
    /// Brand name of the medication in the most recent reliever event
    pub last_reliever_medication_name: Option<&'a str>,
    pub environment: Option<&'a EnvironmentInfo>,
    pub now: DateTime<Utc>,
}

/// Builds the prioritized summary list
pub struct SummaryPrioritizer;

impl SummaryPrioritizer {
    /// Every applicable summary message, highest priority first.
    ///
    /// The neutral message is always present.
    pub fn prioritize(context: &SummaryContext<'_>, config: &AnalysisConfig) -> Vec<SummaryInfo> {
        let mut queue = SummaryMessageQueue::new();

        if context.todays_reliever_inhalations > OVERUSE_THRESHOLD {
            let overuse = SummaryInfo::new(SummaryTextId::Overuse);
            match context.last_reliever_medication_name {
                Some(name) => {
                    queue.add_message(overuse.with_parameter("MedicationName", name));
                }
                None => warn!("medication not found when creating overuse summary"),
            }
        }

        let active: Vec<&Device> = context.devices.iter().filter(|d| d.is_active).collect();
        if active.is_empty() {
            queue.add_message(SummaryInfo::new(SummaryTextId::NoInhalers));
        } else if let Some(device) = active
            .iter()
            .find(|d| d.is_near_empty(Self::medication_for(context.medications, d)))
        {
            queue.add_message(
                SummaryInfo::new(SummaryTextId::EmptyInhaler)
                    .with_parameter("Name", device.nickname.clone()),
            );
        }

        if let Some(environment) = context.environment {
            if Self::is_environment_current(environment, context.now, config) {
                queue.add_message(SummaryInfo::new(SummaryTextId::EnvironmentMessage));
            }
        }

        queue.add_message(SummaryInfo::new(SummaryTextId::NeutralMessage));

        debug!(messages = queue.len(), "prioritized summary messages");
        queue.into_vec()
    }

    fn medication_for<'a>(
        medications: &'a [Medication],
        device: &Device,
    ) -> Option<&'a Medication> {
        let drug_uid = device.drug_uid.as_deref()?;
        medications.iter().find(|m| m.drug_uid == drug_uid)
    }

    fn is_environment_current(
        environment: &EnvironmentInfo,
        now: DateTime<Utc>,
        config: &AnalysisConfig,
    ) -> bool {
        let max_age = Duration::minutes(i64::from(config.environment_max_age_minutes));
        environment.has_data() && now - environment.updated_at <= max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::*;
    use pretty_assertions::assert_eq;

    fn ids(summary: &[SummaryInfo]) -> Vec<SummaryTextId> {
        summary.iter().map(|s| s.id).collect()
    }

    fn environment(updated_at: DateTime<Utc>) -> EnvironmentInfo {
        EnvironmentInfo {
            air_quality_index: Some(42),
            pollen_level: Some("low".to_string()),
            weather_summary: None,
            updated_at,
        }
    }

    fn context<'a>(devices: &'a [Device], medications: &'a [Medication]) -> SummaryContext<'a> {
        SummaryContext {
            devices,
            medications,
            todays_reliever_inhalations: 0,
            last_reliever_medication_name: None,
            environment: None,
            now: at(2020, 1, 31, 12, 0),
        }
    }

    #[test]
    fn test_text_id_ordinals() {
        assert_eq!(SummaryTextId::from_ordinal(0).unwrap(), SummaryTextId::Overuse);
        assert_eq!(SummaryTextId::from_ordinal(4).unwrap(), SummaryTextId::NeutralMessage);
        assert!(SummaryTextId::from_ordinal(5).is_err());
        assert!(SummaryTextId::Overuse < SummaryTextId::EmptyInhaler);
    }

    #[test]
    fn test_summary_info_compares_by_id() {
        let a = SummaryInfo::new(SummaryTextId::Overuse).with_parameter("MedicationName", "ProAir");
        let b = SummaryInfo::new(SummaryTextId::Overuse);
        assert_eq!(a, b);
        assert!(a < SummaryInfo::new(SummaryTextId::NeutralMessage));
    }

    #[test]
    fn test_queue_rejects_duplicates() {
        let mut queue = SummaryMessageQueue::new();
        assert!(queue.add_message(SummaryInfo::new(SummaryTextId::NeutralMessage)));
        assert!(queue.add_message(SummaryInfo::new(SummaryTextId::EmptyInhaler)));
        assert!(!queue.add_message(SummaryInfo::new(SummaryTextId::EmptyInhaler)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.top_message().map(|m| m.id), Some(SummaryTextId::EmptyInhaler));

        assert!(queue.remove_message(SummaryTextId::EmptyInhaler));
        assert!(!queue.remove_message(SummaryTextId::EmptyInhaler));
        assert_eq!(queue.top_message().map(|m| m.id), Some(SummaryTextId::NeutralMessage));
    }

    #[test]
    fn test_no_inhalers() {
        let summary =
            SummaryPrioritizer::prioritize(&context(&[], &[]), &AnalysisConfig::default());
        assert_eq!(
            ids(&summary),
            vec![SummaryTextId::NoInhalers, SummaryTextId::NeutralMessage]
        );
    }

    #[test]
    fn test_inactive_devices_count_as_none() {
        let mut device = device("A1", "745750", 150);
        device.is_active = false;
        let devices = [device];
        let summary =
            SummaryPrioritizer::prioritize(&context(&devices, &[]), &AnalysisConfig::default());
        assert_eq!(summary[0].id, SummaryTextId::NoInhalers);
    }

    #[test]
    fn test_overuse_before_empty_inhaler() {
        let devices = [device("A1", "745750", 150), device("A2", "745750", 10)];
        let medications = [reliever()];
        let mut ctx = context(&devices, &medications);
        ctx.todays_reliever_inhalations = 9;
        ctx.last_reliever_medication_name = Some("ProAir");

        let summary = SummaryPrioritizer::prioritize(&ctx, &AnalysisConfig::default());

        assert_eq!(
            ids(&summary),
            vec![
                SummaryTextId::Overuse,
                SummaryTextId::EmptyInhaler,
                SummaryTextId::NeutralMessage,
            ]
        );
        let params = summary[0].parameters.as_ref().unwrap();
        assert_eq!(params.get("MedicationName").map(String::as_str), Some("ProAir"));
        let params = summary[1].parameters.as_ref().unwrap();
        assert_eq!(params.get("Name").map(String::as_str), Some("Inhaler A2"));
    }

    #[test]
    fn test_overuse_threshold_is_exclusive() {
        let devices = [device("A1", "745750", 150)];
        let medications = [reliever()];
        let mut ctx = context(&devices, &medications);
        ctx.todays_reliever_inhalations = 8;
        ctx.last_reliever_medication_name = Some("ProAir");

        let summary = SummaryPrioritizer::prioritize(&ctx, &AnalysisConfig::default());
        assert_eq!(ids(&summary), vec![SummaryTextId::NeutralMessage]);
    }

    #[test]
    fn test_overuse_without_medication_name_is_skipped() {
        let devices = [device("A1", "745750", 150)];
        let mut ctx = context(&devices, &[]);
        ctx.todays_reliever_inhalations = 20;

        let summary = SummaryPrioritizer::prioritize(&ctx, &AnalysisConfig::default());
        assert_eq!(ids(&summary), vec![SummaryTextId::NeutralMessage]);
    }

    #[test]
    fn test_environment_message_freshness() {
        let devices = [device("A1", "745750", 150)];
        let fresh = environment(at(2020, 1, 31, 6, 0));
        let stale = environment(at(2020, 1, 29, 6, 0));
        let mut ctx = context(&devices, &[]);

        ctx.environment = Some(&fresh);
        let summary = SummaryPrioritizer::prioritize(&ctx, &AnalysisConfig::default());
        assert_eq!(
            ids(&summary),
            vec![SummaryTextId::EnvironmentMessage, SummaryTextId::NeutralMessage]
        );

        ctx.environment = Some(&stale);
        let summary = SummaryPrioritizer::prioritize(&ctx, &AnalysisConfig::default());
        assert_eq!(ids(&summary), vec![SummaryTextId::NeutralMessage]);
    }

    #[test]
    fn test_environment_without_data_is_ignored() {
        let devices = [device("A1", "745750", 150)];
        let empty = EnvironmentInfo {
            air_quality_index: None,
            pollen_level: None,
            weather_summary: None,
            updated_at: at(2020, 1, 31, 11, 0),
        };
        let mut ctx = context(&devices, &[]);
        ctx.environment = Some(&empty);

        let summary = SummaryPrioritizer::prioritize(&ctx, &AnalysisConfig::default());
        assert_eq!(ids(&summary), vec![SummaryTextId::NeutralMessage]);
    }

    #[test]
    fn test_serialized_id() {
        let json = serde_json::to_string(&SummaryInfo::new(SummaryTextId::EmptyInhaler)).unwrap();
        assert_eq!(json, r#"{"id":"EMPTY_INHALER"}"#);
    }
}
