//! Inhalation feedback
//!
//! Decides which feedback notifications apply after a new inhale event is
//! recorded. The evaluator only decides; delivering notifications and storing
//! the good-inhalation setting is left to the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::effort::InhalationEffort;
use crate::status::{format_error_codes, has_system_errors, system_error_codes};
use crate::types::{Device, InhaleEvent, Medication};

pub const PARAM_INHALE_EVENT_ID: &str = "InhaleEventUniqueId";
pub const PARAM_SYSTEM_ERROR_CODE: &str = "SystemErrorCode";
pub const PARAM_MEDICATION_NAME: &str = "MedicationName";
pub const PARAM_MAX_EVENTS_TO_CHECK: &str = "MaxEventsToCheckForUnsuccessfulInhalationEvents";
pub const PARAM_MAX_UNSUCCESSFUL: &str = "MaxUnsuccessfulInhaleEvents";

/// Feedback notification identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackNotificationId {
    SystemErrorDetected,
    GoodInhalation,
    LowInhalation,
    /// Good inhalation, offering to turn good-inhalation feedback off
    TurnOffGoodInhalation,
    /// Low inhalation, offering to turn feedback off together with a tip
    TurnOffGoodInhalationWithTip,
    NoInhalation,
    Exhalation,
    HighInhalation,
    SuboptimalInhalations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackNotification {
    pub id: FeedbackNotificationId,
    pub parameters: BTreeMap<String, String>,
}

/// Outcome of evaluating the most recent inhale event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackDecision {
    /// Notifications to raise, in the order they should be raised
    pub notifications: Vec<FeedbackNotification>,
    /// The caller should turn good-inhalation feedback back on
    pub re_enable_good_feedback: bool,
    /// The caller should re-check reliever overuse
    pub check_overuse: bool,
}

/// Inputs for feedback evaluation
#[derive(Debug, Clone)]
pub struct FeedbackContext<'a> {
    /// Recent events, most recent first
    pub recent_events: &'a [InhaleEvent],
    pub now: DateTime<Utc>,
    pub good_feedback_enabled: bool,
    /// Device that recorded the most recent event, when it is known
    pub device: Option<&'a Device>,
    pub medications: &'a [Medication],
}

pub struct FeedbackEvaluator;

impl FeedbackEvaluator {
    pub fn evaluate(context: &FeedbackContext<'_>, config: &AnalysisConfig) -> FeedbackDecision {
        let mut decision = FeedbackDecision::default();

        let Some(latest) = context.recent_events.first() else {
            return decision;
        };
        let effort = latest.inhalation_effort();
        decision.check_overuse = effort != InhalationEffort::SystemError;

        if context.device.is_none() {
            return decision;
        }

        let mut raise = |id, parameters, event: &InhaleEvent| {
            let age = context.now - event.event_time;
            if age.num_minutes() < i64::from(config.feedback_window_minutes) {
                decision.notifications.push(FeedbackNotification { id, parameters });
            }
        };

        match effort {
            InhalationEffort::SystemError => {
                let codes = system_error_codes(&latest.issues());
                let mut parameters = event_parameters(latest);
                parameters.insert(PARAM_SYSTEM_ERROR_CODE.to_string(), format_error_codes(&codes));
                raise(FeedbackNotificationId::SystemErrorDetected, parameters, latest);
            }
            InhalationEffort::GoodInhalation | InhalationEffort::LowInhalation => {
                if context.good_feedback_enabled {
                    let id = Self::acceptable_notification(context.recent_events, effort, config);
                    raise(id, event_parameters(latest), latest);
                }
            }
            InhalationEffort::NoInhalation
            | InhalationEffort::Exhalation
            | InhalationEffort::Error => {
                if let Some((notification, event)) =
                    Self::suboptimal_notification(context, config)
                {
                    raise(notification.id, notification.parameters, event);
                }
                let id = match effort {
                    InhalationEffort::NoInhalation => FeedbackNotificationId::NoInhalation,
                    InhalationEffort::Exhalation => FeedbackNotificationId::Exhalation,
                    _ => FeedbackNotificationId::HighInhalation,
                };
                raise(id, event_parameters(latest), latest);
                decision.re_enable_good_feedback = true;
            }
        }

        debug!(
            event = %latest.unique_id(),
            effort = effort.as_str(),
            notifications = decision.notifications.len(),
            "evaluated inhalation feedback"
        );
        decision
    }

    /// Normal notification, or the turn-off variant once enough consecutive
    /// acceptable inhalations have been recorded.
    fn acceptable_notification(
        recent_events: &[InhaleEvent],
        effort: InhalationEffort,
        config: &AnalysisConfig,
    ) -> FeedbackNotificationId {
        let required = config.consecutive_acceptable_for_tip;
        let consecutive = if recent_events.len() >= required {
            recent_events
                .iter()
                .take_while(|e| e.inhalation_effort().is_acceptable())
                .count()
        } else {
            0
        };

        match (effort, consecutive >= required) {
            (InhalationEffort::GoodInhalation, false) => FeedbackNotificationId::GoodInhalation,
            (InhalationEffort::GoodInhalation, true) => {
                FeedbackNotificationId::TurnOffGoodInhalation
            }
            (_, false) => FeedbackNotificationId::LowInhalation,
            (_, true) => FeedbackNotificationId::TurnOffGoodInhalationWithTip,
        }
    }

    /// Suboptimal-use notification when too many of the recent events without
    /// system errors were unsuccessful.
    fn suboptimal_notification<'a>(
        context: &FeedbackContext<'a>,
        config: &AnalysisConfig,
    ) -> Option<(FeedbackNotification, &'a InhaleEvent)> {
        let sample: Vec<&InhaleEvent> = context
            .recent_events
            .iter()
            .filter(|e| !has_system_errors(&e.issues()))
            .take(config.suboptimal_sample_size)
            .collect();

        if sample.len() < config.suboptimal_threshold {
            return None;
        }

        let unsuccessful = sample
            .iter()
            .filter(|e| e.inhalation_effort().is_unsuccessful())
            .count();
        if unsuccessful < config.suboptimal_threshold {
            return None;
        }

        let latest = *sample.first()?;
        let mut parameters = event_parameters(latest);
        parameters.insert(
            PARAM_MAX_EVENTS_TO_CHECK.to_string(),
            config.suboptimal_sample_size.to_string(),
        );
        parameters.insert(
            PARAM_MAX_UNSUCCESSFUL.to_string(),
            config.suboptimal_threshold.to_string(),
        );

        let brand_name = context
            .device
            .and_then(|d| d.drug_uid.as_deref())
            .and_then(|uid| context.medications.iter().find(|m| m.drug_uid == uid))
            .map(|m| m.brand_name.clone());
        if let Some(name) = brand_name {
            parameters.insert(PARAM_MEDICATION_NAME.to_string(), name);
        }

        Some((
            FeedbackNotification {
                id: FeedbackNotificationId::SuboptimalInhalations,
                parameters,
            },
            latest,
        ))
    }
}

fn event_parameters(event: &InhaleEvent) -> BTreeMap<String, String> {
    BTreeMap::from([(PARAM_INHALE_EVENT_ID.to_string(), event.unique_id())])
}
