//! Core types for Inhaler Insights
//!
//! This module defines the records supplied by the surrounding application
//! (inhale events, medications, prescriptions, devices, environment) and the
//! derived records produced by the analysis (doses and history days).

use crate::effort::{is_high_flow, InhalationEffort};
use crate::error::AnalysisError;
use crate::status::{decode, StatusFlags};
use crate::usage::RelieverUsage;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One sensor-recorded attempt to use an inhaler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InhaleEvent {
    /// Event id, unique per device
    pub event_uid: u32,
    /// Serial number of the recording device
    pub device_serial_number: String,
    /// Drug loaded in the device when the event was recorded
    pub drug_uid: String,
    /// Time the cap was opened (UTC)
    pub event_time: DateTime<Utc>,
    /// Offset of the user's local time from UTC, in minutes
    #[serde(default)]
    pub timezone_offset_minutes: i32,
    /// Peak calculated flow in units of 100 ml/min
    #[serde(default)]
    pub inhale_peak: u32,
    /// Time from open event to inhale event, in 0.1 s
    #[serde(default)]
    pub inhale_event_time: u32,
    /// Duration of inhalation (ms)
    #[serde(default)]
    pub inhale_duration: u32,
    /// Time from inhale event to peak inhale (ms)
    #[serde(default)]
    pub inhale_time_to_peak: u32,
    /// Calculated total inhale volume (ml)
    #[serde(default)]
    pub inhale_volume: u32,
    /// Raw status bitmask
    #[serde(default)]
    pub status: u32,
    /// Whether the device considered the inhalation valid
    #[serde(default)]
    pub is_valid_inhale: bool,
    /// Seconds from open event to close event
    #[serde(default)]
    pub close_time: u32,
    /// Device-assigned dose id; events sharing a non-zero id belong to one dose
    #[serde(default)]
    pub dose_id: u32,
    /// Drug cartridge id
    #[serde(default)]
    pub cartridge_uid: String,
}

impl InhaleEvent {
    /// Peak inspiratory flow
    pub fn peak_inspiratory_flow(&self) -> u32 {
        self.inhale_peak
    }

    /// Identifier unique across devices
    pub fn unique_id(&self) -> String {
        format!("{}:{}", self.device_serial_number, self.event_uid)
    }

    /// Decoded status flags
    pub fn issues(&self) -> StatusFlags {
        decode(self.status)
    }

    /// Whether any status flag is set
    pub fn has_issues(&self) -> bool {
        self.status != 0
    }

    pub fn inhalation_effort(&self) -> InhalationEffort {
        InhalationEffort::classify(self.is_valid_inhale, &self.issues(), self.inhale_peak)
    }

    pub fn is_high_flow(&self) -> bool {
        is_high_flow(self.inhale_peak)
    }

    /// Calendar day of the event in the user's local time
    pub fn local_date(&self) -> NaiveDate {
        match FixedOffset::east_opt(self.timezone_offset_minutes.saturating_mul(60)) {
            Some(offset) => self.event_time.with_timezone(&offset).date_naive(),
            None => self.event_time.date_naive(),
        }
    }
}

/// Controller / reliever classification of a medication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationClassification {
    Controller = 1,
    Reliever = 2,
    DualUse = 3,
}

impl MedicationClassification {
    /// Convert a stored value into a classification
    pub fn from_value(value: u8) -> Result<Self, AnalysisError> {
        match value {
            1 => Ok(MedicationClassification::Controller),
            2 => Ok(MedicationClassification::Reliever),
            3 => Ok(MedicationClassification::DualUse),
            other => Err(AnalysisError::invalid_ordinal("medication classification", other)),
        }
    }

    /// Build a classification from its two capabilities
    pub fn from_flags(is_reliever: bool, is_controller: bool) -> Result<Self, AnalysisError> {
        let mut value = 0;
        if is_controller {
            value |= MedicationClassification::Controller.value();
        }
        if is_reliever {
            value |= MedicationClassification::Reliever.value();
        }
        Self::from_value(value)
    }

    pub const fn value(self) -> u8 {
        self as u8
    }

    pub fn contains(self, other: MedicationClassification) -> bool {
        self.value() & other.value() == other.value()
    }

    pub fn is_controller(self) -> bool {
        self.contains(MedicationClassification::Controller)
    }

    pub fn is_reliever(self) -> bool {
        self.contains(MedicationClassification::Reliever)
    }
}

impl TryFrom<u8> for MedicationClassification {
    type Error = AnalysisError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn default_near_empty_dose_count() -> u32 {
    20
}

fn default_same_dose_window_seconds() -> u32 {
    60
}

/// Medication metadata and dosing thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub drug_uid: String,
    pub brand_name: String,
    #[serde(default)]
    pub generic_name: String,
    pub classification: MedicationClassification,
    /// Inhalations in one day that are considered an overdose (0 disables the check)
    #[serde(default)]
    pub overdose_inhalation_count: u32,
    /// Minimum recommended interval between doses (minutes)
    #[serde(default)]
    pub minimum_dose_interval_minutes: u32,
    /// Minimum recommended interval between two scheduled doses (minutes)
    #[serde(default)]
    pub minimum_schedule_interval_minutes: u32,
    /// Initial dose count of an inhaler with this medication
    #[serde(default)]
    pub initial_dose_count: u32,
    /// Remaining doses at or below which an inhaler is near empty
    #[serde(default = "default_near_empty_dose_count")]
    pub near_empty_dose_count: u32,
    /// Consecutive events closer than this are merged into one dose (seconds)
    #[serde(default = "default_same_dose_window_seconds")]
    pub same_dose_window_seconds: u32,
}

impl Medication {
    pub fn is_controller(&self) -> bool {
        self.classification.is_controller()
    }

    pub fn is_reliever(&self) -> bool {
        self.classification.is_reliever()
    }
}

/// A prescription for a medication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub drug_uid: String,
    pub doses_per_day: u32,
    pub inhales_per_dose: u32,
    pub prescription_date: DateTime<Utc>,
}

/// A registered inhaler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub serial_number: String,
    #[serde(default)]
    pub nickname: String,
    /// Drug loaded in the inhaler, if known
    #[serde(default)]
    pub drug_uid: Option<String>,
    /// Initial dose capacity
    #[serde(default)]
    pub dose_count: u32,
    #[serde(default)]
    pub remaining_dose_count: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default)]
    pub last_connection: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Device {
    pub fn is_empty(&self) -> bool {
        self.remaining_dose_count == 0
    }

    /// Remaining doses at or below the medication's near-empty count.
    ///
    /// Devices without a known medication are never near empty.
    pub fn is_near_empty(&self, medication: Option<&Medication>) -> bool {
        medication.is_some_and(|m| self.remaining_dose_count <= m.near_empty_dose_count)
    }

    /// Percentage of doses remaining, rounded up
    pub fn remaining_dose_percentage(&self) -> u32 {
        if self.dose_count == 0 {
            return 0;
        }
        (100 * self.remaining_dose_count).div_ceil(self.dose_count)
    }

    pub fn doses_taken(&self) -> u32 {
        self.dose_count.saturating_sub(self.remaining_dose_count)
    }
}

/// Current environment advisory data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(default)]
    pub air_quality_index: Option<u32>,
    #[serde(default)]
    pub pollen_level: Option<String>,
    #[serde(default)]
    pub weather_summary: Option<String>,
    /// When the advisory data was last refreshed
    pub updated_at: DateTime<Utc>,
}

impl EnvironmentInfo {
    /// Whether any advisory data is present
    pub fn has_data(&self) -> bool {
        self.air_quality_index.is_some()
            || self.pollen_level.is_some()
            || self.weather_summary.is_some()
    }
}

/// Direction in which a caller supplies events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrder {
    #[default]
    Ascending,
    Descending,
}

/// How a dose was classified from its events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseOutcome {
    /// At least one event was a good or low inhalation
    Taken,
    /// Every event was a system error
    SystemError,
    /// No acceptable inhalation
    Invalid,
}

/// One clinical dose: one or more inhale events close together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryDose {
    pub drug_uid: String,
    pub events: Vec<InhaleEvent>,
    pub is_controller: bool,
    pub is_reliever: bool,
    /// Position among the medication's doses, in chronological order
    pub index: Option<u32>,
    pub is_too_soon: bool,
    pub is_complete: bool,
    /// Controller dose taken sooner than the schedule allows
    pub is_unscheduled: bool,
    pub has_issues: bool,
}

impl HistoryDose {
    pub fn new(drug_uid: impl Into<String>, events: Vec<InhaleEvent>) -> Self {
        Self {
            drug_uid: drug_uid.into(),
            events,
            is_controller: false,
            is_reliever: false,
            index: None,
            is_too_soon: false,
            is_complete: true,
            is_unscheduled: false,
            has_issues: false,
        }
    }

    /// Time of the first event in the dose
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|e| e.event_time)
    }

    /// Local calendar day of the first event
    pub fn local_date(&self) -> Option<NaiveDate> {
        self.events.first().map(InhaleEvent::local_date)
    }

    pub fn outcome(&self) -> DoseOutcome {
        let efforts: Vec<InhalationEffort> =
            self.events.iter().map(InhaleEvent::inhalation_effort).collect();

        if efforts.iter().any(InhalationEffort::is_acceptable) {
            DoseOutcome::Taken
        } else if !efforts.is_empty()
            && efforts.iter().all(|e| *e == InhalationEffort::SystemError)
        {
            DoseOutcome::SystemError
        } else {
            DoseOutcome::Invalid
        }
    }

    pub fn is_taken(&self) -> bool {
        self.outcome() == DoseOutcome::Taken
    }

    /// Sum of the PIF of every event in the dose
    pub fn total_peak_flow(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.peak_inspiratory_flow())).sum()
    }
}

/// Everything recorded for a single local day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDay {
    pub day: NaiveDate,
    /// Average reliever PIF for the day
    pub pif: Option<u32>,
    pub reliever_doses: Vec<HistoryDose>,
    pub controller_doses: Vec<HistoryDose>,
    pub invalid_doses: Vec<HistoryDose>,
    pub system_error_doses: Vec<HistoryDose>,
    pub connected_inhaler_count: u32,
    /// Some medication exceeded its overdose inhalation count on this day
    pub is_overdose: bool,
}

impl HistoryDay {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            pif: None,
            reliever_doses: Vec::new(),
            controller_doses: Vec::new(),
            invalid_doses: Vec::new(),
            system_error_doses: Vec::new(),
            connected_inhaler_count: 0,
            is_overdose: false,
        }
    }

    /// Reliever events plus invalid reliever events that were not system errors
    pub fn reliever_inhalation_count(&self) -> u32 {
        let reliever_events: usize = self.reliever_doses.iter().map(|d| d.events.len()).sum();

        let invalid_events = self
            .invalid_doses
            .iter()
            .filter(|d| d.is_reliever)
            .flat_map(|d| d.events.iter())
            .filter(|e| e.inhalation_effort() != InhalationEffort::SystemError)
            .count();

        (reliever_events + invalid_events) as u32
    }

    pub fn reliever_usage(&self) -> RelieverUsage {
        RelieverUsage::from_count(self.reliever_inhalation_count())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    pub fn event(uid: u32, time: DateTime<Utc>, pif: u32, status: u32, valid: bool) -> InhaleEvent {
        InhaleEvent {
            event_uid: uid,
            device_serial_number: "123454321".to_string(),
            drug_uid: "745750".to_string(),
            event_time: time,
            timezone_offset_minutes: 0,
            inhale_peak: pif,
            inhale_event_time: 20,
            inhale_duration: 1000,
            inhale_time_to_peak: 400,
            inhale_volume: 0,
            status,
            is_valid_inhale: valid,
            close_time: 6,
            dose_id: 0,
            cartridge_uid: "Cartridge4".to_string(),
        }
    }

    pub fn reliever() -> Medication {
        Medication {
            drug_uid: "745750".to_string(),
            brand_name: "ProAir".to_string(),
            generic_name: "albuterol".to_string(),
            classification: MedicationClassification::Reliever,
            overdose_inhalation_count: 12,
            minimum_dose_interval_minutes: 240,
            minimum_schedule_interval_minutes: 0,
            initial_dose_count: 200,
            near_empty_dose_count: 20,
            same_dose_window_seconds: 60,
        }
    }

    pub fn controller() -> Medication {
        Medication {
            drug_uid: "900100".to_string(),
            brand_name: "QVAR".to_string(),
            generic_name: "beclomethasone".to_string(),
            classification: MedicationClassification::Controller,
            overdose_inhalation_count: 4,
            minimum_dose_interval_minutes: 0,
            minimum_schedule_interval_minutes: 480,
            initial_dose_count: 120,
            near_empty_dose_count: 20,
            same_dose_window_seconds: 60,
        }
    }

    pub fn device(serial: &str, drug_uid: &str, remaining: u32) -> Device {
        Device {
            serial_number: serial.to_string(),
            nickname: format!("Inhaler {serial}"),
            drug_uid: Some(drug_uid.to_string()),
            dose_count: 200,
            remaining_dose_count: remaining,
            is_active: true,
            is_connected: true,
            last_connection: None,
        }
    }
}
