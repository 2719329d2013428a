//! History collation
//!
//! Builds one [`HistoryDay`] per local calendar day from the doses of every
//! known medication.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::aggregator::DoseAggregator;
use crate::error::AnalysisError;
use crate::types::{
    DoseOutcome, EventOrder, HistoryDay, HistoryDose, InhaleEvent, Medication, Prescription,
};

/// Collates doses into per-day history
pub struct HistoryCollator;

impl HistoryCollator {
    /// Collate `events` into one entry per day in `start..=end`, ascending.
    ///
    /// Events whose drug matches no medication are skipped. `connection_counts`
    /// supplies the number of inhalers connected on each day; missing days
    /// count as zero.
    pub fn collate(
        events: &[InhaleEvent],
        order: EventOrder,
        medications: &[Medication],
        prescriptions: &[Prescription],
        start: NaiveDate,
        end: NaiveDate,
        connection_counts: &BTreeMap<NaiveDate, u32>,
    ) -> Result<Vec<HistoryDay>, AnalysisError> {
        if start > end {
            return Err(AnalysisError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        Self::warn_unknown_medications(events, medications);

        let mut days: BTreeMap<NaiveDate, HistoryDay> = start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| {
                let mut history_day = HistoryDay::new(day);
                history_day.connected_inhaler_count =
                    connection_counts.get(&day).copied().unwrap_or(0);
                (day, history_day)
            })
            .collect();

        for medication in medications {
            let prescription = Self::current_prescription(prescriptions, &medication.drug_uid);
            let doses = DoseAggregator::aggregate(events, order, medication, prescription);
            let mut taken_per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();

            for dose in doses {
                let Some(day) = dose.local_date().and_then(|date| days.get_mut(&date)) else {
                    continue;
                };

                match dose.outcome() {
                    DoseOutcome::Taken => {
                        *taken_per_day.entry(day.day).or_insert(0) += dose.events.len() as u32;
                        Self::add_taken(day, dose);
                    }
                    DoseOutcome::SystemError => day.system_error_doses.push(dose),
                    DoseOutcome::Invalid => day.invalid_doses.push(dose),
                }
            }

            if medication.overdose_inhalation_count > 0 {
                for (date, count) in taken_per_day {
                    if count > medication.overdose_inhalation_count {
                        if let Some(day) = days.get_mut(&date) {
                            day.is_overdose = true;
                        }
                    }
                }
            }
        }

        for day in days.values_mut() {
            day.pif = Self::average_pif(&day.reliever_doses);
        }

        debug!(
            start = %start,
            end = %end,
            days = days.len(),
            "collated inhalation history"
        );

        Ok(days.into_values().collect())
    }

    /// Dual-use doses land in both the reliever and controller buckets.
    fn add_taken(day: &mut HistoryDay, dose: HistoryDose) {
        match (dose.is_reliever, dose.is_controller) {
            (true, true) => {
                day.controller_doses.push(dose.clone());
                day.reliever_doses.push(dose);
            }
            (true, false) => day.reliever_doses.push(dose),
            _ => day.controller_doses.push(dose),
        }
    }

    /// Most recent prescription for a drug
    fn current_prescription<'a>(
        prescriptions: &'a [Prescription],
        drug_uid: &str,
    ) -> Option<&'a Prescription> {
        prescriptions
            .iter()
            .filter(|p| p.drug_uid == drug_uid)
            .max_by_key(|p| p.prescription_date)
    }

    /// Sum of reliever event PIFs over the number of reliever doses
    fn average_pif(reliever_doses: &[HistoryDose]) -> Option<u32> {
        if reliever_doses.is_empty() {
            return None;
        }
        let total: u64 = reliever_doses.iter().map(HistoryDose::total_peak_flow).sum();
        Some(u32::try_from(total / reliever_doses.len() as u64).unwrap_or(u32::MAX))
    }

    fn warn_unknown_medications(events: &[InhaleEvent], medications: &[Medication]) {
        let known: BTreeSet<&str> = medications.iter().map(|m| m.drug_uid.as_str()).collect();
        let mut unknown: BTreeMap<&str, usize> = BTreeMap::new();

        for event in events.iter().filter(|e| !known.contains(e.drug_uid.as_str())) {
            *unknown.entry(event.drug_uid.as_str()).or_insert(0) += 1;
        }

        for (drug_uid, count) in unknown {
            warn!(drug_uid, count, "skipping inhale events for unknown medication");
        }
    }
}
