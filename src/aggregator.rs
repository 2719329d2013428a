//! Dose aggregation
//!
//! Groups the inhale events of one medication into clinical doses and flags
//! dosing anomalies (too soon, unscheduled, incomplete, issues).

use chrono::{DateTime, Utc};

use crate::status::InhaleStatusFlag;
use crate::types::{EventOrder, HistoryDose, InhaleEvent, Medication, Prescription};

/// Groups inhale events into doses
pub struct DoseAggregator;

impl DoseAggregator {
    /// Build the doses of `medication` from `events`.
    ///
    /// Events for other medications are ignored. `order` states the direction
    /// the caller supplied the events in; the result is always chronological
    /// with `index` counting from 0.
    pub fn aggregate(
        events: &[InhaleEvent],
        order: EventOrder,
        medication: &Medication,
        prescription: Option<&Prescription>,
    ) -> Vec<HistoryDose> {
        let ordered = Self::normalize(events, order, &medication.drug_uid);
        if ordered.is_empty() {
            return Vec::new();
        }

        let mut doses: Vec<HistoryDose> = Self::group(ordered, medication.same_dose_window_seconds)
            .into_iter()
            .map(|group| {
                let mut dose = HistoryDose::new(medication.drug_uid.clone(), group);
                dose.is_controller = medication.is_controller();
                dose.is_reliever = medication.is_reliever();
                dose
            })
            .collect();

        Self::annotate(&mut doses, medication, prescription);
        doses
    }

    /// Filter to one drug and sort ascending by time.
    ///
    /// The sort is stable, so events with equal times keep the order the
    /// caller's direction implies.
    fn normalize(events: &[InhaleEvent], order: EventOrder, drug_uid: &str) -> Vec<InhaleEvent> {
        let mut ordered: Vec<InhaleEvent> = events
            .iter()
            .filter(|e| e.drug_uid == drug_uid)
            .cloned()
            .collect();

        if order == EventOrder::Descending {
            ordered.reverse();
        }

        ordered.sort_by_key(|e| e.event_time);
        ordered
    }

    /// Merge events from the same device that share a dose id or fall within
    /// the same-dose window of that device's previous event.
    ///
    /// Groups are opened in event order, so the result is ordered by start time.
    fn group(events: Vec<InhaleEvent>, window_seconds: u32) -> Vec<Vec<InhaleEvent>> {
        let mut groups: Vec<Vec<InhaleEvent>> = Vec::new();

        for event in events {
            let open = groups.iter().rposition(|group| {
                group
                    .last()
                    .is_some_and(|e| e.device_serial_number == event.device_serial_number)
            });
            let same_dose = open
                .and_then(|i| groups[i].last())
                .is_some_and(|previous| Self::is_same_dose(previous, &event, window_seconds));

            match open {
                Some(i) if same_dose => groups[i].push(event),
                _ => groups.push(vec![event]),
            }
        }

        groups
    }

    fn is_same_dose(previous: &InhaleEvent, event: &InhaleEvent, window_seconds: u32) -> bool {
        if event.dose_id != 0 && event.dose_id == previous.dose_id {
            return true;
        }
        let gap = (event.event_time - previous.event_time).num_seconds();
        gap <= i64::from(window_seconds)
    }

    fn annotate(
        doses: &mut [HistoryDose],
        medication: &Medication,
        prescription: Option<&Prescription>,
    ) {
        let mut last_taken_start: Option<DateTime<Utc>> = None;

        for (index, dose) in doses.iter_mut().enumerate() {
            dose.index = Some(index as u32);

            let efforts: Vec<_> = dose.events.iter().map(InhaleEvent::inhalation_effort).collect();
            let acceptable = efforts.iter().filter(|e| e.is_acceptable()).count() as u32;
            let timed_out = dose
                .events
                .iter()
                .any(|e| e.issues().contains(&InhaleStatusFlag::Timeout));
            let expected = prescription.map_or(1, |p| p.inhales_per_dose.max(1));

            dose.is_complete = !timed_out && acceptable >= expected;

            if dose.is_taken() {
                if let (Some(start), Some(previous)) = (dose.start_time(), last_taken_start) {
                    let gap_minutes = (start - previous).num_minutes();

                    dose.is_too_soon =
                        gap_minutes < i64::from(medication.minimum_dose_interval_minutes);
                    dose.is_unscheduled = medication.is_controller()
                        && gap_minutes < i64::from(medication.minimum_schedule_interval_minutes);
                }
                last_taken_start = dose.start_time();
            }

            dose.has_issues = efforts.iter().any(|e| e.is_unsuccessful())
                || dose.events.iter().any(InhaleEvent::has_issues)
                || dose.is_unscheduled
                || !dose.is_complete;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::*;
    use crate::types::DoseOutcome;
    use pretty_assertions::assert_eq;

    fn good(uid: u32, hour: u32, minute: u32) -> InhaleEvent {
        event(uid, at(2020, 1, 31, hour, minute), 600, 0, true)
    }

    #[test]
    fn test_empty_input() {
        let doses = DoseAggregator::aggregate(&[], EventOrder::Ascending, &reliever(), None);
        assert!(doses.is_empty());
    }

    #[test]
    fn test_other_medications_ignored() {
        let mut e = good(1, 9, 0);
        e.drug_uid = "other".to_string();
        let doses = DoseAggregator::aggregate(&[e], EventOrder::Ascending, &reliever(), None);
        assert!(doses.is_empty());
    }

    #[test]
    fn test_events_within_window_form_one_dose() {
        let mut second = good(2, 9, 0);
        second.event_time += chrono::Duration::seconds(45);
        let events = vec![good(1, 9, 0), second, good(3, 9, 5)];

        let doses = DoseAggregator::aggregate(&events, EventOrder::Ascending, &reliever(), None);

        assert_eq!(doses.len(), 2);
        assert_eq!(doses[0].events.len(), 2);
        assert_eq!(doses[0].index, Some(0));
        assert_eq!(doses[1].index, Some(1));
        assert!(doses[0].is_reliever);
        assert!(!doses[0].is_controller);
    }

    #[test]
    fn test_shared_dose_id_merges_events() {
        let mut first = good(1, 9, 0);
        let mut second = good(2, 9, 3);
        first.dose_id = 42;
        second.dose_id = 42;

        let doses =
            DoseAggregator::aggregate(&[first, second], EventOrder::Ascending, &reliever(), None);
        assert_eq!(doses.len(), 1);
    }

    #[test]
    fn test_different_devices_do_not_merge() {
        let first = good(1, 9, 0);
        let mut second = good(2, 9, 0);
        second.device_serial_number = "999".to_string();

        let doses =
            DoseAggregator::aggregate(&[first, second], EventOrder::Ascending, &reliever(), None);
        assert_eq!(doses.len(), 2);
    }

    #[test]
    fn test_interleaved_devices_keep_their_doses() {
        let a1 = good(1, 9, 0);
        let mut b = good(2, 9, 0);
        b.device_serial_number = "999".to_string();
        b.event_time += chrono::Duration::seconds(10);
        let mut a2 = good(3, 9, 0);
        a2.event_time += chrono::Duration::seconds(20);

        let doses =
            DoseAggregator::aggregate(&[a1, b, a2], EventOrder::Ascending, &reliever(), None);

        assert_eq!(doses.len(), 2);
        let uids: Vec<Vec<u32>> = doses
            .iter()
            .map(|d| d.events.iter().map(|e| e.event_uid).collect())
            .collect();
        assert_eq!(uids, vec![vec![1, 3], vec![2]]);
        assert_eq!(doses[1].index, Some(1));
        assert!(!doses[0].is_too_soon);
        assert!(doses[1].is_too_soon);
    }

    #[test]
    fn test_order_decides_simultaneous_events() {
        let first = good(5, 9, 0);
        let mut second = good(3, 9, 0);
        second.device_serial_number = "999".to_string();
        let events = vec![first, second];

        let ascending =
            DoseAggregator::aggregate(&events, EventOrder::Ascending, &reliever(), None);
        let descending =
            DoseAggregator::aggregate(&events, EventOrder::Descending, &reliever(), None);

        assert_eq!(ascending[0].events[0].event_uid, 5);
        assert_eq!(descending[0].events[0].event_uid, 3);
    }

    #[test]
    fn test_descending_input_is_normalized() {
        let ascending = vec![good(1, 8, 0), good(2, 12, 0), good(3, 18, 0)];
        let mut descending = ascending.clone();
        descending.reverse();

        let a = DoseAggregator::aggregate(&ascending, EventOrder::Ascending, &reliever(), None);
        let d = DoseAggregator::aggregate(&descending, EventOrder::Descending, &reliever(), None);
        assert_eq!(a, d);
        assert_eq!(d[0].events[0].event_uid, 1);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let events = vec![
            good(1, 8, 0),
            good(2, 9, 0),
            event(3, at(2020, 1, 31, 9, 30), 0, 8, false),
        ];
        let first = DoseAggregator::aggregate(&events, EventOrder::Ascending, &reliever(), None);
        let second = DoseAggregator::aggregate(&events, EventOrder::Ascending, &reliever(), None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_too_soon() {
        // reliever minimum interval is 240 minutes
        let events = vec![good(1, 8, 0), good(2, 11, 59), good(3, 16, 0)];
        let doses = DoseAggregator::aggregate(&events, EventOrder::Ascending, &reliever(), None);

        assert!(!doses[0].is_too_soon);
        assert!(doses[1].is_too_soon);
        // measured from the previous taken dose, even when that one was too soon
        assert!(!doses[2].is_too_soon);
        assert!(!doses[1].is_unscheduled);
    }

    #[test]
    fn test_invalid_doses_do_not_count_towards_interval() {
        let events = vec![
            event(1, at(2020, 1, 31, 8, 0), 0, 8, false),
            good(2, 9, 0),
        ];
        let doses = DoseAggregator::aggregate(&events, EventOrder::Ascending, &reliever(), None);

        assert_eq!(doses[0].outcome(), DoseOutcome::Invalid);
        assert!(doses[0].has_issues);
        assert!(!doses[1].is_too_soon);
        assert!(!doses[1].has_issues);
    }

    #[test]
    fn test_unscheduled_controller_dose() {
        let med = controller();
        let events: Vec<InhaleEvent> = [(1, 8), (2, 12), (3, 20)]
            .into_iter()
            .map(|(uid, hour)| {
                let mut e = good(uid, hour, 0);
                e.drug_uid = med.drug_uid.clone();
                e
            })
            .collect();

        let doses = DoseAggregator::aggregate(&events, EventOrder::Ascending, &med, None);

        assert!(!doses[0].is_unscheduled);
        assert!(doses[1].is_unscheduled);
        assert!(doses[1].has_issues);
        assert!(!doses[2].is_unscheduled);
        assert!(doses[0].is_controller);
        assert!(!doses[1].is_too_soon);
    }

    #[test]
    fn test_timeout_marks_dose_incomplete() {
        let e = event(1, at(2020, 1, 31, 8, 0), 600, 1, true);
        let doses = DoseAggregator::aggregate(&[e], EventOrder::Ascending, &reliever(), None);

        assert_eq!(doses[0].outcome(), DoseOutcome::Taken);
        assert!(!doses[0].is_complete);
        assert!(doses[0].has_issues);
    }

    #[test]
    fn test_prescription_inhales_per_dose() {
        let prescription = Prescription {
            drug_uid: "745750".to_string(),
            doses_per_day: 2,
            inhales_per_dose: 2,
            prescription_date: at(2020, 1, 1, 0, 0),
        };
        let mut second = good(2, 8, 0);
        second.event_time += chrono::Duration::seconds(30);

        let single = DoseAggregator::aggregate(
            &[good(1, 8, 0)],
            EventOrder::Ascending,
            &reliever(),
            Some(&prescription),
        );
        assert!(!single.first().unwrap().is_complete);

        let pair = DoseAggregator::aggregate(
            &[good(1, 8, 0), second],
            EventOrder::Ascending,
            &reliever(),
            Some(&prescription),
        );
        assert_eq!(pair.len(), 1);
        assert!(pair[0].is_complete);
        assert!(!pair[0].has_issues);
    }

    #[test]
    fn test_high_flow_is_an_issue() {
        let e = event(1, at(2020, 1, 31, 8, 0), 2500, 0, true);
        let doses = DoseAggregator::aggregate(&[e], EventOrder::Ascending, &reliever(), None);
        assert!(doses[0].has_issues);
        assert_eq!(doses[0].outcome(), DoseOutcome::Invalid);
    }
}
