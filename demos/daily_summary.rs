//! Analyze a day of inhaler use and print the report

fn main() {
    let json = r#"{
        "today": "2020-01-31",
        "now": "2020-01-31T18:05:00Z",
        "events": [
            { "event_uid": 1, "device_serial_number": "123454321", "drug_uid": "745750", "event_time": "2020-01-31T07:00:00Z", "inhale_peak": 620, "is_valid_inhale": true },
            { "event_uid": 2, "device_serial_number": "123454321", "drug_uid": "745750", "event_time": "2020-01-31T07:00:40Z", "inhale_peak": 410, "is_valid_inhale": true },
            { "event_uid": 3, "device_serial_number": "123454321", "drug_uid": "745750", "event_time": "2020-01-31T12:30:00Z", "inhale_peak": 0, "status": 8, "is_valid_inhale": false },
            { "event_uid": 4, "device_serial_number": "123454321", "drug_uid": "745750", "event_time": "2020-01-31T18:00:00Z", "inhale_peak": 2150, "is_valid_inhale": true }
        ],
        "medications": [
            { "drug_uid": "745750", "brand_name": "ProAir", "classification": "reliever", "minimum_dose_interval_minutes": 240, "overdose_inhalation_count": 12 }
        ],
        "devices": [
            { "serial_number": "123454321", "nickname": "Blue", "drug_uid": "745750", "dose_count": 200, "remaining_dose_count": 18 }
        ],
        "environment": { "air_quality_index": 35, "pollen_level": "moderate", "updated_at": "2020-01-31T06:00:00Z" },
        "history_start": "2020-01-29"
    }"#;

    match inhaler_insights::analyze_json(json.to_string()) {
        Ok(report) => print!("{report}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
