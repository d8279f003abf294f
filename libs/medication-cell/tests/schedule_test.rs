use chrono::NaiveDate;

use medication_cell::models::{Frequency, Medication, MedicationStatus};
use medication_cell::seed::{seed_medications, seed_statuses};
use medication_cell::services::adherence::adherence_between;
use shared_models::{CalendarDay, ClockTime};

fn weekday_only_medication() -> Medication {
    let mut medication = seed_medications()["P002"][0].clone();
    medication.frequency = Frequency {
        times_per_day: 1,
        specific_times: vec![ClockTime::new(8, 0).unwrap()],
        days_of_week: Some(vec![1, 3, 5]),
    };
    medication.end_date = NaiveDate::from_ymd_opt(2024, 6, 30);
    medication
}

#[test]
fn test_days_of_week_restrict_schedule() {
    let medication = weekday_only_medication();

    // 2024-06-03 is a Monday, 2024-06-04 a Tuesday
    assert!(medication.is_scheduled_on(&CalendarDay::from_ymd(2024, 6, 3).unwrap()));
    assert!(!medication.is_scheduled_on(&CalendarDay::from_ymd(2024, 6, 4).unwrap()));
}

#[test]
fn test_schedule_honours_start_and_end_dates() {
    let medication = weekday_only_medication();

    assert!(!medication.is_scheduled_on(&CalendarDay::from_ymd(2023, 12, 29).unwrap()));
    assert!(medication.is_scheduled_on(&CalendarDay::from_ymd(2024, 6, 28).unwrap()));
    assert!(!medication.is_scheduled_on(&CalendarDay::from_ymd(2024, 7, 1).unwrap()));
}

#[test]
fn test_seed_statuses_are_for_given_day() {
    let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

    let statuses = seed_statuses(day);

    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].time.to_string(), "08:00");
    assert_eq!(statuses[1].medication_id, "m2");
    assert!(statuses.iter().all(|s| s.date == CalendarDay::from(day)));
}

#[test]
fn test_medication_wire_format_uses_camel_case() {
    let medication = &seed_medications()["P001"][0];

    let json = serde_json::to_value(medication).unwrap();

    assert_eq!(json["frequency"]["specificTimes"][1], "13:00");
    assert_eq!(json["startDate"], "2024-01-15");
    assert_eq!(json["prescribedFor"], "P001");
    assert!(json.get("endDate").is_none());
}

#[test]
fn test_adherence_ignores_other_patients_doses() {
    let by_patient = seed_medications();
    let day = CalendarDay::from_ymd(2024, 6, 3).unwrap();
    let statuses = vec![
        MedicationStatus {
            medication_id: "m1".to_string(),
            date: day,
            time: ClockTime::new(8, 0).unwrap(),
            taken: true,
            response_time: None,
        },
        MedicationStatus {
            medication_id: "m3".to_string(),
            date: day,
            time: ClockTime::new(8, 0).unwrap(),
            taken: false,
            response_time: None,
        },
    ];

    let stats = adherence_between(&by_patient["P001"], &statuses, day.as_naive(), day.as_naive());

    assert_eq!((stats.taken, stats.total), (1, 1));
    assert_eq!(stats.percentage, 100.0);
}
