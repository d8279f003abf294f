//! Prescriptions and dose events used when nothing usable is persisted.

use chrono::{NaiveDate, TimeZone, Utc};

use shared_models::{CalendarDay, ClockTime};
use crate::models::{Frequency, Medication, MedicationStatus, MedicationsByPatient};

const SEED_DOCTOR: &str = "D001";

fn times(raw: &[(u32, u32)]) -> Vec<ClockTime> {
    raw.iter()
        .filter_map(|&(hour, minute)| ClockTime::new(hour, minute))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn prescription(
    id: &str,
    patient_id: &str,
    name: &str,
    dosage: &str,
    schedule: &[(u32, u32)],
    start_date: (i32, u32, u32),
    purpose: &str,
    instructions: &str,
) -> Option<Medication> {
    let specific_times = times(schedule);
    Some(Medication {
        id: id.to_string(),
        name: name.to_string(),
        dosage: dosage.to_string(),
        frequency: Frequency::daily(&specific_times),
        instructions: instructions.to_string(),
        start_date: NaiveDate::from_ymd_opt(start_date.0, start_date.1, start_date.2)?,
        end_date: None,
        prescribed_by: SEED_DOCTOR.to_string(),
        prescribed_for: patient_id.to_string(),
        purpose: Some(purpose.to_string()),
        reminders: Some(true),
        reminder_times: Some(specific_times),
    })
}

pub fn seed_medications() -> MedicationsByPatient {
    let prescriptions = [
        prescription(
            "m1",
            "P001",
            "Levodopa/Carbidopa",
            "25/100 mg",
            &[(8, 0), (13, 0), (18, 0)],
            (2024, 1, 15),
            "Primary treatment for motor symptoms",
            "Take with meals",
        ),
        prescription(
            "m2",
            "P001",
            "Amantadine",
            "100 mg",
            &[(9, 0), (15, 0)],
            (2024, 2, 1),
            "Helps with dyskinesia",
            "Take in the morning and afternoon",
        ),
        prescription(
            "m3",
            "P002",
            "Pramipexole",
            "0.5 mg",
            &[(8, 0), (14, 0), (20, 0)],
            (2024, 1, 1),
            "Dopamine agonist for early-stage symptoms",
            "Take with or without food",
        ),
        prescription(
            "m4",
            "P003",
            "Selegiline",
            "5 mg",
            &[(8, 0), (14, 0)],
            (2024, 2, 15),
            "MAO-B inhibitor for motor fluctuations",
            "Take in the morning and early afternoon",
        ),
        prescription(
            "m5",
            "P003",
            "Levodopa/Carbidopa",
            "50/200 mg",
            &[(7, 30), (11, 30), (15, 30), (19, 30)],
            (2024, 1, 15),
            "Advanced stage motor symptom management",
            "Take 30 minutes before meals",
        ),
    ];

    let mut by_patient = MedicationsByPatient::new();
    for medication in prescriptions.into_iter().flatten() {
        by_patient
            .entry(medication.prescribed_for.clone())
            .or_default()
            .push(medication);
    }
    by_patient
}

/// Two doses of patient P001 already taken on `today`.
pub fn seed_statuses(today: NaiveDate) -> Vec<MedicationStatus> {
    [("m1", (8, 0), (8, 5)), ("m2", (9, 0), (9, 2))]
        .into_iter()
        .filter_map(|(medication_id, (hour, minute), (resp_hour, resp_minute))| {
            let responded = today.and_hms_opt(resp_hour, resp_minute, 0)?;
            Some(MedicationStatus {
                medication_id: medication_id.to_string(),
                date: CalendarDay::from(today),
                time: ClockTime::new(hour, minute)?,
                taken: true,
                response_time: Some(Utc.from_utc_datetime(&responded)),
            })
        })
        .collect()
}
