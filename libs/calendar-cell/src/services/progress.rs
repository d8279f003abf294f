// libs/calendar-cell/src/services/progress.rs
use std::collections::BTreeMap;

use chrono::NaiveDate;

use medication_cell::{Medication, MedicationStatus};
use shared_models::{CalendarDay, Role};

use crate::models::{CalendarEvent, CalendarViewer, DailyProgress, EventType, MedicationGroup};
use crate::services::projection::medication_events_for_day;

/// Doses of `patient_id` scheduled on `day` and how many were taken.
pub fn daily_progress(
    medications: &[Medication],
    statuses: &[MedicationStatus],
    day: &CalendarDay,
    patient_id: &str,
) -> DailyProgress {
    let mut progress = DailyProgress::default();

    for med in medications
        .iter()
        .filter(|med| med.prescribed_for == patient_id && med.is_scheduled_on(day))
    {
        for time in &med.frequency.specific_times {
            progress.total += 1;
            if statuses
                .iter()
                .any(|status| status.is_for(&med.id, day, time) && status.taken)
            {
                progress.taken += 1;
            }
        }
    }

    progress
}

/// Name of the medication a dose event's title refers to.
pub fn medication_name(event: &CalendarEvent) -> &str {
    event
        .title
        .strip_prefix("Take ")
        .or_else(|| event.title.split_once(": ").map(|(_, name)| name))
        .unwrap_or(&event.title)
}

/// Dose events grouped by medication name; other events are skipped.
pub fn group_by_medication(events: &[CalendarEvent]) -> BTreeMap<String, MedicationGroup> {
    let mut groups: BTreeMap<String, MedicationGroup> = BTreeMap::new();

    for event in events.iter().filter(|e| e.event_type == EventType::Medication) {
        let group = groups.entry(medication_name(event).to_string()).or_default();
        group.total += 1;
        if event.is_taken() {
            group.taken += 1;
        }
        group.events.push(event.clone());
    }

    groups
}

pub fn days_in_month(year: i32, month: u32) -> Vec<CalendarDay> {
    (1..=31)
        .map_while(|day| NaiveDate::from_ymd_opt(year, month, day))
        .map(CalendarDay::from)
        .collect()
}

/// Percentage of `patient_id`'s scheduled doses in the month marked taken.
pub fn monthly_adherence(
    medications: &[Medication],
    statuses: &[MedicationStatus],
    year: i32,
    month: u32,
    patient_id: &str,
) -> f64 {
    let viewer = CalendarViewer::new(patient_id, Role::Patient);
    let (taken, total) = days_in_month(year, month)
        .iter()
        .flat_map(|day| medication_events_for_day(medications, statuses, day, &viewer))
        .fold((0usize, 0usize), |(taken, total), event| {
            (taken + usize::from(event.is_taken()), total + 1)
        });

    if total == 0 {
        return 0.0;
    }
    taken as f64 / total as f64 * 100.0
}
