// libs/calendar-cell/src/services/projection.rs
use chrono::Duration;
use tracing::debug;

use appointment_cell::{AppointmentRequest, AppointmentStatus};
use medication_cell::{Medication, MedicationStatus};
use shared_models::{CalendarDay, Participant, Role};

use crate::models::{CalendarEvent, CalendarViewer, EventType, APPOINTMENT_MINUTES, DOSE_MINUTES};

/// Accepted appointments as calendar entries starting at their final time.
pub fn appointment_events(appointments: &[AppointmentRequest]) -> Vec<CalendarEvent> {
    appointments
        .iter()
        .filter(|apt| apt.status == AppointmentStatus::Accepted)
        .filter_map(|apt| {
            let start = apt.final_date_time?;
            Some(CalendarEvent {
                id: format!("apt-{}", apt.id),
                title: format!("Appointment with {}", apt.doctor_name),
                start,
                end: start + Duration::minutes(APPOINTMENT_MINUTES),
                event_type: EventType::Appointment,
                description: apt.reason.clone(),
                participants: vec![
                    Participant::new(apt.patient_id.as_str(), apt.patient_name.as_str(), Role::Patient),
                    Participant::new(apt.doctor_id.as_str(), apt.doctor_name.as_str(), Role::Doctor),
                ],
                status: None,
                medication_id: None,
                patient_id: Some(apt.patient_id.clone()),
                accepted: Some(true),
            })
        })
        .collect()
}

/// Events a user takes part in. Doctors also see every accepted appointment.
pub fn events_for_user(events: &[CalendarEvent], user_id: &str, role: Role) -> Vec<CalendarEvent> {
    events
        .iter()
        .filter(|event| {
            let involved = event.has_participant(user_id) || event.patient_id.as_deref() == Some(user_id);
            match role {
                Role::Doctor if event.event_type == EventType::Appointment => {
                    involved || event.accepted.unwrap_or(false)
                }
                _ => involved,
            }
        })
        .cloned()
        .collect()
}

/// One dose event per scheduled clock time of every medication the viewer
/// sees on `day`.
pub fn medication_events_for_day(
    medications: &[Medication],
    statuses: &[MedicationStatus],
    day: &CalendarDay,
    viewer: &CalendarViewer,
) -> Vec<CalendarEvent> {
    let scope = viewer.patient_scope();
    let relevant: Vec<&Medication> = medications
        .iter()
        .filter(|med| scope.map_or(true, |patient| med.prescribed_for == patient))
        .filter(|med| med.is_scheduled_on(day))
        .collect();
    debug!("Building dose events for {} from {} medications", day, relevant.len());

    relevant
        .into_iter()
        .flat_map(|med| {
            med.frequency.specific_times.iter().map(move |time| {
                let start = day.as_naive().and_time(time.as_naive());
                let taken = statuses
                    .iter()
                    .find(|status| status.is_for(&med.id, day, time))
                    .map(|status| status.taken);
                let title = match viewer.role {
                    Role::Doctor => format!("{}: {}", med.prescribed_for, med.name),
                    Role::Patient | Role::Caregiver => format!("Take {}", med.name),
                };

                CalendarEvent {
                    id: format!("med-{}-{}-{}", med.id, time, day),
                    title,
                    start,
                    end: start + Duration::minutes(DOSE_MINUTES),
                    event_type: EventType::Medication,
                    description: format!("{} - {}", med.dosage, med.instructions),
                    participants: Vec::new(),
                    status: taken,
                    medication_id: Some(med.id.clone()),
                    patient_id: Some(med.prescribed_for.clone()),
                    accepted: None,
                }
            })
        })
        .collect()
}

/// Stored events falling on `day` followed by that day's dose events.
pub fn events_for_day(
    events: &[CalendarEvent],
    medications: &[Medication],
    statuses: &[MedicationStatus],
    day: &CalendarDay,
    viewer: &CalendarViewer,
) -> Vec<CalendarEvent> {
    let mut day_events: Vec<CalendarEvent> = events
        .iter()
        .filter(|event| event.start.date() == day.as_naive())
        .cloned()
        .collect();
    day_events.extend(medication_events_for_day(medications, statuses, day, viewer));
    day_events
}
