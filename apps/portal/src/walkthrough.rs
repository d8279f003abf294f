//! A patient tab and a doctor tab working on the same data.

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use appointment_cell::{AppointmentResponse, AppointmentsChanged, NewAppointment};
use calendar_cell::CalendarViewer;
use medication_cell::MedicationStatus;
use message_cell::NewMessage;
use portal_cell::PortalContext;
use shared_models::{CalendarDay, ClockTime, Role};

const PATIENT_ID: &str = "P001";
const DOCTOR_ID: &str = "D001";

/// Let the bus listeners of the other tab catch up.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub async fn run(
    patient_tab: &PortalContext,
    doctor_tab: &PortalContext,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let _doctor_inbox = doctor_tab.appointments.subscribe(|event: &AppointmentsChanged| {
        info!("Doctor tab sees {} appointments", event.appointments.len());
    });

    let tomorrow = today.succ_opt().context("no day after today")?;
    let requested = tomorrow.and_hms_opt(9, 0, 0).context("invalid request time")?;
    let suggested = tomorrow.and_hms_opt(14, 0, 0).context("invalid suggested time")?;

    let appointment = patient_tab.appointments.request_appointment(NewAppointment {
        patient_id: PATIENT_ID.to_string(),
        patient_name: "John Doe".to_string(),
        doctor_id: DOCTOR_ID.to_string(),
        doctor_name: "Dr. Smith".to_string(),
        requested_date_time: requested,
        reason: "Medication review".to_string(),
    })?;
    settle().await;

    doctor_tab
        .appointments
        .respond(&appointment.id, AppointmentResponse::Suggest(suggested))?;
    settle().await;

    let accepted = patient_tab.appointments.accept_suggested_time(&appointment.id)?;
    info!(
        "Appointment {} is {} for {:?}",
        accepted.id, accepted.status, accepted.final_date_time
    );

    let day = CalendarDay::from(today);
    if let Some(medication) = patient_tab.medications.for_patient(PATIENT_ID).first() {
        let time = medication
            .frequency
            .specific_times
            .first()
            .copied()
            .or_else(|| ClockTime::new(8, 0))
            .context("no dose time")?;
        patient_tab.medications.mark_dose(MedicationStatus {
            medication_id: medication.id.clone(),
            date: day,
            time,
            taken: true,
            response_time: Some(now),
        })?;
    }

    patient_tab.messages.send(NewMessage {
        sender_id: PATIENT_ID.to_string(),
        sender_name: "John Doe".to_string(),
        sender_role: Role::Patient,
        recipient_id: DOCTOR_ID.to_string(),
        content: "See you tomorrow afternoon".to_string(),
    })?;
    settle().await;

    let unread = doctor_tab.messages.unread_counts(DOCTOR_ID);
    info!("Doctor has unread messages from {} people", unread.len());
    let read = doctor_tab.messages.mark_as_read(DOCTOR_ID, PATIENT_ID)?;
    info!("Doctor read {} messages", read);

    let viewer = CalendarViewer::new(DOCTOR_ID, Role::Doctor).focused_on(PATIENT_ID);
    let tomorrow_view = doctor_tab.day_view(&CalendarDay::from(tomorrow), &viewer);
    let progress = doctor_tab.daily_progress(&day, PATIENT_ID);
    info!(
        "Tomorrow: {} calendar entries; today: {}/{} doses taken",
        tomorrow_view.len(),
        progress.taken,
        progress.total
    );

    Ok(())
}
