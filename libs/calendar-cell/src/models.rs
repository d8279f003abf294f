// libs/calendar-cell/src/models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use shared_models::{Participant, Role};

/// Length of an appointment slot on the calendar, in minutes.
pub const APPOINTMENT_MINUTES: i64 = 30;
/// Length of a dose slot on the calendar, in minutes.
pub const DOSE_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Appointment,
    Medication,
    Exercise,
    Assessment,
}

/// Read-side projection; never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub description: String,
    pub participants: Vec<Participant>,
    /// For dose events: whether the dose was taken, if anyone answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
}

impl CalendarEvent {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }

    pub fn is_taken(&self) -> bool {
        self.status.unwrap_or(false)
    }
}

/// Who is looking at the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarViewer {
    pub user_id: String,
    pub role: Role,
    /// Patient a doctor has narrowed the view to.
    pub selected_patient: Option<String>,
}

impl CalendarViewer {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            selected_patient: None,
        }
    }

    pub fn focused_on(mut self, patient_id: impl Into<String>) -> Self {
        self.selected_patient = Some(patient_id.into());
        self
    }

    /// Patient whose prescriptions this viewer sees, or `None` for all of them.
    pub fn patient_scope(&self) -> Option<&str> {
        match self.role {
            Role::Patient => Some(self.user_id.as_str()),
            Role::Doctor | Role::Caregiver => self.selected_patient.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub taken: usize,
    pub total: usize,
}

impl DailyProgress {
    /// Fraction of doses taken, 0 when nothing was scheduled.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.taken as f64 / self.total as f64
    }
}

/// Dose events of one medication name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicationGroup {
    pub events: Vec<CalendarEvent>,
    pub total: usize,
    pub taken: usize,
}
