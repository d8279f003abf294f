// libs/appointment-cell/src/models.rs
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Bus channel shared by every appointment store.
pub const APPOINTMENT_CHANNEL: &str = "appointment_updates";
/// Persisted key of the appointment collection.
pub const APPOINTMENTS_KEY: &str = "appointments";

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub requested_date_time: NaiveDateTime,
    pub reason: String,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_date_time: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_date_time: Option<NaiveDateTime>,
}

impl AppointmentRequest {
    pub fn involves(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Suggested,
    Rejected,
}

impl AppointmentStatus {
    /// No operation moves an appointment out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Accepted | AppointmentStatus::Rejected)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Accepted => "accepted",
            AppointmentStatus::Suggested => "suggested",
            AppointmentStatus::Rejected => "rejected",
        };
        write!(f, "{}", status)
    }
}

/// What a patient or caregiver submits when asking for an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub requested_date_time: NaiveDateTime,
    pub reason: String,
}

/// A doctor's answer to a pending (or re-suggested) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentResponse {
    Accept,
    Suggest(NaiveDateTime),
    Reject,
}

impl AppointmentResponse {
    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            AppointmentResponse::Accept => AppointmentStatus::Accepted,
            AppointmentResponse::Suggest(_) => AppointmentStatus::Suggested,
            AppointmentResponse::Reject => AppointmentStatus::Rejected,
        }
    }
}

// ==============================================================================
// EVENTS AND SYNC MESSAGES
// ==============================================================================

/// Delivered to local subscribers after every change to the collection.
#[derive(Debug, Clone)]
pub struct AppointmentsChanged {
    pub appointments: Arc<Vec<AppointmentRequest>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AppointmentSync {
    CollectionReplaced { payload: Vec<AppointmentRequest> },
}
