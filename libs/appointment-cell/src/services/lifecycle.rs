// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, info, warn};

use shared_models::{StoreError, StoreResult};
use crate::models::{AppointmentRequest, AppointmentResponse, AppointmentStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a doctor response may move `current_status` to `new_status`
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> StoreResult<()> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(StoreError::invalid_transition(current_status, new_status));
        }

        Ok(())
    }

    /// Statuses a doctor response may move to from `current_status`
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Accepted,
                AppointmentStatus::Suggested,
                AppointmentStatus::Rejected,
            ],
            // Re-suggesting overwrites the earlier proposal
            AppointmentStatus::Suggested => vec![AppointmentStatus::Suggested],
            AppointmentStatus::Accepted => vec![],
            AppointmentStatus::Rejected => vec![],
        }
    }

    /// Apply a doctor response, returning the updated appointment.
    ///
    /// Accepting fixes the final time to the requested time; suggesting records
    /// the proposed time and clears any final time.
    pub fn respond(
        &self,
        appointment: &AppointmentRequest,
        response: &AppointmentResponse,
    ) -> StoreResult<AppointmentRequest> {
        let new_status = response.target_status();
        self.validate_status_transition(&appointment.status, &new_status)?;

        let mut updated = appointment.clone();
        updated.status = new_status;
        updated.suggested_date_time = match response {
            AppointmentResponse::Suggest(time) => Some(*time),
            _ => None,
        };
        updated.final_date_time = match response {
            AppointmentResponse::Accept => Some(appointment.requested_date_time),
            _ => None,
        };

        info!("Appointment {} is now {}", updated.id, updated.status);
        Ok(updated)
    }

    /// The patient takes the doctor's suggested time.
    pub fn accept_suggestion(&self, appointment: &AppointmentRequest) -> StoreResult<AppointmentRequest> {
        let suggested = match (appointment.status, appointment.suggested_date_time) {
            (AppointmentStatus::Suggested, Some(time)) => time,
            (status, _) => {
                warn!("Cannot accept suggestion for appointment {} in status {}", appointment.id, status);
                return Err(StoreError::invalid_transition(status, AppointmentStatus::Accepted));
            }
        };

        let mut updated = appointment.clone();
        updated.status = AppointmentStatus::Accepted;
        updated.final_date_time = Some(suggested);

        info!("Appointment {} accepted at suggested time {}", updated.id, suggested);
        Ok(updated)
    }
}
