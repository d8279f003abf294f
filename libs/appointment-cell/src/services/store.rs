// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_models::{Role, StoreError, StoreResult};
use sync_cell::{load_or_else, Change, StoreCore, Subscription, SyncContext, SyncError, SyncState};

use crate::models::{
    AppointmentRequest, AppointmentResponse, AppointmentStatus, AppointmentSync,
    AppointmentsChanged, NewAppointment, APPOINTMENTS_KEY, APPOINTMENT_CHANNEL,
};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentState {
    appointments: Arc<Vec<AppointmentRequest>>,
}

impl AppointmentState {
    fn changed(&self) -> AppointmentsChanged {
        AppointmentsChanged {
            appointments: Arc::clone(&self.appointments),
        }
    }

    /// Every appointment change travels as the whole collection.
    fn commit<R>(&self, value: R) -> Change<Self, R> {
        Change::new(value)
            .notify(self.changed())
            .broadcast(AppointmentSync::CollectionReplaced {
                payload: self.appointments.to_vec(),
            })
    }

    fn position(&self, id: &str) -> StoreResult<usize> {
        self.appointments
            .iter()
            .position(|apt| apt.id == id)
            .ok_or_else(|| StoreError::not_found("appointment", id))
    }
}

impl SyncState for AppointmentState {
    type Event = AppointmentsChanged;
    type Message = AppointmentSync;

    fn blobs(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error> {
        Ok(vec![(APPOINTMENTS_KEY, serde_json::to_string(&*self.appointments)?)])
    }

    fn snapshot_events(&self) -> Vec<AppointmentsChanged> {
        vec![self.changed()]
    }

    fn apply_remote(&mut self, message: AppointmentSync) -> Vec<AppointmentsChanged> {
        match message {
            AppointmentSync::CollectionReplaced { payload } => {
                self.appointments = Arc::new(payload);
                vec![self.changed()]
            }
        }
    }
}

/// Authoritative appointment collection of one context.
///
/// Cloning is cheap and every clone talks to the same store.
#[derive(Clone)]
pub struct AppointmentStore {
    core: Arc<StoreCore<AppointmentState>>,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentStore {
    pub async fn open(ctx: &SyncContext) -> Self {
        let appointments: Vec<AppointmentRequest> =
            load_or_else(ctx.persister().as_ref(), APPOINTMENTS_KEY, Vec::new).await;
        info!("Loaded {} appointments", appointments.len());

        let state = AppointmentState {
            appointments: Arc::new(appointments),
        };
        Self {
            core: StoreCore::start(state, APPOINTMENT_CHANNEL, ctx),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub fn all(&self) -> Arc<Vec<AppointmentRequest>> {
        self.core.read(|state| Arc::clone(&state.appointments))
    }

    pub fn get(&self, id: &str) -> Option<AppointmentRequest> {
        self.filtered(|apt| apt.id == id).into_iter().next()
    }

    pub fn for_doctor(&self, doctor_id: &str) -> Vec<AppointmentRequest> {
        self.filtered(|apt| apt.doctor_id == doctor_id)
    }

    pub fn for_patient(&self, patient_id: &str) -> Vec<AppointmentRequest> {
        self.filtered(|apt| apt.patient_id == patient_id)
    }

    /// Appointments of any of `patient_ids`, e.g. everyone a caregiver looks after.
    pub fn for_patients(&self, patient_ids: &[String]) -> Vec<AppointmentRequest> {
        self.filtered(|apt| patient_ids.iter().any(|id| *id == apt.patient_id))
    }

    /// Caregivers are not party to an appointment and see nothing here;
    /// resolve their patients and use [`AppointmentStore::for_patients`].
    pub fn for_user(&self, user_id: &str, role: Role) -> Vec<AppointmentRequest> {
        match role {
            Role::Doctor => self.for_doctor(user_id),
            Role::Patient => self.for_patient(user_id),
            Role::Caregiver => Vec::new(),
        }
    }

    fn filtered(&self, predicate: impl Fn(&AppointmentRequest) -> bool) -> Vec<AppointmentRequest> {
        self.core.read(|state| {
            state
                .appointments
                .iter()
                .filter(|apt| predicate(*apt))
                .cloned()
                .collect()
        })
    }

    // ==========================================================================
    // MUTATIONS
    // ==========================================================================

    pub fn request_appointment(&self, request: NewAppointment) -> StoreResult<AppointmentRequest> {
        if request.patient_id.trim().is_empty() || request.doctor_id.trim().is_empty() {
            return Err(StoreError::Validation(
                "appointment requires both a patient and a doctor".to_string(),
            ));
        }

        let appointment = AppointmentRequest {
            id: Uuid::new_v4().to_string(),
            patient_id: request.patient_id,
            patient_name: request.patient_name,
            doctor_id: request.doctor_id,
            doctor_name: request.doctor_name,
            requested_date_time: request.requested_date_time,
            reason: request.reason,
            status: AppointmentStatus::Pending,
            suggested_date_time: None,
            final_date_time: None,
        };
        debug!("Requesting appointment {} with doctor {}", appointment.id, appointment.doctor_id);

        self.core.mutate(|state| {
            Arc::make_mut(&mut state.appointments).push(appointment.clone());
            Ok(state.commit(appointment))
        })
    }

    #[instrument(skip(self, response))]
    pub fn respond(&self, id: &str, response: AppointmentResponse) -> StoreResult<AppointmentRequest> {
        let lifecycle = self.lifecycle;
        self.core.mutate(|state| {
            let index = state.position(id)?;
            let updated = lifecycle.respond(&state.appointments[index], &response)?;
            Arc::make_mut(&mut state.appointments)[index] = updated.clone();
            Ok(state.commit(updated))
        })
    }

    #[instrument(skip(self))]
    pub fn accept_suggested_time(&self, id: &str) -> StoreResult<AppointmentRequest> {
        let lifecycle = self.lifecycle;
        self.core.mutate(|state| {
            let index = state.position(id)?;
            let updated = lifecycle.accept_suggestion(&state.appointments[index])?;
            Arc::make_mut(&mut state.appointments)[index] = updated.clone();
            Ok(state.commit(updated))
        })
    }

    pub fn remove_appointment(&self, id: &str) -> StoreResult<AppointmentRequest> {
        self.core.mutate(|state| {
            let index = state.position(id)?;
            let removed = Arc::make_mut(&mut state.appointments).remove(index);
            info!("Removed appointment {}", removed.id);
            Ok(state.commit(removed))
        })
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    /// The listener runs at once with the current collection, then after every
    /// local or remote change until the subscription is dropped.
    pub fn subscribe(
        &self,
        listener: impl Fn(&AppointmentsChanged) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.subscribe(listener)
    }

    pub fn is_synced(&self) -> bool {
        self.core.is_synced()
    }

    pub async fn flush(&self) -> Result<bool, SyncError> {
        self.core.flush().await
    }

    pub async fn close(&self) -> Result<(), SyncError> {
        self.core.close().await
    }
}
