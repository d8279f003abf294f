// libs/portal-cell/src/context.rs
use std::sync::Arc;

use tracing::{error, info};

use appointment_cell::AppointmentStore;
use calendar_cell::{
    appointment_events, daily_progress, events_for_day, events_for_user, monthly_adherence,
    CalendarEvent, CalendarViewer, DailyProgress,
};
use medication_cell::MedicationStore;
use message_cell::MessageStore;
use shared_config::AppConfig;
use shared_models::CalendarDay;
use sync_cell::{persister_from_config, ChangeBus, ContextId, SyncContext, SyncError};

/// Everything one open portal (a browser tab, a window) works with: the three
/// stores sharing one origin, persister and change bus.
///
/// Constructed explicitly and passed to whoever needs it; call
/// [`PortalContext::close`] on teardown so pending changes are written.
#[derive(Clone)]
pub struct PortalContext {
    sync: SyncContext,
    pub appointments: AppointmentStore,
    pub medications: MedicationStore,
    pub messages: MessageStore,
}

impl PortalContext {
    pub async fn open(sync: SyncContext) -> Self {
        let appointments = AppointmentStore::open(&sync).await;
        let medications = MedicationStore::open(&sync).await;
        let messages = MessageStore::open(&sync).await;
        info!(origin = %sync.origin(), "portal context opened");

        Self {
            sync,
            appointments,
            medications,
            messages,
        }
    }

    /// Select the configured persister and join `bus`.
    pub async fn connect(config: &AppConfig, bus: Arc<dyn ChangeBus>) -> Self {
        let persister = persister_from_config(config).await;
        Self::open(SyncContext::from_config(config, persister, bus)).await
    }

    pub fn origin(&self) -> ContextId {
        self.sync.origin()
    }

    pub fn sync_context(&self) -> &SyncContext {
        &self.sync
    }

    /// Whether all three stores exchange changes with other contexts.
    pub fn is_synced(&self) -> bool {
        self.appointments.is_synced() && self.medications.is_synced() && self.messages.is_synced()
    }

    // ==========================================================================
    // CALENDAR
    // ==========================================================================

    /// Accepted appointments the viewer takes part in plus the doses they see
    /// on `day`.
    pub fn day_view(&self, day: &CalendarDay, viewer: &CalendarViewer) -> Vec<CalendarEvent> {
        let appointments = appointment_events(&self.appointments.all());
        let visible = events_for_user(&appointments, &viewer.user_id, viewer.role);
        let medications = self.medications.all_medications();
        events_for_day(&visible, &medications, &self.medications.statuses(), day, viewer)
    }

    pub fn daily_progress(&self, day: &CalendarDay, patient_id: &str) -> DailyProgress {
        daily_progress(
            &self.medications.for_patient(patient_id),
            &self.medications.statuses(),
            day,
            patient_id,
        )
    }

    pub fn monthly_adherence(&self, year: i32, month: u32, patient_id: &str) -> f64 {
        monthly_adherence(
            &self.medications.for_patient(patient_id),
            &self.medications.statuses(),
            year,
            month,
            patient_id,
        )
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    /// Write every store that has pending changes.
    pub async fn flush(&self) -> Result<(), SyncError> {
        self.appointments.flush().await?;
        self.medications.flush().await?;
        self.messages.flush().await?;
        Ok(())
    }

    /// Stop background work and write pending changes of every store. All
    /// three are closed even if one fails; the first failure is returned.
    pub async fn close(&self) -> Result<(), SyncError> {
        let results = [
            self.appointments.close().await,
            self.medications.close().await,
            self.messages.close().await,
        ];

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                error!(origin = %self.origin(), error = %e, "failed to close store");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(origin = %self.origin(), "portal context closed");
                Ok(())
            }
        }
    }
}
