// libs/medication-cell/src/services/store.rs
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_models::{StoreError, StoreResult};
use sync_cell::{load_or_else, Change, StoreCore, Subscription, SyncContext, SyncError, SyncState};

use crate::models::*;
use crate::seed::{seed_medications, seed_statuses};
use crate::services::adherence::{adherence_between, statuses_for};

pub struct MedicationState {
    medications: Arc<MedicationsByPatient>,
    statuses: Arc<Vec<MedicationStatus>>,
    preferences: BTreeMap<String, ReminderPreference>,
}

impl MedicationState {
    fn medications_changed(&self) -> MedicationEvent {
        MedicationEvent::Medications(Arc::clone(&self.medications))
    }

    fn statuses_changed(&self) -> MedicationEvent {
        MedicationEvent::DoseStatus(Arc::clone(&self.statuses))
    }

    fn replaced(&self) -> MedicationSync {
        MedicationSync::CollectionReplaced {
            payload: (*self.medications).clone(),
        }
    }

    fn patient_medications(&self, patient_id: &str) -> &[Medication] {
        self.medications
            .get(patient_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn knows_medication(&self, medication_id: &str) -> bool {
        self.medications
            .values()
            .flatten()
            .any(|med| med.id == medication_id)
    }

    fn upsert_status(&mut self, status: MedicationStatus) {
        let statuses = Arc::make_mut(&mut self.statuses);
        match statuses.iter_mut().find(|s| s.is_same_dose(&status)) {
            Some(existing) => *existing = status,
            None => statuses.push(status),
        }
    }

    /// Drop dose events whose medication is no longer prescribed.
    /// Returns whether anything was removed.
    fn prune_orphaned_statuses(&mut self) -> bool {
        let known: HashSet<&str> = self
            .medications
            .values()
            .flatten()
            .map(|med| med.id.as_str())
            .collect();
        if self.statuses.iter().all(|s| known.contains(s.medication_id.as_str())) {
            return false;
        }

        let kept: Vec<MedicationStatus> = self
            .statuses
            .iter()
            .filter(|s| known.contains(s.medication_id.as_str()))
            .cloned()
            .collect();
        self.statuses = Arc::new(kept);
        true
    }
}

impl SyncState for MedicationState {
    type Event = MedicationEvent;
    type Message = MedicationSync;

    fn blobs(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error> {
        Ok(vec![
            (MEDICATIONS_KEY, serde_json::to_string(&*self.medications)?),
            (MEDICATION_STATUS_KEY, serde_json::to_string(&*self.statuses)?),
            (REMINDER_PREFERENCES_KEY, serde_json::to_string(&self.preferences)?),
        ])
    }

    fn snapshot_events(&self) -> Vec<MedicationEvent> {
        vec![self.medications_changed(), self.statuses_changed()]
    }

    fn apply_remote(&mut self, message: MedicationSync) -> Vec<MedicationEvent> {
        match message {
            MedicationSync::CollectionReplaced { payload } => {
                self.medications = Arc::new(payload);
                let mut events = vec![self.medications_changed()];
                if self.prune_orphaned_statuses() {
                    events.push(self.statuses_changed());
                }
                events
            }
            MedicationSync::SingleRecordUpserted { payload } => {
                self.upsert_status(payload);
                vec![self.statuses_changed()]
            }
        }
    }
}

/// Prescriptions, dose events and reminder preferences of one context.
#[derive(Clone)]
pub struct MedicationStore {
    core: Arc<StoreCore<MedicationState>>,
}

impl MedicationStore {
    pub async fn open(ctx: &SyncContext) -> Self {
        let persister = ctx.persister().as_ref();
        let medications: MedicationsByPatient =
            load_or_else(persister, MEDICATIONS_KEY, seed_medications).await;
        let statuses: Vec<MedicationStatus> = load_or_else(persister, MEDICATION_STATUS_KEY, || {
            seed_statuses(Local::now().date_naive())
        })
        .await;
        let preferences: BTreeMap<String, ReminderPreference> =
            load_or_else(persister, REMINDER_PREFERENCES_KEY, BTreeMap::new).await;

        info!(
            "Loaded medications for {} patients and {} dose events",
            medications.len(),
            statuses.len()
        );

        let state = MedicationState {
            medications: Arc::new(medications),
            statuses: Arc::new(statuses),
            preferences,
        };
        Self {
            core: StoreCore::start(state, MEDICATION_CHANNEL, ctx),
        }
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub fn medications_by_patient(&self) -> Arc<MedicationsByPatient> {
        self.core.read(|state| Arc::clone(&state.medications))
    }

    pub fn for_patient(&self, patient_id: &str) -> Vec<Medication> {
        self.core.read(|state| state.patient_medications(patient_id).to_vec())
    }

    pub fn all_medications(&self) -> Vec<Medication> {
        self.core
            .read(|state| state.medications.values().flatten().cloned().collect())
    }

    pub fn by_doctor(&self, doctor_id: &str) -> Vec<Medication> {
        self.core.read(|state| {
            state
                .medications
                .values()
                .flatten()
                .filter(|med| med.prescribed_by == doctor_id)
                .cloned()
                .collect()
        })
    }

    pub fn statuses(&self) -> Arc<Vec<MedicationStatus>> {
        self.core.read(|state| Arc::clone(&state.statuses))
    }

    pub fn statuses_for_patient(&self, patient_id: &str) -> Vec<MedicationStatus> {
        self.core.read(|state| {
            statuses_for(state.patient_medications(patient_id), &state.statuses)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn statuses_for_doctor(&self, doctor_id: &str) -> Vec<MedicationStatus> {
        let prescribed = self.by_doctor(doctor_id);
        self.core.read(|state| {
            statuses_for(&prescribed, &state.statuses)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn adherence(&self, patient_id: &str, from: NaiveDate, to: NaiveDate) -> AdherenceStats {
        self.core.read(|state| {
            adherence_between(state.patient_medications(patient_id), &state.statuses, from, to)
        })
    }

    /// Adherence over the 30 days up to today.
    pub fn recent_adherence(&self, patient_id: &str) -> AdherenceStats {
        let today = Local::now().date_naive();
        let from = today - chrono::Duration::days(30);
        self.adherence(patient_id, from, today)
    }

    pub fn reminder_preferences(&self, user_id: &str) -> Option<ReminderPreference> {
        self.core.read(|state| state.preferences.get(user_id).cloned())
    }

    // ==========================================================================
    // MUTATIONS
    // ==========================================================================

    /// Add a prescription under its patient. An empty id is replaced by a fresh one.
    pub fn add_medication(&self, mut medication: Medication) -> StoreResult<Medication> {
        if medication.prescribed_for.trim().is_empty() {
            return Err(StoreError::Validation(
                "medication must be prescribed for a patient".to_string(),
            ));
        }
        if medication.id.trim().is_empty() {
            medication.id = Uuid::new_v4().to_string();
        }

        self.core.mutate(|state| {
            if state.knows_medication(&medication.id) {
                return Err(StoreError::Validation(format!(
                    "medication {} already exists",
                    medication.id
                )));
            }

            Arc::make_mut(&mut state.medications)
                .entry(medication.prescribed_for.clone())
                .or_default()
                .push(medication.clone());
            debug!("Added medication {} for {}", medication.id, medication.prescribed_for);

            Ok(Change::new(medication)
                .notify(state.medications_changed())
                .broadcast(state.replaced()))
        })
    }

    /// Replace the prescription with the same id under `prescribed_for`.
    pub fn update_medication(&self, medication: Medication) -> StoreResult<Medication> {
        self.core.mutate(|state| {
            let existing = Arc::make_mut(&mut state.medications)
                .get_mut(&medication.prescribed_for)
                .and_then(|meds| meds.iter_mut().find(|med| med.id == medication.id))
                .ok_or_else(|| StoreError::not_found("medication", medication.id.as_str()))?;
            *existing = medication.clone();

            Ok(Change::new(medication)
                .notify(state.medications_changed())
                .broadcast(state.replaced()))
        })
    }

    /// Remove a prescription together with all of its dose events.
    #[instrument(skip(self))]
    pub fn remove_medication(&self, medication_id: &str, patient_id: &str) -> StoreResult<Medication> {
        self.core.mutate(|state| {
            let index = state
                .patient_medications(patient_id)
                .iter()
                .position(|med| med.id == medication_id)
                .ok_or_else(|| StoreError::not_found("medication", medication_id))?;

            let medications = Arc::make_mut(&mut state.medications);
            let removed = match medications.get_mut(patient_id) {
                Some(meds) => meds.remove(index),
                None => return Err(StoreError::not_found("medication", medication_id)),
            };
            Arc::make_mut(&mut state.statuses).retain(|s| s.medication_id != medication_id);
            info!("Removed medication {} for {}", medication_id, patient_id);

            Ok(Change::new(removed)
                .notify(state.medications_changed())
                .notify(state.statuses_changed())
                .broadcast(state.replaced()))
        })
    }

    /// Record whether a dose was taken, overwriting any earlier record for
    /// the same medication, day and time.
    #[instrument(skip(self, status), fields(medication = %status.medication_id))]
    pub fn mark_dose(&self, status: MedicationStatus) -> StoreResult<MedicationStatus> {
        self.core.mutate(|state| {
            if !state.knows_medication(&status.medication_id) {
                return Err(StoreError::not_found("medication", status.medication_id.as_str()));
            }

            state.upsert_status(status.clone());
            debug!(
                "Dose {} {} {} taken={}",
                status.medication_id, status.date, status.time, status.taken
            );

            Ok(Change::new(status.clone())
                .notify(state.statuses_changed())
                .broadcast(MedicationSync::SingleRecordUpserted { payload: status }))
        })
    }

    /// Stored with the next flush; preferences are neither announced to
    /// subscribers nor shared with other contexts.
    pub fn set_reminder_preferences(&self, user_id: &str, preference: ReminderPreference) -> StoreResult<()> {
        self.core.mutate(|state| {
            state.preferences.insert(user_id.to_string(), preference);
            Ok(Change::new(()))
        })
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    pub fn subscribe(&self, listener: impl Fn(&MedicationEvent) + Send + Sync + 'static) -> Subscription {
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
