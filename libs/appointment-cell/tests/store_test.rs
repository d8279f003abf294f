// =====================================================================================
// APPOINTMENT STORE TESTS
// Mutations, notifications, persistence and cross-context sync
// =====================================================================================

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::mpsc;
use tokio::time::timeout;

use appointment_cell::models::*;
use appointment_cell::services::store::AppointmentStore;
use shared_models::{Role, StoreError};
use sync_cell::{ChangeBus, LocalChangeBus, MemoryPersister, Subscription, SyncContext};

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|day| day.and_hms_opt(hour, 0, 0))
        .expect("valid test time")
}

fn new_request(patient_id: &str, doctor_id: &str) -> NewAppointment {
    NewAppointment {
        patient_id: patient_id.to_string(),
        patient_name: format!("Patient {}", patient_id),
        doctor_id: doctor_id.to_string(),
        doctor_name: format!("Doctor {}", doctor_id),
        requested_date_time: at(9),
        reason: "Follow-up".to_string(),
    }
}

fn local_context() -> (SyncContext, Arc<MemoryPersister>) {
    let persister = Arc::new(MemoryPersister::new());
    (SyncContext::new(persister.clone(), Duration::from_secs(3600)), persister)
}

fn listen(store: &AppointmentStore) -> (Subscription, mpsc::UnboundedReceiver<Vec<AppointmentRequest>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = store.subscribe(move |event: &AppointmentsChanged| {
        let _ = tx.send(event.appointments.to_vec());
    });
    (subscription, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Vec<AppointmentRequest>>) -> Vec<AppointmentRequest> {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("listener channel closed")
}

#[tokio::test]
async fn test_request_suggest_accept_scenario() {
    let (ctx, _) = local_context();
    let store = AppointmentStore::open(&ctx).await;

    let created = store.request_appointment(new_request("P1", "D1")).unwrap();
    assert_eq!(created.status, AppointmentStatus::Pending);

    let suggested = store
        .respond(&created.id, AppointmentResponse::Suggest(at(14)))
        .unwrap();
    assert_eq!(suggested.status, AppointmentStatus::Suggested);
    assert_eq!(suggested.suggested_date_time, Some(at(14)));

    let accepted = store.accept_suggested_time(&created.id).unwrap();
    assert_eq!(accepted.status, AppointmentStatus::Accepted);
    assert_eq!(accepted.final_date_time, Some(at(14)));
    assert_eq!(store.get(&created.id), Some(accepted));
}

#[tokio::test]
async fn test_accept_from_pending_uses_requested_time() {
    let (ctx, _) = local_context();
    let store = AppointmentStore::open(&ctx).await;
    let created = store.request_appointment(new_request("P1", "D1")).unwrap();

    let accepted = store.respond(&created.id, AppointmentResponse::Accept).unwrap();

    assert_eq!(accepted.final_date_time, Some(at(9)));
}

#[tokio::test]
async fn test_accepted_appointment_is_immutable() {
    let (ctx, _) = local_context();
    let store = AppointmentStore::open(&ctx).await;
    let created = store.request_appointment(new_request("P1", "D1")).unwrap();
    store.respond(&created.id, AppointmentResponse::Accept).unwrap();

    let (_subscription, mut rx) = listen(&store);
    next(&mut rx).await;

    assert_matches!(
        store.respond(&created.id, AppointmentResponse::Reject),
        Err(StoreError::InvalidStatusTransition { .. })
    );
    assert_matches!(
        store.accept_suggested_time(&created.id),
        Err(StoreError::InvalidStatusTransition { .. })
    );
    assert!(rx.try_recv().is_err(), "Rejected transitions must not notify");
    assert_eq!(store.get(&created.id).unwrap().status, AppointmentStatus::Accepted);
}

#[tokio::test]
async fn test_missing_appointment_is_reported_and_silent() {
    let (ctx, persister) = local_context();
    let store = AppointmentStore::open(&ctx).await;
    let (_subscription, mut rx) = listen(&store);
    next(&mut rx).await;

    let result = store.respond("does-not-exist", AppointmentResponse::Accept);

    assert_matches!(result, Err(StoreError::NotFound { entity: "appointment", .. }));
    assert!(rx.try_recv().is_err(), "Missing identity must not notify");
    assert!(!store.flush().await.unwrap(), "Missing identity must not mark dirty");
    assert_eq!(persister.write_count(), 0);
}

#[tokio::test]
async fn test_request_without_doctor_is_rejected() {
    let (ctx, _) = local_context();
    let store = AppointmentStore::open(&ctx).await;

    let result = store.request_appointment(new_request("P1", " "));

    assert_matches!(result, Err(StoreError::Validation(_)));
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn test_filters_by_participant() {
    let (ctx, _) = local_context();
    let store = AppointmentStore::open(&ctx).await;
    store.request_appointment(new_request("P1", "D1")).unwrap();
    store.request_appointment(new_request("P2", "D1")).unwrap();
    store.request_appointment(new_request("P3", "D2")).unwrap();

    assert_eq!(store.for_doctor("D1").len(), 2);
    assert_eq!(store.for_patient("P3").len(), 1);
    assert_eq!(
        store.for_patients(&["P1".to_string(), "P3".to_string()]).len(),
        2
    );
    assert_eq!(store.for_user("D2", Role::Doctor).len(), 1);
    assert!(store.for_user("C1", Role::Caregiver).is_empty());
}

#[tokio::test]
async fn test_remove_appointment_drops_record() {
    let (ctx, _) = local_context();
    let store = AppointmentStore::open(&ctx).await;
    let created = store.request_appointment(new_request("P1", "D1")).unwrap();

    let removed = store.remove_appointment(&created.id).unwrap();

    assert_eq!(removed.id, created.id);
    assert!(store.get(&created.id).is_none());
    assert_matches!(
        store.remove_appointment(&created.id),
        Err(StoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn test_collection_survives_reopen() {
    let (ctx, persister) = local_context();
    let store = AppointmentStore::open(&ctx).await;
    let created = store.request_appointment(new_request("P1", "D1")).unwrap();
    store.respond(&created.id, AppointmentResponse::Suggest(at(14))).unwrap();
    store.close().await.unwrap();

    let reopened = AppointmentStore::open(&SyncContext::new(persister, Duration::from_secs(3600))).await;

    assert_eq!(reopened.all().as_slice(), store.all().as_slice());
}

#[tokio::test]
async fn test_corrupt_blob_falls_back_to_empty() {
    let (ctx, persister) = local_context();
    persister.insert(APPOINTMENTS_KEY, "{not json");

    let store = AppointmentStore::open(&ctx).await;

    assert!(store.all().is_empty());
}

#[tokio::test]
async fn test_response_reaches_other_context() {
    let bus: Arc<dyn ChangeBus> = Arc::new(LocalChangeBus::new());
    let persister = Arc::new(MemoryPersister::new());
    let patient_tab = SyncContext::new(persister.clone(), Duration::from_secs(3600)).with_bus(bus.clone());
    let doctor_tab = SyncContext::new(persister, Duration::from_secs(3600)).with_bus(bus);

    let patient_store = AppointmentStore::open(&patient_tab).await;
    let doctor_store = AppointmentStore::open(&doctor_tab).await;
    let (_patient_subscription, mut patient_rx) = listen(&patient_store);
    let (_doctor_subscription, mut doctor_rx) = listen(&doctor_store);
    next(&mut patient_rx).await;
    assert!(next(&mut doctor_rx).await.is_empty());

    let created = patient_store.request_appointment(new_request("P1", "D1")).unwrap();
    next(&mut patient_rx).await;
    let seen = next(&mut doctor_rx).await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, created.id);

    doctor_store.respond(&created.id, AppointmentResponse::Reject).unwrap();
    let after = next(&mut patient_rx).await;
    assert_eq!(after[0].status, AppointmentStatus::Rejected);
    assert_eq!(patient_store.get(&created.id).unwrap().status, AppointmentStatus::Rejected);
}
