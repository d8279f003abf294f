// =====================================================================================
// MEDICATION STORE TESTS
// Prescriptions, dose events, reminder preferences and cross-context sync
// =====================================================================================

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{Local, NaiveDate};
use tokio::sync::mpsc;
use tokio::time::timeout;

use medication_cell::models::*;
use medication_cell::services::store::MedicationStore;
use shared_models::{CalendarDay, ClockTime, StoreError};
use sync_cell::{ChangeBus, LocalChangeBus, MemoryPersister, Subscription, SyncContext};

fn local_context() -> (SyncContext, Arc<MemoryPersister>) {
    let persister = Arc::new(MemoryPersister::new());
    (SyncContext::new(persister.clone(), Duration::from_secs(3600)), persister)
}

fn dose(medication_id: &str, day: CalendarDay, time: ClockTime, taken: bool) -> MedicationStatus {
    MedicationStatus {
        medication_id: medication_id.to_string(),
        date: day,
        time,
        taken,
        response_time: None,
    }
}

fn june(day: u32) -> CalendarDay {
    CalendarDay::from_ymd(2024, 6, day).expect("valid day")
}

fn eight() -> ClockTime {
    ClockTime::new(8, 0).expect("valid time")
}

fn prescription(id: &str, patient_id: &str) -> Medication {
    Medication {
        id: id.to_string(),
        name: "Rasagiline".to_string(),
        dosage: "1 mg".to_string(),
        frequency: Frequency::daily(&[eight()]),
        instructions: "Once daily".to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        end_date: None,
        prescribed_by: "D002".to_string(),
        prescribed_for: patient_id.to_string(),
        purpose: None,
        reminders: None,
        reminder_times: None,
    }
}

fn listen(store: &MedicationStore) -> (Subscription, mpsc::UnboundedReceiver<MedicationEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = store.subscribe(move |event: &MedicationEvent| {
        let _ = tx.send(event.clone());
    });
    (subscription, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<MedicationEvent>) -> MedicationEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("listener channel closed")
}

#[tokio::test]
async fn test_empty_storage_opens_with_seed_data() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;

    assert_eq!(store.for_patient("P001").len(), 2);
    assert_eq!(store.for_patient("P003").len(), 2);
    assert_eq!(store.all_medications().len(), 5);
    assert_eq!(store.by_doctor("D001").len(), 5);

    let today = CalendarDay::from(Local::now().date_naive());
    let statuses = store.statuses();
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s.date == today && s.taken));
}

#[tokio::test]
async fn test_subscribe_reports_both_halves_immediately() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;

    let (_subscription, mut rx) = listen(&store);

    assert_matches!(next(&mut rx).await, MedicationEvent::Medications(meds) if meds.len() == 3);
    assert_matches!(next(&mut rx).await, MedicationEvent::DoseStatus(statuses) if statuses.len() == 2);
}

#[tokio::test]
async fn test_marking_same_dose_twice_keeps_one_record() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;

    store.mark_dose(dose("m1", june(3), eight(), true)).unwrap();
    store.mark_dose(dose("m1", june(3), eight(), true)).unwrap();

    let matching: Vec<MedicationStatus> = store
        .statuses()
        .iter()
        .filter(|s| s.is_for("m1", &june(3), &eight()))
        .cloned()
        .collect();
    assert_eq!(matching.len(), 1, "Composite key must stay unique");
    assert!(matching[0].taken);
}

#[tokio::test]
async fn test_dose_keyed_by_client_date_string_stays_unique() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;
    let day: CalendarDay = "Mon Jun 01 2024".parse().expect("client date string");
    let time: ClockTime = "08:00".parse().expect("client time string");

    store.mark_dose(dose("m1", day, time, true)).unwrap();
    store.mark_dose(dose("m1", day, time, true)).unwrap();

    let matching = store
        .statuses()
        .iter()
        .filter(|s| s.is_for("m1", &day, &time))
        .count();
    assert_eq!(matching, 1);
    assert_eq!(day, june(1));
}

#[tokio::test]
async fn test_persisted_dose_with_mislabelled_weekday_loads() {
    let persister = Arc::new(MemoryPersister::new());
    persister.insert(
        MEDICATION_STATUS_KEY,
        r#"[{"medicationId":"m1","date":"Mon Jun 01 2024","time":"08:00","taken":true}]"#,
    );

    let store = MedicationStore::open(&SyncContext::new(persister, Duration::from_secs(3600))).await;

    let statuses = store.statuses();
    assert_eq!(statuses.len(), 1, "Recorded doses must not be replaced by seed data");
    assert!(statuses[0].is_for("m1", &june(1), &eight()));
}

#[tokio::test]
async fn test_marking_dose_overwrites_taken_flag() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;

    store.mark_dose(dose("m3", june(3), eight(), true)).unwrap();
    store.mark_dose(dose("m3", june(3), eight(), false)).unwrap();

    let patient_statuses = store.statuses_for_patient("P002");
    assert_eq!(patient_statuses.len(), 1);
    assert!(!patient_statuses[0].taken);
}

#[tokio::test]
async fn test_marking_unknown_medication_is_reported() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;

    let result = store.mark_dose(dose("ghost", june(3), eight(), true));

    assert_matches!(result, Err(StoreError::NotFound { entity: "medication", .. }));
    assert_eq!(store.statuses().len(), 2);
}

#[tokio::test]
async fn test_add_update_and_remove_prescription() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;

    store.add_medication(prescription("m9", "P004")).unwrap();
    assert_eq!(store.for_patient("P004").len(), 1);
    assert_matches!(
        store.add_medication(prescription("m9", "P004")),
        Err(StoreError::Validation(_))
    );

    let mut changed = prescription("m9", "P004");
    changed.dosage = "2 mg".to_string();
    store.update_medication(changed).unwrap();
    assert_eq!(store.for_patient("P004")[0].dosage, "2 mg");

    store.mark_dose(dose("m9", june(3), eight(), true)).unwrap();
    let removed = store.remove_medication("m9", "P004").unwrap();
    assert_eq!(removed.id, "m9");
    assert!(store.for_patient("P004").is_empty());
    assert!(
        store.statuses().iter().all(|s| s.medication_id != "m9"),
        "Dose events of a removed medication must go with it"
    );
}

#[tokio::test]
async fn test_add_assigns_missing_id() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;

    let added = store.add_medication(prescription("", "P001")).unwrap();

    assert!(!added.id.is_empty());
    assert_eq!(store.for_patient("P001").len(), 3);
}

#[tokio::test]
async fn test_update_of_unknown_medication_is_reported() {
    let (ctx, _) = local_context();
    let store = MedicationStore::open(&ctx).await;
    let (_subscription, mut rx) = listen(&store);
    next(&mut rx).await;
    next(&mut rx).await;

    let result = store.update_medication(prescription("m404", "P001"));

    assert_matches!(result, Err(StoreError::NotFound { .. }));
    assert!(rx.try_recv().is_err());
    assert_matches!(store.remove_medication("m1", "P002"), Err(StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_adherence_counts_recorded_doses_in_range() {
    let (ctx, persister) = local_context();
    persister.insert(MEDICATION_STATUS_KEY, "[]");
    let store = MedicationStore::open(&ctx).await;
    let one_pm = ClockTime::new(13, 0).unwrap();

    store.mark_dose(dose("m1", june(3), eight(), true)).unwrap();
    store.mark_dose(dose("m1", june(3), one_pm, false)).unwrap();
    store.mark_dose(dose("m2", june(4), eight(), true)).unwrap();
    store.mark_dose(dose("m1", june(20), eight(), true)).unwrap();

    let stats = store.adherence(
        "P001",
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
    );

    assert_eq!(stats.taken, 2);
    assert_eq!(stats.total, 3);
    assert!((stats.percentage - 66.666).abs() < 0.01);
    assert_eq!(store.adherence("P404", NaiveDate::MIN, NaiveDate::MAX).percentage, 0.0);
}

#[tokio::test]
async fn test_reminder_preferences_persist_without_notifying() {
    let (ctx, persister) = local_context();
    let store = MedicationStore::open(&ctx).await;
    let (_subscription, mut rx) = listen(&store);
    next(&mut rx).await;
    next(&mut rx).await;

    let preference = ReminderPreference {
        id: "pref-1".to_string(),
        user_id: "P001".to_string(),
        medication_id: "m1".to_string(),
        notification_types: vec![NotificationType::Sms, NotificationType::Calendar],
        reminder_times: ReminderLead { minutes_before: 15 },
        phone_number: Some("+15550100".to_string()),
        email: None,
        enabled: true,
    };
    store.set_reminder_preferences("P001", preference.clone()).unwrap();

    assert!(rx.try_recv().is_err(), "Preferences are not announced");
    assert_eq!(store.reminder_preferences("P001"), Some(preference));
    assert_eq!(store.reminder_preferences("P002"), None);

    assert!(store.flush().await.unwrap());
    assert!(persister.get(REMINDER_PREFERENCES_KEY).unwrap().contains("minutesBefore"));
}

#[tokio::test]
async fn test_flush_writes_every_key_and_reloads() {
    let (ctx, persister) = local_context();
    let store = MedicationStore::open(&ctx).await;
    store.mark_dose(dose("m4", june(3), eight(), true)).unwrap();
    store.close().await.unwrap();

    assert_eq!(
        persister.keys(),
        vec![MEDICATION_STATUS_KEY, MEDICATIONS_KEY, REMINDER_PREFERENCES_KEY]
    );
    let status_blob = persister.get(MEDICATION_STATUS_KEY).unwrap();
    assert!(status_blob.contains("\"date\":\"Mon Jun 03 2024\""));
    assert!(status_blob.contains("\"time\":\"08:00\""));

    let reopened = MedicationStore::open(&SyncContext::new(persister, Duration::from_secs(3600))).await;
    assert_eq!(reopened.medications_by_patient(), store.medications_by_patient());
    assert_eq!(reopened.statuses(), store.statuses());
}

#[tokio::test]
async fn test_dose_and_prescription_changes_reach_other_context() {
    let bus: Arc<dyn ChangeBus> = Arc::new(LocalChangeBus::new());
    let persister = Arc::new(MemoryPersister::new());
    let patient_tab = SyncContext::new(persister.clone(), Duration::from_secs(3600)).with_bus(bus.clone());
    let doctor_tab = SyncContext::new(persister, Duration::from_secs(3600)).with_bus(bus);

    let patient_store = MedicationStore::open(&patient_tab).await;
    let doctor_store = MedicationStore::open(&doctor_tab).await;
    let (_subscription, mut doctor_rx) = listen(&doctor_store);
    next(&mut doctor_rx).await;
    next(&mut doctor_rx).await;

    patient_store.mark_dose(dose("m1", june(3), eight(), true)).unwrap();
    assert_matches!(next(&mut doctor_rx).await, MedicationEvent::DoseStatus(statuses) if statuses.len() == 3);

    patient_store.remove_medication("m1", "P001").unwrap();
    assert_matches!(next(&mut doctor_rx).await, MedicationEvent::Medications(_));
    assert_matches!(next(&mut doctor_rx).await, MedicationEvent::DoseStatus(_));
    assert!(doctor_store.statuses().iter().all(|s| s.medication_id != "m1"));
    assert_eq!(doctor_store.for_patient("P001").len(), 1);
}
