// libs/medication-cell/src/models.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_models::{CalendarDay, ClockTime};

pub const MEDICATION_CHANNEL: &str = "medication_updates";
pub const MEDICATIONS_KEY: &str = "medications";
pub const MEDICATION_STATUS_KEY: &str = "medicationStatus";
pub const REMINDER_PREFERENCES_KEY: &str = "reminderPreferences";

/// Prescriptions grouped by the patient they are prescribed for.
pub type MedicationsByPatient = BTreeMap<String, Vec<Medication>>;

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequency {
    pub times_per_day: u32,
    pub specific_times: Vec<ClockTime>,
    /// Restricts doses to these weekdays, Sunday being 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
}

impl Frequency {
    pub fn daily(times: &[ClockTime]) -> Self {
        Self {
            times_per_day: times.len() as u32,
            specific_times: times.to_vec(),
            days_of_week: None,
        }
    }

    pub fn applies_on(&self, day: &CalendarDay) -> bool {
        match &self.days_of_week {
            Some(days) => days.contains(&day.weekday_index()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: Frequency,
    pub instructions: String,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub prescribed_by: String,
    pub prescribed_for: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_times: Option<Vec<ClockTime>>,
}

impl Medication {
    /// Within the prescription's start and optional end date, both inclusive.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        day >= self.start_date && self.end_date.map_or(true, |end| day <= end)
    }

    /// Active on `day` and not excluded by the weekday restriction.
    pub fn is_scheduled_on(&self, day: &CalendarDay) -> bool {
        self.is_active_on(day.as_naive()) && self.frequency.applies_on(day)
    }
}

// ==============================================================================
// DOSE EVENTS
// ==============================================================================

/// Whether one scheduled dose was taken.
///
/// `(medication_id, date, time)` identifies the dose; the store keeps at most
/// one record per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationStatus {
    pub medication_id: String,
    pub date: CalendarDay,
    pub time: ClockTime,
    pub taken: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<DateTime<Utc>>,
}

impl MedicationStatus {
    pub fn is_same_dose(&self, other: &MedicationStatus) -> bool {
        self.medication_id == other.medication_id && self.date == other.date && self.time == other.time
    }

    pub fn is_for(&self, medication_id: &str, day: &CalendarDay, time: &ClockTime) -> bool {
        self.medication_id == medication_id && self.date == *day && self.time == *time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdherenceStats {
    pub taken: usize,
    pub total: usize,
    pub percentage: f64,
}

impl AdherenceStats {
    pub fn from_counts(taken: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            taken as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            taken,
            total,
            percentage,
        }
    }
}

// ==============================================================================
// REMINDER PREFERENCES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Calendar,
    Sms,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderLead {
    pub minutes_before: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPreference {
    pub id: String,
    pub user_id: String,
    pub medication_id: String,
    pub notification_types: Vec<NotificationType>,
    pub reminder_times: ReminderLead,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub enabled: bool,
}

// ==============================================================================
// EVENTS AND SYNC MESSAGES
// ==============================================================================

/// Which half of the medication store changed, with its new contents.
#[derive(Debug, Clone)]
pub enum MedicationEvent {
    Medications(Arc<MedicationsByPatient>),
    DoseStatus(Arc<Vec<MedicationStatus>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MedicationSync {
    CollectionReplaced { payload: MedicationsByPatient },
    SingleRecordUpserted { payload: MedicationStatus },
}
