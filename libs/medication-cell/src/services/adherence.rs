// libs/medication-cell/src/services/adherence.rs
use chrono::NaiveDate;

use crate::models::{AdherenceStats, Medication, MedicationStatus};

/// Share of recorded doses of `medications` marked taken between `from` and
/// `to`, both inclusive.
///
/// Only recorded dose events count; a scheduled dose nobody answered is not
/// part of the total.
pub fn adherence_between(
    medications: &[Medication],
    statuses: &[MedicationStatus],
    from: NaiveDate,
    to: NaiveDate,
) -> AdherenceStats {
    let relevant: Vec<&MedicationStatus> = statuses
        .iter()
        .filter(|status| {
            let day = status.date.as_naive();
            day >= from
                && day <= to
                && medications.iter().any(|med| med.id == status.medication_id)
        })
        .collect();

    let taken = relevant.iter().filter(|status| status.taken).count();
    AdherenceStats::from_counts(taken, relevant.len())
}

/// Dose events that belong to any of `medications`.
pub fn statuses_for<'a>(
    medications: &[Medication],
    statuses: &'a [MedicationStatus],
) -> Vec<&'a MedicationStatus> {
    statuses
        .iter()
        .filter(|status| medications.iter().any(|med| med.id == status.medication_id))
        .collect()
}
