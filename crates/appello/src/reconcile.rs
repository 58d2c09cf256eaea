//! Turning edited statuses into attendance writes.
//!
//! A save re-reads the stored statuses, keeps only the students whose edited
//! status is recorded and differs from the stored one, validates each record
//! and posts them one at a time. Failures never stop the batch; they are
//! collected into the report next to the successful writes.

use chrono::NaiveDate;
use std::fmt;
use tracing::{debug, info, warn};

use crate::api::AttendanceApi;
use crate::error::ApiError;
use crate::types::{
    status_map, AttendanceRecord, AttendanceStatus, ClassId, RecordDraft, RecordError, StatusMap,
    Student, StudentId, SubjectId,
};

/// The (class, subject, date) triple being saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTarget {
    pub class_id: ClassId,
    pub subject_id: Option<SubjectId>,
    pub date: Option<NaiveDate>,
}

/// One member of the write set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub student_id: StudentId,
    pub student_name: String,
    pub status: AttendanceStatus,
}

/// Students whose edited status is recorded and differs from the stored
/// one, in roster order. Reverting to `none` never produces a write.
pub fn write_set(roster: &[Student], edits: &StatusMap, canonical: &StatusMap) -> Vec<PendingWrite> {
    roster
        .iter()
        .filter_map(|student| {
            let new_status = edits.get(&student.id).copied().unwrap_or_default();
            let old_status = canonical.get(&student.id).copied().unwrap_or_default();

            (new_status.is_recorded() && new_status != old_status).then(|| PendingWrite {
                student_id: student.id,
                student_name: student.full_name(),
                status: new_status,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Never sent: the record did not validate.
    Invalid(RecordError),
    /// Sent and refused, or lost in transit.
    Rejected(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Invalid(e) => write!(f, "{}", e),
            FailureReason::Rejected(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub student_id: StudentId,
    pub student_name: String,
    pub reason: FailureReason,
}

/// Outcome of a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Applied(StudentId),
    Failed(WriteFailure),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub applied: Vec<StudentId>,
    pub failed: Vec<WriteFailure>,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.applied.len() + self.failed.len()
    }

    fn push(mut self, result: WriteResult) -> Self {
        match result {
            WriteResult::Applied(id) => self.applied.push(id),
            WriteResult::Failed(failure) => self.failed.push(failure),
        }
        self
    }
}

impl FromIterator<WriteResult> for ReconcileReport {
    fn from_iter<I: IntoIterator<Item = WriteResult>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), Self::push)
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failed.is_empty() {
            return write!(f, "Attendance saved for {} student(s)", self.applied.len());
        }

        write!(
            f,
            "Attendance could not be saved for {} of {} student(s):",
            self.failed.len(),
            self.attempted()
        )?;
        for failure in &self.failed {
            write!(f, "\n- {}: {}", failure.student_name, failure.reason)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The write set was empty; no write was issued.
    NothingToSave,
    Completed(ReconcileReport),
}

pub const NOTHING_TO_SAVE: &str = "No changes to save";

/// Diff `edits` against a fresh read of the stored statuses and submit the
/// changed records sequentially.
///
/// Only the snapshot read can fail the whole call; every per-record problem
/// ends up in the report.
pub async fn reconcile<A>(
    api: &A,
    roster: &[Student],
    edits: &StatusMap,
    target: &SaveTarget,
) -> Result<SaveOutcome, ApiError>
where
    A: AttendanceApi + ?Sized,
{
    let canonical = match target.date {
        Some(date) => {
            let entries = api
                .class_attendance(target.class_id, target.subject_id, date)
                .await?;
            status_map(roster, &entries)
        }
        None => status_map(roster, &[]),
    };

    let pending = write_set(roster, edits, &canonical);
    if pending.is_empty() {
        info!(class_id = target.class_id, "Nothing to save");
        return Ok(SaveOutcome::NothingToSave);
    }

    debug!(count = pending.len(), "Submitting attendance records");

    let mut results = Vec::with_capacity(pending.len());
    for write in pending {
        results.push(submit(api, target, write).await);
    }

    let report: ReconcileReport = results.into_iter().collect();
    if report.is_success() {
        info!(applied = report.applied.len(), "Attendance saved");
    } else {
        warn!(
            applied = report.applied.len(),
            failed = report.failed.len(),
            "Attendance partially saved"
        );
    }

    Ok(SaveOutcome::Completed(report))
}

async fn submit<A>(api: &A, target: &SaveTarget, write: PendingWrite) -> WriteResult
where
    A: AttendanceApi + ?Sized,
{
    let draft = RecordDraft {
        student_id: write.student_id,
        subject_id: target.subject_id,
        date: target.date,
        status: write.status,
    };

    let failed = |reason| {
        WriteResult::Failed(WriteFailure {
            student_id: write.student_id,
            student_name: write.student_name.clone(),
            reason,
        })
    };

    let record = match AttendanceRecord::try_from(draft) {
        Ok(record) => record,
        Err(e) => {
            warn!(student_id = write.student_id, error = %e, "Skipping invalid record");
            return failed(FailureReason::Invalid(e));
        }
    };

    match api.record_attendance(&record).await {
        Ok(()) => WriteResult::Applied(write.student_id),
        Err(e) => {
            warn!(student_id = write.student_id, error = %e, "Attendance write rejected");
            failed(FailureReason::Rejected(e.to_string()))
        }
    }
}
