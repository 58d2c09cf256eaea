use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub type ClassId = i64;
pub type SubjectId = i64;
pub type StudentId = i64;

/// Attendance status of one student for a (class, subject, date) triple.
pub type StatusMap = BTreeMap<StudentId, AttendanceStatus>;

/// A class section taught by the logged-in teacher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassSection {
    pub id: ClassId,
    pub name: String,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub subject_name: Option<String>,
}

impl ClassSection {
    /// Selector label, e.g. "3A - Mathematics"
    pub fn label(&self) -> String {
        match &self.subject_name {
            Some(subject) => format!("{} - {}", self.name, subject),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

/// A roster entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Case-insensitive substring match on "first last".
    /// An empty query matches everyone.
    pub fn matches(&self, query: &str) -> bool {
        self.full_name()
            .to_lowercase()
            .contains(&query.trim().to_lowercase())
    }

    /// First letter of the first name, shown when there is no avatar
    pub fn initial(&self) -> String {
        self.first_name.chars().next().map(String::from).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    #[default]
    None,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::None,
    ];

    /// True for the values the API persists.
    pub fn is_recorded(self) -> bool {
        !matches!(self, AttendanceStatus::None)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::None => "none",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::None => "Not set",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "none" | "" => Ok(AttendanceStatus::None),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

/// One row of the class status lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusEntry {
    pub student_id: StudentId,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
}

/// Build the status map for a roster: every student starts at `none`,
/// then the API's entries are overlaid. Entries for students outside the
/// roster are dropped.
pub fn status_map(roster: &[Student], entries: &[StatusEntry]) -> StatusMap {
    let mut map: StatusMap = roster
        .iter()
        .map(|s| (s.id, AttendanceStatus::None))
        .collect();

    for entry in entries {
        if let Some(slot) = map.get_mut(&entry.student_id) {
            *slot = entry.status.unwrap_or_default();
        }
    }

    map
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceStats {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub none: usize,
    pub total: usize,
}

impl AttendanceStats {
    pub fn from_map(map: &StatusMap) -> Self {
        let mut stats = Self {
            total: map.len(),
            ..Default::default()
        };
        for status in map.values() {
            match status {
                AttendanceStatus::Present => stats.present += 1,
                AttendanceStatus::Absent => stats.absent += 1,
                AttendanceStatus::Late => stats.late += 1,
                AttendanceStatus::None => stats.none += 1,
            }
        }
        stats
    }
}

/// Reasons a draft cannot become a wire record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid student id {0}")]
    InvalidStudent(StudentId),

    #[error("no subject selected")]
    MissingSubject,

    #[error("invalid subject id {0}")]
    InvalidSubject(SubjectId),

    #[error("no date selected")]
    MissingDate,

    #[error("status must be present, absent or late")]
    UnsetStatus,
}

/// Unvalidated record assembled from the controller's selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub student_id: StudentId,
    pub subject_id: Option<SubjectId>,
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
}

/// The unit of persistence sent to the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    student_id: StudentId,
    subject_id: SubjectId,
    date: NaiveDate,
    status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn status(&self) -> AttendanceStatus {
        self.status
    }
}

impl TryFrom<RecordDraft> for AttendanceRecord {
    type Error = RecordError;

    fn try_from(draft: RecordDraft) -> Result<Self, Self::Error> {
        if draft.student_id <= 0 {
            return Err(RecordError::InvalidStudent(draft.student_id));
        }
        let subject_id = draft.subject_id.ok_or(RecordError::MissingSubject)?;
        if subject_id <= 0 {
            return Err(RecordError::InvalidSubject(subject_id));
        }
        let date = draft.date.ok_or(RecordError::MissingDate)?;
        if !draft.status.is_recorded() {
            return Err(RecordError::UnsetStatus);
        }

        Ok(Self {
            student_id: draft.student_id,
            subject_id,
            date,
            status: draft.status,
        })
    }
}
