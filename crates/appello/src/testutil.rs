//! In-memory portal used by the controller and reconciliation tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::api::AttendanceApi;
use crate::error::ApiError;
use crate::types::{
    AttendanceRecord, AttendanceStatus, ClassId, ClassSection, StatusEntry, Student, StudentId,
    Subject, SubjectId,
};

#[derive(Default)]
struct Portal {
    classes: Vec<ClassSection>,
    subjects: Vec<Subject>,
    rosters: HashMap<ClassId, Vec<Student>>,
    stored: HashMap<(SubjectId, NaiveDate), BTreeMap<StudentId, AttendanceStatus>>,
    rejected: HashMap<StudentId, String>,
    failing_fetch: Option<&'static str>,
    writes: Vec<AttendanceRecord>,
    attendance_fetches: usize,
}

#[derive(Default)]
pub struct FakeApi {
    portal: Mutex<Portal>,
}

pub fn student(id: StudentId, first: &str, last: &str) -> Student {
    Student {
        id,
        first_name: first.to_string(),
        last_name: last.to_string(),
        avatar: None,
    }
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

impl FakeApi {
    /// One class (id 1, subject 10) with the given roster.
    pub fn with_roster(roster: Vec<Student>) -> Self {
        let api = Self::default();
        {
            let mut portal = api.portal.lock().unwrap();
            portal.classes = vec![
                ClassSection {
                    id: 1,
                    name: "3A".to_string(),
                    subject_id: Some(10),
                    subject_name: Some("Mathematics".to_string()),
                },
                ClassSection {
                    id: 2,
                    name: "3B".to_string(),
                    subject_id: Some(11),
                    subject_name: Some("Physics".to_string()),
                },
            ];
            portal.subjects = vec![
                Subject {
                    id: 10,
                    name: "Mathematics".to_string(),
                },
                Subject {
                    id: 11,
                    name: "Physics".to_string(),
                },
            ];
            portal.rosters.insert(1, roster);
            portal
                .rosters
                .insert(2, vec![student(50, "Marie", "Curie")]);
        }
        api
    }

    /// Classes carry no subject, so nothing is preselected on mount.
    pub fn without_class_subjects(self) -> Self {
        {
            let mut portal = self.portal.lock().unwrap();
            for class in &mut portal.classes {
                class.subject_id = None;
                class.subject_name = None;
            }
        }
        self
    }

    pub fn store(&self, subject: SubjectId, date: NaiveDate, student: StudentId, status: AttendanceStatus) {
        self.portal
            .lock()
            .unwrap()
            .stored
            .entry((subject, date))
            .or_default()
            .insert(student, status);
    }

    pub fn stored(&self, subject: SubjectId, date: NaiveDate, student: StudentId) -> Option<AttendanceStatus> {
        self.portal
            .lock()
            .unwrap()
            .stored
            .get(&(subject, date))
            .and_then(|m| m.get(&student).copied())
    }

    /// Make the server refuse writes for one student.
    pub fn reject(&self, student: StudentId, message: &str) {
        self.portal
            .lock()
            .unwrap()
            .rejected
            .insert(student, message.to_string());
    }

    /// Make one fetch endpoint fail: "classes", "subjects", "roster" or "attendance".
    pub fn fail_fetch(&self, endpoint: Option<&'static str>) {
        self.portal.lock().unwrap().failing_fetch = endpoint;
    }

    pub fn writes(&self) -> Vec<AttendanceRecord> {
        self.portal.lock().unwrap().writes.clone()
    }

    pub fn attendance_fetches(&self) -> usize {
        self.portal.lock().unwrap().attendance_fetches
    }

    fn check(&self, endpoint: &str) -> Result<(), ApiError> {
        match self.portal.lock().unwrap().failing_fetch {
            Some(failing) if failing == endpoint => Err(ApiError::Status {
                status: 500,
                message: format!("Failed to fetch {}", endpoint),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AttendanceApi for FakeApi {
    async fn teacher_classes(&self) -> Result<Vec<ClassSection>, ApiError> {
        self.check("classes")?;
        Ok(self.portal.lock().unwrap().classes.clone())
    }

    async fn teacher_subjects(&self) -> Result<Vec<Subject>, ApiError> {
        self.check("subjects")?;
        Ok(self.portal.lock().unwrap().subjects.clone())
    }

    async fn class_roster(&self, class_id: ClassId) -> Result<Vec<Student>, ApiError> {
        self.check("roster")?;
        Ok(self
            .portal
            .lock()
            .unwrap()
            .rosters
            .get(&class_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn class_attendance(
        &self,
        class_id: ClassId,
        subject_id: Option<SubjectId>,
        date: NaiveDate,
    ) -> Result<Vec<StatusEntry>, ApiError> {
        self.check("attendance")?;
        let mut portal = self.portal.lock().unwrap();
        portal.attendance_fetches += 1;

        let Some(subject_id) = subject_id else {
            return Ok(Vec::new());
        };
        let roster = portal.rosters.get(&class_id).cloned().unwrap_or_default();
        let Some(stored) = portal.stored.get(&(subject_id, date)) else {
            return Ok(Vec::new());
        };

        // Students with no history are omitted, like the real API
        Ok(roster
            .iter()
            .filter_map(|s| {
                stored.get(&s.id).map(|status| StatusEntry {
                    student_id: s.id,
                    status: Some(*status),
                })
            })
            .collect())
    }

    async fn record_attendance(&self, record: &AttendanceRecord) -> Result<(), ApiError> {
        let mut portal = self.portal.lock().unwrap();
        portal.writes.push(record.clone());

        if let Some(message) = portal.rejected.get(&record.student_id()) {
            return Err(ApiError::Status {
                status: 422,
                message: message.clone(),
            });
        }

        portal
            .stored
            .entry((record.subject_id(), record.date()))
            .or_default()
            .insert(record.student_id(), record.status());
        Ok(())
    }
}
