//! The attendance sheet: selection, view/edit modes and saving.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::api::AttendanceApi;
use crate::calendar::MonthGrid;
use crate::error::{ApiError, ControllerError};
use crate::reconcile::{self, SaveOutcome, SaveTarget, NOTHING_TO_SAVE};
use crate::types::{
    status_map, AttendanceStats, AttendanceStatus, ClassId, ClassSection, StatusMap, Student,
    StudentId, Subject, SubjectId,
};

pub const DISCARD_PROMPT: &str = "You have unsaved changes. Are you sure you want to discard them?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Viewing,
    Editing,
    Saving,
    /// A fetch failed; the view accepts no further actions.
    Error(String),
}

/// Message shown above the sheet until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Failure(String),
}

pub struct AttendanceController<A> {
    api: A,
    state: ViewState,
    classes: Vec<ClassSection>,
    subjects: Vec<Subject>,
    roster: Vec<Student>,
    statuses: StatusMap,
    selected_class: Option<ClassId>,
    selected_subject: Option<SubjectId>,
    selected_date: NaiveDate,
    unsaved: bool,
    banner: Option<Banner>,
}

impl<A: AttendanceApi> AttendanceController<A> {
    pub fn new(api: A, date: NaiveDate) -> Self {
        Self {
            api,
            state: ViewState::Loading,
            classes: Vec::new(),
            subjects: Vec::new(),
            roster: Vec::new(),
            statuses: StatusMap::new(),
            selected_class: None,
            selected_subject: None,
            selected_date: date,
            unsaved: false,
            banner: None,
        }
    }

    /// Load classes and subjects, select the first class and its subject,
    /// then load its roster and attendance.
    pub async fn mount(&mut self) -> Result<(), ControllerError> {
        self.ensure_not_halted()?;
        self.state = ViewState::Loading;

        let fetched = async {
            let classes = self.api.teacher_classes().await?;
            let subjects = self.api.teacher_subjects().await?;
            Ok::<_, ApiError>((classes, subjects))
        }
        .await;
        let (classes, subjects) = match fetched {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail(e)),
        };

        self.selected_class = classes.first().map(|c| c.id);
        self.selected_subject = resolve_subject(classes.first(), &subjects);
        info!(
            classes = classes.len(),
            subjects = subjects.len(),
            class_id = ?self.selected_class,
            subject_id = ?self.selected_subject,
            "Loaded teacher classes"
        );
        self.classes = classes;
        self.subjects = subjects;

        self.reload(true).await
    }

    /// Switch class. Unsaved edits are dropped without asking.
    pub async fn select_class(&mut self, class_id: ClassId) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        let class = self
            .classes
            .iter()
            .find(|c| c.id == class_id)
            .ok_or(ControllerError::UnknownClass(class_id))?;
        let subject_id = resolve_subject(Some(class), &self.subjects);

        if self.unsaved {
            warn!(class_id, "Discarding unsaved attendance changes");
        }
        self.selected_class = Some(class_id);
        self.selected_subject = subject_id;
        self.reload(true).await
    }

    /// Switch subject. While editing with unsaved changes, `confirm` decides
    /// whether they are discarded. Returns false if the user declined.
    pub async fn select_subject<F>(
        &mut self,
        subject_id: SubjectId,
        confirm: F,
    ) -> Result<bool, ControllerError>
    where
        F: FnOnce(&str) -> bool,
    {
        self.ensure_idle()?;
        if !self.subjects.iter().any(|s| s.id == subject_id) {
            return Err(ControllerError::UnknownSubject(subject_id));
        }
        if !self.confirm_discard(confirm) {
            return Ok(false);
        }

        self.selected_subject = Some(subject_id);
        self.reload(false).await?;
        Ok(true)
    }

    /// Switch date, with the same confirmation rule as `select_subject`.
    pub async fn select_date<F>(&mut self, date: NaiveDate, confirm: F) -> Result<bool, ControllerError>
    where
        F: FnOnce(&str) -> bool,
    {
        self.ensure_idle()?;
        if !self.confirm_discard(confirm) {
            return Ok(false);
        }

        self.selected_date = date;
        self.reload(false).await?;
        Ok(true)
    }

    pub fn begin_edit(&mut self) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        if self.state == ViewState::Editing {
            return Ok(());
        }
        if self.selected_subject.is_none() {
            return Err(ControllerError::NoSubjectSelected);
        }

        self.state = ViewState::Editing;
        Ok(())
    }

    pub fn set_status(
        &mut self,
        student_id: StudentId,
        status: AttendanceStatus,
    ) -> Result<(), ControllerError> {
        self.ensure_editing()?;
        let slot = self
            .statuses
            .get_mut(&student_id)
            .ok_or(ControllerError::UnknownStudent(student_id))?;

        *slot = status;
        self.unsaved = true;
        Ok(())
    }

    /// Leave edit mode. Unsaved changes need `confirm`; if given, the stored
    /// attendance is fetched again. Returns false if the user declined.
    pub async fn cancel_edit<F>(&mut self, confirm: F) -> Result<bool, ControllerError>
    where
        F: FnOnce(&str) -> bool,
    {
        self.ensure_editing()?;

        if !self.unsaved {
            self.state = ViewState::Viewing;
            return Ok(true);
        }
        if !confirm(DISCARD_PROMPT) {
            return Ok(false);
        }

        debug!("Discarding attendance edits");
        self.reload(false).await?;
        Ok(true)
    }

    /// Reconcile the edits with the server and go back to viewing the
    /// stored attendance.
    ///
    /// Per-student failures land in a `Banner::Failure` and do not stop the
    /// view. If the stored statuses cannot be read first, nothing is written
    /// and the view stays in edit mode with the edits intact.
    pub async fn save(&mut self) -> Result<SaveOutcome, ControllerError> {
        self.ensure_editing()?;
        let Some(class_id) = self.selected_class else {
            return Err(ControllerError::NotEditing);
        };

        self.state = ViewState::Saving;
        let target = SaveTarget {
            class_id,
            subject_id: self.selected_subject,
            date: Some(self.selected_date),
        };

        let outcome =
            match reconcile::reconcile(&self.api, &self.roster, &self.statuses, &target).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "Could not read stored attendance before saving");
                    self.state = ViewState::Editing;
                    let err = ControllerError::SaveAborted(e.to_string());
                    self.banner = Some(Banner::Failure(err.to_string()));
                    return Err(err);
                }
            };

        self.banner = Some(match &outcome {
            SaveOutcome::NothingToSave => Banner::Success(NOTHING_TO_SAVE.to_string()),
            SaveOutcome::Completed(report) if report.is_success() => {
                Banner::Success(report.to_string())
            }
            SaveOutcome::Completed(report) => Banner::Failure(report.to_string()),
        });

        self.reload(false).await?;
        Ok(outcome)
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == ViewState::Editing
    }

    pub fn classes(&self) -> &[ClassSection] {
        &self.classes
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn statuses(&self) -> &StatusMap {
        &self.statuses
    }

    pub fn status_of(&self, student_id: StudentId) -> AttendanceStatus {
        self.statuses.get(&student_id).copied().unwrap_or_default()
    }

    pub fn selected_class(&self) -> Option<&ClassSection> {
        self.selected_class
            .and_then(|id| self.classes.iter().find(|c| c.id == id))
    }

    pub fn selected_subject(&self) -> Option<SubjectId> {
        self.selected_subject
    }

    pub fn selected_subject_name(&self) -> Option<&str> {
        self.selected_subject
            .and_then(|id| self.subjects.iter().find(|s| s.id == id))
            .map(|s| s.name.as_str())
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn stats(&self) -> AttendanceStats {
        AttendanceStats::from_map(&self.statuses)
    }

    /// Roster entries matching the search box, in roster order.
    pub fn visible_students(&self, query: &str) -> Vec<&Student> {
        self.roster.iter().filter(|s| s.matches(query)).collect()
    }

    pub fn month_grid(&self) -> MonthGrid {
        MonthGrid::new(self.selected_date)
    }

    /// Fetch roster (optionally) and attendance for the current selection
    /// and land in `Viewing` with no pending edits.
    async fn reload(&mut self, with_roster: bool) -> Result<(), ControllerError> {
        self.state = ViewState::Loading;
        match self.fetch_sheet(with_roster).await {
            Ok(()) => {
                self.state = ViewState::Viewing;
                self.unsaved = false;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn fetch_sheet(&mut self, with_roster: bool) -> Result<(), ApiError> {
        let Some(class_id) = self.selected_class else {
            self.roster.clear();
            self.statuses.clear();
            return Ok(());
        };

        if with_roster {
            let roster = self.api.class_roster(class_id).await?;
            debug!(class_id, students = roster.len(), "Loaded roster");
            self.roster = roster;
        }

        let entries = self
            .api
            .class_attendance(class_id, self.selected_subject, self.selected_date)
            .await?;
        self.statuses = status_map(&self.roster, &entries);
        debug!(
            class_id,
            subject_id = ?self.selected_subject,
            date = %self.selected_date,
            recorded = entries.len(),
            "Loaded attendance"
        );
        Ok(())
    }

    fn fail(&mut self, err: ApiError) -> ControllerError {
        let message = err.to_string();
        warn!(error = %message, status = ?err.status(), "Attendance view failed");
        self.state = ViewState::Error(message.clone());
        ControllerError::Halted(message)
    }

    fn confirm_discard<F>(&self, confirm: F) -> bool
    where
        F: FnOnce(&str) -> bool,
    {
        !(self.state == ViewState::Editing && self.unsaved) || confirm(DISCARD_PROMPT)
    }

    fn ensure_not_halted(&self) -> Result<(), ControllerError> {
        match &self.state {
            ViewState::Error(message) => Err(ControllerError::Halted(message.clone())),
            _ => Ok(()),
        }
    }

    fn ensure_idle(&self) -> Result<(), ControllerError> {
        self.ensure_not_halted()?;
        match self.state {
            ViewState::Loading => Err(ControllerError::Busy("loading")),
            ViewState::Saving => Err(ControllerError::Busy("saving")),
            _ => Ok(()),
        }
    }

    fn ensure_editing(&self) -> Result<(), ControllerError> {
        self.ensure_not_halted()?;
        match self.state {
            ViewState::Editing => Ok(()),
            ViewState::Saving => Err(ControllerError::Busy("saving")),
            _ => Err(ControllerError::NotEditing),
        }
    }
}

/// The class's own subject if the teacher has it, else the teacher's only
/// subject.
fn resolve_subject(class: Option<&ClassSection>, subjects: &[Subject]) -> Option<SubjectId> {
    class
        .and_then(|c| c.subject_id)
        .filter(|id| subjects.iter().any(|s| s.id == *id))
        .or_else(|| match subjects {
            [only] => Some(only.id),
            _ => None,
        })
}
