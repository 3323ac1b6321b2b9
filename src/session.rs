//! Attendance editing session for one (course, grade-section, date).
//!
//! Keeps two slots of marks: `marks` is the edit buffer, `original` is what
//! the backend held at the last load or successful save. `has_changes` is
//! always `marks != original`.

use crate::api::{ApiError, AttendanceApi};
use crate::model::{fecha_for, AttendancePayload, AttendanceRecord, BatchRow, GradeDetail, Mark};
use crate::roster::{build_roster, RosterEntry};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("attendance has not been registered for this date")]
    NotRegistered,
    #[error("attendance is already registered for this date")]
    AlreadyRegistered,
    #[error("student {0} is not in this roster")]
    UnknownStudent(i64),
    #[error("session view is stale (current generation {current}, got {got})")]
    StaleGeneration { current: u64, got: u64 },
    #[error("save stopped at student {student_id} after {saved} rows: {source}")]
    SaveFailed {
        saved: usize,
        student_id: i64,
        source: ApiError,
    },
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Api(e) => e.code(),
            SessionError::NotRegistered => "not_registered",
            SessionError::AlreadyRegistered => "already_registered",
            SessionError::UnknownStudent(_) => "not_found",
            SessionError::StaleGeneration { .. } => "stale_generation",
            SessionError::SaveFailed { .. } => "save_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            SessionError::Api(e) => e.details(),
            SessionError::UnknownStudent(id) => Some(serde_json::json!({ "studentId": id })),
            SessionError::StaleGeneration { current, got } => {
                Some(serde_json::json!({ "current": current, "got": got }))
            }
            SessionError::SaveFailed {
                saved,
                student_id,
                source,
            } => Some(serde_json::json!({
                "saved": saved,
                "studentId": student_id,
                "cause": source.code(),
            })),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Sequential,
    Batch,
}

impl SaveMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequential" => Some(Self::Sequential),
            "batch" => Some(Self::Batch),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Batch => "batch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    date: NaiveDate,
}

impl LoadTicket {
    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Backend state for one date, projected onto the roster.
#[derive(Debug, Clone, Default)]
pub struct DayMarks {
    pub marks: BTreeMap<i64, Mark>,
    pub record_ids: HashMap<i64, i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkCounts {
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub unset: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub created: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub applied: usize,
    pub unknown_students: Vec<i64>,
}

pub struct AttendanceSession {
    course_id: i64,
    grade: GradeDetail,
    roster: Vec<RosterEntry>,
    date: NaiveDate,
    generation: u64,
    load_seq: u64,
    marks: BTreeMap<i64, Mark>,
    original: BTreeMap<i64, Mark>,
    record_ids: HashMap<i64, i64>,
    registered: bool,
    has_changes: bool,
}

impl AttendanceSession {
    pub fn open(
        api: &dyn AttendanceApi,
        course_id: i64,
        grade_id: i64,
        date: NaiveDate,
    ) -> Result<Self, SessionError> {
        let grade = api.grade(grade_id)?;
        let mut session = Self::with_grade(course_id, grade, date);
        session.set_date(api, date)?;
        log::info!(
            "opened attendance session course={} grade={} date={} students={}",
            course_id,
            grade_id,
            date,
            session.roster.len()
        );
        Ok(session)
    }

    /// A session with the roster loaded but no marks fetched yet.
    pub fn with_grade(course_id: i64, grade: GradeDetail, date: NaiveDate) -> Self {
        let roster = build_roster(&grade);
        Self {
            course_id,
            grade,
            roster,
            date,
            generation: 0,
            load_seq: 0,
            marks: BTreeMap::new(),
            original: BTreeMap::new(),
            record_ids: HashMap::new(),
            registered: false,
            has_changes: false,
        }
    }

    pub fn course_id(&self) -> i64 {
        self.course_id
    }

    pub fn grade(&self) -> &GradeDetail {
        &self.grade
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registered(&self) -> bool {
        self.registered
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    pub fn marks(&self) -> &BTreeMap<i64, Mark> {
        &self.marks
    }

    pub fn mark_of(&self, student_id: i64) -> Option<Mark> {
        self.marks.get(&student_id).copied()
    }

    pub fn record_id_of(&self, student_id: i64) -> Option<i64> {
        self.record_ids.get(&student_id).copied()
    }

    pub fn counts(&self) -> MarkCounts {
        let mut c = MarkCounts::default();
        for s in &self.roster {
            match self.marks.get(&s.id) {
                Some(Mark::Present) => c.present += 1,
                Some(Mark::Late) => c.late += 1,
                Some(Mark::Absent) => c.absent += 1,
                None => c.unset += 1,
            }
        }
        c
    }

    pub fn check_generation(&self, expected: Option<u64>) -> Result<(), SessionError> {
        match expected {
            Some(got) if got != self.generation => Err(SessionError::StaleGeneration {
                current: self.generation,
                got,
            }),
            _ => Ok(()),
        }
    }

    fn knows(&self, student_id: i64) -> bool {
        self.roster.iter().any(|s| s.id == student_id)
    }

    fn recompute_changes(&mut self) {
        self.has_changes = self.marks != self.original;
    }

    /// Starts a load for `date`. Any ticket handed out earlier becomes stale.
    pub fn begin_load(&mut self, date: NaiveDate) -> LoadTicket {
        self.load_seq += 1;
        LoadTicket {
            seq: self.load_seq,
            date,
        }
    }

    pub fn fetch_day(&self, api: &dyn AttendanceApi, ticket: &LoadTicket) -> Result<DayMarks, ApiError> {
        let records = api.grade_attendance(self.grade.id)?;
        Ok(self.project_day(&records, ticket.date))
    }

    /// Keeps the records for this course and date whose student is on the roster.
    pub fn project_day(&self, records: &[AttendanceRecord], date: NaiveDate) -> DayMarks {
        let mut day = DayMarks::default();
        for r in records {
            if r.curso_id != self.course_id || r.date() != Some(date) {
                continue;
            }
            if !self.knows(r.estudiante_id) {
                continue;
            }
            day.marks.insert(r.estudiante_id, Mark::from(r.estado_asistencia));
            day.record_ids.insert(r.estudiante_id, r.id);
        }
        day
    }

    /// Applies a load unless a newer one has been started since.
    pub fn finish_load(&mut self, ticket: LoadTicket, day: DayMarks) -> Result<(), SessionError> {
        if ticket.seq != self.load_seq {
            log::warn!(
                "discarding stale attendance load for {} (ticket {}, latest {})",
                ticket.date,
                ticket.seq,
                self.load_seq
            );
            return Err(SessionError::StaleGeneration {
                current: self.load_seq,
                got: ticket.seq,
            });
        }
        self.date = ticket.date;
        self.generation += 1;
        self.registered = !day.marks.is_empty();
        self.original = day.marks.clone();
        self.marks = day.marks;
        self.record_ids = day.record_ids;
        self.has_changes = false;
        Ok(())
    }

    /// Loads `date` from the backend, discarding any unsaved edits.
    pub fn set_date(&mut self, api: &dyn AttendanceApi, date: NaiveDate) -> Result<(), SessionError> {
        let ticket = self.begin_load(date);
        let day = self.fetch_day(api, &ticket)?;
        self.finish_load(ticket, day)
    }

    pub fn reload(&mut self, api: &dyn AttendanceApi) -> Result<(), SessionError> {
        self.set_date(api, self.date)
    }

    /// Cycles one student's mark. Returns false when nothing changed because
    /// attendance is not registered yet.
    pub fn toggle(&mut self, student_id: i64) -> Result<bool, SessionError> {
        if !self.knows(student_id) {
            return Err(SessionError::UnknownStudent(student_id));
        }
        if !self.registered {
            return Ok(false);
        }
        let next = match self.marks.get(&student_id) {
            Some(m) => m.next(),
            None => Mark::Present,
        };
        self.marks.insert(student_id, next);
        self.recompute_changes();
        Ok(true)
    }

    /// First-time registration: everyone present, nothing sent yet.
    pub fn register(&mut self) -> Result<(), SessionError> {
        if self.registered {
            return Err(SessionError::AlreadyRegistered);
        }
        for s in &self.roster {
            self.marks.insert(s.id, Mark::Present);
        }
        self.registered = true;
        self.recompute_changes();
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.marks = self.original.clone();
        if self.original.is_empty() {
            self.registered = false;
        }
        self.has_changes = false;
    }

    fn payload_for(&self, student_id: i64, mark: Mark) -> AttendancePayload {
        AttendancePayload {
            fecha: fecha_for(self.date),
            curso_id: self.course_id,
            grado_academico_id: self.grade.id,
            estudiante_id: student_id,
            estado_asistencia: mark.status(),
        }
    }

    fn marked_in_roster_order(&self) -> Vec<(i64, Mark)> {
        self.roster
            .iter()
            .filter_map(|s| self.marks.get(&s.id).map(|m| (s.id, *m)))
            .collect()
    }

    pub fn save(&mut self, api: &dyn AttendanceApi, mode: SaveMode) -> Result<SaveSummary, SessionError> {
        if !self.registered {
            return Err(SessionError::NotRegistered);
        }
        let summary = match mode {
            SaveMode::Sequential => self.save_sequential(api)?,
            SaveMode::Batch => self.save_batch(api)?,
        };
        log::info!(
            "saved attendance course={} grade={} date={} created={} updated={}",
            self.course_id,
            self.grade.id,
            self.date,
            summary.created,
            summary.updated
        );
        Ok(summary)
    }

    fn save_sequential(&mut self, api: &dyn AttendanceApi) -> Result<SaveSummary, SessionError> {
        let mut summary = SaveSummary::default();
        for (saved, (student_id, mark)) in self.marked_in_roster_order().into_iter().enumerate() {
            let payload = self.payload_for(student_id, mark);
            let result = match self.record_ids.get(&student_id).copied() {
                Some(record_id) => api.update_attendance(record_id, &payload).map(|_| {
                    summary.updated += 1;
                }),
                None => api.create_attendance(&payload).map(|created| {
                    self.record_ids.insert(student_id, created.id);
                    summary.created += 1;
                }),
            };
            if let Err(source) = result {
                log::warn!(
                    "attendance save aborted at student {} after {} rows: {}",
                    student_id,
                    saved,
                    source
                );
                return Err(SessionError::SaveFailed {
                    saved,
                    student_id,
                    source,
                });
            }
        }
        self.original = self.marks.clone();
        self.has_changes = false;
        Ok(summary)
    }

    fn save_batch(&mut self, api: &dyn AttendanceApi) -> Result<SaveSummary, SessionError> {
        let mut summary = SaveSummary::default();
        let rows: Vec<BatchRow> = self
            .marked_in_roster_order()
            .into_iter()
            .map(|(student_id, mark)| {
                let id = self.record_ids.get(&student_id).copied();
                if id.is_some() {
                    summary.updated += 1;
                } else {
                    summary.created += 1;
                }
                BatchRow {
                    id,
                    payload: self.payload_for(student_id, mark),
                }
            })
            .collect();
        api.upsert_batch(&rows)?;

        // New record ids only exist on the backend now.
        let saved = self.marks.clone();
        if let Err(e) = self.reload(api) {
            log::warn!("reload after batch save failed: {}", e);
            self.original = saved;
            self.has_changes = false;
        }
        Ok(summary)
    }

    /// Applies marks read from a filled-in template.
    pub fn apply_imported(&mut self, rows: &[(i64, Mark)]) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();
        for (student_id, mark) in rows {
            if self.knows(*student_id) {
                self.marks.insert(*student_id, *mark);
                outcome.applied += 1;
            } else {
                outcome.unknown_students.push(*student_id);
            }
        }
        if outcome.applied > 0 {
            self.registered = true;
        }
        self.recompute_changes();
        outcome
    }
}
