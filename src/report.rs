use crate::model::{AttendanceRecord, Mark};
use crate::roster::RosterEntry;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub course_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportFilter {
    fn accepts(&self, r: &AttendanceRecord, date: NaiveDate) -> bool {
        if self.course_id.is_some_and(|c| c != r.curso_id) {
            return false;
        }
        if self.from.is_some_and(|f| date < f) {
            return false;
        }
        if self.to.is_some_and(|t| date > t) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentTotals {
    pub student_id: i64,
    pub display_name: String,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
}

impl StudentTotals {
    pub fn total(&self) -> usize {
        self.present + self.late + self.absent
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradeReport {
    pub students: Vec<StudentTotals>,
    pub dates: Vec<NaiveDate>,
    pub unmatched_records: usize,
    pub undated_records: usize,
}

/// Per-student P/T/F totals, in roster order.
pub fn grade_report(
    roster: &[RosterEntry],
    records: &[AttendanceRecord],
    filter: &ReportFilter,
) -> GradeReport {
    let mut by_id: HashMap<i64, usize> = HashMap::new();
    let mut students: Vec<StudentTotals> = Vec::with_capacity(roster.len());
    for (i, s) in roster.iter().enumerate() {
        by_id.insert(s.id, i);
        students.push(StudentTotals {
            student_id: s.id,
            display_name: s.display_name.clone(),
            ..Default::default()
        });
    }

    let mut dates = BTreeSet::new();
    let mut report = GradeReport::default();
    for r in records {
        let Some(date) = r.date() else {
            report.undated_records += 1;
            continue;
        };
        if !filter.accepts(r, date) {
            continue;
        }
        let Some(idx) = by_id.get(&r.estudiante_id) else {
            report.unmatched_records += 1;
            continue;
        };
        let row = &mut students[*idx];
        match Mark::from(r.estado_asistencia) {
            Mark::Present => row.present += 1,
            Mark::Late => row.late += 1,
            Mark::Absent => row.absent += 1,
        }
        dates.insert(date);
    }
    report.students = students;
    report.dates = dates.into_iter().collect();
    report
}
