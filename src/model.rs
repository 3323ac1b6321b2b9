use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Persisted attendance state, as the backend spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Presente,
    Tardanza,
    Falta,
}

/// Compact per-student mark used by the editor. Unset is absence from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mark {
    Present,
    Late,
    Absent,
}

impl Mark {
    pub fn code(self) -> char {
        match self {
            Mark::Present => 'P',
            Mark::Late => 'T',
            Mark::Absent => 'F',
        }
    }

    pub fn from_code(raw: &str) -> Option<Mark> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "P" => Some(Mark::Present),
            "T" => Some(Mark::Late),
            "F" => Some(Mark::Absent),
            _ => None,
        }
    }

    /// P -> T -> F -> P.
    pub fn next(self) -> Mark {
        match self {
            Mark::Present => Mark::Late,
            Mark::Late => Mark::Absent,
            Mark::Absent => Mark::Present,
        }
    }

    pub fn status(self) -> AttendanceStatus {
        match self {
            Mark::Present => AttendanceStatus::Presente,
            Mark::Late => AttendanceStatus::Tardanza,
            Mark::Absent => AttendanceStatus::Falta,
        }
    }
}

impl From<AttendanceStatus> for Mark {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::Presente => Mark::Present,
            AttendanceStatus::Tardanza => Mark::Late,
            AttendanceStatus::Falta => Mark::Absent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentRow {
    pub id: i64,
    #[serde(alias = "nombres", default)]
    pub nombre: String,
    #[serde(alias = "apellidos", default)]
    pub apellido: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradeDetail {
    pub id: i64,
    #[serde(deserialize_with = "string_or_number", default)]
    pub grado: String,
    #[serde(deserialize_with = "string_or_number", default)]
    pub seccion: String,
    #[serde(default)]
    pub nivel: Option<String>,
    #[serde(default)]
    pub estudiantes: Vec<StudentRow>,
}

impl GradeDetail {
    pub fn label(&self) -> String {
        format!("{} {}", self.grado, self.seccion).trim().to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub fecha: String,
    #[serde(alias = "cursoId")]
    pub curso_id: i64,
    #[serde(rename = "gradoAcademico_id", alias = "gradoAcademicoId")]
    pub grado_academico_id: i64,
    #[serde(alias = "estudianteId")]
    pub estudiante_id: i64,
    #[serde(rename = "estadoAsistencia")]
    pub estado_asistencia: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn date(&self) -> Option<NaiveDate> {
        record_date(&self.fecha)
    }
}

/// Body for `POST /asistencias` and `PATCH /asistencias/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendancePayload {
    pub fecha: String,
    pub curso_id: i64,
    #[serde(rename = "gradoAcademico_id")]
    pub grado_academico_id: i64,
    pub estudiante_id: i64,
    #[serde(rename = "estadoAsistencia")]
    pub estado_asistencia: AttendanceStatus,
}

/// One row of `POST /asistencias/lote`; `id` present means update.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub payload: AttendancePayload,
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// UTC calendar day of a persisted `fecha`.
pub fn record_date(fecha: &str) -> Option<NaiveDate> {
    let t = fecha.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Some(head) = t.get(..10) {
        return parse_date(head);
    }
    None
}

pub fn fecha_for(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_cycle_is_three_long() {
        let mut m = Mark::Present;
        let mut seen = vec![m];
        for _ in 0..3 {
            m = m.next();
            seen.push(m);
        }
        assert_eq!(
            seen,
            vec![Mark::Present, Mark::Late, Mark::Absent, Mark::Present]
        );
    }

    #[test]
    fn record_date_uses_utc_day() {
        assert_eq!(
            record_date("2024-05-10T00:00:00.000Z"),
            parse_date("2024-05-10")
        );
        assert_eq!(
            record_date("2024-05-10T22:30:00-05:00"),
            parse_date("2024-05-11")
        );
        assert_eq!(record_date("2024-05-10"), parse_date("2024-05-10"));
        assert_eq!(record_date("garbage"), None);
    }

    #[test]
    fn grade_detail_accepts_numeric_labels_and_aliases() {
        let raw = serde_json::json!({
            "id": 7,
            "grado": 3,
            "seccion": "B",
            "estudiantes": [{ "id": 1, "nombres": "Ana", "apellidos": "Ñuñez" }]
        });
        let g: GradeDetail = serde_json::from_value(raw).expect("decode grade");
        assert_eq!(g.label(), "3 B");
        assert_eq!(g.estudiantes[0].apellido, "Ñuñez");
    }

    #[test]
    fn payload_uses_backend_field_names() {
        let p = AttendancePayload {
            fecha: fecha_for(parse_date("2024-03-01").expect("date")),
            curso_id: 2,
            grado_academico_id: 3,
            estudiante_id: 4,
            estado_asistencia: AttendanceStatus::Tardanza,
        };
        let v = serde_json::to_value(&p).expect("encode");
        assert_eq!(v["fecha"], "2024-03-01T00:00:00.000Z");
        assert_eq!(v["gradoAcademico_id"], 3);
        assert_eq!(v["estadoAsistencia"], "Tardanza");
    }
}
