//! Environment configuration plus the per-workspace settings sections.

use crate::db;
use crate::session::SaveMode;
use crate::template::{valid_sheet_name, DEFAULT_ROSTER_SHEET};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("ASISTENCIA_API_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let token = std::env::var("ASISTENCIA_API_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let timeout_secs = std::env::var("ASISTENCIA_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|n| (1..=120).contains(n))
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            base_url,
            token,
            timeout_secs,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Backend,
    Attendance,
    Export,
}

impl SetupSection {
    pub const ALL: [SetupSection; 3] = [Self::Backend, Self::Attendance, Self::Export];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "backend" => Some(Self::Backend),
            "attendance" => Some(Self::Attendance),
            "export" => Some(Self::Export),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Attendance => "attendance",
            Self::Export => "export",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Backend => "setup.backend",
            Self::Attendance => "setup.attendance",
            Self::Export => "setup.export",
        }
    }
}

pub fn default_section(section: SetupSection, env: &EnvConfig) -> Value {
    match section {
        SetupSection::Backend => json!({
            "baseUrl": env.base_url,
            "timeoutSeconds": env.timeout_secs,
            "saveMode": SaveMode::Sequential.as_str()
        }),
        SetupSection::Attendance => json!({
            "templateSheetName": DEFAULT_ROSTER_SHEET,
            "defaultCourseId": null
        }),
        SetupSection::Export => json!({
            "outputDir": null
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {} characters", key, max_len));
    }
    Ok(s.to_string())
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Backend => match k.as_str() {
                "baseUrl" => {
                    let s = parse_string_max(v, k, 512)?;
                    let lower = s.to_ascii_lowercase();
                    if !lower.starts_with("http://") && !lower.starts_with("https://") {
                        return Err("baseUrl must start with http:// or https://".into());
                    }
                    obj.insert(k.clone(), Value::String(s.trim_end_matches('/').to_string()));
                }
                "timeoutSeconds" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 120)?));
                }
                "saveMode" => {
                    let s = parse_string_max(v, k, 16)?.to_ascii_lowercase();
                    if SaveMode::parse(&s).is_none() {
                        return Err("saveMode must be one of: sequential, batch".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown backend field: {}", k)),
            },
            SetupSection::Attendance => match k.as_str() {
                "templateSheetName" => {
                    let s = parse_string_max(v, k, 31)?;
                    if !valid_sheet_name(&s) {
                        return Err("templateSheetName is not a valid sheet name".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "defaultCourseId" => {
                    if v.is_null() {
                        obj.insert(k.clone(), Value::Null);
                    } else {
                        obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, i64::MAX)?));
                    }
                }
                _ => return Err(format!("unknown attendance field: {}", k)),
            },
            SetupSection::Export => match k.as_str() {
                "outputDir" => {
                    if v.is_null() {
                        obj.insert(k.clone(), Value::Null);
                    } else {
                        let s = parse_string_max(v, k, 1024)?;
                        if s.is_empty() {
                            obj.insert(k.clone(), Value::Null);
                        } else {
                            obj.insert(k.clone(), Value::String(s));
                        }
                    }
                }
                _ => return Err(format!("unknown export field: {}", k)),
            },
        }
    }
    Ok(())
}

/// Defaults overlaid with whatever the workspace saved.
pub fn load_section(
    conn: Option<&rusqlite::Connection>,
    section: SetupSection,
    env: &EnvConfig,
) -> anyhow::Result<Value> {
    let mut current = default_section(section, env);
    let Some(conn) = conn else {
        return Ok(current);
    };
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                if let Err(e) = merge_section_patch(section, &mut current, &one) {
                    log::warn!("ignoring saved {}.{}: {}", section.name(), k, e);
                }
            }
        }
    }
    Ok(current)
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub save_mode: SaveMode,
}

impl BackendSettings {
    pub fn from_section(v: &Value, env: &EnvConfig) -> Self {
        Self {
            base_url: v
                .get("baseUrl")
                .and_then(|x| x.as_str())
                .unwrap_or(&env.base_url)
                .to_string(),
            timeout: Duration::from_secs(
                v.get("timeoutSeconds")
                    .and_then(|x| x.as_u64())
                    .unwrap_or(env.timeout_secs),
            ),
            save_mode: v
                .get("saveMode")
                .and_then(|x| x.as_str())
                .and_then(SaveMode::parse)
                .unwrap_or(SaveMode::Sequential),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceSettings {
    pub template_sheet_name: String,
    pub default_course_id: Option<i64>,
}

impl AttendanceSettings {
    pub fn from_section(v: &Value) -> Self {
        Self {
            template_sheet_name: v
                .get("templateSheetName")
                .and_then(|x| x.as_str())
                .unwrap_or(DEFAULT_ROSTER_SHEET)
                .to_string(),
            default_course_id: v.get("defaultCourseId").and_then(|x| x.as_i64()),
        }
    }
}

pub fn export_dir_from_section(v: &Value) -> Option<PathBuf> {
    v.get("outputDir")
        .and_then(|x| x.as_str())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> EnvConfig {
        EnvConfig {
            base_url: "http://api.local".to_string(),
            token: None,
            timeout_secs: 9,
        }
    }

    #[test]
    fn backend_defaults_come_from_env() {
        let v = default_section(SetupSection::Backend, &env());
        let s = BackendSettings::from_section(&v, &env());
        assert_eq!(s.base_url, "http://api.local");
        assert_eq!(s.timeout, Duration::from_secs(9));
        assert_eq!(s.save_mode, SaveMode::Sequential);
    }

    #[test]
    fn backend_patch_is_validated() {
        let mut v = default_section(SetupSection::Backend, &env());
        let patch = json!({ "baseUrl": "https://colegio.example/api/", "saveMode": "BATCH" });
        merge_section_patch(SetupSection::Backend, &mut v, patch.as_object().expect("obj"))
            .expect("valid patch");
        assert_eq!(v["baseUrl"], "https://colegio.example/api");
        assert_eq!(v["saveMode"], "batch");

        let bad = json!({ "baseUrl": "ftp://x" });
        assert!(
            merge_section_patch(SetupSection::Backend, &mut v, bad.as_object().expect("obj"))
                .is_err()
        );
        let bad = json!({ "timeoutSeconds": 0 });
        assert!(
            merge_section_patch(SetupSection::Backend, &mut v, bad.as_object().expect("obj"))
                .is_err()
        );
        let bad = json!({ "retries": 3 });
        assert!(
            merge_section_patch(SetupSection::Backend, &mut v, bad.as_object().expect("obj"))
                .is_err()
        );
    }

    #[test]
    fn attendance_sheet_name_rejects_reserved() {
        let mut v = default_section(SetupSection::Attendance, &env());
        let bad = json!({ "templateSheetName": "Datos" });
        assert!(merge_section_patch(
            SetupSection::Attendance,
            &mut v,
            bad.as_object().expect("obj")
        )
        .is_err());
        let ok = json!({ "templateSheetName": "Lista", "defaultCourseId": 4 });
        merge_section_patch(SetupSection::Attendance, &mut v, ok.as_object().expect("obj"))
            .expect("valid patch");
        let s = AttendanceSettings::from_section(&v);
        assert_eq!(s.template_sheet_name, "Lista");
        assert_eq!(s.default_course_id, Some(4));
    }

    #[test]
    fn sheet_name_limit_counts_characters() {
        let mut v = default_section(SetupSection::Attendance, &env());
        let name = "Asistencia Educación Física 2do";
        assert_eq!(name.chars().count(), 31);
        let ok = json!({ "templateSheetName": name });
        merge_section_patch(SetupSection::Attendance, &mut v, ok.as_object().expect("obj"))
            .expect("31 characters fit");
        assert_eq!(v["templateSheetName"], name);

        let too_long = json!({ "templateSheetName": format!("{}s", name) });
        assert!(merge_section_patch(
            SetupSection::Attendance,
            &mut v,
            too_long.as_object().expect("obj")
        )
        .is_err());
    }

    #[test]
    fn saved_values_overlay_defaults_field_by_field() {
        let dir = tempfile::tempdir().expect("temp dir");
        let conn = db::open_db(dir.path()).expect("open db");
        db::settings_set_json(
            &conn,
            SetupSection::Backend.key(),
            &json!({ "saveMode": "batch", "timeoutSeconds": 999 }),
        )
        .expect("save settings");

        let v = load_section(Some(&conn), SetupSection::Backend, &env()).expect("load");
        assert_eq!(v["saveMode"], "batch");
        assert_eq!(v["timeoutSeconds"], 9);
        assert_eq!(v["baseUrl"], "http://api.local");

        let export = load_section(Some(&conn), SetupSection::Export, &env()).expect("load");
        assert_eq!(export_dir_from_section(&export), None);
    }
}
