//! Offline attendance template: a two-sheet `.xlsx` (metadata + roster with
//! a P/T/F drop-down) and the reader for a filled-in copy.

use crate::model::{parse_date, Mark};
use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use quick_xml::escape::escape;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DEFAULT_ROSTER_SHEET: &str = "Asistencia";
pub const META_SHEET: &str = "Datos";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const LABEL_GRADE: &str = "Grado";
const LABEL_SECTION: &str = "Sección";
const LABEL_LEVEL: &str = "Nivel";
const LABEL_GRADE_ID: &str = "Grado académico ID";
const LABEL_COURSE_ID: &str = "Curso ID";
const LABEL_DATE: &str = "Fecha";
const LABEL_TOTAL: &str = "Total estudiantes";
const LABEL_CODES: &str = "Códigos";

const ROSTER_HEADER: [&str; 5] = ["N°", "ID", "Apellidos", "Nombres", "Estado"];
const COL_ID: usize = 1;
const COL_STATUS: usize = 4;
const MAX_COLUMN_LETTERS: usize = 3;

#[derive(Debug, Clone)]
pub struct TemplateMeta {
    pub grado: String,
    pub seccion: String,
    pub nivel: Option<String>,
    pub grade_id: i64,
    pub course_id: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct TemplateRow {
    pub student_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub mark: Option<Mark>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub row: u32,
    pub value: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct ImportedTemplate {
    pub grade_id: Option<i64>,
    pub course_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub marks: Vec<(i64, Mark)>,
    pub rejected: Vec<RejectedRow>,
}

fn file_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "NA".to_string()
    } else {
        cleaned
    }
}

/// `Plantilla_Asistencia_<grado>_<seccion>_<fecha>.xlsx`
pub fn template_file_name(meta: &TemplateMeta) -> String {
    format!(
        "Plantilla_Asistencia_{}_{}_{}.xlsx",
        file_component(&meta.grado),
        file_component(&meta.seccion),
        meta.date.format("%Y-%m-%d")
    )
}

pub fn valid_sheet_name(name: &str) -> bool {
    let n = name.trim();
    !n.is_empty()
        && n.chars().count() <= 31
        && !n.contains(['[', ']', ':', '*', '?', '/', '\\'])
        && n != META_SHEET
}

/// Escapes text for an XML node, dropping control characters XML 1.0 forbids.
fn xml_escape(raw: &str) -> String {
    let clean: String = raw
        .chars()
        .filter(|c| *c >= '\u{20}' || matches!(c, '\t' | '\n' | '\r'))
        .collect();
    escape(clean.as_str()).into_owned()
}

fn column_letters(mut idx: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push((b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    out.iter().rev().collect()
}

/// Zero-based column of a cell reference such as `E12`. xlsx stops at
/// column XFD, so anything longer than three letters is rejected.
fn column_index(cell_ref: &str) -> Option<usize> {
    let letters: Vec<u8> = cell_ref
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > MAX_COLUMN_LETTERS {
        return None;
    }
    let mut idx = 0usize;
    for b in letters {
        let digit = (b.to_ascii_uppercase() - b'A' + 1) as usize;
        idx = idx.checked_mul(26)?.checked_add(digit)?;
    }
    Some(idx - 1)
}

enum CellValue<'a> {
    Text(&'a str),
    Number(i64),
}

fn cell_xml(row: u32, col: usize, value: &CellValue<'_>, bold: bool) -> String {
    let r = format!("{}{}", column_letters(col), row);
    let style = if bold { " s=\"1\"" } else { "" };
    match value {
        CellValue::Text(t) => format!(
            "<c r=\"{}\"{} t=\"inlineStr\"><is><t>{}</t></is></c>",
            r,
            style,
            xml_escape(t)
        ),
        CellValue::Number(n) => format!("<c r=\"{}\"{}><v>{}</v></c>", r, style, n),
    }
}

fn row_xml(row: u32, cells: &[CellValue<'_>], bold: bool) -> String {
    let mut out = format!("<row r=\"{}\">", row);
    for (col, v) in cells.iter().enumerate() {
        out.push_str(&cell_xml(row, col, v, bold));
    }
    out.push_str("</row>");
    out
}

fn worksheet_xml(cols: &[u32], rows: &str, tail: &str) -> String {
    let mut cols_xml = String::from("<cols>");
    for (i, w) in cols.iter().enumerate() {
        cols_xml.push_str(&format!(
            "<col min=\"{n}\" max=\"{n}\" width=\"{w}\" customWidth=\"1\"/>",
            n = i + 1,
            w = w
        ));
    }
    cols_xml.push_str("</cols>");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <worksheet xmlns=\"{}\" xmlns:r=\"{}\">{}<sheetData>{}</sheetData>{}</worksheet>",
        NS_MAIN, NS_REL, cols_xml, rows, tail
    )
}

fn meta_sheet(meta: &TemplateMeta, total: usize) -> String {
    let date = meta.date.format("%Y-%m-%d").to_string();
    let nivel = meta.nivel.clone().unwrap_or_default();
    let rows: Vec<(&str, CellValue<'_>)> = vec![
        (LABEL_GRADE, CellValue::Text(&meta.grado)),
        (LABEL_SECTION, CellValue::Text(&meta.seccion)),
        (LABEL_LEVEL, CellValue::Text(&nivel)),
        (LABEL_GRADE_ID, CellValue::Number(meta.grade_id)),
        (LABEL_COURSE_ID, CellValue::Number(meta.course_id)),
        (LABEL_DATE, CellValue::Text(&date)),
        (LABEL_TOTAL, CellValue::Number(total as i64)),
        (
            LABEL_CODES,
            CellValue::Text("P = Presente, T = Tardanza, F = Falta"),
        ),
    ];
    let mut body = String::new();
    for (i, (label, value)) in rows.into_iter().enumerate() {
        let r = (i + 1) as u32;
        body.push_str(&format!("<row r=\"{}\">", r));
        body.push_str(&cell_xml(r, 0, &CellValue::Text(label), true));
        body.push_str(&cell_xml(r, 1, &value, false));
        body.push_str("</row>");
    }
    worksheet_xml(&[22, 40], &body, "")
}

fn roster_sheet(rows: &[TemplateRow]) -> String {
    let header: Vec<CellValue<'_>> = ROSTER_HEADER.iter().map(|h| CellValue::Text(*h)).collect();
    let mut body = row_xml(1, &header, true);
    let codes: Vec<String> = rows
        .iter()
        .map(|r| r.mark.map(|m| m.code().to_string()).unwrap_or_default())
        .collect();
    for (i, (row, code)) in rows.iter().zip(codes.iter()).enumerate() {
        let r = (i + 2) as u32;
        let mut cells = vec![
            CellValue::Number((i + 1) as i64),
            CellValue::Number(row.student_id),
            CellValue::Text(&row.last_name),
            CellValue::Text(&row.first_name),
        ];
        if !code.is_empty() {
            cells.push(CellValue::Text(code));
        }
        body.push_str(&row_xml(r, &cells, false));
    }
    let last_row = rows.len().max(1) + 1;
    let validation = format!(
        "<dataValidations count=\"1\">\
         <dataValidation type=\"list\" allowBlank=\"1\" showInputMessage=\"1\" showErrorMessage=\"1\" \
         errorTitle=\"Estado\" error=\"Use P, T o F\" promptTitle=\"Estado\" \
         prompt=\"P = Presente, T = Tardanza, F = Falta\" sqref=\"E2:E{}\">\
         <formula1>\"P,T,F\"</formula1></dataValidation></dataValidations>",
        last_row
    );
    worksheet_xml(&[6, 10, 28, 28, 10], &body, &validation)
}

fn workbook_xml(roster_sheet_name: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <workbook xmlns=\"{}\" xmlns:r=\"{}\"><sheets>\
         <sheet name=\"{}\" sheetId=\"1\" r:id=\"rId1\"/>\
         <sheet name=\"{}\" sheetId=\"2\" r:id=\"rId2\"/>\
         </sheets></workbook>",
        NS_MAIN,
        NS_REL,
        META_SHEET,
        xml_escape(roster_sheet_name)
    )
}

fn workbook_rels_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <Relationships xmlns=\"{ns}\">\
         <Relationship Id=\"rId1\" Type=\"{rel}/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
         <Relationship Id=\"rId2\" Type=\"{rel}/worksheet\" Target=\"worksheets/sheet2.xml\"/>\
         <Relationship Id=\"rId3\" Type=\"{rel}/styles\" Target=\"styles.xml\"/>\
         </Relationships>",
        ns = NS_PKG_REL,
        rel = NS_REL
    )
}

fn root_rels_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <Relationships xmlns=\"{}\">\
         <Relationship Id=\"rId1\" Type=\"{}/officeDocument\" Target=\"xl/workbook.xml\"/>\
         </Relationships>",
        NS_PKG_REL, NS_REL
    )
}

const CONTENT_TYPES_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet2.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
</Types>";

const STYLES_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
<fonts count=\"2\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font>\
<font><b/><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>\
<fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill><fill><patternFill patternType=\"gray125\"/></fill></fills>\
<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>\
<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>\
<cellXfs count=\"2\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>\
<xf numFmtId=\"0\" fontId=\"1\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyFont=\"1\"/></cellXfs>\
<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>\
</styleSheet>";

/// Writes the template workbook. Returns the number of archive entries.
pub fn write_template(
    out_path: &Path,
    meta: &TemplateMeta,
    rows: &[TemplateRow],
    roster_sheet_name: &str,
) -> anyhow::Result<usize> {
    if !valid_sheet_name(roster_sheet_name) {
        return Err(anyhow!("invalid sheet name: {}", roster_sheet_name));
    }
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create {}", out_path.to_string_lossy()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries: Vec<(&str, String)> = vec![
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", root_rels_xml()),
        ("xl/workbook.xml", workbook_xml(roster_sheet_name.trim())),
        ("xl/_rels/workbook.xml.rels", workbook_rels_xml()),
        ("xl/styles.xml", STYLES_XML.to_string()),
        ("xl/worksheets/sheet1.xml", meta_sheet(meta, rows.len())),
        ("xl/worksheets/sheet2.xml", roster_sheet(rows)),
    ];
    let count = entries.len();
    for (name, body) in entries {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start entry {}", name))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write entry {}", name))?;
    }
    zip.finish().context("failed to finalize template")?;
    Ok(count)
}

#[derive(Debug, Deserialize)]
struct XmlWorksheet {
    #[serde(rename = "sheetData", default)]
    sheet_data: XmlSheetData,
}

#[derive(Debug, Default, Deserialize)]
struct XmlSheetData {
    #[serde(rename = "row", default)]
    rows: Vec<XmlRow>,
}

#[derive(Debug, Deserialize)]
struct XmlRow {
    #[serde(rename = "@r", default)]
    r: Option<u32>,
    #[serde(rename = "c", default)]
    cells: Vec<XmlCell>,
}

#[derive(Debug, Deserialize)]
struct XmlCell {
    #[serde(rename = "@r", default)]
    r: Option<String>,
    #[serde(rename = "@t", default)]
    t: Option<String>,
    #[serde(default)]
    v: Option<String>,
    #[serde(default)]
    is: Option<XmlRichText>,
}

/// `<is>` and `<si>` share this shape: plain `<t>` or rich-text runs.
#[derive(Debug, Default, Deserialize)]
struct XmlRichText {
    #[serde(default)]
    t: Option<String>,
    #[serde(rename = "r", default)]
    runs: Vec<XmlRun>,
}

#[derive(Debug, Deserialize)]
struct XmlRun {
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlSharedStrings {
    #[serde(rename = "si", default)]
    items: Vec<XmlRichText>,
}

impl XmlRichText {
    fn text(&self) -> String {
        match &self.t {
            Some(t) => t.clone(),
            None => self.runs.iter().filter_map(|r| r.t.as_deref()).collect(),
        }
    }
}

type SheetRows = Vec<(u32, BTreeMap<usize, String>)>;

fn sheet_rows(xml: &str, shared: &[String]) -> anyhow::Result<SheetRows> {
    let ws: XmlWorksheet = quick_xml::de::from_str(xml).context("failed to parse worksheet")?;
    let mut out = Vec::new();
    let mut last_row = 0u32;
    for row in ws.sheet_data.rows {
        let row_no = row.r.unwrap_or(last_row + 1);
        last_row = row_no;
        let mut cells = BTreeMap::new();
        let mut next_col = 0usize;
        for c in row.cells {
            let col = c.r.as_deref().and_then(column_index).unwrap_or(next_col);
            next_col = col + 1;
            let value = match c.t.as_deref() {
                Some("s") => c
                    .v
                    .as_deref()
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .and_then(|i| shared.get(i).cloned())
                    .unwrap_or_default(),
                Some("inlineStr") => c.is.as_ref().map(|t| t.text()).unwrap_or_default(),
                _ => c.v.clone().unwrap_or_default(),
            };
            let value = value.trim().to_string();
            if !value.is_empty() {
                cells.insert(col, value);
            }
        }
        out.push((row_no, cells));
    }
    Ok(out)
}

fn parse_int_cell(raw: &str) -> Option<i64> {
    let t = raw.trim();
    if let Ok(n) = t.parse::<i64>() {
        return Some(n);
    }
    // Spreadsheet apps may store ids as floats, e.g. "12.0".
    let f = t.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn is_roster_sheet(rows: &SheetRows) -> bool {
    let Some((_, header)) = rows.first() else {
        return false;
    };
    header.get(&COL_ID).map(|s| s.as_str()) == Some(ROSTER_HEADER[COL_ID])
        && header.get(&COL_STATUS).map(|s| s.as_str()) == Some(ROSTER_HEADER[COL_STATUS])
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> anyhow::Result<String> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("missing entry {}", name))?;
    let mut s = String::new();
    entry
        .read_to_string(&mut s)
        .with_context(|| format!("failed to read entry {}", name))?;
    Ok(s)
}

/// Reads a filled-in template back. The roster sheet is located by its
/// header row, so renamed or reordered sheets still import.
pub fn read_template(in_path: &Path) -> anyhow::Result<ImportedTemplate> {
    let f = File::open(in_path)
        .with_context(|| format!("failed to open {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(f).context("not an xlsx archive")?;

    let names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|e| e.name().to_string()))
        .collect();

    let shared: Vec<String> = if names.iter().any(|n| n == "xl/sharedStrings.xml") {
        let xml = read_entry(&mut archive, "xl/sharedStrings.xml")?;
        let sst: XmlSharedStrings =
            quick_xml::de::from_str(&xml).context("failed to parse shared strings")?;
        sst.items.iter().map(|s| s.text()).collect()
    } else {
        Vec::new()
    };

    let mut sheet_names: Vec<&String> = names
        .iter()
        .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml"))
        .collect();
    sheet_names.sort();

    let mut out = ImportedTemplate::default();
    let mut roster_found = false;
    for name in sheet_names {
        let xml = read_entry(&mut archive, name)?;
        let rows = sheet_rows(&xml, &shared)?;
        if is_roster_sheet(&rows) {
            if roster_found {
                continue;
            }
            roster_found = true;
            collect_marks(&rows, &mut out);
        } else {
            collect_meta(&rows, &mut out);
        }
    }
    if !roster_found {
        return Err(anyhow!("no attendance sheet found in template"));
    }
    Ok(out)
}

fn collect_meta(rows: &SheetRows, out: &mut ImportedTemplate) {
    for (_, cells) in rows {
        let (Some(label), Some(value)) = (cells.get(&0), cells.get(&1)) else {
            continue;
        };
        match label.as_str() {
            LABEL_GRADE_ID => out.grade_id = parse_int_cell(value),
            LABEL_COURSE_ID => out.course_id = parse_int_cell(value),
            LABEL_DATE => out.date = parse_date(value),
            _ => {}
        }
    }
}

fn collect_marks(rows: &SheetRows, out: &mut ImportedTemplate) {
    for (row_no, cells) in rows.iter().skip(1) {
        let id_raw = cells.get(&COL_ID);
        let status_raw = cells.get(&COL_STATUS);
        let Some(status_raw) = status_raw else {
            continue;
        };
        let Some(student_id) = id_raw.and_then(|s| parse_int_cell(s)) else {
            out.rejected.push(RejectedRow {
                row: *row_no,
                value: id_raw.cloned().unwrap_or_default(),
                reason: "bad_student_id",
            });
            continue;
        };
        match Mark::from_code(status_raw) {
            Some(mark) => out.marks.push((student_id, mark)),
            None => out.rejected.push(RejectedRow {
                row: *row_no,
                value: status_raw.clone(),
                reason: "bad_code",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_roundtrip() {
        for (i, s) in [(0, "A"), (4, "E"), (25, "Z"), (26, "AA"), (27, "AB"), (701, "ZZ")] {
            assert_eq!(column_letters(i), s);
            assert_eq!(column_index(&format!("{}12", s)), Some(i));
        }
    }

    #[test]
    fn oversized_cell_refs_are_rejected() {
        assert_eq!(column_index("XFD1"), Some(16383));
        assert_eq!(column_index("ABCD1"), None);
        assert_eq!(column_index(&format!("{}1", "A".repeat(20))), None);
        assert_eq!(column_index("12"), None);

        let xml = "<worksheet><sheetData><row r=\"1\">\
            <c r=\"AAAAAAAAAAAAAAAAAAAA1\" t=\"inlineStr\"><is><t>x</t></is></c>\
            </row></sheetData></worksheet>";
        let rows = sheet_rows(xml, &[]).expect("parse sheet");
        assert_eq!(rows[0].1.get(&0).map(|s| s.as_str()), Some("x"));
    }

    #[test]
    fn escaped_text_drops_control_characters() {
        assert_eq!(xml_escape("Ruiz\u{1} & <Ana>\t"), "Ruiz &amp; &lt;Ana&gt;\t");
        assert_eq!(xml_escape("línea\r\nnueva"), "línea\r\nnueva");
    }

    #[test]
    fn file_name_replaces_unsafe_characters() {
        let meta = TemplateMeta {
            grado: "3ro Primaria".to_string(),
            seccion: "A/B".to_string(),
            nivel: None,
            grade_id: 1,
            course_id: 2,
            date: parse_date("2024-04-02").expect("date"),
        };
        assert_eq!(
            template_file_name(&meta),
            "Plantilla_Asistencia_3ro_Primaria_A_B_2024-04-02.xlsx"
        );
    }

    #[test]
    fn sheet_name_rules() {
        assert!(valid_sheet_name("Asistencia"));
        assert!(!valid_sheet_name(""));
        assert!(!valid_sheet_name("a/b"));
        assert!(!valid_sheet_name(META_SHEET));
        assert!(!valid_sheet_name(&"x".repeat(32)));
    }

    #[test]
    fn shared_strings_and_float_ids_are_read() {
        let xml = "<worksheet><sheetData>\
            <row r=\"1\"><c r=\"B1\" t=\"s\"><v>0</v></c><c r=\"E1\" t=\"s\"><v>1</v></c></row>\
            <row r=\"2\"><c r=\"B2\"><v>12.0</v></c><c r=\"E2\" t=\"s\"><v>2</v></c></row>\
            </sheetData></worksheet>";
        let shared = vec!["ID".to_string(), "Estado".to_string(), "t".to_string()];
        let rows = sheet_rows(xml, &shared).expect("parse sheet");
        assert!(is_roster_sheet(&rows));
        let mut out = ImportedTemplate::default();
        collect_marks(&rows, &mut out);
        assert_eq!(out.marks, vec![(12, Mark::Late)]);
    }
}
