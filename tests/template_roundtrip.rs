#[path = "../src/model.rs"]
mod model;
#[path = "../src/template.rs"]
mod template;

use model::{parse_date, Mark};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use template::{TemplateMeta, TemplateRow};

fn meta() -> TemplateMeta {
    TemplateMeta {
        grado: "5".to_string(),
        seccion: "B".to_string(),
        nivel: Some("Secundaria".to_string()),
        grade_id: 42,
        course_id: 7,
        date: parse_date("2024-05-06").expect("date"),
    }
}

fn rows() -> Vec<TemplateRow> {
    vec![
        TemplateRow {
            student_id: 11,
            last_name: "Ñahui".to_string(),
            first_name: "Pedro".to_string(),
            mark: Some(Mark::Present),
        },
        TemplateRow {
            student_id: 12,
            last_name: "Ruiz & Ruiz".to_string(),
            first_name: "<Ana>".to_string(),
            mark: Some(Mark::Late),
        },
        TemplateRow {
            student_id: 13,
            last_name: "Soto".to_string(),
            first_name: "Luz".to_string(),
            mark: None,
        },
        TemplateRow {
            student_id: 14,
            last_name: "Vega".to_string(),
            first_name: "Iván".to_string(),
            mark: Some(Mark::Absent),
        },
    ]
}

fn entry_text(path: &Path, name: &str) -> String {
    let f = File::open(path).expect("open template");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut s = String::new();
    archive
        .by_name(name)
        .expect("entry present")
        .read_to_string(&mut s)
        .expect("read entry");
    s
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let f = File::create(path).expect("create zip");
    let mut zip = zip::ZipWriter::new(f);
    for (name, body) in entries {
        zip.start_file(*name, zip::write::FileOptions::default())
            .expect("start entry");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish zip");
}

#[test]
fn export_writes_workbook_with_status_validation() {
    let dir = tempfile::tempdir().expect("temp dir");
    let meta = meta();
    let path = dir.path().join(template::template_file_name(&meta));
    let count = template::write_template(&path, &meta, &rows(), template::DEFAULT_ROSTER_SHEET)
        .expect("write template");
    assert_eq!(count, 7);
    assert!(path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == "Plantilla_Asistencia_5_B_2024-05-06.xlsx"));

    let f = File::open(&path).expect("open template");
    let archive = zip::ZipArchive::new(f).expect("open zip archive");
    assert_eq!(archive.len(), 7);

    let workbook = entry_text(&path, "xl/workbook.xml");
    assert!(workbook.contains("name=\"Datos\""));
    assert!(workbook.contains("name=\"Asistencia\""));

    let roster = entry_text(&path, "xl/worksheets/sheet2.xml");
    assert!(roster.contains("<formula1>\"P,T,F\"</formula1>"));
    assert!(roster.contains("sqref=\"E2:E5\""));
    assert!(roster.contains("Ruiz &amp; Ruiz"));
    assert!(roster.contains("&lt;Ana&gt;"));

    let datos = entry_text(&path, "xl/worksheets/sheet1.xml");
    assert!(datos.contains("2024-05-06"));
    assert!(datos.contains("Secundaria"));
}

#[test]
fn exported_template_reads_back_same_marks() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("plantilla.xlsx");
    template::write_template(&path, &meta(), &rows(), "Lista 5B").expect("write template");

    let imported = template::read_template(&path).expect("read template");
    assert_eq!(imported.grade_id, Some(42));
    assert_eq!(imported.course_id, Some(7));
    assert_eq!(imported.date, parse_date("2024-05-06"));
    assert_eq!(
        imported.marks,
        vec![(11, Mark::Present), (12, Mark::Late), (14, Mark::Absent)]
    );
    assert!(imported.rejected.is_empty());
}

#[test]
fn export_rejects_bad_sheet_name() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bad.xlsx");
    assert!(template::write_template(&path, &meta(), &rows(), "a:b").is_err());
    assert!(!path.exists());
}

#[test]
fn import_reports_bad_rows_and_lowercase_codes() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("filled.xlsx");
    let sheet = "<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>\
        <row r=\"1\">\
          <c r=\"A1\" t=\"inlineStr\"><is><t>N°</t></is></c>\
          <c r=\"B1\" t=\"inlineStr\"><is><t>ID</t></is></c>\
          <c r=\"E1\" t=\"inlineStr\"><is><t>Estado</t></is></c>\
        </row>\
        <row r=\"2\"><c r=\"B2\"><v>21</v></c><c r=\"E2\" t=\"inlineStr\"><is><t>f</t></is></c></row>\
        <row r=\"3\"><c r=\"B3\"><v>22</v></c><c r=\"E3\" t=\"inlineStr\"><is><t>X</t></is></c></row>\
        <row r=\"4\"><c r=\"B4\" t=\"inlineStr\"><is><t>abc</t></is></c><c r=\"E4\" t=\"inlineStr\"><is><t>P</t></is></c></row>\
        <row r=\"5\"><c r=\"B5\"><v>23</v></c></row>\
        </sheetData></worksheet>";
    write_zip(&path, &[("xl/worksheets/sheet1.xml", sheet)]);

    let imported = template::read_template(&path).expect("read template");
    assert_eq!(imported.marks, vec![(21, Mark::Absent)]);
    assert_eq!(imported.rejected.len(), 2);
    assert_eq!(imported.rejected[0].row, 3);
    assert_eq!(imported.rejected[0].reason, "bad_code");
    assert_eq!(imported.rejected[1].row, 4);
    assert_eq!(imported.rejected[1].reason, "bad_student_id");
    assert_eq!(imported.grade_id, None);
    assert_eq!(imported.date, None);
}

#[test]
fn import_without_roster_sheet_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("other.xlsx");
    let sheet = "<worksheet><sheetData>\
        <row r=\"1\"><c r=\"A1\" t=\"inlineStr\"><is><t>Notas</t></is></c></row>\
        </sheetData></worksheet>";
    write_zip(&path, &[("xl/worksheets/sheet1.xml", sheet)]);
    let e = template::read_template(&path).expect_err("no roster sheet");
    assert!(e.to_string().contains("no attendance sheet"));

    let not_zip = dir.path().join("plain.xlsx");
    std::fs::write(&not_zip, b"just text").expect("write file");
    assert!(template::read_template(&not_zip).is_err());
}

#[test]
fn control_characters_in_names_are_dropped_on_export() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("control.xlsx");
    let mut rows = rows();
    rows[0].last_name = "Ña\u{1}hui\u{b}".to_string();
    template::write_template(&path, &meta(), &rows, template::DEFAULT_ROSTER_SHEET)
        .expect("write template");

    let roster = entry_text(&path, "xl/worksheets/sheet2.xml");
    assert!(roster.contains("<t>Ñahui</t>"));
    assert!(!roster.contains('\u{1}'));
    assert!(!roster.contains('\u{b}'));

    let imported = template::read_template(&path).expect("read template");
    assert_eq!(imported.marks.len(), 3);
}

#[test]
fn import_survives_oversized_cell_references() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("odd.xlsx");
    let sheet = "<worksheet><sheetData>\
        <row r=\"1\">\
          <c r=\"A1\" t=\"inlineStr\"><is><t>N°</t></is></c>\
          <c r=\"B1\" t=\"inlineStr\"><is><t>ID</t></is></c>\
          <c r=\"E1\" t=\"inlineStr\"><is><t>Estado</t></is></c>\
        </row>\
        <row r=\"2\"><c r=\"B2\"><v>31</v></c><c r=\"E2\" t=\"inlineStr\"><is><t>T</t></is></c>\
          <c r=\"AAAAAAAAAAAAAAAAAAAA2\" t=\"inlineStr\"><is><t>x</t></is></c></row>\
        </sheetData></worksheet>";
    write_zip(&path, &[("xl/worksheets/sheet1.xml", sheet)]);
    let imported = template::read_template(&path).expect("read template");
    assert_eq!(imported.marks, vec![(31, Mark::Late)]);
}
