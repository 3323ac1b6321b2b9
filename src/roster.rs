use crate::model::{GradeDetail, StudentRow};
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub display_name: String,
}

impl RosterEntry {
    pub fn from_row(row: &StudentRow) -> Self {
        let last = row.apellido.trim().to_string();
        let first = row.nombre.trim().to_string();
        let display_name = match (last.is_empty(), first.is_empty()) {
            (false, false) => format!("{}, {}", last, first),
            (false, true) => last.clone(),
            _ => first.clone(),
        };
        Self {
            id: row.id,
            last_name: last,
            first_name: first,
            display_name,
        }
    }
}

/// Roster in display order: last name, then first name, Spanish collation.
pub fn build_roster(grade: &GradeDetail) -> Vec<RosterEntry> {
    let mut out: Vec<RosterEntry> = grade.estudiantes.iter().map(RosterEntry::from_row).collect();
    sort_roster(&mut out);
    out
}

pub fn sort_roster(entries: &mut [RosterEntry]) {
    // slice::sort_by is stable; equal names keep backend order.
    entries.sort_by(|a, b| {
        compare_es(&a.last_name, &b.last_name).then_with(|| compare_es(&a.first_name, &b.first_name))
    });
}

/// Collation key of one character: base letter weight, then the accent.
/// Accented letters decompose onto their base letter; ñ sits between n and o.
fn primary(c: char) -> (u32, u32) {
    let lower = c.to_lowercase().next().unwrap_or(c);
    if lower == 'ñ' {
        return (('n' as u32) * 2 + 1, 0);
    }
    let mut parts = std::iter::once(lower).nfd();
    let base = parts.next().unwrap_or(lower);
    let accent = parts
        .find(|m| is_combining_mark(*m))
        .map_or(0, |m| m as u32);
    ((base as u32) * 2, accent)
}

pub fn compare_es(a: &str, b: &str) -> Ordering {
    let ka: Vec<(u32, u32)> = a.trim().chars().map(primary).collect();
    let kb: Vec<(u32, u32)> = b.trim().chars().map(primary).collect();

    let primary_a = ka.iter().map(|(w, _)| *w);
    let primary_b = kb.iter().map(|(w, _)| *w);
    primary_a
        .cmp(primary_b)
        .then_with(|| {
            ka.iter()
                .map(|(_, acc)| *acc)
                .cmp(kb.iter().map(|(_, acc)| *acc))
        })
        // Case only breaks the last tie: lowercase first.
        .then_with(|| b.trim().cmp(a.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, last: &str, first: &str) -> RosterEntry {
        RosterEntry::from_row(&StudentRow {
            id,
            nombre: first.to_string(),
            apellido: last.to_string(),
        })
    }

    #[test]
    fn enye_sorts_between_n_and_o() {
        let mut v = vec![
            entry(1, "Ortiz", "Luis"),
            entry(2, "Ñuñez", "Ana"),
            entry(3, "Nuñez", "Ana"),
            entry(4, "Nunez", "Ana"),
        ];
        sort_roster(&mut v);
        let ids: Vec<i64> = v.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn accents_sort_with_base_letter() {
        let mut v = vec![
            entry(1, "Bravo", "X"),
            entry(2, "Álvarez", "X"),
            entry(3, "Alvarado", "X"),
            entry(4, "Zúñiga", "X"),
            entry(5, "Zapata", "X"),
        ];
        sort_roster(&mut v);
        let ids: Vec<i64> = v.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1, 5, 4]);
    }

    #[test]
    fn equal_names_keep_input_order() {
        let mut v = vec![
            entry(9, "García", "Rosa"),
            entry(3, "García", "Rosa"),
            entry(5, "García", "Rosa"),
        ];
        sort_roster(&mut v);
        let ids: Vec<i64> = v.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![9, 3, 5]);
    }

    #[test]
    fn first_name_breaks_last_name_ties() {
        let mut v = vec![entry(1, "Rojas", "Óscar"), entry(2, "Rojas", "Nadia")];
        sort_roster(&mut v);
        assert_eq!(v[0].id, 2);
        assert_eq!(v[0].display_name, "Rojas, Nadia");
    }

    #[test]
    fn any_decomposable_accent_sorts_with_its_base_letter() {
        let mut v = vec![
            entry(1, "Zárate", "X"),
            entry(2, "Ãlves", "X"),
            entry(3, "Ýbarra", "X"),
            entry(4, "Åberg", "X"),
            entry(5, "Sõto", "X"),
            entry(6, "Yupanqui", "X"),
        ];
        sort_roster(&mut v);
        let ids: Vec<i64> = v.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 2, 5, 3, 6, 1]);
        assert_eq!(compare_es("Müller", "Muller"), Ordering::Greater);
        assert_eq!(compare_es("Mueller", "Müller"), Ordering::Less);
    }

    #[test]
    fn case_is_ignored_for_ordering() {
        assert_eq!(compare_es("de la Cruz", "Díaz"), Ordering::Less);
        assert_eq!(compare_es("ÑAUPARI", "nuñez"), Ordering::Greater);
    }
}
