//! Best-effort result report titles.
//!
//! Semester identifiers arrive in whatever shape the registrar typed them
//! (`"E2 Sem 1"`, `"e2-semester-1"`, `"AY24 E3S2"`, ...). We try to pull out
//! the academic year code and semester number and fall back to the raw
//! identifier when that fails. Nothing in here can fail.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::queue::GradeEntry;

/// Year code: `E` (engineering) or `P` (pre-university) followed by 1-4.
static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z])([ep])[\s_\-.]*([1-4])").expect("valid regex"));

/// Semester: `S`, `Sem` or `Semester` followed by 1-3.
static SEMESTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z])s(?:em(?:ester)?)?[\s_\-.]*([1-3])").expect("valid regex")
});

/// Subject codes like `CS2101`, where the first digit is the year.
static SUBJECT_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+([1-4])").expect("valid regex"));

const SUFFIX: &str = "RESULTS";

/// Derive the heading printed on a result report.
pub fn derive_result_title(semester_id: &str, grades: &[GradeEntry]) -> String {
    let year = find_year(semester_id).or_else(|| infer_year_from_codes(grades));
    let semester = find_semester(semester_id);

    match (year, semester) {
        (Some((letter, digit)), Some(sem)) => {
            format!("{}{} SEMESTER-{} {}", letter, digit, sem, SUFFIX)
        }
        _ => fallback_title(semester_id),
    }
}

fn find_year(semester_id: &str) -> Option<(char, char)> {
    let caps = YEAR_PATTERN.captures(semester_id)?;
    let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
    let digit = caps.get(2)?.as_str().chars().next()?;
    Some((letter, digit))
}

fn find_semester(semester_id: &str) -> Option<char> {
    let caps = SEMESTER_PATTERN.captures(semester_id)?;
    caps.get(1)?.as_str().chars().next()
}

fn infer_year_from_codes(grades: &[GradeEntry]) -> Option<(char, char)> {
    grades.iter().find_map(|entry| {
        let caps = SUBJECT_CODE_PATTERN.captures(entry.subject_code.trim())?;
        let digit = caps.get(1)?.as_str().chars().next()?;
        Some(('E', digit))
    })
}

fn fallback_title(semester_id: &str) -> String {
    let title = format!("{} {}", semester_id.trim().to_uppercase(), SUFFIX);
    let doubled = format!("{} {}", SUFFIX, SUFFIX);

    let title = match title.strip_suffix(&doubled) {
        Some(head) => format!("{}{}", head, SUFFIX),
        None => title,
    };
    title.trim().to_string()
}
