//! Report composition: turns a queue payload into derived metrics and
//! display-ready rows.
//!
//! Everything here is pure. Numbers are formatted once, at composition time,
//! so templates only ever see strings.

use serde::Serialize;

use crate::queue::{AttendancePayload, ResultPayload, StudentInfo};
use crate::report::title::derive_result_title;

/// Letter grade thresholds, checked top to bottom. Lower bounds are inclusive.
const GRADE_THRESHOLDS: &[(f64, &str)] = &[
    (10.0, "EX"),
    (9.0, "A"),
    (8.0, "B"),
    (7.0, "C"),
    (6.0, "D"),
    (5.0, "E"),
];

/// Letter assigned when no threshold matches (including NaN).
const FAILING_GRADE: &str = "R";

/// Map a grade point onto its letter grade.
pub fn letter_grade(grade_point: f64) -> &'static str {
    GRADE_THRESHOLDS
        .iter()
        .find(|(min, _)| grade_point >= *min)
        .map(|(_, letter)| *letter)
        .unwrap_or(FAILING_GRADE)
}

/// Credit-weighted totals for a result report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMetrics {
    #[serde(serialize_with = "serialize_number")]
    pub total_credits: f64,
    pub earned_points: f64,
    /// Two decimals, `"0.00"` when no credits were attempted
    pub sgpa: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRow {
    pub index: usize,
    pub subject_name: String,
    pub subject_code: String,
    pub credits: String,
    pub grade_point: String,
    pub letter: &'static str,
}

/// Composed result report, ready for the markup template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDocument {
    pub title: String,
    pub student: StudentInfo,
    pub metrics: ResultMetrics,
    pub rows: Vec<GradeRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceMetrics {
    pub total_attended: u64,
    pub total_classes: u64,
    /// Two decimals, `"0.00"` when no classes were held
    pub overall_percent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRow {
    pub index: usize,
    pub subject_name: String,
    pub subject_code: String,
    pub attended_classes: u32,
    pub total_classes: u32,
    /// One decimal, `"0.0"` when the subject held no classes
    pub percent: String,
}

/// Composed attendance report, ready for the markup template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceDocument {
    pub title: String,
    pub student: StudentInfo,
    pub metrics: AttendanceMetrics,
    pub rows: Vec<AttendanceRow>,
}

/// Compose a result report.
///
/// Every entry contributes its credits to the total, but only entries with
/// positive credits earn points, and negative grade points count as zero.
pub fn compose_result(payload: &ResultPayload) -> ResultDocument {
    let mut total_credits = 0.0;
    let mut earned_points = 0.0;

    let rows = payload
        .grades
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            total_credits += entry.credits;
            if entry.credits > 0.0 {
                earned_points += entry.credits * entry.grade_point.max(0.0);
            }

            GradeRow {
                index: i + 1,
                subject_name: entry.subject_name.clone(),
                subject_code: entry.subject_code.clone(),
                credits: format_number(entry.credits),
                grade_point: format_number(entry.grade_point),
                letter: letter_grade(entry.grade_point),
            }
        })
        .collect();

    let sgpa = if total_credits == 0.0 {
        "0.00".to_string()
    } else {
        fixed(earned_points / total_credits, 2)
    };

    ResultDocument {
        title: derive_result_title(&payload.student.semester_id, &payload.grades),
        student: payload.student.clone(),
        metrics: ResultMetrics {
            total_credits,
            earned_points,
            sgpa,
        },
        rows,
    }
}

/// Compose an attendance report.
pub fn compose_attendance(payload: &AttendancePayload) -> AttendanceDocument {
    let mut total_attended: u64 = 0;
    let mut total_classes: u64 = 0;

    let rows = payload
        .records
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            total_attended += u64::from(entry.attended_classes);
            total_classes += u64::from(entry.total_classes);

            AttendanceRow {
                index: i + 1,
                subject_name: entry.subject_name.clone(),
                subject_code: entry.subject_code.clone(),
                attended_classes: entry.attended_classes,
                total_classes: entry.total_classes,
                percent: percent(entry.attended_classes.into(), entry.total_classes.into(), 1),
            }
        })
        .collect();

    AttendanceDocument {
        title: format!(
            "{} ATTENDANCE REPORT",
            payload.student.semester_id.trim().to_uppercase()
        )
        .trim()
        .to_string(),
        student: payload.student.clone(),
        metrics: AttendanceMetrics {
            total_attended,
            total_classes,
            overall_percent: percent(total_attended, total_classes, 2),
        },
        rows,
    }
}

fn percent(part: u64, whole: u64, decimals: usize) -> String {
    if whole == 0 {
        return fixed(0.0, decimals);
    }
    fixed(part as f64 / whole as f64 * 100.0, decimals)
}

/// Format with `decimals` places, rounding ties away from zero.
///
/// `{:.N}` alone rounds exact ties to even, which turns 8.125 into "8.12".
fn fixed(value: f64, decimals: usize) -> String {
    let scale = 10f64.powi(decimals as i32);
    format!("{:.*}", decimals, (value * scale).round() / scale)
}

fn serialize_number<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_number(*value))
}

/// Render whole numbers without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{AttendanceEntry, GradeEntry};

    fn student(semester_id: &str) -> StudentInfo {
        StudentInfo {
            name: "Asha".to_string(),
            username: "r200123".to_string(),
            branch: "CSE".to_string(),
            semester_id: semester_id.to_string(),
            campus: "RK Valley".to_string(),
        }
    }

    fn grade(code: &str, credits: f64, grade_point: f64) -> GradeEntry {
        GradeEntry {
            subject_name: format!("Subject {}", code),
            subject_code: code.to_string(),
            credits,
            grade_point,
        }
    }

    fn record(attended: u32, total: u32) -> AttendanceEntry {
        AttendanceEntry {
            subject_name: "Operating Systems".to_string(),
            subject_code: "CS2102".to_string(),
            attended_classes: attended,
            total_classes: total,
        }
    }

    #[test]
    fn test_letter_grade_boundaries() {
        assert_eq!(letter_grade(10.0), "EX");
        assert_eq!(letter_grade(12.5), "EX");
        assert_eq!(letter_grade(9.99), "A");
        assert_eq!(letter_grade(9.0), "A");
        assert_eq!(letter_grade(8.0), "B");
        assert_eq!(letter_grade(7.0), "C");
        assert_eq!(letter_grade(6.0), "D");
        assert_eq!(letter_grade(5.0), "E");
        assert_eq!(letter_grade(4.99), "R");
        assert_eq!(letter_grade(-3.0), "R");
        assert_eq!(letter_grade(f64::NAN), "R");
    }

    #[test]
    fn test_compose_result_weighted_sgpa() {
        let payload = ResultPayload {
            student: student("E2 Sem 1"),
            grades: vec![grade("CS2101", 4.0, 9.0), grade("CS2102", 3.0, 7.0)],
        };

        let doc = compose_result(&payload);

        assert_eq!(doc.metrics.total_credits, 7.0);
        assert_eq!(doc.metrics.earned_points, 57.0);
        assert_eq!(doc.metrics.sgpa, "8.14");
        assert_eq!(doc.rows[0].letter, "A");
        assert_eq!(doc.rows[1].letter, "C");
        assert_eq!(doc.rows[1].index, 2);
        assert_eq!(doc.rows[0].credits, "4");
    }

    #[test]
    fn test_compose_result_zero_credits() {
        let payload = ResultPayload {
            student: student("E2 Sem 1"),
            grades: vec![grade("CS2101", 0.0, 9.0)],
        };

        let doc = compose_result(&payload);
        assert_eq!(doc.metrics.sgpa, "0.00");
        assert_eq!(doc.metrics.earned_points, 0.0);
    }

    #[test]
    fn test_compose_result_negative_grade_point_earns_nothing() {
        let payload = ResultPayload {
            student: student("E2 Sem 1"),
            grades: vec![grade("CS2101", 4.0, -1.0), grade("CS2102", 4.0, 10.0)],
        };

        let doc = compose_result(&payload);
        assert_eq!(doc.metrics.earned_points, 40.0);
        assert_eq!(doc.metrics.sgpa, "5.00");
    }

    #[test]
    fn test_compose_result_empty_grades() {
        let payload = ResultPayload {
            student: student(""),
            grades: vec![],
        };

        let doc = compose_result(&payload);
        assert_eq!(doc.metrics.sgpa, "0.00");
        assert!(doc.rows.is_empty());
    }

    #[test]
    fn test_compose_attendance_percentages() {
        let payload = AttendancePayload {
            student: student("E2S1"),
            records: vec![record(45, 60)],
        };

        let doc = compose_attendance(&payload);
        assert_eq!(doc.rows[0].percent, "75.0");
        assert_eq!(doc.metrics.overall_percent, "75.00");
        assert_eq!(doc.metrics.total_attended, 45);
        assert_eq!(doc.metrics.total_classes, 60);
        assert_eq!(doc.title, "E2S1 ATTENDANCE REPORT");
    }

    #[test]
    fn test_compose_attendance_zero_classes() {
        let payload = AttendancePayload {
            student: student("E2S1"),
            records: vec![record(0, 0), record(0, 0)],
        };

        let doc = compose_attendance(&payload);
        assert_eq!(doc.rows[0].percent, "0.0");
        assert_eq!(doc.metrics.overall_percent, "0.00");
    }

    #[test]
    fn test_compose_attendance_mixed_totals() {
        let payload = AttendancePayload {
            student: student("E2S1"),
            records: vec![record(30, 40), record(0, 0), record(10, 20)],
        };

        let doc = compose_attendance(&payload);
        assert_eq!(doc.rows[1].percent, "0.0");
        assert_eq!(doc.rows[2].percent, "50.0");
        assert_eq!(doc.metrics.overall_percent, "66.67");
    }

    #[test]
    fn test_sgpa_rounds_ties_up() {
        // 65 / 8 = 8.125 exactly
        let payload = ResultPayload {
            student: student("E2 Sem 1"),
            grades: vec![
                grade("CS2101", 3.0, 8.0),
                grade("CS2102", 3.0, 8.0),
                grade("CS2103", 1.0, 9.0),
                grade("CS2104", 1.0, 8.0),
            ],
        };

        assert_eq!(compose_result(&payload).metrics.sgpa, "8.13");
    }

    #[test]
    fn test_attendance_rounds_ties_up() {
        let payload = AttendancePayload {
            student: student("E2S1"),
            records: vec![record(1, 16)],
        };
        let doc = compose_attendance(&payload);
        assert_eq!(doc.rows[0].percent, "6.3");
        assert_eq!(doc.metrics.overall_percent, "6.25");

        let payload = AttendancePayload {
            student: student("E2S1"),
            records: vec![record(1, 32)],
        };
        let doc = compose_attendance(&payload);
        assert_eq!(doc.rows[0].percent, "3.1");
        assert_eq!(doc.metrics.overall_percent, "3.13");
    }

    #[test]
    fn test_fixed_formatting() {
        assert_eq!(fixed(8.125, 2), "8.13");
        assert_eq!(fixed(6.25, 1), "6.3");
        assert_eq!(fixed(0.0, 2), "0.00");
        assert_eq!(fixed(100.0, 1), "100.0");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: every grade point maps to exactly one threshold band.
            #[test]
            fn letter_grade_partitions_the_line(gp in -100.0f64..100.0) {
                let letter = letter_grade(gp);
                let expected = if gp >= 10.0 { "EX" }
                    else if gp >= 9.0 { "A" }
                    else if gp >= 8.0 { "B" }
                    else if gp >= 7.0 { "C" }
                    else if gp >= 6.0 { "D" }
                    else if gp >= 5.0 { "E" }
                    else { "R" };
                prop_assert_eq!(letter, expected);
            }

            /// Property: zero total credits always yields "0.00".
            #[test]
            fn zero_credits_yield_zero_sgpa(points in proptest::collection::vec(-5.0f64..15.0, 0..8)) {
                let payload = ResultPayload {
                    student: student("E1 Sem 2"),
                    grades: points.iter().map(|gp| grade("CS1101", 0.0, *gp)).collect(),
                };
                prop_assert_eq!(compose_result(&payload).metrics.sgpa, "0.00");
            }

            /// Property: subjects that held no classes always show "0.0".
            #[test]
            fn zero_total_classes_yield_zero_percent(n in 1usize..6) {
                let payload = AttendancePayload {
                    student: student("E1 Sem 2"),
                    records: (0..n).map(|_| record(0, 0)).collect(),
                };
                let doc = compose_attendance(&payload);
                prop_assert_eq!(doc.metrics.overall_percent, "0.00");
                prop_assert!(doc.rows.iter().all(|row| row.percent == "0.0"));
            }
        }
    }
}
