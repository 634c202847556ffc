//! Academic-record reconciliation
//!
//! Grade rows arrive from upstream imports duplicated (retakes), stringly
//! typed and inconsistently scaled. Everything here recomputes the canonical
//! per-student summary from the raw rows on every read; stored summary
//! columns are never trusted. All functions are pure and side-effect free,
//! so concurrent calls need no coordination.

use crate::models::GradeRow;
use std::collections::HashMap;

/// Subject codes that never count toward GPA (placement/entrance test
/// imports).
const EXCLUDED_SUBJECT_CODES: [&str; 3] = ["0101000515", "0101000509", "0101000518"];

/// Lower-cased subject-name fragments that mark a row as non-academic.
/// Diacritic and ASCII-folded spellings are both listed because the import
/// source is inconsistent about Vietnamese diacritics.
const EXCLUDED_NAME_KEYWORDS: [&str; 15] = [
    "giáo dục thể chất",
    "gdtc",
    "giáo dục quốc phòng",
    "gdqp",
    "thể dục",
    "toeic",
    "tiếng anh đầu vào",
    "tieng anh dau vao",
    "english placement",
    "xếp lớp tiếng anh",
    "xep lop tieng anh",
    "kiểm tra đầu vào tiếng anh",
    "kiem tra dau vao tieng anh",
    "điểm test tiếng anh đầu vào",
    "diem test tieng anh dau vao",
];

/// Canonical per-student record, recomputed on every read.
#[derive(Debug, Clone)]
pub struct ReconciledRecord {
    /// Credit-weighted 10-point GPA, rounded to 2 decimals. 0.0 when no
    /// usable rows exist.
    pub gpa10: f64,
    /// Credit-weighted 4-point GPA, rounded to 2 decimals.
    pub gpa4: f64,
    /// Sum of credits across the latest attempt of each counted subject.
    pub total_credits: i64,
    /// Every raw row in insertion order (excluded rows included), each
    /// carrying its exclusion verdict.
    pub grades: Vec<AnnotatedGrade>,
}

/// A raw grade row annotated with its GPA-exclusion verdict.
#[derive(Debug, Clone)]
pub struct AnnotatedGrade {
    pub row: GradeRow,
    pub exclude_from_gpa: bool,
}

/// Latest counted attempt for one dedup key.
struct Attempt {
    score10: f64,
    score4: f64,
    credits: i64,
}

/// Parse a free-text decimal defensively. Accepts comma as the decimal
/// separator; empty or non-numeric text is absent, not an error.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let text = raw.trim().replace(',', ".");
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok()
}

/// Parse and clamp a (10-point, 4-point) score pair into consistent scales.
///
/// Out-of-range values are rejected to absent. When exactly one scale is
/// present the other is derived linearly (`s4 = s10 * 4 / 10` and the
/// inverse). Both absent means the row is unusable for GPA.
pub fn normalize_scores(
    raw10: Option<&str>,
    raw4: Option<&str>,
) -> (Option<f64>, Option<f64>) {
    let mut s10 = raw10.and_then(parse_decimal);
    let mut s4 = raw4.and_then(parse_decimal);

    if let Some(v) = s10 {
        if !(0.0..=10.0).contains(&v) {
            s10 = None;
        }
    }
    if let Some(v) = s4 {
        if !(0.0..=4.0).contains(&v) {
            s4 = None;
        }
    }

    match (s10, s4) {
        (Some(a), None) => (Some(a), Some(a * 4.0 / 10.0)),
        (None, Some(b)) => (Some(b * 10.0 / 4.0), Some(b)),
        other => other,
    }
}

/// Parse a free-text credit count. Truncates fractional credits; anything
/// unparseable is 0 (and the row degrades to excluded).
pub fn parse_credits(raw: Option<&str>) -> i64 {
    raw.and_then(parse_decimal).map(|v| v as i64).unwrap_or(0)
}

/// Decide whether a grade row is excluded from GPA. True when ANY of:
///
/// 1. its trimmed subject code is in the fixed blacklist;
/// 2. its trimmed, lower-cased subject name contains a blacklisted keyword;
/// 3. its raw (unclamped) 10-point score parses above 10, a value only
///    non-academic raw imports can produce.
///
/// The verdict is reported per row in the output even when full grade
/// detail is hidden.
pub fn is_excluded(row: &GradeRow) -> bool {
    let code = row.subject_code.as_deref().unwrap_or("").trim();
    if EXCLUDED_SUBJECT_CODES.contains(&code) {
        return true;
    }

    let name = row
        .subject_name
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    if !name.is_empty() && EXCLUDED_NAME_KEYWORDS.iter().any(|kw| name.contains(kw)) {
        return true;
    }

    if let Some(s10) = row.final_10.as_deref().and_then(parse_decimal) {
        if s10 > 10.0 {
            return true;
        }
    }

    false
}

/// Dedup key for retake handling: the trimmed subject code when present,
/// otherwise a synthetic key from the trimmed, lower-cased subject name.
fn dedup_key(row: &GradeRow) -> String {
    let code = row.subject_code.as_deref().unwrap_or("").trim();
    if !code.is_empty() {
        return code.to_string();
    }
    format!(
        "NAME_{}",
        row.subject_name.as_deref().unwrap_or("").trim().to_lowercase()
    )
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Reconcile a student's full grade-row set into the canonical record.
///
/// Rows are processed oldest to newest (ascending insertion id); the map
/// insert for a dedup key always overwrites, so the latest attempt wins
/// without any score comparison. Excluded rows, zero/negative credits and
/// rows with no usable 10-point score are skipped from the totals but still
/// appear, annotated, in the grade list.
pub fn reconcile(rows: &[GradeRow]) -> ReconciledRecord {
    let mut ordered: Vec<&GradeRow> = rows.iter().collect();
    ordered.sort_by_key(|r| r.id);

    let mut latest: HashMap<String, Attempt> = HashMap::new();
    for row in &ordered {
        if is_excluded(row) {
            continue;
        }
        let (score10, score4) =
            normalize_scores(row.final_10.as_deref(), row.final_4.as_deref());
        let credits = parse_credits(row.credits.as_deref());
        let (Some(score10), Some(score4)) = (score10, score4) else {
            continue;
        };
        if credits <= 0 {
            continue;
        }
        latest.insert(
            dedup_key(row),
            Attempt {
                score10,
                score4,
                credits,
            },
        );
    }

    let total_credits: i64 = latest.values().map(|a| a.credits).sum();
    let (gpa10, gpa4) = if total_credits > 0 {
        let points10: f64 = latest
            .values()
            .map(|a| a.score10 * a.credits as f64)
            .sum();
        let points4: f64 = latest.values().map(|a| a.score4 * a.credits as f64).sum();
        (
            round2(points10 / total_credits as f64),
            round2(points4 / total_credits as f64),
        )
    } else {
        (0.0, 0.0)
    };

    let grades = ordered
        .into_iter()
        .map(|row| AnnotatedGrade {
            exclude_from_gpa: is_excluded(row),
            row: row.clone(),
        })
        .collect();

    ReconciledRecord {
        gpa10,
        gpa4,
        total_credits,
        grades,
    }
}
