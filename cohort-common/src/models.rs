//! Database models and API view types
//!
//! Every numeric-looking grade field is stored as free text by the upstream
//! import and must be parsed defensively (see [`crate::calc`]). Absence or
//! malformed text is never an error at this layer.

use serde::{Deserialize, Serialize};

/// A student record. `student_id` is the stable, unique identifier shown to
/// admin callers and masked for restricted roles.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub student_id: String,
    pub full_name: Option<String>,
    pub birth_date: Option<String>,
    pub class_code: Option<String>,
    pub birthplace: Option<String>,
}

/// One raw grade row as imported.
///
/// `id` is the monotonically increasing insertion identifier; among rows for
/// the same subject the greatest `id` is the latest attempt and is
/// authoritative. It orders retakes and is never displayed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct GradeRow {
    pub id: i64,
    pub student_id: String,
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub term: Option<String>,
    pub credits: Option<String>,
    pub attendance: Option<String>,
    pub coef1_1: Option<String>,
    pub coef1_2: Option<String>,
    pub coef1_3: Option<String>,
    pub coef1_4: Option<String>,
    pub coef2_1: Option<String>,
    pub coef2_2: Option<String>,
    pub coef2_3: Option<String>,
    pub coef2_4: Option<String>,
    pub practical_1: Option<String>,
    pub practical_2: Option<String>,
    pub periodic_avg: Option<String>,
    pub exam_eligible: Option<String>,
    pub exam_score: Option<String>,
    pub final_10: Option<String>,
    pub final_4: Option<String>,
    pub letter_grade: Option<String>,
    pub classification: Option<String>,
    pub result: Option<String>,
    pub term_avg_10: Option<String>,
    pub term_avg_4: Option<String>,
    pub cum_avg_10: Option<String>,
    pub cum_avg_4: Option<String>,
    pub data_source: Option<String>,
}

/// A login account. Role 0 = restricted (guest), 1 = admin.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: i64,
    pub created_at: Option<String>,
    pub reset_limit_at: Option<String>,
}

/// One day of access-counter history for an account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccessDay {
    pub access_date: String,
    pub count: i64,
}

/// Full per-row grade view: every stored component sub-score plus the
/// exclusion verdict. Served to unrestricted roles only.
#[derive(Debug, Clone, Serialize)]
pub struct FullGradeView {
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub term: Option<String>,
    pub credits: Option<String>,
    pub attendance: Option<String>,
    pub coef1_1: Option<String>,
    pub coef1_2: Option<String>,
    pub coef1_3: Option<String>,
    pub coef1_4: Option<String>,
    pub coef2_1: Option<String>,
    pub coef2_2: Option<String>,
    pub coef2_3: Option<String>,
    pub coef2_4: Option<String>,
    pub practical_1: Option<String>,
    pub practical_2: Option<String>,
    pub periodic_avg: Option<String>,
    pub exam_eligible: Option<String>,
    pub exam_score: Option<String>,
    pub final_10: Option<String>,
    pub final_4: Option<String>,
    pub letter_grade: Option<String>,
    pub classification: Option<String>,
    pub result: Option<String>,
    pub term_avg_10: Option<String>,
    pub term_avg_4: Option<String>,
    pub cum_avg_10: Option<String>,
    pub cum_avg_4: Option<String>,
    pub data_source: Option<String>,
    pub exclude_from_gpa: bool,
}

/// Reduced per-row grade view for restricted roles. The exclusion verdict is
/// still reported so callers can explain why a row was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryGradeView {
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub term: Option<String>,
    pub credits: Option<String>,
    pub final_10: Option<String>,
    pub final_4: Option<String>,
    pub data_source: Option<String>,
    pub exclude_from_gpa: bool,
}

impl FullGradeView {
    pub fn from_row(row: &GradeRow, exclude_from_gpa: bool) -> Self {
        Self {
            subject_code: row.subject_code.clone(),
            subject_name: row.subject_name.clone(),
            term: row.term.clone(),
            credits: row.credits.clone(),
            attendance: row.attendance.clone(),
            coef1_1: row.coef1_1.clone(),
            coef1_2: row.coef1_2.clone(),
            coef1_3: row.coef1_3.clone(),
            coef1_4: row.coef1_4.clone(),
            coef2_1: row.coef2_1.clone(),
            coef2_2: row.coef2_2.clone(),
            coef2_3: row.coef2_3.clone(),
            coef2_4: row.coef2_4.clone(),
            practical_1: row.practical_1.clone(),
            practical_2: row.practical_2.clone(),
            periodic_avg: row.periodic_avg.clone(),
            exam_eligible: row.exam_eligible.clone(),
            exam_score: row.exam_score.clone(),
            final_10: row.final_10.clone(),
            final_4: row.final_4.clone(),
            letter_grade: row.letter_grade.clone(),
            classification: row.classification.clone(),
            result: row.result.clone(),
            term_avg_10: row.term_avg_10.clone(),
            term_avg_4: row.term_avg_4.clone(),
            cum_avg_10: row.cum_avg_10.clone(),
            cum_avg_4: row.cum_avg_4.clone(),
            data_source: row.data_source.clone(),
            exclude_from_gpa,
        }
    }
}

impl SummaryGradeView {
    pub fn from_row(row: &GradeRow, exclude_from_gpa: bool) -> Self {
        Self {
            subject_code: row.subject_code.clone(),
            subject_name: row.subject_name.clone(),
            term: row.term.clone(),
            credits: row.credits.clone(),
            final_10: row.final_10.clone(),
            final_4: row.final_4.clone(),
            data_source: row.data_source.clone(),
            exclude_from_gpa,
        }
    }
}
