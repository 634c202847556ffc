//! Student and grade lookup endpoints
//!
//! Every response recomputes the reconciled record from raw grade rows.
//! Restricted callers (role 0) get the summary grade view, masked student
//! identifiers, and no birth date or birthplace.

use axum::extract::{Path, Query, State};
use axum::Json;
use cohort_common::models::{FullGradeView, GradeRow, Student, SummaryGradeView};
use cohort_common::{calc, codec};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::queries;
use crate::AppState;

use super::auth::CurrentAccount;
use super::ApiError;

/// Classes visible to restricted accounts.
const RESTRICTED_CLASSES: [&str; 2] = ["DHMT16A1HN", "DHMT16A2HN"];

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GradeView {
    Full(FullGradeView),
    Summary(SummaryGradeView),
}

/// One student with the reconciled GPA and annotated grade list.
/// `gpa` keeps the historical name for the 4-point average.
#[derive(Debug, Serialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub full_name: Option<String>,
    pub birth_date: Option<String>,
    pub class_code: Option<String>,
    pub birthplace: Option<String>,
    pub gpa: f64,
    pub gpa10: f64,
    pub total_credits: i64,
    grades: Vec<GradeView>,
}

fn render_student(student: &Student, rows: &[GradeRow], restricted: bool) -> StudentRecord {
    let record = calc::reconcile(rows);

    let grades = record
        .grades
        .iter()
        .map(|g| {
            if restricted {
                GradeView::Summary(SummaryGradeView::from_row(&g.row, g.exclude_from_gpa))
            } else {
                GradeView::Full(FullGradeView::from_row(&g.row, g.exclude_from_gpa))
            }
        })
        .collect();

    StudentRecord {
        student_id: if restricted {
            codec::obfuscate_id(&student.student_id)
        } else {
            student.student_id.clone()
        },
        full_name: student.full_name.clone(),
        birth_date: if restricted {
            None
        } else {
            student.birth_date.clone()
        },
        class_code: student.class_code.clone(),
        birthplace: if restricted {
            None
        } else {
            student.birthplace.clone()
        },
        gpa: record.gpa4,
        gpa10: record.gpa10,
        total_credits: record.total_credits,
        grades,
    }
}

async fn render_students(
    state: &AppState,
    students: &[Student],
    restricted: bool,
) -> Result<Vec<StudentRecord>, ApiError> {
    let ids: Vec<String> = students.iter().map(|s| s.student_id.clone()).collect();
    let grades = queries::grades_for_students(&state.db, &ids).await?;
    Ok(students
        .iter()
        .map(|s| {
            let rows = grades.get(&s.student_id).map(Vec::as_slice).unwrap_or(&[]);
            render_student(s, rows, restricted)
        })
        .collect())
}

/// GET /api/classes
pub async fn get_classes(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<Value>, ApiError> {
    if account.role == 0 {
        return Ok(Json(json!({"classes": RESTRICTED_CLASSES})));
    }
    let classes = queries::distinct_classes(&state.db).await?;
    Ok(Json(json!({"classes": classes})))
}

/// GET /api/class/{class_code}/students. Accepts a comma-separated list of
/// class codes. 404 when no student matches, distinct from an empty search.
pub async fn students_by_class(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(class_code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let class_list: Vec<String> = class_code
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if class_list.is_empty() {
        return Err(ApiError::BadRequest("Invalid class list".to_string()));
    }

    let students = queries::students_in_classes(&state.db, &class_list).await?;
    if students.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No students found for class(es): {class_code}"
        )));
    }

    let records = render_students(&state, &students, account.role == 0).await?;
    Ok(Json(json!({"students": records})))
}

/// GET /api/student/{student_id}. Accepts either a real identifier or an
/// opaque `T_` token from a restricted listing.
pub async fn student_detail(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(student_id): Path<String>,
) -> Result<Json<StudentRecord>, ApiError> {
    let real_id = codec::resolve_id(&student_id);
    let student = queries::student_by_id(&state.db, &real_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
    let rows = queries::grades_for_student(&state.db, &real_id).await?;
    Ok(Json(render_student(&student, &rows, account.role == 0)))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

/// GET /api/search?query= : substring match on name or identifier. An empty
/// result list is a valid answer, not a 404.
pub async fn search(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }

    let students = queries::search_students(&state.db, query).await?;
    let records = render_students(&state, &students, account.role == 0).await?;
    Ok(Json(json!({"results": records})))
}

#[derive(Debug, Deserialize)]
pub struct CountParams {
    pub class_code: Option<String>,
}

/// GET /api/stats/student-count?class_code=
pub async fn student_count(
    State(state): State<AppState>,
    CurrentAccount(_account): CurrentAccount,
    Query(params): Query<CountParams>,
) -> Result<Json<Value>, ApiError> {
    let count = queries::student_count(&state.db, params.class_code.as_deref()).await?;
    Ok(Json(json!({"count": count})))
}
