//! Query layer over the students / grade_rows / accounts tables
//!
//! Grade loads always fetch the student's full row set in one query; the
//! reconciler expects the whole collection up front.

use cohort_common::models::{AccessDay, Account, GradeRow, Student};
use cohort_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

const STUDENT_COLUMNS: &str =
    "student_id, full_name, birth_date, class_code, birthplace";

const GRADE_COLUMNS: &str = "id, student_id, subject_code, subject_name, term, credits, \
     attendance, coef1_1, coef1_2, coef1_3, coef1_4, coef2_1, coef2_2, coef2_3, coef2_4, \
     practical_1, practical_2, periodic_avg, exam_eligible, exam_score, final_10, final_4, \
     letter_grade, classification, result, term_avg_10, term_avg_4, cum_avg_10, cum_avg_4, \
     data_source";

const ACCOUNT_COLUMNS: &str =
    "id, username, password_hash, role, created_at, reset_limit_at";

/// Distinct, trimmed class codes in ascending order.
pub async fn distinct_classes(pool: &SqlitePool) -> Result<Vec<String>> {
    let classes: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT TRIM(class_code) FROM students
         WHERE class_code IS NOT NULL AND TRIM(class_code) <> ''
         ORDER BY TRIM(class_code)",
    )
    .fetch_all(pool)
    .await?;
    Ok(classes.into_iter().map(|(c,)| c).collect())
}

pub async fn student_by_id(pool: &SqlitePool, student_id: &str) -> Result<Option<Student>> {
    let student = sqlx::query_as::<_, Student>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?"
    ))
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(student)
}

/// All grade rows for one student, oldest insertion first.
pub async fn grades_for_student(pool: &SqlitePool, student_id: &str) -> Result<Vec<GradeRow>> {
    let rows = sqlx::query_as::<_, GradeRow>(&format!(
        "SELECT {GRADE_COLUMNS} FROM grade_rows WHERE student_id = ? ORDER BY id"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Students whose trimmed class code matches any of `classes`, ordered by id.
pub async fn students_in_classes(
    pool: &SqlitePool,
    classes: &[String],
) -> Result<Vec<Student>> {
    if classes.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = sqlx::QueryBuilder::new(format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE TRIM(class_code) IN ("
    ));
    let mut separated = qb.separated(", ");
    for class in classes {
        separated.push_bind(class);
    }
    separated.push_unseparated(")");
    qb.push(" ORDER BY student_id");

    let students = qb.build_query_as::<Student>().fetch_all(pool).await?;
    Ok(students)
}

/// Grade rows for a set of students in one round trip, grouped per student.
pub async fn grades_for_students(
    pool: &SqlitePool,
    student_ids: &[String],
) -> Result<HashMap<String, Vec<GradeRow>>> {
    if student_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut qb = sqlx::QueryBuilder::new(format!(
        "SELECT {GRADE_COLUMNS} FROM grade_rows WHERE student_id IN ("
    ));
    let mut separated = qb.separated(", ");
    for id in student_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
    qb.push(" ORDER BY id");

    let rows = qb.build_query_as::<GradeRow>().fetch_all(pool).await?;

    let mut grouped: HashMap<String, Vec<GradeRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.student_id.clone()).or_default().push(row);
    }
    Ok(grouped)
}

/// Case-insensitive substring search over name and identifier, capped at 50.
pub async fn search_students(pool: &SqlitePool, query: &str) -> Result<Vec<Student>> {
    let pattern = format!("%{query}%");
    let students = sqlx::query_as::<_, Student>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students
         WHERE full_name LIKE ? OR student_id LIKE ?
         ORDER BY student_id LIMIT 50"
    ))
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;
    Ok(students)
}

pub async fn student_count(pool: &SqlitePool, class_code: Option<&str>) -> Result<i64> {
    let count: i64 = match class_code {
        Some(class) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM students WHERE TRIM(class_code) = TRIM(?)",
            )
            .bind(class)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM students")
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}

pub async fn account_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Account>> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

pub async fn account_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Account>> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

pub async fn create_account(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    role: i64,
) -> Result<()> {
    sqlx::query("INSERT INTO accounts (username, password_hash, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_accounts(pool: &SqlitePool) -> Result<Vec<Account>> {
    let accounts = sqlx::query_as::<_, Account>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(accounts)
}

pub async fn set_reset_limit(pool: &SqlitePool, id: i64, timestamp: &str) -> Result<()> {
    sqlx::query("UPDATE accounts SET reset_limit_at = ? WHERE id = ?")
        .bind(timestamp)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Per-day access counters for an account since `since_date` (inclusive),
/// newest first.
pub async fn access_history(
    pool: &SqlitePool,
    account_id: i64,
    since_date: &str,
) -> Result<Vec<AccessDay>> {
    let history = sqlx::query_as::<_, AccessDay>(
        "SELECT access_date, count FROM account_access
         WHERE account_id = ? AND access_date >= ?
         ORDER BY access_date DESC",
    )
    .bind(account_id)
    .bind(since_date)
    .fetch_all(pool)
    .await?;
    Ok(history)
}

/// Bump today's access counter for an account.
pub async fn bump_access(pool: &SqlitePool, account_id: i64, date: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO account_access (account_id, access_date, count) VALUES (?, ?, 1)
         ON CONFLICT(account_id, access_date) DO UPDATE SET count = count + 1",
    )
    .bind(account_id)
    .bind(date)
    .execute(pool)
    .await?;
    Ok(())
}
