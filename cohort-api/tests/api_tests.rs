//! Integration tests for the cohort-api endpoints
//!
//! Each test builds the full router over an in-memory SQLite database
//! seeded with a small cohort, then drives it through tower's `oneshot`.
//! The payload shield is disabled by the test config except where the
//! shield itself is under test.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use cohort_api::{build_router, config::Config, db, AppState};
use cohort_common::{auth, codec};
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tower::util::ServiceExt; // for `oneshot`

/// Test helper: in-memory database with schema and seed data.
///
/// One connection only: each in-memory SQLite connection is its own
/// database, so a pool of several would see an empty schema.
async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");

    db::init_schema(&pool).await.expect("Should create schema");
    db::seed_admin(&pool, "admin123")
        .await
        .expect("Should seed admin");

    // Restricted account
    sqlx::query("INSERT INTO accounts (username, password_hash, role) VALUES (?, ?, 0)")
        .bind("guest")
        .bind(auth::hash_password("guest123"))
        .execute(&pool)
        .await
        .unwrap();

    for (id, name, birth, class, place) in [
        ("SV001", "Nguyen Van A", "2004-01-15", "DHMT16A1HN", "Ha Noi"),
        ("SV002", "Tran Thi B", "2004-06-02", "DHMT16A2HN", "Hai Phong"),
        ("SV003", "Le Van C", "2003-11-20", "OTHER01", "Nam Dinh"),
    ] {
        sqlx::query(
            "INSERT INTO students (student_id, full_name, birth_date, class_code, birthplace)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(birth)
        .bind(class)
        .bind(place)
        .execute(&pool)
        .await
        .unwrap();
    }

    // SV001's transcript, in import order:
    //   C101 first attempt (failed), a PE row (GPA-excluded), the C101
    //   retake (authoritative), and a math row with a comma decimal.
    let rows = [
        ("SV001", "C101", "Lap trinh C", "20231", "3", "4.0", "1.0"),
        ("SV001", "0101000515", "Giao duc the chat 1", "20231", "1", "9.0", "4.0"),
        ("SV001", "C101", "Lap trinh C", "20232", "3", "8.5", "3.7"),
        ("SV001", "MATH2", "Giai tich 2", "20232", "2", "7,5", "3.0"),
        ("SV002", "C101", "Lap trinh C", "20231", "3", "9.0", "4.0"),
    ];
    for (sid, code, name, term, credits, f10, f4) in rows {
        sqlx::query(
            "INSERT INTO grade_rows
             (student_id, subject_code, subject_name, term, credits, final_10, final_4)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(sid)
        .bind(code)
        .bind(name)
        .bind(term)
        .bind(credits)
        .bind(f10)
        .bind(f4)
        .execute(&pool)
        .await
        .unwrap();
    }

    pool
}

fn setup_app(pool: SqlitePool) -> axum::Router {
    build_router(AppState::new(pool, Config::for_tests()))
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Log in through the API and return the bearer token.
async fn login(app: &axum::Router, username: &str, password: &str) -> String {
    let request = post_json(
        "/api/login",
        None,
        &json!({"username": username, "password": password}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    body["access_token"].as_str().unwrap().to_string()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = setup_app(setup_test_db().await);

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cohort-api");
    assert!(body["version"].is_string());
}

// =============================================================================
// Login / register / me
// =============================================================================

#[tokio::test]
async fn test_login_issues_token_with_role() {
    let app = setup_app(setup_test_db().await);

    let request = post_json(
        "/api/login",
        None,
        &json!({"username": "admin", "password": "admin123"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["role"], 1);
    assert!(body["access_token"].is_string());
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let app = setup_app(setup_test_db().await);

    let request = post_json(
        "/api/login",
        None,
        &json!({"username": "admin", "password": "wrong"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_then_login() {
    let app = setup_app(setup_test_db().await);

    let request = post_json(
        "/api/register",
        None,
        &json!({"username": "newuser", "password": "pass1234"}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token = login(&app, "newuser", "pass1234").await;
    let response = app.oneshot(get("/api/me", Some(&token))).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["u"], "newuser");
    assert_eq!(body["r"], 0); // new accounts start restricted
}

#[tokio::test]
async fn test_register_rejects_duplicate_username() {
    let app = setup_app(setup_test_db().await);

    let request = post_json(
        "/api/register",
        None,
        &json!({"username": "admin", "password": "whatever"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = setup_app(setup_test_db().await);

    let response = app.clone().oneshot(get("/api/me", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get("/api/me", Some("garbage"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Classes
// =============================================================================

#[tokio::test]
async fn test_classes_admin_sees_all() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app.oneshot(get("/api/classes", Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let classes: Vec<&str> = body["classes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert_eq!(classes, vec!["DHMT16A1HN", "DHMT16A2HN", "OTHER01"]);
}

#[tokio::test]
async fn test_classes_restricted_sees_fixed_list() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "guest", "guest123").await;

    let response = app.oneshot(get("/api/classes", Some(&token))).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["classes"], json!(["DHMT16A1HN", "DHMT16A2HN"]));
}

// =============================================================================
// Class listing and student detail
// =============================================================================

#[tokio::test]
async fn test_class_students_admin_gets_real_ids() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .oneshot(get("/api/class/DHMT16A1HN/students", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let students = body["students"].as_array().unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["student_id"], "SV001");
    assert_eq!(students[0]["birth_date"], "2004-01-15");
    assert_eq!(students[0]["birthplace"], "Ha Noi");
}

#[tokio::test]
async fn test_class_students_accepts_comma_list() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .oneshot(get("/api/class/DHMT16A1HN,DHMT16A2HN/students", Some(&token)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["students"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_class_students_unknown_class_is_404() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .oneshot(get("/api/class/NOPE99/students", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_restricted_listing_masks_identity() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "guest", "guest123").await;

    let response = app
        .clone()
        .oneshot(get("/api/class/DHMT16A1HN/students", Some(&token)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    let student = &body["students"][0];

    let masked = student["student_id"].as_str().unwrap();
    assert!(masked.starts_with("T_"));
    assert_eq!(codec::resolve_id(masked), "SV001");
    assert!(student["birth_date"].is_null());
    assert!(student["birthplace"].is_null());

    // Restricted grade rows carry the summary fields only
    let grade = &student["grades"][0];
    assert!(grade.get("attendance").is_none());
    assert!(grade["final_10"].is_string());

    // The opaque token is a usable detail-lookup key
    let response = app
        .oneshot(get(&format!("/api/student/{masked}"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_student_detail_reconciles_gpa() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .oneshot(get("/api/student/SV001", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    // Retake of C101 (8.5 / 3.7, 3cr) replaces the failed first attempt;
    // the PE row is excluded; MATH2's "7,5" parses as 7.5 (3.0, 2cr).
    assert_eq!(body["gpa"], 3.42);
    assert_eq!(body["gpa10"], 8.1);
    assert_eq!(body["total_credits"], 5);

    // All rows are still listed; only the verdict differs
    let grades = body["grades"].as_array().unwrap();
    assert_eq!(grades.len(), 4);
    let pe = grades
        .iter()
        .find(|g| g["subject_code"] == "0101000515")
        .unwrap();
    assert_eq!(pe["exclude_from_gpa"], true);
    let math = grades.iter().find(|g| g["subject_code"] == "MATH2").unwrap();
    assert_eq!(math["exclude_from_gpa"], false);
}

#[tokio::test]
async fn test_student_detail_unknown_is_404() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .oneshot(get("/api/student/SV999", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Search and counts
// =============================================================================

#[tokio::test]
async fn test_search_matches_name_substring() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .oneshot(get("/api/search?query=Nguyen", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["student_id"], "SV001");
}

#[tokio::test]
async fn test_search_no_match_is_empty_not_404() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .oneshot(get("/api/search?query=zzzzz", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn test_search_blank_query_is_400() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .oneshot(get("/api/search?query=%20%20", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_student_count_with_and_without_class() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    let response = app
        .clone()
        .oneshot(get("/api/stats/student-count", Some(&token)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 3);

    let response = app
        .oneshot(get(
            "/api/stats/student-count?class_code=DHMT16A2HN",
            Some(&token),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
}

// =============================================================================
// Online users and admin endpoints
// =============================================================================

#[tokio::test]
async fn test_online_users_open_to_anonymous() {
    let app = setup_app(setup_test_db().await);

    let response = app
        .oneshot(get("/api/stats/online-users", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // No sockets connected: heartbeat fallback, floored at 1
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_admin_users_forbidden_for_restricted() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "guest", "guest123").await;

    let response = app
        .oneshot(get("/api/admin/users", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_users_lists_accounts_with_history() {
    let app = setup_app(setup_test_db().await);
    let token = login(&app, "admin", "admin123").await;

    // The authenticated listing call itself bumps today's counter
    let response = app
        .oneshot(get("/api/admin/users", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 2);

    let admin = users.iter().find(|u| u["username"] == "admin").unwrap();
    assert_eq!(admin["role"], 1);
    assert!(admin["access_history"].is_array());
}

#[tokio::test]
async fn test_reset_limit_stamps_account() {
    let pool = setup_test_db().await;
    let app = setup_app(pool.clone());
    let token = login(&app, "admin", "admin123").await;

    let guest_id: i64 = sqlx::query_scalar("SELECT id FROM accounts WHERE username = 'guest'")
        .fetch_one(&pool)
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/admin/user/{guest_id}/reset-limit"),
            Some(&token),
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stamped: Option<String> =
        sqlx::query_scalar("SELECT reset_limit_at FROM accounts WHERE id = ?")
            .bind(guest_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(stamped.is_some());

    // Unknown account
    let response = app
        .oneshot(post_json(
            "/api/admin/user/9999/reset-limit",
            Some(&token),
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Payload shield
// =============================================================================

#[tokio::test]
async fn test_shield_wraps_api_responses_when_enabled() {
    let pool = setup_test_db().await;
    let mut config = Config::for_tests();
    config.shield = true;
    let app = build_router(AppState::new(pool, config));

    let request = post_json(
        "/api/login",
        None,
        &json!({"username": "admin", "password": "admin123"}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let wrapped = body["shield"].as_str().expect("response should be shielded");
    let inner = codec::deobfuscate_payload(wrapped).expect("shield token should decode");
    assert_eq!(inner["token_type"], "bearer");
    assert!(inner["access_token"].is_string());

    // Errors pass through unshielded
    let request = post_json(
        "/api/login",
        None,
        &json!({"username": "admin", "password": "wrong"}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert!(body.get("shield").is_none());
    assert!(body["error"].is_string());

    // /health sits outside the shielded subtree
    let response = app.oneshot(get("/health", None)).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
}
