mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::{seed_booking, setup, slot_holder, TestContext};

fn app(ctx: &TestContext, config: &TestConfig) -> Router {
    appointment_routes(config.to_arc(), ctx.service.clone())
}

fn token_for(user: &TestUser, config: &TestConfig) -> String {
    JwtTestUtils::create_test_token(user, &config.jwt_secret, None)
}

async fn send(app: Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let ctx = setup().await;
    let config = TestConfig::default();

    let (status, _) = send(app(&ctx, &config), "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = JwtTestUtils::create_expired_token(&TestUser::admin("a@example.com"), &config.jwt_secret);
    let (status, _) = send(app(&ctx, &config), "GET", "/", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_receptionist_assigns_doctor() {
    let ctx = setup().await;
    let config = TestConfig::default();
    seed_booking(&ctx.store, "apt1", None, "09:00").await;
    let receptionist = TestUser::receptionist("desk@example.com").in_hospital("h1");

    let (status, body) = send(
        app(&ctx, &config),
        "PUT",
        "/apt1",
        Some(&token_for(&receptionist, &config)),
        Some(json!({ "doctor_id": "d1", "send_notification": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");
    assert_eq!(body["appointment"]["pending_assignment"], false);
    assert_eq!(body["slot"]["change"], "moved");
    assert_eq!(body["notification"]["status"], "not_requested");
    assert_eq!(
        slot_holder(&ctx.store, "d1_2024-01-15_09-00").await.as_deref(),
        Some("apt1")
    );
}

#[tokio::test]
async fn test_slot_conflict_is_409() {
    let ctx = setup().await;
    let config = TestConfig::default();
    seed_booking(&ctx.store, "apt1", Some("d1"), "09:00").await;
    seed_booking(&ctx.store, "apt2", None, "09:00").await;
    let receptionist = TestUser::receptionist("desk@example.com").in_hospital("h1");

    let (status, body) = send(
        app(&ctx, &config),
        "PUT",
        "/apt2",
        Some(&token_for(&receptionist, &config)),
        Some(json!({ "doctor_id": "d1" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Time slot already booked");
}

#[tokio::test]
async fn test_invalid_time_is_400() {
    let ctx = setup().await;
    let config = TestConfig::default();
    seed_booking(&ctx.store, "apt1", None, "09:00").await;
    let receptionist = TestUser::receptionist("desk@example.com").in_hospital("h1");

    let (status, _) = send(
        app(&ctx, &config),
        "PUT",
        "/apt1",
        Some(&token_for(&receptionist, &config)),
        Some(json!({ "appointment_time": "quarter past nine" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_hospital_sees_not_found() {
    let ctx = setup().await;
    let config = TestConfig::default();
    seed_booking(&ctx.store, "apt1", Some("d1"), "09:00").await;
    let outsider = TestUser::receptionist("desk@other.example.com").in_hospital("h2");

    let (status, _) = send(
        app(&ctx, &config),
        "GET",
        "/apt1",
        Some(&token_for(&outsider, &config)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let admin = TestUser::admin("root@example.com");
    let (status, body) = send(app(&ctx, &config), "GET", "/apt1", Some(&token_for(&admin, &config)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "apt1");
}

#[tokio::test]
async fn test_patients_cannot_manage_bookings() {
    let ctx = setup().await;
    let config = TestConfig::default();
    seed_booking(&ctx.store, "apt1", Some("d1"), "09:00").await;
    let owner = TestUser::patient("asha@example.com").with_id("p1").in_hospital("h1");
    let stranger = TestUser::patient("other@example.com").in_hospital("h1");

    let (status, _) = send(
        app(&ctx, &config),
        "GET",
        "/apt1",
        Some(&token_for(&owner, &config)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app(&ctx, &config),
        "GET",
        "/apt1",
        Some(&token_for(&stranger, &config)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        app(&ctx, &config),
        "PUT",
        "/apt1",
        Some(&token_for(&owner, &config)),
        Some(json!({ "appointment_time": "11:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_doctor_manages_only_own_bookings() {
    let ctx = setup().await;
    let config = TestConfig::default();
    seed_booking(&ctx.store, "apt1", Some("d1"), "09:00").await;
    let own_doctor = TestUser::doctor("meera@example.com").with_id("d1").in_hospital("h1");
    let other_doctor = TestUser::doctor("vikram@example.com").with_id("d2").in_hospital("h1");

    let (status, _) = send(
        app(&ctx, &config),
        "POST",
        "/apt1/complete",
        Some(&token_for(&other_doctor, &config)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        app(&ctx, &config),
        "POST",
        "/apt1/complete",
        Some(&token_for(&own_doctor, &config)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "completed");
}

#[tokio::test]
async fn test_patient_books_for_self_only() {
    let ctx = setup().await;
    let config = TestConfig::default();
    let patient = TestUser::patient("asha@example.com").with_id("p1").in_hospital("h1");
    let token = token_for(&patient, &config);

    let (status, body) = send(
        app(&ctx, &config),
        "POST",
        "/",
        Some(&token),
        Some(json!({
            "patient_name": "Asha Rao",
            "doctor_id": "d1",
            "appointment_date": "2024-01-15",
            "appointment_time": "9:00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["patient_id"], "p1");
    assert_eq!(body["appointment"]["hospital_id"], "h1");
    assert_eq!(body["appointment"]["appointment_time"], "09:00");

    let (status, _) = send(
        app(&ctx, &config),
        "POST",
        "/",
        Some(&token),
        Some(json!({
            "patient_id": "someone-else",
            "patient_name": "Ravi",
            "appointment_date": "2024-01-15",
            "appointment_time": "10:00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(app(&ctx, &config), "GET", "/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_cancel_and_delete_routes() {
    let ctx = setup().await;
    let config = TestConfig::default();
    seed_booking(&ctx.store, "apt1", Some("d1"), "09:00").await;
    seed_booking(&ctx.store, "apt2", Some("d2"), "09:00").await;
    let receptionist = TestUser::receptionist("desk@example.com").in_hospital("h1");
    let admin = TestUser::admin("root@example.com");

    let (status, body) = send(
        app(&ctx, &config),
        "POST",
        "/apt1/cancel",
        Some(&token_for(&receptionist, &config)),
        Some(json!({ "reason": "Doctor on leave" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");
    assert_eq!(slot_holder(&ctx.store, "d1_2024-01-15_09-00").await, None);

    let (status, _) = send(
        app(&ctx, &config),
        "DELETE",
        "/apt2",
        Some(&token_for(&receptionist, &config)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(app(&ctx, &config), "DELETE", "/apt2", Some(&token_for(&admin, &config)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot_holder(&ctx.store, "d2_2024-01-15_09-00").await, None);
}

#[tokio::test]
async fn test_slot_check_route() {
    let ctx = setup().await;
    let config = TestConfig::default();
    seed_booking(&ctx.store, "apt1", Some("d1"), "09:00").await;
    let receptionist = TestUser::receptionist("desk@example.com").in_hospital("h1");

    let (status, body) = send(
        app(&ctx, &config),
        "GET",
        "/slots/check?doctor_id=d1&date=2024-01-15&time=9:00",
        Some(&token_for(&receptionist, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slot_key"], "d1_2024-01-15_09-00");
    assert_eq!(body["available"], false);
}
