//! HTTP-level tests for the messaging queue state machine.

mod support;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use serde_json::{json, Value};

use prime_backend::domain::ports::DispatchError;
use prime_backend::server::configure;
use prime_backend::Trace;

use support::{staff_auth_header, test_portal};

fn booking_confirmed_body() -> Value {
    json!({
        "eventType": "booking.confirmed",
        "payload": {
            "bookingCode": "BOOK123",
            "guestName": "Jane",
            "email": "jane@example.com",
            "checkInDate": "2026-08-10",
        },
    })
}

async fn enqueue<S, B>(app: &S) -> Value
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
    B::Error: std::fmt::Debug,
{
    let response = test::call_service(
        app,
        test::TestRequest::post()
            .uri("/api/queue/events")
            .insert_header(staff_auth_header())
            .set_json(booking_confirmed_body())
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    test::read_body_json(response).await
}

async fn process<S, B>(app: &S, event_id: &str) -> (StatusCode, Value)
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
    B::Error: std::fmt::Debug,
{
    let response = test::call_service(
        app,
        test::TestRequest::post()
            .uri("/api/queue/process")
            .insert_header(staff_auth_header())
            .set_json(json!({ "eventId": event_id }))
            .to_request(),
    )
    .await;
    let status = response.status();
    let body: Value = test::read_body_json(response).await;
    (status, body)
}

#[actix_web::test]
async fn queue_routes_require_the_staff_gate() {
    let portal = test_portal(None, None);
    let app = test::init_service(App::new().wrap(Trace).configure(configure(portal.state))).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/queue/events")
            .set_json(booking_confirmed_body())
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn dispatch_success_marks_sent_and_reprocessing_is_idempotent() {
    let portal = test_portal(None, None);
    let dispatcher = portal.dispatcher.clone();
    let app = test::init_service(App::new().wrap(Trace).configure(configure(portal.state))).await;

    let record = enqueue(&app).await;
    let event_id = record["eventId"].as_str().expect("event id");
    assert_eq!(event_id, "msg_booking_confirmed_BOOK123");
    assert_eq!(record["status"], json!("pending"));

    let (status, outcome) = process(&app, event_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], json!("sent"));
    assert_eq!(dispatcher.sent_count(), 1);
    let sent = dispatcher.sent();
    assert_eq!(sent[0].to, "jane@example.com");
    assert!(sent[0].subject.contains("BOOK123"));

    let (status, outcome) = process(&app, event_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], json!("idempotent"));
    assert_eq!(outcome["reason"], json!("already_sent"));
    assert_eq!(dispatcher.sent_count(), 1, "no second dispatch side effect");
}

#[actix_web::test]
async fn duplicate_booking_triggers_collapse_into_one_record() {
    let portal = test_portal(None, None);
    let app = test::init_service(App::new().wrap(Trace).configure(configure(portal.state))).await;

    let first = enqueue(&app).await;
    let second = enqueue(&app).await;
    assert_eq!(first["eventId"], second["eventId"]);
    assert_eq!(first["createdAt"], second["createdAt"]);
}

#[actix_web::test]
async fn permanent_failure_moves_the_record_to_failed() {
    let portal = test_portal(None, None);
    portal.dispatcher.push_outcome(Err(DispatchError::Http {
        status: 422,
        message: "invalid recipient".to_owned(),
    }));
    let dispatcher = portal.dispatcher.clone();
    let records = portal.records.clone();
    let app = test::init_service(App::new().wrap(Trace).configure(configure(portal.state))).await;

    let record = enqueue(&app).await;
    let event_id = record["eventId"].as_str().expect("event id").to_owned();

    let (_, outcome) = process(&app, &event_id).await;
    assert_eq!(outcome["outcome"], json!("failed"));
    assert_eq!(outcome["retryCount"], json!(1));

    assert_eq!(
        records.peek(&format!("messagingQueue/{event_id}/status")),
        Some(json!("failed"))
    );
    assert!(records
        .peek(&format!("messagingQueue/{event_id}/processedAt"))
        .is_some());

    // Failed is terminal: reprocessing performs no new dispatch.
    let (_, outcome) = process(&app, &event_id).await;
    assert_eq!(outcome["reason"], json!("already_failed"));
    assert_eq!(dispatcher.sent_count(), 1);
}

#[actix_web::test]
async fn transient_failure_leaves_the_record_retryable() {
    let portal = test_portal(None, None);
    portal.dispatcher.push_outcome(Err(DispatchError::Transport {
        message: "connection reset".to_owned(),
    }));
    let dispatcher = portal.dispatcher.clone();
    let records = portal.records.clone();
    let app = test::init_service(App::new().wrap(Trace).configure(configure(portal.state))).await;

    let record = enqueue(&app).await;
    let event_id = record["eventId"].as_str().expect("event id").to_owned();

    let (_, outcome) = process(&app, &event_id).await;
    assert_eq!(outcome["outcome"], json!("retry"));
    assert_eq!(outcome["retryCount"], json!(1));
    assert_eq!(
        records.peek(&format!("messagingQueue/{event_id}/status")),
        Some(json!("pending"))
    );
    assert!(records
        .peek(&format!("messagingQueue/{event_id}/processedAt"))
        .is_none());

    // A later invocation picks the event up again and succeeds.
    let (_, outcome) = process(&app, &event_id).await;
    assert_eq!(outcome["outcome"], json!("sent"));
    assert_eq!(dispatcher.sent_count(), 2);
    assert_eq!(
        records.peek(&format!("messagingQueue/{event_id}/retryCount")),
        Some(json!(1))
    );
}

#[actix_web::test]
async fn unknown_event_ids_report_missing() {
    let portal = test_portal(None, None);
    let app = test::init_service(App::new().wrap(Trace).configure(configure(portal.state))).await;

    let (status, outcome) = process(&app, "msg_nope").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], json!("missing"));
}

#[actix_web::test]
async fn unknown_event_types_are_rejected_at_enqueue() {
    let portal = test_portal(None, None);
    let app = test::init_service(App::new().wrap(Trace).configure(configure(portal.state))).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/queue/events")
            .insert_header(staff_auth_header())
            .set_json(json!({ "eventType": "mystery.event", "payload": {} }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
