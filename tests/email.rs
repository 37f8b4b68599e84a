use std::time::Duration;

use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use bulkmail::transport::MemoryTransport;
use serde_json::{json, Value};

#[macro_use]
mod common;

use common::TestContext;

const ANN: &str = "ann@x.com";
const BOB: &str = "bob@x.com";

fn launch() -> Value {
    json!({
        "subject": "Launch",
        "content": "<p>Hello {{name}}</p>",
        "recipients": [
            { "email": "cat@x.com", "name": "Cat" },
            { "email": "dan@x.com" },
            { "email": " CAT@x.com ", "name": "Duplicate" },
            { "name": "No address" }
        ]
    })
}

async fn send_bulk<S>(app: &S, bearer: &str, body: Value) -> ServiceResponse
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let req = TestRequest::post()
        .uri("/email/send-bulk")
        .insert_header((AUTHORIZATION, bearer))
        .set_json(body)
        .to_request();

    test::call_service(app, req).await
}

async fn get_email<S>(app: &S, bearer: &str, email_id: &str) -> ServiceResponse
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let req = TestRequest::get()
        .uri(&format!("/email/{}", email_id))
        .insert_header((AUTHORIZATION, bearer))
        .to_request();

    test::call_service(app, req).await
}

/// Polls the campaign until it leaves `draft`/`sending`.
async fn wait_until_finished<S>(app: &S, bearer: &str, email_id: &str) -> Value
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    for _ in 0..100 {
        let res = get_email(app, bearer, email_id).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;

        let status = body["email"]["status"].as_str().unwrap().to_string();
        if status != "draft" && status != "sending" {
            return body["email"].clone();
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("campaign {} never finished", email_id);
}

#[actix_web::test]
async fn accepted_campaign_is_sent_in_the_background() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);

    let res = send_bulk(&app, &ann, launch()).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["totalRecipients"], 2);
    let email_id = body["emailId"].as_str().unwrap().to_string();

    let email = wait_until_finished(&app, &ann, &email_id).await;
    assert_eq!(email["status"], "completed");
    assert_eq!(email["sentCount"], 2);
    assert_eq!(email["failedCount"], 0);
    assert_eq!(email["createdBy"], ANN);
    assert!(email["completedAt"].is_string());
    assert_eq!(email["recipients"][0]["email"], "cat@x.com");
    assert_eq!(email["recipients"][0]["status"], "sent");

    let outbox = ctx.transport.outbox();
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox[0].html, "<p>Hello Cat</p>");
    assert_eq!(outbox[1].html, "<p>Hello there</p>");
}

#[actix_web::test]
async fn failed_recipients_are_reported_per_recipient() {
    let ctx = TestContext::with_transport(MemoryTransport::rejecting(["dan@x.com"]));
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);

    let res = send_bulk(&app, &ann, launch()).await;
    let body: Value = test::read_body_json(res).await;
    let email_id = body["emailId"].as_str().unwrap().to_string();

    let email = wait_until_finished(&app, &ann, &email_id).await;
    assert_eq!(email["status"], "partial");
    assert_eq!(email["sentCount"], 1);
    assert_eq!(email["failedCount"], 1);
    assert_eq!(email["recipients"][1]["status"], "failed");
    assert!(email["recipients"][1]["error"].is_string());
}

#[actix_web::test]
async fn resending_a_finished_campaign_sends_nothing_new() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);

    let res = send_bulk(&app, &ann, launch()).await;
    let body: Value = test::read_body_json(res).await;
    let email_id = body["emailId"].as_str().unwrap().to_string();
    wait_until_finished(&app, &ann, &email_id).await;

    let res = send_bulk(&app, &ann, json!({ "emailId": email_id })).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["emailId"], email_id.as_str());

    let email = wait_until_finished(&app, &ann, &email_id).await;
    assert_eq!(email["status"], "completed");
    assert_eq!(ctx.transport.attempts(), 2);
}

#[actix_web::test]
async fn invalid_requests_are_rejected() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);

    let res = send_bulk(&app, &ann, json!({ "subject": "Launch", "recipients": [] })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "E4001003");

    let req = TestRequest::post()
        .uri("/email/send-bulk")
        .insert_header((AUTHORIZATION, ann.as_str()))
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["errorCode"], "E4001000");

    let res = get_email(&app, &ann, "not-an-id").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(ctx.transport.attempts(), 0);
}

#[actix_web::test]
async fn requests_need_a_valid_bearer_token() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = TestRequest::get().uri("/email/history").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "Not authorized, no token");

    let res = send_bulk(&app, "Bearer forged", launch()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "Not authorized, token failed");
}

#[actix_web::test]
async fn campaigns_are_private_to_their_owner() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let (ann, bob) = (ctx.bearer(ANN), ctx.bearer(BOB));

    let res = send_bulk(&app, &ann, launch()).await;
    let body: Value = test::read_body_json(res).await;
    let email_id = body["emailId"].as_str().unwrap().to_string();

    let res = get_email(&app, &bob, &email_id).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = send_bulk(&app, &bob, json!({ "emailId": email_id })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let req = TestRequest::get()
        .uri("/email/history")
        .insert_header((AUTHORIZATION, bob.as_str()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["emails"], json!([]));
}

#[actix_web::test]
async fn history_lists_own_campaigns_newest_first() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);

    let mut ids = Vec::new();
    for _ in 0..2 {
        let res = send_bulk(&app, &ann, launch()).await;
        let body: Value = test::read_body_json(res).await;
        ids.push(body["emailId"].as_str().unwrap().to_string());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    send_bulk(&app, &ctx.bearer(BOB), launch()).await;

    let req = TestRequest::get()
        .uri("/email/history")
        .insert_header((AUTHORIZATION, ann.as_str()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let listed: Vec<&str> = body["emails"]
        .as_array()
        .unwrap()
        .iter()
        .map(|email| email["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![ids[1].as_str(), ids[0].as_str()]);
    assert!(body["emails"][0].get("recipients").is_none());
}

#[actix_web::test]
async fn unknown_campaigns_and_paths_are_not_found() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);

    let missing = bulkmail::campaign::CampaignId::new().to_string();
    let res = get_email(&app, &ann, &missing).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["errorCode"], "E4041001");

    let res = send_bulk(&app, &ann, json!({ "emailId": missing })).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let req = TestRequest::get().uri("/nowhere").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["errorCode"], "E4041000");
}

#[actix_web::test]
async fn health_reports_the_database() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["database"], "connected");
    assert!(body["timestamp"].is_string());
}

#[actix_web::test]
async fn malformed_recipient_entries_are_skipped() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);

    let body = json!({
        "subject": "Launch",
        "content": "Hi",
        "recipients": [{ "email": 5 }, "bare@x.com", { "email": "cat@x.com" }]
    });
    let res = send_bulk(&app, &ann, body).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["totalRecipients"], 1);

    let body = json!({ "subject": "Launch", "content": "Hi", "recipients": [{ "email": 5 }] });
    let res = send_bulk(&app, &ann, body).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["errorCode"], "E4001004");
}
