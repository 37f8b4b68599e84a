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

async fn post<S>(app: &S, uri: &str, bearer: &str, body: Value) -> ServiceResponse
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let req = TestRequest::post()
        .uri(uri)
        .insert_header((AUTHORIZATION, bearer))
        .set_json(body)
        .to_request();

    test::call_service(app, req).await
}

fn team() -> Value {
    json!({
        "name": "Team",
        "emails": [
            { "email": "Cat@x.com", "name": "Cat" },
            { "email": "dan@x.com" },
            { "email": "cat@x.com" }
        ]
    })
}

#[actix_web::test]
async fn created_groups_are_listed_for_their_owner() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);

    let res = post(&app, "/groups/create", &ann, team()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["group"]["name"], "Team");
    assert_eq!(body["group"]["members"].as_array().unwrap().len(), 2);

    let duplicate = json!({ "name": "team", "emails": [{ "email": "x@x.com" }] });
    let res = post(&app, "/groups/create", &ann, duplicate).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let req = TestRequest::get()
        .uri("/groups")
        .insert_header((AUTHORIZATION, ann.as_str()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["groups"].as_array().unwrap().len(), 1);

    let req = TestRequest::get()
        .uri("/groups")
        .insert_header((AUTHORIZATION, ctx.bearer("bob@x.com")))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["groups"], json!([]));
}

#[actix_web::test]
async fn group_send_reports_list_sizes() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);
    post(&app, "/groups/create", &ann, team()).await;

    let body = json!({
        "groupName": "Team",
        "subject": "Standup",
        "content": "<p>10am</p>",
        "mode": "cc"
    });
    let res = post(&app, "/groups/send", &ann, body).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["recipientCount"], 2);
    assert_eq!(body["toCount"], 0);
    assert_eq!(body["ccCount"], 2);
    assert_eq!(body["bccCount"], 0);

    let outbox = ctx.transport.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(
        outbox[0].cc,
        vec!["cat@x.com".to_string(), "dan@x.com".to_string()]
    );
}

#[actix_web::test]
async fn group_send_failures_map_to_status_codes() {
    let ctx = TestContext::with_transport(MemoryTransport::unavailable());
    let app = init_app!(ctx);
    let ann = ctx.bearer(ANN);
    post(&app, "/groups/create", &ann, team()).await;

    let send = |group_name: &str, mode: &str| {
        json!({
            "groupName": group_name,
            "subject": "Standup",
            "content": "<p>10am</p>",
            "mode": mode
        })
    };

    let res = post(&app, "/groups/send", &ann, send("Nobody", "to")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = post(&app, "/groups/send", &ann, send("Team", "everyone")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = post(&app, "/groups/create", &ann, json!({ "emails": [] })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = post(&app, "/groups/send", &ann, send("Team", "to")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "Failed to send email");
}
