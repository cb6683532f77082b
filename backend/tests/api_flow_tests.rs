//! Full admission flows against LocalStack
//!
//! Run with LocalStack up: `cargo test -- --ignored`

mod common;

use common::{
    aws_setup::ApiTestResources, parse_response_body, send_signed_request,
};
use http::StatusCode;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

use backend_storage::queue::{DeliveryTask, QueueConfig, SqsQueue};

fn register_body(user_id: &str, endpoint: &str) -> String {
    json!({
        "user_id": user_id,
        "endpoint": endpoint,
        "keys": { "p256dh": "P", "auth": "A" }
    })
    .to_string()
}

async fn drain_default_queue(resources: &ApiTestResources) -> Vec<DeliveryTask> {
    let queue: SqsQueue<DeliveryTask> = SqsQueue::new(
        resources.sqs_client(),
        QueueConfig {
            queue_url: resources.default_queue_url.clone(),
            default_max_messages: 10,
            default_visibility_timeout: 30,
            default_wait_time_seconds: 1,
        },
    );

    let mut tasks = Vec::new();
    loop {
        let messages = queue.poll_messages().await.expect("poll");
        if messages.is_empty() {
            break;
        }
        for message in messages {
            queue.ack_message(&message.receipt_handle).await.expect("ack");
            tasks.push(message.body);
        }
    }
    tasks
}

#[tokio::test]
#[serial]
#[ignore = "requires LocalStack"]
async fn register_is_idempotent_on_endpoint() {
    let _resources = ApiTestResources::provision().await;
    let endpoint = format!("https://push.example/{}", Uuid::new_v4());

    let first = send_signed_request(
        "POST",
        "/v1/subscriptions",
        Some(register_body("u1", &endpoint)),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body = parse_response_body(first).await;
    assert_eq!(first_body["is_active"], true);

    // Same endpoint, different user: the endpoint is the unit of identity
    let second = send_signed_request(
        "POST",
        "/v1/subscriptions",
        Some(register_body("someone-else", &endpoint)),
    )
    .await;
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = parse_response_body(second).await;

    assert_eq!(first_body["id"], second_body["id"]);
    assert_eq!(second_body["user_id"], "u1");
    assert_eq!(second_body["is_active"], true);
}

#[tokio::test]
#[serial]
#[ignore = "requires LocalStack"]
async fn unregister_soft_deletes() {
    let _resources = ApiTestResources::provision().await;
    let endpoint = format!("https://push.example/{}", Uuid::new_v4());

    let created = send_signed_request(
        "POST",
        "/v1/subscriptions",
        Some(register_body("u1", &endpoint)),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let id = parse_response_body(created).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let deleted =
        send_signed_request("DELETE", &format!("/v1/subscriptions/{id}"), None).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let missing = send_signed_request(
        "DELETE",
        &format!("/v1/subscriptions/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
#[ignore = "requires LocalStack"]
async fn idempotent_replay_admits_once() {
    let resources = ApiTestResources::provision().await;
    let endpoint = format!("https://push.example/{}", Uuid::new_v4());

    send_signed_request(
        "POST",
        "/v1/subscriptions",
        Some(register_body("u1", &endpoint)),
    )
    .await;

    let body = json!({
        "type": "t",
        "user_ids": ["u1"],
        "title": "hi",
        "ttl_seconds": 3600,
        "priority": "normal",
        "idempotency_key": "k1"
    })
    .to_string();

    let first = send_signed_request("POST", "/v1/notifications", Some(body.clone())).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body = parse_response_body(first).await;
    assert_eq!(first_body["recipient_count"], 1);
    assert_eq!(first_body["status"], "pending");

    let second = send_signed_request("POST", "/v1/notifications", Some(body)).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = parse_response_body(second).await;

    assert_eq!(first_body["id"], second_body["id"]);
    assert_eq!(second_body["recipient_count"], 1);

    // The replay enqueued nothing new
    let tasks = drain_default_queue(&resources).await;
    assert_eq!(tasks.len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires LocalStack"]
async fn fan_out_targets_every_active_subscription() {
    let resources = ApiTestResources::provision().await;

    let e1 = format!("https://push.example/{}", Uuid::new_v4());
    let e2 = format!("https://push.example/{}", Uuid::new_v4());
    let e3 = format!("https://push.example/{}", Uuid::new_v4());

    for (user, endpoint) in [("u1", &e1), ("u1", &e2), ("u2", &e3)] {
        let response = send_signed_request(
            "POST",
            "/v1/subscriptions",
            Some(register_body(user, endpoint)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let body = json!({
        "type": "t",
        "user_ids": ["u1", "u2"]
    })
    .to_string();

    let response = send_signed_request("POST", "/v1/notifications", Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response_body = parse_response_body(response).await;
    assert_eq!(response_body["recipient_count"], 2);
    let notification_id = response_body["id"].as_str().unwrap().to_string();

    let tasks = drain_default_queue(&resources).await;
    assert_eq!(tasks.len(), 3, "one task per active subscription");

    let mut subscription_ids: Vec<String> =
        tasks.iter().map(|t| t.subscription_id.clone()).collect();
    subscription_ids.sort();
    subscription_ids.dedup();
    assert_eq!(subscription_ids.len(), 3);
    assert!(tasks.iter().all(|t| t.notification_id == notification_id));
}

#[tokio::test]
#[serial]
#[ignore = "requires LocalStack"]
async fn notification_lookup_and_attempt_listing() {
    let _resources = ApiTestResources::provision().await;

    let missing = send_signed_request(
        "GET",
        &format!("/v1/notifications/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let body = json!({
        "type": "t",
        "user_ids": ["u1"],
        "data": { "k": "v" }
    })
    .to_string();

    let created = send_signed_request("POST", "/v1/notifications", Some(body)).await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let id = parse_response_body(created).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let fetched = send_signed_request("GET", &format!("/v1/notifications/{id}"), None).await;
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched_body = parse_response_body(fetched).await;
    assert_eq!(fetched_body["type"], "t");
    assert_eq!(fetched_body["data"]["k"], "v");
    assert_eq!(fetched_body["status"], "pending");

    // No worker ran: the ledger is a valid empty array
    let attempts = send_signed_request(
        "GET",
        &format!("/v1/notifications/{id}/attempts"),
        None,
    )
    .await;
    assert_eq!(attempts.status(), StatusCode::OK);
    let attempts_body = parse_response_body(attempts).await;
    assert_eq!(attempts_body, json!([]));
}
