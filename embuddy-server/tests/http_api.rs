use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use embuddy_core::{DataProcessor, PipelineConfig};
use embuddy_server::{router, AppState};

fn test_app() -> Router {
    router(AppState::new(DataProcessor::default()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn create_session(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/sessions", Body::empty()).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

const DOCS: &str = "{\"id\":\"d0\",\"text\":\"first\",\"embedding\":[0,0,0]}\n\
{\"id\":\"d1\",\"text\":\"second\",\"embedding\":[1,1,1]}\n\
{\"id\":\"d2\",\"text\":\"third\",\"embedding\":[2,2,2],\"category\":\"c\"}\n";

const PROMPTS: &str = "{\"id\":\"p0\",\"text\":\"q0\",\"embedding\":[5,5,5]}\n\
{\"id\":\"p1\",\"text\":\"q1\",\"embedding\":[6,6,6]}\n";

#[tokio::test]
async fn upload_combine_and_project() {
    let app = test_app();
    let id = create_session(&app).await;

    let (status, body) = send(&app, "PUT", &format!("/sessions/{}/sets/documents", id), Body::from(DOCS)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"set": "document", "count": 3, "dimensions": 3}));

    let (status, _) = send(&app, "PUT", &format!("/sessions/{}/sets/prompts", id), Body::from(PROMPTS)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("/sessions/{}/reduction-input", id), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["n_documents"], 3);
    assert_eq!(body["n_prompts"], 2);
    assert_eq!(body["matrix"].as_array().unwrap().len(), 5);
    assert_eq!(body["matrix"][3], json!([5.0, 5.0, 5.0]));
    let generation = body["generation"].clone();

    let reduced = json!({
        "generation": generation,
        "coordinates": [[0.0, 0.1], [1.0, 1.1], [2.0, 2.1], [5.0, 5.1], [6.0, 6.1]],
        "explained_variance": [0.7, 0.2]
    });
    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/projection", id),
        Body::from(reduced.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let points = body["points"].as_array().unwrap();
    let tagged: Vec<(&str, &str)> = points
        .iter()
        .map(|p| (p["set"].as_str().unwrap(), p["id"].as_str().unwrap()))
        .collect();
    assert_eq!(tagged, vec![
        ("document", "d0"),
        ("document", "d1"),
        ("document", "d2"),
        ("prompt", "p0"),
        ("prompt", "p1"),
    ]);
    assert_eq!(points[2]["category"], "c");
    assert!(points[0].get("category").is_none());
    assert_eq!(points[4]["coordinates"], json!([6.0, 6.1]));
}

#[tokio::test]
async fn failed_upload_reports_error_and_keeps_other_set() {
    let app = test_app();
    let id = create_session(&app).await;
    send(&app, "PUT", &format!("/sessions/{}/sets/documents", id), Body::from(DOCS)).await;

    let (status, body) = send(&app, "PUT", &format!("/sessions/{}/sets/prompts", id), Body::from("{oops")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().starts_with("Format error on line 1"));

    let (_, status_body) = send(&app, "GET", &format!("/sessions/{}", id), Body::empty()).await;
    assert_eq!(status_body["documents"]["count"], 3);
    assert!(status_body["prompts"]["error"].is_string());

    let (status, body) = send(&app, "GET", &format!("/sessions/{}/reduction-input", id), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["n_prompts"], 0);
}

#[tokio::test]
async fn reset_clears_both_sets() {
    let app = test_app();
    let id = create_session(&app).await;
    send(&app, "PUT", &format!("/sessions/{}/sets/documents", id), Body::from(DOCS)).await;
    send(&app, "PUT", &format!("/sessions/{}/sets/prompts", id), Body::from(PROMPTS)).await;

    let (status, _) = send(&app, "POST", &format!("/sessions/{}/reset", id), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", &format!("/sessions/{}", id), Body::empty()).await;
    assert!(body["documents"].is_null());
    assert!(body["prompts"].is_null());

    let (status, body) = send(&app, "GET", &format!("/sessions/{}/reduction-input", id), Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn suggest_then_load_external_records() {
    let app = test_app();
    let id = create_session(&app).await;
    let records = json!([
        {"uid": "a", "passage": "An external passage of some length.", "emb": [0.1, 0.2, 0.3], "labels": ["x"]},
        {"uid": "b", "passage": "Another external passage of text.", "emb": [0.4, 0.5, 0.6]},
        {"uid": "c", "passage": "This one has no embedding at all."}
    ]);

    let (status, body) = send(&app, "POST", "/fields/suggest", Body::from(json!({"records": records}).to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suggestions"]["embedding"][0], "emb");
    assert_eq!(body["suggestions"]["text"][0], "passage");
    let mapping = body["default_mapping"].clone();
    assert_eq!(mapping["embedding"], "emb");
    assert_eq!(mapping["tags"], "labels");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/sets/documents/external", id),
        Body::from(json!({"records": records, "mapping": mapping}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["dimensions"], 3);
}

#[tokio::test]
async fn external_load_with_no_survivors_is_unprocessable() {
    let app = test_app();
    let id = create_session(&app).await;
    let payload = json!({
        "records": [{"foo": 1}, {"bar": 2}],
        "mapping": {"embedding": "vec", "text": "body"}
    });
    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/sets/prompts/external", id),
        Body::from(payload.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "No valid documents after transformation");
}

async fn reduction_generation(app: &Router, id: &str) -> Value {
    let (status, body) = send(app, "GET", &format!("/sessions/{}/reduction-input", id), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    body["generation"].clone()
}

#[tokio::test]
async fn projection_with_wrong_shape_is_rejected() {
    let app = test_app();
    let id = create_session(&app).await;
    send(&app, "PUT", &format!("/sessions/{}/sets/documents", id), Body::from(DOCS)).await;
    let generation = reduction_generation(&app, &id).await;
    let uri = format!("/sessions/{}/projection", id);

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Body::from(json!({"generation": generation, "coordinates": [[0.0, 0.0]]}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Body::from(json!({"generation": generation, "coordinates": [[0.0, 0.0], [1.0]]}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for coordinates in [json!([[], [], []]), json!([[1, 2, 3, 4, 5], [1, 2, 3, 4, 5], [1, 2, 3, 4, 5]])] {
        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Body::from(json!({"generation": generation, "coordinates": coordinates}).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_input");
    }
}

#[tokio::test]
async fn projection_after_reupload_is_a_conflict() {
    let app = test_app();
    let id = create_session(&app).await;
    send(&app, "PUT", &format!("/sessions/{}/sets/documents", id), Body::from("{\"id\":\"d\",\"text\":\"doc\",\"embedding\":[0,0]}")).await;
    send(&app, "PUT", &format!("/sessions/{}/sets/prompts", id), Body::from("{\"id\":\"OLD\",\"text\":\"old\",\"embedding\":[9,9]}")).await;

    let (_, body) = send(&app, "GET", &format!("/sessions/{}/reduction-input", id), Body::empty()).await;
    assert_eq!(body["matrix"], json!([[0.0, 0.0], [9.0, 9.0]]));
    let stale = body["generation"].clone();

    send(&app, "PUT", &format!("/sessions/{}/sets/prompts", id), Body::from("{\"id\":\"NEW\",\"text\":\"new\",\"embedding\":[-5,-5]}")).await;

    let reduced = json!({"generation": stale, "coordinates": [[0.0, 0.0], [9.0, 9.0]]});
    let (status, body) = send(&app, "POST", &format!("/sessions/{}/projection", id), Body::from(reduced.to_string())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "stale_generation");

    let current = reduction_generation(&app, &id).await;
    assert_ne!(current, stale);
    let reduced = json!({"generation": current, "coordinates": [[0.0, 0.0], [-5.0, -5.0]]});
    let (status, body) = send(&app, "POST", &format!("/sessions/{}/projection", id), Body::from(reduced.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"][1]["id"], "NEW");
    assert_eq!(body["points"][1]["coordinates"], json!([-5.0, -5.0]));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/sessions/missing", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "session_not_found");

    let (status, _) = send(&app, "PUT", "/sessions/missing/sets/documents", Body::from(DOCS)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = create_session(&app).await;
    let (status, _) = send(&app, "DELETE", &format!("/sessions/{}", id), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &format!("/sessions/{}", id), Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let config = PipelineConfig { max_upload_bytes: 16, ..Default::default() };
    let app = router(AppState::new(DataProcessor::new(config).unwrap()));
    let id = create_session(&app).await;
    let (status, _) = send(&app, "PUT", &format!("/sessions/{}/sets/documents", id), Body::from(DOCS)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
