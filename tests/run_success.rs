use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use play_promote::config::Inputs;
use play_promote::credentials::CREDENTIALS_ENV;
use play_promote::{run, PromoteError, PublisherClient, PublisherService};

const PRIVATE_KEY: &str = include_str!("fixtures/test-key.pem");
const TOKEN: &str = "ya29.local-token";

/// In-memory stand-in for the OAuth token endpoint and the publisher API.
#[derive(Default)]
struct Stub {
    tracks: HashMap<String, Value>,
    // `None` answers commits with an empty body.
    commit_body: Option<Value>,
    grants: Vec<String>,
    bearers: Vec<String>,
    committed: Vec<String>,
}

type Shared = Arc<Mutex<Stub>>;

async fn record_bearer(stub: &Shared, headers: &HeaderMap) {
    let bearer = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    stub.lock().await.bearers.push(bearer);
}

async fn token(State(stub): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let grant = form.get("grant_type").cloned().unwrap_or_default();
    let has_assertion = form.get("assertion").map_or(false, |a| !a.is_empty());
    stub.lock().await.grants.push(grant);
    if !has_assertion {
        return (StatusCode::BAD_REQUEST, "missing assertion").into_response();
    }
    Json(json!({ "access_token": TOKEN, "expires_in": 3599, "token_type": "Bearer" }))
        .into_response()
}

async fn insert_edit(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Path(_package): Path<String>,
) -> Response {
    record_bearer(&stub, &headers).await;
    Json(json!({ "id": "edit-1", "expiryTimeSeconds": "1700000000" })).into_response()
}

async fn get_track(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Path((_package, _edit, track)): Path<(String, String, String)>,
) -> Response {
    record_bearer(&stub, &headers).await;
    match stub.lock().await.tracks.get(&track) {
        Some(body) => Json(body.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "Track not found").into_response(),
    }
}

async fn update_track(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Path((_package, _edit, track)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    record_bearer(&stub, &headers).await;
    if body["track"].as_str() != Some(track.as_str()) {
        return (StatusCode::BAD_REQUEST, "track name mismatch").into_response();
    }
    stub.lock().await.tracks.insert(track, body.clone());
    Json(body).into_response()
}

async fn commit_edit(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Path((_package, edit)): Path<(String, String)>,
) -> Response {
    record_bearer(&stub, &headers).await;
    let mut stub = stub.lock().await;
    stub.committed.push(edit);
    match stub.commit_body.clone() {
        Some(body) => Json(body).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

async fn serve(stub: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/token", post(token))
        .route("/androidpublisher/v3/applications/:package/edits", post(insert_edit))
        .route(
            "/androidpublisher/v3/applications/:package/edits/:edit",
            post(commit_edit),
        )
        .route(
            "/androidpublisher/v3/applications/:package/edits/:edit/tracks/:track",
            get(get_track).put(update_track),
        )
        .with_state(stub);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn beta_track() -> Value {
    json!({
        "track": "beta",
        "releases": [{
            "name": "1.4.0",
            "versionCodes": ["140"],
            "status": "inProgress",
            "userFraction": 0.1,
            "releaseNotes": [{ "language": "en-US", "text": "Fixes" }]
        }]
    })
}

fn inputs(addr: SocketAddr, credentials_path: std::path::PathBuf) -> Inputs {
    let payload = json!({
        "type": "service_account",
        "private_key_id": "kid-1",
        "private_key": PRIVATE_KEY,
        "client_email": "ci@demo.iam.gserviceaccount.com",
        "token_uri": format!("http://{addr}/token")
    })
    .to_string();
    Inputs {
        package_name: Some("com.example.app".into()),
        service_account_json_raw: Some(payload),
        from_track: Some("beta".into()),
        to_track: Some("production".into()),
        user_fraction: Some("0.5".into()),
        credentials_path: Some(credentials_path),
        api_base_url: Some(format!("http://{addr}/")),
        ..Default::default()
    }
}

// Both runs share one test: `run` exports a process-wide variable.
#[tokio::test]
async fn run_promotes_and_cleans_up() {
    let stub: Shared = Arc::default();
    {
        let mut s = stub.lock().await;
        s.tracks.insert("beta".into(), beta_track());
        s.commit_body = Some(json!({ "id": "edit-1" }));
    }
    let addr = serve(stub.clone()).await;
    let td = tempdir().unwrap();
    let path = td.path().join("service-account.json");
    let cfg = inputs(addr, path.clone()).validate().unwrap();

    let outcome = run(&cfg).await.unwrap();
    assert_eq!(outcome.edit_id, "edit-1");
    assert_eq!(outcome.track, "production");
    assert_eq!(outcome.releases[0].user_fraction, Some(0.5));
    assert!(!path.exists());
    assert!(std::env::var_os(CREDENTIALS_ENV).is_none());

    {
        let s = stub.lock().await;
        assert_eq!(s.grants, vec!["urn:ietf:params:oauth:grant-type:jwt-bearer"]);
        assert!(s.bearers.iter().all(|b| b == &format!("Bearer {TOKEN}")));
        assert_eq!(s.bearers.len(), 4);
        assert_eq!(s.committed, vec!["edit-1:commit"]);
        let production = &s.tracks["production"];
        assert_eq!(production["releases"][0]["userFraction"], json!(0.5));
        assert_eq!(production["releases"][0]["versionCodes"], json!(["140"]));
        assert_eq!(
            production["releases"][0]["releaseNotes"],
            beta_track()["releases"][0]["releaseNotes"]
        );
        assert!(production["releases"][0].get("inAppUpdatePriority").is_none());
    }

    // A 2xx commit without a body is reported with its status line.
    stub.lock().await.commit_body = None;
    let err = run(&cfg).await.unwrap_err();
    assert!(matches!(err, PromoteError::CommitUnconfirmed { status: 200, .. }), "got {err}");
    assert_eq!(err.to_string(), "Error 200: OK");
    assert!(!path.exists());
    assert!(std::env::var_os(CREDENTIALS_ENV).is_none());
}

#[tokio::test]
async fn publisher_error_carries_status_and_body() {
    let stub: Shared = Arc::default();
    let addr = serve(stub).await;
    let client = PublisherClient::with_base_url(
        TOKEN.into(),
        format!("http://{addr}/").parse().unwrap(),
    )
    .unwrap();

    let err = client
        .get_track("com.example.app", "edit-1", "alpha")
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("edits.tracks.get error 404 Not Found"), "got {message}");
    assert!(message.contains("Track not found"), "got {message}");
}
