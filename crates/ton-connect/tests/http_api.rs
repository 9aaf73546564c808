//! The HTTP clients against in-process axum servers.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::*;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use ton_cell::{Address, BagOfCells, CellBuilder};
use ton_connect::proof::verify_proof;
use ton_connect::{
    ApiError, AuthApi, AuthError, BackendError, ChainClient, ChainError, HttpAuthApi,
    LocalKeyBackend, MemoryStore, OutgoingMessage, ProofDomain, SessionAuthenticator,
    SessionEvent, ToncenterClient, TonProof, VerifyRequest,
};

const TOKEN: &str = "session-token";
const API_KEY: &str = "secret";

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{address}")
}

#[derive(Default)]
struct AuthBackend {
    issued: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

type Shared = Arc<AuthBackend>;

async fn request_nonce(State(backend): State<Shared>) -> Json<Value> {
    let nonce = format!("n{}", backend.counter.fetch_add(1, Ordering::SeqCst));
    backend.issued.lock().unwrap().push(nonce.clone());
    Json(json!({ "nonce": nonce }))
}

fn rejected(detail: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail })))
}

/// Checks the proof against the domain this backend serves.
async fn verify(
    State(backend): State<Shared>,
    Json(request): Json<VerifyRequest>,
) -> (StatusCode, Json<Value>) {
    if !backend.issued.lock().unwrap().contains(&request.nonce) {
        return rejected("Unknown nonce");
    }
    let Ok(address) = Address::parse(&request.address) else {
        return rejected("Invalid address");
    };
    let Ok(public_key) = hex::decode(&request.public_key) else {
        return rejected("Invalid public key");
    };
    let proof = TonProof {
        timestamp: request.timestamp.unwrap_or_default(),
        domain: ProofDomain::new(DOMAIN),
        payload: request.nonce.clone(),
        signature: request.signature.clone(),
        state_init: None,
    };
    match verify_proof(&proof, &address, &public_key) {
        Ok(()) => (StatusCode::OK, Json(json!({ "access_token": TOKEN }))),
        Err(_) => rejected("Invalid signature"),
    }
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let expected = format!("Bearer {TOKEN}");
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok());
    if bearer == Some(expected.as_str()) {
        (StatusCode::OK, Json(json!({ "ok": true })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Invalid token" })))
    }
}

async fn record(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let (status, Json(reply)) = me(headers).await;
    if status != StatusCode::OK {
        return (status, Json(reply));
    }
    (StatusCode::OK, Json(json!({ "stored": body })))
}

async fn expired() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Token expired" })))
}

async fn auth_server() -> String {
    let app = Router::new()
        .route("/api/auth/request_nonce", get(request_nonce))
        .route("/api/auth/verify_signature", post(verify))
        .route("/api/auth/verify_ton_connect", post(verify))
        .route("/api/me", get(me))
        .route("/api/records", post(record))
        .route("/api/expired", get(expired).post(expired))
        .with_state(Shared::default());
    serve(app).await
}

async fn http_session(base_url: &str, domain: &str) -> SessionAuthenticator {
    let api = HttpAuthApi::new(base_url, Duration::from_secs(5)).unwrap();
    SessionAuthenticator::restore(Arc::new(api), Arc::new(MemoryStore::new()), domain)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_signature_login_over_http() {
    init_tracing();
    let base_url = auth_server().await;
    let session = http_session(&base_url, DOMAIN).await;
    let keypair = test_keypair();

    let credential = session
        .login_with_signature(&wallet_address(), &keypair.public_key, &keypair)
        .await
        .unwrap();
    assert_eq!(credential.token, TOKEN);

    let me = session.authorized_get("/api/me").await.unwrap();
    assert_eq!(me["ok"], true);

    let err = session.authorized_get("/api/expired").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized), "{err:?}");
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_authorized_post_over_http() {
    let base_url = auth_server().await;
    let session = http_session(&base_url, DOMAIN).await;
    let keypair = test_keypair();
    session
        .login_with_signature(&wallet_address(), &keypair.public_key, &keypair)
        .await
        .unwrap();

    let reply = session
        .authorized_post("/api/records", &json!({ "label": "savings" }))
        .await
        .unwrap();
    assert_eq!(reply["stored"]["label"], "savings");

    let mut events = session.subscribe();
    let err = session
        .authorized_post("/api/expired", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized), "{err:?}");
    assert!(!session.is_authenticated());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);

    let err = session.authorized_post("/api/records", &json!({})).await.unwrap_err();
    assert!(matches!(err, AuthError::NotAuthenticated), "{err:?}");
}

#[tokio::test]
async fn test_proof_for_another_domain_is_rejected() {
    let base_url = auth_server().await;
    let session = http_session(&base_url, "phishing.example").await;
    let keypair = test_keypair();

    let err = session
        .login_with_signature(&wallet_address(), &keypair.public_key, &keypair)
        .await
        .unwrap_err();
    match err {
        AuthError::VerificationRejected { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "Invalid signature");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_detail_is_surfaced() {
    let base_url = auth_server().await;
    let api = HttpAuthApi::new(format!("{base_url}/"), Duration::from_secs(5)).unwrap();

    let request = VerifyRequest {
        address: WALLET_RAW.to_string(),
        public_key: "00".repeat(32),
        nonce: "never-issued".into(),
        signature: STANDARD.encode([0u8; 64]),
        timestamp: Some(1),
        domain: Some(DOMAIN.into()),
    };
    let err = api.verify_ton_connect(&request).await.unwrap_err();
    assert!(
        matches!(
            &err,
            ApiError::Status { status: 400, detail: Some(detail) } if detail == "Unknown nonce"
        ),
        "{err:?}"
    );

    let err = api.get("/api/me", "wrong").await.unwrap_err();
    assert!(err.is_unauthorized());

    let err = api.get("/api/missing", TOKEN).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 404, .. }), "{err:?}");
}

#[tokio::test]
async fn test_unreachable_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let base_url = format!("http://{address}");
    let api = HttpAuthApi::new(&base_url, Duration::from_secs(2)).unwrap();
    assert!(matches!(api.request_nonce().await, Err(ApiError::Transport(_))));

    let session = http_session(&base_url, DOMAIN).await;
    let keypair = test_keypair();
    let err = session
        .login_with_signature(&wallet_address(), &keypair.public_key, &keypair)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NonceUnavailable(_)), "{err:?}");
}

#[derive(Default)]
struct Toncenter {
    sent: Mutex<Vec<Vec<u8>>>,
    /// Exit code of `seqno` on the deployed wallet.
    seqno_exit_code: AtomicI64,
}

fn address_cell(address: &Address) -> Value {
    let mut builder = CellBuilder::new();
    builder.store_address(address).unwrap();
    let boc = BagOfCells::from_root(builder.build().unwrap())
        .serialize_to_base64()
        .unwrap();
    json!(["cell", { "bytes": boc }])
}

async fn run_get_method(
    State(toncenter): State<Arc<Toncenter>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let deployed = body["address"] == WALLET_RAW;
    let result = match (body["method"].as_str(), deployed) {
        (Some("seqno"), true) => match toncenter.seqno_exit_code.load(Ordering::SeqCst) {
            0 => json!({ "exit_code": 0, "stack": [["num", "0x7"]] }),
            code => json!({ "exit_code": code, "stack": [] }),
        },
        (Some("get_wallet_data"), _) => json!({
            "exit_code": 0,
            "stack": [
                ["num", "0x3e8"],
                address_cell(&wallet_address()),
                address_cell(&recipient()),
                address_cell(&recipient()),
            ]
        }),
        _ => json!({ "exit_code": -13, "stack": [] }),
    };
    Json(json!({ "ok": true, "result": result }))
}

async fn address_balance(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let balance = if query.get("address").map(String::as_str) == Some(WALLET_RAW) {
        "1500000000"
    } else {
        "0"
    };
    Json(json!({ "ok": true, "result": balance }))
}

async fn send_boc(
    State(toncenter): State<Arc<Toncenter>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "ok": false, "error": "API key required", "code": 401 })),
        );
    }
    let boc = body["boc"]
        .as_str()
        .and_then(|text| STANDARD.decode(text).ok())
        .filter(|bytes| BagOfCells::deserialize(bytes).is_ok());
    match boc {
        Some(bytes) => {
            toncenter.sent.lock().unwrap().push(bytes);
            (StatusCode::OK, Json(json!({ "ok": true, "result": { "@type": "ok" } })))
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "ok": false,
                "error": "LITE_SERVER_UNKNOWN: cannot deserialize bag of cells",
                "code": 500
            })),
        ),
    }
}

async fn toncenter_server() -> (String, Arc<Toncenter>) {
    let toncenter = Arc::new(Toncenter::default());
    let app = Router::new()
        .route("/runGetMethod", post(run_get_method))
        .route("/getAddressBalance", get(address_balance))
        .route("/sendBoc", post(send_boc))
        .with_state(toncenter.clone());
    (serve(app).await, toncenter)
}

#[tokio::test]
async fn test_toncenter_queries() {
    let (endpoint, _) = toncenter_server().await;
    let client = ToncenterClient::new(endpoint, None, Duration::from_secs(5)).unwrap();

    assert_eq!(client.seqno(&wallet_address()).await.unwrap(), 7);
    // undeployed wallet
    assert_eq!(client.seqno(&recipient()).await.unwrap(), 0);

    assert_eq!(client.balance(&wallet_address()).await.unwrap(), 1_500_000_000);
    assert_eq!(client.balance(&recipient()).await.unwrap(), 0);

    let data = client.jetton_wallet_data(&recipient()).await.unwrap();
    assert_eq!(data.balance, 1000);
    assert_eq!(data.owner, wallet_address());
    assert_eq!(data.jetton_master, recipient());
}

#[tokio::test]
async fn test_toncenter_send_boc() {
    let (endpoint, toncenter) = toncenter_server().await;
    let boc = STANDARD.decode(HEADER_BOC).unwrap();

    let anonymous = ToncenterClient::new(endpoint.clone(), None, Duration::from_secs(5)).unwrap();
    let err = anonymous.send_boc(&boc).await.unwrap_err();
    assert!(matches!(err, ChainError::Rejected { code: 401, .. }), "{err:?}");

    let client =
        ToncenterClient::new(endpoint, Some(API_KEY.into()), Duration::from_secs(5)).unwrap();
    client.send_boc(&boc).await.unwrap();
    assert_eq!(*toncenter.sent.lock().unwrap(), vec![boc]);

    let err = client.send_boc(b"garbage").await.unwrap_err();
    match err {
        ChainError::Rejected { code, message } => {
            assert_eq!(code, 500);
            assert!(message.contains("cannot deserialize"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_failing_seqno_of_deployed_wallet() {
    let (endpoint, toncenter) = toncenter_server().await;
    toncenter.seqno_exit_code.store(11, Ordering::SeqCst);
    let client = Arc::new(
        ToncenterClient::new(endpoint, Some(API_KEY.into()), Duration::from_secs(5)).unwrap(),
    );

    let err = client.seqno(&wallet_address()).await.unwrap_err();
    assert!(matches!(err, ChainError::Rejected { code: 11, .. }), "{err:?}");
    // an account with no code still reads as a fresh wallet
    assert_eq!(client.seqno(&recipient()).await.unwrap(), 0);

    let backend =
        LocalKeyBackend::new(test_keypair(), 0, client, Duration::from_secs(60)).unwrap();
    assert_eq!(backend.address(), wallet_address());
    let err = backend
        .sign_and_submit(OutgoingMessage {
            destination: recipient(),
            amount: 1_000_000_000,
            payload: None,
            bounce: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::SequenceFetch(_)), "{err:?}");
    assert!(toncenter.sent.lock().unwrap().is_empty());
}
