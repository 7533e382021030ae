//! In-process nimbus.io backend for integration tests.
//!
//! Serves the account and collection endpoints on `127.0.0.1`, checks the
//! request signature, and routes collection requests by the `Host` header.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use nimbus_client::http::auth;
use nimbus_client::http::uri::META_PREFIX;
use nimbus_client::{ClientConfig, Credentials, NimbusClient};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

pub const DOMAIN: &str = "nimbus.test";
pub const USER_NAME: &str = "alice";
pub const AUTH_KEY_ID: &str = "7";
pub const AUTH_KEY: &str = "3d8fd2bbe4b4b2cfa52b3d2a2c2b6b0c";

type Params = Query<HashMap<String, String>>;

#[derive(Debug, Clone, Default)]
struct StoredObject {
    data: Bytes,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Store {
    collections: Vec<(String, i64)>,
    objects: HashMap<String, BTreeMap<String, StoredObject>>,
    writes: usize,
}

impl Store {
    fn add_collection(&mut self, name: &str) {
        let created = 1_700_000_000 + self.collections.len() as i64;
        self.collections.push((name.to_string(), created));
        self.objects.entry(name.to_string()).or_default();
    }

    fn has_collection(&self, name: &str) -> bool {
        self.collections.iter().any(|(n, _)| n == name)
    }
}

type Shared = Arc<Mutex<Store>>;

/// A running mock backend.
#[derive(Clone)]
pub struct MockServer {
    addr: SocketAddr,
    store: Shared,
}

impl MockServer {
    /// Starts a backend that already holds the user's default collection.
    pub async fn start() -> Self {
        let mut store = Store::default();
        store.add_collection(&format!("dd-{USER_NAME}"));
        let store: Shared = Arc::new(Mutex::new(store));

        let app = Router::new()
            .route(
                "/customers/{user}/collections",
                get(list_collections).post(create_collection),
            )
            .route(
                "/customers/{user}/collections/{name}",
                get(collection_usage).delete(delete_collection),
            )
            .route("/data/", get(list_keys))
            .route(
                "/data/{*name}",
                get(read_object).post(write_object).delete(delete_object),
            )
            .layer(middleware::from_fn(require_signature))
            .with_state(Arc::clone(&store));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, store }
    }

    pub fn credentials() -> Credentials {
        Credentials::new(USER_NAME, AUTH_KEY_ID, AUTH_KEY)
    }

    pub fn config(&self) -> ClientConfig {
        let base = Url::parse(&format!("http://{}/", self.addr)).unwrap();
        ClientConfig::default()
            .with_service_domain(DOMAIN)
            .with_base_address(base)
            .with_timeout(10)
    }

    /// Returns a client signed with the backend's credentials.
    pub fn client(&self) -> NimbusClient {
        NimbusClient::new(Self::credentials(), self.config()).unwrap()
    }

    /// Returns the number of object writes the backend has accepted.
    pub fn writes(&self) -> usize {
        self.store.lock().unwrap().writes
    }

    /// Returns the stored content of `key` in `collection`.
    pub fn object(&self, collection: &str, key: &str) -> Option<Bytes> {
        let store = self.store.lock().unwrap();
        store
            .objects
            .get(collection)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
    }
}

/// Starts a server that answers every connection with the raw bytes of
/// `response`, then closes it. Returns a client pointed at it.
pub async fn raw_responder(response: &'static [u8]) -> NimbusClient {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket.write_all(response).await;
            let _ = socket.shutdown().await;
        }
    });

    let base = Url::parse(&format!("http://{addr}/")).unwrap();
    let config = ClientConfig::default()
        .with_service_domain(DOMAIN)
        .with_base_address(base)
        .with_timeout(10);
    NimbusClient::new(MockServer::credentials(), config).unwrap()
}

async fn require_signature(request: Request, next: Next) -> Response {
    let headers = request.headers();
    let timestamp = headers
        .get(auth::TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let (Some(timestamp), Some(authorization)) = (timestamp, authorization) else {
        return (StatusCode::UNAUTHORIZED, "missing signature").into_response();
    };

    let path = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/");
    let credentials = MockServer::credentials();
    let signature =
        auth::compute_signature(&credentials, request.method().as_str(), timestamp, path);
    let expected = auth::authorization_value(&credentials, &signature);

    if authorization != expected {
        return (StatusCode::UNAUTHORIZED, "bad signature").into_response();
    }

    next.run(request).await
}

fn host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn account_request(headers: &HeaderMap, user: &str) -> Result<(), Response> {
    if host(headers) != DOMAIN {
        return Err((StatusCode::BAD_REQUEST, "wrong host").into_response());
    }
    if user != USER_NAME {
        return Err((StatusCode::FORBIDDEN, "wrong user").into_response());
    }
    Ok(())
}

fn collection_of(headers: &HeaderMap, store: &Store) -> Result<String, Response> {
    let suffix = format!(".{DOMAIN}");
    let Some(collection) = host(headers).strip_suffix(&suffix) else {
        return Err((StatusCode::BAD_REQUEST, "wrong host").into_response());
    };
    if !store.has_collection(collection) {
        return Err((StatusCode::NOT_FOUND, "no such collection").into_response());
    }
    Ok(collection.to_string())
}

async fn list_collections(
    State(store): State<Shared>,
    Path(user): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = account_request(&headers, &user) {
        return response;
    }
    let store = store.lock().unwrap();
    Json(store.collections.clone()).into_response()
}

async fn create_collection(
    State(store): State<Shared>,
    Path(user): Path<String>,
    Query(params): Params,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = account_request(&headers, &user) {
        return response;
    }
    let (Some("create"), Some(name)) = (params.get("action").map(String::as_str), params.get("name"))
    else {
        return (StatusCode::BAD_REQUEST, "expected action=create&name=").into_response();
    };

    let mut store = store.lock().unwrap();
    if store.has_collection(name) {
        return (StatusCode::CONFLICT, "collection already exists").into_response();
    }
    store.add_collection(name);
    Json(json!({ "success": true, "name": name })).into_response()
}

async fn collection_usage(
    State(store): State<Shared>,
    Path((user, name)): Path<(String, String)>,
    Query(params): Params,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = account_request(&headers, &user) {
        return response;
    }
    if params.get("action").map(String::as_str) != Some("space_usage") {
        return (StatusCode::BAD_REQUEST, "expected action=space_usage").into_response();
    }

    let store = store.lock().unwrap();
    let Some(objects) = store.objects.get(&name) else {
        return (StatusCode::NOT_FOUND, "no such collection").into_response();
    };
    let bytes: usize = objects.values().map(|o| o.data.len()).sum();
    Json(json!({ "success": true, "bytes": bytes, "keys": objects.len() })).into_response()
}

async fn delete_collection(
    State(store): State<Shared>,
    Path((user, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = account_request(&headers, &user) {
        return response;
    }
    let mut store = store.lock().unwrap();
    if !store.has_collection(&name) {
        return (StatusCode::NOT_FOUND, "no such collection").into_response();
    }
    store.collections.retain(|(n, _)| n != &name);
    store.objects.remove(&name);
    Json(json!({ "success": true })).into_response()
}

async fn list_keys(State(store): State<Shared>, headers: HeaderMap) -> Response {
    let store = store.lock().unwrap();
    let collection = match collection_of(&headers, &store) {
        Ok(collection) => collection,
        Err(response) => return response,
    };
    let names: Vec<String> = store.objects[&collection].keys().cloned().collect();
    Json(names).into_response()
}

async fn read_object(
    State(store): State<Shared>,
    Path(name): Path<String>,
    Query(params): Params,
    headers: HeaderMap,
) -> Response {
    let store = store.lock().unwrap();
    let collection = match collection_of(&headers, &store) {
        Ok(collection) => collection,
        Err(response) => return response,
    };
    let Some(object) = store.objects[&collection].get(&name) else {
        return (StatusCode::NOT_FOUND, "no such key").into_response();
    };

    match params.get("action").map(String::as_str) {
        Some("stat") => Json(json!({ "size": object.data.len() })).into_response(),
        Some("get_meta") => Json(object.metadata.clone()).into_response(),
        Some(_) => (StatusCode::BAD_REQUEST, "unknown action").into_response(),
        None => object.data.clone().into_response(),
    }
}

async fn write_object(
    State(store): State<Shared>,
    Path(name): Path<String>,
    Query(params): Params,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut store = store.lock().unwrap();
    let collection = match collection_of(&headers, &store) {
        Ok(collection) => collection,
        Err(response) => return response,
    };

    let metadata = params
        .into_iter()
        .filter_map(|(k, v)| k.strip_prefix(META_PREFIX).map(|k| (k.to_string(), v)))
        .collect();
    let size = body.len();

    store.writes += 1;
    store.objects.entry(collection).or_default().insert(
        name.clone(),
        StoredObject {
            data: body,
            metadata,
        },
    );
    Json(json!({ "success": true, "key": name, "size": size })).into_response()
}

async fn delete_object(
    State(store): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut store = store.lock().unwrap();
    let collection = match collection_of(&headers, &store) {
        Ok(collection) => collection,
        Err(response) => return response,
    };
    match store.objects.entry(collection).or_default().remove(&name) {
        Some(_) => Json(json!({ "success": true })).into_response(),
        None => (StatusCode::NOT_FOUND, "no such key").into_response(),
    }
}
