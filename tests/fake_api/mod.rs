//! In-process stand-in for the hosted backend's record API, just faithful enough to exercise the
//! remote client: soft deletes, equality filters, ordering, paging and credential checks.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::DateTime;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const APP_ID: &str = "taskflow-test-app";

/// What the fake saw of a single request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub application_id: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct ApiState {
    collections: HashMap<String, Vec<Value>>,
    highest_id: i64,
    requests: Vec<RecordedRequest>,
    rejecting_sessions: bool,
    ignoring_offsets: bool,
}

impl ApiState {
    /// Stores [record] with backend-assigned columns. Each record is created one second after
    /// the previous one so ordering by creation time is stable.
    fn insert(&mut self, collection: &str, mut record: Value) -> Value {
        self.highest_id += 1;
        let created_on = DateTime::from_timestamp(1_700_000_000 + self.highest_id, 0)
            .expect("timestamp in range")
            .to_rfc3339();
        if let Some(fields) = record.as_object_mut() {
            fields.insert("Id".to_owned(), json!(self.highest_id));
            fields.insert("CreatedOn".to_owned(), json!(created_on));
            fields.insert("ModifiedOn".to_owned(), json!(created_on));
            fields.entry("IsDeleted").or_insert(json!(false));
        }

        self.collections
            .entry(collection.to_owned())
            .or_default()
            .push(record.clone());
        record
    }

    fn live_record_mut(&mut self, collection: &str, id: i64) -> Option<&mut Value> {
        self.collections
            .get_mut(collection)?
            .iter_mut()
            .find(|record| record["Id"] == json!(id) && record["IsDeleted"] != json!(true))
    }

    fn check_credentials(
        &mut self,
        uri: &Uri,
        headers: &HeaderMap,
        body: &Value,
    ) -> Result<(), StatusCode> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let request = RecordedRequest {
            path: uri.path().to_owned(),
            application_id: header("x-application-id"),
            authorization: header("authorization"),
            body: body.clone(),
        };
        let known_app = request.application_id.as_deref() == Some(APP_ID);
        self.requests.push(request);

        if self.rejecting_sessions {
            return Err(StatusCode::UNAUTHORIZED);
        }
        if !known_app {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(())
    }
}

type SharedState = Arc<Mutex<ApiState>>;

pub struct FakeApi {
    address: std::net::SocketAddr,
    state: SharedState,
}

impl FakeApi {
    pub async fn start() -> FakeApi {
        let state = SharedState::default();
        let router = Router::new()
            .route("/collections/:collection/records/query", post(query_records))
            .route("/collections/:collection/records", post(create_record))
            .route(
                "/collections/:collection/records/:id",
                patch(update_record).delete(delete_record),
            )
            .route("/auth/session", get(session))
            .route("/auth/logout", post(logout))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("fake api should bind");
        let address = listener.local_addr().expect("fake api has an address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("fake api stopped unexpectedly");
        });

        FakeApi { address, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn seed(&self, collection: &str, record: Value) {
        self.state.lock().unwrap().insert(collection, record);
    }

    /// Every stored record of [collection], soft-deleted ones included
    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn reject_sessions(&self) {
        self.state.lock().unwrap().rejecting_sessions = true;
    }

    /// Makes queries always answer with the first page, like a backend that drops `offset`
    pub fn ignore_offsets(&self) {
        self.state.lock().unwrap().ignoring_offsets = true;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests()
            .pop()
            .expect("the fake api has not received any request")
    }
}

fn matches_filter(record: &Value, filter: &Value) -> bool {
    let field = filter["field"].as_str().unwrap_or_default();
    let actual = record.get(field).cloned().unwrap_or(Value::Null);
    match filter["operator"].as_str() {
        Some("equals") => actual == filter["value"],
        Some("not_equals") => actual != filter["value"],
        _ => false,
    }
}

fn project(record: &Value, fields: &[Value]) -> Value {
    let projected: Map<String, Value> = fields
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|field| Some((field.to_owned(), record.get(field)?.clone())))
        .collect();
    Value::Object(projected)
}

async fn query_records(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(query): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    state.check_credentials(&uri, &headers, &query)?;

    let filters = query["filters"].as_array().cloned().unwrap_or_default();
    let mut found: Vec<Value> = state
        .collections
        .get(&collection)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|record| filters.iter().all(|filter| matches_filter(record, filter)))
        .collect();

    if let Some(ordering) = query["orderBy"].as_array().and_then(|order| order.first()) {
        let field = ordering["field"].as_str().unwrap_or_default().to_owned();
        found.sort_by_key(|record| record[&field].to_string());
        if ordering["direction"] == json!("desc") {
            found.reverse();
        }
    }

    let offset = if state.ignoring_offsets {
        0
    } else {
        query["pagingInfo"]["offset"].as_u64().unwrap_or(0) as usize
    };
    let limit = query["pagingInfo"]["limit"].as_u64().unwrap_or(u64::MAX) as usize;
    let fields = query["fields"].as_array().cloned().unwrap_or_default();
    let page: Vec<Value> = found
        .iter()
        .skip(offset)
        .take(limit)
        .map(|record| project(record, &fields))
        .collect();

    Ok(Json(json!({ "data": page })))
}

async fn create_record(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    state.check_credentials(&uri, &headers, &body)?;

    let created = state.insert(&collection, body["record"].clone());
    Ok(Json(json!({ "data": created })))
}

async fn update_record(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, i64)>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    state.check_credentials(&uri, &headers, &body)?;

    let record = state
        .live_record_mut(&collection, id)
        .ok_or(StatusCode::NOT_FOUND)?;
    if let (Some(stored), Some(changes)) = (record.as_object_mut(), body["record"].as_object()) {
        for (field, value) in changes {
            stored.insert(field.clone(), value.clone());
        }
    }

    Ok(Json(json!({ "data": record.clone() })))
}

async fn delete_record(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, i64)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    state.check_credentials(&uri, &headers, &Value::Null)?;

    let record = state
        .live_record_mut(&collection, id)
        .ok_or(StatusCode::NOT_FOUND)?;
    record["IsDeleted"] = json!(true);

    Ok(Json(json!({})))
}

async fn session(
    State(state): State<SharedState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    state.check_credentials(&uri, &headers, &Value::Null)?;

    Ok(Json(json!({ "authenticated": true })))
}

async fn logout(
    State(state): State<SharedState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    state.check_credentials(&uri, &headers, &Value::Null)?;

    Ok(Json(json!({})))
}
