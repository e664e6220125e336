use crate::domain::RecordId;
use crate::domain::session::SessionExpired;
use crate::external_connections::ExternalConnectivity;
use crate::persistence::records::fields;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Number of records requested per page when reading a whole collection
pub const PAGE_SIZE: u32 = 100;
/// Upper bound on the pages one [RemoteDataClient::fetch_all] call will request
pub const MAX_PAGES: u32 = 1000;
/// Header carrying the application identifier the backend scopes every request to
const APPLICATION_ID_HEADER: &str = "X-Application-Id";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("could not reach the backend: {0}")]
    Transport(#[from] reqwest_middleware::Error),
    #[error("the backend rejected the session credentials")]
    Unauthorized(#[from] SessionExpired),
    #[error("the backend answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("the backend response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("the backend response did not contain a record")]
    MissingData,
    #[error("the backend kept returning full pages after {pages} requests")]
    Paging { pages: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl Filter {
    pub fn equals(field: &str, value: impl Into<Value>) -> Filter {
        Filter {
            field: field.to_owned(),
            operator: FilterOperator::Equals,
            value: value.into(),
        }
    }

    pub fn not_equals(field: &str, value: impl Into<Value>) -> Filter {
        Filter {
            field: field.to_owned(),
            operator: FilterOperator::NotEquals,
            value: value.into(),
        }
    }

    pub fn id_equals(field: &str, id: &RecordId) -> Filter {
        Filter::equals(field, id_value(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PagingInfo {
    pub limit: u32,
    pub offset: u32,
}

/// A filtered, ordered, paginated read. Every query excludes soft-deleted records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchQuery {
    pub fields: Vec<String>,
    pub filters: Vec<Filter>,
    pub paging_info: PagingInfo,
    pub order_by: Vec<Ordering>,
}

impl FetchQuery {
    pub fn new(requested_fields: &[&str]) -> FetchQuery {
        FetchQuery {
            fields: requested_fields.iter().map(|field| (*field).to_owned()).collect(),
            filters: vec![Filter::equals(fields::IS_DELETED, false)],
            paging_info: PagingInfo {
                limit: PAGE_SIZE,
                offset: 0,
            },
            order_by: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> FetchQuery {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> FetchQuery {
        self.order_by.push(Ordering {
            field: field.to_owned(),
            direction,
        });
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> FetchQuery {
        self.paging_info = PagingInfo { limit, offset };
        self
    }
}

#[derive(Serialize)]
struct RecordEnvelope<'fields, F> {
    record: &'fields F,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct SessionStatus {
    authenticated: bool,
}

fn id_value(id: &RecordId) -> Value {
    match id {
        RecordId::Numeric(number) => Value::from(*number),
        RecordId::Text(text) => Value::from(text.as_str()),
    }
}

/// Client for the hosted backend's record API. Requests go through the connectivity's HTTP
/// client so they carry its tracing middleware.
#[derive(Debug, Clone)]
pub struct RemoteDataClient {
    base_url: String,
    application_id: String,
    api_token: Option<String>,
    max_pages: u32,
}

impl RemoteDataClient {
    pub fn new(base_url: &str, application_id: &str, api_token: Option<String>) -> Self {
        RemoteDataClient {
            base_url: base_url.trim_end_matches('/').to_owned(),
            application_id: application_id.to_owned(),
            api_token,
            max_pages: MAX_PAGES,
        }
    }

    /// Lowers the number of pages [RemoteDataClient::fetch_all] requests before giving up
    pub fn with_max_pages(self, max_pages: u32) -> Self {
        RemoteDataClient { max_pages, ..self }
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/collections/{collection}/records", self.base_url)
    }

    fn record_url(&self, collection: &str, id: &RecordId) -> String {
        format!("{}/{id}", self.records_url(collection))
    }

    fn authorize(
        &self,
        request: reqwest_middleware::RequestBuilder,
    ) -> reqwest_middleware::RequestBuilder {
        let request = request.header(APPLICATION_ID_HEADER, &self.application_id);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetches a single page of records matching [query]
    #[tracing::instrument(skip(self, query, ext_cxn))]
    pub async fn fetch_records<R: DeserializeOwned>(
        &self,
        collection: &str,
        query: &FetchQuery,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<R>, RemoteError> {
        let request = ext_cxn
            .http_client()
            .post(format!("{}/query", self.records_url(collection)))
            .json(query);
        let response = check_status(self.authorize(request).send().await?).await?;

        let envelope: DataEnvelope<Vec<R>> =
            response.json().await.map_err(RemoteError::Decode)?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Fetches every record matching [query], requesting pages until the backend runs out.
    /// A backend that still returns full pages after the page limit yields [RemoteError::Paging].
    pub async fn fetch_all<R: DeserializeOwned>(
        &self,
        collection: &str,
        query: FetchQuery,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<R>, RemoteError> {
        let mut records = Vec::new();
        let mut offset = 0;
        for _ in 0..self.max_pages {
            let page_query = query.clone().page(PAGE_SIZE, offset);
            let page: Vec<R> = self.fetch_records(collection, &page_query, ext_cxn).await?;
            let page_len = page.len();
            records.extend(page);

            if page_len < PAGE_SIZE as usize {
                return Ok(records);
            }
            offset += PAGE_SIZE;
        }

        Err(RemoteError::Paging {
            pages: self.max_pages,
        })
    }

    #[tracing::instrument(skip(self, record_fields, ext_cxn))]
    pub async fn create_record<F: Serialize, R: DeserializeOwned>(
        &self,
        collection: &str,
        record_fields: &F,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<R, RemoteError> {
        let request = ext_cxn
            .http_client()
            .post(self.records_url(collection))
            .json(&RecordEnvelope {
                record: record_fields,
            });
        let response = check_status(self.authorize(request).send().await?).await?;

        let envelope: DataEnvelope<R> = response.json().await.map_err(RemoteError::Decode)?;
        envelope.data.ok_or(RemoteError::MissingData)
    }

    /// Updates the fields present in [record_fields], leaving the rest untouched
    #[tracing::instrument(skip(self, record_fields, ext_cxn))]
    pub async fn update_record<F: Serialize, R: DeserializeOwned>(
        &self,
        collection: &str,
        id: &RecordId,
        record_fields: &F,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<R, RemoteError> {
        let request = ext_cxn
            .http_client()
            .patch(self.record_url(collection, id))
            .json(&RecordEnvelope {
                record: record_fields,
            });
        let response = check_status(self.authorize(request).send().await?).await?;

        let envelope: DataEnvelope<R> = response.json().await.map_err(RemoteError::Decode)?;
        envelope.data.ok_or(RemoteError::MissingData)
    }

    /// Deletes a record. A record that no longer exists counts as deleted.
    #[tracing::instrument(skip(self, ext_cxn))]
    pub async fn delete_record(
        &self,
        collection: &str,
        id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), RemoteError> {
        let request = ext_cxn.http_client().delete(self.record_url(collection, id));
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Record {id} in {collection} was already gone");
            return Ok(());
        }

        check_status(response).await?;
        Ok(())
    }

    pub async fn session_status(
        &self,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<bool, RemoteError> {
        let request = ext_cxn
            .http_client()
            .get(format!("{}/auth/session", self.base_url));
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(false);
        }

        let status: SessionStatus = check_status(response)
            .await?
            .json()
            .await
            .map_err(RemoteError::Decode)?;
        Ok(status.authenticated)
    }

    pub async fn end_session(
        &self,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), RemoteError> {
        let request = ext_cxn
            .http_client()
            .post(format!("{}/auth/logout", self.base_url));
        check_status(self.authorize(request).send().await?).await?;

        Ok(())
    }
}

/// Turns non-success responses into [RemoteError]s
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized(SessionExpired));
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn queries_always_exclude_soft_deleted_records() {
        let query = FetchQuery::new(fields::LIST_FIELDS)
            .order_by(fields::CREATED_ON, Direction::Asc);

        let serialized = serde_json::to_value(&query).expect("query should serialize");
        assert_eq!(
            json!({
                "fields": ["Id", "Name", "color"],
                "filters": [{ "field": "IsDeleted", "operator": "equals", "value": false }],
                "pagingInfo": { "limit": 100, "offset": 0 },
                "orderBy": [{ "field": "CreatedOn", "direction": "asc" }],
            }),
            serialized
        );
    }

    #[test]
    fn id_filters_keep_the_id_type() {
        let numeric = Filter::id_equals(fields::LIST, &RecordId::from(12));
        let text = Filter::id_equals(fields::LIST, &RecordId::from("abc"));

        assert_eq!(json!(12), numeric.value);
        assert_eq!(json!("abc"), text.value);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        name: String,
    }

    #[test]
    fn envelopes_without_data_decode_to_nothing() {
        let empty: DataEnvelope<Named> =
            serde_json::from_value(json!({})).expect("envelope should decode");
        let filled: DataEnvelope<Named> =
            serde_json::from_value(json!({ "data": { "name": "Inbox" } }))
                .expect("envelope should decode");

        assert_eq!(None, empty.data);
        assert_eq!(
            Some(Named {
                name: "Inbox".to_owned()
            }),
            filled.data
        );
    }

    #[test]
    fn not_equals_filters_serialize_in_snake_case() {
        let filter = Filter::not_equals(fields::IS_COMPLETED, true);

        assert_eq!(
            json!({ "field": "isCompleted", "operator": "not_equals", "value": true }),
            serde_json::to_value(&filter).expect("filter should serialize")
        );
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = RemoteDataClient::new("https://api.example.com/", "app", None);

        assert_eq!(
            "https://api.example.com/collections/task16/records/5",
            client.record_url("task16", &RecordId::from(5))
        );
    }
}
