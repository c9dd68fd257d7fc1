//! Firestore REST adapter
//!
//! Entries live in the `timeEntries` collection with the fields `type`,
//! `timestamp`, `userId` and `companyId`. Writes go through
//! `documents:commit` so `timestamp` can be set by a `REQUEST_TIME` server
//! transform; reads go through `documents:runQuery`.
//!
//! Every call carries the signed-in user's ID token as a bearer token, so
//! the project's security rules apply as they would to a browser client.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use super::{keep_decoded, EntryStore, StorageError, StorageResult};
use crate::auth::Identity;
use crate::entry::{CompanyId, EntryType, NewEntry, TimeEntry};

/// Collection holding the entries
pub const COLLECTION: &str = "timeEntries";

/// Configuration for the Firestore adapter
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Database id, "(default)" unless the project uses named databases
    pub database_id: String,
    /// API base, e.g. "https://firestore.googleapis.com/v1"
    pub base_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            database_id: "(default)".to_string(),
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl FirestoreConfig {
    /// Resource name of the documents root
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database_id
        )
    }
}

/// Entry store backed by Cloud Firestore
pub struct FirestoreStore {
    client: Client,
    config: FirestoreConfig,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.documents_root(),
            method
        )
    }

    async fn post<B: Serialize>(
        &self,
        auth: &Identity,
        method: &str,
        body: &B,
    ) -> StorageResult<reqwest::Response> {
        let token = auth.id_token().ok_or(StorageError::Unauthenticated)?;

        let response = self
            .client
            .post(self.endpoint(method))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(StorageError::Api { status, message })
        }
    }
}

#[async_trait]
impl EntryStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn append(&self, auth: &Identity, entry: NewEntry) -> StorageResult<TimeEntry> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let body = commit_body(&self.config.documents_root(), &id, &entry);

        let response: CommitResponse = self.post(auth, "commit", &body).await?.json().await?;
        let timestamp = commit_timestamp(&response)?;

        tracing::debug!(entry_id = %id, user_id = %entry.user_id, "Entry committed to Firestore");
        Ok(entry.into_entry(id, timestamp))
    }

    async fn entries_since(
        &self,
        auth: &Identity,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<TimeEntry>> {
        let body = query_body(user_id, since);
        let rows: Vec<QueryRow> = self.post(auth, "runQuery", &body).await?.json().await?;

        Ok(decode_rows(rows))
    }
}

/// Body for `documents:commit`: create the document, then stamp it
fn commit_body(documents_root: &str, id: &str, entry: &NewEntry) -> serde_json::Value {
    json!({
        "writes": [{
            "update": {
                "name": format!("{}/{}/{}", documents_root, COLLECTION, id),
                "fields": {
                    "type": { "stringValue": entry.entry_type.as_str() },
                    "userId": { "stringValue": entry.user_id },
                    "companyId": { "stringValue": entry.company_id.as_str() },
                },
            },
            "updateTransforms": [{
                "fieldPath": "timestamp",
                "setToServerValue": "REQUEST_TIME",
            }],
            "currentDocument": { "exists": false },
        }]
    })
}

/// Body for `documents:runQuery`
fn query_body(user_id: &str, since: DateTime<Utc>) -> serde_json::Value {
    let since_value = since.to_rfc3339_opts(SecondsFormat::Micros, true);
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": COLLECTION }],
            "where": {
                "compositeFilter": {
                    "op": "AND",
                    "filters": [
                        {
                            "fieldFilter": {
                                "field": { "fieldPath": "userId" },
                                "op": "EQUAL",
                                "value": { "stringValue": user_id },
                            }
                        },
                        {
                            "fieldFilter": {
                                "field": { "fieldPath": "timestamp" },
                                "op": "GREATER_THAN_OR_EQUAL",
                                "value": { "timestampValue": since_value },
                            }
                        },
                    ],
                }
            },
            "orderBy": [{
                "field": { "fieldPath": "timestamp" },
                "direction": "DESCENDING",
            }],
        }
    })
}

fn commit_timestamp(response: &CommitResponse) -> StorageResult<DateTime<Utc>> {
    let value = response
        .write_results
        .first()
        .and_then(|w| w.transform_results.first())
        .and_then(|v| v.timestamp_value.as_deref())
        .or(response.commit_time.as_deref())
        .ok_or_else(|| StorageError::Decode("commit response had no timestamp".to_string()))?;

    parse_timestamp(value)
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Decode(format!("bad timestamp {:?}: {}", value, e)))
}

/// Entries of a `runQuery` response; rows without a document are progress
/// markers
fn decode_rows(rows: Vec<QueryRow>) -> Vec<TimeEntry> {
    rows.into_iter()
        .filter_map(|row| row.document)
        .filter_map(|doc| keep_decoded(decode_document(&doc)))
        .collect()
}

fn decode_document(doc: &Document) -> StorageResult<TimeEntry> {
    let id = doc
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let string_field = |key: &str| -> StorageResult<&str> {
        doc.fields
            .get(key)
            .and_then(|v| v.string_value.as_deref())
            .ok_or_else(|| StorageError::Decode(format!("document {}: missing {}", id, key)))
    };

    let entry_type: EntryType = string_field("type")?
        .parse()
        .map_err(|e| StorageError::Decode(format!("document {}: {}", id, e)))?;
    let user_id = string_field("userId")?.to_string();
    let company_id = CompanyId::new(string_field("companyId")?)
        .ok_or_else(|| StorageError::Decode(format!("document {}: empty companyId", id)))?;
    let timestamp = doc
        .fields
        .get("timestamp")
        .and_then(|v| v.timestamp_value.as_deref())
        .ok_or_else(|| StorageError::Decode(format!("document {}: missing timestamp", id)))
        .and_then(parse_timestamp)?;

    Ok(TimeEntry {
        id,
        entry_type,
        timestamp,
        user_id,
        company_id,
    })
}

// ============================================
// Response DTOs
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    write_results: Vec<WriteResult>,
    #[serde(default)]
    commit_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteResult {
    #[serde(default)]
    transform_results: Vec<FieldValue>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    #[serde(default)]
    string_value: Option<String>,
    #[serde(default)]
    timestamp_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> FirestoreStore {
        FirestoreStore::new(FirestoreConfig {
            project_id: "demo-time".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoints() {
        let store = store();
        assert_eq!(
            store.endpoint("runQuery"),
            "https://firestore.googleapis.com/v1/projects/demo-time/databases/(default)/documents:runQuery"
        );
        assert_eq!(
            store.endpoint("commit"),
            "https://firestore.googleapis.com/v1/projects/demo-time/databases/(default)/documents:commit"
        );
    }

    #[test]
    fn test_commit_body_uses_server_timestamp() {
        let entry = NewEntry::new(EntryType::BreakStart, "u1", CompanyId::new("acme").unwrap());
        let body = commit_body("projects/p/databases/(default)/documents", "abc", &entry);
        let write = &body["writes"][0];

        assert_eq!(
            write["update"]["name"],
            "projects/p/databases/(default)/documents/timeEntries/abc"
        );
        assert_eq!(write["update"]["fields"]["type"]["stringValue"], "BREAK_START");
        assert_eq!(write["update"]["fields"]["userId"]["stringValue"], "u1");
        assert_eq!(write["update"]["fields"]["companyId"]["stringValue"], "acme");
        assert!(write["update"]["fields"].get("timestamp").is_none());
        assert_eq!(write["updateTransforms"][0]["fieldPath"], "timestamp");
        assert_eq!(write["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");
    }

    #[test]
    fn test_query_body() {
        let since = Utc.with_ymd_and_hms(2025, 3, 4, 23, 0, 0).unwrap();
        let body = query_body("u1", since);
        let query = &body["structuredQuery"];

        assert_eq!(query["from"][0]["collectionId"], "timeEntries");
        let filters = &query["where"]["compositeFilter"]["filters"];
        assert_eq!(filters[0]["fieldFilter"]["op"], "EQUAL");
        assert_eq!(filters[0]["fieldFilter"]["value"]["stringValue"], "u1");
        assert_eq!(filters[1]["fieldFilter"]["op"], "GREATER_THAN_OR_EQUAL");
        assert_eq!(
            filters[1]["fieldFilter"]["value"]["timestampValue"],
            "2025-03-04T23:00:00.000000Z"
        );
        assert_eq!(query["orderBy"][0]["direction"], "DESCENDING");
    }

    #[test]
    fn test_decode_query_rows() {
        let json = r#"[
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/timeEntries/doc2",
                    "fields": {
                        "type": { "stringValue": "CLOCK_OUT" },
                        "userId": { "stringValue": "u1" },
                        "companyId": { "stringValue": "acme" },
                        "timestamp": { "timestampValue": "2025-03-05T17:00:00.123456Z" }
                    },
                    "createTime": "2025-03-05T17:00:00.123456Z",
                    "updateTime": "2025-03-05T17:00:00.123456Z"
                },
                "readTime": "2025-03-05T17:01:00Z"
            },
            { "readTime": "2025-03-05T17:01:00Z" }
        ]"#;

        let rows: Vec<QueryRow> = serde_json::from_str(json).unwrap();
        let entries: Vec<TimeEntry> = rows
            .into_iter()
            .filter_map(|r| r.document)
            .map(|d| decode_document(&d))
            .collect::<StorageResult<_>>()
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "doc2");
        assert_eq!(entries[0].entry_type, EntryType::ClockOut);
        assert_eq!(entries[0].company_id.as_str(), "acme");
        assert_eq!(
            entries[0].timestamp,
            Utc.with_ymd_and_hms(2025, 3, 5, 17, 0, 0).unwrap()
                + chrono::Duration::microseconds(123_456)
        );
    }

    #[test]
    fn test_decode_rows_skips_unknown_types() {
        let doc = |id: &str, entry_type: &str| {
            format!(
                r#"{{ "document": {{
                    "name": "projects/p/databases/(default)/documents/timeEntries/{}",
                    "fields": {{
                        "type": {{ "stringValue": "{}" }},
                        "userId": {{ "stringValue": "u1" }},
                        "companyId": {{ "stringValue": "acme" }},
                        "timestamp": {{ "timestampValue": "2025-03-05T09:00:00Z" }}
                    }}
                }} }}"#,
                id, entry_type
            )
        };
        let json = format!("[{}, {}]", doc("late", "OVERTIME"), doc("early", "CLOCK_IN"));

        let rows: Vec<QueryRow> = serde_json::from_str(&json).unwrap();
        let entries = decode_rows(rows);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "early");
        assert_eq!(entries[0].entry_type, EntryType::ClockIn);
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let doc = Document {
            name: "projects/p/databases/(default)/documents/timeEntries/x".to_string(),
            fields: HashMap::new(),
        };
        assert!(matches!(decode_document(&doc), Err(StorageError::Decode(_))));
    }

    #[test]
    fn test_commit_timestamp_prefers_transform_result() {
        let json = r#"{
            "writeResults": [{
                "updateTime": "2025-03-05T08:00:00.500000Z",
                "transformResults": [{ "timestampValue": "2025-03-05T08:00:00.400000Z" }]
            }],
            "commitTime": "2025-03-05T08:00:00.500000Z"
        }"#;
        let resp: CommitResponse = serde_json::from_str(json).unwrap();
        let ts = commit_timestamp(&resp).unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 400);
    }

    #[tokio::test]
    async fn test_requires_id_token() {
        let store = store();
        let anonymous = Identity::new("u1", None);
        let err = store
            .entries_since(&anonymous, "u1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unauthenticated));
    }
}
