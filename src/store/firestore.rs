//! Cloud Firestore registry backend (REST v1).
//!
//! Each user is a document in one collection: the document id is the token,
//! with fields `Name` (string) and `Admin` (boolean).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use super::auth::{AccessTokenSource, GoogleCredentials, StaticToken};
use super::{StoreError, UserStore};
use crate::config::FirestoreConfig;
use crate::models::UserRecord;

const NAME_FIELD: &str = "Name";
const ADMIN_FIELD: &str = "Admin";

pub struct FirestoreStore {
    client: reqwest::Client,
    /// `{base}/v1/projects/{project}/databases/(default)/documents`
    documents_url: Url,
    run_query_url: Url,
    collection: String,
    /// `None` for the emulator, which takes no credentials.
    auth: Option<Arc<dyn AccessTokenSource>>,
}

impl FirestoreStore {
    /// Build the production store. Credentials come from, in order: none for
    /// the emulator, `FIRESTORE_ACCESS_TOKEN`, then application default
    /// credentials.
    pub async fn new(cfg: &FirestoreConfig, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let configured_project = cfg.project_id.clone().filter(|p| !p.is_empty());

        let (auth, project_id): (Option<Arc<dyn AccessTokenSource>>, Option<String>) =
            if cfg.emulator {
                (None, configured_project)
            } else if let Some(token) = &cfg.access_token {
                (
                    Some(Arc::new(StaticToken::new(token.clone())) as Arc<dyn AccessTokenSource>),
                    configured_project,
                )
            } else {
                let credentials = GoogleCredentials::discover().await.context(
                    "no Google application default credentials found; \
                     set FIRESTORE_ACCESS_TOKEN or FIRESTORE_EMULATOR_HOST",
                )?;
                let project_id = match configured_project {
                    Some(p) => Some(p),
                    None => credentials.project_id().await.ok(),
                };
                (Some(Arc::new(credentials) as Arc<dyn AccessTokenSource>), project_id)
            };
        let project_id =
            project_id.context("PROJECT_ID must be set for the firestore registry")?;

        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build registry HTTP client")?;

        let base = Url::parse(&cfg.base_url)
            .with_context(|| format!("invalid firestore base URL: {}", cfg.base_url))?;
        Self::with_client(client, base, &project_id, &cfg.collection, auth)
    }

    pub fn with_client(
        client: reqwest::Client,
        base: Url,
        project_id: &str,
        collection: &str,
        auth: Option<Arc<dyn AccessTokenSource>>,
    ) -> anyhow::Result<Self> {
        let mut documents_url = base;
        documents_url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("firestore base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v1", "projects", project_id, "databases", "(default)", "documents"]);
        let run_query_url = Url::parse(&format!("{}:runQuery", documents_url))
            .context("failed to build firestore query URL")?;

        Ok(Self {
            client,
            documents_url,
            run_query_url,
            collection: collection.to_string(),
            auth,
        })
    }

    /// URL of the document for `token`, or `None` for ids Firestore cannot address.
    fn document_url(&self, token: &str) -> Option<Url> {
        if !is_valid_document_id(token) {
            return None;
        }
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .ok()?
            .extend([self.collection.as_str(), token]);
        Some(url)
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: Url,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        let req = self.client.request(method, url);
        Ok(match &self.auth {
            Some(auth) => req.bearer_auth(auth.access_token().await?),
            None => req,
        })
    }
}

#[async_trait]
impl UserStore for FirestoreStore {
    async fn get_by_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError> {
        let Some(url) = self.document_url(token) else {
            return Ok(None);
        };
        let resp = self.request(reqwest::Method::GET, url).await?.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc: Document = check(resp).await?.json().await.map_err(decode_error)?;
        doc.into_record(token.to_string()).map(Some)
    }

    async fn create_or_replace(&self, record: &UserRecord) -> Result<(), StoreError> {
        let url = self.document_url(&record.token).ok_or_else(|| {
            StoreError::Decode(format!("'{}' is not a valid document id", record.token))
        })?;
        let body = Document {
            name: None,
            fields: Fields {
                name: Some(StringValue {
                    string_value: record.name.clone(),
                }),
                admin: Some(BooleanValue {
                    boolean_value: record.is_admin,
                }),
            },
        };
        let resp = self
            .request(reqwest::Method::PATCH, url)
            .await?
            .json(&body)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn find_all_by_name(&self, name: &str) -> Result<Vec<UserRecord>, StoreError> {
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": NAME_FIELD },
                        "op": "EQUAL",
                        "value": { "stringValue": name },
                    }
                }
            }
        });
        let resp = self
            .request(reqwest::Method::POST, self.run_query_url.clone())
            .await?
            .json(&query)
            .send()
            .await?;
        let rows: Vec<QueryRow> = check(resp).await?.json().await.map_err(decode_error)?;

        rows.into_iter()
            .filter_map(|row| row.document)
            .map(|doc| {
                let token = doc
                    .name
                    .as_deref()
                    .and_then(|n| n.rsplit('/').next())
                    .map(str::to_string)
                    .ok_or_else(|| StoreError::Decode("query result without document name".into()))?;
                doc.into_record(token)
            })
            .collect()
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        let Some(url) = self.document_url(token) else {
            return Ok(());
        };
        let resp = self.request(reqwest::Method::DELETE, url).await?.send().await?;
        check(resp).await?;
        Ok(())
    }

    async fn update_admin_flag(&self, token: &str, is_admin: bool) -> Result<bool, StoreError> {
        let Some(mut url) = self.document_url(token) else {
            return Ok(false);
        };
        // the exists precondition keeps a vanished record from being recreated without a name
        url.query_pairs_mut()
            .append_pair("updateMask.fieldPaths", ADMIN_FIELD)
            .append_pair("currentDocument.exists", "true");
        let body = json!({ "fields": { "Admin": { "booleanValue": is_admin } } });
        let resp = self
            .request(reqwest::Method::PATCH, url)
            .await?
            .json(&body)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp).await?;
        Ok(true)
    }
}

/// Firestore rejects ids that are empty, contain '/', are '.' or '..',
/// or match `__.*__`.
fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 1500
        && id != "."
        && id != ".."
        && !id.contains('/')
        && !(id.len() >= 4 && id.starts_with("__") && id.ends_with("__"))
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<ErrorBody>()
        .await
        .map(|b| b.error.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

fn decode_error(e: reqwest::Error) -> StoreError {
    StoreError::Decode(e.without_url().to_string())
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    fields: Fields,
}

impl Document {
    fn into_record(self, token: String) -> Result<UserRecord, StoreError> {
        let name = self
            .fields
            .name
            .ok_or_else(|| StoreError::Decode(format!("document {} has no {} field", token, NAME_FIELD)))?
            .string_value;
        Ok(UserRecord {
            token,
            name,
            is_admin: self.fields.admin.map(|a| a.boolean_value).unwrap_or(false),
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Fields {
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    name: Option<StringValue>,
    #[serde(rename = "Admin", default, skip_serializing_if = "Option::is_none")]
    admin: Option<BooleanValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StringValue {
    #[serde(rename = "stringValue")]
    string_value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct BooleanValue {
    #[serde(rename = "booleanValue")]
    boolean_value: bool,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
