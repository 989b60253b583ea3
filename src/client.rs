//! Typed client for the HTTP API, as used by the web frontend.
//!
//! Keeps the session cookie between calls, so a client that completed the
//! Google sign-in (or a dev login) stays authenticated.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::Error;

/// Payload for `POST /categories`.
#[derive(Debug, Clone, Serialize)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Partial update for `PUT /categories/{id}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Query for `GET /emails`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

/// Options for `POST /process/sync`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_spam: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_trash: Option<bool>,
}

/// `GET /auth/user` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub user: crate::middleware::Principal,
}

/// API client rooted at `{base_url}/api`.
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` cannot carry a path, or
    /// [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &Url) -> Result<Self, Error> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Self::with_http_client(base_url, http)
    }

    /// Use a custom HTTP client; it should keep cookies for the session to stick.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` cannot carry a path.
    pub fn with_http_client(base_url: &Url, http: reqwest::Client) -> Result<Self, Error> {
        let mut base = base_url.clone();
        base.path_segments_mut()
            .map_err(|()| Error::Config(format!("{base_url} cannot be a base URL")))?
            .pop_if_empty()
            .push("api")
            .push("");
        Ok(Self { base, http })
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("invalid API path {path}: {e}")))
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, Error> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                detail,
            });
        }
        response.json::<T>().await.map_err(Into::into)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.send(self.http.get(self.url(path)?)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T, Error> {
        self.send(self.http.post(self.url(path)?).json(body)).await
    }

    // ── Auth ───────────────────────────────────────────────────────

    /// Where the browser goes to start Google sign-in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL cannot be built.
    pub fn google_auth_url(&self) -> Result<Url, Error> {
        self.url("auth/google")
    }

    /// # Errors
    ///
    /// [`Error::Api`] with status 401 when not signed in.
    pub async fn get_current_user(&self) -> Result<CurrentUser, Error> {
        self.get("auth/user").await
    }

    /// # Errors
    ///
    /// [`Error::Api`] with status 401 when not signed in.
    pub async fn logout(&self) -> Result<Value, Error> {
        self.post("auth/logout", &json!({})).await
    }

    // ── Categories ─────────────────────────────────────────────────

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn list_categories(&self) -> Result<Value, Error> {
        self.get("categories").await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn create_category(&self, category: &NewCategory) -> Result<Value, Error> {
        self.post("categories", category).await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn update_category(&self, id: &str, update: &CategoryUpdate) -> Result<Value, Error> {
        let url = self.url(&format!("categories/{}", urlencoding::encode(id)))?;
        self.send(self.http.put(url).json(update)).await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn delete_category(&self, id: &str) -> Result<Value, Error> {
        let url = self.url(&format!("categories/{}", urlencoding::encode(id)))?;
        self.send(self.http.delete(url)).await
    }

    // ── Emails ─────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn list_emails(&self, query: &EmailQuery) -> Result<Value, Error> {
        self.send(self.http.get(self.url("emails")?).query(query)).await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn get_email(&self, id: &str) -> Result<Value, Error> {
        self.get(&format!("emails/{}", urlencoding::encode(id))).await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn list_emails_by_category(
        &self,
        category_id: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Value, Error> {
        let url = self.url(&format!("emails/category/{}", urlencoding::encode(category_id)))?;
        let query = EmailQuery {
            limit,
            offset,
            ..EmailQuery::default()
        };
        self.send(self.http.get(url).query(&query)).await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn delete_email(&self, id: &str) -> Result<Value, Error> {
        let url = self.url(&format!("emails/{}", urlencoding::encode(id)))?;
        self.send(self.http.delete(url)).await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn bulk_delete_emails(&self, email_ids: &[String]) -> Result<Value, Error> {
        self.post("emails/bulk-delete", &json!({ "emailIds": email_ids }))
            .await
    }

    // ── Processing ─────────────────────────────────────────────────

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn sync_emails(&self, options: &SyncOptions) -> Result<Value, Error> {
        self.post("process/sync", options).await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn categorize_email(&self, email_id: &str) -> Result<Value, Error> {
        self.post("process/categorize", &json!({ "emailId": email_id }))
            .await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn unsubscribe(&self, email_id: &str) -> Result<Value, Error> {
        self.post("process/unsubscribe", &json!({ "emailId": email_id }))
            .await
    }

    /// # Errors
    ///
    /// Network failure or non-2xx status.
    pub async fn bulk_unsubscribe(&self, email_ids: &[String]) -> Result<Value, Error> {
        self.post("process/bulk-unsubscribe", &json!({ "emailIds": email_ids }))
            .await
    }
}
