//! HTTP client for the back-office REST API.
//!
//! One method per endpoint, one round trip per call. Failure envelopes are rebuilt into
//! [`Error::Remote`] carrying the wire [`ErrorKind`], so callers branch on the same taxonomy
//! the server uses. Nothing here retries.

use crate::{
    api::{
        reports::{Dashboard, RecordQuery, WindowQuery},
        response::ApiResponse,
        users::LoginRequest,
    },
    core::{
        catalog::{BatchDeleteRequest, BatchOutcome, Page, PageRequest},
        ledger::{
            LedgerReceipt, MaterialInRequest, MaterialOutRequest, ProductInRequest,
            ProductOutRequest, ProductRestoreRequest,
        },
        material::{MaterialChanges, NewMaterial, PriceChange, PricePreview},
        product::{NewProduct, ProductChanges},
        record::RecordPage,
        statistics::{Summary, TopProduct, TrendPoint},
        user::{LoginOutcome, NewUser, SessionUser, UserChanges, UserView},
        views::{MaterialView, ProductView},
    },
    entities::{operation_record, user},
    errors::{Error, ErrorKind, Result},
};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated client for one backend.
///
/// Cloning is cheap; clones share the connection pool and the session token.
#[derive(Debug, Clone)]
pub struct BackOfficeClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl BackOfficeClient {
    /// Creates a client for `base_url` (e.g. `http://127.0.0.1:5274`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Backend root this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current bearer token, if logged in.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Replaces the bearer token, e.g. to resume a stored session.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Forgets the session without telling the server.
    pub async fn clear_session(&self) {
        self.set_token(None).await;
    }

    /// True while a token is held.
    pub async fn is_logged_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    /// Builds `base_url/seg/seg..` with every segment percent-encoded, so free-form
    /// values such as usernames always land in exactly one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::validation(format!("Invalid backend URL '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| Error::validation(format!("Backend URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let builder = match self.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!("Backend answered {status} ({} bytes)", body.len());
        decode_envelope(status, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(self.request(Method::GET, path)).await
    }

    async fn get_with<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.execute(self.request(Method::GET, path).query(query))
            .await
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(self.request(method, path).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.execute(self.request(Method::DELETE, path)).await
    }

    // --- Session ---

    /// Logs in and stores the returned token.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let outcome: LoginOutcome = self.send_json(Method::POST, "/login", &request).await?;
        self.set_token(Some(outcome.token.clone())).await;
        info!("Logged in to {} as '{}'", self.base_url, outcome.user.username);
        Ok(outcome)
    }

    /// Ends the session on the server, then forgets the token.
    ///
    /// The token is dropped even when the server call fails.
    pub async fn logout(&self) -> Result<()> {
        let result: Result<()> = self.execute(self.request(Method::POST, "/logout")).await;
        self.clear_session().await;
        result
    }

    /// The caller behind the current token.
    pub async fn session(&self) -> Result<SessionUser> {
        self.get("/session").await
    }

    // --- Materials ---

    /// Every material, unpaged.
    pub async fn list_materials(&self) -> Result<Vec<MaterialView>> {
        let page: Page<MaterialView> = self.get("/materials").await?;
        Ok(page.items)
    }

    /// One page of materials.
    pub async fn list_materials_page(&self, paging: PageRequest) -> Result<Page<MaterialView>> {
        self.get_with("/materials", &paging).await
    }

    /// Fetches a material by id.
    pub async fn get_material(&self, id: i64) -> Result<MaterialView> {
        self.get(&format!("/materials/{id}")).await
    }

    /// Creates a material.
    pub async fn create_material(&self, input: &NewMaterial) -> Result<MaterialView> {
        self.send_json(Method::POST, "/materials", input).await
    }

    /// Updates a material; price changes reprice dependent products server-side.
    pub async fn update_material(&self, id: i64, changes: &MaterialChanges) -> Result<MaterialView> {
        self.send_json(Method::PUT, &format!("/materials/{id}"), changes)
            .await
    }

    /// Deletes a material.
    pub async fn delete_material(&self, id: i64) -> Result<()> {
        self.delete(&format!("/materials/{id}")).await
    }

    /// Deletes several materials, reporting the ones that were kept.
    pub async fn batch_delete_materials(&self, ids: &[i64]) -> Result<BatchOutcome> {
        let request = BatchDeleteRequest { ids: ids.to_vec() };
        self.send_json(Method::POST, "/materials/batch-delete", &request)
            .await
    }

    /// Receives material into stock.
    pub async fn material_in(&self, request: &MaterialInRequest) -> Result<LedgerReceipt> {
        self.send_json(Method::POST, "/materials/in", request).await
    }

    /// Ships material out of stock.
    pub async fn material_out(&self, request: &MaterialOutRequest) -> Result<LedgerReceipt> {
        self.send_json(Method::POST, "/materials/out", request).await
    }

    /// Previews how a price change would move dependent products.
    pub async fn check_products(&self, id: i64, change: &PriceChange) -> Result<PricePreview> {
        self.send_json(Method::POST, &format!("/materials/{id}/check-products"), change)
            .await
    }

    // --- Products ---

    /// Every product, unpaged.
    pub async fn list_products(&self) -> Result<Vec<ProductView>> {
        let page: Page<ProductView> = self.get("/products").await?;
        Ok(page.items)
    }

    /// One page of products.
    pub async fn list_products_page(&self, paging: PageRequest) -> Result<Page<ProductView>> {
        self.get_with("/products", &paging).await
    }

    /// Fetches a product by id.
    pub async fn get_product(&self, id: i64) -> Result<ProductView> {
        self.get(&format!("/products/{id}")).await
    }

    /// Creates a product.
    pub async fn create_product(&self, input: &NewProduct) -> Result<ProductView> {
        self.send_json(Method::POST, "/products", input).await
    }

    /// Updates a product.
    pub async fn update_product(&self, id: i64, changes: &ProductChanges) -> Result<ProductView> {
        self.send_json(Method::PUT, &format!("/products/{id}"), changes)
            .await
    }

    /// Deletes a product.
    pub async fn delete_product(&self, id: i64) -> Result<()> {
        self.delete(&format!("/products/{id}")).await
    }

    /// Deletes several products, reporting the ones that were kept.
    pub async fn batch_delete_products(&self, ids: &[i64]) -> Result<BatchOutcome> {
        let request = BatchDeleteRequest { ids: ids.to_vec() };
        self.send_json(Method::POST, "/products/batch-delete", &request)
            .await
    }

    /// Builds products, consuming their materials.
    pub async fn product_in(&self, request: &ProductInRequest) -> Result<LedgerReceipt> {
        self.send_json(Method::POST, "/products/in", request).await
    }

    /// Ships products out of stock.
    pub async fn product_out(&self, request: &ProductOutRequest) -> Result<LedgerReceipt> {
        self.send_json(Method::POST, "/products/out", request).await
    }

    /// Returns shipped products to stock.
    pub async fn product_restore(&self, request: &ProductRestoreRequest) -> Result<LedgerReceipt> {
        self.send_json(Method::POST, "/products/restore", request)
            .await
    }

    // --- Users ---

    /// Every account with its live sessions (administrators only).
    pub async fn list_users(&self) -> Result<Vec<UserView>> {
        self.get("/users").await
    }

    /// Creates an account.
    pub async fn create_user(&self, input: &NewUser) -> Result<user::Model> {
        self.send_json(Method::POST, "/users", input).await
    }

    /// Updates an account by id.
    pub async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<user::Model> {
        self.send_json(Method::PUT, &format!("/users/{id}"), changes)
            .await
    }

    /// Deletes an account by username.
    pub async fn delete_user(&self, username: &str) -> Result<()> {
        let url = self.endpoint(&["users", username])?;
        self.execute(self.http.delete(url)).await
    }

    /// Ends one session of an account.
    pub async fn revoke_session(&self, username: &str, session_id: &str) -> Result<()> {
        let url = self.endpoint(&["users", username, "sessions", session_id])?;
        self.execute(self.http.delete(url)).await
    }

    // --- Records and aggregates ---

    /// One page of operation records.
    pub async fn records(&self, query: &RecordQuery) -> Result<RecordPage> {
        self.get_with("/records", query).await
    }

    /// Every record matching the query, unpaged.
    pub async fn export_records(&self, query: &RecordQuery) -> Result<Vec<operation_record::Model>> {
        self.get_with("/records/export", query).await
    }

    /// Inventory and sales summary over the last `days`.
    pub async fn summary(&self, days: Option<u32>) -> Result<Summary> {
        let query = WindowQuery {
            days,
            ..WindowQuery::default()
        };
        self.get_with("/statistics/summary", &query).await
    }

    /// Best-selling products over the last `days`.
    pub async fn top_products(&self, limit: Option<usize>, days: Option<u32>) -> Result<Vec<TopProduct>> {
        let query = WindowQuery {
            days,
            limit,
            product_id: None,
        };
        self.get_with("/statistics/top-products", &query).await
    }

    /// Daily produced/sold/restored units, for one product or all.
    pub async fn product_trend(&self, product_id: Option<i64>, days: Option<u32>) -> Result<Vec<TrendPoint>> {
        let query = WindowQuery {
            days,
            limit: None,
            product_id,
        };
        self.get_with("/statistics/product-trend", &query).await
    }

    /// Service and database health.
    pub async fn dashboard(&self) -> Result<Dashboard> {
        self.get("/system/dashboard").await
    }
}

/// Best-effort classification of a response that carried no envelope.
#[must_use]
pub fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 => ErrorKind::Validation,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        422 => ErrorKind::InsufficientStock,
        _ => ErrorKind::Internal,
    }
}

/// Unwraps a response body into its payload, or the failure it reports.
pub(crate) fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T> {
    let Ok(envelope) = serde_json::from_slice::<ApiResponse<Value>>(body) else {
        return Err(Error::Remote {
            kind: kind_for_status(status),
            message: format!("Unexpected response from backend (HTTP {status})"),
        });
    };
    if !envelope.success {
        return Err(Error::Remote {
            kind: envelope.kind.unwrap_or_else(|| kind_for_status(status)),
            message: envelope.message,
        });
    }
    Ok(serde_json::from_value(envelope.data.unwrap_or(Value::Null))?)
}
