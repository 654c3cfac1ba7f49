//! REST surface - axum routers over the core operations.
//!
//! Every route except `POST /login` requires `Authorization: Bearer <session id>`, and
//! every body is the `{success, message, data}` envelope from [`response`].

pub mod auth;
mod materials;
mod products;
pub mod reports;
pub mod response;
pub mod users;

use crate::{config::AppConfig, errors::Result};
use axum::Router;
use sea_orm::DatabaseConnection;
use std::{future::Future, sync::Arc, time::Instant};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Loaded settings
    pub config: Arc<AppConfig>,
    /// Server start, for the dashboard uptime
    pub started_at: Instant,
}

impl AppState {
    /// Creates the state, starting the uptime clock now.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            config,
            started_at: Instant::now(),
        }
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(users::routes())
        .merge(materials::routes())
        .merge(products::routes())
        .merge(reports::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        api::response::ApiResponse,
        config::SessionSettings,
        core::user,
        errors::ErrorKind,
        test_utils::*,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn test_app() -> Result<(Router, String)> {
        let db = setup_test_db().await?;
        let config = AppConfig {
            sessions: SessionSettings {
                admin_password: Some(TEST_ADMIN_PASSWORD.to_string()),
                ..SessionSettings::default()
            },
            ..AppConfig::default()
        };
        user::seed_admin(&db, &config.sessions).await?;
        let outcome = user::login(&db, "admin", TEST_ADMIN_PASSWORD, &config.sessions).await?;
        Ok((router(AppState::new(db, Arc::new(config))), outcome.token))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, ApiResponse<Value>) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_requires_bearer_token() -> Result<()> {
        let (app, _) = test_app().await?;
        let (status, body) = call(&app, Method::GET, "/materials", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.kind, Some(ErrorKind::Unauthorized));

        let (status, _) = call(&app, Method::GET, "/materials", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_login_endpoint() -> Result<()> {
        let (app, _) = test_app().await?;
        let (status, body) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({"username": "admin", "password": TEST_ADMIN_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = body.data.unwrap();
        assert!(data["token"].as_str().is_some());
        assert!(data["user"].get("password_hash").is_none());

        let (status, body) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({"username": "admin", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.success);
        Ok(())
    }

    #[tokio::test]
    async fn test_material_and_product_flow() -> Result<()> {
        let (app, token) = test_app().await?;
        let token = Some(token.as_str());

        let (status, body) = call(
            &app,
            Method::POST,
            "/materials",
            token,
            Some(json!({"name": "A", "in_price": 2.0, "out_price": 3.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let material_id = body.data.unwrap()["id"].as_i64().unwrap();

        let (status, _) = call(
            &app,
            Method::POST,
            "/materials/in",
            token,
            Some(json!({"material_id": material_id, "quantity": 10, "supplier": "Mill"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(
            &app,
            Method::POST,
            "/products",
            token,
            Some(json!({
                "name": "P",
                "other_price": 1.0,
                "materials": [{"material_id": material_id, "required_quantity": 2}]
            })),
        )
        .await;
        let product = body.data.unwrap();
        assert_eq!(product["cost"].as_f64(), Some(4.0));
        assert_eq!(product["sale"].as_f64(), Some(7.0));
        assert_eq!(product["possible_quantity"].as_i64(), Some(5));
        let product_id = product["id"].as_i64().unwrap();

        let (status, _) = call(
            &app,
            Method::POST,
            "/products/in",
            token,
            Some(json!({"product_id": product_id, "quantity": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::POST,
            "/products/in",
            token,
            Some(json!({"product_id": product_id, "quantity": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.kind, Some(ErrorKind::InsufficientMaterials));

        let (status, body) = call(
            &app,
            Method::DELETE,
            &format!("/materials/{material_id}"),
            token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.kind, Some(ErrorKind::Conflict));

        let (status, body) = call(&app, Method::GET, "/materials/999", token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.kind, Some(ErrorKind::NotFound));

        let (_, body) = call(
            &app,
            Method::GET,
            "/records?operation_type=product_in&sort_order=asc",
            token,
            None,
        )
        .await;
        assert_eq!(body.data.unwrap()["total"].as_u64(), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_envelope() -> Result<()> {
        let (app, token) = test_app().await?;
        let (status, body) = call(
            &app,
            Method::POST,
            "/materials/in",
            Some(&token),
            Some(json!({"material_id": "one"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.kind, Some(ErrorKind::Validation));
        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_page_is_validation_envelope() -> Result<()> {
        let (app, token) = test_app().await?;
        for uri in [
            "/materials?page=18446744073709551615&page_size=100",
            "/products?page=18446744073709551615",
            "/records?page=18446744073709551615",
        ] {
            let (status, body) = call(&app, Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body.kind, Some(ErrorKind::Validation), "{uri}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_dashboard_and_statistics() -> Result<()> {
        let (app, token) = test_app().await?;
        let (status, body) = call(&app, Method::GET, "/system/dashboard", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let data = body.data.unwrap();
        assert_eq!(data["service"], "stockroom");
        assert_eq!(data["database"]["reachable"], true);
        assert_eq!(data["database"]["counts"]["users"].as_u64(), Some(1));

        let (status, _) = call(
            &app,
            Method::GET,
            "/statistics/summary?days=0",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            Method::GET,
            "/statistics/product-trend?days=3",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data.unwrap().as_array().map(Vec::len), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_user_routes() -> Result<()> {
        let (app, token) = test_app().await?;
        let token = Some(token.as_str());

        let (status, body) = call(
            &app,
            Method::POST,
            "/users",
            token,
            Some(json!({"username": "clerk", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let clerk_id = body.data.unwrap()["id"].as_i64().unwrap();

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/users/{clerk_id}"),
            token,
            Some(json!({"role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data.unwrap()["role"], "admin");

        let (status, _) = call(&app, Method::DELETE, "/users/clerk", token, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, Method::DELETE, "/users/admin", token, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.kind, Some(ErrorKind::Conflict));
        Ok(())
    }
}
