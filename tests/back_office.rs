//! End-to-end tests: a real server on an ephemeral port, driven through the client.

use sea_orm::Database;
use std::{sync::Arc, time::Duration};
use stockroom::{
    api::{self, AppState, reports::RecordQuery},
    client::{BackOfficeClient, InventoryCache, ListQuery, SessionEvent, SessionWatch, SortKey},
    config::{AppConfig, SessionSettings, database},
    core::{
        ledger::{MaterialInRequest, MaterialOutRequest, ProductInRequest, ProductOutRequest, ProductRestoreRequest},
        material::NewMaterial,
        product::{LineInput, NewProduct},
        user::{self, NewUser},
    },
    errors::{Error, ErrorKind, Result},
};
use tokio::{net::TcpListener, task::JoinHandle};

const ADMIN_PASSWORD: &str = "admin-secret";

struct TestServer {
    base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn spawn_server() -> Result<TestServer> {
    let db = Database::connect("sqlite::memory:").await?;
    database::create_tables(&db).await?;
    let config = AppConfig {
        sessions: SessionSettings {
            admin_password: Some(ADMIN_PASSWORD.to_string()),
            ..SessionSettings::default()
        },
        ..AppConfig::default()
    };
    user::seed_admin(&db, &config.sessions).await?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = AppState::new(db, Arc::new(config));
    let handle = tokio::spawn(async move {
        if let Err(e) = api::serve(listener, state, std::future::pending()).await {
            eprintln!("test server stopped: {e}");
        }
    });
    Ok(TestServer {
        base_url: format!("http://{addr}"),
        handle,
    })
}

async fn admin_client(server: &TestServer) -> Result<BackOfficeClient> {
    let client = BackOfficeClient::new(&server.base_url)?;
    client.login("admin", ADMIN_PASSWORD).await?;
    Ok(client)
}

fn remote_kind(result: &Result<impl std::fmt::Debug>) -> Option<ErrorKind> {
    result.as_ref().err().map(Error::kind)
}

/// Creates A(in 2.00, out 3.00, stock 10) and P = {A: 2} with other price 1.00.
async fn seed_catalog(cache: &InventoryCache) -> Result<(i64, i64)> {
    let a = cache
        .create_material(&NewMaterial {
            name: "A".to_string(),
            in_price: 2.0,
            out_price: Some(3.0),
            image_path: None,
        })
        .await?;
    cache
        .material_in(&MaterialInRequest {
            material_id: a.material.id,
            quantity: 10,
            supplier: Some("Mill".to_string()),
        })
        .await?;
    let p = cache
        .create_product(&NewProduct {
            name: "P".to_string(),
            materials: vec![LineInput::new(a.material.id, 2)],
            other_price: 1.0,
            ..NewProduct::default()
        })
        .await?;
    Ok((a.material.id, p.product.id))
}

#[tokio::test]
async fn test_requests_without_session_are_unauthorized() -> Result<()> {
    let server = spawn_server().await?;
    let client = BackOfficeClient::new(&server.base_url)?;

    let result = client.list_materials().await;
    assert!(result.as_ref().err().is_some_and(Error::is_unauthorized));

    let bad_login = client.login("admin", "wrong").await;
    assert_eq!(remote_kind(&bad_login), Some(ErrorKind::Unauthorized));
    assert!(!client.is_logged_in().await);
    Ok(())
}

#[tokio::test]
async fn test_pricing_and_build_scenario() -> Result<()> {
    let server = spawn_server().await?;
    let cache = InventoryCache::new(admin_client(&server).await?);
    let (a_id, p_id) = seed_catalog(&cache).await?;

    let p = cache.product(p_id).await.ok_or(Error::ProductNotFound { id: p_id })?;
    assert_eq!(p.cost, 4.0);
    assert_eq!(p.sale, 7.0);
    assert_eq!(p.possible_quantity, Some(5));

    cache
        .product_in(&ProductInRequest {
            product_id: p_id,
            quantity: 5,
            customer: None,
        })
        .await?;
    let a = cache.material(a_id).await.ok_or(Error::MaterialNotFound { id: a_id })?;
    let p = cache.product(p_id).await.ok_or(Error::ProductNotFound { id: p_id })?;
    assert_eq!(a.material.stock_count, 0);
    assert_eq!(p.product.stock_count, 5);
    assert_eq!(p.possible_quantity, Some(0));

    // The cache refuses locally, the server refuses authoritatively
    let local = cache
        .product_in(&ProductInRequest {
            product_id: p_id,
            quantity: 1,
            customer: None,
        })
        .await;
    assert!(matches!(local, Err(Error::InsufficientMaterials { .. })));
    let remote = cache
        .client()
        .product_in(&ProductInRequest {
            product_id: p_id,
            quantity: 1,
            customer: None,
        })
        .await;
    assert_eq!(remote_kind(&remote), Some(ErrorKind::InsufficientMaterials));
    assert_eq!(
        cache.client().get_product(p_id).await?.product.stock_count,
        5
    );

    // Used materials cannot be deleted
    let delete = cache.delete_material(a_id).await;
    assert_eq!(remote_kind(&delete), Some(ErrorKind::Conflict));
    assert!(cache.material(a_id).await.is_some());

    let totals = cache.totals().await;
    assert_eq!(totals.material_value, 0.0);
    assert_eq!(totals.product_value, 35.0);
    Ok(())
}

#[tokio::test]
async fn test_out_then_restore_round_trip() -> Result<()> {
    let server = spawn_server().await?;
    let cache = InventoryCache::new(admin_client(&server).await?);
    let (a_id, p_id) = seed_catalog(&cache).await?;
    cache
        .product_in(&ProductInRequest {
            product_id: p_id,
            quantity: 3,
            customer: None,
        })
        .await?;

    let client = cache.client();
    let before_product = client.get_product(p_id).await?.product.stock_count;
    let before_material = client.get_material(a_id).await?.material.stock_count;

    let receipt = cache
        .product_out(&ProductOutRequest {
            product_id: p_id,
            quantity: 2,
            price: None,
            customer: Some("Walk-in".to_string()),
        })
        .await?;
    assert_eq!(receipt.stock_count, before_product - 2);
    assert_eq!(receipt.revenue, Some(14.0));

    cache
        .product_restore(&ProductRestoreRequest {
            product_id: p_id,
            quantity: 2,
            reason: "Returned unopened".to_string(),
        })
        .await?;
    assert_eq!(client.get_product(p_id).await?.product.stock_count, before_product);
    assert_eq!(client.get_material(a_id).await?.material.stock_count, before_material);
    Ok(())
}

#[tokio::test]
async fn test_material_out_never_goes_negative() -> Result<()> {
    let server = spawn_server().await?;
    let cache = InventoryCache::new(admin_client(&server).await?);
    let (a_id, _) = seed_catalog(&cache).await?;

    let result = cache
        .material_out(&MaterialOutRequest {
            material_id: a_id,
            quantity: 11,
            price: None,
            customer: None,
        })
        .await;
    assert_eq!(remote_kind(&result), Some(ErrorKind::InsufficientStock));
    assert_eq!(
        cache.client().get_material(a_id).await?.material.stock_count,
        10
    );

    let receipt = cache
        .material_out(&MaterialOutRequest {
            material_id: a_id,
            quantity: 10,
            price: Some(2.5),
            customer: None,
        })
        .await?;
    assert_eq!(receipt.stock_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_refetch_is_idempotent_and_listing_is_local() -> Result<()> {
    let server = spawn_server().await?;
    let cache = InventoryCache::new(admin_client(&server).await?);
    seed_catalog(&cache).await?;
    cache
        .create_material(&NewMaterial {
            name: "Bolt".to_string(),
            in_price: 0.1,
            out_price: Some(0.2),
            image_path: None,
        })
        .await?;

    let first = cache.client().list_products().await?;
    let second = cache.client().list_products().await?;
    assert_eq!(first, second);

    let in_stock = cache
        .list_materials(&ListQuery {
            in_stock_only: true,
            ..ListQuery::default()
        })
        .await;
    assert_eq!(in_stock.len(), 1);
    assert_eq!(in_stock[0].material.name, "A");

    let by_name_desc = cache
        .list_materials(&ListQuery {
            sort: SortKey::Name,
            descending: true,
            ..ListQuery::default()
        })
        .await;
    let names: Vec<&str> = by_name_desc.iter().map(|v| v.material.name.as_str()).collect();
    assert_eq!(names, vec!["Bolt", "A"]);
    Ok(())
}

#[tokio::test]
async fn test_records_carry_session_username() -> Result<()> {
    let server = spawn_server().await?;
    let cache = InventoryCache::new(admin_client(&server).await?);
    seed_catalog(&cache).await?;

    let page = cache
        .client()
        .records(&RecordQuery {
            operation_type: Some("material_in".to_string()),
            ..RecordQuery::default()
        })
        .await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0].username, "admin");
    assert!(page.records[0].detail.contains("supplier: Mill"));

    let dashboard = cache.client().dashboard().await?;
    assert!(dashboard.database.reachable);
    Ok(())
}

#[tokio::test]
async fn test_user_management_requires_admin() -> Result<()> {
    let server = spawn_server().await?;
    let admin = admin_client(&server).await?;
    admin
        .create_user(&NewUser {
            username: "clerk".to_string(),
            password: "clerk-pw".to_string(),
            ..NewUser::default()
        })
        .await?;

    let clerk = BackOfficeClient::new(&server.base_url)?;
    clerk.login("clerk", "clerk-pw").await?;
    assert_eq!(remote_kind(&clerk.list_users().await), Some(ErrorKind::Forbidden));

    let users = admin.list_users().await?;
    let listed = users
        .iter()
        .find(|view| view.user.username == "clerk")
        .ok_or(Error::UserNotFound {
            name: "clerk".to_string(),
        })?;
    assert_eq!(listed.sessions.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_session_watch_reports_revocation() -> Result<()> {
    let server = spawn_server().await?;
    let admin = admin_client(&server).await?;
    let second = admin_client(&server).await?;
    let second_token = second.token().await.ok_or(Error::unauthorized("no token"))?;

    let watch = SessionWatch::spawn(second.clone(), Duration::from_millis(50));
    let mut events = watch.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        events.wait_for(|event| matches!(event, SessionEvent::Active(_))),
    )
    .await
    .map_err(|_| Error::validation("session never became active"))?
    .map_err(|_| Error::validation("watch closed"))?;

    admin.revoke_session("admin", &second_token).await?;

    tokio::time::timeout(
        Duration::from_secs(5),
        events.wait_for(|event| *event == SessionEvent::Expired),
    )
    .await
    .map_err(|_| Error::validation("expiry was never reported"))?
    .map_err(|_| Error::validation("watch closed"))?;
    assert!(!second.is_logged_in().await);
    assert!(admin.session().await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_user_deletes_target_the_exact_username() -> Result<()> {
    let server = spawn_server().await?;
    let admin = admin_client(&server).await?;
    for username in ["alice", "alice#2", "alice/sessions/x", "al ice?"] {
        admin
            .create_user(&NewUser {
                username: username.to_string(),
                password: "pw".to_string(),
                ..NewUser::default()
            })
            .await?;
    }

    admin.delete_user("alice#2").await?;
    admin.delete_user("alice/sessions/x").await?;
    admin.delete_user("al ice?").await?;

    let mut names: Vec<String> = admin
        .list_users()
        .await?
        .into_iter()
        .map(|view| view.user.username)
        .collect();
    names.sort();
    assert_eq!(names, vec!["admin".to_string(), "alice".to_string()]);
    Ok(())
}
