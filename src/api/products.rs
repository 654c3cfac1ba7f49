//! Product endpoints.

use crate::{
    api::{
        AppState,
        auth::CurrentUser,
        response::{ApiResponse, ApiResult, Params, Payload},
    },
    core::{
        catalog::{BatchDeleteRequest, BatchOutcome, Page, PageRequest},
        ledger::{
            self, LedgerReceipt, ProductInRequest, ProductOutRequest, ProductRestoreRequest,
        },
        product::{self, NewProduct, ProductChanges},
        views::ProductView,
    },
};
use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/batch-delete", post(batch_delete))
        .route("/products/in", post(stock_in))
        .route("/products/out", post(stock_out))
        .route("/products/restore", post(restore))
        .route("/products/{id}", get(fetch).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Params(paging): Params<PageRequest>,
) -> ApiResult<Page<ProductView>> {
    let page = product::list_products(&state.db, paging, &state.config.limits).await?;
    Ok(ApiResponse::ok(page))
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(input): Payload<NewProduct>,
) -> ApiResult<ProductView> {
    let created =
        product::create_product(&state.db, input, &caller.username, &state.config.limits).await?;
    Ok(ApiResponse::with_message("Product created", created))
}

async fn fetch(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<ProductView> {
    Ok(ApiResponse::ok(product::get_product(&state.db, id).await?))
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
    Payload(changes): Payload<ProductChanges>,
) -> ApiResult<ProductView> {
    let updated =
        product::update_product(&state.db, id, changes, &caller.username, &state.config.limits)
            .await?;
    Ok(ApiResponse::with_message("Product updated", updated))
}

async fn remove(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    product::delete_product(&state.db, id, &caller.username).await?;
    Ok(ApiResponse::with_message("Product deleted", ()))
}

async fn batch_delete(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(request): Payload<BatchDeleteRequest>,
) -> ApiResult<BatchOutcome> {
    let outcome = product::batch_delete_products(&state.db, &request.ids, &caller.username).await?;
    let message = format!(
        "Deleted {}, kept {}",
        outcome.deleted.len(),
        outcome.failed.len()
    );
    Ok(ApiResponse::with_message(message, outcome))
}

async fn stock_in(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(request): Payload<ProductInRequest>,
) -> ApiResult<LedgerReceipt> {
    let receipt =
        ledger::product_in(&state.db, request, &caller.username, &state.config.limits).await?;
    Ok(ApiResponse::with_message("Product built", receipt))
}

async fn stock_out(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(request): Payload<ProductOutRequest>,
) -> ApiResult<LedgerReceipt> {
    let receipt =
        ledger::product_out(&state.db, request, &caller.username, &state.config.limits).await?;
    Ok(ApiResponse::with_message("Product stocked out", receipt))
}

async fn restore(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(request): Payload<ProductRestoreRequest>,
) -> ApiResult<LedgerReceipt> {
    let receipt = ledger::product_restore(
        &state.db,
        request,
        &caller.username,
        &state.config.limits,
        state.config.ledger,
    )
    .await?;
    Ok(ApiResponse::with_message("Product restored", receipt))
}
