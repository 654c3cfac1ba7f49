//! Material endpoints.

use crate::{
    api::{
        AppState,
        auth::CurrentUser,
        response::{ApiResponse, ApiResult, Params, Payload},
    },
    core::{
        catalog::{BatchDeleteRequest, BatchOutcome, Page, PageRequest},
        ledger::{self, LedgerReceipt, MaterialInRequest, MaterialOutRequest},
        material::{self, MaterialChanges, NewMaterial, PriceChange, PricePreview},
        views::MaterialView,
    },
};
use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/materials", get(list).post(create))
        .route("/materials/batch-delete", post(batch_delete))
        .route("/materials/in", post(stock_in))
        .route("/materials/out", post(stock_out))
        .route("/materials/{id}", get(fetch).put(update).delete(remove))
        .route("/materials/{id}/check-products", post(check_products))
}

async fn list(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Params(paging): Params<PageRequest>,
) -> ApiResult<Page<MaterialView>> {
    let page = material::list_materials(&state.db, paging, &state.config.limits).await?;
    Ok(ApiResponse::ok(page))
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(input): Payload<NewMaterial>,
) -> ApiResult<MaterialView> {
    let created =
        material::create_material(&state.db, input, &caller.username, &state.config.limits)
            .await?;
    Ok(ApiResponse::with_message("Material created", created))
}

async fn fetch(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<MaterialView> {
    Ok(ApiResponse::ok(material::get_material(&state.db, id).await?))
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
    Payload(changes): Payload<MaterialChanges>,
) -> ApiResult<MaterialView> {
    let updated =
        material::update_material(&state.db, id, changes, &caller.username, &state.config.limits)
            .await?;
    Ok(ApiResponse::with_message("Material updated", updated))
}

async fn remove(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    material::delete_material(&state.db, id, &caller.username).await?;
    Ok(ApiResponse::with_message("Material deleted", ()))
}

async fn batch_delete(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(request): Payload<BatchDeleteRequest>,
) -> ApiResult<BatchOutcome> {
    let outcome =
        material::batch_delete_materials(&state.db, &request.ids, &caller.username).await?;
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
    Payload(request): Payload<MaterialInRequest>,
) -> ApiResult<LedgerReceipt> {
    let receipt =
        ledger::material_in(&state.db, request, &caller.username, &state.config.limits).await?;
    Ok(ApiResponse::with_message("Material stocked in", receipt))
}

async fn stock_out(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(request): Payload<MaterialOutRequest>,
) -> ApiResult<LedgerReceipt> {
    let receipt =
        ledger::material_out(&state.db, request, &caller.username, &state.config.limits).await?;
    Ok(ApiResponse::with_message("Material stocked out", receipt))
}

async fn check_products(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
    Payload(change): Payload<PriceChange>,
) -> ApiResult<PricePreview> {
    let preview = material::preview_material_price_change(&state.db, id, change).await?;
    Ok(ApiResponse::ok(preview))
}
