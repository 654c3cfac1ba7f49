//! Client-side inventory cache.
//!
//! Holds the last fetched material and product collections. Every mutation goes through
//! [`InventoryCache::run_mutation`]: on success the affected collections are reloaded in
//! full, on failure the cache is left exactly as it was. Product cost, sale and possible
//! quantity are recomputed locally with the pricing engine after every material reload.

use crate::{
    client::BackOfficeClient,
    core::{
        ledger::{
            LedgerReceipt, MaterialInRequest, MaterialOutRequest, ProductInRequest,
            ProductOutRequest, ProductRestoreRequest,
        },
        material::{MaterialChanges, NewMaterial},
        product::{NewProduct, ProductChanges},
        views::{self, MaterialView, ProductView},
    },
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, future::Future, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, trace, warn};

/// Which collections a mutation invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadScope {
    /// Nothing cached changed
    Nothing,
    /// Material rows changed; product views are rederived locally
    Materials,
    /// Product rows changed
    Products,
    /// Both collections changed
    Both,
}

/// Column a listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Creation order
    #[default]
    Id,
    /// Name, case-insensitive
    Name,
    /// Stock on hand
    Stock,
    /// Sale price (material out-price, product derived sale)
    Price,
}

/// Listing options passed in by the caller instead of read from ambient UI state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive name substring
    pub search: Option<String>,
    /// Sort column
    pub sort: SortKey,
    /// Reverse the order
    pub descending: bool,
    /// Hide rows without stock
    pub in_stock_only: bool,
}

impl ListQuery {
    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Stock value aggregates over the cached collections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InventoryTotals {
    /// `Σ stock × out_price` over materials
    pub material_value: f64,
    /// `Σ stock × derived sale` over products
    pub product_value: f64,
}

/// Cached material and product collections backed by a [`BackOfficeClient`].
#[derive(Debug, Clone)]
pub struct InventoryCache {
    client: BackOfficeClient,
    materials: Arc<RwLock<Vec<MaterialView>>>,
    products: Arc<RwLock<Vec<ProductView>>>,
}

impl InventoryCache {
    /// Creates an empty cache; call [`InventoryCache::reload`] to populate it.
    #[must_use]
    pub fn new(client: BackOfficeClient) -> Self {
        Self {
            client,
            materials: Arc::new(RwLock::new(Vec::new())),
            products: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// The client used for fetches and mutations.
    #[must_use]
    pub const fn client(&self) -> &BackOfficeClient {
        &self.client
    }

    /// Replaces the material collection and rederives the cached products against it.
    pub async fn reload_materials(&self) -> Result<usize> {
        info!("Refreshing materials cache...");
        let fetched = self.client.list_materials().await?;
        let count = fetched.len();
        *self.materials.write().await = fetched;
        self.rederive().await;
        info!("Materials cache refreshed with {count} items.");
        Ok(count)
    }

    /// Replaces the product collection.
    pub async fn reload_products(&self) -> Result<usize> {
        info!("Refreshing products cache...");
        let fetched = self.client.list_products().await?;
        let count = fetched.len();
        let mut cache_writer = self.products.write().await;
        *cache_writer = fetched;
        trace!("Products cache now contains: {:?}", *cache_writer);
        info!("Products cache refreshed with {count} items.");
        Ok(count)
    }

    /// Reloads the collections named by `scope`.
    pub async fn reload(&self, scope: ReloadScope) -> Result<()> {
        match scope {
            ReloadScope::Nothing => {}
            ReloadScope::Materials => {
                self.reload_materials().await?;
            }
            ReloadScope::Products => {
                self.reload_products().await?;
            }
            ReloadScope::Both => {
                self.reload_products().await?;
                self.reload_materials().await?;
            }
        }
        Ok(())
    }

    /// Recomputes product cost, sale and possible quantity from the cached materials.
    pub async fn rederive(&self) {
        let materials = self.materials.read().await;
        let prices = views::price_table(materials.iter().map(|view| &view.material));
        let stock = views::stock_table(materials.iter().map(|view| &view.material));
        for product in self.products.write().await.iter_mut() {
            product.rederive(&prices, &stock);
        }
    }

    /// Runs one mutating call, then reloads `scope` if it succeeded.
    ///
    /// A failed mutation leaves the cache untouched and is returned as-is. A failed reload
    /// after a successful mutation is logged and the mutation result is still returned,
    /// since the mutation must not look retryable.
    pub async fn run_mutation<T, F>(&self, scope: ReloadScope, mutation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let value = match mutation.await {
            Ok(value) => value,
            Err(e) => {
                warn!("Mutation rejected: {e}");
                return Err(e);
            }
        };
        if let Err(e) = self.reload(scope).await {
            warn!("Reload after mutation failed, cache is stale: {e}");
        }
        Ok(value)
    }

    /// Optimistic check that `quantity` units of a cached product can be built.
    ///
    /// Unknown products pass; the server stays authoritative.
    pub async fn precheck_product_in(&self, product_id: i64, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return Err(Error::validation("Quantity must be at least 1"));
        }
        let products = self.products.read().await;
        match products.iter().find(|view| view.product.id == product_id) {
            Some(view) => check_buildable(view, quantity),
            None => Ok(()),
        }
    }

    /// Cached materials filtered and ordered by `query`.
    pub async fn list_materials(&self, query: &ListQuery) -> Vec<MaterialView> {
        filter_materials(&self.materials.read().await, query)
    }

    /// Cached products filtered and ordered by `query`.
    pub async fn list_products(&self, query: &ListQuery) -> Vec<ProductView> {
        filter_products(&self.products.read().await, query)
    }

    /// Cached material by id.
    pub async fn material(&self, id: i64) -> Option<MaterialView> {
        self.materials
            .read()
            .await
            .iter()
            .find(|view| view.material.id == id)
            .cloned()
    }

    /// Cached product by id.
    pub async fn product(&self, id: i64) -> Option<ProductView> {
        self.products
            .read()
            .await
            .iter()
            .find(|view| view.product.id == id)
            .cloned()
    }

    /// Stock value aggregates over everything cached.
    pub async fn totals(&self) -> InventoryTotals {
        InventoryTotals {
            material_value: views::total_material_value(self.materials.read().await.iter()),
            product_value: views::total_product_value(self.products.read().await.iter()),
        }
    }

    // --- Mutations ---

    /// Creates a material.
    pub async fn create_material(&self, input: &NewMaterial) -> Result<MaterialView> {
        self.run_mutation(ReloadScope::Materials, self.client.create_material(input))
            .await
    }

    /// Updates a material; dependent products are repriced, so both collections reload.
    pub async fn update_material(&self, id: i64, changes: &MaterialChanges) -> Result<MaterialView> {
        self.run_mutation(ReloadScope::Both, self.client.update_material(id, changes))
            .await
    }

    /// Deletes a material.
    pub async fn delete_material(&self, id: i64) -> Result<()> {
        self.run_mutation(ReloadScope::Materials, self.client.delete_material(id))
            .await
    }

    /// Receives material into stock.
    pub async fn material_in(&self, request: &MaterialInRequest) -> Result<LedgerReceipt> {
        self.run_mutation(ReloadScope::Materials, self.client.material_in(request))
            .await
    }

    /// Ships material out of stock.
    pub async fn material_out(&self, request: &MaterialOutRequest) -> Result<LedgerReceipt> {
        self.run_mutation(ReloadScope::Materials, self.client.material_out(request))
            .await
    }

    /// Creates a product.
    pub async fn create_product(&self, input: &NewProduct) -> Result<ProductView> {
        self.run_mutation(ReloadScope::Both, self.client.create_product(input))
            .await
    }

    /// Updates a product.
    pub async fn update_product(&self, id: i64, changes: &ProductChanges) -> Result<ProductView> {
        self.run_mutation(ReloadScope::Both, self.client.update_product(id, changes))
            .await
    }

    /// Deletes a product.
    pub async fn delete_product(&self, id: i64) -> Result<()> {
        self.run_mutation(ReloadScope::Both, self.client.delete_product(id))
            .await
    }

    /// Builds products after the optimistic material check.
    pub async fn product_in(&self, request: &ProductInRequest) -> Result<LedgerReceipt> {
        self.precheck_product_in(request.product_id, request.quantity)
            .await?;
        self.run_mutation(ReloadScope::Both, self.client.product_in(request))
            .await
    }

    /// Ships products out of stock.
    pub async fn product_out(&self, request: &ProductOutRequest) -> Result<LedgerReceipt> {
        self.run_mutation(ReloadScope::Products, self.client.product_out(request))
            .await
    }

    /// Returns shipped products to stock.
    pub async fn product_restore(&self, request: &ProductRestoreRequest) -> Result<LedgerReceipt> {
        self.run_mutation(ReloadScope::Both, self.client.product_restore(request))
            .await
    }
}

/// Fails when a product's buildable quantity is known to be short of `quantity`.
pub fn check_buildable(view: &ProductView, quantity: i64) -> Result<()> {
    match view.possible_quantity {
        Some(possible) if quantity > possible => Err(Error::InsufficientMaterials {
            product: view.product.name.clone(),
            possible,
            requested: quantity,
        }),
        _ => Ok(()),
    }
}

fn contains_ci(name: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|needle| name.to_lowercase().contains(needle))
}

fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

/// Applies a [`ListQuery`] to material views.
#[must_use]
pub fn filter_materials(items: &[MaterialView], query: &ListQuery) -> Vec<MaterialView> {
    let needle = query.needle();
    let mut rows: Vec<MaterialView> = items
        .iter()
        .filter(|view| contains_ci(&view.material.name, needle.as_deref()))
        .filter(|view| !query.in_stock_only || view.material.stock_count > 0)
        .cloned()
        .collect();
    rows.sort_by(|a, b| {
        let (a, b) = (&a.material, &b.material);
        let ordering = match query.sort {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::Stock => a.stock_count.cmp(&b.stock_count),
            SortKey::Price => a.out_price.total_cmp(&b.out_price),
        };
        directed(ordering.then(a.id.cmp(&b.id)), query.descending)
    });
    rows
}

/// Applies a [`ListQuery`] to product views.
#[must_use]
pub fn filter_products(items: &[ProductView], query: &ListQuery) -> Vec<ProductView> {
    let needle = query.needle();
    let mut rows: Vec<ProductView> = items
        .iter()
        .filter(|view| contains_ci(&view.product.name, needle.as_deref()))
        .filter(|view| !query.in_stock_only || view.product.stock_count > 0)
        .cloned()
        .collect();
    rows.sort_by(|a, b| {
        let ordering = match query.sort {
            SortKey::Id => a.product.id.cmp(&b.product.id),
            SortKey::Name => a
                .product
                .name
                .to_lowercase()
                .cmp(&b.product.name.to_lowercase()),
            SortKey::Stock => a.product.stock_count.cmp(&b.product.stock_count),
            SortKey::Price => a.sale.total_cmp(&b.sale),
        };
        directed(ordering.then(a.product.id.cmp(&b.product.id)), query.descending)
    });
    rows
}
