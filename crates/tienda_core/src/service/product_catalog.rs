//! Product catalog overlay service.
//!
//! # Responsibility
//! - Merge the seed catalog with persisted product overlays.
//! - Create custom products, patch/tombstone/restore any product.
//! - Prune overrides that no longer differ from their seed record.
//!
//! # Invariants
//! - Codes are unique among merged products, tombstoned ones included.
//! - An override equal to its seed record is never left persisted after an
//!   update.
//! - Default listing hides tombstones and sorts by name, accent-insensitive.

use crate::bus::{ChangeBus, ChangeEvent, ChangeReason, EntityKind, Subscription};
use crate::config::StoreConfig;
use crate::model::identity::{collation_key, generate_product_code, normalize_product_code};
use crate::model::now_epoch_ms;
use crate::model::product::{Product, ProductDraft, ProductPatch};
use crate::overlay::{
    classify, is_redundant, merge, Origin, OverlayEngine, OverlayError, OverlayRecord,
    OverlayResult,
};
use crate::store::SlotStore;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;

static SEED_CATALOG: Lazy<Vec<Product>> = Lazy::new(|| {
    match serde_json::from_str::<Vec<Product>>(include_str!("../seed/products.json")) {
        Ok(products) => products,
        Err(err) => {
            error!("event=seed_catalog module=product status=error error={err}");
            Vec::new()
        }
    }
});

/// Products shipped with the application.
pub fn seed_products() -> &'static [Product] {
    SEED_CATALOG.as_slice()
}

/// Listing options for `load_products`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub include_deleted: bool,
}

/// Product store: seed catalog ⊕ persisted overlays.
pub struct ProductCatalog<S> {
    engine: OverlayEngine<S, Product>,
    base: Vec<Product>,
    code_prefix_len: usize,
    code_fallback_prefix: String,
}

impl<S: SlotStore> ProductCatalog<S> {
    /// Creates a catalog over an explicit base dataset.
    ///
    /// Base records failing the shape pass are skipped with a warning.
    pub fn new(store: S, bus: ChangeBus, config: &StoreConfig, base: Vec<Product>) -> Self {
        let base = base
            .into_iter()
            .filter_map(|product| match product.normalized() {
                Ok(mut product) => {
                    product.origin = Origin::Seed;
                    Some(product)
                }
                Err(err) => {
                    warn!("event=seed_catalog module=product status=discarded reason={err}");
                    None
                }
            })
            .collect();

        Self {
            engine: OverlayEngine::new(store, bus, &config.product_slot, EntityKind::Product),
            base,
            code_prefix_len: config.code_prefix_len,
            code_fallback_prefix: config.code_fallback_prefix.clone(),
        }
    }

    /// Creates a catalog over the embedded seed catalog.
    pub fn with_seed_catalog(store: S, bus: ChangeBus, config: &StoreConfig) -> Self {
        Self::new(store, bus, config, seed_products().to_vec())
    }

    pub fn base_products(&self) -> &[Product] {
        &self.base
    }

    /// Subscribes to product changes, local and external.
    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.engine
            .bus()
            .subscribe(Some(EntityKind::Product), callback)
    }

    /// Merged product list sorted by display name.
    pub fn load_products(&self, query: ProductQuery) -> Vec<Product> {
        let overlays = self.engine.load_overlays(&self.base);
        let mut products = merge(&self.base, &overlays, query.include_deleted);
        products.sort_by_cached_key(|product| (collation_key(&product.name), product.code.clone()));
        products
    }

    /// Merged view of one product.
    pub fn get_product(&self, code: &str, include_deleted: bool) -> Option<Product> {
        let key = normalize_product_code(code)?;
        self.find_merged(&key)
            .filter(|product| include_deleted || product.is_active())
    }

    /// Number of persisted overlay entries.
    pub fn overlay_count(&self) -> usize {
        self.engine.load_overlays(&self.base).len()
    }

    /// Adds a custom product.
    ///
    /// # Errors
    /// - `Validation` for a blank name or invalid price.
    /// - `DuplicateKey` when the code exists, even tombstoned.
    pub fn add_product(&self, draft: ProductDraft) -> OverlayResult<Product> {
        let now = now_epoch_ms();
        let overlays = self.engine.load_overlays(&self.base);
        let existing: BTreeSet<String> = merge(&self.base, &overlays, true)
            .into_iter()
            .map(|product| product.code)
            .collect();

        let code = match draft.code.as_deref().and_then(normalize_product_code) {
            Some(code) if existing.contains(&code) => return Err(OverlayError::DuplicateKey(code)),
            Some(code) => code,
            None => generate_product_code(
                &draft.name,
                &existing,
                now,
                self.code_prefix_len,
                &self.code_fallback_prefix,
            ),
        };

        let mut product = draft.into_product(code, now)?;
        product.origin = classify(false, true);
        let outcome = self.engine.upsert(product.clone(), ChangeReason::Created);
        info!(
            "event=product_add module=product status=ok code={} persisted={}",
            product.code,
            outcome.is_persisted()
        );
        Ok(product)
    }

    /// Patches a product and returns its new merged view.
    ///
    /// When the result equals the seed record the overlay is removed and the
    /// seed view is returned.
    ///
    /// # Errors
    /// - `Validation` when the patch is invalid.
    /// - `NotFound` when no seed or overlay record exists for `code`.
    pub fn update_product(&self, code: &str, patch: ProductPatch) -> OverlayResult<Product> {
        self.apply_patch(code, patch, ChangeReason::Updated)
    }

    /// Tombstones a product. Tombstoning twice keeps the first timestamp.
    pub fn soft_delete_product(&self, code: &str) -> OverlayResult<Product> {
        let current = self.require_merged(code)?;
        let deleted_at = current.deleted_at.unwrap_or_else(now_epoch_ms);
        let patch = ProductPatch {
            deleted_at: Some(Some(deleted_at)),
            ..ProductPatch::default()
        };
        self.apply_patch(code, patch, ChangeReason::Deleted)
    }

    /// Clears a tombstone. A live seed product is returned unchanged.
    pub fn restore_product(&self, code: &str) -> OverlayResult<Product> {
        let current = self.require_merged(code)?;
        if current.origin == Origin::Seed && current.deleted_at.is_none() {
            return Ok(current);
        }
        let patch = ProductPatch {
            deleted_at: Some(None),
            ..ProductPatch::default()
        };
        self.apply_patch(code, patch, ChangeReason::Restored)
    }

    fn apply_patch(
        &self,
        code: &str,
        patch: ProductPatch,
        reason: ChangeReason,
    ) -> OverlayResult<Product> {
        patch.validate()?;
        let current = self.require_merged(code)?;
        let key = current.code.clone();
        let base = self.base_record(&key);
        let now = now_epoch_ms();

        let mut next = current;
        next.apply(&patch);
        next.origin = classify(base.is_some(), true);
        next.created_at = next.created_at.or(Some(now));
        next.updated_at = Some(now);

        if let Some(seed) = base.filter(|seed| is_redundant(&next, Some(*seed))) {
            let outcome = self.engine.remove(&key, ChangeReason::Removed);
            info!(
                "event=overlay_pruned module=product status=ok code={key} persisted={}",
                outcome.is_persisted()
            );
            return Ok(seed.clone());
        }

        let outcome = self.engine.upsert(next.clone(), reason);
        info!(
            "event=product_update module=product status=ok code={key} origin={} persisted={}",
            next.origin.as_str(),
            outcome.is_persisted()
        );
        Ok(next)
    }

    fn base_record(&self, key: &str) -> Option<&Product> {
        self.base.iter().find(|product| product.code == key)
    }

    fn find_merged(&self, key: &str) -> Option<Product> {
        let overlays = self.engine.load_overlays(&self.base);
        merge(&self.base, &overlays, true)
            .into_iter()
            .find(|product| product.code == key)
    }

    fn require_merged(&self, code: &str) -> OverlayResult<Product> {
        let key = normalize_product_code(code)
            .ok_or_else(|| OverlayError::NotFound(code.trim().to_string()))?;
        self.find_merged(&key).ok_or(OverlayError::NotFound(key))
    }
}
