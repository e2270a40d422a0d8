//! Category registry overlay service.
//!
//! # Responsibility
//! - Derive the base category set from the live product catalog.
//! - Persist explicit and tombstoned categories as one replaceable list.
//!
//! # Invariants
//! - Category identity is the trimmed, case-insensitive name.
//! - `save_categories` replaces the whole persisted set; there is no
//!   incremental upsert at the storage level.
//! - On duplicates a live entry is preferred over a tombstoned one.

use super::product_catalog::{ProductCatalog, ProductQuery};
use crate::bus::{ChangeBus, ChangeEvent, ChangeReason, EntityKind, Subscription};
use crate::config::StoreConfig;
use crate::model::category::Category;
use crate::model::identity::{collation_key, display_category_name, normalize_category_name};
use crate::model::{now_epoch_ms, ValidationError};
use crate::overlay::{merge, OverlayEngine, OverlayError, OverlayRecord, OverlayResult};
use crate::store::SlotStore;
use log::info;
use std::collections::{BTreeSet, HashMap};

/// Category store: product-derived categories ⊕ persisted list.
pub struct CategoryRegistry<'c, S, P = S> {
    engine: OverlayEngine<S, Category>,
    catalog: &'c ProductCatalog<P>,
}

impl<'c, S: SlotStore, P: SlotStore> CategoryRegistry<'c, S, P> {
    pub fn new(
        store: S,
        bus: ChangeBus,
        config: &StoreConfig,
        catalog: &'c ProductCatalog<P>,
    ) -> Self {
        Self {
            engine: OverlayEngine::new(store, bus, &config.category_slot, EntityKind::Category),
            catalog,
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.engine
            .bus()
            .subscribe(Some(EntityKind::Category), callback)
    }

    /// Distinct categories of non-deleted products, first spelling wins.
    pub fn base_categories(&self) -> Vec<Category> {
        let mut seen = BTreeSet::new();
        self.catalog
            .load_products(ProductQuery::default())
            .into_iter()
            .filter_map(|product| display_category_name(&product.category))
            .filter(|name| seen.insert(name.to_lowercase()))
            .map(Category::live)
            .collect()
    }

    /// Live categories sorted by name.
    pub fn load_categories(&self) -> Vec<Category> {
        self.load_categories_with(false)
    }

    pub fn load_categories_with(&self, include_deleted: bool) -> Vec<Category> {
        let base = self.base_categories();
        let overlays = self.engine.load_overlays(&base);
        let mut categories = merge(&base, &overlays, include_deleted);
        categories.sort_by_cached_key(|category| collation_key(&category.name));
        categories
    }

    /// The persisted list as stored, without product-derived entries.
    pub fn saved_categories(&self) -> Vec<Category> {
        self.engine.load_overlays(&[])
    }

    /// Replaces the persisted list with a deduplicated copy of `list`.
    ///
    /// Blank names are dropped. Returns what was stored.
    pub fn save_categories(&self, list: Vec<Category>) -> Vec<Category> {
        let deduped = dedupe_categories(list);
        let outcome = self
            .engine
            .persist_overlays(&deduped, ChangeReason::Replaced, None);
        info!(
            "event=categories_save module=category status=ok count={} persisted={}",
            deduped.len(),
            outcome.is_persisted()
        );
        deduped
    }

    /// Adds product categories missing from `current` and saves the union.
    ///
    /// A tombstoned entry counts as present, so deliberate deletions are not
    /// resurrected. Nothing is written when no category is missing.
    pub fn seed_categories_from_products(&self, current: &[Category]) -> Vec<Category> {
        let mut merged = dedupe_categories(current.to_vec());
        let known: BTreeSet<String> = merged.iter().map(Category::key).collect();
        let missing: Vec<Category> = self
            .base_categories()
            .into_iter()
            .filter(|category| !known.contains(&category.key()))
            .collect();

        if missing.is_empty() {
            return merged;
        }
        info!(
            "event=categories_reconcile module=category status=ok added={}",
            missing.len()
        );
        merged.extend(missing);
        self.save_categories(merged)
    }

    /// Adds a category, reviving it if it was tombstoned.
    ///
    /// # Errors
    /// - `Validation` for a blank name.
    /// - `DuplicateKey` when a live category with that name exists.
    pub fn add_category(&self, name: &str) -> OverlayResult<Category> {
        let display = display_category_name(name).ok_or(ValidationError::BlankField("name"))?;
        let key = display.to_lowercase();
        if self
            .load_categories()
            .iter()
            .any(|category| category.key() == key)
        {
            return Err(OverlayError::DuplicateKey(display));
        }

        let mut saved = self.saved_categories();
        saved.retain(|category| category.key() != key);
        saved.push(Category::live(display.clone()));
        self.save_categories(saved);
        Ok(Category::live(display))
    }

    /// Tombstones a category. Returns `false` when it is unknown or already
    /// deleted.
    pub fn delete_category(&self, name: &str) -> bool {
        let Some(key) = normalize_category_name(name) else {
            return false;
        };
        let Some(current) = self
            .load_categories()
            .into_iter()
            .find(|category| category.key() == key)
        else {
            return false;
        };

        let mut saved = self.saved_categories();
        saved.retain(|category| category.key() != key);
        saved.push(Category::tombstoned(current.name, now_epoch_ms()));
        self.save_categories(saved);
        true
    }

    /// Clears a category tombstone. Returns `false` when nothing was deleted.
    pub fn restore_category(&self, name: &str) -> bool {
        let Some(key) = normalize_category_name(name) else {
            return false;
        };
        let mut saved = self.saved_categories();
        let Some(entry) = saved
            .iter_mut()
            .find(|category| category.key() == key && !category.is_active())
        else {
            return false;
        };
        entry.deleted_at = None;
        self.save_categories(saved);
        true
    }
}

/// Normalizes names and removes duplicates by identity key.
///
/// The first occurrence keeps its position; a later live entry replaces an
/// earlier tombstoned one, never the other way round.
pub fn dedupe_categories(list: Vec<Category>) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::with_capacity(list.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for category in list {
        let Ok(category) = category.normalized() else {
            continue;
        };
        let key = category.key();
        match positions.get(&key) {
            Some(&position) => {
                if category.supersedes(&out[position]) {
                    out[position] = category;
                }
            }
            None => {
                positions.insert(key, out.len());
                out.push(category);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::dedupe_categories;
    use crate::model::category::Category;

    #[test]
    fn dedupe_prefers_live_entries() {
        let deduped = dedupe_categories(vec![
            Category::live("Bebidas"),
            Category::tombstoned("BEBIDAS", 1),
            Category::tombstoned("Limpieza", 2),
            Category::live(" limpieza "),
            Category::live("   "),
        ]);
        assert_eq!(
            deduped,
            vec![Category::live("Bebidas"), Category::live("limpieza")]
        );
    }
}
