//! Core overlay stores for the Tienda storefront.
//! This crate is the single source of truth for catalog and user-data
//! overlay invariants.

pub mod bus;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod overlay;
pub mod service;
pub mod store;

pub use bus::{ChangeBus, ChangeEvent, ChangeReason, ChangeSource, EntityKind, Subscription};
pub use config::StoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::address::{Address, AddressInput, AddressPatch};
pub use model::category::Category;
pub use model::product::{Product, ProductDraft, ProductPatch};
pub use model::profile::{Preferences, ProfilePatch, UserProfile};
pub use model::ValidationError;
pub use overlay::{Origin, OverlayError, OverlayResult};
pub use service::address_book::AddressBook;
pub use service::category_registry::CategoryRegistry;
pub use service::product_catalog::{seed_products, ProductCatalog, ProductQuery};
pub use service::profile_overrides::ProfileOverrides;
pub use store::{MemorySlotStore, PersistOutcome, SlotError, SlotStore, SqliteSlotStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
