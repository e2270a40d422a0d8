//! Overlay store services.
//!
//! # Responsibility
//! - Expose the product, category, profile and address stores as use-case
//!   level APIs over the overlay engine.
//! - Keep callers decoupled from slot layout and storage details.
//!
//! # See also
//! - `crate::overlay` for merge, origin and tombstone rules.

pub mod address_book;
pub mod category_registry;
pub mod product_catalog;
pub mod profile_overrides;
