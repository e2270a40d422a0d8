//! CLI smoke and inspection entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `tienda_core` linkage.
//! - Print merged overlay views of a database file for local sanity checks.
//!
//! # Environment
//! - `TIENDA_DB`: database path, default `tienda.db`.
//! - `TIENDA_LOG_LEVEL` / `TIENDA_LOG_DIR`: enable file logging when the
//!   directory is set.

use log::info;
use std::env;
use std::process::ExitCode;
use tienda_core::{
    open_db, AddressBook, CategoryRegistry, ChangeBus, ProductCatalog, ProductQuery,
    ProfileOverrides, SqliteSlotStore, StoreConfig,
};

const USAGE: &str = "usage: tienda_cli <ping|version|products [--all]|categories|addresses <email>|profile <email>>";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    if let Ok(log_dir) = env::var("TIENDA_LOG_DIR") {
        let level = env::var("TIENDA_LOG_LEVEL")
            .unwrap_or_else(|_| tienda_core::default_log_level().to_string());
        if let Err(err) = tienda_core::init_logging(&level, &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let command = args.first().map(String::as_str).unwrap_or("ping");
    match command {
        "ping" => {
            println!("tienda_core ping={}", tienda_core::ping());
            println!("tienda_core version={}", tienda_core::core_version());
            Ok(())
        }
        "version" => {
            println!("{}", tienda_core::core_version());
            Ok(())
        }
        "products" | "categories" | "addresses" | "profile" => inspect(command, &args[1..]),
        _ => Err(USAGE.to_string()),
    }
}

fn inspect(command: &str, rest: &[String]) -> Result<(), String> {
    let path = env::var("TIENDA_DB").unwrap_or_else(|_| "tienda.db".to_string());
    let conn = open_db(&path).map_err(|err| format!("cannot open {path}: {err}"))?;
    let store = SqliteSlotStore::try_new(&conn).map_err(|err| err.to_string())?;
    let config = StoreConfig::default();
    let bus = ChangeBus::new();
    info!("event=cli_inspect module=cli status=start command={command}");

    match command {
        "products" => {
            let query = ProductQuery {
                include_deleted: rest.iter().any(|arg| arg == "--all"),
            };
            let catalog = ProductCatalog::with_seed_catalog(&store, bus, &config);
            for product in catalog.load_products(query) {
                println!(
                    "{}\t{}\t{:.2}\t{}\t{}{}",
                    product.code,
                    product.name,
                    product.price,
                    product.category,
                    product.origin.as_str(),
                    if product.is_active() { "" } else { "\tdeleted" }
                );
            }
        }
        "categories" => {
            let catalog = ProductCatalog::with_seed_catalog(&store, bus.clone(), &config);
            let registry = CategoryRegistry::new(&store, bus, &config, &catalog);
            for category in registry.load_categories() {
                println!("{}\t{}", category.name, category.origin.as_str());
            }
        }
        "addresses" => {
            let email = rest.first().ok_or(USAGE)?;
            let book = AddressBook::new(&store, bus, &config);
            for address in book.get_user_addresses(email) {
                println!(
                    "{}\t{}\t{}, {}\t{}{}",
                    address.id,
                    address.full_name,
                    address.line1,
                    address.city,
                    address.country,
                    if address.is_primary { "\tprimary" } else { "" }
                );
            }
        }
        _ => {
            let email = rest.first().ok_or(USAGE)?;
            let overrides = ProfileOverrides::new(&store, bus, &config);
            let patch = overrides.get_profile_overrides(email);
            println!(
                "nombre={} apellido={} telefono={} newsletter={}",
                patch.nombre.as_deref().unwrap_or("-"),
                patch.apellido.as_deref().unwrap_or("-"),
                patch.telefono.as_deref().unwrap_or("-"),
                patch
                    .preferencias
                    .as_ref()
                    .and_then(|prefs| prefs.newsletter)
                    .map_or("-".to_string(), |value| value.to_string())
            );
        }
    }
    Ok(())
}
