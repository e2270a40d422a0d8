use std::cell::RefCell;
use std::rc::Rc;
use tienda_core::db::open_db;
use tienda_core::{
    AddressBook, AddressInput, ChangeBus, ChangeReason, ChangeSource, EntityKind,
    MemorySlotStore, ProductCatalog, ProductPatch, ProfileOverrides, ProfilePatch, SlotStore,
    SqliteSlotStore, StoreConfig,
};

#[test]
fn write_in_one_context_is_signalled_in_another() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tienda.db");
    let conn_a = open_db(&path).unwrap();
    let conn_b = open_db(&path).unwrap();
    let store_a = SqliteSlotStore::try_new(&conn_a).unwrap();
    let store_b = SqliteSlotStore::try_new(&conn_b).unwrap();
    let config = StoreConfig::default();

    let bus_a = ChangeBus::new();
    let bus_b = ChangeBus::new();
    let catalog_a = ProductCatalog::with_seed_catalog(&store_a, bus_a.clone(), &config);
    let catalog_b = ProductCatalog::with_seed_catalog(&store_b, bus_b.clone(), &config);

    let seen_b = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen_b);
    let _sub = catalog_b.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    catalog_a
        .update_product("YERB-001", ProductPatch::price(9999.0))
        .unwrap();
    assert!(seen_b.borrow().is_empty());
    assert!(bus_a.sync_external(&store_a, &config).is_empty());

    assert_eq!(
        bus_b.sync_external(&store_b, &config),
        vec![EntityKind::Product]
    );
    {
        let seen = seen_b.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].source, ChangeSource::External);
        assert_eq!(seen[0].reason, ChangeReason::External);
    }
    assert_eq!(
        catalog_b.get_product("YERB-001", false).unwrap().price,
        9999.0
    );

    assert!(bus_b.sync_external(&store_b, &config).is_empty());
    assert_eq!(seen_b.borrow().len(), 1);
}

#[test]
fn writes_from_both_contexts_compose_when_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tienda.db");
    let conn_a = open_db(&path).unwrap();
    let conn_b = open_db(&path).unwrap();
    let store_a = SqliteSlotStore::try_new(&conn_a).unwrap();
    let store_b = SqliteSlotStore::try_new(&conn_b).unwrap();
    let config = StoreConfig::default();

    let catalog_a = ProductCatalog::with_seed_catalog(&store_a, ChangeBus::new(), &config);
    let catalog_b = ProductCatalog::with_seed_catalog(&store_b, ChangeBus::new(), &config);

    catalog_a
        .update_product("YERB-001", ProductPatch::price(1.0))
        .unwrap();
    catalog_b
        .update_product("CAFE-002", ProductPatch::price(2.0))
        .unwrap();

    assert_eq!(catalog_a.overlay_count(), 2);
    assert_eq!(catalog_a.get_product("CAFE-002", false).unwrap().price, 2.0);
}

#[test]
fn memory_contexts_share_one_medium() {
    let store_a = MemorySlotStore::new();
    let store_b = store_a.connect();
    let config = StoreConfig::default();
    let bus_b = ChangeBus::new();

    let profiles_a = ProfileOverrides::new(&store_a, ChangeBus::new(), &config);
    let addresses_a = AddressBook::new(&store_a, ChangeBus::new(), &config);
    let addresses_b = AddressBook::new(&store_b, bus_b.clone(), &config);

    let kinds = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&kinds);
    let _sub = bus_b.subscribe(None, move |event| sink.borrow_mut().push(event.entity));

    profiles_a
        .update_profile_overrides(
            "ana@mail.com",
            ProfilePatch {
                nombre: Some("Ana".into()),
                ..ProfilePatch::default()
            },
        )
        .unwrap();
    addresses_a
        .add_user_address(
            "ana@mail.com",
            AddressInput {
                full_name: "Ana".into(),
                line1: "Calle 1".into(),
                ..AddressInput::default()
            },
        )
        .unwrap();

    assert_eq!(
        bus_b.sync_external(&store_b, &config),
        vec![EntityKind::Profile, EntityKind::Address]
    );
    assert_eq!(*kinds.borrow(), vec![EntityKind::Profile, EntityKind::Address]);
    assert_eq!(addresses_b.get_user_addresses("ana@mail.com").len(), 1);
}

#[test]
fn unknown_slots_are_not_signalled() {
    let store_a = MemorySlotStore::new();
    let store_b = store_a.connect();

    store_a.write_slot("some.other.key", "[]").unwrap();

    assert!(ChangeBus::new()
        .sync_external(&store_b, &StoreConfig::default())
        .is_empty());
}

#[test]
fn subscription_scope_ends_delivery() {
    let store = MemorySlotStore::new();
    let bus = ChangeBus::new();
    let addresses = AddressBook::new(&store, bus.clone(), &StoreConfig::default());
    let hits = Rc::new(RefCell::new(0));

    {
        let counter = Rc::clone(&hits);
        let _sub = addresses.subscribe(move |_| *counter.borrow_mut() += 1);
        addresses
            .add_user_address(
                "ana@mail.com",
                AddressInput {
                    full_name: "Ana".into(),
                    line1: "Calle 1".into(),
                    ..AddressInput::default()
                },
            )
            .unwrap();
    }
    assert_eq!(*hits.borrow(), 1);
    assert_eq!(bus.subscriber_count(), 0);
}
