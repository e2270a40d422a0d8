use tienda_core::{
    AddressBook, AddressInput, AddressPatch, ChangeBus, MemorySlotStore, OverlayError, SlotStore,
    StoreConfig, ValidationError,
};

fn book(store: &MemorySlotStore) -> AddressBook<&MemorySlotStore> {
    AddressBook::new(store, ChangeBus::new(), &StoreConfig::default())
}

fn input(line1: &str) -> AddressInput {
    AddressInput {
        full_name: "Ana Pérez".into(),
        line1: line1.into(),
        city: "Córdoba".into(),
        ..AddressInput::default()
    }
}

fn primary_ids(book: &AddressBook<&MemorySlotStore>, email: &str) -> Vec<String> {
    book.get_user_addresses(email)
        .into_iter()
        .filter(|a| a.is_primary)
        .map(|a| a.id)
        .collect()
}

#[test]
fn first_address_becomes_primary_with_default_country() {
    let store = MemorySlotStore::new();
    let book = book(&store);

    let first = book.add_user_address("ana@mail.com", input("Calle 1")).unwrap();
    assert!(first.is_primary);
    assert_eq!(first.country, "Argentina");
    assert!(!first.id.is_empty());

    let second = book.add_user_address("ana@mail.com", input("Calle 2")).unwrap();
    assert!(!second.is_primary);
    assert_eq!(primary_ids(&book, "ana@mail.com"), vec![first.id]);
}

#[test]
fn email_scope_is_normalized() {
    let store = MemorySlotStore::new();
    let book = book(&store);

    book.add_user_address(" Ana@Mail.com ", input("Calle 1")).unwrap();

    assert_eq!(book.get_user_addresses("ana@mail.com").len(), 1);
    assert_eq!(book.get_user_addresses("ANA@MAIL.COM").len(), 1);
    assert!(book.get_user_addresses("bob@mail.com").is_empty());
}

#[test]
fn new_primary_demotes_previous_and_removal_promotes_newest() {
    let store = MemorySlotStore::new();
    let book = book(&store);
    let email = "ana@mail.com";

    let a = book.add_user_address(email, input("Calle 1")).unwrap();
    let b = book
        .add_user_address(
            email,
            AddressInput {
                is_primary: true,
                ..input("Calle 2")
            },
        )
        .unwrap();
    assert!(b.is_primary);
    assert_eq!(primary_ids(&book, email), vec![b.id.clone()]);

    assert!(book.remove_user_address(email, &b.id));
    assert_eq!(primary_ids(&book, email), vec![a.id.clone()]);
    assert_eq!(book.get_primary_address(email).unwrap().id, a.id);
}

#[test]
fn set_primary_keeps_exactly_one() {
    let store = MemorySlotStore::new();
    let book = book(&store);
    let email = "ana@mail.com";

    let a = book.add_user_address(email, input("Calle 1")).unwrap();
    let b = book.add_user_address(email, input("Calle 2")).unwrap();
    let c = book.add_user_address(email, input("Calle 3")).unwrap();

    let chosen = book.set_primary_user_address(email, &c.id).unwrap();
    assert!(chosen.is_primary);
    assert_eq!(primary_ids(&book, email), vec![c.id.clone()]);

    let listed = book.get_user_addresses(email);
    assert_eq!(listed[0].id, c.id);
    assert!(listed.iter().any(|x| x.id == a.id));
    assert!(listed.iter().any(|x| x.id == b.id));

    assert!(book.set_primary_user_address(email, "missing").is_none());
    assert!(book.set_primary_user_address("bob@mail.com", &a.id).is_none());
}

#[test]
fn update_patches_fields_and_primary_flag() {
    let store = MemorySlotStore::new();
    let book = book(&store);
    let email = "ana@mail.com";

    let a = book.add_user_address(email, input("Calle 1")).unwrap();
    let b = book.add_user_address(email, input("Calle 2")).unwrap();

    let updated = book
        .update_user_address(
            email,
            &b.id,
            AddressPatch {
                city: Some("Rosario".into()),
                is_primary: Some(true),
                ..AddressPatch::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated.city, "Rosario");
    assert!(updated.updated_at.is_some());
    assert_eq!(primary_ids(&book, email), vec![b.id.clone()]);

    book.update_user_address(
        email,
        &b.id,
        AddressPatch {
            is_primary: Some(false),
            ..AddressPatch::default()
        },
    )
    .unwrap();
    assert_eq!(primary_ids(&book, email).len(), 1);

    let missing = book
        .update_user_address(email, "missing", AddressPatch::default())
        .unwrap();
    assert!(missing.is_none());
    assert!(book
        .update_user_address("bob@mail.com", &a.id, AddressPatch::default())
        .unwrap()
        .is_none());
}

#[test]
fn update_rejects_blank_required_fields() {
    let store = MemorySlotStore::new();
    let book = book(&store);
    let email = "ana@mail.com";
    let a = book.add_user_address(email, input("Calle 1")).unwrap();

    let err = book
        .update_user_address(
            email,
            &a.id,
            AddressPatch {
                line1: Some("   ".into()),
                ..AddressPatch::default()
            },
        )
        .unwrap_err();
    assert_eq!(err, OverlayError::Validation(ValidationError::BlankField("line1")));
    assert_eq!(book.get_user_addresses(email)[0].line1, "Calle 1");
}

#[test]
fn add_validates_email_and_required_fields() {
    let store = MemorySlotStore::new();
    let book = book(&store);

    assert!(matches!(
        book.add_user_address("nope", input("Calle 1")),
        Err(OverlayError::Validation(ValidationError::InvalidEmail(_)))
    ));
    assert_eq!(
        book.add_user_address(
            "ana@mail.com",
            AddressInput {
                full_name: " ".into(),
                ..input("Calle 1")
            }
        )
        .unwrap_err(),
        OverlayError::Validation(ValidationError::BlankField("fullName"))
    );
    assert!(book.get_user_addresses("ana@mail.com").is_empty());
}

#[test]
fn removing_last_address_drops_the_scope() {
    let store = MemorySlotStore::new();
    let book = book(&store);
    let email = "ana@mail.com";
    let a = book.add_user_address(email, input("Calle 1")).unwrap();

    assert!(!book.remove_user_address(email, "missing"));
    assert!(book.remove_user_address(email, &a.id));
    assert!(!book.remove_user_address(email, &a.id));
    assert!(book.get_primary_address(email).is_none());

    let raw = store
        .read_slot(&StoreConfig::default().address_slot)
        .unwrap()
        .unwrap();
    assert_eq!(raw, "{}");
}

#[test]
fn damaged_scope_heals_primary_flags_on_read() {
    let store = MemorySlotStore::new();
    store.put_raw(
        &StoreConfig::default().address_slot,
        r#"{"ana@mail.com":[
            {"id":"a","fullName":"Ana","line1":"Calle 1","isPrimary":true,"createdAt":1},
            {"id":"b","fullName":"Ana","line1":"Calle 2","isPrimary":true,"createdAt":2},
            {"id":"b","fullName":"Ana","line1":"Duplicada","createdAt":3},
            {"id":"c","fullName":"","line1":"Calle 3","createdAt":4}
        ]}"#,
    );
    let book = book(&store);

    let listed = book.get_user_addresses("ana@mail.com");
    let ids: Vec<_> = listed.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(primary_ids(&book, "ana@mail.com"), vec!["a".to_string()]);
}
