use tienda_core::{
    ChangeBus, MemorySlotStore, OverlayError, Preferences, ProfileOverrides, ProfilePatch,
    SlotStore, StoreConfig, UserProfile, ValidationError,
};

fn overrides(store: &MemorySlotStore) -> ProfileOverrides<&MemorySlotStore> {
    ProfileOverrides::new(store, ChangeBus::new(), &StoreConfig::default())
}

fn payment(method: &str) -> ProfilePatch {
    ProfilePatch {
        preferencias: Some(Preferences {
            default_payment_method: Some(method.to_string()),
            ..Preferences::default()
        }),
        ..ProfilePatch::default()
    }
}

#[test]
fn successive_updates_deep_merge_preferences() {
    let store = MemorySlotStore::new();
    let overrides = overrides(&store);

    overrides
        .update_profile_overrides("ana@mail.com", payment("tarjeta"))
        .unwrap();
    let merged = overrides
        .update_profile_overrides(
            "ana@mail.com",
            ProfilePatch {
                nombre: Some("Ana".into()),
                ..ProfilePatch::default()
            },
        )
        .unwrap();

    assert_eq!(merged.nombre.as_deref(), Some("Ana"));
    assert_eq!(
        merged
            .preferencias
            .as_ref()
            .and_then(|prefs| prefs.default_payment_method.as_deref()),
        Some("tarjeta")
    );
    assert!(merged.updated_at.is_some());
    assert_eq!(overrides.get_profile_overrides("ana@mail.com"), merged);
}

#[test]
fn email_keys_are_case_insensitive() {
    let store = MemorySlotStore::new();
    let overrides = overrides(&store);

    overrides
        .update_profile_overrides(
            " Ana@Mail.com ",
            ProfilePatch {
                telefono: Some("555".into()),
                ..ProfilePatch::default()
            },
        )
        .unwrap();

    assert_eq!(
        overrides
            .get_profile_overrides("ana@mail.com")
            .telefono
            .as_deref(),
        Some("555")
    );
    let raw = store
        .read_slot(&StoreConfig::default().profile_slot)
        .unwrap()
        .unwrap();
    assert!(raw.contains("\"ana@mail.com\""), "payload was {raw}");
}

#[test]
fn clearing_every_field_removes_the_scope() {
    let store = MemorySlotStore::new();
    let overrides = overrides(&store);

    overrides
        .update_profile_overrides("ana@mail.com", payment("tarjeta"))
        .unwrap();
    let cleared = overrides
        .update_profile_overrides("ana@mail.com", payment(""))
        .unwrap();

    assert!(cleared.is_empty());
    assert_eq!(overrides.get_profile_overrides("ana@mail.com"), ProfilePatch::default());
    let raw = store
        .read_slot(&StoreConfig::default().profile_slot)
        .unwrap()
        .unwrap();
    assert_eq!(raw, "{}");
}

#[test]
fn invalid_email_is_rejected() {
    let store = MemorySlotStore::new();
    let overrides = overrides(&store);

    assert_eq!(
        overrides
            .update_profile_overrides("   ", payment("tarjeta"))
            .unwrap_err(),
        OverlayError::Validation(ValidationError::MissingKey("email"))
    );
    assert!(matches!(
        overrides.update_profile_overrides("not-an-email", payment("tarjeta")),
        Err(OverlayError::Validation(ValidationError::InvalidEmail(_)))
    ));
    assert_eq!(overrides.get_profile_overrides("   "), ProfilePatch::default());
}

#[test]
fn apply_to_projects_overrides_over_server_profile() {
    let store = MemorySlotStore::new();
    let overrides = overrides(&store);
    let server = UserProfile {
        email: "Ana@Mail.com".into(),
        nombre: "Ana".into(),
        apellido: "Pérez".into(),
        ..UserProfile::default()
    };

    overrides
        .update_profile_overrides(
            "ana@mail.com",
            ProfilePatch {
                apellido: Some("Gómez".into()),
                ..payment("efectivo")
            },
        )
        .unwrap();

    let shown = overrides.apply_to(&server);
    assert_eq!(shown.nombre, "Ana");
    assert_eq!(shown.apellido, "Gómez");
    assert_eq!(
        shown.preferencias.default_payment_method.as_deref(),
        Some("efectivo")
    );

    overrides.clear_profile_overrides("ANA@mail.com");
    assert_eq!(overrides.apply_to(&server), server);
}

#[test]
fn damaged_scopes_are_skipped_on_read() {
    let store = MemorySlotStore::new();
    store.put_raw(
        &StoreConfig::default().profile_slot,
        r#"{"ana@mail.com":{"nombre":" Ana ","preferencias":{}},"bob@mail.com":"oops"}"#,
    );
    let overrides = overrides(&store);

    let ana = overrides.get_profile_overrides("ana@mail.com");
    assert_eq!(ana.nombre.as_deref(), Some("Ana"));
    assert_eq!(ana.preferencias, None);
    assert!(overrides.get_profile_overrides("bob@mail.com").is_empty());
}
