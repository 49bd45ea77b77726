use contact_store::{
    read_snapshot, ContactSource, ContactStore, IdentifierScheme, Observation, SeedContact,
    SnapshotWriter, StoreConfig,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const PHONE: &str = "6285712612218";
const LINKED: &str = "80444922015783";

fn seeded_store() -> ContactStore {
    let mut store = ContactStore::new(IdentifierScheme::default());
    store.apply_seed(&SeedContact {
        phone: PHONE.to_string(),
        linked_id: LINKED.to_string(),
        display_name: Some("Widji".to_string()),
    });
    store
}

#[test]
fn phone_and_linked_surfaces_resolve_to_one_person() {
    let mut store = seeded_store();
    let phone_id = format!("{PHONE}@s.whatsapp.net");
    let linked_id = format!("{LINKED}@lid");

    store.merge(Observation::new(&phone_id, ContactSource::MessageEvent).named("Widji"));
    store.merge(Observation::new(&linked_id, ContactSource::MessageEvent));

    assert_eq!(store.linked_id_for_phone(PHONE), Some(LINKED));
    assert_eq!(store.resolve_display_name(&phone_id, "Unknown"), "Widji");
    assert_eq!(store.resolve_display_name(&linked_id, "Unknown"), "Widji");
    assert!(store.is_phone_of(&linked_id, PHONE));
}

#[test]
fn message_name_outranks_contact_sync() {
    let mut store = ContactStore::new(IdentifierScheme::default());
    let id = "628999@s.whatsapp.net";

    store.merge(Observation::new(id, ContactSource::ContactEvent).named("Bob"));
    assert_eq!(store.resolve_display_name(id, "?"), "Bob");

    store.merge(Observation::new(id, ContactSource::MessageEvent).named("Robert"));
    assert_eq!(store.resolve_display_name(id, "?"), "Robert");

    for _ in 0..3 {
        store.merge(Observation::new(id, ContactSource::ContactEvent).named("Bobby"));
    }
    assert_eq!(store.resolve_display_name(id, "?"), "Robert");
}

#[test]
fn seeded_name_is_never_overwritten() {
    let mut store = seeded_store();
    let linked_id = format!("{LINKED}@lid");
    for source in [
        ContactSource::RosterScan,
        ContactSource::MessageEvent,
        ContactSource::ContactEvent,
    ] {
        store.merge(Observation::new(&linked_id, source).named("Someone Else"));
    }
    let record = store.get(&linked_id).unwrap();
    assert_eq!(record.display_name.as_deref(), Some("Widji"));
    assert_eq!(record.source, ContactSource::ManualSeed);
}

#[test]
fn get_by_phone_reaches_both_views() {
    let mut store = ContactStore::new(IdentifierScheme::default());
    store.merge(Observation::new("628111@s.whatsapp.net", ContactSource::ContactEvent).named("Direct"));
    store.merge(
        Observation::new("777@lid", ContactSource::ContactEvent)
            .with_phone("628222")
            .named("Indirect"),
    );

    let direct = store.get_by_phone("628111").unwrap();
    assert_eq!(direct.display_name.as_deref(), Some("Direct"));
    let indirect = store.get_by_phone("628222").unwrap();
    assert_eq!(indirect.id, "777@lid");
    assert!(store.get_by_phone("628333").is_none());
}

#[tokio::test]
async fn saved_snapshot_loads_into_equivalent_store() {
    let tmp = TempDir::new().unwrap();
    let config = StoreConfig::default().with_snapshot_path(tmp.path().join("data").join("contacts.json"));

    let mut store = seeded_store();
    store.merge(Observation::new("628111@s.whatsapp.net", ContactSource::MessageEvent).named("Ann"));
    store.merge(
        Observation::new("555@lid", ContactSource::RosterScan)
            .with_phone("628444")
            .with_group("120363@g.us"),
    );

    let writer = SnapshotWriter::start(&config.snapshot_path, config.save_timeout());
    writer.save(store.to_snapshot(1_000)).await.unwrap();
    writer.shutdown().await.unwrap();

    let snapshot = read_snapshot(&config.snapshot_path).await.unwrap().unwrap();
    let mut loaded = ContactStore::new(IdentifierScheme::default());
    loaded.restore(snapshot);

    assert_eq!(loaded.to_snapshot(1_000), store.to_snapshot(1_000));
    assert_eq!(loaded.stats().total_contacts, 3);
    assert_eq!(loaded.stats().last_saved, Some(1_000));
    assert_eq!(
        loaded.get("555@lid").unwrap().origin_group.as_deref(),
        Some("120363@g.us")
    );
}

