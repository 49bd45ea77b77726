use contact_store::{ContactSource, ContactStore, IdentifierScheme, Observation};
use proptest::prelude::*;

/// A small consistent world: every person owns one phone and one linked id.
fn phone_of(person: usize) -> String {
    format!("62811100{person}")
}

fn linked_of(person: usize) -> String {
    format!("8044000{person}")
}

#[derive(Debug, Clone, Copy)]
enum Form {
    PhoneJid,
    LinkedJid,
    DeviceJid,
}

fn source() -> impl Strategy<Value = ContactSource> {
    prop_oneof![
        Just(ContactSource::RosterScan),
        Just(ContactSource::MessageEvent),
        Just(ContactSource::ContactEvent),
        Just(ContactSource::ManualSeed),
    ]
}

fn name() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("Widji".to_string())),
        Just(Some("Bob".to_string())),
        Just(Some("Robert".to_string())),
    ]
}

fn observation(persons: std::ops::Range<usize>) -> impl Strategy<Value = Observation> {
    (
        persons,
        prop_oneof![Just(Form::PhoneJid), Just(Form::LinkedJid), Just(Form::DeviceJid)],
        any::<bool>(),
        name(),
        source(),
        0u64..1_000,
    )
        .prop_map(|(person, form, hint, name, source, seen_at)| {
            let phone = phone_of(person);
            let linked = linked_of(person);
            let observation = match form {
                Form::PhoneJid => {
                    let o = Observation::new(format!("{phone}@s.whatsapp.net"), source);
                    if hint {
                        o.with_linked_id(linked)
                    } else {
                        o
                    }
                }
                Form::LinkedJid => {
                    let o = Observation::new(format!("{linked}@lid"), source);
                    if hint {
                        o.with_phone(phone)
                    } else {
                        o
                    }
                }
                Form::DeviceJid => Observation::new(format!("{phone}:3@s.whatsapp.net"), source),
            };
            observation.with_display_name(name).seen_at(seen_at)
        })
}

fn apply(store: &mut ContactStore, observations: &[Observation]) {
    for observation in observations {
        store.merge(observation.clone());
    }
}

proptest! {
    #[test]
    fn proptest_merge_is_idempotent(
        prefix in prop::collection::vec(observation(0..3), 0..12),
        last in observation(0..3),
    ) {
        let mut once = ContactStore::new(IdentifierScheme::default());
        apply(&mut once, &prefix);
        once.merge(last.clone());

        let mut twice = once.clone();
        twice.merge(last);

        prop_assert_eq!(once.to_snapshot(0), twice.to_snapshot(0));
    }

    #[test]
    fn proptest_linked_id_is_never_dropped(
        person in 0usize..3,
        later in prop::collection::vec((name(), source()), 1..10),
    ) {
        let id = format!("{}@s.whatsapp.net", phone_of(person));
        let mut store = ContactStore::new(IdentifierScheme::default());
        store.merge(Observation::new(&id, ContactSource::ContactEvent).with_linked_id(linked_of(person)));

        let want = linked_of(person);
        for (name, source) in later {
            store.merge(Observation::new(&id, source).with_display_name(name));
            let record = store.get(&id).unwrap();
            prop_assert_eq!(record.linked_id.as_deref(), Some(want.as_str()));
        }
    }

    #[test]
    fn proptest_linked_hint_order_does_not_matter(
        prefix in prop::collection::vec(observation(1..3), 0..8),
        name in name(),
        source in source(),
        seen_at in 0u64..1_000,
    ) {
        let id = format!("{}@s.whatsapp.net", phone_of(0));
        let plain = Observation::new(&id, source).with_display_name(name).seen_at(seen_at);
        let hinted = plain.clone().with_linked_id(linked_of(0));

        let mut forward = ContactStore::new(IdentifierScheme::default());
        apply(&mut forward, &prefix);
        let mut backward = forward.clone();

        forward.merge(hinted.clone());
        forward.merge(plain.clone());
        backward.merge(plain);
        backward.merge(hinted);

        prop_assert_eq!(forward.to_snapshot(0), backward.to_snapshot(0));
    }
}
