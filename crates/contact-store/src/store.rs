use crate::arbiter::{arbitrate_name, keeps_name_on_dedupe, link_may_replace, NameClaim};
use crate::identifier::{self, strip_domain, IdentifierScheme};
use crate::snapshot::{Snapshot, SnapshotMetadata, SNAPSHOT_SCHEMA_VERSION};
use crate::stats::{DedupeReport, StoreStats};
use crate::types::{ContactRecord, ContactSource, Observation, SeedContact};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What a single merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The observation carried no usable id
    pub ignored: bool,
    /// A new record was created
    pub created: bool,
    /// Phone and linked id are both known for the record after the merge
    pub linked: bool,
    /// A link index entry was added or changed
    pub link_changed: bool,
    /// Differing display names met; see [`crate::arbitrate_name`]
    pub name_conflict: bool,
}

/// In-memory contact identity store.
///
/// Holds one record per observed id plus three auxiliary indices:
/// linked id -> phone (also aliased by raw id), phone -> linked id, and
/// identifier key -> display name.
#[derive(Debug, Clone, Default)]
pub struct ContactStore {
    scheme: IdentifierScheme,
    records: BTreeMap<String, ContactRecord>,
    linked_to_phone: HashMap<String, String>,
    phone_to_linked: HashMap<String, String>,
    names: HashMap<String, String>,
    chats: BTreeMap<String, BTreeSet<String>>,
    chats_scanned: usize,
    last_scan_time: Option<u64>,
    last_saved: Option<u64>,
}

impl ContactStore {
    pub fn new(scheme: IdentifierScheme) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn scheme(&self) -> &IdentifierScheme {
        &self.scheme
    }

    /// Phone (or opaque key) for `id`, consulting previously resolved ids first.
    pub fn extract_phone(&self, id: &str) -> Option<String> {
        if let Some(phone) = self.cached_phone(id) {
            return Some(phone.clone());
        }
        identifier::extract_phone(&self.scheme, id)
    }

    pub fn extract_linked_id(&self, id: &str) -> Option<String> {
        identifier::extract_linked_id(&self.scheme, id)
    }

    fn cached_phone(&self, id: &str) -> Option<&String> {
        if id.is_empty() {
            return None;
        }
        self.linked_to_phone
            .get(id)
            .or_else(|| self.linked_to_phone.get(strip_domain(id)))
    }

    /// Fold one observation into the store. Applying the same observation twice leaves
    /// the same state as applying it once.
    pub fn merge(&mut self, observation: Observation) -> MergeOutcome {
        let Observation {
            id,
            phone,
            linked_id,
            display_name,
            source,
            origin_group,
            origin_chat,
            seen_at,
        } = observation;

        let id = id.trim().to_string();
        if id.is_empty() {
            log::debug!("Ignoring observation without id (source {source})");
            return MergeOutcome {
                ignored: true,
                ..MergeOutcome::default()
            };
        }

        let classified = self.scheme.classify(&id);
        let existing = self.records.get(&id);

        let mut linked = non_empty(linked_id)
            .or_else(|| existing.and_then(|r| r.linked_id.clone()))
            .or_else(|| classified.linked_id().map(str::to_string));

        let mut phone = non_empty(phone)
            .or_else(|| self.cached_phone(&id).cloned())
            .or_else(|| {
                linked
                    .as_ref()
                    .and_then(|l| self.linked_to_phone.get(l))
                    .cloned()
            })
            .or_else(|| classified.phone().map(str::to_string));
        if phone.is_none() {
            phone = existing.and_then(|r| r.phone_number.clone());
        }

        if linked.is_none() {
            linked = phone
                .as_ref()
                .and_then(|p| self.phone_to_linked.get(p))
                .cloned();
            if let (Some(l), Some(p)) = (&linked, &phone) {
                log::debug!("Applied known phone -> linked id mapping: {p} -> {l}");
            }
        }

        let decision = arbitrate_name(
            existing.map(|r| NameClaim {
                name: r.display_name.as_deref(),
                source: r.source,
            }),
            NameClaim {
                name: display_name.as_deref(),
                source,
            },
        );
        if decision.conflict {
            log::debug!(
                "Display name conflict for {id}: existing {:?}, incoming {:?} from {source}; keeping {:?} ({})",
                existing.and_then(|r| r.display_name.as_deref()),
                display_name,
                decision.display_name,
                decision.source
            );
        }

        let created = existing.is_none();
        let record = ContactRecord {
            id: id.clone(),
            phone_number: phone.clone(),
            linked_id: linked.clone(),
            display_name: decision.display_name,
            source: decision.source,
            origin_group: origin_group.or_else(|| existing.and_then(|r| r.origin_group.clone())),
            origin_chat: origin_chat.or_else(|| existing.and_then(|r| r.origin_chat.clone())),
            last_seen: existing.map_or(seen_at, |r| r.last_seen.max(seen_at)),
        };
        let name = record.display_name.clone();
        self.records.insert(id.clone(), record);

        let mut outcome = MergeOutcome {
            created,
            name_conflict: decision.conflict,
            ..MergeOutcome::default()
        };

        if let (Some(l), Some(p)) = (&linked, &phone) {
            outcome.linked = true;
            outcome.link_changed = self.write_link(&id, l, p);
        }

        if let Some(name) = name {
            self.write_name(&id, linked.as_deref(), phone.as_deref(), &name);
        }

        outcome
    }

    /// Write both link directions plus the raw-id alias. Returns whether anything changed.
    fn write_link(&mut self, id: &str, linked: &str, phone: &str) -> bool {
        let self_equivalent = linked == phone;
        let mut changed = false;

        for (index, key, value) in [
            (&mut self.linked_to_phone, linked, phone),
            (&mut self.phone_to_linked, phone, linked),
        ] {
            changed |= put_link(index, key, value, self_equivalent);
        }
        if id != linked {
            changed |= put_link(&mut self.linked_to_phone, id, phone, self_equivalent);
        }

        if changed {
            log::debug!("Linked {phone} <-> {linked} (via {id})");
        }
        changed
    }

    /// Record `name` under the raw id, the linked id, and the paired phone/linked view.
    fn write_name(&mut self, id: &str, linked: Option<&str>, phone: Option<&str>, name: &str) {
        self.names.insert(id.to_string(), name.to_string());
        let Some(linked) = linked else {
            return;
        };
        self.names.insert(linked.to_string(), name.to_string());

        let Some(phone) = phone else {
            return;
        };
        let phone_jid = self.scheme.phone_jid(phone);
        let linked_jid = self.scheme.linked_jid(linked);
        if id == linked_jid && phone_jid != id {
            self.names.insert(phone_jid, name.to_string());
        } else if id == phone_jid && linked_jid != id {
            self.names.insert(linked_jid, name.to_string());
        }
    }

    /// Apply an operator-supplied link as a `ManualSeed` record keyed by the linked-id form.
    pub fn apply_seed(&mut self, seed: &SeedContact) -> MergeOutcome {
        let id = self.scheme.linked_jid(seed.linked_id.trim());
        let observation = Observation::new(id, ContactSource::ManualSeed)
            .with_phone(seed.phone.trim())
            .with_linked_id(seed.linked_id.trim())
            .with_display_name(seed.display_name.clone());
        let outcome = self.merge(observation);
        log::info!(
            "Seeded link {} <-> {} ({})",
            seed.phone,
            seed.linked_id,
            seed.display_name.as_deref().unwrap_or("no name")
        );
        outcome
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ContactRecord> {
        self.records.get(id)
    }

    /// Record for `phone`: the phone-routed id first, then the linked-id record it maps to.
    #[must_use]
    pub fn get_by_phone(&self, phone: &str) -> Option<&ContactRecord> {
        if let Some(record) = self.records.get(&self.scheme.phone_jid(phone)) {
            return Some(record);
        }
        let linked = self.phone_to_linked.get(phone)?;
        self.records.get(&self.scheme.linked_jid(linked))
    }

    #[must_use]
    pub fn search_by_phone(&self, phone: &str) -> Vec<&ContactRecord> {
        self.records
            .values()
            .filter(|r| r.phone_number.as_deref() == Some(phone))
            .collect()
    }

    /// Case-insensitive substring match on display names.
    #[must_use]
    pub fn search_by_name(&self, needle: &str) -> Vec<&ContactRecord> {
        let needle = needle.to_lowercase();
        self.records
            .values()
            .filter(|r| {
                r.display_name
                    .as_ref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Best-known display name for `id` without a fallback.
    #[must_use]
    pub fn display_name_of(&self, id: &str) -> Option<&str> {
        if id.is_empty() {
            return None;
        }
        if let Some(name) = self.records.get(id).and_then(|r| r.display_name.as_deref()) {
            return Some(name);
        }
        if let Some(name) = self.names.get(id) {
            return Some(name);
        }

        let phone = self.extract_phone(id)?;
        let linked = self.phone_to_linked.get(&phone)?;
        let linked_jid = self.scheme.linked_jid(linked);
        self.records
            .get(&linked_jid)
            .and_then(|r| r.display_name.as_deref())
            .or_else(|| self.names.get(&linked_jid).map(String::as_str))
    }

    pub fn resolve_display_name(&self, id: &str, fallback: &str) -> String {
        self.display_name_of(id).unwrap_or(fallback).to_string()
    }

    #[must_use]
    pub fn display_name_for_key(&self, key: &str) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn phone_for_linked_id(&self, linked_id: &str) -> Option<&str> {
        self.cached_phone(linked_id).map(String::as_str)
    }

    #[must_use]
    pub fn linked_id_for_phone(&self, phone: &str) -> Option<&str> {
        self.phone_to_linked.get(phone).map(String::as_str)
    }

    pub fn is_phone_of(&self, id: &str, phone: &str) -> bool {
        self.extract_phone(id).as_deref() == Some(phone)
    }

    pub fn all(&self) -> impl Iterator<Item = &ContactRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remember a chat seen through live events. Returns `true` when it is new.
    pub fn note_chat(&mut self, chat_id: &str) -> bool {
        if chat_id.is_empty() || self.chats.contains_key(chat_id) {
            return false;
        }
        self.chats.insert(chat_id.to_string(), BTreeSet::new());
        true
    }

    pub fn note_participant(&mut self, chat_id: &str, participant_id: &str) {
        if chat_id.is_empty() || participant_id.is_empty() {
            return;
        }
        self.chats
            .entry(chat_id.to_string())
            .or_default()
            .insert(participant_id.to_string());
    }

    #[must_use]
    pub fn known_chat_ids(&self) -> Vec<String> {
        self.chats.keys().cloned().collect()
    }

    #[must_use]
    pub fn chat_participants(&self, chat_id: &str) -> Option<&BTreeSet<String>> {
        self.chats.get(chat_id)
    }

    pub fn begin_scan(&mut self, started_at: u64) {
        self.last_scan_time = Some(started_at);
        self.chats_scanned = 0;
    }

    pub fn note_chat_scanned(&mut self) {
        self.chats_scanned += 1;
    }

    pub fn mark_saved(&mut self, saved_at: u64) {
        self.last_saved = Some(saved_at);
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_contacts: self.records.len(),
            mapped_links: self.phone_to_linked.len(),
            chats_scanned: self.chats_scanned,
            last_scan_time: self.last_scan_time,
            last_saved: self.last_saved,
            linked_id_to_phone_count: self.linked_to_phone.len(),
            phone_to_linked_id_count: self.phone_to_linked.len(),
            display_name_count: self.names.len(),
            known_chats: self.chats.len(),
        }
    }

    /// Clear display names shared by several unrelated records.
    ///
    /// Heuristic: for each shared name with a `MessageEvent` holder, the name is cleared on
    /// every other record except `MessageEvent`/`ManualSeed` ones and records tied to the
    /// holder by phone or linked id. Contacts that legitimately share a name lose it.
    pub fn dedupe_display_names(&mut self) -> DedupeReport {
        let mut by_name: BTreeMap<&str, Vec<&ContactRecord>> = BTreeMap::new();
        for record in self.records.values() {
            if let Some(name) = record.display_name.as_deref() {
                by_name.entry(name).or_default().push(record);
            }
        }

        let mut report = DedupeReport::default();
        let mut to_clear: Vec<ContactRecord> = Vec::new();
        for (name, holders) in by_name {
            if holders.len() < 2 {
                continue;
            }
            report.names_examined += 1;
            let Some(keeper) = holders
                .iter()
                .find(|r| r.source == ContactSource::MessageEvent)
            else {
                continue;
            };
            log::info!(
                "Display name \"{name}\" held by {} records; keeping it on {}",
                holders.len(),
                keeper.id
            );
            for record in &holders {
                if record.id == keeper.id
                    || keeps_name_on_dedupe(record.source)
                    || same_identity(record, keeper)
                {
                    continue;
                }
                to_clear.push((*record).clone());
            }
        }

        for cleared in to_clear {
            if let Some(record) = self.records.get_mut(&cleared.id) {
                record.display_name = None;
            }
            self.forget_name(&cleared);
            report.cleared.push(cleared.id);
        }
        report
    }

    /// Drop every key `write_name` stored for `record`. The paired phone/linked view is only
    /// removed while it still holds the record's name.
    fn forget_name(&mut self, record: &ContactRecord) {
        self.names.remove(&record.id);
        let Some(linked) = record.linked_id.as_deref() else {
            return;
        };
        self.names.remove(linked);

        let (Some(phone), Some(name)) = (
            record.phone_number.as_deref(),
            record.display_name.as_deref(),
        ) else {
            return;
        };
        for key in [self.scheme.phone_jid(phone), self.scheme.linked_jid(linked)] {
            if key != record.id && self.names.get(&key).map(String::as_str) == Some(name) {
                self.names.remove(&key);
            }
        }
    }

    /// Fill missing linked ids (and names) on phone-routed records from known links.
    /// Returns how many records gained a linked id.
    pub fn link_phone_records(&mut self) -> usize {
        let candidates: Vec<(String, String, String)> = self
            .records
            .values()
            .filter(|r| self.scheme.is_phone_routed(&r.id))
            .filter_map(|r| {
                let phone = r.phone_number.as_ref()?;
                let linked = self.phone_to_linked.get(phone)?;
                Some((r.id.clone(), phone.clone(), linked.clone()))
            })
            .collect();

        let mut linked_count = 0;
        for (id, phone, linked) in candidates {
            let linked_jid = self.scheme.linked_jid(&linked);
            let borrowed_name = self
                .records
                .get(&linked_jid)
                .and_then(|r| r.display_name.clone())
                .or_else(|| self.names.get(&id).cloned());

            let Some(record) = self.records.get_mut(&id) else {
                continue;
            };
            if record.linked_id.is_none() {
                log::debug!("Applying linked id {linked} to {phone}");
                record.linked_id = Some(linked);
                linked_count += 1;
            }
            if record.display_name.is_none() {
                if let Some(name) = borrowed_name {
                    record.display_name = Some(name.clone());
                    self.names.insert(id, name);
                }
            }
        }

        log::info!("Linked {linked_count} phone records to known linked ids");
        linked_count
    }

    #[must_use]
    pub fn to_snapshot(&self, now: u64) -> Snapshot {
        Snapshot {
            metadata: SnapshotMetadata {
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                last_updated: now,
                total_contacts: self.records.len(),
                mapped_links: self.phone_to_linked.len(),
                chats_scanned: self.chats_scanned,
                last_scan_time: self.last_scan_time,
            },
            records: self.records.values().cloned().collect(),
            linked_id_to_phone: self
                .linked_to_phone
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            phone_to_linked_id: self
                .phone_to_linked
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            display_name_by_key: self
                .names
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Merge snapshot contents into the indices. Meant for a freshly constructed store,
    /// before any observation is processed.
    pub fn restore(&mut self, snapshot: Snapshot) -> usize {
        let Snapshot {
            metadata,
            records,
            linked_id_to_phone,
            phone_to_linked_id,
            display_name_by_key,
        } = snapshot;

        let count = records.len();
        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        self.linked_to_phone.extend(linked_id_to_phone);
        self.phone_to_linked.extend(phone_to_linked_id);
        self.names.extend(display_name_by_key);
        self.chats_scanned = metadata.chats_scanned;
        self.last_scan_time = metadata.last_scan_time;
        self.last_saved = Some(metadata.last_updated);

        log::info!("Loaded {count} contacts from snapshot");
        count
    }
}

fn put_link(
    index: &mut HashMap<String, String>,
    key: &str,
    value: &str,
    self_equivalent: bool,
) -> bool {
    let current = index.get(key).map(String::as_str);
    if current == Some(value) || !link_may_replace(current, value, self_equivalent) {
        return false;
    }
    index.insert(key.to_string(), value.to_string());
    true
}

fn same_identity(a: &ContactRecord, b: &ContactRecord) -> bool {
    let shared = |x: &Option<String>, y: &Option<String>| x.is_some() && x == y;
    shared(&a.phone_number, &b.phone_number) || shared(&a.linked_id, &b.linked_id)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
