use crate::config::SyncConfig;
use crate::directory::ChatDirectory;
use crate::error::{Result, SyncError};
use crate::events::{ContactUpdate, LiveEvent, MessageNotice};
use crate::scanner::{BackfillScanner, ScanReport};
use contact_store::{
    export_path, read_snapshot, unix_now_ms, write_export, ContactRecord, ContactSource,
    ContactStore, DedupeReport, ExportFormat, Observation, SnapshotWriter, StoreStats,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{watch, Mutex as TokioMutex, Notify};
use tokio::task::JoinHandle;

/// Facade over the contact store: lifecycle, event ingestion, queries, scans and persistence.
///
/// Cheap to clone; clones share one store.
#[derive(Clone)]
pub struct ContactService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: SyncConfig,
    scanner: BackfillScanner,
    store: TokioMutex<ContactStore>,
    ready: OnceLock<Ready>,
    cancel_tx: watch::Sender<bool>,
    scanning: AtomicBool,
    scan_released: Notify,
    /// Live changes not yet handed to the writer
    dirty: AtomicBool,
    /// An autosave flush task is running
    flushing: AtomicBool,
}

struct Ready {
    directory: Arc<dyn ChatDirectory>,
    writer: SnapshotWriter,
}

/// Holds the single-scan slot; released on drop.
struct ScanSlot {
    inner: Arc<ServiceInner>,
}

impl Drop for ScanSlot {
    fn drop(&mut self) {
        self.inner.scanning.store(false, Ordering::SeqCst);
        self.inner.scan_released.notify_waiters();
    }
}

impl ContactService {
    pub fn new(config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let (cancel_tx, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(ServiceInner {
                scanner: BackfillScanner::new(config.scan),
                store: TokioMutex::new(ContactStore::new(config.store.scheme.clone())),
                config,
                ready: OnceLock::new(),
                cancel_tx,
                scanning: AtomicBool::new(false),
                scan_released: Notify::new(),
                dirty: AtomicBool::new(false),
                flushing: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.ready.get().is_some()
    }

    /// Load the snapshot, apply configured seeds and start the snapshot writer.
    ///
    /// A missing snapshot starts an empty store; an unreadable one fails initialization.
    pub async fn initialize(&self, directory: Arc<dyn ChatDirectory>) -> Result<()> {
        let store_config = &self.inner.config.store;
        let mut store = self.inner.store.lock().await;
        if self.is_initialized() {
            return Err(SyncError::AlreadyInitialized);
        }

        if let Some(snapshot) = read_snapshot(&store_config.snapshot_path).await? {
            store.restore(snapshot);
        }
        for seed in &store_config.seeds {
            store.apply_seed(seed);
        }

        let writer = SnapshotWriter::start(
            store_config.snapshot_path.clone(),
            store_config.save_timeout(),
        );
        self.inner
            .ready
            .set(Ready { directory, writer })
            .map_err(|_| SyncError::AlreadyInitialized)?;

        log::info!(
            "Contact service ready: {} contacts, {} links ({})",
            store.len(),
            store.stats().mapped_links,
            store_config.snapshot_path.display()
        );
        Ok(())
    }

    fn ready(&self) -> Result<&Ready> {
        self.inner.ready.get().ok_or(SyncError::NotInitialized)
    }

    pub async fn ingest(&self, event: LiveEvent) -> Result<usize> {
        match event {
            LiveEvent::Contacts { contacts } => self.ingest_contacts(&contacts).await,
            LiveEvent::Message(notice) => self.ingest_message(&notice).await.map(usize::from),
            LiveEvent::Chats { chat_ids } => self.ingest_chats(&chat_ids).await,
        }
    }

    /// Contact-list sync. Returns how many entries were merged.
    pub async fn ingest_contacts(&self, contacts: &[ContactUpdate]) -> Result<usize> {
        self.ready()?;
        let mut store = self.inner.store.lock().await;
        let mut merged = 0;
        for contact in contacts {
            let outcome = store.merge(
                Observation::new(&contact.id, ContactSource::ContactEvent)
                    .with_display_name(contact.display_name().map(str::to_string)),
            );
            merged += usize::from(!outcome.ignored);
        }
        if merged > 0 {
            self.autosave();
        }
        Ok(merged)
    }

    /// A live message. Returns `false` when the message had no usable sender.
    pub async fn ingest_message(&self, notice: &MessageNotice) -> Result<bool> {
        self.ready()?;
        let mut store = self.inner.store.lock().await;
        store.note_chat(&notice.chat_id);

        let Some(sender) = notice.sender() else {
            return Ok(false);
        };
        store.note_participant(&notice.chat_id, sender);

        let mut observation = Observation::new(sender, ContactSource::MessageEvent)
            .with_display_name(notice.display_name().map(str::to_string))
            .with_chat(&notice.chat_id);
        if let Some(at) = notice.timestamp {
            observation = observation.seen_at(at);
        }
        let outcome = store.merge(observation);
        if !outcome.ignored {
            self.autosave();
        }
        Ok(!outcome.ignored)
    }

    /// Chat list update. Returns how many chats were new.
    pub async fn ingest_chats(&self, chat_ids: &[String]) -> Result<usize> {
        self.ready()?;
        let mut store = self.inner.store.lock().await;
        Ok(chat_ids.iter().filter(|id| store.note_chat(id)).count())
    }

    /// Mark the store dirty and make sure a flush task is running. A burst of changes costs
    /// one snapshot per completed write, not one per change.
    fn autosave(&self) {
        if !self.inner.config.autosave {
            return;
        }
        self.inner.dirty.store(true, Ordering::SeqCst);
        if self.inner.flushing.swap(true, Ordering::SeqCst) {
            return;
        }
        let service = self.clone();
        tokio::spawn(async move { service.flush_autosaves().await });
    }

    /// Write the latest state until nothing is left unsaved. Failures are logged, not returned.
    async fn flush_autosaves(&self) {
        loop {
            if self.inner.dirty.swap(false, Ordering::SeqCst) {
                if let Err(err) = self.write_current().await {
                    log::debug!("Autosave did not complete: {err}");
                }
            }
            self.inner.flushing.store(false, Ordering::SeqCst);
            if !self.inner.dirty.load(Ordering::SeqCst)
                || self.inner.flushing.swap(true, Ordering::SeqCst)
            {
                return;
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<ContactRecord>> {
        self.ready()?;
        Ok(self.inner.store.lock().await.get(id).cloned())
    }

    pub async fn get_by_phone(&self, phone: &str) -> Result<Option<ContactRecord>> {
        self.ready()?;
        Ok(self.inner.store.lock().await.get_by_phone(phone).cloned())
    }

    pub async fn search_by_phone(&self, phone: &str) -> Result<Vec<ContactRecord>> {
        self.ready()?;
        let store = self.inner.store.lock().await;
        Ok(store.search_by_phone(phone).into_iter().cloned().collect())
    }

    pub async fn search_by_name(&self, needle: &str) -> Result<Vec<ContactRecord>> {
        self.ready()?;
        let store = self.inner.store.lock().await;
        Ok(store.search_by_name(needle).into_iter().cloned().collect())
    }

    pub async fn resolve_display_name(&self, id: &str, fallback: &str) -> Result<String> {
        self.ready()?;
        Ok(self.inner.store.lock().await.resolve_display_name(id, fallback))
    }

    pub async fn linked_id_for_phone(&self, phone: &str) -> Result<Option<String>> {
        self.ready()?;
        let store = self.inner.store.lock().await;
        Ok(store.linked_id_for_phone(phone).map(str::to_string))
    }

    pub async fn phone_for_linked_id(&self, linked_id: &str) -> Result<Option<String>> {
        self.ready()?;
        let store = self.inner.store.lock().await;
        Ok(store.phone_for_linked_id(linked_id).map(str::to_string))
    }

    pub async fn all_contacts(&self) -> Result<Vec<ContactRecord>> {
        self.ready()?;
        Ok(self.inner.store.lock().await.all().cloned().collect())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.ready()?;
        Ok(self.inner.store.lock().await.stats())
    }

    /// Run a backfill scan to completion, then save.
    pub async fn scan_all(&self) -> Result<ScanReport> {
        let slot = self.claim_scan_slot()?;
        self.run_scan(slot).await
    }

    /// Start a backfill scan on its own task. Fails immediately if one is already running.
    pub fn spawn_scan(&self) -> Result<JoinHandle<Result<ScanReport>>> {
        let slot = self.claim_scan_slot()?;
        let service = self.clone();
        Ok(tokio::spawn(async move { service.run_scan(slot).await }))
    }

    /// Ask a running scan to stop at the next chat boundary. Returns whether one was running.
    pub fn cancel_scan(&self) -> bool {
        if !self.is_scanning() {
            return false;
        }
        log::info!("Cancelling backfill scan");
        self.inner.cancel_tx.send_replace(true);
        true
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.scanning.load(Ordering::SeqCst)
    }

    async fn scan_released(&self) {
        loop {
            let released = self.inner.scan_released.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if !self.is_scanning() {
                return;
            }
            released.await;
        }
    }

    fn claim_scan_slot(&self) -> Result<ScanSlot> {
        self.ready()?;
        if self.inner.scanning.swap(true, Ordering::SeqCst) {
            return Err(SyncError::ScanInProgress);
        }
        self.inner.cancel_tx.send_replace(false);
        Ok(ScanSlot {
            inner: Arc::clone(&self.inner),
        })
    }

    async fn run_scan(&self, slot: ScanSlot) -> Result<ScanReport> {
        let ready = self.ready()?;
        let mut cancel = self.inner.cancel_tx.subscribe();
        let report = self
            .inner
            .scanner
            .scan_all(&self.inner.store, ready.directory.as_ref(), &mut cancel)
            .await;

        if self.inner.config.dedupe_after_scan {
            self.inner.store.lock().await.dedupe_display_names();
        }
        self.save().await?;
        drop(slot);
        Ok(report)
    }

    /// Persist now and wait for the write. Failures are returned, not just logged.
    pub async fn save(&self) -> Result<()> {
        let saved_at = self.write_current().await?;
        self.inner.store.lock().await.mark_saved(saved_at);
        Ok(())
    }

    async fn write_current(&self) -> Result<u64> {
        let ready = self.ready()?;
        let now = unix_now_ms();
        let snapshot = self.inner.store.lock().await.to_snapshot(now);
        ready.writer.save(snapshot).await?;
        Ok(now)
    }

    /// Write the current state beside the snapshot. Returns the file written.
    pub async fn export(&self, format: ExportFormat, file_name: Option<&str>) -> Result<PathBuf> {
        let ready = self.ready()?;
        let now = unix_now_ms();
        let snapshot = self.inner.store.lock().await.to_snapshot(now);
        let path = export_path(ready.writer.path(), format, file_name, now);
        write_export(&path, format, &snapshot).await?;
        Ok(path)
    }

    pub async fn dedupe_display_names(&self) -> Result<DedupeReport> {
        self.ready()?;
        let report = self.inner.store.lock().await.dedupe_display_names();
        if !report.cleared.is_empty() {
            self.autosave();
        }
        Ok(report)
    }

    pub async fn link_phone_records(&self) -> Result<usize> {
        self.ready()?;
        let linked = self.inner.store.lock().await.link_phone_records();
        if linked > 0 {
            self.autosave();
        }
        Ok(linked)
    }

    /// Stop any scan and wait for it to save its progress, then write a final snapshot and
    /// stop the writer.
    pub async fn shutdown(&self) -> Result<()> {
        let ready = self.ready()?;
        if self.cancel_scan() {
            self.scan_released().await;
        }
        self.save().await?;
        ready.writer.shutdown().await?;
        log::info!("Contact service stopped");
        Ok(())
    }
}
