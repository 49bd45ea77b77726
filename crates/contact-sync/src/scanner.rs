use crate::config::ScanOptions;
use crate::directory::{ChatDirectory, DirectoryError, RosterEntry};
use crate::events::MessageNotice;
use contact_store::{unix_now_ms, ContactSource, ContactStore, Observation};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::{watch, Mutex as TokioMutex};
use tokio::time;

/// Summary of one backfill scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Unix milliseconds when the scan started
    pub started_at: u64,
    pub duration_ms: u64,
    pub chats_total: usize,
    pub chats_scanned: usize,
    pub chats_failed: usize,
    pub observations: usize,
    pub contacts_total: usize,
    pub links_mapped: usize,
    /// Stopped early by a cancellation request
    pub cancelled: bool,
}

/// Walks every chat the directory (or the live event stream) knows about and feeds rosters
/// and recent message authors into the store.
pub struct BackfillScanner {
    options: ScanOptions,
}

struct ChatHarvest {
    roster: Vec<RosterEntry>,
    messages: Vec<MessageNotice>,
}

impl BackfillScanner {
    pub const fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Scan all chats. Per-chat failures are logged and counted, never fatal.
    ///
    /// Directory fetches run without holding the store lock; each chat's observations are
    /// merged under one short lock. A `true` on `cancel` stops the scan at the next chat
    /// boundary.
    pub async fn scan_all(
        &self,
        store: &TokioMutex<ContactStore>,
        directory: &dyn ChatDirectory,
        cancel: &mut watch::Receiver<bool>,
    ) -> ScanReport {
        let started = Instant::now();
        let started_at = unix_now_ms();
        store.lock().await.begin_scan(started_at);

        let chat_ids = self.enumerate(store, directory).await;
        log::info!("Starting backfill scan over {} chats", chat_ids.len());

        let mut report = ScanReport {
            started_at,
            chats_total: chat_ids.len(),
            ..ScanReport::default()
        };

        for (index, chat_id) in chat_ids.iter().enumerate() {
            if *cancel.borrow() {
                report.cancelled = true;
                break;
            }

            match self.harvest(store, directory, chat_id).await {
                Ok(harvest) => {
                    let mut guard = store.lock().await;
                    report.observations += merge_harvest(&mut guard, chat_id, harvest);
                    guard.note_chat_scanned();
                    report.chats_scanned += 1;
                }
                Err(err) => {
                    log::warn!("Skipping chat {chat_id}: {err}");
                    report.chats_failed += 1;
                }
            }

            let last = index + 1 == chat_ids.len();
            if !last && self.pause(cancel).await {
                report.cancelled = true;
                break;
            }
        }

        let stats = store.lock().await.stats();
        report.contacts_total = stats.total_contacts;
        report.links_mapped = stats.mapped_links;
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        log::info!(
            "Backfill scan {}: {}/{} chats scanned, {} failed, {} contacts, {} links in {} ms",
            if report.cancelled { "cancelled" } else { "finished" },
            report.chats_scanned,
            report.chats_total,
            report.chats_failed,
            report.contacts_total,
            report.links_mapped,
            report.duration_ms
        );
        report
    }

    async fn enumerate(
        &self,
        store: &TokioMutex<ContactStore>,
        directory: &dyn ChatDirectory,
    ) -> Vec<String> {
        match directory.chat_ids().await {
            Ok(Some(ids)) => return ids,
            Ok(None) => log::warn!("Directory cannot enumerate chats; using chats seen live"),
            Err(err) => log::warn!("Chat enumeration failed ({err}); using chats seen live"),
        }
        store.lock().await.known_chat_ids()
    }

    async fn harvest(
        &self,
        store: &TokioMutex<ContactStore>,
        directory: &dyn ChatDirectory,
        chat_id: &str,
    ) -> Result<ChatHarvest, DirectoryError> {
        let is_group = store.lock().await.scheme().is_group(chat_id);
        let roster = if is_group {
            directory.roster(chat_id).await?
        } else {
            Vec::new()
        };
        let messages = directory
            .recent_messages(chat_id, self.options.message_limit)
            .await?;
        Ok(ChatHarvest { roster, messages })
    }

    /// Inter-chat delay. Returns `true` if cancelled while waiting.
    async fn pause(&self, cancel: &mut watch::Receiver<bool>) -> bool {
        let delay = self.options.chat_delay();
        if delay.is_zero() {
            return *cancel.borrow();
        }
        tokio::select! {
            () = time::sleep(delay) => {}
            _ = cancel.changed() => {}
        }
        *cancel.borrow()
    }
}

fn merge_harvest(store: &mut ContactStore, chat_id: &str, harvest: ChatHarvest) -> usize {
    let mut merged = 0;

    for entry in harvest.roster {
        store.note_participant(chat_id, &entry.participant_id);
        let outcome = store.merge(
            Observation::new(entry.participant_id, ContactSource::RosterScan)
                .with_display_name(entry.display_name)
                .with_group(chat_id),
        );
        merged += usize::from(!outcome.ignored);
    }

    for message in harvest.messages {
        let Some(sender) = message.sender() else {
            log::debug!("Skipping message without sender in {chat_id}");
            continue;
        };
        let mut observation = Observation::new(sender, ContactSource::MessageEvent)
            .with_display_name(message.display_name().map(str::to_string))
            .with_chat(chat_id);
        if let Some(at) = message.timestamp {
            observation = observation.seen_at(at);
        }
        let outcome = store.merge(observation);
        merged += usize::from(!outcome.ignored);
    }

    merged
}
