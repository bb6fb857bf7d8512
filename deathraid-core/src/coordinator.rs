//! The raid-window state machine.
//!
//! A party is implicitly in one of three states:
//!
//! - below threshold: no window and fewer deaths than the threshold,
//! - raidable: a window is open and protection is disabled,
//! - cooling down: the window expired but the count is still at or above the threshold, so the
//!   next recorded death opens a new window. Only [`DeathRaidCoordinator::force_reset_party`]
//!   brings a party back below the threshold.
//!
//! Every check-then-act sequence for a party runs under that party's lock. Protection is always
//! restored before a window record is removed, so a failed or interrupted restore leaves the
//! window visible to the next sweep.
//!
//! Shutdown saves windows while they are still open and only then restores protection. A restart
//! therefore re-disables protection for windows that have not expired yet. This is deliberate: a
//! window saved at shutdown is recovered with its remaining time, not as already expired.
//!
//! Once shutdown begins, deaths are still counted but no new window is opened. Saving is refused
//! after a failed load so a partial in-memory view never replaces the stored one.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use deathraid_database::impls::raid_config::{load_configuration, save_configuration};
use deathraid_database::model::raid_window::RaidWindow;
use deathraid_database::{Database, PartyId};
use deathraid_utils::formatting::{deaths_until_raid, format_compact_duration};

use crate::announcement::Announcement;
use crate::error::RaidError;
use crate::gateway::ProtectionGateway;
use crate::ledger::PartyDeathLedger;
use crate::locks::PartyLocks;
use crate::registry::RaidWindowRegistry;
use crate::settings::Settings;

/// Result of a single death notification.
#[derive(Debug)]
pub struct DeathOutcome {
    pub party: PartyId,
    pub count: u64,
    /// The window opened by this death, if any.
    pub opened: Option<RaidWindow>,
    pub announcements: Vec<Announcement>,
    /// Set when the window opened but the claims system refused the disable; retried by the
    /// next sweep.
    pub gateway_error: Option<RaidError>,
}

/// Result of an expiration sweep or a shutdown restore pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub closed: Vec<RaidWindow>,
    /// Parties whose pending disable went through on this pass.
    pub reconciled: Vec<PartyId>,
    pub failed: Vec<(PartyId, RaidError)>,
    pub announcements: Vec<Announcement>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.reconciled.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct ResetOutcome {
    pub party: PartyId,
    pub previous_count: u64,
    pub closed: Option<RaidWindow>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub death_records: usize,
    pub raid_windows: usize,
    /// Windows that expired while the process was down; the next sweep closes them.
    pub expired_windows: usize,
}

/// Application context for death tracking and raid windows.
///
/// Built once at startup and shared (behind an `Arc`) with the scheduler and the event
/// ingestion path.
#[derive(Debug)]
pub struct DeathRaidCoordinator<G> {
    db: Database,
    gateway: G,
    settings: Settings,
    ledger: PartyDeathLedger,
    registry: RaidWindowRegistry,
    locks: PartyLocks,
    /// Held for reading while a window opens; shutdown takes it for writing.
    closing: RwLock<bool>,
    load_failed: AtomicBool,
}

impl<G: ProtectionGateway> DeathRaidCoordinator<G> {
    pub fn new(db: Database, gateway: G, settings: Settings) -> Self {
        Self {
            db,
            gateway,
            settings,
            ledger: PartyDeathLedger::new(),
            registry: RaidWindowRegistry::new(),
            locks: PartyLocks::default(),
            closing: RwLock::new(false),
            load_failed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ledger(&self) -> &PartyDeathLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &RaidWindowRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Load configuration, death records and raid windows from persistence.
    ///
    /// Until a load succeeds after a failed one, [`Self::flush`] refuses to write.
    pub async fn load(&self, now: u64) -> Result<LoadSummary, RaidError> {
        let summary = self.load_snapshots(now).await;
        self.load_failed.store(summary.is_err(), Ordering::SeqCst);
        summary
    }

    async fn load_snapshots(&self, now: u64) -> Result<LoadSummary, RaidError> {
        let config = load_configuration(&self.db)
            .await
            .map_err(RaidError::persistence)?;
        self.settings.replace(config);

        let death_records = self.ledger.load_all(&self.db).await?;
        let raid_windows = self.registry.load_all(&self.db).await?;
        let expired_windows = self.registry.list_expired(now).count();

        Ok(LoadSummary {
            death_records,
            raid_windows,
            expired_windows,
        })
    }

    /// Count a death for `party` and open a raid window if it reached the threshold.
    pub async fn on_death(&self, party: &PartyId, now: u64) -> DeathOutcome {
        let _guard = self.locks.lock(party).await;

        let count = self.ledger.record_death(party, now);
        let config = self.settings.snapshot();
        let threshold = u64::from(config.death_threshold);

        let mut outcome = DeathOutcome {
            party: party.clone(),
            count,
            opened: None,
            announcements: Vec::new(),
            gateway_error: None,
        };

        if config.party_announcement_enabled
            && count % u64::from(config.announcement_interval_deaths) == 0
        {
            outcome.announcements.push(Announcement::PartyDeaths {
                party: party.clone(),
                count,
                remaining: deaths_until_raid(count, config.death_threshold),
            });
        }

        if count < threshold || self.registry.is_active(party) {
            return outcome;
        }

        let closing = self.closing.read().await;
        if *closing {
            debug!(party = %party, count, "shutting down; raid window not opened");
            return outcome;
        }

        let duration_secs = config.raid_duration_secs();
        let window = match self.registry.open(party, now, duration_secs) {
            Ok(window) => window,
            Err(source) => {
                debug!(%source, party = %party, "raid window open skipped");
                return outcome;
            }
        };

        match self.gateway.disable(party).await {
            Ok(()) => {
                self.registry.confirm_disabled(party);
                info!(
                    party = %party,
                    count,
                    threshold,
                    duration = %format_compact_duration(duration_secs),
                    "raid window opened"
                );
            }
            Err(source) => {
                warn!(
                    %source,
                    party = %party,
                    "raid window opened but protection could not be disabled; retrying on next sweep"
                );
                outcome.gateway_error = Some(source);
            }
        }

        if config.broadcast_alerts_enabled {
            outcome.announcements.push(Announcement::RaidOpened {
                party: party.clone(),
                expires_at: window.expires_at,
                duration_secs,
            });
        }

        outcome.opened = Some(window);
        outcome
    }

    /// Retry disables that failed earlier or were loaded from persistence.
    pub async fn reconcile_protections(&self, now: u64) -> SweepReport {
        let mut report = SweepReport::default();

        for party in self.registry.unconfirmed(now) {
            let _guard = self.locks.lock(&party).await;
            if !self.registry.is_active(&party) {
                continue;
            }

            let result = match self.gateway.is_protected(&party).await {
                Ok(false) => Ok(()),
                Ok(true) => self.gateway.disable(&party).await,
                Err(source) => Err(source),
            };

            match result {
                Ok(()) => {
                    self.registry.confirm_disabled(&party);
                    debug!(party = %party, "raid window protection confirmed disabled");
                    report.reconciled.push(party);
                }
                Err(source) => {
                    warn!(%source, party = %party, "failed to disable protection for open raid window");
                    report.failed.push((party, source));
                }
            }
        }

        report
    }

    /// Restore protection for every window expired at `now`, then close it.
    pub async fn sweep_expirations(&self, now: u64) -> SweepReport {
        let mut report = self.reconcile_protections(now).await;
        let broadcast = self.settings.broadcast_alerts_enabled();

        for expired in self.registry.list_expired(now) {
            let party = expired.party;
            let _guard = self.locks.lock(&party).await;

            // A reset may have closed or replaced the window while this sweep waited.
            let Some(window) = self.registry.active(&party) else {
                continue;
            };
            if !window.is_expired(now) {
                continue;
            }

            match self.gateway.restore(&party).await {
                Ok(()) => {
                    if let Some(closed) = self.registry.close(&party) {
                        info!(
                            party = %party,
                            overrun = %format_compact_duration(now.saturating_sub(closed.expires_at)),
                            "raid window expired; protection restored"
                        );
                        if broadcast {
                            report.announcements.push(Announcement::RaidEnded {
                                party: party.clone(),
                            });
                        }
                        report.closed.push(closed);
                    }
                }
                Err(source) => {
                    warn!(%source, party = %party, "failed to restore protection; retrying on next sweep");
                    report.failed.push((party, source));
                }
            }
        }

        report
    }

    /// Zero the party's deaths and close any open window regardless of expiry.
    ///
    /// The count is reset even when the restore fails; the window then stays open until it
    /// expires or the reset is retried.
    pub async fn force_reset_party(&self, party: &PartyId) -> Result<ResetOutcome, RaidError> {
        let _guard = self.locks.lock(party).await;

        let previous_count = self.ledger.reset(party);
        let closed = match self.registry.active(party) {
            Some(_) => {
                self.gateway.restore(party).await.inspect_err(|source| {
                    warn!(%source, party = %party, "reset could not restore protection");
                })?;
                self.registry.close(party)
            }
            None => None,
        };

        info!(
            party = %party,
            previous_count,
            closed_window = closed.is_some(),
            "party deaths reset"
        );

        Ok(ResetOutcome {
            party: party.clone(),
            previous_count,
            closed,
        })
    }

    /// Restore protection for every open window and close it. Used on shutdown.
    pub async fn restore_all_protections(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for window in self.registry.active_windows() {
            let party = window.party;
            let _guard = self.locks.lock(&party).await;

            match self.gateway.restore(&party).await {
                Ok(()) => {
                    if let Some(closed) = self.registry.close(&party) {
                        report.closed.push(closed);
                    }
                }
                Err(source) => {
                    error!(%source, party = %party, "failed to restore protection on shutdown");
                    report.failed.push((party, source));
                }
            }
        }

        report
    }

    /// Persist death records, raid windows and configuration.
    ///
    /// Each snapshot is attempted even if an earlier one fails; the first error is returned.
    pub async fn flush(&self) -> Result<(), RaidError> {
        if self.load_failed.load(Ordering::SeqCst) {
            return Err(RaidError::NotLoaded);
        }

        let ledger = self.ledger.save_all(&self.db).await;
        let registry = self.registry.save_all(&self.db).await;
        let config = save_configuration(&self.db, &self.settings.snapshot())
            .await
            .map_err(RaidError::persistence);

        match (&ledger, &registry) {
            (Ok(records), Ok(windows)) => {
                debug!(records, windows, "death raid data saved");
            }
            _ => {
                if let Err(source) = &ledger {
                    error!(%source, "failed to save death records");
                }
                if let Err(source) = &registry {
                    error!(%source, "failed to save raid windows");
                }
            }
        }
        if let Err(source) = &config {
            error!(%source, "failed to save raid configuration");
        }

        ledger.and(registry).and(config)
    }

    /// Orderly drain: persist everything, then restore every open window's protection.
    ///
    /// Windows are saved before they are closed, so a restart picks them back up and
    /// re-disables the ones that have not expired.
    pub async fn shutdown(&self) -> SweepReport {
        // Waits for any window that is mid-open to finish, so the save below includes it.
        *self.closing.write().await = true;

        if let Err(source) = self.flush().await {
            error!(%source, "final save failed");
        }

        let report = self.restore_all_protections().await;
        info!(
            restored = report.closed.len(),
            failed = report.failed.len(),
            "raid protections restored for shutdown"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use deathraid_database::impls::raid_windows::{load_raid_windows, save_raid_windows};
    use deathraid_database::model::raid_config::RaidConfig;
    use deathraid_database::model::raid_window::RaidWindow;
    use deathraid_database::store::MemoryStore;
    use deathraid_database::{Database, PartyId};

    use super::DeathRaidCoordinator;
    use crate::announcement::Announcement;
    use crate::error::RaidError;
    use crate::settings::Settings;
    use crate::testing::RecordingGateway;

    const MINUTE: u64 = 60;
    const T0: u64 = 1_700_000_000;

    fn coordinator(threshold: u32, duration_minutes: u32) -> DeathRaidCoordinator<RecordingGateway> {
        coordinator_with_store(MemoryStore::new(), threshold, duration_minutes)
    }

    fn coordinator_with_store(
        store: MemoryStore,
        threshold: u32,
        duration_minutes: u32,
    ) -> DeathRaidCoordinator<RecordingGateway> {
        let settings = Settings::new(RaidConfig {
            death_threshold: threshold,
            raid_duration_minutes: duration_minutes,
            ..RaidConfig::default()
        });
        DeathRaidCoordinator::new(Database::memory(store), RecordingGateway::default(), settings)
    }

    #[tokio::test]
    async fn threshold_scenario_opens_and_expires_once() {
        let raid = coordinator(3, 30);
        let party = PartyId::new("alpha");

        assert!(raid.on_death(&party, T0).await.opened.is_none());
        assert!(raid.on_death(&party, T0 + 1).await.opened.is_none());
        let third = raid.on_death(&party, T0 + 2).await;

        assert_eq!(third.count, 3);
        let window = third.opened.unwrap();
        assert_eq!(window.expires_at - window.opened_at, 30 * MINUTE);
        assert_eq!(raid.gateway().disable_calls(&party), 1);
        assert!(raid.registry().is_active(&party));
        assert!(raid.gateway().is_disabled(&party));

        let report = raid.sweep_expirations(T0 + 31 * MINUTE).await;
        assert_eq!(report.closed.len(), 1);
        assert_eq!(raid.gateway().restore_calls(&party), 1);
        assert!(!raid.registry().is_active(&party));
        assert!(!raid.gateway().is_disabled(&party));
        assert_eq!(raid.ledger().count(&party), 3);
    }

    #[tokio::test]
    async fn re_crossing_the_threshold_keeps_one_window() {
        let raid = coordinator(2, 30);
        let party = PartyId::new("alpha");

        for offset in 0..10 {
            raid.on_death(&party, T0 + offset).await;
        }

        assert_eq!(raid.ledger().count(&party), 10);
        assert_eq!(raid.registry().active_windows().len(), 1);
        assert_eq!(raid.gateway().disable_calls(&party), 1);
    }

    #[tokio::test]
    async fn sweep_before_expiry_is_a_no_op_and_repeat_is_idempotent() {
        let raid = coordinator(1, 30);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;

        assert!(raid.sweep_expirations(T0 + 30 * MINUTE - 1).await.is_empty());
        assert!(raid.registry().is_active(&party));

        assert_eq!(raid.sweep_expirations(T0 + 30 * MINUTE).await.closed.len(), 1);
        assert!(raid.sweep_expirations(T0 + 30 * MINUTE).await.is_empty());
        assert_eq!(raid.gateway().restore_calls(&party), 1);
    }

    #[tokio::test]
    async fn cooling_down_party_reopens_on_next_death() {
        let raid = coordinator(2, 10);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;
        raid.on_death(&party, T0).await;
        raid.sweep_expirations(T0 + 10 * MINUTE).await;

        let outcome = raid.on_death(&party, T0 + 11 * MINUTE).await;

        assert_eq!(outcome.count, 3);
        assert!(outcome.opened.is_some());
        assert_eq!(raid.gateway().disable_calls(&party), 2);
    }

    #[tokio::test]
    async fn force_reset_closes_active_window_early() {
        let raid = coordinator(2, 30);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;
        raid.on_death(&party, T0).await;

        let outcome = raid.force_reset_party(&party).await.unwrap();

        assert_eq!(outcome.previous_count, 2);
        assert!(outcome.closed.is_some());
        assert_eq!(raid.ledger().count(&party), 0);
        assert!(!raid.registry().is_active(&party));
        assert!(!raid.gateway().is_disabled(&party));

        // Back below threshold: one more death does not reopen.
        assert!(raid.on_death(&party, T0 + 1).await.opened.is_none());
    }

    #[tokio::test]
    async fn force_reset_without_window_only_clears_count() {
        let raid = coordinator(5, 30);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;

        let outcome = raid.force_reset_party(&party).await.unwrap();

        assert_eq!(outcome.previous_count, 1);
        assert!(outcome.closed.is_none());
        assert_eq!(raid.gateway().restore_calls(&party), 0);
    }

    #[tokio::test]
    async fn failed_restore_keeps_window_for_next_sweep() {
        let raid = coordinator(1, 30);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;

        raid.gateway().set_failing(true);
        let report = raid.sweep_expirations(T0 + 31 * MINUTE).await;
        assert!(report.closed.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(raid.registry().is_active(&party));

        raid.gateway().set_failing(false);
        let report = raid.sweep_expirations(T0 + 32 * MINUTE).await;
        assert_eq!(report.closed.len(), 1);
        assert!(!raid.registry().is_active(&party));
        assert!(!raid.gateway().is_disabled(&party));
    }

    #[tokio::test]
    async fn failed_disable_is_retried_by_sweep() {
        let raid = coordinator(1, 30);
        let party = PartyId::new("alpha");

        raid.gateway().set_failing(true);
        let outcome = raid.on_death(&party, T0).await;
        assert!(outcome.opened.is_some());
        assert!(outcome.gateway_error.is_some());
        assert!(!raid.gateway().is_disabled(&party));

        raid.gateway().set_failing(false);
        let report = raid.sweep_expirations(T0 + MINUTE).await;
        assert_eq!(report.reconciled, vec![party.clone()]);
        assert!(raid.gateway().is_disabled(&party));
        assert!(raid.registry().is_active(&party));
    }

    #[tokio::test]
    async fn announcements_follow_configuration() {
        let raid = coordinator(4, 30);
        raid.settings().set_announcement_interval_deaths(2);
        let party = PartyId::new("alpha");

        assert!(raid.on_death(&party, T0).await.announcements.is_empty());
        let second = raid.on_death(&party, T0).await;
        assert_eq!(
            second.announcements,
            vec![Announcement::PartyDeaths {
                party: party.clone(),
                count: 2,
                remaining: 2,
            }]
        );

        raid.on_death(&party, T0).await;
        let fourth = raid.on_death(&party, T0).await;
        assert_eq!(fourth.announcements.len(), 2);
        assert!(fourth.announcements.iter().any(Announcement::is_broadcast));

        raid.settings().set_broadcast_alerts_enabled(false);
        let report = raid.sweep_expirations(T0 + 30 * MINUTE).await;
        assert_eq!(report.closed.len(), 1);
        assert!(report.announcements.is_empty());
    }

    #[tokio::test]
    async fn duration_change_does_not_alter_open_window() {
        let raid = coordinator(1, 30);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;

        raid.settings().set_raid_duration_minutes(5);

        let window = raid.registry().active(&party).unwrap();
        assert_eq!(window.expires_at, T0 + 30 * MINUTE);
        assert!(raid.sweep_expirations(T0 + 6 * MINUTE).await.closed.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deaths_lose_no_counts_and_open_once() {
        let raid = Arc::new(coordinator(10, 30));
        let alpha = PartyId::new("alpha");
        let bravo = PartyId::new("bravo");

        let mut handles = Vec::new();
        for i in 0..200_u64 {
            let raid = Arc::clone(&raid);
            let party = if i % 2 == 0 { alpha.clone() } else { bravo.clone() };
            handles.push(tokio::spawn(async move {
                raid.on_death(&party, T0 + i).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(raid.ledger().count(&alpha), 100);
        assert_eq!(raid.ledger().count(&bravo), 100);
        assert_eq!(raid.gateway().disable_calls(&alpha), 1);
        assert_eq!(raid.gateway().disable_calls(&bravo), 1);
        assert_eq!(raid.registry().active_windows().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sweep_racing_deaths_keeps_protection_consistent() {
        let raid = Arc::new(coordinator(1, 1));
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;

        let sweeper = {
            let raid = Arc::clone(&raid);
            tokio::spawn(async move {
                for tick in 0..20 {
                    raid.sweep_expirations(T0 + MINUTE + tick).await;
                }
            })
        };
        let mut deaths = Vec::new();
        for i in 0..20 {
            let raid = Arc::clone(&raid);
            let party = party.clone();
            deaths.push(tokio::spawn(async move {
                raid.on_death(&party, T0 + MINUTE + i).await;
            }));
        }
        sweeper.await.unwrap();
        for death in deaths {
            death.await.unwrap();
        }

        assert_eq!(raid.ledger().count(&party), 21);
        assert_eq!(
            raid.registry().is_active(&party),
            raid.gateway().is_disabled(&party)
        );
    }

    #[tokio::test]
    async fn flush_then_load_round_trips_state() {
        let store = MemoryStore::new();
        let raid = coordinator_with_store(store.clone(), 2, 30);
        let alpha = PartyId::new("alpha");
        raid.on_death(&alpha, T0).await;
        raid.on_death(&alpha, T0 + 1).await;
        raid.on_death(&PartyId::new("bravo"), T0 + 2).await;
        raid.flush().await.unwrap();

        let restarted = coordinator_with_store(store, 99, 99);
        let summary = restarted.load(T0 + 3).await.unwrap();

        assert_eq!(summary.death_records, 2);
        assert_eq!(summary.raid_windows, 1);
        assert_eq!(summary.expired_windows, 0);
        assert_eq!(restarted.ledger().snapshot(), raid.ledger().snapshot());
        assert_eq!(restarted.registry().active_windows(), raid.registry().active_windows());
        assert_eq!(restarted.settings().death_threshold(), 2);
    }

    #[tokio::test]
    async fn window_expired_while_down_is_restored_by_first_sweep() {
        let store = MemoryStore::new();
        let db = Database::memory(store.clone());
        let party = PartyId::new("alpha");
        save_raid_windows(&db, &[RaidWindow::open(party.clone(), T0, 30 * MINUTE)])
            .await
            .unwrap();

        let raid = coordinator_with_store(store, 3, 30);
        let summary = raid.load(T0 + 2 * 60 * MINUTE).await.unwrap();
        assert_eq!(summary.expired_windows, 1);

        let expired: Vec<_> = raid.registry().list_expired(T0 + 2 * 60 * MINUTE).collect();
        assert_eq!(expired.len(), 1);

        let report = raid.sweep_expirations(T0 + 2 * 60 * MINUTE).await;
        assert_eq!(report.closed.len(), 1);
        assert_eq!(raid.gateway().restore_calls(&party), 1);
        assert!(!raid.registry().is_active(&party));
    }

    #[tokio::test]
    async fn shutdown_saves_then_restores_and_restart_redisables() {
        let store = MemoryStore::new();
        let raid = coordinator_with_store(store.clone(), 1, 30);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;

        let report = raid.shutdown().await;
        assert_eq!(report.closed.len(), 1);
        assert!(!raid.gateway().is_disabled(&party));
        assert!(!raid.registry().is_active(&party));

        let restarted = coordinator_with_store(store, 1, 30);
        restarted.load(T0 + MINUTE).await.unwrap();
        assert!(restarted.registry().is_active(&party));

        let report = restarted.reconcile_protections(T0 + MINUTE).await;
        assert_eq!(report.reconciled, vec![party.clone()]);
        assert!(restarted.gateway().is_disabled(&party));
    }

    #[tokio::test]
    async fn reconcile_skips_disable_when_already_disabled() {
        let raid = coordinator(1, 30);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;
        raid.registry().close(&party);
        raid.registry().open(&party, T0, 30 * MINUTE).unwrap();

        let report = raid.reconcile_protections(T0 + 1).await;

        assert_eq!(report.reconciled, vec![party.clone()]);
        assert_eq!(raid.gateway().disable_calls(&party), 1);

        raid.gateway().forget(&party);
        raid.registry().close(&party);
        raid.registry().open(&party, T0, 30 * MINUTE).unwrap();
        raid.reconcile_protections(T0 + 1).await;
        assert_eq!(raid.gateway().disable_calls(&party), 2);
    }

    #[tokio::test]
    async fn persistence_failure_is_reported_but_state_kept() {
        let store = MemoryStore::new();
        let raid = coordinator_with_store(store.clone(), 1, 30);
        let party = PartyId::new("alpha");
        raid.on_death(&party, T0).await;

        store.set_unavailable(true);
        assert!(raid.flush().await.is_err());
        assert_eq!(raid.ledger().count(&party), 1);
        assert!(raid.registry().is_active(&party));
    }

    #[tokio::test]
    async fn death_after_shutdown_is_counted_without_opening_a_window() {
        let raid = coordinator(1, 30);
        let party = PartyId::new("alpha");
        raid.shutdown().await;

        let outcome = raid.on_death(&party, T0).await;

        assert_eq!(outcome.count, 1);
        assert!(outcome.opened.is_none());
        assert!(!raid.registry().is_active(&party));
        assert!(!raid.gateway().is_disabled(&party));
        assert_eq!(raid.gateway().disable_calls(&party), 0);
        assert!(load_raid_windows(raid.database()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn deaths_racing_shutdown_leave_no_party_unprotected() {
        let store = MemoryStore::new();
        let raid = Arc::new(coordinator_with_store(store.clone(), 1, 30));
        let parties: Vec<PartyId> = (0..50).map(|i| PartyId::new(format!("party-{i}"))).collect();

        let mut deaths = Vec::new();
        for (i, party) in parties.iter().cloned().enumerate() {
            let raid = Arc::clone(&raid);
            deaths.push(tokio::spawn(async move {
                raid.on_death(&party, T0 + i as u64).await;
            }));
        }
        let shutdown = {
            let raid = Arc::clone(&raid);
            tokio::spawn(async move { raid.shutdown().await })
        };
        for death in deaths {
            death.await.unwrap();
        }
        shutdown.await.unwrap();

        for party in &parties {
            assert_eq!(raid.ledger().count(party), 1);
            assert!(!raid.gateway().is_disabled(party));
            assert!(!raid.registry().is_active(party));
        }

        // Every window that was opened is saved, so a restart can put it back.
        let persisted = load_raid_windows(&Database::memory(store)).await.unwrap();
        let opened = parties
            .iter()
            .filter(|party| raid.gateway().disable_calls(party) > 0)
            .count();
        assert_eq!(persisted.len(), opened);
    }

    #[tokio::test]
    async fn failed_load_blocks_saves_until_a_load_succeeds() {
        let store = MemoryStore::new();
        let db = Database::memory(store.clone());
        let party = PartyId::new("alpha");
        save_raid_windows(&db, &[RaidWindow::open(party.clone(), T0, 30 * MINUTE)])
            .await
            .unwrap();

        let raid = coordinator_with_store(store.clone(), 1, 30);
        store.set_unavailable(true);
        assert!(raid.load(T0).await.is_err());
        store.set_unavailable(false);

        assert!(matches!(raid.flush().await, Err(RaidError::NotLoaded)));
        raid.shutdown().await;
        assert_eq!(load_raid_windows(&db).await.unwrap().len(), 1);

        let raid = coordinator_with_store(store, 1, 30);
        raid.load(T0).await.unwrap();
        raid.flush().await.unwrap();
        assert_eq!(load_raid_windows(&db).await.unwrap().len(), 1);
    }
}
