use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use deathraid_core::{DeathRaidCoordinator, ProtectionGateway};
use deathraid_database::PartyId;
use deathraid_utils::formatting::normalize_party_token;
use deathraid_utils::time::now_unix_secs;

use crate::events::announce;

/// Handle one qualifying death for `party`.
pub async fn handle_party_death<G: ProtectionGateway>(
    coordinator: &DeathRaidCoordinator<G>,
    party: &PartyId,
) {
    let outcome = coordinator.on_death(party, now_unix_secs()).await;
    debug!(party = %party, count = outcome.count, "death recorded");

    if let Some(source) = &outcome.gateway_error {
        warn!(%source, party = %party, "raid window pending claims confirmation");
    }

    announce::publish(&outcome.announcements);
}

/// Parse a host line of the form `death <party>`.
pub fn parse_death_line(line: &str) -> Option<PartyId> {
    let rest = line.trim().strip_prefix("death")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    normalize_party_token(rest).map(PartyId::from)
}

/// Read death notifications from stdin until it closes or `shutdown` fires.
pub async fn ingest_stdin<G>(
    coordinator: Arc<DeathRaidCoordinator<G>>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    G: ProtectionGateway + 'static,
{
    ingest_lines(BufReader::new(tokio::io::stdin()), coordinator, shutdown).await
}

/// Each event is handled on its own task, as the host delivers them from several sources at
/// once. Returns only after every spawned handler has finished.
pub async fn ingest_lines<R, G>(
    reader: R,
    coordinator: Arc<DeathRaidCoordinator<G>>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    G: ProtectionGateway + 'static,
{
    let mut lines = reader.lines();
    let mut handlers = JoinSet::new();

    let result = loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.changed() => break Ok(()),
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(source) => break Err(source.into()),
        };

        // Reap finished handlers so the set does not grow with the stream.
        while handlers.try_join_next().is_some() {}

        if line.trim().is_empty() {
            continue;
        }

        let Some(party) = parse_death_line(&line) else {
            warn!(line = %line, "ignoring unrecognized host event");
            continue;
        };

        let coordinator = Arc::clone(&coordinator);
        handlers.spawn(async move {
            handle_party_death(&coordinator, &party).await;
        });
    };

    let pending = handlers.len();
    if pending > 0 {
        debug!(pending, "waiting for in-flight death events");
    }
    while let Some(joined) = handlers.join_next().await {
        if let Err(source) = joined {
            error!(?source, "death event handler ended abnormally");
        }
    }

    result
}
