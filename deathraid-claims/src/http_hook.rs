use std::env;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use deathraid_database::PartyId;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize, Deserialize)]
struct ProtectionState {
    disabled: bool,
}

/// Client for a claims service exposing per-party protection over HTTP.
///
/// - `GET  {base}/health`
/// - `GET  {base}/parties/{party}/protection` → `{"disabled": bool}`
/// - `PUT  {base}/parties/{party}/protection` with `{"disabled": bool}`
#[derive(Clone, Debug)]
pub struct HttpClaimsHook {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpClaimsHook {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid claims url `{base_url}`"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("claims url `{base_url}` cannot carry a path");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build claims http client: {e}"))?;

        Ok(Self { client, base_url })
    }

    /// Build from `CLAIMS_URL` / `CLAIMS_TIMEOUT_SECONDS`, or `None` when no URL is configured.
    pub fn from_env_optional() -> anyhow::Result<Option<Self>> {
        let base_url = env::var("CLAIMS_URL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let Some(base_url) = base_url else {
            return Ok(None);
        };

        let timeout_secs = env::var("CLAIMS_TIMEOUT_SECONDS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Some(Self::new(&base_url, Duration::from_secs(timeout_secs))?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn protection_url(&self, party: &PartyId) -> Url {
        self.endpoint(&["parties", party.as_str(), "protection"])
    }

    pub async fn health(&self) -> bool {
        match self
            .client
            .get(self.endpoint(&["health"]))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(source) => {
                debug!(%source, "claims health check failed");
                false
            }
        }
    }

    pub async fn set_disabled(&self, party: &PartyId, disabled: bool) -> anyhow::Result<()> {
        self.client
            .put(self.protection_url(party))
            .json(&ProtectionState { disabled })
            .send()
            .await
            .with_context(|| format!("claims PUT failed for party `{party}`"))?
            .error_for_status()
            .with_context(|| format!("claims rejected protection change for party `{party}`"))?;

        Ok(())
    }

    pub async fn is_disabled(&self, party: &PartyId) -> anyhow::Result<bool> {
        let state: ProtectionState = self
            .client
            .get(self.protection_url(party))
            .send()
            .await
            .with_context(|| format!("claims GET failed for party `{party}`"))?
            .error_for_status()
            .with_context(|| format!("claims lookup rejected for party `{party}`"))?
            .json()
            .await
            .with_context(|| format!("invalid claims response for party `{party}`"))?;

        Ok(state.disabled)
    }
}
