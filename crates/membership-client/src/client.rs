//! Roster source HTTP client.

use crate::error::MembershipError;
use crate::types::*;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Client for the external membership roster source.
#[derive(Clone, Debug)]
pub struct MembershipClient {
    client: Client,
    base_url: String,
}

impl MembershipClient {
    /// Create a new membership client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MembershipError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL of the roster source.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the roster source is reachable.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Fetch the current roster for a network.
    #[instrument(skip(self))]
    pub async fn fetch_members(&self, network: u16) -> Result<RosterResponse, MembershipError> {
        let response = self
            .client
            .get(format!("{}/v1/networks/{}/members", self.base_url, network))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let msg = response.text().await.unwrap_or_default();
            warn!("Roster request failed: {} - {}", status, msg);
            return Err(MembershipError::Api(format!("HTTP {}: {}", status, msg)));
        }

        let roster: RosterResponse = response.json().await?;

        if roster.network != network {
            return Err(MembershipError::InvalidRoster(format!(
                "requested network {} but source returned {}",
                network, roster.network
            )));
        }

        debug!("Fetched {} members for network {}", roster.members.len(), network);
        Ok(roster)
    }
}
