//! Registry service: validates endpoint announcements against the roster
//! and the announcer's signature, then records them.

use crate::error::{RegistryError, ValidationError};
use crate::membership::{MembershipOracle, NetworkId};
use crate::signature::{signing_message, SignatureVerifier};
use crate::store::{EndpointRecord, EndpointStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A signed register or deregister request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRequest {
    pub index: i64,
    pub identity: String,
    pub url: String,
    /// Hex signature over `"{index}-{identity}-{url}"`
    pub signature: String,
}

/// Counts reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub member_count: usize,
    pub endpoint_count: usize,
    pub alive_count: usize,
}

/// Orchestrates the roster, the verifier and the endpoint store.
#[derive(Clone)]
pub struct RegistryService {
    network: NetworkId,
    oracle: Arc<dyn MembershipOracle>,
    verifier: Arc<dyn SignatureVerifier>,
    store: Arc<dyn EndpointStore>,
}

impl RegistryService {
    pub fn new(
        network: NetworkId,
        oracle: Arc<dyn MembershipOracle>,
        verifier: Arc<dyn SignatureVerifier>,
        store: Arc<dyn EndpointStore>,
    ) -> Self {
        Self {
            network,
            oracle,
            verifier,
            store,
        }
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// Check roster membership, then the signature. Returns the validated
    /// index.
    ///
    /// The roster checks are cheap and always run first, so requests that
    /// fail them never reach the verifier.
    async fn validate(&self, request: &EndpointRequest) -> Result<u32, ValidationError> {
        let roster = self.oracle.snapshot(self.network).await;
        let member_count = roster.as_ref().map(|r| r.member_count()).unwrap_or(0);

        let index = u32::try_from(request.index)
            .ok()
            .filter(|index| (*index as usize) < member_count)
            .ok_or(ValidationError::OutOfRange {
                index: request.index,
                member_count,
            })?;

        let member = roster.as_ref().and_then(|r| r.member_at(index));
        if member.map(|m| m.identity.as_str()) != Some(request.identity.as_str()) {
            return Err(ValidationError::IdentityMismatch { index });
        }

        let message = signing_message(request.index, &request.identity, &request.url);
        if !self
            .verifier
            .verify(message.as_bytes(), &request.signature, &request.identity)
        {
            return Err(ValidationError::InvalidSignature);
        }

        Ok(index)
    }

    async fn validate_logged(
        &self,
        request: &EndpointRequest,
        operation: &str,
    ) -> Result<u32, ValidationError> {
        self.validate(request).await.map_err(|e| {
            warn!(
                index = request.index,
                identity = %request.identity,
                operation,
                reason = %e,
                "Endpoint request rejected"
            );
            e
        })
    }

    /// Announce or update the endpoint for a roster member.
    pub async fn register(&self, request: EndpointRequest) -> Result<(), RegistryError> {
        let index = self.validate_logged(&request, "register").await?;

        let EndpointRequest { identity, url, .. } = request;
        let store = self.store.clone();
        let (task_identity, task_url) = (identity.clone(), url.clone());

        // Runs detached so a caller hanging up cannot cancel a write midway
        tokio::spawn(async move { store.upsert(&task_identity, index, &task_url).await }).await??;

        info!(index, identity = %identity, url = %url, "Endpoint registered");
        Ok(())
    }

    /// Mark a member's endpoint as down. Returns whether a record existed.
    pub async fn deregister(&self, request: EndpointRequest) -> Result<bool, RegistryError> {
        let index = self.validate_logged(&request, "deregister").await?;

        let store = self.store.clone();
        let task_identity = request.identity.clone();

        let changed =
            tokio::spawn(async move { store.mark_down(&task_identity).await }).await??;

        if changed {
            info!(index, identity = %request.identity, "Endpoint marked down");
        } else {
            debug!(index, identity = %request.identity, "No endpoint to mark down");
        }
        Ok(changed)
    }

    /// URLs of the alive endpoints among `indices`, in input order.
    /// Unknown and negative indices are skipped.
    pub async fn query_healthy(&self, indices: &[i64]) -> Result<Vec<String>, RegistryError> {
        let mut urls = Vec::new();

        for &index in indices {
            let Ok(index) = u32::try_from(index) else {
                continue;
            };
            if let Some(record) = self.store.get(index).await? {
                if record.alive {
                    urls.push(record.url);
                }
            }
        }

        debug!(requested = indices.len(), healthy = urls.len(), "Healthy endpoint query");
        Ok(urls)
    }

    /// Record currently owning `index`.
    pub async fn endpoint(&self, index: u32) -> Result<Option<EndpointRecord>, RegistryError> {
        Ok(self.store.get(index).await?)
    }

    /// All records, alive or not.
    pub async fn endpoints(&self) -> Result<Vec<EndpointRecord>, RegistryError> {
        Ok(self.store.list().await?)
    }

    pub async fn summary(&self) -> Result<RegistrySummary, RegistryError> {
        let member_count = self
            .oracle
            .snapshot(self.network)
            .await
            .map(|r| r.member_count())
            .unwrap_or(0);
        let records = self.store.list().await?;

        Ok(RegistrySummary {
            member_count,
            endpoint_count: records.len(),
            alive_count: records.iter().filter(|r| r.alive).count(),
        })
    }
}
