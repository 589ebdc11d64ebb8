//! Check-in service: the entry point the transport layer calls for every
//! signature-verified liveness report.

use std::sync::Arc;

use tracing::Instrument;

use keeper_store::UptimeCache;
use keeper_types::{CheckIn, CheckInResponse, KeeperAddress};

use crate::config::{EngineConfig, NetworkConfig};
use crate::registry::{AppliedCheckIn, KeeperRegistry};
use crate::tracing_spans::check_in_span;
use crate::version::{build_response, PayloadSealer, VersionTable};
use crate::EngineError;

pub struct CheckInService {
    registry: Arc<KeeperRegistry>,
    cache: Arc<dyn UptimeCache>,
    versions: VersionTable,
    network: NetworkConfig,
    sealer: Arc<dyn PayloadSealer>,
    inactivity_threshold_secs: u64,
}

impl CheckInService {
    pub fn new(
        registry: Arc<KeeperRegistry>,
        cache: Arc<dyn UptimeCache>,
        versions: VersionTable,
        network: NetworkConfig,
        sealer: Arc<dyn PayloadSealer>,
        inactivity_threshold_secs: u64,
    ) -> Self {
        Self {
            registry,
            cache,
            versions,
            network,
            sealer,
            inactivity_threshold_secs,
        }
    }

    pub fn from_config(
        registry: Arc<KeeperRegistry>,
        cache: Arc<dyn UptimeCache>,
        sealer: Arc<dyn PayloadSealer>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            registry,
            cache,
            VersionTable::from_config(config),
            config.network.clone(),
            sealer,
            config.inactivity_threshold_secs,
        )
    }

    /// Accept a check-in, credit uptime and build the keeper's response.
    ///
    /// Returns `Err` only for client errors (unknown keeper, malformed
    /// address) and payload sealing failures. A failed write-through still
    /// yields an accepted response since liveness has already advanced.
    pub async fn handle(&self, check_in: &CheckIn) -> Result<CheckInResponse, EngineError> {
        let address = KeeperAddress::parse(&check_in.keeper_address)?;
        let span = check_in_span(address.as_ref(), &check_in.version);
        self.handle_inner(address, check_in).instrument(span).await
    }

    async fn handle_inner(
        &self,
        address: KeeperAddress,
        check_in: &CheckIn,
    ) -> Result<CheckInResponse, EngineError> {
        let applied = self.registry.apply_check_in(check_in).await?;

        if let Err(e) = self.registry.persist_status(&applied.record).await {
            tracing::warn!(
                keeper = %address,
                error = %e,
                "check-in accepted without durable write"
            );
        }

        self.credit_uptime(&applied).await;

        build_response(
            &self.versions,
            &applied.record,
            check_in,
            &self.network,
            self.sealer.as_ref(),
        )
    }

    /// Credit the time since the previous check-in if the keeper stayed
    /// active across it.
    async fn credit_uptime(&self, applied: &AppliedCheckIn) {
        if !applied.was_active {
            return;
        }
        let (Some(before), Some(now)) = (applied.previous_check_in, applied.record.last_checked_in)
        else {
            return;
        };
        let elapsed = (now - before).num_seconds();
        if elapsed <= 0 || elapsed as u64 > self.inactivity_threshold_secs {
            return;
        }

        if let Err(e) = self
            .cache
            .increment_daily_uptime(&applied.record.address, elapsed as u64)
            .await
        {
            tracing::warn!(seconds = elapsed, error = %e, "failed to credit daily uptime");
        }
    }
}
