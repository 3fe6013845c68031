//! Settlement adapter: where fulfilment statuses come from.
//!
//! The handler asks the adapter for the next status after the last one it
//! persisted, signs and appends it, and repeats until a terminal status.
//! The adapter only reports progress; ordering and persistence stay in the
//! handler, so a real payment rail can replace [`SimulatedSettlement`]
//! without touching the sequencing contract.

use std::time::Duration;

use async_trait::async_trait;
use pfi_types::{ExchangeId, FulfillmentStatus, Result};

/// Source of fulfilment progress for ordered exchanges.
#[async_trait]
pub trait SettlementAdapter: Send + Sync {
    /// Status following `last` (`None` right after the order).
    ///
    /// Must return a status `last` can advance to.
    async fn advance(
        &self,
        exchange_id: ExchangeId,
        last: Option<FulfillmentStatus>,
    ) -> Result<FulfillmentStatus>;
}

/// Deterministic `IN_PROGRESS → TRANSFERRING_FUNDS → SUCCESS`, no funds move.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSettlement {
    step_delay: Duration,
}

impl SimulatedSettlement {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause before reporting each status.
    #[must_use]
    pub fn with_step_delay(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

#[async_trait]
impl SettlementAdapter for SimulatedSettlement {
    async fn advance(
        &self,
        exchange_id: ExchangeId,
        last: Option<FulfillmentStatus>,
    ) -> Result<FulfillmentStatus> {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
        let next = match last {
            None => FulfillmentStatus::InProgress,
            Some(FulfillmentStatus::InProgress) => FulfillmentStatus::TransferringFunds,
            Some(FulfillmentStatus::TransferringFunds) => FulfillmentStatus::Success,
            Some(terminal) => terminal,
        };
        tracing::debug!(exchange_id = %exchange_id, status = %next, "simulated settlement step");
        Ok(next)
    }
}
