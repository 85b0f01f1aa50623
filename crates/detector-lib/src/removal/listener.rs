//! Removal feed listener task

use super::RemovalLedger;
use crate::models::FlowRemoved;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Drain the removal feed into the ledger until the feed closes or shutdown
/// is signalled.
///
/// The feed is a broadcast channel, so subscribing here never takes events
/// away from other consumers. A lagged receiver has lost notifications for
/// good; the gap is logged and the affected flows surface later through the
/// residual check or the stale-counter gauge.
pub async fn run_removal_listener(
    ledger: Arc<RemovalLedger>,
    mut feed: broadcast::Receiver<FlowRemoved>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("Starting flow removal listener");

    loop {
        tokio::select! {
            event = feed.recv() => {
                match event {
                    Ok(removed) => {
                        debug!(
                            cookie = %removed.cookie,
                            packet_count = removed.packet_count,
                            "Flow removed"
                        );
                        ledger.record(removed);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Removal feed lagged, notifications lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Removal feed closed");
                        break;
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("Shutting down flow removal listener");
                break;
            }
        }
    }
}
