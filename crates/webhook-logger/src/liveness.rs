// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Timer behind the periodic liveness notices.
//!
//! The manager re-arms the timer after every send, so a notice only goes out
//! once nothing was sent for a whole interval. Each arming gets a new
//! generation; ticks of an older generation are ignored by the manager.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::manager_service::LogManagerCommand;

pub(crate) struct LivenessTimer {
    pub(crate) interval: Duration,
    pub(crate) generation: u64,
    /// Weak so that the timer alone does not keep the manager running.
    pub(crate) tx: mpsc::WeakUnboundedSender<LogManagerCommand>,
    pub(crate) cancel: CancellationToken,
}

impl LivenessTimer {
    pub(crate) async fn run(self) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = sleep(self.interval) => {}
            }

            let sent = self.tx.upgrade().is_some_and(|tx| {
                tx.send(LogManagerCommand::LivenessTick {
                    generation: self.generation,
                })
                .is_ok()
            });
            if !sent {
                debug!("Log manager is not running, stopping liveness timer");
                return;
            }
        }
    }
}
