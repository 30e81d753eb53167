//! Background liveness probing of the storage server roster: every 5
//! seconds, dial each registered control endpoint and flip `active` on
//! transition edges.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::ns::NameServer;

const INTERVAL: Duration = Duration::from_secs(5);

pub struct Heartbeat {
    ns: Arc<NameServer>,
}

impl Heartbeat {
    pub fn spawn(ns: Arc<NameServer>) -> JoinHandle<()> {
        tokio::spawn(async move { Self { ns }.run().await })
    }

    async fn run(self) {
        loop {
            self.sweep().await;
            sleep(INTERVAL).await;
        }
    }

    async fn sweep(&self) {
        let roster: Vec<_> = self.ns.ss_roster.iter().map(|e| (*e.key(), e.value().clone())).collect();
        for (ss_id, ss) in roster {
            let reachable = crate::ns::ss_link::reachable(ss.control_addr(), self.ns.probe_timeout()).await;

            if !reachable && ss.active {
                if let Some(mut entry) = self.ns.ss_roster.get_mut(&ss_id) {
                    entry.active = false;
                }
                tracing::warn!(ss_id, "heartbeat: storage server marked inactive");
            } else if reachable && !ss.active {
                if let Some(mut entry) = self.ns.ss_roster.get_mut(&ss_id) {
                    entry.active = true;
                }
                tracing::info!(ss_id, "heartbeat: storage server marked active");
            }
        }
    }
}
