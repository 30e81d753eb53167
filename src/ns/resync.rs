//! Primary resync: when a storage server that was previously inactive
//! re-registers, any file whose primary is that server and whose replica
//! is still reachable gets its content pulled from the replica and pushed
//! back into the primary, healing whatever writes it missed while down.

use std::sync::Arc;

use crate::ns::state::SsId;
use crate::ns::NameServer;
use crate::wire::{flags, ErrorCode, OpCode, Record};

/// Spawns the resync as a detached task so registration can reply
/// immediately; callers don't block a client on a potentially slow
/// multi-file copy.
pub fn spawn(ns: Arc<NameServer>, ss_id: SsId) {
    tokio::spawn(async move { run(&ns, ss_id).await });
}

async fn run(ns: &NameServer, ss_id: SsId) {
    let files: Vec<_> = ns
        .files
        .iter()
        .filter(|e| e.primary.ss_id == ss_id && e.replica.is_some())
        .map(|e| e.value().clone())
        .collect();

    if files.is_empty() {
        return;
    }

    tracing::info!(ss_id, count = files.len(), "resync: syncing files from replicas");

    let Some(primary_addr) = ns.ss_roster.get(&ss_id).map(|s| s.control_addr()) else {
        return;
    };

    for file in files {
        let Some(replica) = file.replica else { continue };
        let Some(replica_addr) = ns.ss_roster.get(&replica.ss_id).map(|s| s.control_addr()) else {
            continue;
        };

        let read_req = Record::request(OpCode::Read, "NM", &file.filename);
        let Some(read_reply) = crate::ns::ss_link::call(replica_addr, &read_req, ns.probe_timeout()).await else {
            continue;
        };
        if read_reply.error_code != ErrorCode::Success {
            continue;
        }

        let write_req = Record::request(OpCode::ReplWrite, "NM", &file.filename)
            .with_data(read_reply.data)
            .with_flags(flags::REPLICATION);
        crate::ns::ss_link::call(primary_addr, &write_req, ns.probe_timeout()).await;
    }

    tracing::info!(ss_id, "resync: completed");
}
