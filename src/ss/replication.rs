//! Fire-and-forget replication to a partner storage server: whichever SS
//! `SS_ACK` last named is dialed on its control endpoint and sent the
//! `REPL_*` counterpart of whatever mutation just happened locally, marked
//! so the partner never fans it out again.

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::net::TcpStream;

use crate::wire::{flags, read_frame, write_frame, OpCode, Record};

#[derive(Default)]
pub struct Partner {
    addr: ArcSwap<Option<SocketAddr>>,
}

impl Partner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, addr: SocketAddr) {
        self.addr.store(Arc::new(Some(addr)));
    }

    pub fn get(&self) -> Option<SocketAddr> {
        *self.addr.load_full()
    }
}

/// Sends `record` (with its op_code already set to the `REPL_*` variant)
/// to the current partner, best-effort. Does nothing if no partner is
/// known, if `record` is itself a replicated message (no re-fan-out), or
/// if the partner can't be reached.
pub async fn send(partner: &Partner, record: Record) {
    if record.is_replication() {
        return;
    }
    let Some(addr) = partner.get() else { return };

    let mut replicated = record;
    replicated.flags |= flags::REPLICATION;

    if let Ok(mut stream) = TcpStream::connect(addr).await {
        stream.set_nodelay(true).ok();
        if write_frame(&mut stream, &replicated).await.is_ok() {
            let _ = read_frame(&mut stream).await;
        }
    }
}

pub fn repl_create(filename: &str) -> Record {
    Record::request(OpCode::ReplCreate, "", filename)
}

pub fn repl_delete(filename: &str) -> Record {
    Record::request(OpCode::ReplDelete, "", filename)
}

pub fn repl_write(filename: &str, content: &str) -> Record {
    Record::request(OpCode::ReplWrite, "", filename).with_data(content)
}

pub fn repl_move(filename: &str, new_name: &str) -> Record {
    Record::request(OpCode::ReplMove, "", filename).with_data(new_name)
}

pub fn repl_create_folder(folder: &str) -> Record {
    Record::request(OpCode::ReplCreateFolder, "", folder)
}
