//! Handlers for the storage server's control endpoint: name-server-issued
//! CREATE/DELETE/CREATEFOLDER/MOVE/READ-probe, partner announcement
//! (`SS_ACK`), and the `REPL_*` counterparts applied without further
//! fan-out.

use crate::ss::replication;
use crate::ss::StorageServer;
use crate::wire::{ErrorCode, OpCode, Record};

pub async fn dispatch(ss: &StorageServer, req: &Record) -> Record {
    match req.op_code {
        OpCode::Create => {
            let reply = match ss.store.create(&req.filename) {
                Ok(()) => {
                    ss.files.touch(&req.filename);
                    tracing::debug!(filename = %req.filename, op = "create", "storage created");
                    Record::reply_ok(OpCode::Create, &req.filename, "file created successfully")
                }
                Err(e) => Record::reply_err(OpCode::Create, e.code(), e.message()),
            };
            maybe_replicate(ss, req, &reply, || replication::repl_create(&req.filename)).await;
            reply
        }
        OpCode::Delete => {
            let reply = match ss.store.delete(&req.filename) {
                Ok(()) => {
                    ss.files.remove(&req.filename);
                    tracing::debug!(filename = %req.filename, op = "delete", "storage deleted");
                    Record::reply_ok(OpCode::Delete, &req.filename, "file deleted successfully")
                }
                Err(e) => Record::reply_err(OpCode::Delete, e.code(), e.message()),
            };
            maybe_replicate(ss, req, &reply, || replication::repl_delete(&req.filename)).await;
            reply
        }
        OpCode::Read => match ss.store.read(&req.filename) {
            Ok(content) => Record::reply_ok(OpCode::Read, &req.filename, content),
            Err(e) => Record::reply_err(OpCode::Read, e.code(), e.message()),
        },
        OpCode::CreateFolder => {
            let reply = match ss.store.create_folder(&req.filename) {
                Ok(()) => Record::reply_ok(OpCode::CreateFolder, &req.filename, "folder created"),
                Err(e) => Record::reply_err(OpCode::CreateFolder, e.code(), e.message()),
            };
            maybe_replicate(ss, req, &reply, || replication::repl_create_folder(&req.filename)).await;
            reply
        }
        OpCode::Move => {
            let reply = match ss.store.rename(&req.filename, &req.data) {
                Ok(()) => {
                    ss.files.rename(&req.filename, &req.data);
                    Record::reply_ok(OpCode::Move, &req.data, "move successful")
                }
                Err(e) => Record::reply_err(OpCode::Move, e.code(), e.message()),
            };
            let new_name = req.data.clone();
            maybe_replicate(ss, req, &reply, || replication::repl_move(&req.filename, &new_name)).await;
            reply
        }
        OpCode::SsAck => {
            if let Some(addr) = parse_partner(&req.data) {
                ss.partner.set(addr);
                Record::reply_ok(OpCode::SsAck, "", "ACK")
            } else {
                Record::reply_err(OpCode::SsAck, ErrorCode::InvalidCommand, "malformed partner announcement")
            }
        }
        OpCode::ReplCreate => match ss.store.create(&req.filename) {
            Ok(()) | Err(crate::error::SsError::FileExists) => {
                ss.files.touch(&req.filename);
                Record::reply_ok(OpCode::ReplCreate, &req.filename, "replicated")
            }
            Err(e) => Record::reply_err(OpCode::ReplCreate, e.code(), e.message()),
        },
        OpCode::ReplDelete => match ss.store.delete(&req.filename) {
            Ok(()) | Err(crate::error::SsError::FileNotFound) => {
                ss.files.remove(&req.filename);
                Record::reply_ok(OpCode::ReplDelete, &req.filename, "replicated")
            }
            Err(e) => Record::reply_err(OpCode::ReplDelete, e.code(), e.message()),
        },
        OpCode::ReplMove => match ss.store.rename(&req.filename, &req.data) {
            Ok(()) => {
                ss.files.rename(&req.filename, &req.data);
                Record::reply_ok(OpCode::ReplMove, &req.data, "replicated")
            }
            Err(e) => Record::reply_err(OpCode::ReplMove, e.code(), e.message()),
        },
        OpCode::ReplCreateFolder => match ss.store.create_folder(&req.filename) {
            Ok(()) => Record::reply_ok(OpCode::ReplCreateFolder, &req.filename, "replicated"),
            Err(e) => Record::reply_err(OpCode::ReplCreateFolder, e.code(), e.message()),
        },
        OpCode::ReplWrite => match ss.store.save(&req.filename, &req.data) {
            Ok(()) => {
                ss.files.touch(&req.filename);
                Record::reply_ok(OpCode::ReplWrite, &req.filename, "replicated")
            }
            Err(e) => Record::reply_err(OpCode::ReplWrite, e.code(), e.message()),
        },
        other => Record::reply_err(other, ErrorCode::InvalidCommand, "invalid command from name server"),
    }
}

async fn maybe_replicate(ss: &StorageServer, req: &Record, reply: &Record, build: impl FnOnce() -> Record) {
    if reply.error_code != ErrorCode::Success || req.is_replication() {
        return;
    }
    replication::send(&ss.partner, build()).await;
}

fn parse_partner(data: &str) -> Option<std::net::SocketAddr> {
    let mut parts = data.split_whitespace();
    let ip = parts.next()?;
    let port: u16 = parts.next()?.parse().ok()?;
    Some(std::net::SocketAddr::new(ip.parse().ok()?, port))
}
