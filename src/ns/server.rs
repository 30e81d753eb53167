//! Accept loop and per-connection dispatch for the name server's single
//! client/storage-server endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::ns::handlers::ViewFlags;
use crate::ns::state::Access;
use crate::ns::NameServer;
use crate::wire::{flags, read_frame, write_frame, ErrorCode, OpCode, Record};

/// Binds and serves forever, spawning one task per connection.
pub async fn serve(ns: Arc<NameServer>, bind_addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "name server listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        let ns = Arc::clone(&ns);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(ns, socket, peer).await {
                tracing::debug!(%peer, error = %e, "connection ended");
            }
        });
    }
}

async fn handle_connection(ns: Arc<NameServer>, mut socket: TcpStream, peer: SocketAddr) -> std::io::Result<()> {
    let mut registered_as: Option<String> = None;

    loop {
        let request = match read_frame(&mut socket).await {
            Ok(r) => r,
            Err(_) => break,
        };

        if request.op_code == OpCode::RegisterClient {
            registered_as = Some(request.username.clone());
        }

        let reply = dispatch(&ns, &request, peer).await;
        write_frame(&mut socket, &reply).await?;
    }

    if let Some(username) = registered_as {
        ns.mark_client_inactive(&username);
        tracing::debug!(username, "client disconnected, marked inactive");
    }
    Ok(())
}

async fn dispatch(ns: &Arc<NameServer>, req: &Record, peer: SocketAddr) -> Record {
    match req.op_code {
        OpCode::RegisterSs => handle_register_ss(ns, req, peer).await,
        OpCode::RegisterClient => {
            ns.register_client(&req.username, peer.ip(), peer.port());
            Record::reply_ok(OpCode::RegisterClient, "", "registered")
        }
        OpCode::View => {
            let view_flags = ViewFlags { all: req.flags & flags::ALL_OR_WRITE != 0, long: req.flags & flags::LONG != 0 };
            let listing = ns.view(&req.username, view_flags).await;
            Record::reply_ok(OpCode::View, "", listing)
        }
        OpCode::ViewFolder => {
            let files = ns.view_folder(&req.username, &req.filename);
            let listing = files.into_iter().map(|f| f.filename).collect::<Vec<_>>().join("\n");
            Record::reply_ok(OpCode::ViewFolder, "", listing)
        }
        OpCode::Create => match ns.create(&req.username, &req.filename).await {
            Ok(()) => Record::reply_ok(OpCode::Create, &req.filename, "created"),
            Err(e) => Record::reply_err(OpCode::Create, e.code(), e.message()),
        },
        OpCode::CreateFolder => match ns.create_folder(&req.username, &req.filename).await {
            Ok(()) => Record::reply_ok(OpCode::CreateFolder, &req.filename, "created"),
            Err(e) => Record::reply_err(OpCode::CreateFolder, e.code(), e.message()),
        },
        OpCode::Delete => match ns.delete(&req.username, &req.filename).await {
            Ok(()) => Record::reply_ok(OpCode::Delete, &req.filename, "deleted"),
            Err(e) => Record::reply_err(OpCode::Delete, e.code(), e.message()),
        },
        OpCode::Move => match ns.move_file(&req.username, &req.filename, &req.data).await {
            Ok(new_name) => Record::reply_ok(OpCode::Move, &new_name, "moved"),
            Err(e) => Record::reply_err(OpCode::Move, e.code(), e.message()),
        },
        OpCode::Info => match ns.info(&req.username, &req.filename) {
            Ok(file) => Record::reply_ok(OpCode::Info, &req.filename, format_info(&file)),
            Err(e) => Record::reply_err(OpCode::Info, e.code(), e.message()),
        },
        OpCode::List => {
            let users = ns.list_users().join("\n");
            Record::reply_ok(OpCode::List, "", users)
        }
        OpCode::Recents => {
            let listing = ns.recents(&req.username).into_iter().map(|f| f.filename).collect::<Vec<_>>().join("\n");
            Record::reply_ok(OpCode::Recents, "", listing)
        }
        OpCode::AddAccess => {
            let access = if req.flags & flags::ALL_OR_WRITE != 0 { Access::Write } else { Access::Read };
            match ns.add_access(&req.username, &req.filename, &req.data, access) {
                Ok(()) => Record::reply_ok(OpCode::AddAccess, &req.filename, "granted"),
                Err(e) => Record::reply_err(OpCode::AddAccess, e.code(), e.message()),
            }
        }
        OpCode::RemAccess => match ns.rem_access(&req.username, &req.filename, &req.data) {
            Ok(()) => Record::reply_ok(OpCode::RemAccess, &req.filename, "revoked"),
            Err(e) => Record::reply_err(OpCode::RemAccess, e.code(), e.message()),
        },
        OpCode::ReqAccess => {
            let access = if req.flags & flags::ALL_OR_WRITE != 0 { Access::Write } else { Access::Read };
            match ns.req_access(&req.username, &req.filename, access) {
                Ok(msg) => Record::reply_ok(OpCode::ReqAccess, &req.filename, msg),
                Err(e) => Record::reply_err(OpCode::ReqAccess, e.code(), e.message()),
            }
        }
        OpCode::ViewRequests => match ns.view_requests(&req.username, &req.filename) {
            Ok(pending) => {
                let listing = pending
                    .into_iter()
                    .map(|(user, access)| format!("{user} {access:?}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                Record::reply_ok(OpCode::ViewRequests, &req.filename, listing)
            }
            Err(e) => Record::reply_err(OpCode::ViewRequests, e.code(), e.message()),
        },
        OpCode::Approve => {
            let force_write = req.flags & flags::ALL_OR_WRITE != 0;
            match ns.approve(&req.username, &req.filename, &req.data, force_write) {
                Ok(()) => Record::reply_ok(OpCode::Approve, &req.filename, "approved"),
                Err(e) => Record::reply_err(OpCode::Approve, e.code(), e.message()),
            }
        }
        OpCode::Deny => match ns.deny(&req.username, &req.filename, &req.data) {
            Ok(()) => Record::reply_ok(OpCode::Deny, &req.filename, "denied"),
            Err(e) => Record::reply_err(OpCode::Deny, e.code(), e.message()),
        },
        OpCode::Read
        | OpCode::Stream
        | OpCode::ViewCheckpoint
        | OpCode::ListCheckpoints
        | OpCode::Exec => locate_reply(ns, req, Access::Read).await,
        OpCode::Undo | OpCode::Revert | OpCode::Checkpoint | OpCode::Write => locate_reply(ns, req, Access::Write).await,
        other => Record::reply_err(other, ErrorCode::InvalidCommand, "operation not handled by the name server"),
    }
}

async fn locate_reply(ns: &NameServer, req: &Record, need: Access) -> Record {
    match ns.locate(&req.username, &req.filename, need).await {
        Ok(addr) => Record::reply_ok(req.op_code, &req.filename, format!("{} {}", addr.ip(), addr.port())),
        Err(e) => Record::reply_err(req.op_code, e.code(), e.message()),
    }
}

async fn handle_register_ss(ns: &Arc<NameServer>, req: &Record, _peer: SocketAddr) -> Record {
    // The SS's advertised IP is carried in `data` rather than read from the
    // TCP peer address, so an SS behind NAT/a container can publish a
    // routable address distinct from the socket the registration arrived on.
    let mut parts = req.data.split_whitespace();
    let (Some(advertise_ip), Some(nm_port), Some(client_port)) = (
        parts.next().and_then(|p| p.parse::<std::net::IpAddr>().ok()),
        parts.next().and_then(|p| p.parse::<u16>().ok()),
        parts.next().and_then(|p| p.parse::<u16>().ok()),
    ) else {
        return Record::reply_err(OpCode::RegisterSs, ErrorCode::InvalidCommand, "malformed registration data");
    };

    match ns.register_ss(advertise_ip, nm_port, client_port) {
        Ok((ss_id, was_inactive)) => {
            ns.persist();
            if was_inactive {
                crate::ns::resync::spawn(Arc::clone(ns), ss_id);
            }
            ns.broadcast_partners().await;
            Record::reply_ok(OpCode::RegisterSs, "", ss_id.to_string())
        }
        Err(msg) => Record::reply_err(OpCode::RegisterSs, ErrorCode::ServerError, msg),
    }
}

fn format_info(file: &crate::ns::state::FileRecord) -> String {
    format!(
        "owner={} created={} modified={} accessed={} words={} chars={} size={}",
        file.owner, file.created_time, file.modified_time, file.accessed_time, file.word_count, file.char_count, file.size
    )
}
