//! Accept loops for the storage server's two endpoints (name-server control
//! traffic and client traffic), plus the startup registration handshake.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

use crate::ss::{handlers_client, handlers_control, StorageServer};
use crate::wire::{read_frame, write_frame, ErrorCode, OpCode, Record};

/// Registers with the name server, then serves the control and client
/// endpoints concurrently until either accept loop fails.
pub async fn run(ss: Arc<StorageServer>) -> std::io::Result<()> {
    register_with_name_server(&ss).await;

    let control = serve_control(Arc::clone(&ss));
    let client = serve_client(Arc::clone(&ss));

    tokio::try_join!(control, client)?;
    Ok(())
}

async fn register_with_name_server(ss: &StorageServer) {
    let nm_port = ss.config.control_bind.port();
    let client_port = ss.config.client_bind.port();
    let data = format!("{} {nm_port} {client_port}", ss.config.advertise_ip);
    let req = Record::request(OpCode::RegisterSs, "", "").with_data(data);

    loop {
        match TcpStream::connect(ss.config.name_server_addr).await {
            Ok(mut stream) => {
                stream.set_nodelay(true).ok();
                if write_frame(&mut stream, &req).await.is_ok() {
                    if let Ok(reply) = read_frame(&mut stream).await {
                        if reply.error_code.is_success() {
                            tracing::info!(ss_id = %reply.data, "registered with name server");
                            return;
                        }
                        tracing::error!(error = %reply.error_msg, "name server rejected registration");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not reach name server, retrying"),
        }
        sleep(Duration::from_secs(2)).await;
    }
}

async fn serve_control(ss: Arc<StorageServer>) -> std::io::Result<()> {
    let listener = TcpListener::bind(ss.config.control_bind).await?;
    tracing::info!(addr = %ss.config.control_bind, "storage server control endpoint listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        let ss = Arc::clone(&ss);
        tokio::spawn(async move {
            if let Err(e) = handle_control_connection(ss, socket).await {
                tracing::debug!(%peer, error = %e, "control connection ended");
            }
        });
    }
}

async fn serve_client(ss: Arc<StorageServer>) -> std::io::Result<()> {
    let listener = TcpListener::bind(ss.config.client_bind).await?;
    tracing::info!(addr = %ss.config.client_bind, "storage server client endpoint listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        let ss = Arc::clone(&ss);
        tokio::spawn(async move {
            if let Err(e) = handle_client_connection(ss, socket).await {
                tracing::debug!(%peer, error = %e, "client connection ended");
            }
        });
    }
}

async fn handle_control_connection(ss: Arc<StorageServer>, mut socket: TcpStream) -> std::io::Result<()> {
    loop {
        let request = match read_frame(&mut socket).await {
            Ok(r) => r,
            Err(_) => return Ok(()),
        };
        let reply = handlers_control::dispatch(&ss, &request).await;
        write_frame(&mut socket, &reply).await?;
    }
}

/// Tracks every `(filename, sentence_number, username)` this connection has
/// locked, so they can all be released if the connection drops without an
/// explicit UNLOCK_SENTENCE.
async fn handle_client_connection(ss: Arc<StorageServer>, mut socket: TcpStream) -> std::io::Result<()> {
    let mut held_locks: HashSet<(String, i32, String)> = HashSet::new();

    let result = client_loop(&ss, &mut socket, &mut held_locks).await;

    for (filename, sentence_number, username) in held_locks {
        handlers_client::release_session_lock(&ss, &filename, sentence_number, &username).await;
    }

    result
}

async fn client_loop(
    ss: &Arc<StorageServer>,
    socket: &mut TcpStream,
    held_locks: &mut HashSet<(String, i32, String)>,
) -> std::io::Result<()> {
    loop {
        let request = match read_frame(socket).await {
            Ok(r) => r,
            Err(_) => return Ok(()),
        };

        if request.op_code == OpCode::Stream {
            stream_words(ss, socket, &request).await?;
            continue;
        }

        let reply = handlers_client::dispatch(ss, &request).await;

        match request.op_code {
            OpCode::LockSentence if reply.error_code == ErrorCode::Success => {
                held_locks.insert((request.filename.clone(), request.sentence_number, request.username.clone()));
            }
            OpCode::UnlockSentence if reply.error_code == ErrorCode::Success => {
                held_locks.remove(&(request.filename.clone(), request.sentence_number, request.username.clone()));
            }
            _ => {}
        }

        write_frame(socket, &reply).await?;
    }
}

/// STREAM: unlike every other op this sends a sequence of frames over one
/// request — a success ack, then one frame per whitespace-separated word
/// with a short delay between each, then a final `data = "STOP"` frame.
async fn stream_words(ss: &StorageServer, socket: &mut TcpStream, req: &Record) -> std::io::Result<()> {
    let content = match ss.store.read(&req.filename) {
        Ok(c) => c,
        Err(e) => {
            let reply = Record::reply_err(OpCode::Stream, e.code(), e.message());
            write_frame(socket, &reply).await?;
            return Ok(());
        }
    };

    write_frame(socket, &Record::reply_ok(OpCode::Stream, &req.filename, "")).await?;

    for word in content.split_whitespace() {
        write_frame(socket, &Record::reply_ok(OpCode::Stream, &req.filename, word)).await?;
        sleep(Duration::from_millis(100)).await;
    }

    write_frame(socket, &Record::reply_ok(OpCode::Stream, &req.filename, "STOP")).await?;
    Ok(())
}
