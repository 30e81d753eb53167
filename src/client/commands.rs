//! One function per CLI verb (spec.md §6), each driving the
//! NS-locate-then-SS-exchange pattern where applicable. `Command` is the
//! `clap`-derived shape of a parsed command line; `run` dispatches it.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::{format_error, ss_call, NsConnection};
use crate::wire::{flags, ErrorCode, OpCode, Record};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true)]
pub enum Command {
    View { #[arg(short = 'a')] all: bool, #[arg(short = 'l')] long: bool },
    Read { filename: String },
    Create { filename: String },
    Write { filename: String, sentence_number: i32 },
    Delete { filename: String },
    Info { filename: String },
    Stream { filename: String },
    List,
    Recents,
    Addaccess { #[arg(short = 'R')] read: bool, #[arg(short = 'W')] write: bool, filename: String, user: String },
    Remaccess { filename: String, user: String },
    Reqaccess { #[arg(short = 'W')] write: bool, filename: String },
    Viewrequests { filename: String },
    Approve { #[arg(short = 'W')] force_write: bool, filename: String, user: String },
    Deny { filename: String, user: String },
    Undo { filename: String },
    Createfolder { path: String },
    Move { filename: String, folder: String },
    Viewfolder { folder: String },
    Checkpoint { filename: String, tag: String },
    Viewcheckpoint { filename: String, tag: String },
    Revert { filename: String, tag: String },
    Listcheckpoints { filename: String },
    Exec { filename: String },
    Exit,
}

/// Splits a raw command line into shell-style tokens and parses it,
/// case-insensitively on the leading verb (spec.md §6: "case-insensitive
/// where the verb starts the line").
pub fn parse_line(line: &str) -> Result<Command, String> {
    let mut tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if let Some(verb) = tokens.first_mut() {
        *verb = verb.to_lowercase();
    }
    Command::try_parse_from(tokens).map_err(|e| e.to_string())
}

/// Runs one parsed command against `ns`, returning the text to print.
/// Returns `Ok(None)` on EXIT, signaling the caller to stop the loop.
pub async fn run(ns: &mut NsConnection, cmd: Command) -> std::io::Result<Option<String>> {
    let out = match cmd {
        Command::Exit => return Ok(None),
        Command::View { all, long } => {
            let mut bits = 0u16;
            if all {
                bits |= flags::ALL_OR_WRITE;
            }
            if long {
                bits |= flags::LONG;
            }
            let req = Record::request(OpCode::View, ns.username.clone(), "").with_flags(bits);
            reply_text(ns.call(req).await?, "VIEW")
        }
        Command::List => reply_text(ns.call(Record::request(OpCode::List, ns.username.clone(), "")).await?, "LIST"),
        Command::Recents => {
            reply_text(ns.call(Record::request(OpCode::Recents, ns.username.clone(), "")).await?, "RECENTS")
        }
        Command::Create { filename } => {
            let reply = ns.call(Record::request(OpCode::Create, ns.username.clone(), filename)).await?;
            ok_or_err(reply, "CREATE", "File created.")
        }
        Command::Delete { filename } => {
            let reply = ns.call(Record::request(OpCode::Delete, ns.username.clone(), filename)).await?;
            ok_or_err(reply, "DELETE", "File deleted.")
        }
        Command::Info { filename } => {
            reply_text(ns.call(Record::request(OpCode::Info, ns.username.clone(), filename)).await?, "INFO")
        }
        Command::Createfolder { path } => {
            let reply = ns.call(Record::request(OpCode::CreateFolder, ns.username.clone(), path)).await?;
            ok_or_err(reply, "CREATEFOLDER", "Folder created.")
        }
        Command::Viewfolder { folder } => {
            reply_text(ns.call(Record::request(OpCode::ViewFolder, ns.username.clone(), folder)).await?, "VIEWFOLDER")
        }
        Command::Move { filename, folder } => {
            let reply = ns.call(Record::request(OpCode::Move, ns.username.clone(), filename).with_data(folder)).await?;
            ok_or_err(reply, "MOVE", "File moved.")
        }
        Command::Addaccess { read: _, write, filename, user } => {
            let mut req = Record::request(OpCode::AddAccess, ns.username.clone(), filename).with_data(user);
            if write {
                req = req.with_flags(flags::ALL_OR_WRITE);
            }
            ok_or_err(ns.call(req).await?, "ADDACCESS", "Access granted.")
        }
        Command::Remaccess { filename, user } => {
            let req = Record::request(OpCode::RemAccess, ns.username.clone(), filename).with_data(user);
            ok_or_err(ns.call(req).await?, "REMACCESS", "Access revoked.")
        }
        Command::Reqaccess { write, filename } => {
            let mut req = Record::request(OpCode::ReqAccess, ns.username.clone(), filename);
            if write {
                req = req.with_flags(flags::ALL_OR_WRITE);
            }
            reply_text(ns.call(req).await?, "REQACCESS")
        }
        Command::Viewrequests { filename } => {
            reply_text(ns.call(Record::request(OpCode::ViewRequests, ns.username.clone(), filename)).await?, "VIEWREQUESTS")
        }
        Command::Approve { force_write, filename, user } => {
            let mut req = Record::request(OpCode::Approve, ns.username.clone(), filename).with_data(user);
            if force_write {
                req = req.with_flags(flags::ALL_OR_WRITE);
            }
            ok_or_err(ns.call(req).await?, "APPROVE", "Request approved.")
        }
        Command::Deny { filename, user } => {
            let req = Record::request(OpCode::Deny, ns.username.clone(), filename).with_data(user);
            ok_or_err(ns.call(req).await?, "DENY", "Request denied.")
        }
        Command::Read { filename } => read_file(ns, filename).await?,
        Command::Undo { filename } => {
            locate_then_ss(ns, OpCode::Undo, filename, |_addr, username, filename| {
                Record::request(OpCode::Undo, username, filename)
            })
            .await?
        }
        Command::Stream { filename } => stream_file(ns, filename).await?,
        Command::Checkpoint { filename, tag } => {
            checkpoint_like(ns, OpCode::Checkpoint, filename, tag).await?
        }
        Command::Viewcheckpoint { filename, tag } => checkpoint_like(ns, OpCode::ViewCheckpoint, filename, tag).await?,
        Command::Revert { filename, tag } => checkpoint_like(ns, OpCode::Revert, filename, tag).await?,
        Command::Listcheckpoints { filename } => {
            let addr = match locate(ns, OpCode::ListCheckpoints, &filename).await? {
                Ok(addr) => addr,
                Err(msg) => return Ok(Some(msg)),
            };
            let req = Record::request(OpCode::ListCheckpoints, ns.username.clone(), filename);
            reply_text(ss_call(addr, req).await?, "LISTCHECKPOINTS")
        }
        Command::Exec { filename } => {
            let addr = match locate(ns, OpCode::Exec, &filename).await? {
                Ok(addr) => addr,
                Err(msg) => return Ok(Some(msg)),
            };
            format!("EXEC would run against storage server at {addr} (process launch out of scope here)")
        }
        Command::Write { filename, sentence_number } => write_flow(ns, filename, sentence_number).await?,
    };
    Ok(Some(out))
}

fn ok_or_err(reply: Record, context: &str, success: &str) -> String {
    if reply.error_code == ErrorCode::Success {
        success.to_string()
    } else {
        format_error(context, &reply)
    }
}

fn reply_text(reply: Record, context: &str) -> String {
    if reply.error_code == ErrorCode::Success {
        reply.data
    } else {
        format_error(context, &reply)
    }
}

/// NS-locate, returning `Ok(addr)` on success or `Err(formatted message)`
/// on ACL/not-found/connection failure.
async fn locate(ns: &mut NsConnection, op: OpCode, filename: &str) -> std::io::Result<Result<std::net::SocketAddr, String>> {
    let reply = ns.call(Record::request(op, ns.username.clone(), filename)).await?;
    if reply.error_code != ErrorCode::Success {
        return Ok(Err(format_error(&format!("{op:?}"), &reply)));
    }
    match NsConnection::parse_locate(&reply.data) {
        Some(addr) => Ok(Ok(addr)),
        None => Ok(Err(format!("ERROR [{op:?}]: malformed locate reply"))),
    }
}

async fn locate_then_ss(
    ns: &mut NsConnection,
    op: OpCode,
    filename: String,
    build: impl FnOnce(std::net::SocketAddr, String, String) -> Record,
) -> std::io::Result<String> {
    let addr = match locate(ns, op, &filename).await? {
        Ok(addr) => addr,
        Err(msg) => return Ok(msg),
    };
    let req = build(addr, ns.username.clone(), filename);
    let reply = ss_call(addr, req).await?;
    Ok(ok_or_err(reply, &format!("{op:?}"), "Done."))
}

async fn read_file(ns: &mut NsConnection, filename: String) -> std::io::Result<String> {
    let addr = match locate(ns, OpCode::Read, &filename).await? {
        Ok(addr) => addr,
        Err(msg) => return Ok(msg),
    };
    let reply = ss_call(addr, Record::request(OpCode::Read, ns.username.clone(), filename)).await?;
    Ok(reply_text(reply, "READ"))
}

async fn checkpoint_like(ns: &mut NsConnection, op: OpCode, filename: String, tag: String) -> std::io::Result<String> {
    let addr = match locate(ns, op, &filename).await? {
        Ok(addr) => addr,
        Err(msg) => return Ok(msg),
    };
    let req = Record::request(op, ns.username.clone(), filename).with_data(tag);
    let reply = ss_call(addr, req).await?;
    Ok(reply_text(reply, &format!("{op:?}")))
}

/// STREAM: prints each word as it arrives, stopping at the `"STOP"`
/// sentinel frame (spec.md §4.2).
async fn stream_file(ns: &mut NsConnection, filename: String) -> std::io::Result<String> {
    let addr = match locate(ns, OpCode::Stream, &filename).await? {
        Ok(addr) => addr,
        Err(msg) => return Ok(msg),
    };
    let mut stream = crate::client::connect_ss(addr).await?;
    crate::wire::write_frame(&mut stream, &Record::request(OpCode::Stream, ns.username.clone(), filename)).await?;

    let mut words = Vec::new();
    loop {
        let frame = crate::wire::read_frame(&mut stream).await?;
        if frame.error_code != ErrorCode::Success {
            return Ok(format_error("STREAM", &frame));
        }
        if frame.data == "STOP" {
            break;
        }
        if !frame.data.is_empty() {
            words.push(frame.data);
        }
    }
    Ok(words.join(" "))
}

/// The four-phase WRITE flow from spec.md §4.3: NS locate, then three
/// independent SS connections for LOCK/WRITE/UNLOCK.
async fn write_flow(ns: &mut NsConnection, filename: String, sentence_number: i32) -> std::io::Result<String> {
    let addr = match locate(ns, OpCode::Write, &filename).await? {
        Ok(addr) => addr,
        Err(msg) => return Ok(msg),
    };

    let lock_req = Record::request(OpCode::LockSentence, ns.username.clone(), filename.clone()).with_sentence(sentence_number);
    let lock_reply = ss_call(addr, lock_req).await?;
    if lock_reply.error_code != ErrorCode::Success {
        return Ok(format_error("LOCK", &lock_reply));
    }

    let write_data = collect_write_lines().await?;

    let write_req = Record::request(OpCode::Write, ns.username.clone(), filename.clone())
        .with_sentence(sentence_number)
        .with_data(write_data);
    let write_reply = ss_call(addr, write_req).await?;
    let write_summary = ok_or_err(write_reply, "WRITE", "Write successful.");

    let unlock_req = Record::request(OpCode::UnlockSentence, ns.username.clone(), filename).with_sentence(sentence_number);
    let unlock_reply = ss_call(addr, unlock_req).await?;
    if unlock_reply.error_code != ErrorCode::Success {
        return Ok(format!("{write_summary}\n{}", format_error("UNLOCK", &unlock_reply)));
    }

    Ok(write_summary)
}

/// Reads `<word_index> <phrase>` lines from stdin until the `ETIRW`
/// sentinel, matching the original client's collection loop.
async fn collect_write_lines() -> std::io::Result<String> {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut data = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "ETIRW" {
            break;
        }
        data.push_str(trimmed);
        data.push('\n');
    }
    Ok(data)
}
