//! Handlers for the storage server's client endpoint: READ, WRITE (the
//! sentence-and-phrase-token algorithm), UNDO, CHECKPOINT/VIEWCHECKPOINT/
//! REVERT/LISTCHECKPOINTS, and sentence locking. STREAM is handled directly
//! by the client connection loop in [`crate::ss::server`] since it sends a
//! sequence of messages rather than one reply.

use crate::ss::replication;
use crate::ss::sentence::{apply_inserts, can_append_sentence, parse_sentences, reconstruct_content};
use crate::ss::StorageServer;
use crate::wire::{ErrorCode, OpCode, Record};

pub async fn dispatch(ss: &StorageServer, req: &Record) -> Record {
    match req.op_code {
        OpCode::Read => read(ss, req),
        OpCode::Write => write(ss, req).await,
        OpCode::Undo => undo(ss, req).await,
        OpCode::Checkpoint => checkpoint(ss, req),
        OpCode::ViewCheckpoint => view_checkpoint(ss, req),
        OpCode::Revert => revert(ss, req).await,
        OpCode::ListCheckpoints => list_checkpoints(ss, req),
        OpCode::LockSentence => lock_sentence(ss, req).await,
        OpCode::UnlockSentence => unlock_sentence(ss, req).await,
        other => Record::reply_err(other, ErrorCode::InvalidCommand, "invalid command"),
    }
}

fn read(ss: &StorageServer, req: &Record) -> Record {
    match ss.store.read(&req.filename) {
        Ok(content) => Record::reply_ok(OpCode::Read, &req.filename, content),
        Err(e) => Record::reply_err(OpCode::Read, e.code(), e.message()),
    }
}

/// WRITE: acquires the per-file mutex first, then loads the file and
/// snapshots it for UNDO unconditionally (so every reader/writer of
/// `content` within this call sees it under the same lock that also
/// guards the sentence-lock table), locates the target sentence
/// (appending a new one is allowed only when the file is still empty or
/// the content so far ends with a delimiter), confirms the sentence is
/// locked by this user, applies every `<word_index> <phrase>` line in
/// `req.data` as a single-token insertion, rejoins the sentences, and
/// replicates the full new content.
async fn write(ss: &StorageServer, req: &Record) -> Record {
    let state = ss.files.entry(&req.filename);
    let mut state = state.lock().await;

    let content = match ss.store.read(&req.filename) {
        Ok(c) => c,
        Err(e) => return Record::reply_err(OpCode::Write, e.code(), e.message()),
    };
    state.undo_content = Some(content.clone());

    let mut sentences = parse_sentences(&content);
    let sentence_count = sentences.len() as i32;
    let appending = req.sentence_number == sentence_count;

    if req.sentence_number < 0 || req.sentence_number > sentence_count {
        return Record::reply_err(
            OpCode::Write,
            ErrorCode::InvalidIndex,
            format!("sentence index out of range (0-{sentence_count} allowed)"),
        );
    }
    if appending && !can_append_sentence(&content) {
        return Record::reply_err(
            OpCode::Write,
            ErrorCode::InvalidIndex,
            format!("cannot start a new sentence until the previous one is terminated (0-{} allowed)", sentence_count - 1),
        );
    }

    match state.locked_by(req.sentence_number) {
        Some(owner) if owner == req.username => {}
        Some(_) => {
            tracing::warn!(filename = %req.filename, username = %req.username, op = "write", "rejected: sentence locked by another user");
            return Record::reply_err(OpCode::Write, ErrorCode::SentenceLocked, "sentence is locked by another user");
        }
        None => {
            tracing::warn!(filename = %req.filename, username = %req.username, op = "write", "rejected: sentence not locked");
            return Record::reply_err(OpCode::Write, ErrorCode::SentenceLocked, "sentence must be locked before writing");
        }
    }

    let target = if appending {
        String::new()
    } else {
        sentences[req.sentence_number as usize].clone()
    };

    let updated = match apply_inserts(&target, &req.data) {
        Ok(s) => s,
        Err(msg) => return Record::reply_err(OpCode::Write, ErrorCode::InvalidIndex, msg),
    };

    if appending {
        sentences.push(updated);
    } else {
        sentences[req.sentence_number as usize] = updated;
    }

    let new_content = reconstruct_content(&sentences);

    if let Err(e) = ss.store.save(&req.filename, &new_content) {
        return Record::reply_err(OpCode::Write, e.code(), e.message());
    }
    drop(state);

    replication::send(&ss.partner, replication::repl_write(&req.filename, &new_content)).await;
    tracing::info!(filename = %req.filename, username = %req.username, op = "write", "sentence written");
    Record::reply_ok(OpCode::Write, &req.filename, "write successful")
}

async fn undo(ss: &StorageServer, req: &Record) -> Record {
    let state = ss.files.entry(&req.filename);
    let mut state = state.lock().await;

    let Some(previous) = state.undo_content.take() else {
        tracing::warn!(filename = %req.filename, username = %req.username, op = "undo", "rejected: no undo history");
        return Record::reply_err(OpCode::Undo, ErrorCode::NoUndo, "no undo history available");
    };

    if let Err(e) = ss.store.save(&req.filename, &previous) {
        return Record::reply_err(OpCode::Undo, e.code(), e.message());
    }
    drop(state);

    replication::send(&ss.partner, replication::repl_write(&req.filename, &previous)).await;
    tracing::info!(filename = %req.filename, username = %req.username, op = "undo", "undo applied");
    Record::reply_ok(OpCode::Undo, &req.filename, "undo successful")
}

fn checkpoint(ss: &StorageServer, req: &Record) -> Record {
    let content = match ss.store.read(&req.filename) {
        Ok(c) => c,
        Err(e) => return Record::reply_err(OpCode::Checkpoint, e.code(), e.message()),
    };
    match ss.checkpoints.create(&req.filename, &req.data, &content) {
        Ok(()) => {
            tracing::info!(filename = %req.filename, username = %req.username, tag = %req.data, op = "checkpoint", "checkpoint saved");
            Record::reply_ok(OpCode::Checkpoint, &req.filename, "checkpoint saved")
        }
        Err(e) => Record::reply_err(OpCode::Checkpoint, e.code(), e.message()),
    }
}

fn view_checkpoint(ss: &StorageServer, req: &Record) -> Record {
    match ss.checkpoints.read(&req.filename, &req.data) {
        Ok(content) => Record::reply_ok(OpCode::ViewCheckpoint, &req.filename, content),
        Err(e) => Record::reply_err(OpCode::ViewCheckpoint, e.code(), e.message()),
    }
}

async fn revert(ss: &StorageServer, req: &Record) -> Record {
    let content = match ss.checkpoints.read(&req.filename, &req.data) {
        Ok(c) => c,
        Err(e) => return Record::reply_err(OpCode::Revert, e.code(), e.message()),
    };

    let state = ss.files.entry(&req.filename);
    let mut state = state.lock().await;
    let previous = ss.store.read(&req.filename).unwrap_or_default();

    if let Err(e) = ss.store.save(&req.filename, &content) {
        return Record::reply_err(OpCode::Revert, e.code(), e.message());
    }
    state.undo_content = Some(previous);
    drop(state);

    replication::send(&ss.partner, replication::repl_write(&req.filename, &content)).await;
    tracing::info!(filename = %req.filename, username = %req.username, tag = %req.data, op = "revert", "reverted to checkpoint");
    Record::reply_ok(OpCode::Revert, &req.filename, "reverted to checkpoint")
}

fn list_checkpoints(ss: &StorageServer, req: &Record) -> Record {
    match ss.checkpoints.list(&req.filename) {
        Ok(tags) => {
            let listing = tags.iter().map(|t| format!("--> {t}")).collect::<Vec<_>>().join("\n");
            Record::reply_ok(OpCode::ListCheckpoints, &req.filename, listing)
        }
        Err(e) => Record::reply_err(OpCode::ListCheckpoints, e.code(), e.message()),
    }
}

/// LOCK_SENTENCE: re-derives the current sentence count and trailing-
/// delimiter status every call (the content may have changed since the
/// last write), applies the same range rule as WRITE, and is idempotent
/// when the requester already holds the lock.
async fn lock_sentence(ss: &StorageServer, req: &Record) -> Record {
    let content = match ss.store.read(&req.filename) {
        Ok(c) => c,
        Err(e) => return Record::reply_err(OpCode::LockSentence, e.code(), e.message()),
    };
    let sentence_count = parse_sentences(&content).len() as i32;
    let appending = req.sentence_number == sentence_count;

    if req.sentence_number < 0 || req.sentence_number > sentence_count {
        return Record::reply_err(
            OpCode::LockSentence,
            ErrorCode::InvalidIndex,
            format!("sentence index out of range (0-{sentence_count} allowed)"),
        );
    }
    if appending && !can_append_sentence(&content) {
        return Record::reply_err(
            OpCode::LockSentence,
            ErrorCode::InvalidIndex,
            format!("cannot lock a new sentence until the previous one is terminated (0-{} allowed)", sentence_count - 1),
        );
    }

    let state = ss.files.entry(&req.filename);
    let mut state = state.lock().await;

    match state.locked_by(req.sentence_number) {
        Some(owner) if owner == req.username => Record::reply_ok(OpCode::LockSentence, &req.filename, "already locked by you"),
        Some(_) => {
            tracing::warn!(filename = %req.filename, username = %req.username, op = "lock_sentence", "rejected: locked by another user");
            Record::reply_err(OpCode::LockSentence, ErrorCode::SentenceLocked, "sentence is locked by another user")
        }
        None => {
            if state.sentence_locks.len() >= crate::ss::state::MAX_LOCKS_PER_FILE {
                return Record::reply_err(OpCode::LockSentence, ErrorCode::ServerError, "too many locks held on this file");
            }
            state.sentence_locks.insert(req.sentence_number, req.username.clone());
            tracing::info!(filename = %req.filename, username = %req.username, op = "lock_sentence", "sentence locked");
            Record::reply_ok(OpCode::LockSentence, &req.filename, "sentence locked")
        }
    }
}

async fn unlock_sentence(ss: &StorageServer, req: &Record) -> Record {
    let state = ss.files.entry(&req.filename);
    let mut state = state.lock().await;

    match state.locked_by(req.sentence_number) {
        Some(owner) if owner == req.username => {
            state.sentence_locks.remove(&req.sentence_number);
            tracing::info!(filename = %req.filename, username = %req.username, op = "unlock_sentence", "sentence unlocked");
            Record::reply_ok(OpCode::UnlockSentence, &req.filename, "sentence unlocked")
        }
        _ => {
            tracing::warn!(filename = %req.filename, username = %req.username, op = "unlock_sentence", "rejected: not locked by you");
            Record::reply_err(OpCode::UnlockSentence, ErrorCode::AccessDenied, "sentence is not locked by you")
        }
    }
}

/// Releases `(filename, sentence_number)` on behalf of `username` if they
/// still hold it. Called by the client connection loop when a socket
/// closes, so an aborted connection never leaves a dangling lock (spec
/// §5: "the SS's per-connection cleanup releases any locks ... owned by
/// that connection").
pub async fn release_session_lock(ss: &StorageServer, filename: &str, sentence_number: i32, username: &str) {
    let state = ss.files.entry(filename);
    let mut state = state.lock().await;
    if state.locked_by(sentence_number) == Some(username) {
        state.sentence_locks.remove(&sentence_number);
    }
}
