mod common;

use common::ss_fixture;
use sentra::ss::handlers_client;
use sentra::wire::{ErrorCode, OpCode, Record};

fn lock(filename: &str, sentence: i32, user: &str) -> Record {
    Record::request(OpCode::LockSentence, user, filename).with_sentence(sentence)
}

fn write(filename: &str, sentence: i32, user: &str, data: &str) -> Record {
    Record::request(OpCode::Write, user, filename).with_sentence(sentence).with_data(data)
}

fn unlock(filename: &str, sentence: i32, user: &str) -> Record {
    Record::request(OpCode::UnlockSentence, user, filename).with_sentence(sentence)
}

fn read(filename: &str, user: &str) -> Record {
    Record::request(OpCode::Read, user, filename)
}

#[tokio::test]
async fn s1_create_write_read() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();

    let reply = handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);

    let reply = handlers_client::dispatch(&ss, &write("doc.txt", 0, "alice", "1 Hello world.")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);

    let reply = handlers_client::dispatch(&ss, &unlock("doc.txt", 0, "alice")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);

    let reply = handlers_client::dispatch(&ss, &read("doc.txt", "alice")).await;
    assert_eq!(reply.data, "Hello world.");
}

#[tokio::test]
async fn s2_multi_word_phrase_insert() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;
    handlers_client::dispatch(&ss, &write("doc.txt", 0, "alice", "1 Hello world.")).await;

    let reply = handlers_client::dispatch(&ss, &write("doc.txt", 0, "alice", "2 cruel")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);
    let reply = handlers_client::dispatch(&ss, &write("doc.txt", 0, "alice", "3 happy")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);

    let reply = handlers_client::dispatch(&ss, &read("doc.txt", "alice")).await;
    assert_eq!(reply.data, "Hello cruel happy world.");
}

#[tokio::test]
async fn s3_append_new_sentence_requires_terminator() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hi").unwrap();

    let reply = handlers_client::dispatch(&ss, &lock("doc.txt", 1, "alice")).await;
    assert_eq!(reply.error_code, ErrorCode::InvalidIndex);

    handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;
    let reply = handlers_client::dispatch(&ss, &write("doc.txt", 0, "alice", "2 .")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);

    let reply = handlers_client::dispatch(&ss, &read("doc.txt", "alice")).await;
    assert_eq!(reply.data, "Hi .");

    let reply = handlers_client::dispatch(&ss, &lock("doc.txt", 1, "alice")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);
}

#[tokio::test]
async fn s4_lock_contention() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hi.").unwrap();

    let alice = handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;
    assert_eq!(alice.error_code, ErrorCode::Success);

    let bob = handlers_client::dispatch(&ss, &lock("doc.txt", 0, "bob")).await;
    assert_eq!(bob.error_code, ErrorCode::SentenceLocked);

    let bob_write = handlers_client::dispatch(&ss, &write("doc.txt", 0, "bob", "1 nope")).await;
    assert_eq!(bob_write.error_code, ErrorCode::SentenceLocked);
}

#[tokio::test]
async fn undo_restores_exact_prior_bytes_then_refuses_twice() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hello world.").unwrap();

    handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;
    handlers_client::dispatch(&ss, &write("doc.txt", 0, "alice", "2 cruel")).await;

    let reply = handlers_client::dispatch(&ss, &read("doc.txt", "alice")).await;
    assert_eq!(reply.data, "Hello cruel world.");

    let undo_reply = handlers_client::dispatch(&ss, &Record::request(OpCode::Undo, "alice", "doc.txt")).await;
    assert_eq!(undo_reply.error_code, ErrorCode::Success);

    let reply = handlers_client::dispatch(&ss, &read("doc.txt", "alice")).await;
    assert_eq!(reply.data, "Hello world.");

    let second_undo = handlers_client::dispatch(&ss, &Record::request(OpCode::Undo, "alice", "doc.txt")).await;
    assert_eq!(second_undo.error_code, ErrorCode::NoUndo);
}

#[tokio::test]
async fn undo_snapshot_survives_a_validation_failed_write() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hello world.").unwrap();

    handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;

    // Out-of-range word index: WRITE must abort without touching the file,
    // but the undo slot is still populated from this attempt.
    let reply = handlers_client::dispatch(&ss, &write("doc.txt", 0, "alice", "9 nope")).await;
    assert_eq!(reply.error_code, ErrorCode::InvalidIndex);

    let reply = handlers_client::dispatch(&ss, &read("doc.txt", "alice")).await;
    assert_eq!(reply.data, "Hello world.");

    let undo_reply = handlers_client::dispatch(&ss, &Record::request(OpCode::Undo, "alice", "doc.txt")).await;
    assert_eq!(undo_reply.error_code, ErrorCode::Success);
}

#[tokio::test]
async fn undo_snapshot_survives_an_out_of_range_sentence_index() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hello world.").unwrap();

    handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;

    // Sentence index 5 doesn't exist (there's only sentence 0, plus the
    // append slot at 1): WRITE must reject before ever calling apply_inserts,
    // but the undo slot is still populated from this attempt.
    let reply = handlers_client::dispatch(&ss, &write("doc.txt", 5, "alice", "1 nope")).await;
    assert_eq!(reply.error_code, ErrorCode::InvalidIndex);

    let undo_reply = handlers_client::dispatch(&ss, &Record::request(OpCode::Undo, "alice", "doc.txt")).await;
    assert_eq!(undo_reply.error_code, ErrorCode::Success);
}

#[tokio::test]
async fn undo_snapshot_survives_an_append_without_terminator() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hi").unwrap();

    handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;

    // Sentence 0 ("Hi") has no terminator, so appending sentence 1 is
    // rejected before apply_inserts runs, but the undo slot is still
    // populated from this attempt.
    let reply = handlers_client::dispatch(&ss, &write("doc.txt", 1, "alice", "1 nope")).await;
    assert_eq!(reply.error_code, ErrorCode::InvalidIndex);

    let undo_reply = handlers_client::dispatch(&ss, &Record::request(OpCode::Undo, "alice", "doc.txt")).await;
    assert_eq!(undo_reply.error_code, ErrorCode::Success);
}

#[tokio::test]
async fn session_lock_release_frees_lock_for_other_users() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hi.").unwrap();

    let reply = handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);

    // Simulate alice's connection dropping without an explicit UNLOCK_SENTENCE.
    handlers_client::release_session_lock(&ss, "doc.txt", 0, "alice").await;

    let reply = handlers_client::dispatch(&ss, &lock("doc.txt", 0, "bob")).await;
    assert_eq!(reply.error_code, ErrorCode::Success);
}

#[tokio::test]
async fn releasing_a_lock_you_no_longer_hold_is_a_no_op() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hi.").unwrap();

    handlers_client::dispatch(&ss, &lock("doc.txt", 0, "alice")).await;
    handlers_client::dispatch(&ss, &unlock("doc.txt", 0, "alice")).await;
    handlers_client::dispatch(&ss, &lock("doc.txt", 0, "bob")).await;

    // A stale release from alice's now-closed connection must not evict bob.
    handlers_client::release_session_lock(&ss, "doc.txt", 0, "alice").await;

    let reply = handlers_client::dispatch(&ss, &lock("doc.txt", 0, "bob")).await;
    assert_eq!(reply.data, "already locked by you");
}
