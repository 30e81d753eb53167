mod common;

use common::ss_fixture;
use sentra::ss::handlers_client;
use sentra::wire::{ErrorCode, OpCode, Record};

#[tokio::test]
async fn s7_checkpoint_then_revert_restores_prior_bytes() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hello world.").unwrap();

    let checkpoint = Record::request(OpCode::Checkpoint, "alice", "doc.txt").with_data("v1");
    let reply = handlers_client::dispatch(&ss, &checkpoint).await;
    assert_eq!(reply.error_code, ErrorCode::Success);

    let lock = Record::request(OpCode::LockSentence, "alice", "doc.txt").with_sentence(0);
    handlers_client::dispatch(&ss, &lock).await;
    let write = Record::request(OpCode::Write, "alice", "doc.txt").with_sentence(0).with_data("2 cruel");
    let reply = handlers_client::dispatch(&ss, &write).await;
    assert_eq!(reply.error_code, ErrorCode::Success);
    let unlock = Record::request(OpCode::UnlockSentence, "alice", "doc.txt").with_sentence(0);
    handlers_client::dispatch(&ss, &unlock).await;

    let reply = handlers_client::dispatch(&ss, &Record::request(OpCode::Read, "alice", "doc.txt")).await;
    assert_eq!(reply.data, "Hello cruel world.");

    let revert = Record::request(OpCode::Revert, "alice", "doc.txt").with_data("v1");
    let reply = handlers_client::dispatch(&ss, &revert).await;
    assert_eq!(reply.error_code, ErrorCode::Success);

    let reply = handlers_client::dispatch(&ss, &Record::request(OpCode::Read, "alice", "doc.txt")).await;
    assert_eq!(reply.data, "Hello world.");
}

#[tokio::test]
async fn view_checkpoint_does_not_touch_live_content() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hello world.").unwrap();

    handlers_client::dispatch(&ss, &Record::request(OpCode::Checkpoint, "alice", "doc.txt").with_data("v1")).await;

    let view = Record::request(OpCode::ViewCheckpoint, "alice", "doc.txt").with_data("v1");
    let reply = handlers_client::dispatch(&ss, &view).await;
    assert_eq!(reply.data, "Hello world.");

    let reply = handlers_client::dispatch(&ss, &Record::request(OpCode::Read, "alice", "doc.txt")).await;
    assert_eq!(reply.data, "Hello world.");
}

#[tokio::test]
async fn list_checkpoints_reports_every_tag_in_order() {
    let (ss, _dir) = ss_fixture();
    ss.store.create("doc.txt").unwrap();
    ss.store.save("doc.txt", "Hello world.").unwrap();

    handlers_client::dispatch(&ss, &Record::request(OpCode::Checkpoint, "alice", "doc.txt").with_data("v1")).await;
    handlers_client::dispatch(&ss, &Record::request(OpCode::Checkpoint, "alice", "doc.txt").with_data("v2")).await;

    let reply =
        handlers_client::dispatch(&ss, &Record::request(OpCode::ListCheckpoints, "alice", "doc.txt")).await;
    assert_eq!(reply.data, "--> v1\n--> v2");
}
