mod common;

use common::ns_fixture;
use sentra::ns::handlers::ViewFlags;
use sentra::ns::state::{Access, FileRecord, SsEndpoint};
use sentra::wire::{read_frame, write_frame, OpCode, Record};
use tokio::net::TcpListener;

/// Spawns a fake storage server that answers every request with a clone
/// of `reply`, with `op_code` rewritten to match the request.
async fn spawn_fake_ss(listener: TcpListener, reply: Record) {
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            let reply = reply.clone();
            tokio::spawn(async move {
                loop {
                    let Ok(req) = read_frame(&mut socket).await else { return };
                    let mut r = reply.clone();
                    r.op_code = req.op_code;
                    if write_frame(&mut socket, &r).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
}

/// Binds a free port, then closes the listener immediately: nothing
/// answers on it afterward, so a connect attempt fails fast.
async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn s6_locate_fails_over_to_replica_when_primary_is_down() {
    let (ns, _dir) = ns_fixture();

    let down_port = dead_port().await;
    let (primary_id, _) = ns.register_ss("127.0.0.1".parse().unwrap(), down_port, 9999).unwrap();

    // `locate` falls back to the replica's address directly once the
    // primary fails its probe, without itself probing the replica, so the
    // replica needs no live listener for this scenario.
    let replica_control_port = dead_port().await;
    let (replica_id, _) = ns.register_ss("127.0.0.1".parse().unwrap(), replica_control_port, 5555).unwrap();

    let primary = SsEndpoint { ss_id: primary_id, ip: "127.0.0.1".parse().unwrap(), client_port: 9999 };
    let replica = SsEndpoint { ss_id: replica_id, ip: "127.0.0.1".parse().unwrap(), client_port: 5555 };
    let record = FileRecord::new("doc.txt".to_string(), "alice".to_string(), primary, Some(replica));
    ns.files.insert("doc.txt".to_string(), record);

    let addr = ns.locate("alice", "doc.txt", Access::Read).await.expect("locate succeeds via replica");
    assert_eq!(addr.port(), 5555);
}

#[tokio::test]
async fn locate_probes_the_client_port_not_the_control_port() {
    let (ns, _dir) = ns_fixture();

    // Primary's control endpoint is reachable but its client endpoint is
    // not; if `locate` mistakenly probed the control port (the
    // `ss_file_exists` mechanism) it would declare the primary "up" and
    // hand back the dead client address instead of failing over.
    let primary_control = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let primary_control_port = primary_control.local_addr().unwrap().port();
    let primary_client_dead = dead_port().await;
    let (primary_id, _) =
        ns.register_ss("127.0.0.1".parse().unwrap(), primary_control_port, primary_client_dead).unwrap();

    let replica_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let replica_client_port = replica_listener.local_addr().unwrap().port();
    let (replica_id, _) =
        ns.register_ss("127.0.0.1".parse().unwrap(), dead_port().await, replica_client_port).unwrap();

    let primary = SsEndpoint { ss_id: primary_id, ip: "127.0.0.1".parse().unwrap(), client_port: primary_client_dead };
    let replica = SsEndpoint { ss_id: replica_id, ip: "127.0.0.1".parse().unwrap(), client_port: replica_client_port };
    let record = FileRecord::new("doc.txt".to_string(), "alice".to_string(), primary, Some(replica));
    ns.files.insert("doc.txt".to_string(), record);

    let addr = ns.locate("alice", "doc.txt", Access::Read).await.expect("locate succeeds via replica");
    assert_eq!(
        addr.port(),
        replica_client_port,
        "primary's control port being reachable must not count as the primary being up"
    );

    drop(primary_control);
    drop(replica_listener);
}

#[tokio::test]
async fn locate_does_not_fail_over_when_only_the_control_port_is_down() {
    let (ns, _dir) = ns_fixture();

    // Primary's client endpoint is reachable even though its control
    // endpoint is down; `locate` must still hand back the primary, not
    // fail over to the replica on an unrelated control-port outage.
    let primary_client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let primary_client_port = primary_client_listener.local_addr().unwrap().port();
    let primary_control_dead = dead_port().await;
    let (primary_id, _) =
        ns.register_ss("127.0.0.1".parse().unwrap(), primary_control_dead, primary_client_port).unwrap();

    let replica_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let replica_client_port = replica_listener.local_addr().unwrap().port();
    let (replica_id, _) =
        ns.register_ss("127.0.0.1".parse().unwrap(), dead_port().await, replica_client_port).unwrap();

    let primary = SsEndpoint { ss_id: primary_id, ip: "127.0.0.1".parse().unwrap(), client_port: primary_client_port };
    let replica = SsEndpoint { ss_id: replica_id, ip: "127.0.0.1".parse().unwrap(), client_port: replica_client_port };
    let record = FileRecord::new("doc.txt".to_string(), "alice".to_string(), primary, Some(replica));
    ns.files.insert("doc.txt".to_string(), record);

    let addr = ns.locate("alice", "doc.txt", Access::Read).await.expect("locate succeeds via primary");
    assert_eq!(
        addr.port(),
        primary_client_port,
        "primary's control port being unreachable must not trigger failover when its client port answers"
    );

    drop(primary_client_listener);
    drop(replica_listener);
}

#[tokio::test]
async fn view_excludes_files_the_user_cannot_read_unless_all_flag_is_set() {
    let (ns, _dir) = ns_fixture();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let control_port = listener.local_addr().unwrap().port();
    spawn_fake_ss(listener, Record::reply_ok(OpCode::Read, "doc.txt", "Hello world.")).await;
    let (ss_id, _) = ns.register_ss("127.0.0.1".parse().unwrap(), control_port, 4242).unwrap();
    ns.register_client("bob", "127.0.0.1".parse().unwrap(), 1);

    let primary = SsEndpoint { ss_id, ip: "127.0.0.1".parse().unwrap(), client_port: 4242 };
    let record = FileRecord::new("doc.txt".to_string(), "alice".to_string(), primary, None);
    ns.files.insert("doc.txt".to_string(), record);

    let listing = ns.view("bob", ViewFlags::default()).await;
    assert!(!listing.contains("doc.txt"), "bob has no access yet: {listing}");

    ns.add_access("alice", "doc.txt", "bob", Access::Read).unwrap();
    let listing = ns.view("bob", ViewFlags::default()).await;
    assert!(listing.contains("doc.txt"));

    let listing = ns.view("alice", ViewFlags::default()).await;
    assert!(listing.contains("doc.txt"), "owner always sees their own file");
}

#[tokio::test]
async fn access_request_lifecycle() {
    let (ns, _dir) = ns_fixture();
    ns.register_client("bob", "127.0.0.1".parse().unwrap(), 1);

    let primary = SsEndpoint { ss_id: 0, ip: "127.0.0.1".parse().unwrap(), client_port: 1 };
    let record = FileRecord::new("doc.txt".to_string(), "alice".to_string(), primary, None);
    ns.files.insert("doc.txt".to_string(), record);

    ns.req_access("bob", "doc.txt", Access::Write).unwrap();
    let pending = ns.view_requests("alice", "doc.txt").unwrap();
    assert_eq!(pending, vec![("bob".to_string(), Access::Write)]);

    ns.approve("alice", "doc.txt", "bob", false).unwrap();
    assert!(ns.info("bob", "doc.txt").is_ok());

    // Requesting access already held is reported, not re-queued.
    let msg = ns.req_access("bob", "doc.txt", Access::Write).unwrap();
    assert_eq!(msg, "already has access");
}

#[tokio::test]
async fn info_never_reaches_out_to_the_storage_server() {
    let (ns, _dir) = ns_fixture();
    // Primary endpoint points at a port nothing listens on; INFO must not
    // probe it and must still succeed.
    let dead = dead_port().await;
    let primary = SsEndpoint { ss_id: 0, ip: "127.0.0.1".parse().unwrap(), client_port: dead };
    let record = FileRecord::new("doc.txt".to_string(), "alice".to_string(), primary, None);
    ns.files.insert("doc.txt".to_string(), record);

    let info = ns.info("alice", "doc.txt").expect("info succeeds without probing the SS");
    assert_eq!(info.owner, "alice");

    assert!(matches!(ns.info("mallory", "doc.txt"), Err(_)));
}
