mod common;

use common::ns_fixture;

#[tokio::test]
async fn marking_a_client_inactive_removes_it_from_list_users() {
    let (ns, _dir) = ns_fixture();

    ns.register_client("alice", "127.0.0.1".parse().unwrap(), 1);
    ns.register_client("bob", "127.0.0.1".parse().unwrap(), 2);
    assert_eq!(ns.list_users(), vec!["alice".to_string(), "bob".to_string()]);

    // Mirrors what the NS connection handler does once a registered
    // client's socket closes (spec.md §5: "The NS marks the client
    // `inactive` on disconnect").
    ns.mark_client_inactive("alice");
    assert_eq!(ns.list_users(), vec!["bob".to_string()]);

    // Re-registering (as on reconnect) brings it back.
    ns.register_client("alice", "127.0.0.1".parse().unwrap(), 3);
    assert_eq!(ns.list_users(), vec!["alice".to_string(), "bob".to_string()]);
}
