//! End-to-end persistence: state written on shutdown survives a restart.

mod common;

use common::{TestClient, TestServer};
use confabulator::db::Database;

#[tokio::test]
async fn registries_survive_a_save_and_reload() {
    let root = tempfile::tempdir().expect("tempdir");
    let db_path = root.path().join("confabulator.db");
    let db = Database::new(&db_path.to_string_lossy())
        .await
        .expect("open database");

    {
        let server = TestServer::spawn_with_db(db).await.expect("spawn server");
        let mut alice = TestClient::connect(server.address()).await.expect("connect");
        alice.register("alice", "pw").await.expect("register");
        alice.open_channel_fresh("room1").await.expect("open room");
        alice.send_line("for the record").await.expect("chat");
        alice
            .expect_contains("[alice] for the record")
            .await
            .expect("echo");
        alice.send_line(":exit").await.expect("leave");
        alice.expect_contains("new message").await.expect("menu");

        server.hub().save().await.expect("save");
    }

    let reopened = Database::new(&db_path.to_string_lossy())
        .await
        .expect("reopen database");
    let server = TestServer::spawn_with_db(reopened)
        .await
        .expect("respawn server");

    let hub = server.hub();
    assert!(hub.accounts.account_exists("alice"));
    assert_eq!(hub.accounts.is_administrator("alice"), Some(true));
    assert!(!hub.accounts.is_online("alice"));
    assert!(hub.channels.channel_exists("room1"));
    let room = hub.channels.open_or_create("room1", "alice");
    assert_eq!(room.buffer_len(), 1);
    assert_eq!(room.buffer_snapshot()[0].body, "for the record");
    assert_eq!(room.owner(), "alice");

    // the stored password still logs in over the wire
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.login("alice", "pw").await.expect("login");
}
