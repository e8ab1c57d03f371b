//! End-to-end tests for the admin console: removals, mercy, shutdown.

mod common;

use common::{TestClient, TestServer};
use std::time::Duration;
use tokio::net::TcpStream;

#[tokio::test]
async fn deleting_an_account_scrubs_every_trace_of_the_name() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");

    let mut carol = TestClient::connect(server.address()).await.expect("connect");
    carol.register("carol", "pw").await.expect("register");
    let mut dave = TestClient::connect(server.address()).await.expect("connect");
    dave.register("dave", "pw").await.expect("register");

    alice.send_line("contacts").await.expect("open contacts");
    alice
        .expect_contains("Opening contact manager ...")
        .await
        .expect("manager");
    alice.send_line("add carol").await.expect("add");
    alice
        .expect_contains("carol has been added to your contact list.")
        .await
        .expect("added");
    alice.send_line("add dave").await.expect("add");
    alice
        .expect_contains("dave has been added to your contact list.")
        .await
        .expect("added");
    alice.send_line("exit").await.expect("close manager");

    alice.expect_contains("new message").await.expect("menu");
    alice.open_channel_fresh("room1").await.expect("open room");
    alice.send_line(":ban add carol").await.expect("ban");
    alice
        .expect_contains("carol has been banned.")
        .await
        .expect("banned");
    alice.send_line(":exit").await.expect("leave room");
    alice.expect_contains("new message").await.expect("menu");

    alice.send_line("admin").await.expect("console");
    alice
        .expect_contains("Opening admin console ...")
        .await
        .expect("console");
    alice.send_line("account remove carol").await.expect("remove");
    alice
        .expect_contains("Account has been removed.")
        .await
        .expect("removed");

    // carol's connection was forced off along with the account
    assert!(carol.wait_closed().await);

    let hub = server.hub();
    assert!(!hub.accounts.account_exists("carol"));
    let alice_account = hub.accounts.get("alice").expect("account");
    assert_eq!(alice_account.contacts(), vec!["dave".to_string()]);
    let room = hub.channels.open_or_create("room1", "alice");
    assert!(!room.is_banned("carol"));
}

#[tokio::test]
async fn mercy_limit_bans_and_deletes_on_the_third_attempt() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");

    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");

    // attempts one and two are forgiven, each one logging bob out
    for _ in 0..2 {
        bob.send_line("admin").await.expect("attempt");
        bob.expect_contains("You are not authorized to be here.")
            .await
            .expect("refusal");
        bob.expect_contains("Welcome to Confabulator")
            .await
            .expect("back outside");
        bob.login("bob", "pw").await.expect("login again");
    }
    assert_eq!(
        server.hub().accounts.get("bob").expect("account").forgiven(),
        2
    );

    bob.send_line("admin").await.expect("final attempt");
    bob.expect_contains("You have been warned for the last time!")
        .await
        .expect("warning");
    assert!(bob.wait_closed().await);

    let hub = server.hub();
    assert!(!hub.accounts.account_exists("bob"));
    assert!(
        hub.db
            .bans()
            .contains("127.0.0.1")
            .await
            .expect("ban lookup")
    );

    // the banned address is refused before it sees a prompt
    let mut again = TestClient::connect(server.address()).await.expect("connect");
    assert!(again.wait_closed().await);
}

#[tokio::test]
async fn shutdown_users_spares_administrators() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");

    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");

    alice.send_line("admin").await.expect("console");
    alice
        .expect_contains("Opening admin console ...")
        .await
        .expect("console");
    alice.send_line("shutdown users").await.expect("shutdown");
    alice
        .expect_contains("Server has been shutdown.")
        .await
        .expect("accept loop stopped");
    alice
        .expect_contains("sleeper")
        .await
        .expect("sleeper report");
    alice
        .expect_contains("Shutdown process has been completed.")
        .await
        .expect("completed");

    bob.expect_contains("alice is shutting down your connection.")
        .await
        .expect("notice");
    assert!(bob.wait_closed().await);

    // new connections are refused once the listener is gone
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(TcpStream::connect(server.address()).await.is_err());

    // the administrator's own session stays up
    alice.send_line("channels").await.expect("still alive");
    alice
        .expect_contains("There are no channels at this time.")
        .await
        .expect("console answers");
}

#[tokio::test]
async fn account_editor_changes_flags_and_passwords() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");
    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");
    bob.send_line("exit").await.expect("logout");

    alice.send_line("admin").await.expect("console");
    alice
        .expect_contains("Opening admin console ...")
        .await
        .expect("console");
    alice.send_line("account edit bob").await.expect("edit");
    alice
        .expect_contains("Opening account editor ...")
        .await
        .expect("editor");
    alice.send_line("edit admin").await.expect("toggle");
    alice
        .expect_contains("bob is an administrator now.")
        .await
        .expect("flag set");
    alice.send_line("edit password hunter2").await.expect("password");
    alice
        .expect_contains("Password has been changed to 'hunter2'")
        .await
        .expect("changed");
    alice.send_line("info").await.expect("info");
    alice.expect_contains("Admin    = true").await.expect("info");

    let bob_account = server.hub().accounts.get("bob").expect("account");
    assert!(bob_account.is_administrator());
    assert!(bob_account.password_matches("hunter2"));
}
