//! End-to-end tests for the connection lifecycle and the outer menus.

mod common;

use common::{TestClient, TestServer};

#[tokio::test]
async fn register_first_account_and_greet() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = TestClient::connect(server.address()).await.expect("connect");

    client
        .expect_contains("Welcome to Confabulator")
        .await
        .expect("banner");
    client
        .send_line("register alice pw")
        .await
        .expect("register");
    client.expect_contains("TERMS OF SERVICE").await.expect("tos");
    client.expect_contains("Do you agree?").await.expect("prompt");
    client.send_line("yes").await.expect("agree");

    // the very first account is an administrator
    client
        .expect_contains("Welcome, administrator!")
        .await
        .expect("admin greeting");
    client
        .expect_contains("You have 0 new messages.")
        .await
        .expect("unread count");
    client
        .expect_contains("0 of your 0 friends are online.")
        .await
        .expect("contact count");

    assert!(server.hub().accounts.account_exists("alice"));
    assert_eq!(server.hub().accounts.is_administrator("alice"), Some(true));
}

#[tokio::test]
async fn logout_returns_to_the_outside_menu() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = TestClient::connect(server.address()).await.expect("connect");

    client.register("alice", "pw").await.expect("register");
    assert!(server.hub().accounts.is_online("alice"));

    client.send_line("exit").await.expect("logout");
    client
        .expect_contains("Welcome to Confabulator")
        .await
        .expect("banner again");
    assert!(!server.hub().accounts.is_online("alice"));

    client.login("alice", "pw").await.expect("login");
    assert!(server.hub().accounts.is_online("alice"));
}

#[tokio::test]
async fn login_rejections() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut first = TestClient::connect(server.address()).await.expect("connect");
    first.register("alice", "pw").await.expect("register");

    let mut second = TestClient::connect(server.address()).await.expect("connect");
    second.send_line("login alice wrong").await.expect("send");
    second
        .expect_contains("Authentication failed!")
        .await
        .expect("bad password");
    second.send_line("login nobody pw").await.expect("send");
    second
        .expect_contains("Authentication failed!")
        .await
        .expect("missing account");
    second.send_line("login alice pw").await.expect("send");
    second
        .expect_contains("Account is already logged in!")
        .await
        .expect("double login");
}

#[tokio::test]
async fn register_validations() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut first = TestClient::connect(server.address()).await.expect("connect");
    first.register("alice", "pw").await.expect("register");
    first.send_line("exit").await.expect("logout");

    let mut second = TestClient::connect(server.address()).await.expect("connect");
    second.send_line("register alice other").await.expect("send");
    second.expect_contains("Do you agree?").await.expect("tos");
    second.send_line("yes").await.expect("agree");
    second
        .expect_contains("Account already exists!")
        .await
        .expect("duplicate name");

    second.send_line("register").await.expect("send");
    second.expect_contains("Do you agree?").await.expect("tos");
    second.send_line("yes").await.expect("agree");
    second.expect_contains("Username:").await.expect("prompt");
    second.send_line("two words").await.expect("name");
    second
        .expect_contains("Username may not have whitespace!")
        .await
        .expect("whitespace name");
}

#[tokio::test]
async fn unknown_commands_are_reported() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = TestClient::connect(server.address()).await.expect("connect");
    client.send_line("frobnicate").await.expect("send");
    client
        .expect_contains("Command not found!")
        .await
        .expect("unknown verb");
}

#[tokio::test]
async fn json_help_round_trips_the_verb_table() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = TestClient::connect(server.address()).await.expect("connect");
    client
        .expect_contains("Welcome to Confabulator")
        .await
        .expect("banner");
    client.send_line("__json_help__").await.expect("send");
    let line = client.expect_contains("{").await.expect("json line");
    let decoded: serde_json::Value = serde_json::from_str(&line).expect("valid json");
    let object = decoded.as_object().expect("object");
    let mut verbs: Vec<&str> = object.keys().map(String::as_str).collect();
    verbs.sort_unstable();
    assert_eq!(verbs, vec!["exit", "help", "login", "open_source", "register"]);
    assert_eq!(
        object["login"].as_str().unwrap(),
        "Login to the server to access account."
    );
}

#[tokio::test]
async fn composed_messages_land_in_the_inbox_and_reading_marks_them() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");
    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");

    alice.send_line("messages").await.expect("open inbox");
    alice
        .expect_contains("Opening message manager ...")
        .await
        .expect("manager");
    alice.send_line("send bob").await.expect("send");
    alice
        .expect_contains("Enter 2 blank lines to send.")
        .await
        .expect("composer");
    alice.send_line("hello bob").await.expect("body");
    alice.send_line("").await.expect("blank");
    alice.send_line("").await.expect("blank");
    alice
        .expect_contains("Message has been delivered.")
        .await
        .expect("delivered");

    bob.expect_contains("[EVENT] alice has sent you a message.")
        .await
        .expect("event notice");
    bob.send_line("messages").await.expect("open inbox");
    bob.send_line("show").await.expect("show");
    bob.expect_contains("Message 1 from alice [Unread]:")
        .await
        .expect("summary");
    bob.expect_contains("hello bob").await.expect("clip");
    bob.send_line("read 1").await.expect("read");
    bob.expect_contains("From: alice").await.expect("header");
    bob.expect_contains("hello bob").await.expect("body");

    let bob_account = server.hub().accounts.get("bob").expect("account");
    assert_eq!(bob_account.unread_count(), 0);
}

#[tokio::test]
async fn math_repl_runs_over_the_wire() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = TestClient::connect(server.address()).await.expect("connect");
    client.register("alice", "pw").await.expect("register");

    client.send_line("eval new").await.expect("send");
    client.expect_contains(">>>").await.expect("prompt");
    client.send_line("2 + 2").await.expect("send");
    client.expect_contains("4").await.expect("result");
    client.send_line("5 -> x; x ** 2").await.expect("send");
    client.expect_contains("25").await.expect("uses binding");
    client.send_line("1 / 0").await.expect("send");
    client
        .expect_contains("ZeroDivisionError")
        .await
        .expect("error report");
    client.send_line("exit").await.expect("leave repl");
    client.send_line("eval old").await.expect("send");
    client.expect_contains("Eval:").await.expect("old prompt");
    client.send_line("2.5 * 2").await.expect("send");
    client.expect_contains("5.0").await.expect("float result");
    client.send_line("exit").await.expect("leave repl");
    client.send_line("help").await.expect("send");
    client
        .expect_contains("Command list:")
        .await
        .expect("back at the inside menu");
}
