//! End-to-end tests for channel rooms: fan-out, moderation, replay.

mod common;

use common::{TestClient, TestServer};

#[tokio::test]
async fn messages_fan_out_to_every_member_including_the_sender() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");
    alice.open_channel_fresh("room1").await.expect("open room");

    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");
    bob.send_line("channel room1").await.expect("join");
    bob.expect_contains("2 people are connected.")
        .await
        .expect("member count");

    // join events reach the existing members but not the sender
    alice
        .expect_contains("[EVENT] bob is joining.")
        .await
        .expect("join event");

    alice.send_line("hello world").await.expect("chat");
    let echoed = alice.expect_contains("hello world").await.expect("echo");
    assert_eq!(echoed, "[alice] hello world");
    let received = bob.expect_contains("hello world").await.expect("fan-out");
    assert_eq!(received, "[alice] hello world");

    let room = server.hub().channels.open_or_create("room1", "alice");
    assert_eq!(room.buffer_len(), 1);
    assert_eq!(room.member_count(), 2);
}

#[tokio::test]
async fn replay_shows_recent_history_on_rejoin() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");
    alice.open_channel_fresh("room1").await.expect("open room");

    alice.send_line("one").await.expect("chat");
    alice.send_line("two").await.expect("chat");
    alice.expect_contains("[alice] two").await.expect("echo");
    alice.send_line(":exit").await.expect("leave");
    alice
        .expect_contains("new message")
        .await
        .expect("back in the inside menu");

    alice.send_line("channel room1").await.expect("rejoin");
    alice.expect_contains("[alice] one").await.expect("replay");
    alice.expect_contains("[alice] two").await.expect("replay");
    alice
        .expect_contains("1 person is connected.")
        .await
        .expect("member count");
}

#[tokio::test]
async fn admin_close_kicks_members_on_their_next_read_turn() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");
    alice.open_channel_fresh("room1").await.expect("open room");

    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");
    bob.send_line("channel room1").await.expect("join");
    bob.expect_contains("2 people are connected.")
        .await
        .expect("member count");

    alice.send_line(":admin").await.expect("takeover");
    alice
        .expect_contains("Opening admin console ...")
        .await
        .expect("console");
    alice.send_line("close").await.expect("close");
    alice
        .expect_contains("Everyone has been kicked off the channel.")
        .await
        .expect("confirmation");

    // the mark is observed on bob's next read turn
    bob.send_line("still here?").await.expect("read turn");
    bob.expect_contains("You have been kicked out of this channel.")
        .await
        .expect("kick notice");
    bob.expect_contains("new message")
        .await
        .expect("back in the inside menu");

    // leaving the console reconnects alice to the room
    alice.send_line("exit").await.expect("leave console");
    alice
        .expect_contains("1 person is connected.")
        .await
        .expect("alone again");
}

#[tokio::test]
async fn banned_names_bounce_at_the_door() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");

    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");

    alice.open_channel_fresh("room1").await.expect("open room");
    alice.send_line(":ban add bob").await.expect("ban");
    alice
        .expect_contains("bob has been banned.")
        .await
        .expect("confirmation");

    bob.send_line("channel room1").await.expect("join attempt");
    bob.expect_contains("You have been banned from this channel.")
        .await
        .expect("bounced");
    bob.expect_contains("new message")
        .await
        .expect("back in the inside menu");
}

#[tokio::test]
async fn password_gate_rejects_wrong_answers() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");
    alice.send_line("channel sanctum").await.expect("create");
    alice
        .expect_contains("Password protect this channel?")
        .await
        .expect("wizard");
    alice.send_line("yes").await.expect("answer");
    alice.expect_contains("Set password to:").await.expect("prompt");
    alice.send_line("sesame").await.expect("password");
    alice.expect_contains("buffer size?").await.expect("wizard");
    alice.send_line("no").await.expect("answer");
    alice.expect_contains("replay size?").await.expect("wizard");
    alice.send_line("no").await.expect("answer");
    alice.expect_contains("connected.").await.expect("inside");

    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");
    bob.send_line("channel sanctum").await.expect("join");
    bob.expect_contains("Password to connect:")
        .await
        .expect("gate");
    bob.send_line("wrong").await.expect("answer");
    bob.expect_contains("You have failed authentication.")
        .await
        .expect("rejected");

    bob.send_line("channel sanctum").await.expect("join again");
    bob.expect_contains("Password to connect:")
        .await
        .expect("gate");
    bob.send_line("sesame").await.expect("answer");
    bob.expect_contains("2 people are connected.")
        .await
        .expect("admitted");
}

#[tokio::test]
async fn whisper_to_a_muting_recipient_falls_back_to_inbox() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");
    alice.open_channel_fresh("room1").await.expect("open room");

    let mut bob = TestClient::connect(server.address()).await.expect("connect");
    bob.register("bob", "pw").await.expect("register");
    bob.send_line("channel room1").await.expect("join");
    bob.expect_contains("2 people are connected.")
        .await
        .expect("member count");

    bob.send_line(":mute add alice").await.expect("mute");
    bob.expect_contains("alice has been muted.")
        .await
        .expect("confirmation");

    // muted chat never reaches bob, and the whisper detours to his inbox
    alice.send_line(":whisper bob").await.expect("whisper");
    alice.expect_contains("Message:").await.expect("prompt");
    alice.send_line("psst").await.expect("text");
    alice.expect_contains("Message sent.").await.expect("sent");

    bob.expect_contains("[EVENT] alice has sent you a message.")
        .await
        .expect("inbox event");
    let bob_account = server.hub().accounts.get("bob").expect("account");
    assert_eq!(bob_account.unread_count(), 1);
    assert_eq!(bob_account.messages()[0].body, "psst");
}

#[tokio::test]
async fn finalize_unregisters_the_channel_name() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.address()).await.expect("connect");
    alice.register("alice", "pw").await.expect("register");
    alice.open_channel_fresh("doomed").await.expect("open room");

    alice.send_line(":admin").await.expect("takeover");
    alice
        .expect_contains("Opening admin console ...")
        .await
        .expect("console");
    alice.send_line("finalize").await.expect("finalize");
    alice
        .expect_contains("The channel has been finalized.")
        .await
        .expect("confirmation");
    alice
        .expect_contains("new message")
        .await
        .expect("back in the inside menu");

    assert!(!server.hub().channels.channel_exists("doomed"));
}
