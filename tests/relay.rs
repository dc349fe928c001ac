//! Black-box relay test: runs the real `ircbridge` binary against two fake
//! upstream servers and checks that a channel message on one network is
//! relayed to the other.

mod common;

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use common::FakeIrcServer;

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[tokio::test]
async fn channel_message_relays_between_two_networks() {
    let mut server_a = FakeIrcServer::spawn().await;
    let mut server_b = FakeIrcServer::spawn().await;

    let config_dir = tempfile::tempdir().expect("tempdir");
    let config = format!(
        r#"
version = 1

[[network]]
name = "a"
server = [{{ host = "127.0.0.1", port = {port_a} }}]

[[network]]
name = "b"
server = [{{ host = "127.0.0.1", port = {port_b} }}]

[[bot]]
network = "a"
nickname = "bridge_a"

[[bot]]
network = "b"
nickname = "bridge_b"

[[pipe]]
network = ["a", "b"]
channel = "#x"
weight = 1
"#,
        port_a = server_a.port,
        port_b = server_b.port,
    );
    std::fs::write(config_dir.path().join("bridge.toml"), config).expect("write config");

    let child = Command::new(env!("CARGO_BIN_EXE_ircbridge"))
        .arg("bridge")
        .current_dir(config_dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn ircbridge");
    let _guard = ChildGuard(child);

    // Weight sync should bring each bot into #x on its own network.
    let joined_a = server_a.recv_matching("JOIN #x", Duration::from_secs(15)).await;
    assert!(joined_a.is_some(), "bridge did not join #x on network a");
    let joined_b = server_b.recv_matching("JOIN #x", Duration::from_secs(15)).await;
    assert!(joined_b.is_some(), "bridge did not join #x on network b");

    server_a.send(":alice!u@h PRIVMSG #x :hello from a");
    let relayed = server_b.recv_matching("hello from a", Duration::from_secs(15)).await;
    assert!(relayed.is_some(), "message from network a was not relayed to network b");
    assert!(relayed.unwrap().contains("< alice>"));
}
