//! Integration test common infrastructure.
//!
//! Provides a minimal fake upstream IRC server so bridge integration tests
//! can exercise the real `ircbridge` binary over loopback TCP without
//! depending on a real network.

pub mod fake_server;

pub use fake_server::FakeIrcServer;
