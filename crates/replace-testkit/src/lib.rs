//! Replace Testkit
//!
//! In-memory stand-ins for everything a replacement run touches: a message
//! network, per-node transaction stores, a notary with double-spend
//! detection and a node type implementing every effect trait. Scenario tests
//! build a [`TestNetwork`], create nodes and notaries on it and issue states
//! for them to replace.
//!
//! ```rust,no_run
//! use replace_testkit::*;
//!
//! # async fn demo() -> replace_core::Result<()> {
//! let net = TestNetwork::new();
//! let alice = net.create_node("alice");
//! let bob = net.create_node("bob");
//! let notary = net.create_notary("notary");
//! let state = net.issue_state(&[&alice, &bob], notary.party(), b"100").await?;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![forbid(unsafe_code)]

pub mod directory;
pub mod fixtures;
pub mod network;
pub mod node;
pub mod notary;
pub mod store;

pub use directory::Directory;
pub use fixtures::{TestNetwork, TEST_CONTRACT};
pub use network::{InMemoryNetwork, SentMessage};
pub use node::MockNode;
pub use notary::MockNotary;
pub use store::MemoryTransactionStore;

use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG`; later calls are no-ops
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
