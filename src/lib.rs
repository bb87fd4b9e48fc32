//! Library crate for world-probe: TCP reachability probing of game-world servers.
pub mod prober;
pub mod publish;
pub mod registry;
pub mod scanner;
pub mod server;
pub mod types;
