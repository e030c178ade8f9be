//! Chain access: balances, transfers and wallet creation.

pub mod client;
pub mod keys;
pub mod memory;

pub use client::{ChainClient, Receipt};
pub use keys::{generate_keypair, KeyMaterial, Keypair};
pub use memory::InMemoryChain;
