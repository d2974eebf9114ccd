//! Concrete adapters for the domain ports.

pub mod clock;
pub mod events;
pub mod in_memory;
pub mod signer;
