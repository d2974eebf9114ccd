//! Domain entities and the collaborator ports the pipeline depends on.

pub mod account;
pub mod period;
pub mod ports;
pub mod rule;
pub mod transaction;
