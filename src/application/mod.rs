//! Application layer containing the processing pipeline.
//!
//! `TransactionProcessor` is the entry point. It drives the validator, fraud
//! detector and rule engine, then routes low-risk transactions to the ledger.

pub mod fraud;
pub mod ledger;
pub mod processor;
pub mod rule_admin;
pub mod rules;
pub mod validator;
