//! Library interface of the clawdhub CLI, exposed for integration tests.

pub mod client;
pub mod commands;
pub mod config;
pub mod lockfile;
pub mod plan;
pub mod scan;
