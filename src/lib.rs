//! kvcontract - A test bench for Redis-compatible key-value servers
//!
//! kvcontract checks a server under test against its command contract, measures its
//! latency next to a reference server and drives sustained load against it.
//! It is designed with strong cohesion and loose coupling principles:
//! - Each module has a single, well-defined responsibility
//! - Modules communicate through clear, minimal interfaces
//! - No circular dependencies between modules

pub mod protocol;
pub mod error;
pub mod commands;
pub mod client;
pub mod config;
pub mod dataset;
pub mod contract;
pub mod bench;
pub mod load;

/// Re-export commonly used types
pub use protocol::{ProtocolVersion, RespValue, RespError};
pub use error::ClientError;
pub use commands::Command;
pub use client::{Client, Connection, Subscriber};
pub use config::{Config, Endpoint};
pub use contract::{Case, ContractSuite, SuiteReport};
pub use bench::{Benchmark, BenchReport};
pub use load::{LoadRunner, LoadSummary};
