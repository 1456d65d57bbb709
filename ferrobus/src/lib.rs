//! An async implementation of the [Modbus](http://modbus.org/) protocol over TCP
//! using [Tokio](https://docs.rs/tokio) and Rust's `async/await` syntax.
//!
//! # Features
//!
//! * Panic-free framing and parsing
//! * Client with automatic connection management and per-request response timeouts
//! * Transaction pipelining: multiple in-flight requests per connection, matched
//!   by transaction id
//! * Server with one task per connection and a bounds-checked in-memory database
//! * Focus on correctness and compliance to the specification
//!
//! # Supported functions
//!
//! * Read Coils (`0x01`)
//! * Read Discrete Inputs (`0x02`)
//! * Read Holding Registers (`0x03`)
//! * Read Input Registers (`0x04`)
//! * Write Single Coil (`0x05`)
//! * Write Single Register (`0x06`)
//! * Write Multiple Coils (`0x0F`)
//! * Write Multiple Registers (`0x10`)
//!
//! Unsupported function codes received by the server are answered with an
//! `ILLEGAL FUNCTION` exception.

/// client API
pub mod client;
/// server API
pub mod server;

pub(crate) mod channel;
pub(crate) mod common;
pub(crate) mod tcp;

mod constants;
mod decode;
mod error;
mod exception;
mod shutdown;
mod types;

pub use crate::decode::*;
pub use crate::error::*;
pub use crate::exception::*;
pub use crate::shutdown::*;
pub use crate::types::*;
