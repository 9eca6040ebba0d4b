//! # Carmine Common
//!
//! Shared protocol types for the Carmine server and tooling: the typed
//! reply model with its RESP2 wire encoding, the command error
//! catalogue, and numeric parsing/formatting helpers.

mod error;
mod num;
mod reply;

pub use error::CommandError;
pub use num::{format_float, parse_float, parse_int};
pub use reply::Reply;
