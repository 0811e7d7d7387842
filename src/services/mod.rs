//! Application services.
//!
//! Logic that spans several tables or touches the filesystem, kept out of
//! the handlers so it can be tested against a plain connection.

pub mod calculator;
pub mod migrations;
