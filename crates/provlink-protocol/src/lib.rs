//! # provlink-protocol
//!
//! Wire-format handling for the captive-portal services.
//!
//! This crate is pure: DNS answer synthesis and HTTP request/response
//! handling operate on byte buffers and strings, with no sockets or
//! async code, so both can be tested without I/O.

pub mod dns;
pub mod http;

pub use http::{Method, Request};
