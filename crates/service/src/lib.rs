//! Core identity and catalog services for the library backend.
//! - Credential registration/verification and token issuance over a
//!   pluggable credential store.
//! - Uniqueness-guarded, cache-coherent book writes over a pluggable
//!   catalog store.
//! - Every write runs inside one unit-of-work transaction; every store call
//!   takes a cancellation token.
//! An HTTP adapter is expected to sit on top of this crate; nothing here
//! knows about transports or status codes.

pub mod cache;
pub mod catalog;
pub mod domain;
pub mod errors;
pub mod identity;
pub mod password;
pub mod store;
pub mod token;
pub mod validation;

#[cfg(test)]
pub mod test_support;
