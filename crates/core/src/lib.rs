//! Handset Core - domain types and the two stateful components shared by
//! every Handset binary.
//!
//! - [`types`] - ids, money, email, slugs, statuses and roles
//! - [`session`] - the per-request session/role resolver and role administration
//! - [`cart`] - the client-persisted cart and favourites stores
//!
//! # Architecture
//!
//! Nothing in this crate talks to a database, an HTTP client or a cookie jar
//! directly. Every side effect goes through a port trait
//! ([`session::IdentityProvider`], [`session::ProfileStore`],
//! [`cart::ClientStorage`], [`cart::Catalog`]) implemented by the web crate,
//! which keeps the stores testable with the in-memory adapters shipped here.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod session;
pub mod types;

pub use types::*;
