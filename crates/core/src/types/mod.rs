//! Core types for Handset.
//!
//! Type-safe wrappers for the domain concepts shared by the storefront,
//! dashboard and CLI.

pub mod email;
pub mod id;
pub mod money;
pub mod role;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Currency, Money};
pub use role::{Role, RoleParseError};
pub use slug::{Slug, SlugError};
pub use status::*;
