//! Session and role resolution.
//!
//! A [`SessionResolver`] is built once per request from an
//! [`IdentityProvider`] (the request's credential) and a [`ProfileStore`]
//! (the `app.profile` table). It memoizes the identity and profile for the
//! rest of the request and answers the guard questions the routing layer
//! asks: is anyone signed in, does their role fit, do they hold a
//! permission. Guards answer with an [`Access`] value; turning a denial into
//! a redirect or a 401/403 is the caller's job.

mod access;
mod admin;
mod identity;
mod login;
pub mod memory;
mod permissions;
mod ports;
mod resolver;

pub use access::{Access, Denial};
pub use admin::{RoleChangeError, change_role};
pub use identity::{Identity, LoginDetails, NewProfile, Profile};
pub use login::{initial_role, record_login};
pub use permissions::{Permission, PermissionTable};
pub use ports::{IdentityProvider, ProfileStore, StoreError};
pub use resolver::SessionResolver;
