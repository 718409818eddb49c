//! Services that sit between handlers and the outside world.
//!
//! - `auth` - OpenID Connect sign-in (authorization code + PKCE)
//! - `invoice` - PDF invoices for orders
//! - `seo` - page meta, JSON-LD, sitemap and robots.txt

pub mod auth;
pub mod invoice;
pub mod seo;
