//! Askama filters shared by the shop and dashboard layouts.
//!
//! The asset filters return the fingerprints `build.rs` computed, so
//! `base.html` links `main.<hash>.css` and `cart.<hash>.js`.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Footer copyright year: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// `{{ ""|css_hash }}`
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

/// `{{ ""|cart_js_hash }}`
#[askama::filter_fn]
pub fn cart_js_hash(
    _value: impl Display,
    _env: &dyn askama::Values,
) -> askama::Result<&'static str> {
    Ok(env!("CART_JS_HASH"))
}
