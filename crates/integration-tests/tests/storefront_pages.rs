//! Public pages against a running storefront.
//!
//! These tests require:
//! - A migrated and seeded `PostgreSQL` database (`handset migrate && handset seed`)
//! - The storefront running (`cargo run -p handset-storefront`)
//!
//! Run with: cargo test -p handset-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;

use handset_integration_tests::{client, storefront_url};

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_health_and_readiness() {
    let base = storefront_url();
    let client = client();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = client.get(format!("{base}/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_pages_carry_security_headers() {
    let resp = client().get(format!("{}/", storefront_url())).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let headers = resp.headers();
    let csp = headers
        .get("content-security-policy")
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(csp.contains("script-src 'self' 'nonce-"));
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");

    let body = resp.text().await.unwrap();
    assert!(body.contains("<title>"));
}

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_product_listing_filters_and_sorts() {
    let base = storefront_url();
    let client = client();

    for query in ["", "?q=pixel", "?sort=price_asc", "?brand=Google&page=1", "?sort=bogus"] {
        let resp = client
            .get(format!("{base}/products{query}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "GET /products{query}");
    }

    let resp = client.get(format!("{base}/products/pixel-9")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("Pixel 9"));

    let resp = client
        .get(format!("{base}/products/fairphone-6"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND, "drafts stay hidden");
}

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_sitemap_and_robots() {
    let base = storefront_url();
    let client = client();

    let resp = client.get(format!("{base}/sitemap.xml")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<?xml"));
    assert!(body.contains("/products/pixel-9</loc>"));
    assert!(!body.contains("fairphone-6"));

    let resp = client.get(format!("{base}/robots.txt")).send().await.unwrap();
    let body = resp.text().await.unwrap();
    assert!(body.contains("Disallow: /dashboard"));
    assert!(body.contains("Sitemap: "));
}

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_contact_form_rerenders_with_error() {
    let resp = client()
        .post(format!("{}/contact", storefront_url()))
        .form(&[("name", "Sam"), ("email", "sam@example.com"), ("message", "hi")])
        .send()
        .await
        .unwrap();
    // Invalid input re-renders the form instead of redirecting.
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("Message must be 10 to 5000 characters"));
}
