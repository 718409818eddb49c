//! Sign-in and role guards against a running storefront.
//!
//! Run with: cargo test -p handset-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::{StatusCode, header};
use serde_json::Value;

use handset_integration_tests::{client, storefront_url};

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_anonymous_dashboard_visit_redirects_to_login() {
    let base = storefront_url();
    let client = client();

    for (path, encoded) in [
        ("/dashboard", "%2Fdashboard"),
        ("/dashboard/products", "%2Fdashboard%2Fproducts"),
        ("/account/orders", "%2Faccount%2Forders"),
        ("/checkout", "%2Fcheckout"),
    ] {
        let resp = client.get(format!("{base}{path}")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "GET {path}");
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            &format!("/auth/login?return_to={encoded}"),
        );
    }
}

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_dashboard_api_answers_json_when_signed_out() {
    let resp = client()
        .post(format!("{}/dashboard/api/orders/1/status", storefront_url()))
        .json(&serde_json::json!({ "status": "shipped" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_login_page_and_logout() {
    let base = storefront_url();
    let client = client();

    let resp = client
        .get(format!("{base}/auth/login?return_to=%2Faccount"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.post(format!("{base}/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
#[ignore = "requires running storefront"]
async fn test_unauthorized_page_renders() {
    let resp = client()
        .get(format!("{}/unauthorized", storefront_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
