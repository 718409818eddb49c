//! Session cart and favourites through the HTTP surface.
//!
//! These tests require a seeded database (for a published product id) and a
//! running storefront.
//!
//! Run with: cargo test -p handset-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode, header};
use serde_json::Value;

use handset_integration_tests::{client, database, storefront_url};

async fn published_product_id() -> i32 {
    let pool = database().await.unwrap();
    sqlx::query_scalar(
        "SELECT id FROM catalog.product WHERE status = 'published' ORDER BY id LIMIT 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap()
}

async fn cart_json(client: &Client) -> Value {
    client
        .get(format!("{}/api/cart", storefront_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires running storefront and seeded database"]
async fn test_add_update_remove_round_trip() {
    let base = storefront_url();
    let client = client();
    let id = published_product_id().await.to_string();

    assert_eq!(cart_json(&client).await["count"], 0);

    for _ in 0..2 {
        let resp = client
            .post(format!("{base}/cart/add"))
            .form(&[("product_id", id.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }
    let cart = cart_json(&client).await;
    assert_eq!(cart["count"], 2);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);

    client
        .post(format!("{base}/cart/update"))
        .form(&[("product_id", id.as_str()), ("quantity", "5")])
        .send()
        .await
        .unwrap();
    assert_eq!(cart_json(&client).await["count"], 5);

    client
        .post(format!("{base}/cart/update"))
        .form(&[("product_id", id.as_str()), ("quantity", "0")])
        .send()
        .await
        .unwrap();
    assert_eq!(cart_json(&client).await["count"], 0);
}

#[tokio::test]
#[ignore = "requires running storefront and seeded database"]
async fn test_unknown_product_is_not_added() {
    let client = client();
    client
        .post(format!("{}/cart/add", storefront_url()))
        .form(&[("product_id", "999999")])
        .send()
        .await
        .unwrap();
    assert_eq!(cart_json(&client).await["count"], 0);
}

#[tokio::test]
#[ignore = "requires running storefront and seeded database"]
async fn test_checkout_with_empty_cart_needs_sign_in_first() {
    let resp = client()
        .get(format!("{}/checkout", storefront_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(
        resp.headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("/auth/login")
    );
}

#[tokio::test]
#[ignore = "requires running storefront and seeded database"]
async fn test_favourite_toggle() {
    let base = storefront_url();
    let client = client();
    let id = published_product_id().await;

    client
        .post(format!("{base}/favourites/toggle"))
        .form(&[("product_id", id.to_string())])
        .send()
        .await
        .unwrap();

    let favourites: Value = client
        .get(format!("{base}/api/favourites"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(favourites["ids"], serde_json::json!([id]));
}

#[tokio::test]
#[ignore = "requires running storefront and seeded database"]
async fn test_overlapping_adds_on_one_session_all_count() {
    let base = storefront_url();
    let client = client();
    let id = published_product_id().await.to_string();

    // The first add creates the session cookie the others share.
    client
        .post(format!("{base}/cart/add"))
        .form(&[("product_id", id.as_str())])
        .send()
        .await
        .unwrap();

    let add = || {
        client
            .post(format!("{base}/cart/add"))
            .form(&[("product_id", id.as_str())])
            .send()
    };
    let (a, b, c) = tokio::join!(add(), add(), add());
    for resp in [a, b, c] {
        assert_eq!(resp.unwrap().status(), StatusCode::SEE_OTHER);
    }

    assert_eq!(cart_json(&client).await["count"], 4);
}
