//! End-to-end flows over the core stores with in-memory adapters.
//!
//! These run without a database or server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use handset_core::cart::memory::{MemoryCatalog, MemoryStorage};
use handset_core::cart::{CartStore, CatalogProduct, FavouritesStore, LineItem};
use handset_core::session::memory::{MemoryProfileStore, StaticIdentity};
use handset_core::session::{
    Access, Denial, Identity, Permission, PermissionTable, SessionResolver, change_role,
    record_login,
};
use handset_core::{Email, ProductId, Role, UserId};

fn product(id: i32, price: i64, compare_at: Option<i64>, on_sale: bool) -> CatalogProduct {
    CatalogProduct {
        id: ProductId::new(id),
        title: format!("Phone {id}"),
        slug: format!("phone-{id}"),
        price: Decimal::new(price, 0),
        compare_at_price: compare_at.map(|c| Decimal::new(c, 0)),
        on_sale,
        featured_image: None,
    }
}

fn identity(sub: &str, email: &str) -> Identity {
    Identity {
        id: UserId::from_subject("https://id.example.com", sub),
        email: Email::parse(email).unwrap(),
        full_name: None,
        avatar_url: None,
    }
}

#[tokio::test]
async fn test_cart_survives_reload_and_picks_up_price_changes() {
    let storage = MemoryStorage::default();
    let before = MemoryCatalog::with(vec![product(1, 799, None, false), product(2, 29, None, false)]);
    let cart = CartStore::new(storage.clone(), before, Duration::from_secs(1));
    assert!(cart.hydrate().await.is_empty());

    cart.add_item(LineItem::from_product(&product(1, 799, None, false))).await;
    cart.add_item(LineItem::from_product(&product(1, 799, None, false))).await;
    cart.add_item(LineItem::from_product(&product(2, 29, None, false))).await;
    assert_eq!(cart.count().await, 3);
    assert_eq!(cart.total().await, Decimal::new(1627, 0));

    // Product 1 goes on sale and product 2 is unpublished before the next visit.
    let after = MemoryCatalog::with(vec![product(1, 699, Some(799), true)]);
    let reloaded = CartStore::new(storage, after, Duration::from_secs(1));
    let items = reloaded.hydrate().await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, ProductId::new(1));
    assert_eq!(items[0].quantity.get(), 2);
    assert_eq!(reloaded.total().await, Decimal::new(1398, 0));
}

#[tokio::test]
async fn test_cart_keeps_stored_lines_when_catalog_is_down() {
    let storage = MemoryStorage::default();
    let cart = CartStore::new(
        storage.clone(),
        MemoryCatalog::with(vec![product(4, 379, None, false)]),
        Duration::from_secs(1),
    );
    cart.hydrate().await;
    cart.add_item(LineItem::from_product(&product(4, 379, None, false))).await;

    let offline = CartStore::new(storage, MemoryCatalog::failing(), Duration::from_secs(1));
    let items = offline.hydrate().await;
    assert_eq!(items.len(), 1);
    assert_eq!(offline.count().await, 1);
}

#[tokio::test]
async fn test_favourites_are_shared_across_store_instances() {
    let storage = MemoryStorage::default();
    let first = FavouritesStore::new(storage.clone());
    assert!(first.toggle(ProductId::new(7)).await);
    assert!(first.toggle(ProductId::new(8)).await);
    assert!(!first.toggle(ProductId::new(7)).await);

    let second = FavouritesStore::new(storage);
    assert_eq!(second.ids().await, vec![ProductId::new(8)]);
}

#[tokio::test]
async fn test_first_login_becomes_admin_and_can_promote_others() {
    let profiles = MemoryProfileStore::default();
    let permissions = Arc::new(PermissionTable::standard());

    let owner = record_login(&profiles, &identity("owner", "owner@example.com")).await.unwrap();
    let writer = record_login(&profiles, &identity("writer", "writer@example.com")).await.unwrap();
    assert_eq!(owner.role, Role::Admin);
    assert_eq!(writer.role, Role::Editor);

    let writer_session = SessionResolver::new(
        StaticIdentity::new(Some(identity("writer", "writer@example.com"))),
        profiles.clone(),
        Arc::clone(&permissions),
    );
    assert!(writer_session.has_permission(Permission::BlogWrite).await);
    assert!(!writer_session.has_permission(Permission::UsersManage).await);
    assert!(matches!(
        writer_session.require_role(&[Role::Admin]).await,
        Access::Denied(Denial::Forbidden)
    ));

    let promoted = change_role(&profiles, &owner, writer.id, "seo_manager").await.unwrap();
    assert_eq!(promoted.role, Role::SeoManager);

    let refusal = change_role(&profiles, &owner, owner.id, "customer").await.unwrap_err();
    assert_eq!(refusal.error, "You cannot change your own role");
}

#[tokio::test]
async fn test_signed_out_visitor_is_unauthenticated() {
    let session = SessionResolver::new(
        StaticIdentity::new(None),
        MemoryProfileStore::default(),
        Arc::new(PermissionTable::standard()),
    );
    assert!(session.current_user().await.is_none());
    assert!(matches!(
        session.require_permission(Permission::DashboardView).await,
        Access::Denied(Denial::Unauthenticated)
    ));
}
