//! Staff dashboard.
//!
//! Every page takes a [`DashboardShell`], which requires `dashboard:view`, and
//! a [`RequirePermission`](crate::middleware::RequirePermission) for its own
//! area. The sidebar only lists areas the signed-in role can open.
//!
//! ```text
//! GET  /dashboard                              overview          dashboard:view
//! GET  /dashboard/products                     product list      products:read
//! GET  /dashboard/products/new                 new form          products:write
//! POST /dashboard/products                     create            products:write
//! GET  /dashboard/products/{id}/edit           edit form         products:write
//! POST /dashboard/products/{id}                update            products:write
//! POST /dashboard/products/{id}/delete         delete            products:write
//! GET  /dashboard/categories                   list + form       products:write
//! POST /dashboard/categories                   create            products:write
//! POST /dashboard/categories/{id}/delete       delete            products:write
//! GET  /dashboard/orders                       order list        orders:read
//! GET  /dashboard/orders/{id}                  order detail      orders:read
//! POST /dashboard/orders/{id}/status           change status     orders:write
//! GET  /dashboard/orders/{id}/invoice.pdf      invoice           orders:read
//! POST /dashboard/api/orders/{id}/status       change status     orders:write (JSON)
//! GET  /dashboard/posts                        post list         blog:write
//! GET  /dashboard/posts/new, POST /dashboard/posts
//! GET  /dashboard/posts/{id}/edit, POST /dashboard/posts/{id}, POST /dashboard/posts/{id}/delete
//! GET  /dashboard/pages                        page list         content:write
//! GET  /dashboard/pages/{slug}, POST /dashboard/pages/{slug}
//! GET  /dashboard/messages                     inbox             messages:read
//! POST /dashboard/messages/{id}/read           mark read/unread  messages:read
//! GET  /dashboard/seo/meta, POST /dashboard/seo/meta, POST /dashboard/seo/meta/{id}/delete
//! GET  /dashboard/seo/keywords, POST /dashboard/seo/keywords, POST /dashboard/seo/keywords/{id}/delete
//! POST /dashboard/api/seo/keywords/{id}/rank   record rank       seo:write (JSON)
//! GET  /dashboard/seo/schema, POST /dashboard/seo/schema, POST /dashboard/seo/schema/{id}/delete
//! GET  /dashboard/users                        user list         admin
//! POST /dashboard/users/{id}/role              change role       admin
//! ```

pub mod categories;
pub mod messages;
pub mod orders;
pub mod overview;
pub mod pages;
pub mod posts;
pub mod products;
pub mod seo;
pub mod users;

use axum::{
    Router,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
};
use tower_sessions::Session;

use handset_core::session::Permission;

use crate::error::AppError;
use crate::middleware::{AccessDenied, CspNonce, GuardRejection, RequestSession, request_uri};
use crate::state::AppState;
use crate::views::take_flash;

/// A sidebar entry.
#[derive(Clone, Debug)]
pub struct NavItem {
    pub href: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// Sidebar entries and the permission each needs.
const NAV: &[(&str, &str, Permission)] = &[
    ("/dashboard", "Overview", Permission::DashboardView),
    ("/dashboard/products", "Products", Permission::ProductsRead),
    ("/dashboard/categories", "Categories", Permission::ProductsWrite),
    ("/dashboard/orders", "Orders", Permission::OrdersRead),
    ("/dashboard/posts", "Blog", Permission::BlogWrite),
    ("/dashboard/pages", "Pages", Permission::ContentWrite),
    ("/dashboard/messages", "Messages", Permission::MessagesRead),
    ("/dashboard/seo/meta", "Meta tags", Permission::SeoRead),
    ("/dashboard/seo/keywords", "Keywords", Permission::SeoRead),
    ("/dashboard/seo/schema", "Schema", Permission::SeoRead),
    ("/dashboard/users", "Users", Permission::UsersManage),
];

fn nav_for(path: &str, granted: &[Permission]) -> Vec<NavItem> {
    NAV.iter()
        .filter(|(_, _, needs)| granted.contains(needs))
        .map(|&(href, label, _)| NavItem {
            href,
            label,
            active: if href == "/dashboard" {
                path == href
            } else {
                path.starts_with(href)
            },
        })
        .collect()
}

/// Per-request data every dashboard page needs.
pub struct DashboardShell {
    nonce: String,
    path: String,
    user_name: String,
    role: &'static str,
    nav: Vec<NavItem>,
    flash: Option<String>,
}

impl FromRequestParts<AppState> for DashboardShell {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        let resolved = RequestSession::from_request_parts(parts, state).await?;
        let resolver = resolved.resolver();

        let profile = resolver
            .require_permission(Permission::DashboardView)
            .await
            .into_result()
            .map_err(|denial| GuardRejection::Denied(AccessDenied::from_parts(denial, parts)))?;
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;

        let path = request_uri(parts).path().to_owned();
        Ok(Self {
            nonce,
            nav: nav_for(&path, &resolver.permissions().await),
            path,
            user_name: profile.display_name().to_owned(),
            role: profile.role.label(),
            flash: take_flash(&session).await,
        })
    }
}

impl DashboardShell {
    #[must_use]
    pub fn layout(self, state: &AppState, title: impl Into<String>) -> DashboardLayout {
        let title = title.into();
        DashboardLayout {
            site_name: state.config().site_name.clone(),
            page_title: format!("{title} | Dashboard"),
            title,
            nonce: self.nonce,
            path: self.path,
            user_name: self.user_name,
            role: self.role,
            nav: self.nav,
            flash: self.flash,
        }
    }
}

/// Everything `dashboard/base.html` renders outside the page body.
pub struct DashboardLayout {
    pub site_name: String,
    pub title: String,
    pub page_title: String,
    pub nonce: String,
    pub path: String,
    pub user_name: String,
    pub role: &'static str,
    pub nav: Vec<NavItem>,
    pub flash: Option<String>,
}

/// `<select>` option for dashboard forms.
#[derive(Clone, Debug)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            selected,
        }
    }
}

/// Create the dashboard router, mounted at `/dashboard`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(overview::index))
        // Catalog
        .route("/products", get(products::index).post(products::create))
        .route("/products/new", get(products::new))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit))
        .route("/products/{id}/delete", post(products::delete))
        .route("/categories", get(categories::index).post(categories::create))
        .route("/categories/{id}/delete", post(categories::delete))
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/orders/{id}/invoice.pdf", get(orders::invoice))
        .route("/api/orders/{id}/status", post(orders::api_update_status))
        // Content
        .route("/posts", get(posts::index).post(posts::create))
        .route("/posts/new", get(posts::new))
        .route("/posts/{id}", post(posts::update))
        .route("/posts/{id}/edit", get(posts::edit))
        .route("/posts/{id}/delete", post(posts::delete))
        .route("/pages", get(pages::index))
        .route("/pages/{slug}", get(pages::edit).post(pages::update))
        .route("/messages", get(messages::index))
        .route("/messages/{id}/read", post(messages::mark_read))
        // SEO
        .route("/seo/meta", get(seo::meta_index).post(seo::meta_save))
        .route("/seo/meta/{id}/delete", post(seo::meta_delete))
        .route("/seo/keywords", get(seo::keywords_index).post(seo::keyword_create))
        .route("/seo/keywords/{id}/delete", post(seo::keyword_delete))
        .route("/api/seo/keywords/{id}/rank", post(seo::api_record_rank))
        .route("/seo/schema", get(seo::schema_index).post(seo::schema_create))
        .route("/seo/schema/{id}/delete", post(seo::schema_delete))
        // Users
        .route("/users", get(users::index))
        .route("/users/{id}/role", post(users::update_role))
}

#[cfg(test)]
mod tests {
    use handset_core::session::PermissionTable;
    use handset_core::Role;

    use super::*;

    fn labels(role: Role, path: &str) -> Vec<&'static str> {
        let table = PermissionTable::standard();
        nav_for(path, &table.permissions_for(role))
            .into_iter()
            .map(|item| item.label)
            .collect()
    }

    #[test]
    fn test_seo_manager_nav() {
        assert_eq!(
            labels(Role::SeoManager, "/dashboard"),
            vec!["Overview", "Products", "Blog", "Pages", "Meta tags", "Keywords", "Schema"]
        );
    }

    #[test]
    fn test_editor_nav_has_no_seo_or_users() {
        let nav = labels(Role::Editor, "/dashboard");
        assert!(nav.contains(&"Orders"));
        assert!(nav.contains(&"Messages"));
        assert!(!nav.contains(&"Meta tags"));
        assert!(!nav.contains(&"Users"));
    }

    #[test]
    fn test_active_item() {
        let table = PermissionTable::standard();
        let nav = nav_for("/dashboard/orders/4", &table.permissions_for(Role::Admin));
        let active: Vec<_> = nav.iter().filter(|i| i.active).map(|i| i.label).collect();
        assert_eq!(active, vec!["Orders"]);
    }
}
