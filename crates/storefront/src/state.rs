//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use handset_core::session::PermissionTable;

use crate::config::StorefrontConfig;
use crate::content::{ContentError, FallbackPages};
use crate::db::{PgCatalog, PgProfileStore};
use crate::middleware::VisitorLocks;
use crate::services::auth::OAuthClient;
use crate::services::seo::SeoService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    permissions: Arc<PermissionTable>,
    oauth: OAuthClient,
    seo: SeoService,
    pages: FallbackPages,
    visitor_locks: VisitorLocks,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback content directory exists but can't be read.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, ContentError> {
        let pages = FallbackPages::load(&config.content_dir)?;
        Ok(Self::with_pages(config, pool, pages))
    }

    /// Build state around already-loaded fallback pages.
    #[must_use]
    pub fn with_pages(config: StorefrontConfig, pool: PgPool, pages: FallbackPages) -> Self {
        let oauth = OAuthClient::new(&config.oauth, &config.base_url);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                permissions: Arc::new(PermissionTable::standard()),
                oauth,
                seo: SeoService::new(),
                pages,
                visitor_locks: VisitorLocks::default(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The role → permission table, built once at startup.
    #[must_use]
    pub fn permissions(&self) -> &Arc<PermissionTable> {
        &self.inner.permissions
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.inner.oauth
    }

    #[must_use]
    pub fn seo(&self) -> &SeoService {
        &self.inner.seo
    }

    #[must_use]
    pub fn fallback_pages(&self) -> &FallbackPages {
        &self.inner.pages
    }

    /// Profile store adapter for the session resolver.
    #[must_use]
    pub fn profile_store(&self) -> PgProfileStore {
        PgProfileStore::new(self.inner.pool.clone())
    }

    /// Per-session locks shared by every cart and favourites request.
    #[must_use]
    pub fn visitor_locks(&self) -> &VisitorLocks {
        &self.inner.visitor_locks
    }

    /// Published-catalog adapter for cart reconciliation.
    #[must_use]
    pub fn catalog(&self) -> PgCatalog {
        PgCatalog::new(self.inner.pool.clone())
    }
}
