//! Profile repository (`app.profile`) and its [`ProfileStore`] adapter.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use handset_core::session::{LoginDetails, NewProfile, Profile, ProfileStore, StoreError};
use handset_core::{Email, Role, UserId};

use super::RepositoryError;

/// Conflict message for a unique violation on `profile_email_key`.
const EMAIL_IN_USE: &str = "email already in use";
const EMAIL_INDEX: &str = "profile_email_key";

/// Tell an email clash apart from a duplicate id.
fn profile_conflict(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let message = if db_err.constraint() == Some(EMAIL_INDEX) {
            EMAIL_IN_USE
        } else {
            "profile already exists"
        };
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    email: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::from_uuid(row.id),
            email,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            role: Role::from_stored(&row.role),
            is_active: row.is_active,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

const PROFILE_COLUMNS: &str =
    "id, email, full_name, avatar_url, role, is_active, created_at, last_login_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for profile database operations.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM app.profile WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM app.profile WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_with_role(&self, role: Role) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app.profile WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Insert a first-login profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the id or email already exists.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, profile: &NewProfile) -> Result<Profile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r"
            INSERT INTO app.profile (id, email, full_name, avatar_url, role, last_login_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(profile.id)
        .bind(profile.email.as_str())
        .bind(profile.full_name.as_deref())
        .bind(profile.avatar_url.as_deref())
        .bind(profile.role.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(profile_conflict)?;

        row.try_into()
    }

    /// Refresh provider-owned fields and stamp the login time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile doesn't exist.
    /// Returns `RepositoryError::Conflict` if another profile has the new email.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_login(
        &self,
        id: UserId,
        details: &LoginDetails,
    ) -> Result<Profile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r"
            UPDATE app.profile
            SET email = $2, full_name = $3, avatar_url = $4,
                last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(details.email.as_str())
        .bind(details.full_name.as_deref())
        .bind(details.avatar_url.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::conflict_on_unique(EMAIL_IN_USE))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<Profile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r"
            UPDATE app.profile SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// All profiles, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_all(&self) -> Result<Vec<Profile>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM app.profile ORDER BY created_at ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// =============================================================================
// ProfileStore adapter
// =============================================================================

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::DataCorruption(msg) => Self::Corrupt(msg),
            RepositoryError::Database(e) => Self::Unavailable(e.to_string()),
            RepositoryError::Conflict(msg) if msg == EMAIL_IN_USE => Self::EmailTaken,
            RepositoryError::Conflict(msg) => Self::Unavailable(msg),
        }
    }
}

/// [`ProfileStore`] backed by `app.profile`.
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> ProfileRepository<'_> {
        ProfileRepository::new(&self.pool)
    }
}

impl ProfileStore for PgProfileStore {
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.repo().get_by_id(id).await?)
    }

    async fn count_with_role(&self, role: Role) -> Result<u64, StoreError> {
        let count = self.repo().count_with_role(role).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        Ok(self.repo().create(&profile).await?)
    }

    async fn record_login(&self, id: UserId, details: &LoginDetails) -> Result<Profile, StoreError> {
        Ok(self.repo().record_login(id, details).await?)
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<Profile, StoreError> {
        Ok(self.repo().set_role(id, role).await?)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        Ok(self.repo().list_all().await?)
    }
}
