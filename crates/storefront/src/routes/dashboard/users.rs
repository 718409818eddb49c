//! User administration: list profiles and change roles (admins only).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use handset_core::session::{Profile, change_role};
use handset_core::{Role, UserId};

use crate::db::ProfileRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::{AdminOnly, RequireRole};
use crate::state::AppState;
use crate::views::{date_time, set_flash, short_date};

use super::{DashboardLayout, DashboardShell, SelectOption};

#[derive(Clone, Debug)]
pub struct UserRowView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    pub roles: Vec<SelectOption>,
    pub is_self: bool,
    pub is_active: bool,
    pub joined_on: String,
    pub last_login: String,
}

impl UserRowView {
    fn new(profile: &Profile, actor: &Profile) -> Self {
        Self {
            id: profile.id.to_string(),
            name: profile.display_name().to_owned(),
            email: profile.email.as_str().to_owned(),
            role: profile.role.label(),
            roles: Role::ALL
                .iter()
                .map(|r| SelectOption::new(r.as_str(), r.label(), *r == profile.role))
                .collect(),
            is_self: profile.id == actor.id,
            is_active: profile.is_active,
            joined_on: short_date(&profile.created_at),
            last_login: profile
                .last_login_at
                .as_ref()
                .map_or_else(|| "Never".to_owned(), date_time),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/users.html")]
pub struct UsersTemplate {
    pub layout: DashboardLayout,
    pub users: Vec<UserRowView>,
}

/// `GET /dashboard/users`
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    shell: DashboardShell,
    RequireRole(actor, _): RequireRole<AdminOnly>,
) -> Result<UsersTemplate> {
    let profiles = ProfileRepository::new(state.pool()).list_all().await?;
    Ok(UsersTemplate {
        layout: shell.layout(&state, "Users"),
        users: profiles.iter().map(|p| UserRowView::new(p, &actor)).collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

/// `POST /dashboard/users/{id}/role`
///
/// Rejections (own role, last admin, unknown role) come back as a flash.
#[instrument(skip(state, actor, session, form))]
pub async fn update_role(
    State(state): State<AppState>,
    RequireRole(actor, _): RequireRole<AdminOnly>,
    session: Session,
    Path(id): Path<UserId>,
    Form(form): Form<RoleForm>,
) -> Redirect {
    let message = match change_role(&state.profile_store(), &actor, id, &form.role).await {
        Ok(profile) => format!("{} is now {}.", profile.display_name(), profile.role.label()),
        Err(e) => e.error,
    };
    set_flash(&session, message).await;
    Redirect::to("/dashboard/users")
}
