//! Contact message inbox.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::instrument;

use handset_core::ContactMessageId;

use crate::db::MessageRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::{RequirePermission, can};
use crate::models::ContactMessage;
use crate::state::AppState;
use crate::views::date_time;

use super::{DashboardLayout, DashboardShell};

#[derive(Clone, Debug)]
pub struct MessageView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub is_read: bool,
    pub received_at: String,
}

impl From<&ContactMessage> for MessageView {
    fn from(message: &ContactMessage) -> Self {
        Self {
            id: message.id.get(),
            name: message.name.clone(),
            email: message.email.as_str().to_owned(),
            phone: message.phone.clone(),
            subject: message
                .subject
                .clone()
                .unwrap_or_else(|| "(no subject)".to_owned()),
            message: message.message.clone(),
            is_read: message.is_read,
            received_at: date_time(&message.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadForm {
    /// `"true"` marks read, anything else unread.
    pub read: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/messages.html")]
pub struct MessagesTemplate {
    pub layout: DashboardLayout,
    pub messages: Vec<MessageView>,
    pub unread: usize,
}

/// `GET /dashboard/messages`
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::MessagesRead>,
) -> Result<MessagesTemplate> {
    let messages = MessageRepository::new(state.pool()).list_all().await?;
    Ok(MessagesTemplate {
        layout: shell.layout(&state, "Messages"),
        unread: messages.iter().filter(|m| !m.is_read).count(),
        messages: messages.iter().map(MessageView::from).collect(),
    })
}

/// `POST /dashboard/messages/{id}/read`
#[instrument(skip(state, _guard))]
pub async fn mark_read(
    State(state): State<AppState>,
    _guard: RequirePermission<can::MessagesRead>,
    Path(id): Path<i32>,
    Form(form): Form<ReadForm>,
) -> Result<Redirect> {
    MessageRepository::new(state.pool())
        .set_read(ContactMessageId::new(id), form.read == "true")
        .await?;
    Ok(Redirect::to("/dashboard/messages"))
}
