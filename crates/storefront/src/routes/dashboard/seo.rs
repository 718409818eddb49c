//! SEO tooling: per-path meta overrides, keyword tracking and schema markup.
//!
//! Every write drops the affected path from the SEO cache so the storefront
//! picks it up on the next request.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};
use validator::Validate;

use handset_core::{KeywordId, MetaTagId, SchemaMarkupId};

use crate::db::seo::MetaTagDraft;
use crate::db::{RepositoryError, SeoRepository};
use crate::error::{AppError, Result, first_validation_message};
use crate::filters;
use crate::middleware::{RequirePermission, can};
use crate::models::catalog::non_empty;
use crate::models::{Keyword, KeywordInput, MetaTag, MetaTagInput, SchemaInput, SchemaKind, SchemaMarkup};
use crate::state::AppState;
use crate::views::{date_time, set_flash, short_date};

use super::{DashboardLayout, DashboardShell, SelectOption};

// =============================================================================
// Meta tags
// =============================================================================

fn meta_draft(input: &MetaTagInput) -> MetaTagDraft {
    MetaTagDraft {
        path: input.path.trim().to_owned(),
        title: non_empty(&input.title),
        description: non_empty(&input.description),
        keywords: non_empty(&input.keywords),
        og_image: non_empty(&input.og_image),
        canonical_url: input.canonical_url.as_deref().and_then(non_empty),
        noindex: input.noindex.is_some(),
    }
}

#[derive(Clone, Debug, Default)]
pub struct MetaFormView {
    pub path: String,
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub og_image: String,
    pub canonical_url: String,
    pub noindex: bool,
}

impl From<&MetaTag> for MetaFormView {
    fn from(tag: &MetaTag) -> Self {
        Self {
            path: tag.path.clone(),
            title: tag.title.clone().unwrap_or_default(),
            description: tag.description.clone().unwrap_or_default(),
            keywords: tag.keywords.clone().unwrap_or_default(),
            og_image: tag.og_image.clone().unwrap_or_default(),
            canonical_url: tag.canonical_url.clone().unwrap_or_default(),
            noindex: tag.noindex,
        }
    }
}

impl From<&MetaTagInput> for MetaFormView {
    fn from(input: &MetaTagInput) -> Self {
        Self {
            path: input.path.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            keywords: input.keywords.clone(),
            og_image: input.og_image.clone(),
            canonical_url: input.canonical_url.clone().unwrap_or_default(),
            noindex: input.noindex.is_some(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MetaRowView {
    pub id: i32,
    pub path: String,
    pub title: String,
    pub description: String,
    pub noindex: bool,
    pub updated_at: String,
}

impl From<&MetaTag> for MetaRowView {
    fn from(tag: &MetaTag) -> Self {
        Self {
            id: tag.id.get(),
            path: tag.path.clone(),
            title: tag.title.clone().unwrap_or_default(),
            description: tag.description.clone().unwrap_or_default(),
            noindex: tag.noindex,
            updated_at: date_time(&tag.updated_at),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MetaQuery {
    /// Prefill the form from the tag stored for this path.
    pub path: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/seo/meta.html")]
pub struct MetaTemplate {
    pub layout: DashboardLayout,
    pub tags: Vec<MetaRowView>,
    pub form: MetaFormView,
    pub error: Option<String>,
    pub can_write: bool,
}

async fn meta_page(
    state: &AppState,
    shell: DashboardShell,
    form: MetaFormView,
    error: Option<String>,
    can_write: bool,
) -> Result<MetaTemplate> {
    let tags = SeoRepository::new(state.pool()).list_meta().await?;
    Ok(MetaTemplate {
        layout: shell.layout(state, "Meta tags"),
        tags: tags.iter().map(MetaRowView::from).collect(),
        form,
        error,
        can_write,
    })
}

fn can_write(state: &AppState, profile: &handset_core::session::Profile) -> bool {
    state
        .permissions()
        .allows(profile.role, handset_core::session::Permission::SeoWrite)
}

/// `GET /dashboard/seo/meta?path=`
#[instrument(skip(state, shell, profile))]
pub async fn meta_index(
    State(state): State<AppState>,
    shell: DashboardShell,
    RequirePermission(profile, _): RequirePermission<can::SeoRead>,
    Query(query): Query<MetaQuery>,
) -> Result<MetaTemplate> {
    let form = match query.path.as_deref() {
        Some(path) => SeoRepository::new(state.pool())
            .meta_for_path(path)
            .await?
            .map_or_else(
                || MetaFormView {
                    path: path.to_owned(),
                    ..MetaFormView::default()
                },
                |tag| MetaFormView::from(&tag),
            ),
        None => MetaFormView::default(),
    };
    meta_page(&state, shell, form, None, can_write(&state, &profile)).await
}

/// `POST /dashboard/seo/meta`: create or replace the tag for a path.
#[instrument(skip_all)]
pub async fn meta_save(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::SeoWrite>,
    session: Session,
    Form(input): Form<MetaTagInput>,
) -> Result<Response> {
    if let Err(errors) = input.validate() {
        let message = first_validation_message(&errors);
        return Ok(meta_page(&state, shell, MetaFormView::from(&input), Some(message), true)
            .await?
            .into_response());
    }

    let tag = SeoRepository::new(state.pool())
        .upsert_meta(&meta_draft(&input))
        .await?;
    state.seo().invalidate_path(&tag.path).await;
    info!(path = %tag.path, "Meta tag saved");
    set_flash(&session, format!("Saved meta tags for {}.", tag.path)).await;
    Ok(Redirect::to("/dashboard/seo/meta").into_response())
}

/// `POST /dashboard/seo/meta/{id}/delete`
#[instrument(skip(state, _guard, session))]
pub async fn meta_delete(
    State(state): State<AppState>,
    _guard: RequirePermission<can::SeoWrite>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    let path = SeoRepository::new(state.pool())
        .delete_meta(MetaTagId::new(id))
        .await?;
    state.seo().invalidate_path(&path).await;
    set_flash(&session, format!("Removed meta tags for {path}.")).await;
    Ok(Redirect::to("/dashboard/seo/meta"))
}

// =============================================================================
// Keywords
// =============================================================================

/// Parse an optional whole number from a form field.
fn optional_number(value: &str, field: &str) -> std::result::Result<Option<i32>, String> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => match raw.parse::<i32>() {
            Ok(n) if n >= 0 => Ok(Some(n)),
            _ => Err(format!("{field} must be a whole number")),
        },
    }
}

#[derive(Clone, Debug)]
pub struct KeywordRowView {
    pub id: i32,
    pub keyword: String,
    pub target_path: String,
    pub search_volume: String,
    pub current_rank: String,
    /// e.g. `+3`, `-1`; empty when unknown.
    pub change: String,
    pub improved: bool,
    pub updated_on: String,
}

impl From<&Keyword> for KeywordRowView {
    fn from(keyword: &Keyword) -> Self {
        let change = keyword.rank_change();
        Self {
            id: keyword.id.get(),
            keyword: keyword.keyword.clone(),
            target_path: keyword.target_path.clone().unwrap_or_default(),
            search_volume: keyword
                .search_volume
                .map(|v| v.to_string())
                .unwrap_or_default(),
            current_rank: keyword
                .current_rank
                .map_or_else(|| "-".to_owned(), |r| r.to_string()),
            change: change.map(|c| format!("{c:+}")).unwrap_or_default(),
            improved: change.is_some_and(|c| c > 0),
            updated_on: short_date(&keyword.updated_at),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/seo/keywords.html")]
pub struct KeywordsTemplate {
    pub layout: DashboardLayout,
    pub keywords: Vec<KeywordRowView>,
    pub error: Option<String>,
    pub can_write: bool,
}

/// `GET /dashboard/seo/keywords`
#[instrument(skip_all)]
pub async fn keywords_index(
    State(state): State<AppState>,
    shell: DashboardShell,
    RequirePermission(profile, _): RequirePermission<can::SeoRead>,
) -> Result<KeywordsTemplate> {
    let keywords = SeoRepository::new(state.pool()).list_keywords().await?;
    Ok(KeywordsTemplate {
        layout: shell.layout(&state, "Keywords"),
        keywords: keywords.iter().map(KeywordRowView::from).collect(),
        error: None,
        can_write: can_write(&state, &profile),
    })
}

/// `POST /dashboard/seo/keywords`
#[instrument(skip_all)]
pub async fn keyword_create(
    State(state): State<AppState>,
    _guard: RequirePermission<can::SeoWrite>,
    session: Session,
    Form(input): Form<KeywordInput>,
) -> Result<Redirect> {
    let parsed = input
        .validate()
        .map_err(|e| first_validation_message(&e))
        .and_then(|()| {
            Ok((
                optional_number(&input.search_volume, "Search volume")?,
                optional_number(&input.current_rank, "Rank")?,
            ))
        });
    let (volume, rank) = match parsed {
        Ok(values) => values,
        Err(message) => {
            set_flash(&session, message).await;
            return Ok(Redirect::to("/dashboard/seo/keywords"));
        }
    };

    let created = SeoRepository::new(state.pool())
        .create_keyword(
            input.keyword.trim(),
            non_empty(&input.target_path).as_deref(),
            volume,
            rank,
        )
        .await;
    match created {
        Ok(keyword) => set_flash(&session, format!("Tracking \u{201c}{}\u{201d}.", keyword.keyword)).await,
        Err(RepositoryError::Conflict(message)) => set_flash(&session, message).await,
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/dashboard/seo/keywords"))
}

/// `POST /dashboard/seo/keywords/{id}/delete`
#[instrument(skip(state, _guard, session))]
pub async fn keyword_delete(
    State(state): State<AppState>,
    _guard: RequirePermission<can::SeoWrite>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    SeoRepository::new(state.pool())
        .delete_keyword(KeywordId::new(id))
        .await?;
    set_flash(&session, "Keyword removed.").await;
    Ok(Redirect::to("/dashboard/seo/keywords"))
}

#[derive(Debug, Deserialize)]
pub struct RankBody {
    /// `null` when the page dropped out of the tracked results.
    pub rank: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RankJson {
    pub id: i32,
    pub current_rank: Option<i32>,
    pub previous_rank: Option<i32>,
    pub change: Option<i32>,
}

/// `POST /dashboard/api/seo/keywords/{id}/rank` with `{ "rank": 4 }`.
#[instrument(skip(state, _guard))]
pub async fn api_record_rank(
    State(state): State<AppState>,
    _guard: RequirePermission<can::SeoWrite>,
    Path(id): Path<i32>,
    Json(body): Json<RankBody>,
) -> Response {
    if body.rank.is_some_and(|r| r < 1) {
        return AppError::Validation("Rank must be 1 or greater".to_owned()).into_json_response();
    }
    match SeoRepository::new(state.pool())
        .record_rank(KeywordId::new(id), body.rank)
        .await
    {
        Ok(keyword) => Json(RankJson {
            id,
            current_rank: keyword.current_rank,
            previous_rank: keyword.previous_rank,
            change: keyword.rank_change(),
        })
        .into_response(),
        Err(e) => AppError::from(e).into_json_response(),
    }
}

// =============================================================================
// Schema markup
// =============================================================================

#[derive(Clone, Debug)]
pub struct SchemaRowView {
    pub id: i32,
    pub path: String,
    pub kind: &'static str,
    pub json_ld: String,
    pub created_on: String,
}

impl From<&SchemaMarkup> for SchemaRowView {
    fn from(markup: &SchemaMarkup) -> Self {
        Self {
            id: markup.id.get(),
            path: markup.path.clone(),
            kind: markup.kind.as_str(),
            json_ld: serde_json::to_string_pretty(&markup.json_ld).unwrap_or_default(),
            created_on: short_date(&markup.created_at),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SchemaFormView {
    pub path: String,
    pub json_ld: String,
    pub kinds: Vec<SelectOption>,
}

impl SchemaFormView {
    fn new(path: &str, json_ld: &str, kind: Option<SchemaKind>) -> Self {
        Self {
            path: path.to_owned(),
            json_ld: json_ld.to_owned(),
            kinds: SchemaKind::ALL
                .iter()
                .map(|k| SelectOption::new(k.as_str(), k.as_str(), Some(*k) == kind))
                .collect(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/seo/schema.html")]
pub struct SchemaTemplate {
    pub layout: DashboardLayout,
    pub markup: Vec<SchemaRowView>,
    pub form: SchemaFormView,
    pub error: Option<String>,
    pub can_write: bool,
}

async fn schema_page(
    state: &AppState,
    shell: DashboardShell,
    form: SchemaFormView,
    error: Option<String>,
    can_write: bool,
) -> Result<SchemaTemplate> {
    let markup = SeoRepository::new(state.pool()).list_schema().await?;
    Ok(SchemaTemplate {
        layout: shell.layout(state, "Schema markup"),
        markup: markup.iter().map(SchemaRowView::from).collect(),
        form,
        error,
        can_write,
    })
}

/// `GET /dashboard/seo/schema`
#[instrument(skip_all)]
pub async fn schema_index(
    State(state): State<AppState>,
    shell: DashboardShell,
    RequirePermission(profile, _): RequirePermission<can::SeoRead>,
) -> Result<SchemaTemplate> {
    let form = SchemaFormView::new("/", "", Some(SchemaKind::Organization));
    schema_page(&state, shell, form, None, can_write(&state, &profile)).await
}

/// `POST /dashboard/seo/schema`
#[instrument(skip_all)]
pub async fn schema_create(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::SeoWrite>,
    session: Session,
    Form(input): Form<SchemaInput>,
) -> Result<Response> {
    let parsed = input
        .validate()
        .map_err(|e| first_validation_message(&e))
        .and_then(|()| input.parsed());
    let json_ld = match parsed {
        Ok(value) => value,
        Err(message) => {
            let form = SchemaFormView::new(&input.path, &input.json_ld, Some(input.kind));
            return Ok(schema_page(&state, shell, form, Some(message), true)
                .await?
                .into_response());
        }
    };

    let markup = SeoRepository::new(state.pool())
        .create_schema(input.path.trim(), input.kind, &json_ld)
        .await?;
    state.seo().invalidate_path(&markup.path).await;
    info!(path = %markup.path, kind = markup.kind.as_str(), "Schema markup added");
    set_flash(&session, format!("Added {} markup to {}.", markup.kind.as_str(), markup.path)).await;
    Ok(Redirect::to("/dashboard/seo/schema").into_response())
}

/// `POST /dashboard/seo/schema/{id}/delete`
#[instrument(skip(state, _guard, session))]
pub async fn schema_delete(
    State(state): State<AppState>,
    _guard: RequirePermission<can::SeoWrite>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    let path = SeoRepository::new(state.pool())
        .delete_schema(SchemaMarkupId::new(id))
        .await?;
    state.seo().invalidate_path(&path).await;
    set_flash(&session, "Schema markup removed.").await;
    Ok(Redirect::to("/dashboard/seo/schema"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_number() {
        assert_eq!(optional_number("", "Rank"), Ok(None));
        assert_eq!(optional_number(" 12 ", "Rank"), Ok(Some(12)));
        assert_eq!(
            optional_number("twelve", "Rank"),
            Err("Rank must be a whole number".to_owned())
        );
        assert!(optional_number("-3", "Rank").is_err());
    }

    #[test]
    fn test_meta_draft_blanks_become_none() {
        let input = MetaTagInput {
            path: " /about ".into(),
            title: "About us".into(),
            description: "  ".into(),
            keywords: String::new(),
            og_image: String::new(),
            canonical_url: None,
            noindex: Some("on".into()),
        };
        let draft = meta_draft(&input);
        assert_eq!(draft.path, "/about");
        assert_eq!(draft.title.as_deref(), Some("About us"));
        assert_eq!(draft.description, None);
        assert!(draft.noindex);
    }

    #[test]
    fn test_keyword_row_change() {
        let keyword = Keyword {
            id: KeywordId::new(1),
            keyword: "cheap phones".into(),
            target_path: None,
            search_volume: Some(900),
            current_rank: Some(4),
            previous_rank: Some(9),
            updated_at: chrono::Utc::now(),
        };
        let row = KeywordRowView::from(&keyword);
        assert_eq!(row.change, "+5");
        assert!(row.improved);
        assert_eq!(row.current_rank, "4");
    }
}
