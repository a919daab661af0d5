//! Detailed company search

use crate::{api::handlers::PageQuery, state::AppState, Result};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

/// `GET /api/v1/search/detailed?q=&page=&limit=`
pub async fn detailed_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    let pagination = query.page.pagination(&state);
    let result = state
        .search_service
        .detailed_search(query.q.as_deref().unwrap_or_default(), pagination)
        .await?;
    Ok(Json(result).into_response())
}
