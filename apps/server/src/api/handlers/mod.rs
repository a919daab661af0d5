//! HTTP handlers

pub mod company;
pub mod health;
pub mod search;

use serde::Deserialize;

use crate::{models::Pagination, state::AppState};

/// `page`/`limit` query parameters, kept as text so invalid values fall back
/// to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn pagination(&self, state: &AppState) -> Pagination {
        Pagination::from_query(
            self.page.as_deref(),
            self.limit.as_deref(),
            &state.config.search,
        )
    }
}
