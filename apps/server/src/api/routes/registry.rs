use crate::api::handlers::{company, search};
use crate::state::AppState;
use axum::{routing::get, Router};

/// Read API mounted under `/api/v1`
pub fn registry_routes() -> Router<AppState> {
    Router::new()
        .route("/search/detailed", get(search::detailed_search))
        .route("/company/:regcode", get(company::get_company))
        .route("/registers", get(company::list_registers))
        .route("/register/:regcode", get(company::get_register))
        .route(
            "/members/by-regcode/:regcode",
            get(company::members_by_regcode),
        )
        .route(
            "/beneficial-owners/by-regcode/:regcode",
            get(company::beneficial_owners_by_regcode),
        )
        .route(
            "/financial-statements/by-regcode/:regcode",
            get(company::financial_statements_by_regcode),
        )
}
