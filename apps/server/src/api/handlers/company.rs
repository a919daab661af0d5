//! Company, register and per-company list handlers

use crate::{api::handlers::PageQuery, state::AppState, Error, Result};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};

/// `GET /api/v1/company/:regcode`
pub async fn get_company(
    State(state): State<AppState>,
    Path(regcode): Path<String>,
) -> Result<Response> {
    let details = state
        .company_service
        .load_details(&regcode)
        .await?
        .ok_or(Error::NotFound {
            entity: "Company",
            key: regcode,
        })?;
    Ok(Json(details).into_response())
}

/// `GET /api/v1/register/:regcode`
pub async fn get_register(
    State(state): State<AppState>,
    Path(regcode): Path<String>,
) -> Result<Response> {
    let register = state
        .company_service
        .get_register(&regcode)
        .await?
        .ok_or(Error::NotFound {
            entity: "Register",
            key: regcode,
        })?;
    Ok(Json(register).into_response())
}

/// `GET /api/v1/registers?page=&limit=`
pub async fn list_registers(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Response> {
    let page = state
        .company_service
        .list_registers(q.pagination(&state))
        .await?;
    Ok(Json(page).into_response())
}

/// `GET /api/v1/members/by-regcode/:regcode`
pub async fn members_by_regcode(
    State(state): State<AppState>,
    Path(regcode): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Response> {
    let page = state
        .company_service
        .members_by_regcode(&regcode, q.pagination(&state))
        .await?;
    Ok(Json(page).into_response())
}

/// `GET /api/v1/beneficial-owners/by-regcode/:regcode`
pub async fn beneficial_owners_by_regcode(
    State(state): State<AppState>,
    Path(regcode): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Response> {
    let page = state
        .company_service
        .beneficial_owners_by_regcode(&regcode, q.pagination(&state))
        .await?;
    Ok(Json(page).into_response())
}

/// `GET /api/v1/financial-statements/by-regcode/:regcode`, newest year first
pub async fn financial_statements_by_regcode(
    State(state): State<AppState>,
    Path(regcode): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Response> {
    let page = state
        .company_service
        .financial_statements_by_regcode(&regcode, q.pagination(&state))
        .await?;
    Ok(Json(page).into_response())
}
