//! Read API over an in-memory store: status codes, payload shape and lenient
//! pagination parameters.

mod support;

use axum::http::{Method, StatusCode};
use capview_ingest::EntityKind;
use support::*;

fn seeded_app() -> anyhow::Result<TestApp> {
    let app = TestApp::new();
    app.store.seed(register("40003000001", "Alfa"))?;
    app.store.seed(register("40003000002", "Beta"))?;
    app.store.seed(member(1, "40003000001", "Anna"))?;
    app.store.seed(member(2, "40003000001", "Bruno"))?;
    app.store.seed(beneficial_owner(3, "40003000001", "Pēteris", "Kalniņš"))?;
    app.store.seed(financial_statement(10, "40003000001", "2022"))?;
    app.store.seed(financial_statement(11, "40003000001", "2023"))?;
    app.store
        .seed(sub_statement(EntityKind::IncomeStatements, 11))?;
    Ok(app)
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_reports_ok() -> anyhow::Result<()> {
    let app = TestApp::new();

    let (status, body) = app.get_json("/health").await?;

    assert_status(status, StatusCode::OK, "health");
    assert_eq!(body["status"], "ok");
    Ok(())
}

// ============================================================================
// Detailed search
// ============================================================================

#[tokio::test]
async fn detailed_search_returns_paginated_companies() -> anyhow::Result<()> {
    let app = seeded_app()?;

    let (status, body) = app
        .get_json("/api/v1/search/detailed?q=alfa&page=1&limit=5")
        .await?;

    assert_status(status, StatusCode::OK, "search");
    assert_eq!(body["total_records"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 5);
    let company = &body["data"][0];
    assert_eq!(company["register_info"]["regcode"], "40003000001");
    assert_eq!(company["members"].as_array().map(Vec::len), Some(2));
    assert_eq!(company["beneficial_owners"][0]["surname"], "Kalniņš");
    assert_eq!(
        company["financial_reports"][0]["financial_statement_info"]["year"],
        "2023"
    );
    assert!(company["financial_reports"][0]["income_statement"].is_object());
    assert!(company["financial_reports"][1]["income_statement"].is_null());
    Ok(())
}

#[tokio::test]
async fn detailed_search_without_term_is_bad_request() -> anyhow::Result<()> {
    let app = seeded_app()?;

    for path in ["/api/v1/search/detailed", "/api/v1/search/detailed?q=%20%20"] {
        let (status, body) = app.get_json(path).await?;
        assert_status(status, StatusCode::BAD_REQUEST, path);
        assert!(body["error"].is_string());
    }
    Ok(())
}

#[tokio::test]
async fn failing_source_is_a_server_error() -> anyhow::Result<()> {
    let app = seeded_app()?;
    app.store.fail_search_source("beneficial_owners")?;

    let (status, body) = app.get_json("/api/v1/search/detailed?q=alfa").await?;

    assert_status(status, StatusCode::INTERNAL_SERVER_ERROR, "search");
    assert!(body["error"].is_string());
    Ok(())
}

// ============================================================================
// Company and register lookups
// ============================================================================

#[tokio::test]
async fn company_lookup_by_regcode() -> anyhow::Result<()> {
    let app = seeded_app()?;

    let (status, body) = app.get_json("/api/v1/company/40003000001").await?;
    assert_status(status, StatusCode::OK, "existing company");
    assert_eq!(body["register_info"]["name"], "Alfa");
    assert_eq!(body["financial_reports"].as_array().map(Vec::len), Some(2));

    let (status, body) = app.get_json("/api/v1/company/49999999999").await?;
    assert_status(status, StatusCode::NOT_FOUND, "unknown company");
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn register_lookup_serializes_nulls() -> anyhow::Result<()> {
    let app = seeded_app()?;

    let (status, body) = app.get_json("/api/v1/register/40003000002").await?;

    assert_status(status, StatusCode::OK, "register");
    assert_eq!(body["name"], "Beta");
    assert!(body["id"].is_number());
    assert!(body.get("city").is_some_and(|v| v.is_null()));

    let (status, _, _) = app.request(Method::GET, "/api/v1/register/missing").await?;
    assert_status(status, StatusCode::NOT_FOUND, "missing register");
    Ok(())
}

// ============================================================================
// Paginated lists
// ============================================================================

#[tokio::test]
async fn registers_are_listed_by_name() -> anyhow::Result<()> {
    let app = seeded_app()?;

    let (status, body) = app.get_json("/api/v1/registers?page=2&limit=1").await?;

    assert_status(status, StatusCode::OK, "registers");
    assert_eq!(body["total_records"], 2);
    assert_eq!(body["data"][0]["name"], "Beta");
    Ok(())
}

#[tokio::test]
async fn invalid_pagination_falls_back_to_defaults() -> anyhow::Result<()> {
    let app = seeded_app()?;

    let (status, body) = app
        .get_json("/api/v1/registers?page=abc&limit=-3")
        .await?;
    assert_status(status, StatusCode::OK, "invalid params");
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);

    let (_, body) = app.get_json("/api/v1/registers?limit=5000").await?;
    assert_eq!(body["limit"], 100);
    Ok(())
}

#[tokio::test]
async fn child_lists_by_regcode() -> anyhow::Result<()> {
    let app = seeded_app()?;

    let (status, body) = app
        .get_json("/api/v1/members/by-regcode/40003000001?limit=1")
        .await?;
    assert_status(status, StatusCode::OK, "members");
    assert_eq!(body["total_records"], 2);
    assert_eq!(body["data"][0]["name"], "Anna");

    let (_, body) = app
        .get_json("/api/v1/beneficial-owners/by-regcode/40003000001")
        .await?;
    assert_eq!(body["data"][0]["forename"], "Pēteris");

    let (_, body) = app
        .get_json("/api/v1/financial-statements/by-regcode/40003000001")
        .await?;
    let years: Vec<_> = body["data"]
        .as_array()
        .map(|rows| rows.iter().map(|r| r["year"].clone()).collect())
        .unwrap_or_default();
    assert_eq!(years, vec!["2023", "2022"]);

    let (status, body) = app
        .get_json("/api/v1/members/by-regcode/40003000002")
        .await?;
    assert_status(status, StatusCode::OK, "no members");
    assert_eq!(body["total_records"], 0);
    Ok(())
}
