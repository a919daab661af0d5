//! End-to-end import and search against a real PostgreSQL database.
//!
//! Runs only when `CAPVIEW__DATABASE__TEST_DATABASE_URL` points at a
//! disposable database; every table is truncated first.

mod support;

use std::sync::Arc;

use capview::{
    config::{Config, ImportConfig},
    db::{PostgresRegistryStore, RecordQuery, RecordStore},
    models::Pagination,
    services::{FileOutcome, ImportService, SearchService},
    state::{create_db_pool, run_migrations},
};
use capview_ingest::EntityKind;
use sqlx::PgPool;
use support::*;

async fn test_pool() -> anyhow::Result<Option<PgPool>> {
    let Ok(url) = std::env::var("CAPVIEW__DATABASE__TEST_DATABASE_URL") else {
        eprintln!("CAPVIEW__DATABASE__TEST_DATABASE_URL not set, skipping");
        return Ok(None);
    };
    let mut config = Config::default();
    config.database.url = url;
    config.database.pool_min_size = 1;

    let pool = create_db_pool(&config).await?;
    run_migrations(&pool).await?;

    let tables: Vec<&str> = EntityKind::ALL
        .iter()
        .map(|kind| kind.descriptor().table())
        .collect();
    sqlx::query(&format!(
        "TRUNCATE {} RESTART IDENTITY",
        tables.join(", ")
    ))
    .execute(&pool)
    .await?;
    Ok(Some(pool))
}

async fn count(store: &PostgresRegistryStore, kind: EntityKind) -> anyhow::Result<i64> {
    Ok(store.count_records(&RecordQuery::new(kind)).await?)
}

// All scenarios share one database, so they run in a single test.
#[tokio::test]
async fn import_and_search_round_trip() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let store = PostgresRegistryStore::new(pool);
    let importer = ImportService::new(Arc::new(store.clone()), &ImportConfig::default())?;

    let csv = CsvDir::new()?;
    csv.write(
        "register.csv",
        &[
            "regcode;name;type;index",
            "40003000001;SIA \"Alfa\";SIA;LV-1010",
            "40003000002;Beta;AS;",
        ],
    )?;
    csv.write(
        "members.csv",
        &[
            "id;name;legal_entity_registration_number",
            "1;Anna;40003000001",
            "x;Broken;40003000001",
        ],
    )?;
    csv.write(
        "financial_statements.csv",
        &[
            "id;legal_entity_registration_number;year",
            "10;40003000001;2022",
            "11;40003000001;2023",
        ],
    )?;
    csv.write(
        "income_statements.csv",
        &["statement_id;net_turnover", "11;1000"],
    )?;

    // ========================================================================
    // Import and re-import
    // ========================================================================

    for _ in 0..2 {
        let summary = importer.run(csv.path()).await?;
        assert_eq!(summary.failed_files(), 0);
        assert_eq!(summary.totals().rows_failed, 1);
    }
    assert_eq!(count(&store, EntityKind::Registers).await?, 2);
    assert_eq!(count(&store, EntityKind::Members).await?, 1);
    assert_eq!(count(&store, EntityKind::FinancialStatements).await?, 2);
    assert_eq!(count(&store, EntityKind::IncomeStatements).await?, 1);

    // ========================================================================
    // Repeated identifier inside one file
    // ========================================================================

    csv.write(
        "beneficial_owners.csv",
        &[
            "id;forename;surname;legal_entity_registration_number",
            "5;Anna;Ozola;40003000001",
            "5;Duplicate;Id;40003000001",
        ],
    )?;
    let bo_only = ImportConfig {
        entities: vec!["beneficial_owners".to_string()],
        ..ImportConfig::default()
    };
    let summary = ImportService::new(Arc::new(store.clone()), &bo_only)?
        .run(csv.path())
        .await?;
    let outcome = &summary
        .report(EntityKind::BeneficialOwners)
        .expect("beneficial owners report")
        .outcome;
    assert!(matches!(outcome, FileOutcome::Imported(_)));
    assert_eq!(count(&store, EntityKind::BeneficialOwners).await?, 1);

    // ========================================================================
    // Explicit and generated identifiers
    // ========================================================================

    let members_only = ImportConfig {
        entities: vec!["members".to_string()],
        ..ImportConfig::default()
    };
    let member_importer = ImportService::new(Arc::new(store.clone()), &members_only)?;
    csv.write(
        "members.csv",
        &[
            "id;name;legal_entity_registration_number",
            "1;Anna;40003000001",
            ";Blank;40003000002",
        ],
    )?;
    member_importer.run(csv.path()).await?;
    csv.write(
        "members.csv",
        &["id;name;legal_entity_registration_number", ";Later;40003000002"],
    )?;
    member_importer.run(csv.path()).await?;

    let members = store
        .fetch_records(&RecordQuery::new(EntityKind::Members).order_by("id", false))
        .await?;
    let members: Vec<_> = members
        .iter()
        .map(|m| (m.id(), m.get("name").map(str::to_string)))
        .collect();
    assert_eq!(
        members,
        vec![
            (Some(1), Some("Anna".to_string())),
            (Some(2), Some("Blank".to_string())),
            (Some(3), Some("Later".to_string())),
        ]
    );

    // ========================================================================
    // Search
    // ========================================================================

    let search = SearchService::new(Arc::new(store.clone()), &Config::default().search);
    let result = search
        .detailed_search("alfa", Pagination::new(1, 10))
        .await?;
    assert_eq!(result.total_records, 1);
    let company = &result.data[0];
    assert_eq!(company.register_info.get("index_company"), Some("LV-1010"));
    assert_eq!(company.financial_reports.len(), 2);
    assert_eq!(
        company.financial_reports[0]
            .income_statement
            .as_ref()
            .and_then(|s| s.get("net_turnover")),
        Some("1000")
    );

    let by_code = search
        .detailed_search("40003000002", Pagination::new(1, 10))
        .await?;
    assert_eq!(by_code.total_records, 1);

    let wildcard = search.detailed_search("_", Pagination::new(1, 10)).await?;
    assert_eq!(wildcard.total_records, 0);
    Ok(())
}
