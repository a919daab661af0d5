//! Response payloads and pagination

use capview_ingest::TypedRecord;
use serde::Serialize;

use crate::config::SearchConfig;

/// One company with its related child collections.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyDetails {
    pub register_info: TypedRecord,
    pub members: Vec<TypedRecord>,
    pub beneficial_owners: Vec<TypedRecord>,
    pub financial_reports: Vec<FinancialReport>,
}

/// A financial statement header with its sub-statements, when present.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub financial_statement_info: TypedRecord,
    pub income_statement: Option<TypedRecord>,
    pub balance_sheet: Option<TypedRecord>,
    pub cash_flow_statement: Option<TypedRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub total_records: i64,
    pub page: u32,
    pub limit: u32,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total_records: i64, pagination: Pagination) -> Self {
        Self {
            total_records,
            page: pagination.page,
            limit: pagination.limit,
            data,
        }
    }
}

/// 1-based page and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Lenient query parsing: a missing, non-numeric or < 1 page becomes 1,
    /// a missing, non-numeric or < 1 limit becomes the default, and a limit
    /// above the maximum is clamped.
    pub fn from_query(page: Option<&str>, limit: Option<&str>, config: &SearchConfig) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map_or(1, |p| u32::try_from(p).unwrap_or(u32::MAX));
        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .map_or(config.default_limit, |l| {
                u32::try_from(l).unwrap_or(u32::MAX).min(config.max_limit)
            });
        Self::new(page, limit)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// `(offset, limit)` as SQL-friendly integers.
    pub fn window(&self) -> (i64, i64) {
        (
            i64::try_from(self.offset()).unwrap_or(i64::MAX),
            i64::from(self.limit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(page: Option<&str>, limit: Option<&str>) -> Pagination {
        Pagination::from_query(page, limit, &SearchConfig::default())
    }

    #[test]
    fn defaults_apply_to_missing_and_invalid_values() {
        assert_eq!(parse(None, None), Pagination::new(1, 20));
        assert_eq!(parse(Some("abc"), Some("x")), Pagination::new(1, 20));
        assert_eq!(parse(Some("0"), Some("-3")), Pagination::new(1, 20));
    }

    #[test]
    fn limit_is_clamped_to_maximum() {
        assert_eq!(parse(Some("3"), Some("500")), Pagination::new(3, 100));
        assert_eq!(parse(Some("2"), Some("5")).offset(), 5);
    }
}
