//! Company hydration and the paginated read API

use capview_ingest::{EntityKind, TypedRecord, ID_COLUMN};
use std::sync::Arc;

use crate::{
    db::{RecordQuery, RecordStore},
    models::{CompanyDetails, FinancialReport, Paginated, Pagination},
    Result,
};

const REGISTRATION_NUMBER: &str = "legal_entity_registration_number";

#[derive(Clone)]
pub struct CompanyService {
    store: Arc<dyn RecordStore>,
}

impl CompanyService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get_register(&self, regcode: &str) -> Result<Option<TypedRecord>> {
        self.first_where(EntityKind::Registers, "regcode", regcode)
            .await
    }

    /// Root register row plus members, beneficial owners and financial
    /// reports. `None` when the register row does not exist.
    pub async fn load_details(&self, regcode: &str) -> Result<Option<CompanyDetails>> {
        let Some(register_info) = self.get_register(regcode).await? else {
            return Ok(None);
        };

        let members = self
            .store
            .fetch_records(&children(EntityKind::Members, regcode))
            .await?;
        let beneficial_owners = self
            .store
            .fetch_records(&children(EntityKind::BeneficialOwners, regcode))
            .await?;
        let statements = self
            .store
            .fetch_records(&statements(regcode))
            .await?;

        let mut financial_reports = Vec::with_capacity(statements.len());
        for statement in statements {
            financial_reports.push(self.load_report(statement).await?);
        }

        Ok(Some(CompanyDetails {
            register_info,
            members,
            beneficial_owners,
            financial_reports,
        }))
    }

    /// Hydrate keys one after another, keeping their order. A key without a
    /// register row is dropped; store errors fail the whole call.
    pub async fn hydrate(&self, keys: &[String]) -> Result<Vec<CompanyDetails>> {
        let mut details = Vec::with_capacity(keys.len());
        for key in keys {
            match self.load_details(key).await? {
                Some(company) => details.push(company),
                None => tracing::warn!(regcode = %key, "Register row missing for candidate key, dropping it"),
            }
        }
        Ok(details)
    }

    pub async fn list_registers(&self, pagination: Pagination) -> Result<Paginated<TypedRecord>> {
        let query = RecordQuery::new(EntityKind::Registers)
            .order_by("name", false)
            .order_by(ID_COLUMN, false);
        self.paginate(query, pagination).await
    }

    pub async fn members_by_regcode(
        &self,
        regcode: &str,
        pagination: Pagination,
    ) -> Result<Paginated<TypedRecord>> {
        self.paginate(children(EntityKind::Members, regcode), pagination)
            .await
    }

    pub async fn beneficial_owners_by_regcode(
        &self,
        regcode: &str,
        pagination: Pagination,
    ) -> Result<Paginated<TypedRecord>> {
        self.paginate(children(EntityKind::BeneficialOwners, regcode), pagination)
            .await
    }

    pub async fn financial_statements_by_regcode(
        &self,
        regcode: &str,
        pagination: Pagination,
    ) -> Result<Paginated<TypedRecord>> {
        self.paginate(statements(regcode), pagination).await
    }

    async fn load_report(&self, statement: TypedRecord) -> Result<FinancialReport> {
        let (income_statement, balance_sheet, cash_flow_statement) = match statement.id() {
            Some(id) => {
                let id = id.to_string();
                (
                    self.first_where(EntityKind::IncomeStatements, "statement_id", &id)
                        .await?,
                    self.first_where(EntityKind::BalanceSheets, "statement_id", &id)
                        .await?,
                    self.first_where(EntityKind::CashFlowStatements, "statement_id", &id)
                        .await?,
                )
            }
            None => (None, None, None),
        };

        Ok(FinancialReport {
            financial_statement_info: statement,
            income_statement,
            balance_sheet,
            cash_flow_statement,
        })
    }

    async fn first_where(
        &self,
        entity: EntityKind,
        column: &'static str,
        value: &str,
    ) -> Result<Option<TypedRecord>> {
        let query = RecordQuery::new(entity)
            .filter_eq(column, value)
            .order_by(ID_COLUMN, false)
            .paginate(1, 0);
        Ok(self.store.fetch_records(&query).await?.into_iter().next())
    }

    async fn paginate(
        &self,
        query: RecordQuery,
        pagination: Pagination,
    ) -> Result<Paginated<TypedRecord>> {
        let total = self.store.count_records(&query).await?;
        let (offset, limit) = pagination.window();
        let data = self.store.fetch_records(&query.paginate(limit, offset)).await?;
        Ok(Paginated::new(data, total, pagination))
    }
}

fn children(entity: EntityKind, regcode: &str) -> RecordQuery {
    RecordQuery::new(entity)
        .filter_eq(REGISTRATION_NUMBER, regcode)
        .order_by(ID_COLUMN, false)
}

fn statements(regcode: &str) -> RecordQuery {
    RecordQuery::new(EntityKind::FinancialStatements)
        .filter_eq(REGISTRATION_NUMBER, regcode)
        .order_by("year", true)
        .order_by(ID_COLUMN, false)
}
