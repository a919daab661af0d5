//! Static entity descriptors.
//!
//! Every importable/searchable table is declared once here. The row mapper
//! reads `fields` and the alias override, the upsert path reads
//! `conflict_columns` and `update_columns`. Update columns are derived from
//! the field list (everything that is neither the identifier nor part of the
//! conflict target), so the two sides cannot drift apart.

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Physical name of the identifier column shared by every table.
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Registers,
    Members,
    BeneficialOwners,
    FinancialStatements,
    IncomeStatements,
    BalanceSheets,
    CashFlowStatements,
}

impl EntityKind {
    /// Import order: the primary registry first, then per-company children,
    /// then the financial statement header before its sub-statements.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Registers,
        EntityKind::Members,
        EntityKind::BeneficialOwners,
        EntityKind::FinancialStatements,
        EntityKind::IncomeStatements,
        EntityKind::BalanceSheets,
        EntityKind::CashFlowStatements,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Registers => "registers",
            EntityKind::Members => "members",
            EntityKind::BeneficialOwners => "beneficial_owners",
            EntityKind::FinancialStatements => "financial_statements",
            EntityKind::IncomeStatements => "income_statements",
            EntityKind::BalanceSheets => "balance_sheets",
            EntityKind::CashFlowStatements => "cash_flow_statements",
        }
    }

    pub fn descriptor(self) -> &'static EntityDescriptor {
        registry().get(self)
    }

    /// Index into `ALL` and into the registry's descriptor list.
    fn position(self) -> usize {
        match self {
            EntityKind::Registers => 0,
            EntityKind::Members => 1,
            EntityKind::BeneficialOwners => 2,
            EntityKind::FinancialStatements => 3,
            EntityKind::IncomeStatements => 4,
            EntityKind::BalanceSheets => 5,
            EntityKind::CashFlowStatements => 6,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| RegistryError::UnknownEntity(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Numeric identifier. `auto_generated` identifiers may be left unset and
    /// are only read from the source when they are part of the conflict target.
    Id { auto_generated: bool },
    /// Optional text; empty source text becomes null.
    NullableText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn is_id(&self) -> bool {
        matches!(self.kind, FieldKind::Id { .. })
    }
}

const fn text(column: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        column,
        kind: FieldKind::NullableText,
    }
}

const fn id(auto_generated: bool) -> FieldDescriptor {
    FieldDescriptor {
        column: ID_COLUMN,
        kind: FieldKind::Id { auto_generated },
    }
}

/// Source header that feeds a differently-named destination field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasOverride {
    pub column: &'static str,
    pub source_header: &'static str,
}

#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    kind: EntityKind,
    table: &'static str,
    source_file: &'static str,
    fields: &'static [FieldDescriptor],
    conflict_columns: &'static [&'static str],
    update_columns: Vec<&'static str>,
    alias_override: Option<AliasOverride>,
}

impl EntityDescriptor {
    fn new(
        kind: EntityKind,
        source_file: &'static str,
        fields: &'static [FieldDescriptor],
        conflict_columns: &'static [&'static str],
        alias_override: Option<AliasOverride>,
    ) -> Self {
        let update_columns = fields
            .iter()
            .filter(|f| !f.is_id() && !conflict_columns.contains(&f.column))
            .map(|f| f.column)
            .collect();
        Self {
            kind,
            table: kind.name(),
            source_file,
            fields,
            conflict_columns,
            update_columns,
            alias_override,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// File name (with extension) of the source extract.
    pub fn source_file_name(&self) -> String {
        format!("{}.csv", self.source_file)
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    pub fn conflict_columns(&self) -> &'static [&'static str] {
        self.conflict_columns
    }

    pub fn update_columns(&self) -> &[&'static str] {
        &self.update_columns
    }

    pub fn alias_override(&self) -> Option<AliasOverride> {
        self.alias_override
    }

    pub fn field_index(&self, column: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.column == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.field_index(column).is_some()
    }

    pub fn is_conflict_target(&self, column: &str) -> bool {
        self.conflict_columns.contains(&column)
    }

    pub fn id_field(&self) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.is_id())
    }

    /// Lowercased source header the field is read from.
    pub fn source_column(&self, field: &FieldDescriptor) -> String {
        match self.alias_override {
            Some(alias) if alias.column == field.column => alias.source_header.to_string(),
            _ => field.column.to_ascii_lowercase(),
        }
    }

    /// Whether the mapper reads the field from the source file at all.
    pub fn reads_from_source(&self, field: &FieldDescriptor) -> bool {
        match field.kind {
            FieldKind::Id { auto_generated } => {
                !auto_generated || self.is_conflict_target(field.column)
            }
            FieldKind::NullableText => true,
        }
    }

    /// Checks the structural invariants of the descriptor.
    pub fn check_invariants(&self) -> Result<(), String> {
        for column in self.conflict_columns {
            if !self.has_column(column) {
                return Err(format!(
                    "{}: conflict column '{}' is not a field",
                    self.name(),
                    column
                ));
            }
        }
        for column in &self.update_columns {
            if self.is_conflict_target(column) {
                return Err(format!(
                    "{}: column '{}' is both conflict target and update column",
                    self.name(),
                    column
                ));
            }
        }
        if self.fields.iter().filter(|f| f.is_id()).count() > 1 {
            return Err(format!("{}: more than one identifier field", self.name()));
        }
        if let Some(alias) = self.alias_override {
            if !self.has_column(alias.column) {
                return Err(format!(
                    "{}: alias override targets unknown column '{}'",
                    self.name(),
                    alias.column
                ));
            }
        }
        Ok(())
    }
}

/// All entity descriptors, in import order.
#[derive(Debug)]
pub struct DescriptorRegistry {
    descriptors: Vec<EntityDescriptor>,
}

impl DescriptorRegistry {
    fn build() -> Self {
        let descriptors = vec![
            EntityDescriptor::new(
                EntityKind::Registers,
                "register",
                REGISTERS_FIELDS,
                &["regcode"],
                Some(AliasOverride {
                    column: "index_company",
                    source_header: "index",
                }),
            ),
            EntityDescriptor::new(EntityKind::Members, "members", MEMBERS_FIELDS, &[ID_COLUMN], None),
            EntityDescriptor::new(
                EntityKind::BeneficialOwners,
                "beneficial_owners",
                BENEFICIAL_OWNERS_FIELDS,
                &[ID_COLUMN],
                None,
            ),
            EntityDescriptor::new(
                EntityKind::FinancialStatements,
                "financial_statements",
                FINANCIAL_STATEMENTS_FIELDS,
                &["legal_entity_registration_number", "year"],
                None,
            ),
            EntityDescriptor::new(
                EntityKind::IncomeStatements,
                "income_statements",
                INCOME_STATEMENTS_FIELDS,
                &["statement_id"],
                None,
            ),
            EntityDescriptor::new(
                EntityKind::BalanceSheets,
                "balance_sheets",
                BALANCE_SHEETS_FIELDS,
                &["statement_id"],
                None,
            ),
            EntityDescriptor::new(
                EntityKind::CashFlowStatements,
                "cash_flow_statements",
                CASH_FLOW_STATEMENTS_FIELDS,
                &["statement_id"],
                None,
            ),
        ];
        Self { descriptors }
    }

    pub fn get(&self, kind: EntityKind) -> &EntityDescriptor {
        &self.descriptors[kind.position()]
    }

    /// Resolve a descriptor by entity name (case-insensitive).
    pub fn resolve(&self, entity_name: &str) -> Result<&EntityDescriptor, RegistryError> {
        let kind: EntityKind = entity_name.parse()?;
        Ok(self.get(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.descriptors.iter()
    }
}

static REGISTRY: LazyLock<DescriptorRegistry> = LazyLock::new(DescriptorRegistry::build);

/// The process-wide descriptor registry.
pub fn registry() -> &'static DescriptorRegistry {
    &REGISTRY
}

static REGISTERS_FIELDS: &[FieldDescriptor] = &[
    id(true),
    text("regcode"),
    text("sepa"),
    text("name"),
    text("name_before_quotes"),
    text("name_in_quotes"),
    text("name_after_quotes"),
    text("without_quotes"),
    text("regtype"),
    text("regtype_text"),
    text("type"),
    text("type_text"),
    text("registered"),
    text("terminated"),
    text("closed"),
    text("address"),
    text("index_company"),
    text("addressid"),
    text("region"),
    text("city"),
    text("atvk"),
    text("reregistration_term"),
];

static MEMBERS_FIELDS: &[FieldDescriptor] = &[
    id(true),
    text("uri"),
    text("at_legal_entity_registration_number"),
    text("entity_type"),
    text("name"),
    text("latvian_identity_number_masked"),
    text("birth_date"),
    text("legal_entity_registration_number"),
    text("number_of_shares"),
    text("share_nominal_value"),
    text("share_currency"),
    text("date_from"),
    text("registered_on"),
    text("last_modified_at"),
];

static BENEFICIAL_OWNERS_FIELDS: &[FieldDescriptor] = &[
    id(true),
    text("legal_entity_registration_number"),
    text("forename"),
    text("surname"),
    text("latvian_identity_number_masked"),
    text("birth_date"),
    text("nationality"),
    text("residence"),
    text("registered_on"),
    text("last_modified_at"),
];

// The header id is what sub-statements reference through `statement_id`,
// so it is taken from the file whenever the column is present.
static FINANCIAL_STATEMENTS_FIELDS: &[FieldDescriptor] = &[
    id(false),
    text("file_id"),
    text("legal_entity_registration_number"),
    text("source_schema"),
    text("source_type"),
    text("year"),
    text("year_started_on"),
    text("year_ended_on"),
    text("employees"),
    text("rounded_to_nearest"),
    text("currency"),
    text("created_at"),
];

static INCOME_STATEMENTS_FIELDS: &[FieldDescriptor] = &[
    id(true),
    text("statement_id"),
    text("file_id"),
    text("net_turnover"),
    text("by_nature_inventory_change"),
    text("by_nature_long_term_investment_expenses"),
    text("by_nature_other_operating_revenues"),
    text("by_nature_material_expenses"),
    text("by_nature_labour_expenses"),
    text("by_nature_depreciation_expenses"),
    text("by_function_cost_of_goods_sold"),
    text("by_function_gross_profit"),
    text("by_function_selling_expenses"),
    text("by_function_administrative_expenses"),
    text("by_function_other_operating_revenues"),
    text("other_operating_expenses"),
    text("equity_investment_earnings"),
    text("other_long_term_investment_earnings"),
    text("other_interest_revenues"),
    text("investment_fair_value_adjustments"),
    text("interest_expenses"),
    text("extra_revenues"),
    text("extra_expenses"),
    text("income_before_income_taxes"),
    text("provision_for_income_taxes"),
    text("income_after_income_taxes"),
    text("other_taxes"),
    text("extra_dividends"),
    text("net_income"),
];

static BALANCE_SHEETS_FIELDS: &[FieldDescriptor] = &[
    id(true),
    text("statement_id"),
    text("file_id"),
    text("cash"),
    text("marketable_securities"),
    text("accounts_receivable"),
    text("inventories"),
    text("total_current_assets"),
    text("investments"),
    text("fixed_assets"),
    text("intangible_assets"),
    text("total_non_current_assets"),
    text("total_assets"),
    text("future_housing_repairs_payments"),
    text("current_liabilities"),
    text("non_current_liabilities"),
    text("provisions"),
    text("equity"),
    text("total_equities"),
];

static CASH_FLOW_STATEMENTS_FIELDS: &[FieldDescriptor] = &[
    id(true),
    text("statement_id"),
    text("file_id"),
    text("cfo_dm_cash_received_from_customers"),
    text("cfo_dm_cash_paid_to_suppliers_employees"),
    text("cfo_dm_other_cash_received_paid"),
    text("cfo_dm_operating_cash_flow"),
    text("cfo_dm_interest_paid"),
    text("cfo_dm_income_taxes_paid"),
    text("cfo_dm_extra_items_cash_flow"),
    text("cfo_dm_net_operating_cash_flow"),
    text("cfo_im_income_before_income_taxes"),
    text("cfo_im_income_before_changes_in_working_capital"),
    text("cfo_im_operating_cash_flow"),
    text("cfo_im_interest_paid"),
    text("cfo_im_income_taxes_paid"),
    text("cfo_im_extra_items_cash_flow"),
    text("cfo_im_net_operating_cash_flow"),
    text("cfi_acquisition_of_stocks_shares"),
    text("cfi_sale_proceeds_from_stocks_shares"),
    text("cfi_acquisition_of_fixed_assets_intangible_assets"),
    text("cfi_sale_proceeds_from_fixed_assets_intangible_assets"),
    text("cfi_loans_made"),
    text("cfi_repayments_of_loans_received"),
    text("cfi_interest_received"),
    text("cfi_dividends_received"),
    text("cfi_net_investing_cash_flow"),
    text("cff_proceeds_from_stocks_bonds_issuance_or_contributed_capital"),
    text("cff_loans_received"),
    text("cff_subsidies_grants_donations_received"),
    text("cff_repayments_of_loans_made"),
    text("cff_repayments_of_lease_obligations"),
    text("cff_dividends_paid"),
    text("cff_net_financing_cash_flow"),
    text("effect_of_exchange_rate_change"),
    text("net_increase"),
    text("at_beginning_of_year"),
    text("at_end_of_year"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_descriptor_satisfies_invariants() {
        for descriptor in registry().iter() {
            descriptor
                .check_invariants()
                .unwrap_or_else(|e| panic!("{}", e));
        }
    }

    #[test]
    fn registry_is_in_import_order() {
        let names: Vec<_> = registry().iter().map(|d| d.name()).collect();
        let expected: Vec<_> = EntityKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn every_kind_maps_to_its_own_descriptor() {
        for (index, kind) in EntityKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.position(), index);
            assert_eq!(kind.descriptor().kind(), kind);
        }
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let descriptor = registry().resolve("  Beneficial_Owners ").unwrap();
        assert_eq!(descriptor.kind(), EntityKind::BeneficialOwners);
        assert_eq!(descriptor.table(), "beneficial_owners");
    }

    #[test]
    fn resolve_unknown_entity_fails() {
        let err = registry().resolve("officers").unwrap_err();
        assert_eq!(err, RegistryError::UnknownEntity("officers".to_string()));
    }

    #[test]
    fn update_columns_exclude_identifier_and_conflict_target() {
        let registers = EntityKind::Registers.descriptor();
        assert!(!registers.update_columns().contains(&"regcode"));
        assert!(!registers.update_columns().contains(&ID_COLUMN));
        assert!(registers.update_columns().contains(&"index_company"));
        assert_eq!(registers.update_columns().len(), registers.fields().len() - 2);

        let fs = EntityKind::FinancialStatements.descriptor();
        assert_eq!(
            fs.conflict_columns(),
            &["legal_entity_registration_number", "year"]
        );
        assert!(!fs.update_columns().contains(&"year"));
        assert!(fs.update_columns().contains(&"currency"));
    }

    #[test]
    fn only_registers_index_company_is_aliased() {
        let registers = EntityKind::Registers.descriptor();
        let field = registers.fields()[registers.field_index("index_company").unwrap()];
        assert_eq!(registers.source_column(&field), "index");

        for descriptor in registry().iter().filter(|d| d.kind() != EntityKind::Registers) {
            assert!(descriptor.alias_override().is_none());
        }
    }

    #[test]
    fn generated_identifiers_are_read_only_when_they_are_the_conflict_target() {
        let members = EntityKind::Members.descriptor();
        assert!(members.reads_from_source(members.id_field().unwrap()));

        let registers = EntityKind::Registers.descriptor();
        assert!(!registers.reads_from_source(registers.id_field().unwrap()));

        let fs = EntityKind::FinancialStatements.descriptor();
        assert!(fs.reads_from_source(fs.id_field().unwrap()));
    }

    #[test]
    fn source_files_follow_extract_names() {
        assert_eq!(
            EntityKind::Registers.descriptor().source_file_name(),
            "register.csv"
        );
        assert_eq!(
            EntityKind::CashFlowStatements.descriptor().source_file_name(),
            "cash_flow_statements.csv"
        );
    }
}
