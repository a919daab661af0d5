use crate::descriptor::{EntityDescriptor, FieldDescriptor, FieldKind};
use crate::error::{FieldError, RowError};
use crate::reader::{HeaderIndex, RawRow};
use crate::record::TypedRecord;

/// Map one raw row onto a fresh typed record.
///
/// Fields are visited in descriptor order. Columns missing from the header
/// are left null. Every field error of the row is collected; if there is at
/// least one, the row is rejected as a whole.
pub fn map_row(
    row: &RawRow,
    header: &HeaderIndex,
    descriptor: &EntityDescriptor,
) -> Result<TypedRecord, RowError> {
    let mut record = TypedRecord::new(descriptor.kind());
    let mut errors = Vec::new();

    for (position, field) in descriptor.fields().iter().enumerate() {
        if !descriptor.reads_from_source(field) {
            continue;
        }

        let source = descriptor.source_column(field);
        let Some(index) = header.get(&source) else {
            continue;
        };
        let Some(cell) = row.get(index) else {
            errors.push(FieldError::ShortRow {
                column: field.column,
                index,
                len: row.len(),
            });
            continue;
        };

        let text = cell.trim();
        match field.kind {
            FieldKind::Id { auto_generated } => match parse_identifier(field, text, auto_generated) {
                Ok(id) => record.set_id(id),
                Err(e) => errors.push(e),
            },
            FieldKind::NullableText => {
                let value = (!text.is_empty()).then(|| text.to_string());
                record.set_at(position, value);
            }
        }
    }

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(RowError::Mapping {
            line: row.line,
            errors,
        })
    }
}

fn parse_identifier(
    field: &FieldDescriptor,
    text: &str,
    auto_generated: bool,
) -> Result<Option<i64>, FieldError> {
    if text.is_empty() {
        return if auto_generated {
            Ok(None)
        } else {
            Err(FieldError::MissingRequiredKey {
                column: field.column,
            })
        };
    }

    let invalid = || FieldError::InvalidIdentifier {
        column: field.column,
        value: text.to_string(),
    };
    let id = text.parse::<u64>().map_err(|_| invalid())?;
    i64::try_from(id).map(Some).map_err(|_| invalid())
}
