use crate::descriptor::{EntityDescriptor, EntityKind, ID_COLUMN};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One mapped row, aligned with its descriptor's field list.
///
/// `values[i]` belongs to `descriptor.fields()[i]`; the identifier slot is
/// always `None` and the identifier lives in `id` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedRecord {
    kind: EntityKind,
    id: Option<i64>,
    values: Vec<Option<String>>,
}

impl TypedRecord {
    pub fn new(kind: EntityKind) -> Self {
        let len = kind.descriptor().fields().len();
        Self {
            kind,
            id: None,
            values: vec![None; len],
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.kind.descriptor()
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    /// Text value of `column`; `None` for null and unknown columns.
    pub fn get(&self, column: &str) -> Option<&str> {
        let index = self.descriptor().field_index(column)?;
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Sets a text column. Returns `false` when the column does not exist.
    pub fn set(&mut self, column: &str, value: Option<String>) -> bool {
        if column == ID_COLUMN {
            return false;
        }
        match self.descriptor().field_index(column) {
            Some(index) => {
                self.values[index] = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_at(&mut self, index: usize, value: Option<String>) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Column/value pairs for every non-identifier field, in field order.
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> + '_ {
        self.descriptor()
            .fields()
            .iter()
            .zip(self.values.iter())
            .filter(|(field, _)| !field.is_id())
            .map(|(field, value)| (field.column, value.as_deref()))
    }

    /// Value bound to `column` at write time, identifier included.
    pub fn column_value(&self, column: &str) -> Option<String> {
        if column == ID_COLUMN {
            return self.id.map(|id| id.to_string());
        }
        self.get(column).map(str::to_string)
    }
}

impl Serialize for TypedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = self.id {
            map.serialize_entry(ID_COLUMN, &id)?;
        }
        for (column, value) in self.columns() {
            map.serialize_entry(column, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_by_column() {
        let mut record = TypedRecord::new(EntityKind::Registers);
        assert!(record.set("regcode", Some("40003000001".into())));
        assert!(!record.set("no_such_column", Some("x".into())));
        assert!(!record.set(ID_COLUMN, Some("1".into())));

        assert_eq!(record.get("regcode"), Some("40003000001"));
        assert_eq!(record.get("name"), None);
        assert_eq!(record.id(), None);
    }

    #[test]
    fn column_value_includes_identifier() {
        let mut record = TypedRecord::new(EntityKind::Members);
        record.set_id(Some(42));
        assert_eq!(record.column_value(ID_COLUMN), Some("42".to_string()));
        assert_eq!(record.column_value("name"), None);
    }

    #[test]
    fn serializes_nulls_and_identifier() {
        let mut record = TypedRecord::new(EntityKind::BeneficialOwners);
        record.set_id(Some(7));
        record.set("forename", Some("Anna".into()));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["forename"], "Anna");
        assert!(json["surname"].is_null());
        assert!(json.as_object().unwrap().contains_key("surname"));
    }
}
