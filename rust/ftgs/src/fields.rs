//! Field selection of an FTGS iteration.

use ftgs_common::{Result, error::Error};
use ftgs_index::IndexReader;
use serde::{Deserialize, Serialize};

/// The fields an iteration visits: integer fields first, then string fields, each
/// list in its own order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FtgsFields {
    pub int_fields: Vec<String>,
    pub string_fields: Vec<String>,
}

/// A single field of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldRef {
    pub name: String,
    pub is_int: bool,
}

impl FtgsFields {
    pub fn new() -> FtgsFields {
        FtgsFields::default()
    }

    /// Every field of `reader`, in the order the reader lists them.
    pub fn all(reader: &dyn IndexReader) -> FtgsFields {
        FtgsFields {
            int_fields: reader.int_fields(),
            string_fields: reader.string_fields(),
        }
    }

    pub fn with_int_field(mut self, name: impl Into<String>) -> FtgsFields {
        self.int_fields.push(name.into());
        self
    }

    pub fn with_string_field(mut self, name: impl Into<String>) -> FtgsFields {
        self.string_fields.push(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.int_fields.len() + self.string_fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One single-field selection per field, in visiting order.
    pub fn split(&self) -> Vec<FtgsFields> {
        let ints = self
            .int_fields
            .iter()
            .map(|f| FtgsFields::new().with_int_field(f.clone()));
        let strings = self
            .string_fields
            .iter()
            .map(|f| FtgsFields::new().with_string_field(f.clone()));
        ints.chain(strings).collect()
    }

    /// Checks that `reader` has every selected field, with the selected kind.
    pub fn verify(&self, reader: &dyn IndexReader) -> Result<()> {
        let check = |selected: &[String], available: Vec<String>, kind: &str| {
            match selected.iter().find(|f| !available.contains(f)) {
                Some(missing) => Err(Error::invalid_arg(
                    "fields",
                    format!("no {kind} field '{missing}'"),
                )),
                None => Ok(()),
            }
        };
        check(&self.int_fields, reader.int_fields(), "int")?;
        check(&self.string_fields, reader.string_fields(), "string")
    }

    pub(crate) fn to_refs(&self) -> Vec<FieldRef> {
        let ints = self.int_fields.iter().map(|name| FieldRef {
            name: name.clone(),
            is_int: true,
        });
        let strings = self.string_fields.iter().map(|name| FieldRef {
            name: name.clone(),
            is_int: false,
        });
        ints.chain(strings).collect()
    }
}
