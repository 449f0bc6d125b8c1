//! Form schema: field definitions, parsing, and schema-file validation.

mod parser;
mod schema;

pub use parser::{FieldSpec, FieldType, FormSchema, SchemaError};
pub use schema::validate_form_schema;
