/*! Reads relational schemas from JSON documents, normalizes them with [`normalform`]
and renders the result as markdown. */
mod document;
mod report;

pub use document::{DependencySpec, ForeignKeySpec, SchemaDocument};
pub use normalform;
pub use report::Report;

use anyhow::Result;

/// Normalizes the schema document `text` and renders the run as markdown.
pub fn normalize_json(text: &str) -> Result<String> {
    let document = SchemaDocument::from_json(text)?;
    let initial = document.relation()?;
    let normalized = document.normalize()?;
    Ok(Report::new(&initial, &normalized).render())
}
