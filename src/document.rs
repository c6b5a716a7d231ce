use anyhow::{Context, Result};
use normalform::{
    Answers, Config, FunctionalDependency, NormalForm, Normalized, Normalizer, Relation, Row,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Is a functional dependency as written in a schema document.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DependencySpec {
    pub determinant: Vec<String>,
    pub dependents: Vec<String>,
}

/// Is a foreign key as written in a schema document: either a bare attribute list or
/// an attribute list with the name of the referenced relation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForeignKeySpec {
    Attributes(Vec<String>),
    Reference {
        attributes: Vec<String>,
        references: Option<String>,
    },
}

fn default_target() -> NormalForm {
    NormalForm::BoyceCodd
}

/// Is the input contract of the normalizer: a relation with its keys, dependencies and
/// optional tuples, the normal form to reach and the answers to the questions the
/// normalizer may ask.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub name: String,
    pub attributes: Vec<String>,

    #[serde(default)]
    pub primary_key: Vec<String>,

    #[serde(default)]
    pub candidate_keys: Vec<Vec<String>>,

    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySpec>,

    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,

    #[serde(default)]
    pub tuples: Option<Vec<BTreeMap<String, String>>>,

    #[serde(default = "default_target")]
    pub target: NormalForm,

    #[serde(default)]
    pub config: Config,

    #[serde(default)]
    pub answers: Option<Answers>,
}

impl SchemaDocument {
    /// Parses a schema document from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("malformed schema document")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize schema document")
    }

    /// Builds the validated relation the document describes.
    pub fn relation(&self) -> Result<Relation> {
        let context = || format!("invalid schema `{}`", self.name);

        let mut relation = Relation::new(&self.name, &self.attributes).with_context(context)?;
        if !self.primary_key.is_empty() {
            relation
                .set_primary_key(&self.primary_key)
                .with_context(context)?;
        }
        for key in &self.candidate_keys {
            relation.add_candidate_key(key).with_context(context)?;
        }
        for key in &self.foreign_keys {
            let added = match key {
                ForeignKeySpec::Attributes(attributes) => relation.add_foreign_key(attributes),
                ForeignKeySpec::Reference {
                    attributes,
                    references,
                } => relation.add_foreign_key_reference(attributes, references.clone()),
            };
            added.with_context(context)?;
        }
        for dependency in &self.dependencies {
            let dependency =
                FunctionalDependency::new(&dependency.determinant, &dependency.dependents)
                    .with_context(context)?;
            relation.add_dependency(dependency).with_context(context)?;
        }
        for tuple in self.tuples.iter().flatten() {
            let row: Row = tuple
                .iter()
                .map(|(attribute, value)| (attribute.as_str().into(), value.clone()))
                .collect();
            relation.add_tuple(row).with_context(context)?;
        }

        debug!(relation = %relation, "schema loaded");
        Ok(relation)
    }

    /// Normalizes the relation of the document up to its target form.
    pub fn normalize(&self) -> Result<Normalized> {
        let relation = self.relation()?;
        let mut normalizer = Normalizer::new(self.config.clone());
        if let Some(answers) = &self.answers {
            normalizer = normalizer
                .with_atomicity(answers.clone())
                .with_confirmation(answers.clone());
        }
        normalizer
            .normalize(&relation, self.target)
            .with_context(|| format!("failed to normalize `{}`", relation.name()))
    }
}
