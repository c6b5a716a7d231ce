use crate::{form::NormalForm, schema::Attribute};
use thiserror::Error;

/// Is returned when a relation, key, dependency or tuple is malformed.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum SchemaError {
    /// Is returned when a relation is created with a blank name.
    #[error("relation name cannot be empty")]
    EmptyName,

    /// Is returned when a relation, or one of its keys, is given no attributes.
    #[error("empty attribute set in relation `{relation}`")]
    EmptyAttributeSet { relation: String },

    /// Is returned when the same attribute is declared twice in one attribute list.
    #[error("attribute `{attribute}` is declared more than once in relation `{relation}`")]
    DuplicateAttribute {
        relation: String,
        attribute: Attribute,
    },

    /// Is returned when a key or a dependency mentions an attribute the relation lacks.
    #[error("attribute `{attribute}` does not exist in relation `{relation}`")]
    UnknownAttribute {
        relation: String,
        attribute: Attribute,
    },

    /// Is returned when a relation without a primary key is handed to the normalizer.
    #[error("relation `{relation}` has no primary key")]
    MissingPrimaryKey { relation: String },

    /// Is returned when the attributes of a tuple differ from those of its relation.
    #[error("tuple #{index} does not match the attributes of relation `{relation}`")]
    TupleMismatch { relation: String, index: usize },

    /// Is returned when a functional dependency has no determinant.
    #[error("functional dependency with an empty determinant")]
    EmptyDeterminant,

    /// Is returned when a functional dependency has no dependents.
    #[error("functional dependency with no dependents")]
    EmptyDependents,
}

/// Is returned when a relation cannot be classified against a normal form.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum ClassificationError {
    /// Is returned when a data-driven check runs on a relation without tuples.
    #[error("{form} check on relation `{relation}` requires tuples")]
    MissingTuples { relation: String, form: NormalForm },

    /// Is returned when an oracle declines to answer.
    #[error("no answer for relation `{relation}`: {question}")]
    OracleDeclined { relation: String, question: String },
}

/// Is returned when a detected violation cannot be decomposed.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum DecompositionError {
    /// Is returned when a violation names an attribute missing from the relation.
    #[error("violation references attribute `{attribute}` absent from relation `{relation}`")]
    UnknownAttribute {
        relation: String,
        attribute: Attribute,
    },

    /// Is returned when a primary key attribute would have to be moved out of its relation.
    #[error("primary key attribute `{attribute}` of relation `{relation}` cannot be relocated")]
    KeyAttribute {
        relation: String,
        attribute: Attribute,
    },

    /// Is returned when a multi-valued or join dependency is decomposed without tuples.
    #[error("relation `{relation}` has no tuples to project")]
    MissingTuples { relation: String },

    /// Is returned when rejoining the decomposed relations does not reproduce the original tuples.
    #[error("decomposition of relation `{relation}` is not lossless")]
    Lossy { relation: String },

    /// Is returned when a stage keeps producing violations after its pass limit.
    #[error("{form} did not converge after {passes} passes")]
    Diverged { form: NormalForm, passes: usize },

    /// Is returned when a decomposed relation fails schema validation.
    #[error("inconsistent decomposition: {0}")]
    Inconsistent(#[from] SchemaError),
}

/// Is the error type of the normalization pipeline.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Decomposition(#[from] DecompositionError),
}
