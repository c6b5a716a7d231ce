/*! Implements functional dependency analysis and schema normalization.

A [`Relation`] declares its attributes, keys, functional dependencies and, optionally,
tuples. A [`Normalizer`] checks it against each normal form from 1NF up to a target
form and decomposes it into relations that satisfy the target.

**Example**:
```rust
use normalform::{Config, FunctionalDependency, NormalForm, Normalizer, Relation};

let mut enrollment = Relation::new("enrollment", vec!["student", "course", "tutor"]).unwrap();
enrollment.set_primary_key(vec!["student", "course"]).unwrap();
enrollment
    .add_dependency(FunctionalDependency::new(vec!["tutor"], vec!["course"]).unwrap())
    .unwrap();

let result = Normalizer::new(Config::default())
    .normalize(&enrollment, NormalForm::BoyceCodd)
    .unwrap();
assert_eq!(2, result.relations().len());
```
*/
mod classify;
mod closure;
mod config;
mod decompose;
mod error;
mod form;
mod normalizer;
mod oracle;
mod schema;
mod tuples;

pub use classify::{
    boyce_codd_normal_form, classify, fifth_normal_form, first_normal_form, fourth_normal_form,
    second_normal_form, third_normal_form, Violation, ViolationKind,
};
pub use closure::{candidate_keys, closure, is_superkey, CandidateKeys, Closure};
pub use config::Config;
pub use decompose::{decompose, decompose_all, NameSequence};
pub use error::{ClassificationError, DecompositionError, Error, SchemaError};
pub use form::{NormalForm, ParseNormalFormError};
pub use normalizer::{LogEntry, Normalized, Normalizer, Stage};
pub use oracle::{Answers, AssumeAtomic, AtomicityOracle, ConfirmationOracle, TrustData};
pub use schema::{
    attributes, join, Attribute, AttributeSet, ForeignKey, FunctionalDependency, Relation, Row,
    Value,
};
pub use tuples::{is_lossless, natural_join, project, Tuples};

/// Is the type of tuples held by [`Tuples`].
pub trait Tuple: Ord + Clone + 'static {}
impl<T: Ord + Clone + 'static> Tuple for T {}
