use crate::{classify::Violation, schema::Attribute};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tells whether a declared attribute holds atomic values. Returning `None` declines
/// to answer, which is reported as a classification error.
pub trait AtomicityOracle {
    fn is_atomic(&mut self, attribute: &Attribute) -> Option<bool>;
}

/// Confirms a multi-valued or join dependency suggested by the tuples of a relation.
/// Returning `None` declines to answer, which is reported as a classification error.
pub trait ConfirmationOracle {
    fn confirm(&mut self, candidate: &Violation) -> Option<bool>;
}

impl<F> AtomicityOracle for F
where
    F: FnMut(&Attribute) -> Option<bool>,
{
    fn is_atomic(&mut self, attribute: &Attribute) -> Option<bool> {
        self(attribute)
    }
}

impl<F> ConfirmationOracle for F
where
    F: FnMut(&Violation) -> Option<bool>,
{
    fn confirm(&mut self, candidate: &Violation) -> Option<bool> {
        self(candidate)
    }
}

/// Treats every attribute as atomic.
#[derive(Clone, Copy, Default, Debug)]
pub struct AssumeAtomic;

impl AtomicityOracle for AssumeAtomic {
    fn is_atomic(&mut self, _: &Attribute) -> Option<bool> {
        Some(true)
    }
}

/// Accepts every dependency the tuples exhibit.
#[derive(Clone, Copy, Default, Debug)]
pub struct TrustData;

impl ConfirmationOracle for TrustData {
    fn confirm(&mut self, _: &Violation) -> Option<bool> {
        Some(true)
    }
}

/// Is a pre-supplied set of answers for both oracles, used for non-interactive runs.
///
/// Attributes without an explicit answer fall back to `default_atomicity`, and
/// candidates fall back to `confirmation`; a missing fallback declines.
#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Answers {
    pub atomicity: BTreeMap<Attribute, bool>,
    pub default_atomicity: Option<bool>,
    pub confirmation: Option<bool>,
    #[serde(skip)]
    asked: Vec<Attribute>,
}

impl Answers {
    /// Creates an answer set that declines every question.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an answer set that considers every attribute atomic and accepts every
    /// candidate dependency.
    pub fn permissive() -> Self {
        Self::new().atomic_by_default().confirm_all(true)
    }

    pub fn atomic<I, A>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        for attribute in attributes {
            self.atomicity.insert(attribute.into(), true);
        }
        self
    }

    pub fn non_atomic<I, A>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        for attribute in attributes {
            self.atomicity.insert(attribute.into(), false);
        }
        self
    }

    pub fn atomic_by_default(mut self) -> Self {
        self.default_atomicity = Some(true);
        self
    }

    pub fn confirm_all(mut self, answer: bool) -> Self {
        self.confirmation = Some(answer);
        self
    }

    /// Returns the attributes asked about, in order.
    pub fn asked(&self) -> &[Attribute] {
        &self.asked
    }
}

impl AtomicityOracle for Answers {
    fn is_atomic(&mut self, attribute: &Attribute) -> Option<bool> {
        self.asked.push(attribute.clone());
        self.atomicity
            .get(attribute)
            .copied()
            .or(self.default_atomicity)
    }
}

impl ConfirmationOracle for Answers {
    fn confirm(&mut self, _: &Violation) -> Option<bool> {
        self.confirmation
    }
}
