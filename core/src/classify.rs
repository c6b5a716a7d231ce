mod data;

use crate::{
    closure::Closure,
    config::Config,
    error::ClassificationError,
    form::NormalForm,
    oracle::{AtomicityOracle, ConfirmationOracle},
    schema::{join, AttributeSet, Relation},
};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use tracing::debug;

pub use data::{fifth_normal_form, fourth_normal_form};

/// Is the rule a violation breaks.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub enum ViolationKind {
    /// An attribute holds multi-valued or composite values (1NF).
    NonAtomic,

    /// A proper subset of the primary key determines other attributes (2NF).
    PartialDependency,

    /// A non-superkey determines non-prime attributes (3NF).
    TransitiveDependency,

    /// A non-superkey determines other attributes (BCNF).
    NonSuperkeyDeterminant,

    /// The dependents vary independently of the rest of the relation for a fixed
    /// determinant (4NF).
    MultiValuedDependency,

    /// The relation is the join of its `components` but not of any two projections (5NF).
    JoinDependency { components: Vec<AttributeSet> },
}

impl ViolationKind {
    /// Returns the normal form whose rule this kind breaks.
    pub fn form(&self) -> NormalForm {
        use ViolationKind::*;
        match self {
            NonAtomic => NormalForm::First,
            PartialDependency => NormalForm::Second,
            TransitiveDependency => NormalForm::Third,
            NonSuperkeyDeterminant => NormalForm::BoyceCodd,
            MultiValuedDependency => NormalForm::Fourth,
            JoinDependency { .. } => NormalForm::Fifth,
        }
    }

    pub fn rule(&self) -> &'static str {
        use ViolationKind::*;
        match self {
            NonAtomic => "non-atomic attribute",
            PartialDependency => "partial dependency",
            TransitiveDependency => "transitive dependency",
            NonSuperkeyDeterminant => "non-superkey determinant",
            MultiValuedDependency => "multi-valued dependency",
            JoinDependency { .. } => "join dependency",
        }
    }
}

/// Is a detected violation of a normal form: `dependents` must move out of the relation
/// along with their `determinant`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub determinant: AttributeSet,
    pub dependents: AttributeSet,
}

impl Violation {
    pub fn new(kind: ViolationKind, determinant: AttributeSet, dependents: AttributeSet) -> Self {
        Self {
            kind,
            determinant,
            dependents,
        }
    }

    pub fn form(&self) -> NormalForm {
        self.kind.form()
    }

    /// Returns every attribute the violation mentions.
    pub fn attributes(&self) -> AttributeSet {
        let mut result: AttributeSet = self.determinant.union(&self.dependents).cloned().collect();
        if let ViolationKind::JoinDependency { components } = &self.kind {
            result.extend(components.iter().flatten().cloned());
        }
        result
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::NonAtomic => {
                write!(f, "{}: {}", self.kind.rule(), join(&self.dependents))
            }
            ViolationKind::MultiValuedDependency => write!(
                f,
                "{}: {} ->> {}",
                self.kind.rule(),
                join(&self.determinant),
                join(&self.dependents)
            ),
            ViolationKind::JoinDependency { components } => {
                let components = components
                    .iter()
                    .map(|c| format!("{{{}}}", join(c)))
                    .collect::<Vec<_>>();
                write!(f, "{}: *({})", self.kind.rule(), components.join(", "))
            }
            _ => write!(
                f,
                "{}: {} -> {}",
                self.kind.rule(),
                join(&self.determinant),
                join(&self.dependents)
            ),
        }
    }
}

/// Finds the non-atomic attributes of `relation`, asking `oracle` once per attribute.
pub fn first_normal_form<A>(
    relation: &Relation,
    oracle: &mut A,
) -> Result<Vec<Violation>, ClassificationError>
where
    A: AtomicityOracle + ?Sized,
{
    let key = relation.primary_key_set();
    let mut result = Vec::new();
    for attribute in relation.attributes() {
        let atomic =
            oracle
                .is_atomic(attribute)
                .ok_or_else(|| ClassificationError::OracleDeclined {
                    relation: relation.name().to_string(),
                    question: format!("is `{}` atomic?", attribute),
                })?;
        if !atomic {
            let mut dependents = AttributeSet::new();
            dependents.insert(attribute.clone());
            result.push(Violation::new(ViolationKind::NonAtomic, key.clone(), dependents));
        }
    }
    Ok(result)
}

/// Finds the dependencies whose determinant is a proper subset of a composite primary
/// key. Dependents of the primary key itself are reported too: a proper subset of the
/// key determining other key attributes makes the key reducible. Foreign key attributes
/// outside the primary key count as key attributes and are never reported.
pub fn second_normal_form(relation: &Relation, config: &Config) -> Vec<Violation> {
    let key = relation.primary_key_set();
    if key.len() < 2 {
        return Vec::new();
    }
    let closure = Closure::new(relation);
    let prime = closure.prime_attributes(config.key_search_limit);
    let other_prime: AttributeSet = prime.difference(&key).cloned().collect();
    let referencing: AttributeSet = relation
        .foreign_keys()
        .iter()
        .flat_map(|fk| fk.attributes.difference(&key))
        .cloned()
        .collect();

    relation
        .dependencies()
        .iter()
        .filter_map(|fd| {
            let determinant = fd.determinant();
            if !determinant.is_subset(&key) || determinant.len() == key.len() {
                return None;
            }
            let dependents: AttributeSet = fd
                .dependents()
                .iter()
                .filter(|a| !determinant.contains(*a) && !referencing.contains(*a))
                .cloned()
                .collect();
            if dependents.is_empty() || !dependents.is_disjoint(&other_prime) {
                return None;
            }
            Some(Violation::new(
                ViolationKind::PartialDependency,
                determinant.clone(),
                dependents,
            ))
        })
        .collect()
}

/// Finds the non-superkey determinants of non-prime attributes, grouping the
/// dependents of each determinant into one violation.
pub fn third_normal_form(relation: &Relation, config: &Config) -> Vec<Violation> {
    let closure = Closure::new(relation);
    let prime = closure.prime_attributes(config.key_search_limit);

    let mut groups: IndexMap<AttributeSet, AttributeSet> = IndexMap::new();
    for fd in relation.dependencies() {
        let determinant = fd.determinant();
        if closure.is_superkey(determinant) {
            continue;
        }
        let dependents: AttributeSet = fd
            .dependents()
            .iter()
            .filter(|a| !determinant.contains(*a) && !prime.contains(*a))
            .cloned()
            .collect();
        if !dependents.is_empty() {
            groups
                .entry(determinant.clone())
                .or_default()
                .extend(dependents);
        }
    }

    groups
        .into_iter()
        .map(|(determinant, dependents)| {
            Violation::new(ViolationKind::TransitiveDependency, determinant, dependents)
        })
        .collect()
}

/// Finds the dependencies whose determinant is not a superkey.
pub fn boyce_codd_normal_form(relation: &Relation) -> Vec<Violation> {
    let closure = Closure::new(relation);
    relation
        .dependencies()
        .iter()
        .filter(|fd| !closure.is_superkey(fd.determinant()))
        .filter_map(|fd| {
            let dependents: AttributeSet = fd
                .dependents()
                .difference(fd.determinant())
                .cloned()
                .collect();
            if dependents.is_empty() {
                None
            } else {
                Some(Violation::new(
                    ViolationKind::NonSuperkeyDeterminant,
                    fd.determinant().clone(),
                    dependents,
                ))
            }
        })
        .collect()
}

/// Checks `relation` against `form`, returning the violations found.
pub fn classify<A, C>(
    relation: &Relation,
    form: NormalForm,
    config: &Config,
    atomicity: &mut A,
    confirmation: &mut C,
) -> Result<Vec<Violation>, ClassificationError>
where
    A: AtomicityOracle + ?Sized,
    C: ConfirmationOracle + ?Sized,
{
    let violations = match form {
        NormalForm::First => first_normal_form(relation, atomicity)?,
        NormalForm::Second => second_normal_form(relation, config),
        NormalForm::Third => third_normal_form(relation, config),
        NormalForm::BoyceCodd => boyce_codd_normal_form(relation),
        NormalForm::Fourth => fourth_normal_form(relation, config, confirmation)?,
        NormalForm::Fifth => fifth_normal_form(relation, config, confirmation)?,
    };
    debug!(
        relation = relation.name(),
        form = %form,
        violations = violations.len(),
        "classified"
    );
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        oracle::{Answers, AssumeAtomic},
        schema::{attributes, Attribute, FunctionalDependency},
    };

    fn fd(x: &[&str], y: &[&str]) -> FunctionalDependency {
        FunctionalDependency::new(x.iter().copied(), y.iter().copied()).unwrap()
    }

    fn relation(attrs: &[&str], key: &[&str], fds: &[FunctionalDependency]) -> Relation {
        let mut r = Relation::new("r", attrs.iter().copied()).unwrap();
        r.set_primary_key(key.iter().copied()).unwrap();
        for d in fds {
            r.add_dependency(d.clone()).unwrap();
        }
        r
    }

    #[test]
    fn test_first_normal_form() {
        let r = relation(&["id", "name", "phone"], &["id"], &[]);
        {
            let mut answers = Answers::new().non_atomic(vec!["phone"]).atomic_by_default();
            let violations = first_normal_form(&r, &mut answers).unwrap();
            assert_eq!(
                vec![Violation::new(
                    ViolationKind::NonAtomic,
                    attributes(vec!["id"]),
                    attributes(vec!["phone"])
                )],
                violations
            );
            assert_eq!(3, answers.asked().len());
        }
        {
            assert!(first_normal_form(&r, &mut AssumeAtomic).unwrap().is_empty());
        }
        {
            let mut answers = Answers::new().atomic(vec!["id"]);
            assert_eq!(
                Err(ClassificationError::OracleDeclined {
                    relation: "r".into(),
                    question: "is `name` atomic?".into()
                }),
                first_normal_form(&r, &mut answers)
            );
        }
        {
            let mut oracle = |attribute: &Attribute| Some(attribute.name() == "id");
            assert_eq!(2, first_normal_form(&r, &mut oracle).unwrap().len());
        }
    }

    #[test]
    fn test_second_normal_form() {
        let config = Config::default();
        {
            let r = relation(
                &["fname", "lname", "ssn", "home_address"],
                &["ssn", "home_address"],
                &[fd(&["ssn"], &["home_address"])],
            );
            assert_eq!(
                vec![Violation::new(
                    ViolationKind::PartialDependency,
                    attributes(vec!["ssn"]),
                    attributes(vec!["home_address"])
                )],
                second_normal_form(&r, &config)
            );
        }
        {
            let r = relation(
                &["student", "course", "name", "grade"],
                &["student", "course"],
                &[
                    fd(&["student"], &["name"]),
                    fd(&["student", "course"], &["grade"]),
                ],
            );
            assert_eq!(
                vec![Violation::new(
                    ViolationKind::PartialDependency,
                    attributes(vec!["student"]),
                    attributes(vec!["name"])
                )],
                second_normal_form(&r, &config)
            );
        }
        {
            // single attribute keys cannot have partial dependencies
            let r = relation(&["a", "b", "c"], &["a"], &[fd(&["b"], &["c"])]);
            assert!(second_normal_form(&r, &config).is_empty());
        }
        {
            // foreign key attributes count as key attributes
            let mut r = relation(
                &["a", "b", "c", "d"],
                &["a", "b"],
                &[fd(&["a"], &["c", "d"]), fd(&["b"], &["c"])],
            );
            r.add_foreign_key(vec!["c"]).unwrap();
            assert_eq!(
                vec![Violation::new(
                    ViolationKind::PartialDependency,
                    attributes(vec!["a"]),
                    attributes(vec!["d"])
                )],
                second_normal_form(&r, &config)
            );
        }
        {
            // dependents that belong to another candidate key are not partial
            let mut r = relation(
                &["a", "b", "c"],
                &["a", "b"],
                &[fd(&["a"], &["c"])],
            );
            r.add_candidate_key(vec!["c", "b"]).unwrap();
            assert!(second_normal_form(&r, &config).is_empty());
        }
    }

    #[test]
    fn test_third_normal_form() {
        let config = Config::default();
        {
            let r = relation(
                &["k", "a", "b", "c"],
                &["k"],
                &[
                    fd(&["k"], &["a"]),
                    fd(&["a"], &["b"]),
                    fd(&["a"], &["c"]),
                ],
            );
            assert_eq!(
                vec![Violation::new(
                    ViolationKind::TransitiveDependency,
                    attributes(vec!["a"]),
                    attributes(vec!["b", "c"])
                )],
                third_normal_form(&r, &config)
            );
        }
        {
            // a prime dependent is allowed by 3NF
            let r = relation(&["s", "c", "t"], &["s", "c"], &[fd(&["t"], &["c"])]);
            assert!(third_normal_form(&r, &config).is_empty());
        }
        {
            let r = relation(&["k", "a"], &["k"], &[fd(&["k"], &["a"])]);
            assert!(third_normal_form(&r, &config).is_empty());
        }
    }

    #[test]
    fn test_boyce_codd_normal_form() {
        {
            let r = relation(&["s", "c", "t"], &["s", "c"], &[fd(&["t"], &["c"])]);
            assert_eq!(
                vec![Violation::new(
                    ViolationKind::NonSuperkeyDeterminant,
                    attributes(vec!["t"]),
                    attributes(vec!["c"])
                )],
                boyce_codd_normal_form(&r)
            );
        }
        {
            let r = relation(
                &["a", "b", "c"],
                &["a"],
                &[fd(&["a"], &["b"]), fd(&["b"], &["b"])],
            );
            assert!(boyce_codd_normal_form(&r).is_empty());
        }
    }

    #[test]
    fn test_classify_dispatch() {
        let config = Config::default();
        let r = relation(&["s", "c", "t"], &["s", "c"], &[fd(&["t"], &["c"])]);
        let mut atomicity = AssumeAtomic;
        let mut confirmation = Answers::new();
        assert!(classify(&r, NormalForm::Third, &config, &mut atomicity, &mut confirmation)
            .unwrap()
            .is_empty());
        assert_eq!(
            1,
            classify(&r, NormalForm::BoyceCodd, &config, &mut atomicity, &mut confirmation)
                .unwrap()
                .len()
        );
        assert_eq!(
            Err(ClassificationError::MissingTuples {
                relation: "r".into(),
                form: NormalForm::Fourth
            }),
            classify(&r, NormalForm::Fourth, &config, &mut atomicity, &mut confirmation)
        );
    }

    #[test]
    fn test_display_violation() {
        let v = Violation::new(
            ViolationKind::PartialDependency,
            attributes(vec!["ssn"]),
            attributes(vec!["home_address"]),
        );
        assert_eq!("partial dependency: ssn -> home_address", v.to_string());
        let v = Violation::new(
            ViolationKind::JoinDependency {
                components: vec![attributes(vec!["a", "b"]), attributes(vec!["b", "c"])],
            },
            AttributeSet::new(),
            attributes(vec!["a", "b", "c"]),
        );
        assert_eq!("join dependency: *({a, b}, {b, c})", v.to_string());
    }
}
