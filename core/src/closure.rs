use crate::schema::{Attribute, AttributeSet, FunctionalDependency, Relation};
use itertools::Itertools;
use tracing::warn;

/// Computes the closure of `attributes` under `dependencies`: the set of attributes
/// functionally determined by `attributes`.
pub fn closure(attributes: &AttributeSet, dependencies: &[FunctionalDependency]) -> AttributeSet {
    let mut result = attributes.clone();
    let mut pending: Vec<&FunctionalDependency> = dependencies.iter().collect();

    loop {
        let before = pending.len();
        pending.retain(|fd| {
            if fd.determinant().is_subset(&result) {
                result.extend(fd.dependents().iter().cloned());
                false
            } else {
                true
            }
        });
        if pending.len() == before {
            break;
        }
    }

    result
}

/// Returns true if `attributes` determine every attribute of `relation`.
pub fn is_superkey(attributes: &AttributeSet, relation: &Relation) -> bool {
    Closure::new(relation).is_superkey(attributes)
}

/// Enumerates the candidate keys of `relation`, searching exhaustively only when the
/// relation has at most `limit` attributes.
pub fn candidate_keys(relation: &Relation, limit: usize) -> CandidateKeys {
    Closure::new(relation).candidate_keys(limit)
}

/// Is the result of a candidate key search.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CandidateKeys {
    /// Are the keys found, smallest first.
    pub keys: Vec<AttributeSet>,

    /// Is false when the search was skipped and `keys` only holds the declared keys.
    pub exhaustive: bool,
}

impl CandidateKeys {
    /// Returns the attributes that belong to some key.
    pub fn prime_attributes(&self) -> AttributeSet {
        self.keys.iter().flatten().cloned().collect()
    }
}

/// Computes closures over the declared and key-implied dependencies of a relation.
pub struct Closure<'r> {
    relation: &'r Relation,
    dependencies: Vec<FunctionalDependency>,
    all: AttributeSet,
}

impl<'r> Closure<'r> {
    pub fn new(relation: &'r Relation) -> Self {
        Self {
            relation,
            dependencies: relation.implied_dependencies(),
            all: relation.attribute_set(),
        }
    }

    /// Returns the closure of `attributes` within the relation.
    pub fn of(&self, attributes: &AttributeSet) -> AttributeSet {
        closure(attributes, &self.dependencies)
    }

    pub fn is_superkey(&self, attributes: &AttributeSet) -> bool {
        self.of(attributes) == self.all
    }

    /// Returns the keys declared on the relation: its primary key and candidate keys.
    pub fn declared_keys(&self) -> Vec<AttributeSet> {
        let mut keys: Vec<AttributeSet> = Vec::new();
        let primary = self.relation.primary_key_set();
        if !primary.is_empty() {
            keys.push(primary);
        }
        for key in self.relation.candidate_keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// Removes attributes from `key` for as long as it stays a superkey.
    fn minimize(&self, mut key: AttributeSet) -> AttributeSet {
        for attribute in key.clone() {
            key.remove(&attribute);
            if !self.is_superkey(&key) {
                key.insert(attribute);
            }
        }
        key
    }

    pub fn candidate_keys(&self, limit: usize) -> CandidateKeys {
        if self.all.len() > limit {
            warn!(
                relation = self.relation.name(),
                attributes = self.all.len(),
                limit,
                "candidate key search skipped, keeping declared keys"
            );
            return CandidateKeys {
                keys: self.declared_keys(),
                exhaustive: false,
            };
        }

        // attributes that are never determined by others belong to every key
        let determined: AttributeSet = self
            .dependencies
            .iter()
            .flat_map(|fd| fd.dependents().difference(fd.determinant()))
            .cloned()
            .collect();
        let core: AttributeSet = self.all.difference(&determined).cloned().collect();
        if self.is_superkey(&core) {
            return CandidateKeys {
                keys: vec![core],
                exhaustive: true,
            };
        }

        let mut keys: Vec<AttributeSet> = Vec::new();
        for declared in self.declared_keys() {
            if self.is_superkey(&declared) {
                let key = self.minimize(declared);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let rest: Vec<&Attribute> = self
            .relation
            .attributes()
            .iter()
            .filter(|a| !core.contains(*a))
            .collect();
        for size in 1..=rest.len() {
            for combination in rest.iter().combinations(size) {
                let mut candidate = core.clone();
                candidate.extend(combination.into_iter().map(|a| (*a).clone()));
                if keys.iter().any(|key| key.is_subset(&candidate)) {
                    continue;
                }
                if self.is_superkey(&candidate) {
                    keys.push(candidate);
                }
            }
        }

        keys.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        CandidateKeys {
            keys,
            exhaustive: true,
        }
    }

    /// Returns the attributes of the primary key, the declared candidate keys and the
    /// computed candidate keys.
    pub fn prime_attributes(&self, limit: usize) -> AttributeSet {
        let mut prime = self.candidate_keys(limit).prime_attributes();
        for key in self.declared_keys() {
            prime.extend(key);
        }
        prime
    }
}
