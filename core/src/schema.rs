use crate::error::SchemaError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::{
    borrow::Borrow,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// Is the name of a column in a relation. Attributes compare and hash by name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribute(String);

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Attribute {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Attribute {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Attribute {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&String> for Attribute {
    fn from(name: &String) -> Self {
        Self(name.clone())
    }
}

impl From<&Attribute> for Attribute {
    fn from(attribute: &Attribute) -> Self {
        attribute.clone()
    }
}

/// Is an order-irrelevant set of attributes.
pub type AttributeSet = BTreeSet<Attribute>;

/// Is the value of an attribute in a tuple.
pub type Value = String;

/// Is a tuple of a relation, mapping every attribute of the relation to a value.
pub type Row = BTreeMap<Attribute, Value>;

/// Collects `names` into an [`AttributeSet`].
pub fn attributes<I, A>(names: I) -> AttributeSet
where
    I: IntoIterator<Item = A>,
    A: Into<Attribute>,
{
    names.into_iter().map(Into::into).collect()
}

/// Formats an attribute set as a comma separated list.
pub fn join(attributes: &AttributeSet) -> String {
    attributes
        .iter()
        .map(Attribute::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Is a functional dependency `X -> Y`: tuples that agree on the determinant `X`
/// agree on the dependents `Y`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct FunctionalDependency {
    determinant: AttributeSet,
    dependents: AttributeSet,
}

impl FunctionalDependency {
    /// Creates a dependency from non-empty determinant and dependent sets.
    pub fn new<X, Y, A, B>(determinant: X, dependents: Y) -> Result<Self, SchemaError>
    where
        X: IntoIterator<Item = A>,
        Y: IntoIterator<Item = B>,
        A: Into<Attribute>,
        B: Into<Attribute>,
    {
        let determinant = attributes(determinant);
        let dependents = attributes(dependents);
        if determinant.is_empty() {
            return Err(SchemaError::EmptyDeterminant);
        }
        if dependents.is_empty() {
            return Err(SchemaError::EmptyDependents);
        }
        Ok(Self {
            determinant,
            dependents,
        })
    }

    #[inline(always)]
    pub fn determinant(&self) -> &AttributeSet {
        &self.determinant
    }

    #[inline(always)]
    pub fn dependents(&self) -> &AttributeSet {
        &self.dependents
    }

    /// Returns true if the dependents are contained in the determinant.
    pub fn is_trivial(&self) -> bool {
        self.dependents.is_subset(&self.determinant)
    }

    /// Returns every attribute mentioned by the dependency.
    pub fn attributes(&self) -> AttributeSet {
        self.determinant.union(&self.dependents).cloned().collect()
    }

    /// Returns a copy of the receiver whose determinant is replaced by `determinant`,
    /// keeping the dependents. Every attribute of the new determinant must belong to
    /// `relation`.
    pub fn retarget(
        &self,
        determinant: AttributeSet,
        relation: &Relation,
    ) -> Result<Self, SchemaError> {
        if determinant.is_empty() {
            return Err(SchemaError::EmptyDeterminant);
        }
        relation.check_known(determinant.iter())?;
        Ok(Self {
            determinant,
            dependents: self.dependents.clone(),
        })
    }

    /// Restricts the dependency to `attributes`: the determinant must be inside
    /// `attributes`; dependents outside of it, or inside the determinant, are dropped.
    pub(crate) fn project_onto(&self, attributes: &AttributeSet) -> Option<Self> {
        if !self.determinant.is_subset(attributes) {
            return None;
        }
        let dependents: AttributeSet = self
            .dependents
            .iter()
            .filter(|a| attributes.contains(*a) && !self.determinant.contains(*a))
            .cloned()
            .collect();
        if dependents.is_empty() {
            None
        } else {
            Some(Self {
                determinant: self.determinant.clone(),
                dependents,
            })
        }
    }
}

impl fmt::Display for FunctionalDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", join(&self.determinant), join(&self.dependents))
    }
}

/// Is a foreign key of a relation. `references` names the target relation when known.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ForeignKey {
    pub attributes: AttributeSet,
    pub references: Option<String>,
}

/// Is the unit of normalization: a named set of attributes annotated with keys,
/// functional dependencies and, optionally, tuples.
///
/// Every key and dependency added to a relation is validated against its attributes.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Relation {
    name: String,
    attributes: IndexSet<Attribute>,
    primary_key: Vec<Attribute>,
    candidate_keys: Vec<AttributeSet>,
    foreign_keys: Vec<ForeignKey>,
    dependencies: Vec<FunctionalDependency>,
    tuples: Option<Vec<Row>>,
}

impl Relation {
    /// Creates a relation with `name` and `attributes`, in the given order.
    pub fn new<I, A>(name: &str, attributes: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchemaError::EmptyName);
        }

        let mut set = IndexSet::new();
        for attribute in attributes.into_iter().map(Into::into) {
            if set.contains(&attribute) {
                return Err(SchemaError::DuplicateAttribute {
                    relation: name.to_string(),
                    attribute,
                });
            }
            set.insert(attribute);
        }
        if set.is_empty() {
            return Err(SchemaError::EmptyAttributeSet {
                relation: name.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            attributes: set,
            primary_key: Vec::new(),
            candidate_keys: Vec::new(),
            foreign_keys: Vec::new(),
            dependencies: Vec::new(),
            tuples: None,
        })
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attributes of the receiver in declaration order.
    #[inline(always)]
    pub fn attributes(&self) -> &IndexSet<Attribute> {
        &self.attributes
    }

    pub fn attribute_set(&self) -> AttributeSet {
        self.attributes.iter().cloned().collect()
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }

    #[inline(always)]
    pub fn primary_key(&self) -> &[Attribute] {
        &self.primary_key
    }

    pub fn primary_key_set(&self) -> AttributeSet {
        self.primary_key.iter().cloned().collect()
    }

    #[inline(always)]
    pub fn candidate_keys(&self) -> &[AttributeSet] {
        &self.candidate_keys
    }

    #[inline(always)]
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    #[inline(always)]
    pub fn dependencies(&self) -> &[FunctionalDependency] {
        &self.dependencies
    }

    /// Returns the tuples of the receiver, if any were provided.
    pub fn tuples(&self) -> Option<&[Row]> {
        self.tuples.as_deref()
    }

    pub fn has_tuples(&self) -> bool {
        self.tuples.is_some()
    }

    /// Sets the (possibly composite) primary key of the receiver.
    pub fn set_primary_key<I, A>(&mut self, key: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        let mut primary_key: Vec<Attribute> = Vec::new();
        for attribute in key.into_iter().map(Into::into) {
            if primary_key.contains(&attribute) {
                return Err(SchemaError::DuplicateAttribute {
                    relation: self.name.clone(),
                    attribute,
                });
            }
            primary_key.push(attribute);
        }
        if primary_key.is_empty() {
            return Err(self.empty_attribute_set());
        }
        self.check_known(primary_key.iter())?;
        self.primary_key = primary_key;
        Ok(())
    }

    /// Makes `{name}_id` the primary key of the receiver, adding it as the first
    /// attribute when the relation does not have it.
    pub fn synthesize_primary_key(&mut self) {
        let id = Attribute::new(format!("{}_id", self.name));
        if !self.attributes.contains(&id) {
            let mut attributes = IndexSet::with_capacity(self.attributes.len() + 1);
            attributes.insert(id.clone());
            attributes.extend(self.attributes.drain(..));
            self.attributes = attributes;

            if let Some(tuples) = &mut self.tuples {
                for (index, row) in tuples.iter_mut().enumerate() {
                    row.insert(id.clone(), (index + 1).to_string());
                }
            }
        }
        self.primary_key = vec![id];
    }

    pub fn add_candidate_key<I, A>(&mut self, key: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        let key = attributes(key);
        if key.is_empty() {
            return Err(self.empty_attribute_set());
        }
        self.check_known(key.iter())?;
        if !self.candidate_keys.contains(&key) {
            self.candidate_keys.push(key);
        }
        Ok(())
    }

    pub fn add_foreign_key<I, A>(&mut self, key: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        self.add_foreign_key_reference(key, None)
    }

    /// Adds a foreign key that points into the relation named `references`.
    pub fn add_foreign_key_reference<I, A>(
        &mut self,
        key: I,
        references: Option<String>,
    ) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        let key = attributes(key);
        if key.is_empty() {
            return Err(self.empty_attribute_set());
        }
        self.check_known(key.iter())?;
        let foreign_key = ForeignKey {
            attributes: key,
            references,
        };
        if !self.foreign_keys.contains(&foreign_key) {
            self.foreign_keys.push(foreign_key);
        }
        Ok(())
    }

    /// Adds `dependency` to the receiver. Dependencies over unknown attributes are
    /// rejected.
    pub fn add_dependency(&mut self, dependency: FunctionalDependency) -> Result<(), SchemaError> {
        self.check_known(dependency.determinant.iter())?;
        self.check_known(dependency.dependents.iter())?;
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        Ok(())
    }

    /// Adds a tuple whose attributes must be exactly those of the receiver.
    pub fn add_tuple(&mut self, row: Row) -> Result<(), SchemaError> {
        let index = self.tuples.as_ref().map_or(0, Vec::len);
        if row.len() != self.attributes.len()
            || !row.keys().all(|a| self.attributes.contains(a))
        {
            return Err(SchemaError::TupleMismatch {
                relation: self.name.clone(),
                index,
            });
        }
        self.tuples.get_or_insert_with(Vec::new).push(row);
        Ok(())
    }

    /// Adds a tuple given by its values, in the attribute order of the receiver.
    pub fn add_values<I, V>(&mut self, values: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.len() != self.attributes.len() {
            return Err(SchemaError::TupleMismatch {
                relation: self.name.clone(),
                index: self.tuples.as_ref().map_or(0, Vec::len),
            });
        }
        let row = self.attributes.iter().cloned().zip(values).collect();
        self.add_tuple(row)
    }

    /// Marks the receiver as carrying tuple data, even if it has no rows.
    pub(crate) fn set_tuples(&mut self, tuples: Vec<Row>) {
        self.tuples = Some(tuples);
    }

    /// Points the foreign keys referencing `from` to `to`. Keys that would end up
    /// referencing the receiver itself are dropped.
    pub(crate) fn redirect_references(&mut self, from: &str, to: &str) {
        let mut foreign_keys: Vec<ForeignKey> = Vec::with_capacity(self.foreign_keys.len());
        for mut foreign_key in self.foreign_keys.drain(..) {
            if foreign_key.references.as_deref() == Some(from) {
                if to == self.name {
                    continue;
                }
                foreign_key.references = Some(to.to_string());
            }
            if !foreign_keys.contains(&foreign_key) {
                foreign_keys.push(foreign_key);
            }
        }
        self.foreign_keys = foreign_keys;
    }

    /// Returns the declared dependencies together with the dependencies implied by the
    /// declared keys: every key determines all attributes of the relation.
    pub fn implied_dependencies(&self) -> Vec<FunctionalDependency> {
        let all = self.attribute_set();
        let mut result = self.dependencies.clone();
        let keys = std::iter::once(self.primary_key_set())
            .chain(self.candidate_keys.iter().cloned())
            .filter(|key| !key.is_empty());
        for key in keys {
            let dependents: AttributeSet = all.difference(&key).cloned().collect();
            if !dependents.is_empty() {
                result.push(FunctionalDependency {
                    determinant: key,
                    dependents,
                });
            }
        }
        result
    }

    /// Orders `set` by the attribute order of the receiver.
    pub fn ordered(&self, set: &AttributeSet) -> Vec<Attribute> {
        self.attributes
            .iter()
            .filter(|a| set.contains(*a))
            .cloned()
            .collect()
    }

    pub(crate) fn check_known<'a>(
        &self,
        mut attributes: impl Iterator<Item = &'a Attribute>,
    ) -> Result<(), SchemaError> {
        match attributes.find(|a| !self.attributes.contains(*a)) {
            Some(attribute) => Err(SchemaError::UnknownAttribute {
                relation: self.name.clone(),
                attribute: attribute.clone(),
            }),
            None => Ok(()),
        }
    }

    fn empty_attribute_set(&self) -> SchemaError {
        SchemaError::EmptyAttributeSet {
            relation: self.name.clone(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attributes = self
            .attributes
            .iter()
            .map(|a| {
                if self.primary_key.contains(a) {
                    format!("*{}", a)
                } else {
                    a.to_string()
                }
            })
            .collect::<Vec<_>>();
        write!(f, "{}({})", self.name, attributes.join(", "))
    }
}
