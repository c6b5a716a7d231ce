use crate::{
    classify::{Violation, ViolationKind},
    closure::Closure,
    error::DecompositionError,
    form::NormalForm,
    schema::{join, Attribute, AttributeSet, Relation},
    tuples::{is_lossless, project},
};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Generates the names of the relations produced by decomposition. A sequence is owned
/// by one normalization run.
#[derive(Clone, Debug)]
pub struct NameSequence {
    next: usize,
}

impl NameSequence {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns a fresh name derived from `parent`.
    pub fn next_name(&mut self, parent: &str) -> String {
        let name = format!("{}_{}", parent, self.next);
        self.next += 1;
        name
    }
}

impl Default for NameSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Decomposes `relation` to remove `violation`.
pub fn decompose(
    relation: &Relation,
    violation: &Violation,
    names: &mut NameSequence,
) -> Result<Vec<Relation>, DecompositionError> {
    decompose_all(relation, std::slice::from_ref(violation), names)
}

/// Decomposes `relation` to remove every violation in `violations`.
///
/// Violations of 1NF, 2NF, 3NF and BCNF are removed together, one child relation per
/// determinant. Multi-valued and join dependencies are removed one after the other,
/// each from the produced relation that contains it. Produced relations whose
/// attributes duplicate, or are contained in, those of another produced relation are
/// dropped. When `relation` has tuples, the result is checked to rejoin to them.
pub fn decompose_all(
    relation: &Relation,
    violations: &[Violation],
    names: &mut NameSequence,
) -> Result<Vec<Relation>, DecompositionError> {
    for violation in violations {
        if let Some(attribute) = violation
            .attributes()
            .into_iter()
            .find(|a| !relation.contains(a.name()))
        {
            return Err(DecompositionError::UnknownAttribute {
                relation: relation.name().to_string(),
                attribute,
            });
        }
    }

    let mut forms: BTreeMap<NormalForm, Vec<&Violation>> = BTreeMap::new();
    for violation in violations {
        forms.entry(violation.form()).or_default().push(violation);
    }

    let mut current = vec![relation.clone()];
    for (form, group) in forms {
        if form.needs_tuples() {
            for violation in group {
                current = apply(current, &[violation], names)?;
            }
        } else {
            current = apply(current, &group, names)?;
        }
    }

    let result = eliminate(current);
    if let Some(rows) = relation.tuples() {
        let components: Vec<AttributeSet> = result.iter().map(Relation::attribute_set).collect();
        if !is_lossless(rows, &components) {
            return Err(DecompositionError::Lossy {
                relation: relation.name().to_string(),
            });
        }
    }
    report_lost_dependencies(relation, &result);
    Ok(result)
}

/// Hands each violation to the first relation of `current` that contains it.
fn apply(
    current: Vec<Relation>,
    group: &[&Violation],
    names: &mut NameSequence,
) -> Result<Vec<Relation>, DecompositionError> {
    let mut assigned: Vec<Vec<Violation>> = vec![Vec::new(); current.len()];
    for violation in group {
        let attributes = violation.attributes();
        match current
            .iter()
            .position(|r| attributes.iter().all(|a| r.contains(a.name())))
        {
            Some(index) => assigned[index].push((*violation).clone()),
            None => {
                if let Some(error) = absent(&current, &attributes) {
                    return Err(error);
                }
            }
        }
    }

    let mut result = Vec::with_capacity(current.len() + group.len());
    for (relation, violations) in current.into_iter().zip(assigned) {
        if violations.is_empty() {
            result.push(relation);
            continue;
        }
        let produced = match violations[0].form() {
            NormalForm::First => flatten(&relation, &violations, names)?,
            NormalForm::Second | NormalForm::Third | NormalForm::BoyceCodd => {
                split(&relation, &violations, names)?
            }
            NormalForm::Fourth => separate(&relation, &violations[0], names)?,
            NormalForm::Fifth => rejoin(&relation, &violations[0], names)?,
        };
        result.extend(produced);
    }
    Ok(result)
}

/// Reports the first attribute of `attributes` missing from the relation of `current`
/// that holds most of them.
fn absent(current: &[Relation], attributes: &AttributeSet) -> Option<DecompositionError> {
    let closest = current
        .iter()
        .max_by_key(|r| attributes.iter().filter(|a| r.contains(a.name())).count())?;
    let attribute = attributes.iter().find(|a| !closest.contains(a.name()))?;
    Some(DecompositionError::UnknownAttribute {
        relation: closest.name().to_string(),
        attribute: attribute.clone(),
    })
}

/// Creates the relation named `name` over `attributes` of `parent`, keyed by `key`.
/// The candidate keys, foreign keys, dependencies and tuples of `parent` are carried
/// over where they fit; a dependency whose determinant is left out but follows from
/// `key` is rewritten with `key` as its determinant.
fn derive(
    parent: &Relation,
    name: String,
    attributes: &AttributeSet,
    key: Vec<Attribute>,
) -> Result<Relation, DecompositionError> {
    let mut child = Relation::new(&name, parent.ordered(attributes))?;
    if !key.is_empty() {
        child.set_primary_key(key)?;
    }
    let key = child.primary_key_set();

    for candidate in parent.candidate_keys() {
        if candidate.is_subset(attributes) && *candidate != key {
            child.add_candidate_key(candidate)?;
        }
    }
    for foreign_key in parent.foreign_keys() {
        if foreign_key.attributes.is_subset(attributes) {
            child.add_foreign_key_reference(
                &foreign_key.attributes,
                foreign_key.references.clone(),
            )?;
        }
    }

    let reach = Closure::new(parent).of(&key);
    for dependency in parent.dependencies() {
        if let Some(projected) = dependency.project_onto(attributes) {
            child.add_dependency(projected)?;
        } else if !key.is_empty()
            && !dependency.determinant().is_subset(attributes)
            && dependency.determinant().is_subset(&reach)
        {
            let retargeted = dependency.retarget(key.clone(), &child)?;
            if let Some(projected) = retargeted.project_onto(attributes) {
                debug!(relation = child.name(), dependency = %dependency, "retargeted to key");
                child.add_dependency(projected)?;
            }
        }
    }

    if let Some(rows) = parent.tuples() {
        child.set_tuples(project(rows, attributes).into_tuples());
    }
    debug!(parent = parent.name(), relation = %child, "derived");
    Ok(child)
}

/// Moves every non-atomic attribute into a relation of its own, keyed by the primary
/// key of `relation` and referencing the remainder.
fn flatten(
    relation: &Relation,
    violations: &[Violation],
    names: &mut NameSequence,
) -> Result<Vec<Relation>, DecompositionError> {
    let key = relation.primary_key().to_vec();
    let mut relocated = AttributeSet::new();
    for violation in violations {
        for attribute in &violation.dependents {
            if key.contains(attribute) {
                return Err(DecompositionError::KeyAttribute {
                    relation: relation.name().to_string(),
                    attribute: attribute.clone(),
                });
            }
            relocated.insert(attribute.clone());
        }
    }

    let remainder: AttributeSet = relation
        .attribute_set()
        .difference(&relocated)
        .cloned()
        .collect();
    let mut result = vec![derive(
        relation,
        relation.name().to_string(),
        &remainder,
        key.clone(),
    )?];

    for attribute in relation.ordered(&relocated) {
        let mut attributes: AttributeSet = key.iter().cloned().collect();
        attributes.insert(attribute);
        let mut child = derive(
            relation,
            names.next_name(relation.name()),
            &attributes,
            key.clone(),
        )?;
        if !key.is_empty() {
            child.add_foreign_key_reference(&key, Some(relation.name().to_string()))?;
        }
        result.push(child);
    }
    Ok(result)
}

/// Moves the dependents of every determinant into a relation keyed by the determinant.
/// The remainder keeps the name of `relation`; its key loses the attributes moved out
/// and gains the determinants that replace them.
///
/// When the determinants depend on each other so that the remainder would keep every
/// attribute, only the determinants that can move out together are split off and the
/// others are left to a later pass.
fn split(
    relation: &Relation,
    violations: &[Violation],
    names: &mut NameSequence,
) -> Result<Vec<Relation>, DecompositionError> {
    let mut groups: IndexMap<AttributeSet, AttributeSet> = IndexMap::new();
    for violation in violations {
        groups
            .entry(violation.determinant.clone())
            .or_default()
            .extend(violation.dependents.difference(&violation.determinant).cloned());
    }
    groups.retain(|_, dependents| !dependents.is_empty());
    if groups.is_empty() {
        return Ok(vec![relation.clone()]);
    }

    let (mut remainder, mut remainder_key) = remainder_of(relation, &groups);
    if remainder == relation.attribute_set() {
        let together = independent(&groups);
        debug!(
            relation = relation.name(),
            deferred = groups.len() - together.len(),
            "determinants depend on each other"
        );
        groups = together;
        (remainder, remainder_key) = remainder_of(relation, &groups);
    }

    let entries: Vec<(&AttributeSet, AttributeSet)> = groups
        .iter()
        .map(|(x, d)| (x, x.union(d).cloned().collect()))
        .collect();
    let mut children = Vec::with_capacity(entries.len());
    for (determinant, attributes) in &entries {
        children.push(derive(
            relation,
            names.next_name(relation.name()),
            attributes,
            relation.ordered(determinant),
        )?);
    }
    let mut rest = derive(
        relation,
        relation.name().to_string(),
        &remainder,
        relation.ordered(&remainder_key),
    )?;

    for i in 0..children.len() {
        let determinant = children[i].primary_key_set();
        let target = Some(children[i].name().to_string());
        if determinant.is_subset(&remainder) {
            rest.add_foreign_key_reference(&determinant, target)?;
        } else if let Some(holder) =
            (0..children.len()).find(|&j| j != i && determinant.is_subset(&entries[j].1))
        {
            children[holder].add_foreign_key_reference(&determinant, target)?;
        }
    }

    let mut result = vec![rest];
    result.extend(children);
    Ok(result)
}

/// Returns the attributes and the key of what is left of `relation` once the dependents
/// of `groups` move out.
fn remainder_of(
    relation: &Relation,
    groups: &IndexMap<AttributeSet, AttributeSet>,
) -> (AttributeSet, AttributeSet) {
    let key = relation.primary_key_set();
    let moved: AttributeSet = groups.values().flatten().cloned().collect();
    let mut remainder: AttributeSet = relation
        .attribute_set()
        .difference(&moved)
        .cloned()
        .collect();
    let mut remainder_key: AttributeSet = key.difference(&moved).cloned().collect();
    for (determinant, dependents) in groups {
        if !dependents.is_disjoint(&key) {
            remainder_key.extend(determinant.iter().cloned());
        }
    }
    remainder.extend(remainder_key.iter().cloned());

    // each child must join back through the remainder or through a child that does
    let entries: Vec<(&AttributeSet, AttributeSet)> = groups
        .iter()
        .map(|(x, d)| (x, x.union(d).cloned().collect()))
        .collect();
    let mut reached = vec![false; entries.len()];
    loop {
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..entries.len() {
                if reached[i] {
                    continue;
                }
                let determinant = entries[i].0;
                let reachable = determinant.is_subset(&remainder)
                    || entries
                        .iter()
                        .zip(&reached)
                        .any(|((_, attributes), r)| *r && determinant.is_subset(attributes));
                if reachable {
                    reached[i] = true;
                    changed = true;
                }
            }
        }
        match reached.iter().position(|r| !r) {
            Some(i) => remainder.extend(entries[i].0.iter().cloned()),
            None => break,
        }
    }
    (remainder, remainder_key)
}

/// Keeps the groups that can move out of a relation together, in order: a determinant
/// must not be moved out by an earlier group, and an earlier determinant stays behind.
/// The first group is always kept.
fn independent(
    groups: &IndexMap<AttributeSet, AttributeSet>,
) -> IndexMap<AttributeSet, AttributeSet> {
    let mut result = IndexMap::new();
    let mut moved = AttributeSet::new();
    let mut kept = AttributeSet::new();
    for (determinant, dependents) in groups {
        if !determinant.is_disjoint(&moved) {
            continue;
        }
        let dependents: AttributeSet = dependents.difference(&kept).cloned().collect();
        if dependents.is_empty() {
            continue;
        }
        kept.extend(determinant.iter().cloned());
        moved.extend(dependents.iter().cloned());
        result.insert(determinant.clone(), dependents);
    }
    result
}

fn require_tuples(relation: &Relation) -> Result<(), DecompositionError> {
    if relation.has_tuples() {
        Ok(())
    } else {
        Err(DecompositionError::MissingTuples {
            relation: relation.name().to_string(),
        })
    }
}

/// Splits `relation` along the multi-valued dependency `X ->> Y` into `X ∪ Y` and
/// `X ∪ Z`, both keyed by X.
fn separate(
    relation: &Relation,
    violation: &Violation,
    names: &mut NameSequence,
) -> Result<Vec<Relation>, DecompositionError> {
    require_tuples(relation)?;
    let determinant = &violation.determinant;
    let dependents: AttributeSet = violation
        .dependents
        .difference(determinant)
        .cloned()
        .collect();
    let rest: AttributeSet = relation
        .attribute_set()
        .into_iter()
        .filter(|a| !determinant.contains(a) && !dependents.contains(a))
        .collect();
    if dependents.is_empty() || rest.is_empty() {
        return Ok(vec![relation.clone()]);
    }

    let key = relation.ordered(determinant);
    let left: AttributeSet = determinant.union(&dependents).cloned().collect();
    let right: AttributeSet = determinant.union(&rest).cloned().collect();
    Ok(vec![
        derive(relation, names.next_name(relation.name()), &left, key.clone())?,
        derive(relation, names.next_name(relation.name()), &right, key)?,
    ])
}

/// Replaces `relation` by the components of a join dependency, each keyed by all of
/// its attributes.
fn rejoin(
    relation: &Relation,
    violation: &Violation,
    names: &mut NameSequence,
) -> Result<Vec<Relation>, DecompositionError> {
    require_tuples(relation)?;
    let components = match &violation.kind {
        ViolationKind::JoinDependency { components } => components,
        _ => return Ok(vec![relation.clone()]),
    };

    let mut result = Vec::with_capacity(components.len() + 1);
    let covered: AttributeSet = components.iter().flatten().cloned().collect();
    let uncovered: AttributeSet = relation
        .attribute_set()
        .difference(&covered)
        .cloned()
        .collect();
    if !uncovered.is_empty() {
        let mut remainder = relation.primary_key_set();
        remainder.extend(uncovered);
        result.push(derive(
            relation,
            relation.name().to_string(),
            &remainder,
            relation.primary_key().to_vec(),
        )?);
    }
    for component in components {
        result.push(derive(
            relation,
            names.next_name(relation.name()),
            component,
            relation.ordered(component),
        )?);
    }
    Ok(result)
}

/// Drops the relations whose attributes duplicate those of an earlier relation or are
/// strictly contained in those of another, pointing references at the survivor.
fn eliminate(relations: Vec<Relation>) -> Vec<Relation> {
    let sets: Vec<AttributeSet> = relations.iter().map(Relation::attribute_set).collect();
    let replacement: Vec<Option<usize>> = sets
        .iter()
        .enumerate()
        .map(|(i, set)| {
            sets.iter().enumerate().position(|(j, other)| {
                j != i
                    && ((other == set && j < i)
                        || (set.is_subset(other) && other.len() > set.len()))
            })
        })
        .collect();

    let survivor = |mut i: usize| {
        while let Some(j) = replacement[i] {
            i = j;
        }
        i
    };
    let redirects: Vec<(String, String)> = (0..relations.len())
        .filter(|&i| replacement[i].is_some())
        .map(|i| {
            (
                relations[i].name().to_string(),
                relations[survivor(i)].name().to_string(),
            )
        })
        .collect();

    let mut result = Vec::with_capacity(relations.len());
    for (i, mut relation) in relations.into_iter().enumerate() {
        if replacement[i].is_some() {
            debug!(relation = relation.name(), "dropped as redundant");
            continue;
        }
        for (from, to) in &redirects {
            relation.redirect_references(from, to);
        }
        result.push(relation);
    }
    result
}

fn report_lost_dependencies(relation: &Relation, result: &[Relation]) {
    for dependency in relation.dependencies() {
        let determinant = dependency.determinant();
        let lost: AttributeSet = dependency
            .dependents()
            .difference(determinant)
            .filter(|a| {
                !result.iter().any(|r| {
                    (r.contains(a.name()) && determinant.iter().all(|x| r.contains(x.name())))
                        || r.dependencies().iter().any(|d| d.dependents().contains(*a))
                })
            })
            .cloned()
            .collect();
        if !lost.is_empty() {
            warn!(
                relation = relation.name(),
                dependency = %dependency,
                lost = %join(&lost),
                "dependency not preserved by decomposition"
            );
        }
    }
}
