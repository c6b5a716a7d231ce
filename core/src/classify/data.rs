//! Implements the data-driven checks of 4NF and 5NF. Multi-valued and join dependencies
//! cannot be derived from the declared functional dependencies, so both checks look
//! for patterns in the tuples of a relation and ask a [`ConfirmationOracle`] before
//! reporting anything. Both checks are bounded heuristics, not decision procedures.
use super::{Violation, ViolationKind};
use crate::{
    closure::Closure,
    config::Config,
    error::ClassificationError,
    form::NormalForm,
    oracle::ConfirmationOracle,
    schema::{Attribute, AttributeSet, Relation, Row},
    tuples::is_lossless,
};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Is what the tuples say about a candidate multi-valued dependency.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Evidence {
    /// Is true if, within every group of tuples agreeing on the determinant, the
    /// dependents and the remaining attributes form a full cross product.
    holds: bool,

    /// Is true if some group has at least two values on both sides.
    witnessed: bool,
}

fn values<'a>(row: &'a Row, attributes: &AttributeSet) -> Vec<&'a str> {
    attributes
        .iter()
        .filter_map(|a| row.get(a).map(String::as_str))
        .collect()
}

#[derive(Default)]
struct Group<'a> {
    dependents: BTreeSet<Vec<&'a str>>,
    rest: BTreeSet<Vec<&'a str>>,
    pairs: BTreeSet<(Vec<&'a str>, Vec<&'a str>)>,
}

fn evidence(
    rows: &[Row],
    determinant: &AttributeSet,
    dependents: &AttributeSet,
    rest: &AttributeSet,
) -> Evidence {
    let mut groups: BTreeMap<Vec<&str>, Group> = BTreeMap::new();
    for row in rows {
        let group = groups.entry(values(row, determinant)).or_default();
        let y = values(row, dependents);
        let z = values(row, rest);
        group.dependents.insert(y.clone());
        group.rest.insert(z.clone());
        group.pairs.insert((y, z));
    }

    let holds = groups
        .values()
        .all(|g| g.pairs.len() == g.dependents.len() * g.rest.len());
    let witnessed = groups
        .values()
        .any(|g| g.dependents.len() >= 2 && g.rest.len() >= 2);
    Evidence { holds, witnessed }
}

/// Returns the ways of splitting `rest` into two non-empty parts, each split listed
/// once: the first part always holds the first attribute of `rest`.
fn splits(rest: &[Attribute]) -> Vec<(AttributeSet, AttributeSet)> {
    let mut result = Vec::new();
    if let Some((first, others)) = rest.split_first() {
        for size in 0..others.len() {
            for combination in others.iter().combinations(size) {
                let mut left = AttributeSet::new();
                left.insert(first.clone());
                left.extend(combination.into_iter().cloned());
                let right: AttributeSet = rest
                    .iter()
                    .filter(|a| !left.contains(*a))
                    .cloned()
                    .collect();
                result.push((left, right));
            }
        }
    }
    result
}

/// Returns (X, Y, Z) candidate splits of `relation` with X of size `sizes`, in the
/// attribute order of the relation.
fn candidates(
    relation: &Relation,
    sizes: std::ops::RangeInclusive<usize>,
) -> Vec<(AttributeSet, AttributeSet, AttributeSet)> {
    let all: Vec<Attribute> = relation.attributes().iter().cloned().collect();
    let mut result = Vec::new();
    for size in sizes {
        for determinant in all.iter().combinations(size) {
            let determinant: AttributeSet = determinant.into_iter().cloned().collect();
            let rest: Vec<Attribute> = all
                .iter()
                .filter(|a| !determinant.contains(*a))
                .cloned()
                .collect();
            for (y, z) in splits(&rest) {
                result.push((determinant.clone(), y, z));
            }
        }
    }
    result
}

fn tuples_of(relation: &Relation, form: NormalForm) -> Result<&[Row], ClassificationError> {
    relation
        .tuples()
        .ok_or_else(|| ClassificationError::MissingTuples {
            relation: relation.name().to_string(),
            form,
        })
}

fn ask<C>(
    relation: &Relation,
    candidate: &Violation,
    oracle: &mut C,
) -> Result<bool, ClassificationError>
where
    C: ConfirmationOracle + ?Sized,
{
    oracle
        .confirm(candidate)
        .ok_or_else(|| ClassificationError::OracleDeclined {
            relation: relation.name().to_string(),
            question: format!("does {} hold?", candidate),
        })
}

/// Looks for a multi-valued dependency `X ->> Y` in the tuples of `relation` where X is
/// not a superkey. Declared dependencies with more than one dependent are tried first;
/// every split is tried when the relation has at most `dependency_search_limit`
/// attributes. Returns the first candidate the oracle confirms.
pub fn fourth_normal_form<C>(
    relation: &Relation,
    config: &Config,
    oracle: &mut C,
) -> Result<Vec<Violation>, ClassificationError>
where
    C: ConfirmationOracle + ?Sized,
{
    let rows = tuples_of(relation, NormalForm::Fourth)?;
    let all = relation.attribute_set();
    if rows.is_empty() || all.len() < 3 {
        return Ok(Vec::new());
    }

    let closure = Closure::new(relation);
    let mut seen: BTreeSet<(AttributeSet, AttributeSet)> = BTreeSet::new();
    let mut queue: Vec<(AttributeSet, AttributeSet, AttributeSet)> = Vec::new();

    for fd in relation.dependencies().iter().filter(|fd| fd.dependents().len() > 1) {
        for attribute in fd.dependents().difference(fd.determinant()) {
            let mut y = AttributeSet::new();
            y.insert(attribute.clone());
            let z: AttributeSet = all
                .iter()
                .filter(|a| !fd.determinant().contains(*a) && *a != attribute)
                .cloned()
                .collect();
            if !z.is_empty() {
                queue.push((fd.determinant().clone(), y, z));
            }
        }
    }

    if all.len() <= config.dependency_search_limit {
        queue.extend(candidates(relation, 1..=all.len() - 2));
    } else {
        warn!(
            relation = relation.name(),
            attributes = all.len(),
            limit = config.dependency_search_limit,
            "multi-valued dependency search limited to declared dependencies"
        );
    }

    for (x, y, z) in queue {
        // Y and Z are interchangeable
        let canonical = if y <= z { (x.clone(), y.clone()) } else { (x.clone(), z.clone()) };
        if !seen.insert(canonical) || closure.is_superkey(&x) {
            continue;
        }
        let found = evidence(rows, &x, &y, &z);
        if !(found.holds && found.witnessed) {
            continue;
        }

        let candidate = Violation::new(ViolationKind::MultiValuedDependency, x, y);
        if ask(relation, &candidate, oracle)? {
            return Ok(vec![candidate]);
        }
        debug!(relation = relation.name(), candidate = %candidate, "rejected");
    }
    Ok(Vec::new())
}

/// Looks for a join dependency in the tuples of `relation`: a set of three or more
/// projections whose join reproduces the tuples when no pair of projections does.
/// Only two families of projections are tried, all attributes but one and all pairs of
/// attributes.
pub fn fifth_normal_form<C>(
    relation: &Relation,
    config: &Config,
    oracle: &mut C,
) -> Result<Vec<Violation>, ClassificationError>
where
    C: ConfirmationOracle + ?Sized,
{
    let rows = tuples_of(relation, NormalForm::Fifth)?;
    let all: Vec<Attribute> = relation.attributes().iter().cloned().collect();
    if rows.is_empty() || all.len() < 3 {
        return Ok(Vec::new());
    }
    if all.len() > config.dependency_search_limit {
        warn!(
            relation = relation.name(),
            attributes = all.len(),
            limit = config.dependency_search_limit,
            "join dependency search skipped"
        );
        return Ok(Vec::new());
    }

    let binary = candidates(relation, 0..=all.len() - 2)
        .into_iter()
        .any(|(x, y, z)| evidence(rows, &x, &y, &z).holds);
    if binary {
        return Ok(Vec::new());
    }

    let drop_one: Vec<AttributeSet> = all
        .iter()
        .map(|skip| all.iter().filter(|a| *a != skip).cloned().collect())
        .collect();
    let pairs: Vec<AttributeSet> = all
        .iter()
        .tuple_combinations()
        .map(|(a, b)| [a.clone(), b.clone()].into_iter().collect())
        .collect();

    // with three attributes both families hold the same components
    let closure = Closure::new(relation);
    let same =
        drop_one.iter().collect::<BTreeSet<_>>() == pairs.iter().collect::<BTreeSet<_>>();
    let mut families = vec![drop_one];
    if !same {
        families.push(pairs);
    }

    for components in families {
        if components.iter().any(|c| closure.is_superkey(c)) {
            continue;
        }
        if !is_lossless(rows, &components) {
            continue;
        }

        let candidate = Violation::new(
            ViolationKind::JoinDependency { components },
            AttributeSet::new(),
            relation.attribute_set(),
        );
        if ask(relation, &candidate, oracle)? {
            return Ok(vec![candidate]);
        }
        debug!(relation = relation.name(), candidate = %candidate, "rejected");
    }
    Ok(Vec::new())
}
