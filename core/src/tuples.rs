use crate::{
    schema::{AttributeSet, Row, Value},
    Tuple,
};
use std::ops::Deref;

/// Is a wrapper around a vector of tuples. As an invariant, the content of `Tuples`
/// is sorted and free of duplicates.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Tuples<T: Tuple> {
    items: Vec<T>,
}

impl<T: Tuple, I: IntoIterator<Item = T>> From<I> for Tuples<T> {
    fn from(iterator: I) -> Self {
        let mut items: Vec<T> = iterator.into_iter().collect();
        items.sort_unstable();
        items.dedup();
        Tuples { items }
    }
}

impl<T: Tuple> Tuples<T> {
    /// Returns an immutable reference to the tuples of the receiver.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the receiver and returns the underlying (sorted) vector of tuples.
    #[inline(always)]
    pub fn into_tuples(self) -> Vec<T> {
        self.items
    }
}

impl<T: Tuple> Deref for Tuples<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

/// Skips the prefix of `slice` for which `cmp` holds, probing at exponentially
/// growing distances before narrowing down.
fn gallop<T>(mut slice: &[T], mut cmp: impl FnMut(&T) -> bool) -> &[T] {
    if !slice.is_empty() && cmp(&slice[0]) {
        let mut step = 1;
        while step < slice.len() && cmp(&slice[step]) {
            slice = &slice[step..];
            step <<= 1;
        }

        step >>= 1;
        while step > 0 {
            if step < slice.len() && cmp(&slice[step]) {
                slice = &slice[step..];
            }
            step >>= 1;
        }

        slice = &slice[1..];
    }
    slice
}

/// Calls `result` on every pair of `left` and `right` entries that share a key.
/// Both inputs are sorted, hence sorted by key.
fn merge_join<K: Tuple, L: Tuple, R: Tuple>(
    left: &Tuples<(K, L)>,
    right: &Tuples<(K, R)>,
    mut result: impl FnMut(&L, &R),
) {
    let mut left = &left[..];
    let mut right = &right[..];

    while !left.is_empty() && !right.is_empty() {
        use std::cmp::Ordering;

        match left[0].0.cmp(&right[0].0) {
            Ordering::Less => left = gallop(left, |x| x.0 < right[0].0),
            Ordering::Equal => {
                let left_count = left.iter().take_while(|x| x.0 == left[0].0).count();
                let right_count = right.iter().take_while(|x| x.0 == right[0].0).count();

                for l in &left[..left_count] {
                    for r in &right[..right_count] {
                        result(&l.1, &r.1);
                    }
                }

                left = &left[left_count..];
                right = &right[right_count..];
            }
            Ordering::Greater => right = gallop(right, |x| x.0 < left[0].0),
        }
    }
}

/// Projects `rows` onto `attributes`, removing duplicates.
pub fn project(rows: &[Row], attributes: &AttributeSet) -> Tuples<Row> {
    rows.iter()
        .map(|row| {
            row.iter()
                .filter(|(a, _)| attributes.contains(*a))
                .map(|(a, v)| (a.clone(), v.clone()))
                .collect::<Row>()
        })
        .collect::<Vec<_>>()
        .into()
}

/// Returns the values of `row` on `attributes`, in attribute order.
fn key_of(row: &Row, attributes: &AttributeSet) -> Vec<Value> {
    attributes
        .iter()
        .filter_map(|a| row.get(a).cloned())
        .collect()
}

/// Computes the natural join of `left` and `right` on their common attributes.
pub fn natural_join(left: &Tuples<Row>, right: &Tuples<Row>) -> Tuples<Row> {
    let (first_left, first_right) = match (left.first(), right.first()) {
        (Some(l), Some(r)) => (l, r),
        _ => return Vec::new().into(),
    };
    let common: AttributeSet = first_left
        .keys()
        .filter(|a| first_right.contains_key(*a))
        .cloned()
        .collect();

    let keyed_left: Tuples<(Vec<Value>, Row)> = left
        .iter()
        .map(|row| (key_of(row, &common), row.clone()))
        .collect::<Vec<_>>()
        .into();
    let keyed_right: Tuples<(Vec<Value>, Row)> = right
        .iter()
        .map(|row| (key_of(row, &common), row.clone()))
        .collect::<Vec<_>>()
        .into();

    let mut result = Vec::new();
    merge_join(&keyed_left, &keyed_right, |l, r| {
        let mut row = l.clone();
        row.extend(r.iter().map(|(a, v)| (a.clone(), v.clone())));
        result.push(row);
    });
    result.into()
}

/// Returns true if joining the projections of `rows` onto `components`
/// reproduces exactly the tuples of `rows`.
pub fn is_lossless(rows: &[Row], components: &[AttributeSet]) -> bool {
    let original: Tuples<Row> = rows.to_vec().into();
    let mut projections = components.iter().map(|c| project(rows, c));
    let joined = match projections.next() {
        Some(first) => projections.fold(first, |acc, p| natural_join(&acc, &p)),
        None => return original.is_empty(),
    };
    joined == original
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::attributes;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(a, v)| ((*a).into(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_tuples_from_list() {
        {
            let tuples = Tuples::<i32>::from(vec![]);
            assert_eq!(Vec::<i32>::new(), tuples.into_tuples());
        }
        {
            let tuples = Tuples::<i32>::from(vec![5, 4, 2, 1, 3]);
            assert_eq!(vec![1, 2, 3, 4, 5], tuples.into_tuples());
        }
        {
            let tuples = Tuples::<i32>::from(vec![3, 2, 2, 1, 3]);
            assert_eq!(vec![1, 2, 3], tuples.into_tuples());
        }
    }

    #[test]
    fn test_gallop() {
        let items = vec![1, 2, 3, 4, 5, 6, 7, 8, 9];
        assert_eq!(&[5, 6, 7, 8, 9], gallop(&items, |x| *x < 5));
        assert_eq!(&items[..], gallop(&items, |x| *x < 0));
        assert!(gallop(&items, |x| *x < 100).is_empty());
    }

    #[test]
    fn test_project() {
        let rows = vec![
            row(&[("a", "1"), ("b", "x")]),
            row(&[("a", "1"), ("b", "y")]),
            row(&[("a", "2"), ("b", "x")]),
        ];
        {
            let result = project(&rows, &attributes(vec!["a"]));
            assert_eq!(
                vec![row(&[("a", "1")]), row(&[("a", "2")])],
                result.into_tuples()
            );
        }
        {
            let result = project(&rows, &attributes(vec!["a", "b"]));
            assert_eq!(3, result.len());
        }
    }

    #[test]
    fn test_natural_join() {
        {
            let left: Tuples<Row> =
                vec![row(&[("a", "1"), ("b", "x")]), row(&[("a", "2"), ("b", "y")])].into();
            let right: Tuples<Row> = vec![
                row(&[("b", "x"), ("c", "p")]),
                row(&[("b", "x"), ("c", "q")]),
                row(&[("b", "z"), ("c", "r")]),
            ]
            .into();
            let result = natural_join(&left, &right);
            assert_eq!(
                vec![
                    row(&[("a", "1"), ("b", "x"), ("c", "p")]),
                    row(&[("a", "1"), ("b", "x"), ("c", "q")]),
                ],
                result.into_tuples()
            );
        }
        {
            let left: Tuples<Row> = vec![row(&[("a", "1")]), row(&[("a", "2")])].into();
            let right: Tuples<Row> = vec![row(&[("b", "x")]), row(&[("b", "y")])].into();
            assert_eq!(4, natural_join(&left, &right).len());
        }
        {
            let left: Tuples<Row> = vec![row(&[("a", "1")])].into();
            assert!(natural_join(&left, &Vec::new().into()).is_empty());
        }
    }

    #[test]
    fn test_is_lossless() {
        let rows = vec![
            row(&[("s", "s1"), ("p", "p1"), ("j", "j2")]),
            row(&[("s", "s1"), ("p", "p2"), ("j", "j1")]),
            row(&[("s", "s2"), ("p", "p1"), ("j", "j1")]),
            row(&[("s", "s1"), ("p", "p1"), ("j", "j1")]),
        ];
        {
            let components = vec![
                attributes(vec!["s", "p"]),
                attributes(vec!["p", "j"]),
                attributes(vec!["j", "s"]),
            ];
            assert!(is_lossless(&rows, &components));
        }
        {
            let components = vec![attributes(vec!["s", "p"]), attributes(vec!["p", "j"])];
            assert!(!is_lossless(&rows, &components));
        }
    }
}
