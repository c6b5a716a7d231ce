use crate::{
    classify::{classify, Violation},
    config::Config,
    decompose::{decompose_all, NameSequence},
    error::{ClassificationError, DecompositionError, Error, SchemaError},
    form::NormalForm,
    oracle::{AssumeAtomic, AtomicityOracle, ConfirmationOracle, TrustData},
    schema::{AttributeSet, Relation},
};
use either::Either;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Is a state of the normalizer. Stages only move forward, one normal form at a time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    Form(NormalForm),
    Done,
}

impl Stage {
    /// Returns the stage that follows the receiver on the way to `target`.
    pub fn advance(self, target: NormalForm) -> Self {
        match self {
            Stage::Form(form) if form < target => form.next().map_or(Stage::Done, Stage::Form),
            _ => Stage::Done,
        }
    }
}

/// Is an entry of the violation history: which rule fired on which relation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct LogEntry {
    pub stage: NormalForm,
    pub relation: String,
    pub violation: Violation,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.relation, self.violation)
    }
}

/// Is the result of a normalization run.
#[derive(Clone, PartialEq, Debug)]
pub struct Normalized {
    relations: Vec<Relation>,
    history: Vec<LogEntry>,
    reached: Option<NormalForm>,
    target: NormalForm,
    failure: Option<DecompositionError>,
}

impl Normalized {
    /// Returns the relations of the last completed stage.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn into_relations(self) -> Vec<Relation> {
        self.relations
    }

    /// Returns every violation found, in the order they were found.
    pub fn history(&self) -> &[LogEntry] {
        &self.history
    }

    /// Returns the strongest normal form the relations are known to satisfy.
    pub fn reached(&self) -> Option<NormalForm> {
        self.reached
    }

    pub fn target(&self) -> NormalForm {
        self.target
    }

    /// Returns the error that stopped the run before `target` was reached.
    pub fn failure(&self) -> Option<&DecompositionError> {
        self.failure.as_ref()
    }

    /// Returns true if the run stopped before reaching its target.
    pub fn is_partial(&self) -> bool {
        self.failure.is_some()
    }

    /// Renders the violation history as text.
    pub fn report(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Normalized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.history.is_empty() {
            writeln!(f, "no violations found")?;
        }
        for entry in &self.history {
            writeln!(f, "{}", entry)?;
        }
        match (&self.failure, self.reached) {
            (Some(failure), Some(reached)) => {
                writeln!(f, "stopped after {}: {}", reached, failure)
            }
            (Some(failure), None) => writeln!(f, "stopped: {}", failure),
            (None, _) => writeln!(f, "reached {}", self.target),
        }
    }
}

/// Drives the classify and decompose cycle from 1NF up to a target normal form.
pub struct Normalizer<'o> {
    config: Config,
    atomicity: Box<dyn AtomicityOracle + 'o>,
    confirmation: Box<dyn ConfirmationOracle + 'o>,
}

impl<'o> Normalizer<'o> {
    /// Creates a normalizer that treats every attribute as atomic and accepts every
    /// dependency the tuples exhibit.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            atomicity: Box::new(AssumeAtomic),
            confirmation: Box::new(TrustData),
        }
    }

    pub fn with_atomicity(mut self, oracle: impl AtomicityOracle + 'o) -> Self {
        self.atomicity = Box::new(oracle);
        self
    }

    pub fn with_confirmation(mut self, oracle: impl ConfirmationOracle + 'o) -> Self {
        self.confirmation = Box::new(oracle);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Normalizes `relation` up to `target`.
    ///
    /// Schema and classification errors are returned as errors. A decomposition error
    /// stops the run and is reported in the [`Normalized`] result, which then holds the
    /// relations of the last completed stage.
    pub fn normalize(
        &mut self,
        relation: &Relation,
        target: NormalForm,
    ) -> Result<Normalized, Error> {
        let mut relation = relation.clone();
        if relation.primary_key().is_empty() {
            if !self.config.generate_primary_key {
                return Err(SchemaError::MissingPrimaryKey {
                    relation: relation.name().to_string(),
                }
                .into());
            }
            relation.synthesize_primary_key();
            info!(relation = %relation, "primary key generated");
        }
        if target.needs_tuples() && !relation.has_tuples() {
            return Err(ClassificationError::MissingTuples {
                relation: relation.name().to_string(),
                form: target,
            }
            .into());
        }

        let mut names = NameSequence::new();
        let mut history = Vec::new();
        let mut relations = vec![relation];
        let mut reached = None;
        let mut stage = Stage::Form(NormalForm::First);

        while let Stage::Form(form) = stage {
            info!(stage = %form, relations = relations.len(), "normalizing");
            match self.run_stage(form, &relations, &mut names, &mut history) {
                Ok(next) => {
                    relations = next;
                    reached = Some(form);
                }
                Err(Error::Decomposition(failure)) => {
                    info!(stage = %form, error = %failure, "stopped");
                    return Ok(Normalized {
                        relations,
                        history,
                        reached,
                        target,
                        failure: Some(failure),
                    });
                }
                Err(e) => return Err(e),
            }
            stage = stage.advance(target);
        }

        info!(target = %target, relations = relations.len(), "done");
        Ok(Normalized {
            relations,
            history,
            reached,
            target,
            failure: None,
        })
    }

    /// Repeats classify and decompose on `relations` until no relation violates `form`.
    /// Decomposing for 1NF only produces atomic attributes, so it takes a single pass.
    /// A decomposition that gives back a relation of the same attributes and key stops
    /// the stage at once.
    fn run_stage(
        &mut self,
        form: NormalForm,
        relations: &[Relation],
        names: &mut NameSequence,
        history: &mut Vec<LogEntry>,
    ) -> Result<Vec<Relation>, Error> {
        let passes = if form == NormalForm::First {
            1
        } else {
            self.config.max_stage_passes
        };

        let mut current = relations.to_vec();
        for pass in 1..=passes {
            let mut changed = false;
            let mut next = Vec::with_capacity(current.len());
            for relation in current {
                let before = shape(&relation);
                match self.step(relation, form, names, history)? {
                    Either::Left(unchanged) => next.push(unchanged),
                    Either::Right(produced) => {
                        if produced.len() == 1 && shape(&produced[0]) == before {
                            return Err(DecompositionError::Diverged { form, passes: pass }.into());
                        }
                        changed = true;
                        next.extend(produced);
                    }
                }
            }
            current = next;
            if !changed || form == NormalForm::First {
                return Ok(current);
            }
            debug!(stage = %form, pass, relations = current.len(), "pass");
        }

        Err(DecompositionError::Diverged { form, passes }.into())
    }

    fn step(
        &mut self,
        relation: Relation,
        form: NormalForm,
        names: &mut NameSequence,
        history: &mut Vec<LogEntry>,
    ) -> Result<Either<Relation, Vec<Relation>>, Error> {
        let violations = classify(
            &relation,
            form,
            &self.config,
            &mut *self.atomicity,
            &mut *self.confirmation,
        )?;
        if violations.is_empty() {
            return Ok(Either::Left(relation));
        }

        for violation in &violations {
            debug!(relation = relation.name(), violation = %violation, "violation");
            history.push(LogEntry {
                stage: form,
                relation: relation.name().to_string(),
                violation: violation.clone(),
            });
        }
        let produced = decompose_all(&relation, &violations, names)?;
        Ok(Either::Right(produced))
    }
}

/// Returns the attributes and the primary key of `relation`.
fn shape(relation: &Relation) -> (AttributeSet, AttributeSet) {
    (relation.attribute_set(), relation.primary_key_set())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classify::ViolationKind,
        oracle::Answers,
        schema::{attributes, AttributeSet, FunctionalDependency},
    };
    use proptest::prelude::*;

    fn fd(x: &[&str], y: &[&str]) -> FunctionalDependency {
        FunctionalDependency::new(x.iter().copied(), y.iter().copied()).unwrap()
    }

    fn sets(normalized: &Normalized) -> Vec<AttributeSet> {
        normalized
            .relations()
            .iter()
            .map(Relation::attribute_set)
            .collect()
    }

    fn student() -> Relation {
        Relation::new("student", vec!["fname", "lname", "phone_number", "address"]).unwrap()
    }

    #[test]
    fn test_stage_advance() {
        let target = NormalForm::Third;
        assert_eq!(
            Stage::Form(NormalForm::Second),
            Stage::Form(NormalForm::First).advance(target)
        );
        assert_eq!(Stage::Done, Stage::Form(NormalForm::Third).advance(target));
        assert_eq!(Stage::Done, Stage::Done.advance(target));
        assert_eq!(
            Stage::Done,
            Stage::Form(NormalForm::Fifth).advance(NormalForm::Fifth)
        );
    }

    #[test]
    fn test_normalize_first_normal_form() {
        let answers = Answers::new()
            .non_atomic(vec!["phone_number", "address"])
            .atomic_by_default();
        let mut normalizer =
            Normalizer::new(Config::default().with_generated_primary_key(true))
                .with_atomicity(answers);
        let result = normalizer
            .normalize(&student(), NormalForm::BoyceCodd)
            .unwrap();
        assert_eq!(
            vec![
                attributes(vec!["student_id", "fname", "lname"]),
                attributes(vec!["student_id", "phone_number"]),
                attributes(vec!["student_id", "address"]),
            ],
            sets(&result)
        );
        assert_eq!(2, result.history().len());
        assert_eq!(Some(NormalForm::BoyceCodd), result.reached());
        assert!(!result.is_partial());
    }

    #[test]
    fn test_normalize_errors() {
        {
            let result =
                Normalizer::new(Config::default()).normalize(&student(), NormalForm::First);
            assert_eq!(
                Err(Error::Schema(SchemaError::MissingPrimaryKey {
                    relation: "student".into()
                })),
                result
            );
        }
        {
            let mut r = student();
            r.set_primary_key(vec!["fname"]).unwrap();
            let result = Normalizer::new(Config::default()).normalize(&r, NormalForm::Fourth);
            assert_eq!(
                Err(Error::Classification(ClassificationError::MissingTuples {
                    relation: "student".into(),
                    form: NormalForm::Fourth
                })),
                result
            );
        }
        {
            let mut r = student();
            r.set_primary_key(vec!["fname"]).unwrap();
            let result = Normalizer::new(Config::default())
                .with_atomicity(Answers::new())
                .normalize(&r, NormalForm::First);
            assert!(matches!(
                result,
                Err(Error::Classification(ClassificationError::OracleDeclined { .. }))
            ));
        }
    }

    #[test]
    fn test_normalize_second_normal_form() {
        let mut r =
            Relation::new("student", vec!["fname", "lname", "ssn", "home_address"]).unwrap();
        r.set_primary_key(vec!["ssn", "home_address"]).unwrap();
        r.add_dependency(fd(&["ssn"], &["home_address"])).unwrap();

        let result = Normalizer::new(Config::default())
            .normalize(&r, NormalForm::Second)
            .unwrap();
        assert_eq!(
            vec![
                attributes(vec!["fname", "lname", "ssn"]),
                attributes(vec!["ssn", "home_address"]),
            ],
            sets(&result)
        );
        assert_eq!(
            ViolationKind::PartialDependency,
            result.history()[0].violation.kind
        );
        assert_eq!(
            "[2NF] student: partial dependency: ssn -> home_address",
            result.history()[0].to_string()
        );
    }

    #[test]
    fn test_normalize_boyce_codd() {
        let mut r = Relation::new("enrollment", vec!["s", "c", "t"]).unwrap();
        r.set_primary_key(vec!["s", "c"]).unwrap();
        r.add_dependency(fd(&["t"], &["c"])).unwrap();
        {
            let result = Normalizer::new(Config::default())
                .normalize(&r, NormalForm::Third)
                .unwrap();
            assert_eq!(1, result.relations().len());
            assert!(result.history().is_empty());
            assert_eq!("no violations found\nreached 3NF\n", result.report());
        }
        {
            let result = Normalizer::new(Config::default())
                .normalize(&r, NormalForm::BoyceCodd)
                .unwrap();
            assert_eq!(
                vec![attributes(vec!["s", "t"]), attributes(vec!["c", "t"])],
                sets(&result)
            );
            assert_eq!(
                Some("enrollment_1"),
                result.relations()[0].foreign_keys()[0].references.as_deref()
            );
        }
    }

    #[test]
    fn test_normalize_diverged() {
        let mut r = Relation::new("r", vec!["k", "a", "b"]).unwrap();
        r.set_primary_key(vec!["k"]).unwrap();
        r.add_dependency(fd(&["a"], &["b"])).unwrap();

        let result = Normalizer::new(Config::default().with_max_stage_passes(1))
            .normalize(&r, NormalForm::Third)
            .unwrap();
        assert!(result.is_partial());
        assert_eq!(
            Some(&DecompositionError::Diverged {
                form: NormalForm::Third,
                passes: 1
            }),
            result.failure()
        );
        assert_eq!(Some(NormalForm::Second), result.reached());
        assert_eq!(vec![r.attribute_set()], sets(&result));
    }

    #[test]
    fn test_normalize_mutual_dependencies() {
        let mut r = Relation::new("r", vec!["a", "b", "c"]).unwrap();
        r.set_primary_key(vec!["a", "b", "c"]).unwrap();
        r.add_dependency(fd(&["a"], &["b"])).unwrap();
        r.add_dependency(fd(&["b"], &["a"])).unwrap();

        let result = Normalizer::new(Config::default())
            .normalize(&r, NormalForm::BoyceCodd)
            .unwrap();
        assert!(!result.is_partial());
        assert_eq!(
            vec![attributes(vec!["a", "c"]), attributes(vec!["a", "b"])],
            sets(&result)
        );
        assert_eq!(attributes(vec!["a", "c"]), result.relations()[0].primary_key_set());
        assert_eq!(attributes(vec!["a"]), result.relations()[1].primary_key_set());
    }

    #[test]
    fn test_normalize_cyclic_determinants() {
        let mut r = Relation::new("r", vec!["a", "b", "c", "d", "e"]).unwrap();
        r.set_primary_key(vec!["a", "b"]).unwrap();
        r.add_dependency(fd(&["d"], &["e"])).unwrap();
        r.add_dependency(fd(&["c", "e"], &["d"])).unwrap();

        let result = Normalizer::new(Config::default())
            .normalize(&r, NormalForm::BoyceCodd)
            .unwrap();
        assert!(!result.is_partial());
        assert_eq!(
            vec![
                attributes(vec!["a", "b", "c", "d"]),
                attributes(vec!["d", "e"]),
            ],
            sets(&result)
        );
        assert_eq!(&[fd(&["a", "b"], &["d"])], result.relations()[0].dependencies());
    }

    #[test]
    fn test_shape() {
        let mut r = Relation::new("r", vec!["a", "b"]).unwrap();
        r.set_primary_key(vec!["a", "b"]).unwrap();
        let mut rekeyed = r.clone();
        rekeyed.set_primary_key(vec!["a"]).unwrap();
        assert_eq!(shape(&r), shape(&r.clone()));
        assert_ne!(shape(&r), shape(&rekeyed));
    }

    #[test]
    fn test_normalize_fourth_normal_form() {
        let mut r = Relation::new("offering", vec!["course", "tutor", "book"]).unwrap();
        r.set_primary_key(vec!["course", "tutor", "book"]).unwrap();
        for values in [
            ["c1", "t1", "b1"],
            ["c1", "t1", "b2"],
            ["c1", "t2", "b1"],
            ["c1", "t2", "b2"],
        ] {
            r.add_values(values).unwrap();
        }
        {
            let result = Normalizer::new(Config::default())
                .normalize(&r, NormalForm::Fifth)
                .unwrap();
            assert_eq!(
                vec![
                    attributes(vec!["course", "tutor"]),
                    attributes(vec!["course", "book"]),
                ],
                sets(&result)
            );
            assert_eq!(Some(NormalForm::Fifth), result.reached());
        }
        {
            let oracle = |_: &Violation| Some(false);
            let result = Normalizer::new(Config::default())
                .with_confirmation(oracle)
                .normalize(&r, NormalForm::Fourth)
                .unwrap();
            assert_eq!(1, result.relations().len());
            assert!(result.history().is_empty());
        }
    }

    fn arbitrary_schema() -> impl Strategy<Value = Relation> {
        let names = vec!["a", "b", "c", "d", "e"];
        (
            prop::sample::subsequence(names.clone(), 1..4),
            prop::collection::vec(
                (
                    prop::sample::subsequence(names.clone(), 1..3),
                    prop::sample::subsequence(names.clone(), 1..3),
                ),
                0..5,
            ),
        )
            .prop_map(move |(key, pairs)| {
                let mut r = Relation::new("r", names.clone()).unwrap();
                r.set_primary_key(key).unwrap();
                for (x, y) in pairs {
                    r.add_dependency(FunctionalDependency::new(x, y).unwrap())
                        .unwrap();
                }
                r
            })
    }

    proptest! {

    #[test]
    fn test_normalize_converges(
        r in arbitrary_schema(),
        target in prop::sample::select(vec![
            NormalForm::Second,
            NormalForm::Third,
            NormalForm::BoyceCodd,
        ])
    ) {
        let config = Config::default();
        let result = Normalizer::new(config.clone()).normalize(&r, target).unwrap();
        prop_assert!(!result.is_partial(), "{:?}", result.failure());
        prop_assert_eq!(Some(target), result.reached());
        for relation in result.relations() {
            let violations =
                classify(relation, target, &config, &mut AssumeAtomic, &mut TrustData).unwrap();
            prop_assert!(violations.is_empty(), "{} violates {}", relation, target);
        }
    }

    }
}
