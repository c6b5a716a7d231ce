use normalform::{Attribute, Config, Error, FunctionalDependency, NormalForm, Normalizer, Relation};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .init();

    let mut enrollment = Relation::new(
        "enrollment",
        vec![
            "student",
            "course",
            "student_name",
            "phones",
            "instructor",
            "office",
            "grade",
        ],
    )?;
    enrollment.set_primary_key(vec!["student", "course"])?;
    enrollment.add_dependency(FunctionalDependency::new(
        vec!["student"],
        vec!["student_name"],
    )?)?;
    enrollment.add_dependency(FunctionalDependency::new(
        vec!["course"],
        vec!["instructor", "office"],
    )?)?;
    enrollment.add_dependency(FunctionalDependency::new(
        vec!["instructor"],
        vec!["office"],
    )?)?;
    enrollment.add_dependency(FunctionalDependency::new(
        vec!["student", "course"],
        vec!["grade"],
    )?)?;

    let atomicity = |attribute: &Attribute| Some(attribute.name() != "phones");
    let result = Normalizer::new(Config::default())
        .with_atomicity(atomicity)
        .normalize(&enrollment, NormalForm::BoyceCodd)?;

    print!("{}", result.report());
    for relation in result.relations() {
        println!("{}", relation);
        for dependency in relation.dependencies() {
            println!("    {}", dependency);
        }
    }

    Ok(())
}
