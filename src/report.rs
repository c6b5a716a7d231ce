use normalform::{join, Attribute, NormalForm, Normalized, Relation};
use std::fmt;

/// Renders a normalization run as markdown: the initial relation, the violations found
/// at each normal form and the resulting relations.
pub struct Report<'a> {
    initial: &'a Relation,
    normalized: &'a Normalized,
}

impl<'a> Report<'a> {
    pub fn new(initial: &'a Relation, normalized: &'a Normalized) -> Self {
        Self {
            initial,
            normalized,
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

fn names(attributes: &[Attribute]) -> String {
    attributes
        .iter()
        .map(Attribute::name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn list(f: &mut fmt::Formatter<'_>, title: &str, items: &[String]) -> fmt::Result {
    writeln!(f, "- **{}**", title)?;
    if items.is_empty() {
        writeln!(f, "    - None")?;
    }
    for item in items {
        writeln!(f, "    - {}", item)?;
    }
    Ok(())
}

fn table(f: &mut fmt::Formatter<'_>, relation: &Relation) -> fmt::Result {
    writeln!(f, "## {}\n", relation.name())?;
    let attributes = relation.attributes().iter().map(Attribute::name).collect::<Vec<_>>();
    writeln!(f, "| {} |", attributes.join(" | "))?;
    writeln!(
        f,
        "| {} |",
        attributes.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
    )?;
    if let Some(rows) = relation.tuples() {
        for row in rows {
            let values = relation
                .attributes()
                .iter()
                .map(|a| row.get(a).map_or("", String::as_str))
                .collect::<Vec<_>>();
            writeln!(f, "| {} |", values.join(" | "))?;
        }
    }
    writeln!(f)?;

    let primary_key = if relation.primary_key().is_empty() {
        Vec::new()
    } else {
        vec![names(relation.primary_key())]
    };
    let foreign_keys = relation
        .foreign_keys()
        .iter()
        .map(|fk| match &fk.references {
            Some(target) => format!("{} references {}", join(&fk.attributes), target),
            None => join(&fk.attributes),
        })
        .collect::<Vec<_>>();
    let candidate_keys = relation
        .candidate_keys()
        .iter()
        .map(join)
        .collect::<Vec<_>>();
    let dependencies = relation
        .dependencies()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    list(f, "Primary Key", &primary_key)?;
    list(f, "Foreign Keys", &foreign_keys)?;
    list(f, "Candidate Keys", &candidate_keys)?;
    list(f, "Functional Dependencies", &dependencies)?;
    writeln!(f, "\n---\n")
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Initial Table\n")?;
        table(f, self.initial)?;

        let target = self.normalized.target();
        for form in NormalForm::ALL.iter().copied().filter(|form| *form <= target) {
            let entries = self
                .normalized
                .history()
                .iter()
                .filter(|entry| entry.stage == form)
                .map(|entry| format!("{}: {}", entry.relation, entry.violation))
                .collect::<Vec<_>>();
            writeln!(f, "# {}\n", form)?;
            list(f, "Violations", &entries)?;
            if self.normalized.reached().map_or(true, |reached| reached < form) {
                writeln!(f, "\nNot reached.")?;
            }
            writeln!(f)?;
        }

        if let Some(failure) = self.normalized.failure() {
            writeln!(f, "**Stopped:** {}\n", failure)?;
        }
        match self.normalized.reached() {
            Some(reached) => writeln!(f, "# Tables in {}\n", reached)?,
            None => writeln!(f, "# Tables\n")?,
        }
        for relation in self.normalized.relations() {
            table(f, relation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use normalform::{Config, FunctionalDependency, Normalizer};

    #[test]
    fn test_render() {
        let mut relation = Relation::new("enrollment", vec!["s", "c", "t"]).unwrap();
        relation.set_primary_key(vec!["s", "c"]).unwrap();
        relation
            .add_dependency(FunctionalDependency::new(vec!["t"], vec!["c"]).unwrap())
            .unwrap();
        let normalized = Normalizer::new(Config::default())
            .normalize(&relation, NormalForm::BoyceCodd)
            .unwrap();

        let text = Report::new(&relation, &normalized).render();
        assert!(text.starts_with("# Initial Table\n\n## enrollment\n\n| s | c | t |\n"));
        assert!(text.contains(
            "# BCNF\n\n- **Violations**\n    - enrollment: non-superkey determinant: t -> c\n"
        ));
        assert!(text.contains("# 3NF\n\n- **Violations**\n    - None\n"));
        assert!(text.contains("# Tables in BCNF\n"));
        assert!(text.contains("## enrollment_1\n\n| c | t |\n"));
        assert!(text.contains("    - t references enrollment_1\n"));
    }
}
