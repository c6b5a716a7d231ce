use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Is a normal form, ordered from the weakest to the strongest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum NormalForm {
    #[serde(rename = "1NF")]
    First,
    #[serde(rename = "2NF")]
    Second,
    #[serde(rename = "3NF")]
    Third,
    #[serde(rename = "BCNF")]
    BoyceCodd,
    #[serde(rename = "4NF")]
    Fourth,
    #[serde(rename = "5NF")]
    Fifth,
}

impl NormalForm {
    /// Lists every normal form in the order the normalizer visits them.
    pub const ALL: [NormalForm; 6] = [
        NormalForm::First,
        NormalForm::Second,
        NormalForm::Third,
        NormalForm::BoyceCodd,
        NormalForm::Fourth,
        NormalForm::Fifth,
    ];

    /// Returns the form that follows the receiver, if any.
    pub fn next(self) -> Option<NormalForm> {
        use NormalForm::*;
        match self {
            First => Some(Second),
            Second => Some(Third),
            Third => Some(BoyceCodd),
            BoyceCodd => Some(Fourth),
            Fourth => Some(Fifth),
            Fifth => None,
        }
    }

    /// Returns true if checking the form needs tuple data.
    pub fn needs_tuples(self) -> bool {
        self >= NormalForm::Fourth
    }

    pub fn as_str(self) -> &'static str {
        use NormalForm::*;
        match self {
            First => "1NF",
            Second => "2NF",
            Third => "3NF",
            BoyceCodd => "BCNF",
            Fourth => "4NF",
            Fifth => "5NF",
        }
    }
}

impl fmt::Display for NormalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Is returned when parsing an unknown normal form name.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[error("unknown normal form `{0}`")]
pub struct ParseNormalFormError(String);

impl FromStr for NormalForm {
    type Err = ParseNormalFormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        NormalForm::ALL
            .iter()
            .find(|form| form.as_str() == name)
            .copied()
            .ok_or(ParseNormalFormError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order() {
        assert!(NormalForm::First < NormalForm::Second);
        assert!(NormalForm::Third < NormalForm::BoyceCodd);
        assert!(NormalForm::BoyceCodd < NormalForm::Fourth);
        assert_eq!(Some(NormalForm::Fourth), NormalForm::BoyceCodd.next());
        assert_eq!(None, NormalForm::Fifth.next());
    }

    #[test]
    fn test_parse() {
        assert_eq!(Ok(NormalForm::BoyceCodd), "bcnf".parse::<NormalForm>());
        assert_eq!(Ok(NormalForm::Second), " 2NF ".parse::<NormalForm>());
        assert!("6NF".parse::<NormalForm>().is_err());
    }

    #[test]
    fn test_needs_tuples() {
        assert!(!NormalForm::BoyceCodd.needs_tuples());
        assert!(NormalForm::Fourth.needs_tuples());
        assert!(NormalForm::Fifth.needs_tuples());
    }
}
