//! The conformance case registry, grouped by function category. Each
//! category has its own inline setup tables and case list.

pub mod approximation;
pub mod arithmetic;
pub mod boolean;
pub mod rounding;

use super::TestCase;
use crate::errinput;
use crate::error::Result;
use crate::ir::builder::RelBuilder;
use crate::sql::types::{Column, DataType, Table};

/// A function category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Arithmetic,
    Boolean,
    Rounding,
    Approximation,
}

impl Category {
    /// All categories.
    pub const ALL: [Category; 4] =
        [Category::Arithmetic, Category::Boolean, Category::Rounding, Category::Approximation];

    /// The category name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Arithmetic => "arithmetic",
            Self::Boolean => "boolean",
            Self::Rounding => "rounding",
            Self::Approximation => "approximation",
        }
    }

    /// SQL statements creating the category's inline tables, run once per
    /// suite.
    pub fn setup(&self) -> &'static [&'static str] {
        match self {
            Self::Arithmetic => arithmetic::SETUP,
            Self::Boolean => boolean::SETUP,
            Self::Rounding | Self::Approximation => &[],
        }
    }

    /// The category's cases.
    pub fn cases(&self) -> &'static [TestCase] {
        match self {
            Self::Arithmetic => arithmetic::CASES,
            Self::Boolean => boolean::CASES,
            Self::Rounding => rounding::CASES,
            Self::Approximation => approximation::CASES,
        }
    }

    /// Looks up a case by name.
    pub fn case(&self, name: &str) -> Result<&'static TestCase> {
        match self.cases().iter().find(|case| case.name == name) {
            Some(case) => Ok(case),
            None => errinput!("unknown {} case {name}", self.name()),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Category {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::ALL.into_iter().find(|category| category.name() == s) {
            Some(category) => Ok(category),
            None => errinput!("unknown category {s}"),
        }
    }
}

/// Starts a reference plan from a read of the case's fixture table at the
/// given placeholder index.
fn read(tables: &[Table], index: usize) -> Result<RelBuilder> {
    let Some(table) = tables.get(index) else {
        return errinput!("no fixture table for placeholder {{{index}}}");
    };
    Ok(RelBuilder::read(&table.name, table.into()))
}

/// Describes an inline setup table with nullable columns.
fn inline_table(name: &str, columns: &[(&str, DataType)]) -> Table {
    let columns = columns
        .iter()
        .map(|(name, datatype)| Column {
            name: name.to_string(),
            datatype: *datatype,
            nullable: true,
        })
        .collect();
    Table { name: name.to_string(), columns }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::fixture::tpch;

    #[test]
    fn case_names_are_unique() {
        for category in Category::ALL {
            let mut names = HashSet::new();
            for case in category.cases() {
                assert!(names.insert(case.name), "duplicate {category} case {}", case.name);
            }
        }
    }

    #[test]
    fn cases_use_generated_fixtures() {
        for category in Category::ALL {
            for case in category.cases() {
                for file in case.files {
                    assert!(tpch::FILES.contains(file), "{category}/{} uses {file}", case.name);
                }
            }
        }
    }

    #[test]
    fn lookup() -> Result<()> {
        assert_eq!("rounding".parse::<Category>()?, Category::Rounding);
        assert!("nope".parse::<Category>().is_err());
        assert_eq!(Category::Approximation.case("approx_count_distinct")?.files.len(), 1);
        assert!(Category::Boolean.case("nope").is_err());
        Ok(())
    }
}
