use serde::{Deserialize, Serialize};

use super::functions::{self, FunctionSignature};
use crate::errdata;
use crate::error::Result;

/// The plan format major version. Consumers reject plans with a different
/// major version.
pub const MAJOR_VERSION: u32 = 1;
/// The plan format minor version.
pub const MINOR_VERSION: u32 = 0;

/// A portable query plan: a tree of relational operators, along with the
/// extension functions it references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub version: Version,
    /// Extension function declarations. Function calls reference these by
    /// anchor.
    pub extensions: Vec<FunctionExtension>,
    pub root: RelRoot,
}

/// The plan format version, and the producer that emitted the plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub producer: String,
}

impl Version {
    /// Returns the current version for the given producer.
    pub fn current(producer: &str) -> Self {
        Self { major: MAJOR_VERSION, minor: MINOR_VERSION, producer: producer.to_string() }
    }

    /// Checks that plans of this version can be consumed.
    pub fn check(&self) -> Result<()> {
        if self.major != MAJOR_VERSION {
            return errdata!(
                "unsupported plan version {}.{} from {}, expected {MAJOR_VERSION}.x",
                self.major,
                self.minor,
                self.producer
            );
        }
        Ok(())
    }
}

/// Declares an extension function under an anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionExtension {
    pub anchor: u32,
    pub name: String,
}

/// The plan root: the relation tree and its output column names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelRoot {
    pub input: Rel,
    pub names: Vec<String>,
}

/// A relational operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Rel {
    /// Reads all rows of a named table with the given schema, optionally
    /// discarding rows where the filter isn't true.
    Read { table: String, schema: NamedStruct, filter: Option<Expr> },
    /// Discards rows where the condition isn't true.
    Filter { input: Box<Rel>, condition: Expr },
    /// Emits one column per expression. Unlike a SQL projection, input
    /// columns are not passed through unless referenced.
    Project { input: Box<Rel>, expressions: Vec<Expr> },
    /// Groups rows by the grouping expressions and computes the measures for
    /// each group. Emits the grouping columns followed by the measures. Without
    /// groupings, emits exactly one row.
    Aggregate { input: Box<Rel>, groupings: Vec<Expr>, measures: Vec<Measure> },
    /// Sorts rows by the sort fields. The sort is stable.
    Sort { input: Box<Rel>, sorts: Vec<SortField> },
    /// Skips offset rows, then emits at most count rows.
    Fetch { input: Box<Rel>, offset: u64, count: Option<u64> },
    /// A constant set of rows, each with width literals.
    Values { width: usize, rows: Vec<Vec<Literal>> },
}

/// A scalar expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// A reference to an input column, by index.
    Field(usize),
    /// A call to an extension scalar function, by anchor.
    Call { function: u32, arguments: Vec<Expr> },
}

/// A literal value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(#[serde(with = "float")] f64),
    String(String),
}

/// A named struct, i.e. a table schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedStruct {
    pub names: Vec<String>,
    pub types: Vec<Type>,
}

/// A column type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
    pub nullable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    Integer,
    Float,
    String,
}

/// An aggregate function call, by anchor. Count without arguments counts
/// all rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub function: u32,
    pub arguments: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub expr: Expr,
    pub direction: SortDirection,
}

/// Sort directions. NULLs sort first in ascending order and last in
/// descending order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    AscNullsFirst,
    DescNullsLast,
}

impl Plan {
    /// Resolves a function anchor to its declared name and signature.
    pub fn function(&self, anchor: u32) -> Result<&'static FunctionSignature> {
        let Some(extension) = self.extensions.iter().find(|e| e.anchor == anchor) else {
            return errdata!("undeclared function anchor {anchor}");
        };
        functions::lookup(&extension.name)
    }

    /// Returns true if the plan output is ordered, i.e. the root's chain of
    /// row-preserving operators contains a Sort.
    pub fn is_ordered(&self) -> bool {
        self.output_order().is_some()
    }

    /// Returns the order of the plan's output rows, or None if the output is
    /// unordered.
    pub fn output_order(&self) -> Option<OutputOrder> {
        // For each column of the current relation, the output column that
        // shows it unchanged, if any.
        let mut visible: Vec<Option<usize>> = (0..self.root.names.len()).map(Some).collect();
        let mut truncated = false;
        let mut rel = &self.root.input;
        loop {
            match rel {
                Rel::Sort { sorts, .. } => {
                    let columns = sorts
                        .iter()
                        .map_while(|sort| match sort.expr {
                            Expr::Field(index) => visible.get(index).copied().flatten(),
                            _ => None,
                        })
                        .collect();
                    return Some(OutputOrder { columns, truncated });
                }
                Rel::Project { input, expressions } => {
                    let width = expressions
                        .iter()
                        .filter_map(|expr| match expr {
                            Expr::Field(index) => Some(index + 1),
                            _ => None,
                        })
                        .max()
                        .unwrap_or(0);
                    let mut inner = vec![None; width];
                    for (expr, output) in expressions.iter().zip(&visible) {
                        if let (Expr::Field(index), Some(output)) = (expr, output) {
                            inner[*index].get_or_insert(*output);
                        }
                    }
                    visible = inner;
                    rel = input;
                }
                Rel::Fetch { input, offset, count } => {
                    truncated |= *offset > 0 || count.is_some();
                    rel = input;
                }
                Rel::Filter { input, .. } => rel = input,
                Rel::Read { .. } | Rel::Aggregate { .. } | Rel::Values { .. } => return None,
            }
        }
    }
}

/// The order of a plan's output rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputOrder {
    /// The output columns holding the sort keys, outermost first. Stops at
    /// the first sort key that isn't an output column. Rows with equal
    /// values in these columns may come in any order.
    pub columns: Vec<usize>,
    /// Whether a Fetch above the Sort may have cut off rows that tie with
    /// the first or last emitted rows.
    pub truncated: bool,
}

impl NamedStruct {
    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the struct has no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Boolean => "boolean",
            Self::Integer => "i64",
            Self::Float => "fp64",
            Self::String => "string",
        })
    }
}

/// Serializes floats as numbers, except non-finite floats in human-readable
/// formats, which are written as strings since JSON can't represent them.
mod float {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() || !serializer.is_human_readable() {
            return serializer.serialize_f64(*value);
        }
        let text = if value.is_nan() {
            "NaN"
        } else if value.is_sign_positive() {
            "Infinity"
        } else {
            "-Infinity"
        };
        serializer.serialize_str(text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }
        if !deserializer.is_human_readable() {
            return f64::deserialize(deserializer);
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(f) => Ok(f),
            Repr::Text(s) => match s.as_str() {
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                s => Err(serde::de::Error::custom(format!("invalid float {s}"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{bincode, json};

    fn plan(input: Rel) -> Plan {
        Plan {
            version: Version::current("test"),
            extensions: vec![FunctionExtension { anchor: 1, name: "add".into() }],
            root: RelRoot { input, names: vec!["a".into()] },
        }
    }

    fn values() -> Rel {
        Rel::Values { width: 1, rows: vec![vec![Literal::Float(f64::NAN)], vec![Literal::Null]] }
    }

    #[test]
    fn non_finite_floats_roundtrip() -> Result<()> {
        let literals = vec![
            Literal::Float(f64::INFINITY),
            Literal::Float(f64::NEG_INFINITY),
            Literal::Float(1.5),
        ];
        let text = json::serialize(&literals)?;
        assert_eq!(json::deserialize::<Vec<Literal>>(&text)?, literals);
        let bytes = bincode::serialize(&literals)?;
        assert_eq!(bincode::deserialize::<Vec<Literal>>(&bytes)?, literals);

        let text = json::serialize(&Literal::Float(f64::NAN))?;
        assert!(matches!(json::deserialize::<Literal>(&text)?, Literal::Float(f) if f.is_nan()));
        Ok(())
    }

    #[test]
    fn ordered_plans() {
        assert!(!plan(values()).is_ordered());
        let sort = Rel::Sort {
            input: Box::new(values()),
            sorts: vec![SortField {
                expr: Expr::Field(0),
                direction: SortDirection::AscNullsFirst,
            }],
        };
        let fetch = Rel::Fetch { input: Box::new(sort.clone()), offset: 0, count: Some(1) };
        assert!(plan(fetch).is_ordered());
        let aggregate = Rel::Aggregate {
            input: Box::new(sort),
            groupings: vec![Expr::Field(0)],
            measures: vec![],
        };
        assert!(!plan(aggregate).is_ordered());
    }

    #[test]
    fn output_order_follows_projections() {
        let sort = Rel::Sort {
            input: Box::new(Rel::Values { width: 3, rows: vec![] }),
            sorts: vec![
                SortField { expr: Expr::Field(2), direction: SortDirection::DescNullsLast },
                SortField { expr: Expr::Field(0), direction: SortDirection::AscNullsFirst },
                SortField { expr: Expr::Field(1), direction: SortDirection::AscNullsFirst },
            ],
        };
        let mut plan = plan(Rel::Project {
            input: Box::new(sort.clone()),
            expressions: vec![Expr::Field(0), Expr::Field(2)],
        });
        plan.root.names = vec!["a".into(), "c".into()];
        assert_eq!(
            plan.output_order(),
            Some(OutputOrder { columns: vec![1, 0], truncated: false })
        );

        plan.root.input = Rel::Fetch { input: Box::new(sort), offset: 0, count: Some(2) };
        plan.root.names = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(
            plan.output_order(),
            Some(OutputOrder { columns: vec![2, 0, 1], truncated: true })
        );
    }

    #[test]
    fn function_anchors() -> Result<()> {
        let plan = plan(values());
        assert_eq!(plan.function(1)?.name, "add");
        assert!(plan.function(2).is_err());
        Ok(())
    }

    #[test]
    fn version_check() {
        assert!(Version::current("test").check().is_ok());
        let version = Version { major: MAJOR_VERSION + 1, minor: 0, producer: "test".into() };
        assert!(version.check().is_err());
    }
}
