use regex::Regex;

use crate::errinput;
use crate::error::Result;
use crate::ir;
use crate::sql::types::Table;

/// Builds a case's query as a plan by hand, from the schemas of the case's
/// fixture tables (in file order). Used to cross-check the SQL compiler
/// against a second plan producer.
pub type ReferenceFn = fn(&[Table]) -> Result<ir::Plan>;

/// A conformance test case.
#[derive(Clone, Copy, Debug)]
pub struct TestCase {
    /// The case name, unique within its category.
    pub name: &'static str,
    /// Fixture files to load. Their table names replace the SQL
    /// placeholders {0}, {1}, and so on.
    pub files: &'static [&'static str],
    /// The SQL query template.
    pub sql: &'static str,
    /// An optional reference plan builder.
    pub reference: Option<ReferenceFn>,
}

impl TestCase {
    /// Creates a case without a reference builder.
    pub const fn new(
        name: &'static str,
        files: &'static [&'static str],
        sql: &'static str,
    ) -> Self {
        Self { name, files, sql, reference: None }
    }

    /// Adds a reference builder.
    pub const fn with_reference(self, reference: ReferenceFn) -> Self {
        Self { reference: Some(reference), ..self }
    }

    /// Returns the SQL query with placeholders replaced by the given table
    /// names. Errors if a placeholder has no table.
    pub fn sql_for(&self, tables: &[String]) -> Result<String> {
        substitute(self.sql, tables)
    }
}

/// Replaces the placeholders {0}, {1}, and so on in a query with the given
/// table names. Errors if a placeholder has no table.
pub fn substitute(template: &str, tables: &[String]) -> Result<String> {
    let placeholder = Regex::new(r"\{(\d+)\}")?;
    let mut sql = String::with_capacity(template.len());
    let mut last = 0;
    for captures in placeholder.captures_iter(template) {
        let (Some(whole), Some(index)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let index: usize = index.as_str().parse()?;
        let Some(table) = tables.get(index) else {
            return errinput!("no table for placeholder {{{index}}}");
        };
        sql.push_str(&template[last..whole.start()]);
        sql.push_str(table);
        last = whole.end();
    }
    sql.push_str(&template[last..]);
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn case(sql: &'static str) -> TestCase {
        TestCase::new("test", &[], sql)
    }

    #[test_case("SELECT * FROM {0}", &["lineitem"] => "SELECT * FROM lineitem"; "single")]
    #[test_case("SELECT 1 FROM {1}, {0}", &["a", "b"] => "SELECT 1 FROM b, a"; "reordered")]
    #[test_case("SELECT a FROM t", &[] => "SELECT a FROM t"; "none")]
    #[test_case("SELECT {0}.a FROM {0}", &["x"] => "SELECT x.a FROM x"; "repeated")]
    fn sql_for(sql: &'static str, tables: &[&str]) -> String {
        let tables: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        case(sql).sql_for(&tables).expect("substitution failed")
    }

    #[test]
    fn sql_for_missing_table() {
        assert!(case("SELECT * FROM {1}").sql_for(&["a".to_string()]).is_err());
    }

    #[test]
    fn substitute_rejects_unmatched_placeholder() {
        let tables = vec!["lineitem".to_string()];
        let sql = substitute("SELECT * FROM {0}", &tables).expect("substitution failed");
        assert_eq!(sql, "SELECT * FROM lineitem");
        let err = substitute("SELECT * FROM {0}, {1}", &tables).unwrap_err();
        assert!(err.to_string().contains("{1}"), "{err}");
    }
}
