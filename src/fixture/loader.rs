use std::path::Path;

use log::info;

use super::parquet;
use crate::columnar;
use crate::errinput;
use crate::error::Result;
use crate::sql::engine::Session;

/// Derives a table name from a fixture file name: the file stem with all
/// ASCII punctuation removed, lowercased. "line-item.parquet" → "lineitem".
pub fn table_name(file: &str) -> Result<String> {
    let stem = Path::new(file).file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name: String =
        stem.chars().filter(|c| !c.is_ascii_punctuation()).collect::<String>().to_lowercase();
    if name.is_empty() {
        return errinput!("can't derive a table name from fixture {file}");
    }
    Ok(name)
}

/// Loads Parquet fixture files as tables into an engine. Loading a table
/// that already exists replaces it.
pub trait FixtureLoader {
    /// Loads the given files from the data directory, returning the table
    /// names in the order of the files.
    fn load(&mut self, data_dir: &Path, files: &[&str]) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            let path = data_dir.join(file);
            if !path.is_file() {
                return errinput!("fixture {} does not exist", path.display());
            }
            let name = table_name(file)?;
            self.load_table(&name, &path)?;
            info!("loaded fixture {} as table {name}", path.display());
            names.push(name);
        }
        Ok(names)
    }

    /// Loads a single Parquet file as the named table.
    fn load_table(&mut self, name: &str, path: &Path) -> Result<()>;
}

/// The SQL engine loads fixtures with CREATE OR REPLACE TABLE ... AS SELECT.
impl FixtureLoader for Session {
    fn load_table(&mut self, name: &str, path: &Path) -> Result<()> {
        let path = path.to_string_lossy().replace('\'', "''");
        let name = name.replace('"', "\"\"");
        self.execute(&format!(
            "CREATE OR REPLACE TABLE \"{name}\" AS SELECT * FROM read_parquet('{path}')"
        ))?;
        Ok(())
    }
}

/// The columnar engine registers the file's contents directly.
impl FixtureLoader for columnar::Engine {
    fn load_table(&mut self, name: &str, path: &Path) -> Result<()> {
        self.register_table(name, parquet::read_batch(path)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType as ArrowType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use test_case::test_case;

    use super::*;

    #[test_case("lineitem.parquet" => "lineitem"; "plain")]
    #[test_case("line-item.parquet" => "lineitem"; "dash")]
    #[test_case("data/Part_Supp.v2.parquet" => "partsuppv2"; "punctuation and case")]
    #[test_case("orders" => "orders"; "no extension")]
    fn names(file: &str) -> String {
        table_name(file).unwrap()
    }

    #[test_case("-.parquet"; "only punctuation")]
    #[test_case(""; "empty")]
    fn invalid_names(file: &str) {
        assert!(table_name(file).is_err());
    }

    #[test]
    fn load_into_both_engines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", ArrowType::Int64, false),
            Field::new("name", ArrowType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("it's"), None])),
            ],
        )?;
        parquet::write(dir.path().join("my-names.parquet"), schema, &[batch])?;

        let mut session = Session::connect();
        assert_eq!(session.load(dir.path(), &["my-names.parquet"])?, vec!["mynames"]);
        // Loading again replaces the table.
        session.load(dir.path(), &["my-names.parquet"])?;
        assert_eq!(session.query("SELECT * FROM mynames")?.num_rows(), 2);

        let mut engine = columnar::Engine::new();
        assert_eq!(engine.load(dir.path(), &["my-names.parquet"])?, vec!["mynames"]);
        assert_eq!(engine.table_names(), vec!["mynames".to_string()]);

        assert!(session.load(dir.path(), &["missing.parquet"]).is_err());
        Ok(())
    }
}
