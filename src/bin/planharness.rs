//! The planharness binary. Generates TPC-H fixtures, prints compiled plans,
//! runs ad hoc queries, and runs the conformance registry.

#![warn(clippy::all)]

use std::path::Path;

use clap::{Parser, Subcommand};
use log::info;
use planharness::error::Result;
use planharness::fixture::{tpch, FixtureLoader as _};
use planharness::harness::cases::Category;
use planharness::harness::{substitute, ConsumerKind, Suite};
use planharness::ir::{PlanFormat, PlanPayload};
use planharness::sql::engine::Session;
use planharness::{errinput, HarnessConfig};

fn main() {
    if let Err(err) = Command::parse().run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[derive(Parser)]
#[command(about = "Cross-engine conformance harness for portable query plans", version)]
struct Command {
    /// Configuration file. PLANHARNESS_* environment variables override it.
    #[arg(short = 'c', long)]
    config: Option<String>,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Generate the TPC-H Parquet fixtures into the data directory.
    Generate {
        /// Scale factor, overriding the configured one.
        #[arg(long)]
        scale_factor: Option<f64>,
        /// Seed, overriding the configured one.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Compile a SQL query into a plan and print it.
    Plan {
        /// The query. Placeholders {0}, {1}... refer to the loaded files.
        sql: String,
        /// Fixture files to load, e.g. lineitem.parquet.
        #[arg(short, long)]
        file: Vec<String>,
        /// Plan format: json or binary.
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Run a SQL query directly on the reference engine and print the result.
    Query {
        /// The query. Placeholders {0}, {1}... refer to the loaded files.
        sql: String,
        /// Fixture files to load, e.g. lineitem.parquet.
        #[arg(short, long)]
        file: Vec<String>,
    },
    /// Run conformance cases and print a report. Exits with an error if any
    /// case fails.
    Run {
        /// Only run this category.
        #[arg(long)]
        category: Option<String>,
        /// Only run the case with this name.
        #[arg(long)]
        case: Option<String>,
    },
}

impl Command {
    fn run(self) -> Result<()> {
        let mut config = HarnessConfig::load(self.config.as_deref())?;
        simplelog::TermLogger::init(
            config.log_level()?,
            simplelog::ConfigBuilder::new().set_target_level(log::LevelFilter::Off).build(),
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto,
        )?;

        match self.action {
            Action::Generate { scale_factor, seed } => {
                config.scale_factor = scale_factor.unwrap_or(config.scale_factor);
                config.seed = seed.unwrap_or(config.seed);
                generate(&config)?;
            }

            Action::Plan { sql, file, format } => {
                let format: PlanFormat = format.parse()?;
                let (mut session, sql) = Self::prepare(&config, &file, &sql)?;
                let payload = session.produce(&sql, format)?;
                if let PlanPayload::Binary(bytes) = &payload {
                    println!("binary plan, {} bytes:", bytes.len());
                }
                println!("{}", serde_json::to_string_pretty(&payload.to_message()?)?);
                session.close();
            }

            Action::Query { sql, file } => {
                let (mut session, sql) = Self::prepare(&config, &file, &sql)?;
                let result = session.query(&sql)?;
                println!("{}", arrow::util::pretty::pretty_format_batches(&[result])?);
                session.close();
            }

            Action::Run { category, case } => {
                let categories = match category {
                    Some(category) => vec![category.parse::<Category>()?],
                    None => Category::ALL.to_vec(),
                };
                if !tpch::FILES.iter().all(|f| Path::new(&config.data_dir).join(f).is_file()) {
                    generate(&config)?;
                }
                let (mut passed, mut failed) = (0, 0);
                for category in categories {
                    let mut suite = Suite::setup(config.clone(), category)?;
                    let results = match &case {
                        None => suite.check_all(),
                        Some(name) => {
                            let mut results = Vec::new();
                            let tests = category.cases().iter().filter(|t| t.name == name.as_str());
                            for test in tests {
                                for kind in ConsumerKind::ALL {
                                    results.push(suite.check(test, kind));
                                }
                            }
                            results
                        }
                    };
                    for result in results {
                        match result {
                            Ok(report) if report.is_ok() => {
                                passed += 1;
                                println!("{report}");
                            }
                            Ok(report) => {
                                failed += 1;
                                println!("{report}");
                            }
                            Err(err) => {
                                failed += 1;
                                println!("{err}");
                            }
                        }
                    }
                }
                println!("{passed} passed, {failed} failed");
                if failed > 0 {
                    return errinput!("{failed} checks failed");
                }
                if passed == 0 {
                    return errinput!("no cases matched");
                }
            }
        }
        Ok(())
    }

    /// Connects a session with plans enabled, loads the fixture files, and
    /// substitutes their table names into the query's placeholders.
    fn prepare(config: &HarnessConfig, files: &[String], sql: &str) -> Result<(Session, String)> {
        let mut session = Session::connect();
        session.execute("INSTALL plans")?;
        session.execute("LOAD plans")?;
        let files: Vec<&str> = files.iter().map(String::as_str).collect();
        let tables = session.load(Path::new(&config.data_dir), &files)?;
        let sql = substitute(sql, &tables)?;
        Ok((session, sql))
    }
}

/// Generates the fixtures into the configured data directory.
fn generate(config: &HarnessConfig) -> Result<()> {
    info!("generating fixtures at scale factor {} into {}", config.scale_factor, config.data_dir);
    for path in tpch::generate(&config.data_dir, config.scale_factor, config.seed)? {
        println!("{}", path.display());
    }
    Ok(())
}
