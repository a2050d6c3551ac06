//! The conformance harness. A plan producer compiles SQL into a portable
//! plan, plan consumers execute it, and the comparator checks each consumer's
//! result against the reference engine's direct SQL result.
//!
//! Engines are only accessed through the Producer and Consumer traits, so
//! the harness treats both in-tree engines the way it would treat external
//! ones.

mod case;
pub mod cases;
mod compare;
mod suite;

pub use case::{substitute, ReferenceFn, TestCase};
pub use compare::{compare, CompareOptions, Mismatch};
pub use suite::{CaseError, ConsumerKind, Report, Stage, Suite};

use arrow::record_batch::RecordBatch;

use crate::columnar;
use crate::error::Result;
use crate::ir::{PlanFormat, PlanPayload};
use crate::sql::engine::Session;

/// Compiles SQL queries into plan payloads. Compilation errors are passed
/// through unchanged.
pub trait Producer {
    /// Compiles a query into a plan payload in the given format.
    fn produce(&self, sql: &str, format: PlanFormat) -> Result<PlanPayload>;
}

/// Executes plan payloads, materializing the full result. Each run is
/// all-or-nothing, and execution errors are passed through unchanged.
pub trait Consumer {
    /// The consumer's name, used in reports.
    fn name(&self) -> &'static str;
    /// The payload format the consumer expects.
    fn format(&self) -> PlanFormat;
    /// Executes a plan payload.
    fn run(&self, payload: &PlanPayload) -> Result<RecordBatch>;
}

impl Producer for Session {
    fn produce(&self, sql: &str, format: PlanFormat) -> Result<PlanPayload> {
        Session::produce(self, sql, format)
    }
}

/// The reference session consumes binary plans.
impl Consumer for Session {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn format(&self) -> PlanFormat {
        PlanFormat::Binary
    }

    fn run(&self, payload: &PlanPayload) -> Result<RecordBatch> {
        self.execute_plan(payload)
    }
}

/// The columnar engine consumes textual plans, bridged through a generic
/// message.
impl Consumer for columnar::Engine {
    fn name(&self) -> &'static str {
        "columnar"
    }

    fn format(&self) -> PlanFormat {
        PlanFormat::Json
    }

    fn run(&self, payload: &PlanPayload) -> Result<RecordBatch> {
        self.execute(payload)
    }
}
