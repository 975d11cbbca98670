pub mod run;
pub mod spec;

pub use run::{RunConfig, RunOutcome, TestResult};
pub use spec::{ModuleSpec, ServiceSpec};
