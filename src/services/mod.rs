pub mod dependencies;
pub mod environment;
pub mod executor;
pub mod preconditions;
pub mod probes;
pub mod process;
pub mod readiness;
pub mod reporter;
