//! Process-level logging init ("the XML configuration loader and
//! process-level logger" are external collaborators; this is the one side
//! of that pair the core still owns — turning on `tracing` output for a
//! plugin process that embeds this crate).

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber that logs to stderr, honouring
/// `RUST_LOG` and falling back to `info` when it isn't set. Call once from
/// the plugin binary's engine-open path; calling it twice is harmless
/// (the second install is a silent no-op).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
