pub mod config;
pub mod run;
pub mod tracing;
pub mod wiring;

pub use config::{default_config_path, load_config, resolve_config};
pub use run::{report_fatal, run_client, run_server};
pub use wiring::{wire_client, wire_server, WiringError};
