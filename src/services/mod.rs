pub mod dispatcher;
pub mod host;
pub mod version_gate;

pub use dispatcher::{Dispatcher, RaiseOutcome};
pub use host::create_script_host;
pub use version_gate::VersionGate;
