pub mod graceful;
pub mod server;

pub use graceful::{exit_status, ShutdownCoordinator, ShutdownError, ShutdownOutcome};
pub use server::{ApiServer, AppState};
