pub mod organizations;
pub mod run;

// Re-export command functions for convenience
pub use organizations::organizations;
pub use run::{resume, run};
