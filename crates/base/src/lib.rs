pub mod logging;

pub use logging::{FileLogger, StdoutLogger, init_file_logger, init_stdout_logger};

// Re-export log so downstream crates can use base::log::*
pub use log;
