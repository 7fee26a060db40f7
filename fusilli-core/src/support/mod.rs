pub mod config;
pub mod external_tools;
pub mod logging;
pub mod process;
