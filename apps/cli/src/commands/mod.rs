//! 命令定义和实现

pub mod classify;
pub mod config;
pub mod energy;
pub mod monitor;
pub mod parse;

pub use classify::ClassifyCommand;
pub use config::ConfigCommand;
pub use energy::EnergyCommand;
pub use monitor::MonitorCommand;
pub use parse::ParseCommand;
