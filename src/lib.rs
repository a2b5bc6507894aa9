#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod generator;
pub mod ir;
pub mod layout;
pub mod layout_record;
pub mod parser;
pub mod puml;
pub mod source;
pub mod sync;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use generator::generate_aml;
pub use parser::{parse, parse_aml};
