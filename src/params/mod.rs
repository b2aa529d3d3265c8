//! Operating parameters: defaults, config file, command line, prompts
//!
//! - `ini` - `.ini`-style text parser shared with the alias table
//! - `table` - one descriptor per parameter (letter, kind, permissions)
//! - `settings` - the resolved parameter values
//! - `resolver` - the staged merge of all sources
//! - `prompt` - interactive completion of required parameters

pub mod ini;
pub mod prompt;
pub mod resolver;
pub mod settings;
pub mod table;

pub use prompt::{Prompter, TerminalPrompter};
pub use resolver::{
    locate_file, Directives, PreScan, RejectReason, Rejection, Resolution, ResolveError, Resolver,
    ValueSource,
};
pub use settings::{Settings, Source};
pub use table::{ParamSpec, Permissions, PARAMS};
