//! buildsmith - generates and updates Bazel build files
//!
//! buildsmith walks a repository, generates build rules for the Go and
//! protobuf sources it finds, merges them into the build files already
//! present without disturbing hand-written content, and resolves the
//! dependencies between rules using every build file in the repository.
//!
//! # Example Usage
//!
//! ```no_run
//! use buildsmith::cli::FixUpdateArgs;
//! use buildsmith::language::LanguageRegistry;
//! use buildsmith::update::{run_fix_update, FixUpdateCommand};
//!
//! let args = FixUpdateArgs {
//!     mode: "diff".to_string(),
//!     ..Default::default()
//! };
//! let registry = LanguageRegistry::with_defaults();
//! let mut out = std::io::stdout();
//! run_fix_update(FixUpdateCommand::Update, &args, &registry, &mut out)?;
//! # Ok::<(), buildsmith::update::UpdateError>(())
//! ```
//!
//! # Project Structure
//!
//! - [`update`]: the two-phase update pipeline and emission
//! - [`walk`]: repository traversal
//! - [`resolve`]: the repository-wide rule index
//! - [`merger`]: merging generated rules into existing files
//! - [`language`]: Go and protobuf rule generation
//! - [`rule`]: the build file model, parser and printer

// Public modules
pub mod cli;
pub mod config;
pub mod label;
pub mod language;
pub mod merger;
pub mod resolve;
pub mod rule;
pub mod update;
pub mod util;
pub mod walk;

// Re-export key types for convenient access
pub use config::{Config, ConfigError, Configurer};
pub use label::{Label, LabelError};
pub use language::{Language, LanguageRegistry};
pub use merger::{MergeError, Phase};
pub use resolve::{ImportSpec, RuleIndex, SealedRuleIndex};
pub use rule::{File, ParseError, Rule};
pub use update::{run_fix_update, EmitMode, FixUpdateCommand, UpdateError};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
