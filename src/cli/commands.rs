use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Generates and updates Bazel build files
#[derive(Parser, Debug)]
#[command(
    name = "buildsmith",
    about = "Generates and updates Bazel build files",
    version,
    author,
    long_about = "buildsmith walks a repository, generates build rules for Go and protobuf \
                  sources, merges them with hand-written rules already present, and resolves \
                  dependencies between them using every build file in the repository."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Create new build files and update existing ones",
        long_about = "Creates new build files and updates existing build files when needed.\n\n\
                      Output modes (--mode):\n  \
                      fix (default) - write updated build files back to disk\n  \
                      print - print updated build files to stdout\n  \
                      diff - print a unified diff against the existing files\n\n\
                      Examples:\n  \
                      buildsmith update\n  \
                      buildsmith update --mode diff ./pkg\n  \
                      buildsmith update --go-prefix example.com/repo"
    )]
    Update(FixUpdateArgs),

    #[command(
        about = "Like update, but may also make breaking changes to existing rules",
        long_about = "Creates and updates build files like update, and in addition may make \
                      potentially breaking updates to usage of rules, such as renaming obsolete \
                      attributes. When the repository root is among the requested directories, \
                      the WORKSPACE file is fixed as well."
    )]
    Fix(FixUpdateArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct FixUpdateArgs {
    #[arg(
        long,
        value_name = "MODE",
        default_value = "fix",
        help = "print: print updated build files; fix: rewrite them in place; diff: print a diff"
    )]
    pub mode: String,

    #[arg(
        long,
        value_name = "DIR",
        help = "Write build files to an alternate directory tree"
    )]
    pub out_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "SUFFIX",
        default_value = "",
        help = "Extra suffix appended to build file names (only used with --out-dir)"
    )]
    pub out_suffix: String,

    #[arg(
        long = "known-import",
        value_name = "IMPORT",
        help = "Import path for which external resolution is skipped (repeatable)"
    )]
    pub known_imports: Vec<String>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Repository root (defaults to the nearest directory with a WORKSPACE file)"
    )]
    pub repo_root: Option<PathBuf>,

    #[arg(
        long,
        value_name = "NAMES",
        default_value = "BUILD.bazel,BUILD",
        help = "Comma-separated build file names; the first is used for new files"
    )]
    pub build_file_name: String,

    #[arg(
        long,
        value_name = "PREFIX",
        help = "Go import path prefix of the repository root"
    )]
    pub go_prefix: Option<String>,

    #[arg(
        value_name = "DIR",
        help = "Directories to update (defaults to the current directory)"
    )]
    pub dirs: Vec<PathBuf>,
}

impl Default for FixUpdateArgs {
    fn default() -> Self {
        Self {
            mode: "fix".to_string(),
            out_dir: None,
            out_suffix: String::new(),
            known_imports: Vec::new(),
            repo_root: None,
            build_file_name: "BUILD.bazel,BUILD".to_string(),
            go_prefix: None,
            dirs: Vec::new(),
        }
    }
}
