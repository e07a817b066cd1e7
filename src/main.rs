use buildsmith::cli::commands::{CliArgs, Commands};
use buildsmith::cli::handlers::handle_fix_update;
use buildsmith::update::FixUpdateCommand;
use buildsmith::util::logging::{init_logging, parse_level, LoggingConfig};
use buildsmith::VERSION;

use clap::Parser;
use tracing::{debug, Level};

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("buildsmith v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Update(update_args) => handle_fix_update(FixUpdateCommand::Update, update_args),
        Commands::Fix(fix_args) => handle_fix_update(FixUpdateCommand::Fix, fix_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = LoggingConfig::from_env();
    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }
    init_logging(config);
}
