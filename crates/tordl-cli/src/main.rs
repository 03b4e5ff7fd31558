mod cli;

use crate::cli::CliCommand;

fn main() {
    // Logging is initialized once the config (and its log file) is known.
    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("tordl error: {:#}", err);
        std::process::exit(1);
    }
}
