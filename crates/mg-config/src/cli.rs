//! Command-line surface, matching the flag set of the original's `argp`
//! table one for one.

use clap::Parser;

/// This program simulates Microgrid-based systems.
#[derive(Debug, Parser)]
#[command(name = "mgsim", version, about)]
pub struct Cli {
    /// Start the simulator in interactive mode.
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Read configuration from FILE.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<String>,

    /// Overrides the configuration option NAME with value VAL. Repeatable.
    #[arg(short = 'o', long = "override", value_name = "NAME=VAL")]
    pub overrides: Vec<String>,

    /// Read symbols from FILE.
    #[arg(short = 's', long = "symtable", value_name = "FILE")]
    pub symtable_file: Option<String>,

    /// Dump configuration to standard error prior to program startup.
    #[arg(short = 'd', long = "dump-configuration")]
    pub dump_configuration: bool,

    /// Exit before the program starts, but after the system is configured.
    #[arg(short = 'n', long = "do-nothing")]
    pub do_nothing: bool,

    /// Do not print simulation statistics after execution.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Terminate the simulator upon an exception, instead of dropping to
    /// the interactive prompt.
    #[arg(short = 't', long)]
    pub terminate: bool,

    /// Dump list of monitor variables prior to program startup.
    #[arg(short = 'l', long = "list-mvars")]
    pub list_mvars: bool,

    /// Print the value of all monitoring variables matching PATTERN. Repeatable.
    #[arg(short = 'p', long = "print-final-mvars", value_name = "PATTERN")]
    pub print_final_mvars: Vec<String>,

    /// Dump the grid topology to FILE prior to program startup.
    #[arg(short = 'T', long = "dump-topology", value_name = "FILE")]
    pub dump_topology: Option<String>,

    /// Store the integer VALUE in the specified register of the initial thread.
    #[arg(short = 'R', long, value_names = ["NUM", "VALUE"], num_args = 2)]
    pub reg: Vec<String>,

    /// Store the float VALUE in the specified FP register of the initial thread.
    #[arg(short = 'F', long, value_names = ["NUM", "VALUE"], num_args = 2)]
    pub freg: Vec<String>,

    /// Create a ROM component with the contents of FILE and store the address
    /// in the specified register of the initial thread.
    #[arg(short = 'L', long, value_names = ["NUM", "FILE"], num_args = 2)]
    pub load: Vec<String>,

    /// Enable asynchronous simulation monitoring.
    #[arg(short = 'm', long)]
    pub monitor: bool,

    /// Dump area information prior to program startup, assuming the given
    /// technology size in nanometers.
    #[arg(short = 'a', long = "area", value_name = "VAL")]
    pub area_tech: Option<u32>,

    /// The first positional argument is loaded as the boot ROM image; the
    /// rest are stored as strings in a data ROM.
    pub program_args: Vec<String>,
}

impl Cli {
    pub fn parse_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides_and_positional_program_args() {
        let cli = Cli::parse_args(["mgsim", "-o", "a=1", "-o", "b=2", "-t", "image.rom"]);
        assert_eq!(cli.overrides, vec!["a=1", "b=2"]);
        assert!(cli.terminate);
        assert_eq!(cli.program_args, vec!["image.rom"]);
    }

    #[test]
    fn interactive_and_config_flags() {
        let cli = Cli::parse_args(["mgsim", "-i", "-c", "mgsim.conf"]);
        assert!(cli.interactive);
        assert_eq!(cli.config_file.as_deref(), Some("mgsim.conf"));
    }
}
