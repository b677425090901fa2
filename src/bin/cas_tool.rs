use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use indoc::indoc;
use log::{Level, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use cas::{CasProcessor, ProcessorSettings};
use std::path::{Path, PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Action {
    Unpack,
    Pack,
}

struct CasTool {
    input: Option<PathBuf>,
    settings: ProcessorSettings,
    info: bool,
    verbosity_level: Option<Level>,
}

impl CasTool {
    pub fn from_cli_matches(matches: &ArgMatches) -> Self {
        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        CasTool {
            input: matches.get_one::<String>("INPUT").map(PathBuf::from),
            settings: ProcessorSettings::new().relocate_all(matches.get_flag("relocate-all")),
            info: matches.get_flag("info"),
            verbosity_level,
        }
    }

    /// Main entry point for `CasTool`
    pub fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        let Some(input) = &self.input else {
            println!("No arguments provided.");
            return Ok(());
        };

        let action = match Self::action_for(input) {
            Ok(action) => action,
            Err(message) => {
                println!("{}", message);
                return Ok(());
            }
        };

        let processor = CasProcessor::new().with_configuration(self.settings.clone());

        match action {
            Action::Unpack if self.info => {
                let data = std::fs::read(input)
                    .with_context(|| format!("Failed to open file {}", input.display()))?;
                let info = processor
                    .inspect(&data)
                    .with_context(|| format!("Failed to inspect {}", input.display()))?;
                println!("{}", serde_json::to_string_pretty(&info)?);
            }
            Action::Unpack => {
                println!("Unpacking {}...", input.display());
                let report = processor
                    .unpack(input)
                    .with_context(|| format!("Failed to unpack {}", input.display()))?;
                println!(
                    "Exporting {} byte CANM file to {}",
                    report.span.len(),
                    report.output.display()
                );
            }
            Action::Pack => {
                println!("Packing {}...", input.display());
                let report = processor
                    .pack(input)
                    .with_context(|| format!("Failed to pack {}", input.display()))?;
                let total = report.repack.total();
                println!("Packed into {}", report.container.display());
                println!(
                    "Updating CAS string pointers by {} ({} shifted, {} left in place)",
                    report.repack.delta, total.shifted, total.skipped
                );
                println!("Updating CAS Complete!");
            }
        }

        Ok(())
    }

    fn action_for(input: &Path) -> std::result::Result<Action, &'static str> {
        let extension = input
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or("Invalid file path.")?;

        match extension.to_ascii_lowercase().as_str() {
            "cas" => Ok(Action::Unpack),
            "canm" => Ok(Action::Pack),
            _ => Err("Unsupported file type."),
        }
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
            if let Err(e) = TermLogger::init(
                level.to_level_filter(),
                config,
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
    }
}

fn command() -> Command {
    Command::new("cas_tool")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Unpack the CANM resource of a CAS file, or pack a CANM file back into its CAS")
        .long_about(indoc!(r#"
            Unpack the CANM resource of a CAS file, or pack a CANM file back into its CAS.

            The action is chosen from the input's extension (case-insensitive):
                <name>.cas   - writes the embedded resource to <name>.CANM
                <name>.canm  - replaces the resource inside <name>.CAS, in place

            When packing, string offsets in the CAS tables that point past the old
            resource are shifted by the change in size.
        "#))
        .arg(Arg::new("INPUT").help("A .cas file to unpack or a .canm file to pack"))
        .arg(
            Arg::new("info")
                .long("info")
                .action(ArgAction::SetTrue)
                .help("With a .cas input, print the container tables and CANM names as JSON instead of unpacking."),
        )
        .arg(
            Arg::new("relocate-all")
                .long("relocate-all")
                .action(ArgAction::SetTrue)
                .help(
                    "When packing, shift every table entry regardless of where it points. \
                     Use this when the container stores its string offsets relative to each \
                     entry; the default only shifts container-absolute offsets past the old \
                     end of the CANM resource.",
                ),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace.\
                 trace output is only available in debug builds, as it is extremely verbose"),
        )
}

fn main() -> Result<()> {
    let matches = command().get_matches();
    CasTool::from_cli_matches(&matches).run()
}
