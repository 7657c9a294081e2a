use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use brine_wire::{load_plan, ByteOrder, CompilerOptions, Error, Flyweight};

#[derive(Parser)]
#[command(name = "bwire")]
#[command(about = "Check, plan or decode Brine Wire schemas and messages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, validate and plan a schema
    Check {
        /// Input schema file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the wire plan of a schema as JSON
    Plan {
        /// Input schema file
        #[arg(short, long)]
        input: PathBuf,

        /// Output `.json` file (if omitted, prints to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Make network byte order the default
        #[arg(long)]
        network: bool,

        /// Compiler options as JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Decode a message and print it
    Decode {
        /// Input schema file
        #[arg(short, long)]
        input: PathBuf,

        /// Declaration to decode as
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Binary message file
        #[arg(short, long)]
        data: PathBuf,

        /// Where the message starts in the file
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

fn options(config: Option<&Path>, network: bool) -> Result<CompilerOptions, Error> {
    let mut options = match config {
        Some(path) => CompilerOptions::from_json(&fs::read_to_string(path)?)?,
        None => CompilerOptions::default(),
    };
    if network {
        options.default_byte_order = ByteOrder::Network;
    }
    Ok(options)
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Check { input } => {
            let plan = load_plan(input, &CompilerOptions::default())?;
            println!("{}: {} declarations", input.display(), plan.len());
            Ok(())
        }

        Commands::Plan {
            input,
            output,
            network,
            config,
        } => {
            let plan = load_plan(input, &options(config.as_deref(), *network)?)?;
            let json = serde_json::to_string_pretty(&plan)?;
            if let Some(out_path) = output {
                fs::write(out_path, &json)?;
                info!("wrote plan of {} to {}", input.display(), out_path.display());
            } else {
                println!("{}", json);
            }
            Ok(())
        }

        Commands::Decode {
            input,
            type_name,
            data,
            offset,
        } => {
            let plan = load_plan(input, &CompilerOptions::default())?;
            let bytes = fs::read(data)?;
            let mut view = Flyweight::new(&plan, type_name)?;
            let limit = view.wrap(&bytes, *offset, bytes.len())?;
            info!("decoded {} from {}..{}", type_name, offset, limit);
            println!("{}", view);
            Ok(())
        }
    }
}
