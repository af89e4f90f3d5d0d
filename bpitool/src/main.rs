use bpitool::{bpi_to_images, collect_bpi, image_to_bpi, ConvertOptions};
use libbpi::DepthProfile;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

#[cfg(not(debug_assertions))]
const DEFAULT_DEBUG_LEVEL: u8 = 1;
#[cfg(debug_assertions)]
const DEFAULT_DEBUG_LEVEL: u8 = 99;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, default_value_t = DEFAULT_DEBUG_LEVEL, action = clap::ArgAction::Count)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// converts images to single-image BPI files
    Convert {
        /// The images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Depth profile code (0-15) to store pixels with
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..16))]
        depth: Option<u8>,

        /// Store a palette of the image's distinct colors
        #[arg(short, long)]
        palette: bool,

        /// The output file name (single input only)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// decodes every image of a BPI file to PNG
    Extract {
        /// The BPI file
        bpi_file: PathBuf,

        /// The output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// appends the images of several BPI files into one collection
    Collect {
        /// The output BPI file
        output: PathBuf,

        /// The BPI files to append, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn sibling_with_extension(file: &Path, suffix: &str) -> Result<PathBuf> {
    let Some(dir) = file.parent() else {
        bail!("Invalid file {}", file.display());
    };
    let Some(Some(filename)) = file.file_stem().map(|os| os.to_str()) else {
        bail!("Invalid file {}", file.display());
    };
    let output = dir.join(format!("{filename}.{suffix}"));
    info!("output name: {}", output.display());
    Ok(output)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_file(true)
        .with_line_number(true)
        .init();

    match cli.command {
        Commands::Convert {
            inputs,
            depth,
            palette,
            output,
        } => {
            if output.is_some() && inputs.len() > 1 {
                bail!("--output can only be used with a single input");
            }
            let options = ConvertOptions {
                depth: depth.map(DepthProfile::try_from).transpose()?,
                palette,
            };
            for input in &inputs {
                let output = match &output {
                    Some(o) => o.clone(),
                    None => sibling_with_extension(input, "bpi")?,
                };
                image_to_bpi(input, &output, options)?;
            }
        }
        Commands::Extract { bpi_file, output } => {
            let output = match output {
                Some(o) => o,
                None => match bpi_file.parent() {
                    Some(dir) => dir.to_path_buf(),
                    None => bail!("Invalid bpi file"),
                },
            };
            let written = bpi_to_images(&bpi_file, &output)?;
            info!("extracted {} images", written.len());
        }
        Commands::Collect { output, inputs } => {
            let descriptor = collect_bpi(&output, &inputs)?;
            info!(
                "{} blocks, {} images",
                descriptor.block_count(),
                descriptor.image_count()
            );
        }
    }
    Ok(())
}
