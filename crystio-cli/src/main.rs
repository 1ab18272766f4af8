//! crystio CLI - Command-line interface for crystallographic data formats.
//!
//! Lists the available format plugins, probes files against every
//! validator, imports data files and converts density maps.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};

use crystio_core::{ImageBuffer, MapTitle};
use crystio_io::{
    Direction, FormatKind, FormatRegistry, ImageImport, ImportConfig, Imported,
    MapFileWriter, MappedFileReader, SeriesImport,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    CrystioIo(#[from] crystio_io::Error),

    #[error("unknown format '{0}', run `crystio formats` for the list")]
    UnknownFormat(String),

    #[error("{0}")]
    Usage(String),
}

/// Import and export crystallographic data files.
#[derive(Parser)]
#[command(name = "crystio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the formats available in this build
    Formats,

    /// Run every validator against a file and report the selection
    Probe {
        /// Input file
        input: PathBuf,
    },

    /// Import a data file and print a summary
    Read {
        /// Input file
        input: PathBuf,

        /// Format id (see `crystio formats`); chosen from content if omitted
        #[arg(short, long)]
        format: Option<String>,

        /// Image number within a container (1-based)
        #[arg(long, default_value = "1")]
        image: usize,

        /// Read every image from the given number on
        #[arg(long)]
        all: bool,

        /// JSON import configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Convert a CCP4 map to the format given by the output extension
    ExportMap {
        /// Input CCP4 .map file
        input: PathBuf,

        /// Output file (.grd or .map)
        #[arg(short, long)]
        output: PathBuf,

        /// Phase name for the map title; defaults to the input file stem
        #[arg(long)]
        phase: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let registry = FormatRegistry::probe();

    match cli.command {
        Commands::Formats => list_formats(&registry),
        Commands::Probe { input } => probe(&registry, &input)?,
        Commands::Read {
            input,
            format,
            image,
            all,
            config,
        } => {
            let config = match config {
                Some(path) => ImportConfig::from_file(path)?,
                None => ImportConfig::default(),
            };
            let forced = format
                .map(|id| FormatKind::from_id(&id).ok_or(CliError::UnknownFormat(id)))
                .transpose()?;
            read(&registry, &input, forced, image, all, &config)?;
        }
        Commands::ExportMap {
            input,
            output,
            phase,
        } => export_map(&registry, &input, &output, phase)?,
    }

    Ok(())
}

fn list_formats(registry: &FormatRegistry) {
    println!(
        "{:<14} | {:<8} | {:<24} | {:<6} | {}",
        "Id", "Mode", "Extensions", "Strict", "Name"
    );
    println!("{:-<90}", "");
    for kind in registry.formats() {
        let info = kind.info();
        let mode = match info.direction {
            Direction::Import => "import",
            Direction::Export => "export",
            Direction::Both => "both",
        };
        println!(
            "{:<14} | {:<8} | {:<24} | {:<6} | {}{}",
            info.id,
            mode,
            info.extensions.join(" "),
            if info.strict_extension { "yes" } else { "no" },
            info.long_name,
            if info.scriptable { " (scriptable)" } else { "" }
        );
    }
}

fn probe(registry: &FormatRegistry, input: &Path) -> Result<()> {
    let reader = MappedFileReader::open(input)?;
    let bytes = reader.as_bytes();

    println!("File: {} ({} bytes)", input.display(), reader.len());
    for kind in registry.importers() {
        let verdict = if kind.validate(bytes) { "accepts" } else { "rejects" };
        let extension = if kind.matches_extension(input) {
            "extension match"
        } else {
            ""
        };
        println!("  {:<14} {:<8} {}", kind.info().id, verdict, extension);
    }

    match registry.select(input, bytes) {
        Ok(kind) => println!("Selected: {}", kind.info().id),
        Err(crystio_io::Error::AmbiguousFormat { candidates }) => {
            println!("Ambiguous: {} (use --format)", candidates.join(", "));
        }
        Err(e) => println!("No format: {e}"),
    }
    Ok(())
}

fn read(
    registry: &FormatRegistry,
    input: &Path,
    forced: Option<FormatKind>,
    image: usize,
    all: bool,
    config: &ImportConfig,
) -> Result<()> {
    let kind = registry.resolve(input, forced)?;
    log::debug!("Reading {} as {}", input.display(), kind.info().name);

    if kind == FormatKind::Hdf5 {
        return read_container(input, config, image, all);
    }
    if image != 1 {
        return Err(CliError::Usage(format!(
            "{} files hold a single image",
            kind.info().name
        )));
    }

    match kind.read(input, config)? {
        Imported::Series(series) => print_series(&series),
        Imported::Image(image) => print_image(&image),
        Imported::Map(map) => {
            let (nx, ny, nz) = map.map.extents();
            let stats = map.map.statistics();
            println!("Map: {}", map.label);
            println!("Extents: {} x {} x {}", nx, ny, nz);
            println!("Cell: {:?}", map.map.cell);
            println!(
                "Density: min {:.4}, max {:.4}, mean {:.4}, rms {:.4}",
                stats.min, stats.max, stats.mean, stats.rms
            );
        }
    }
    Ok(())
}

#[cfg(feature = "hdf5")]
fn read_container(input: &Path, config: &ImportConfig, first: usize, all: bool) -> Result<()> {
    let mut session = crystio_io::ContainerSession::open(input, config.hdf5.image_defaults())?;
    let label = input
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());

    let mut number = first;
    loop {
        let read = session.read_image(number)?;
        print_image(&ImageImport {
            label: label.clone(),
            image: read.image,
            number: read.number,
            repeat: read.repeat,
        });
        if !(all && read.repeat) {
            break;
        }
        number += 1;
    }
    Ok(())
}

#[cfg(not(feature = "hdf5"))]
fn read_container(_input: &Path, _config: &ImportConfig, _first: usize, _all: bool) -> Result<()> {
    Err(crystio_io::Error::FormatUnavailable(FormatKind::Hdf5.info().name.to_string()).into())
}

fn print_series(import: &SeriesImport) {
    let records = &import.records;
    let series = &records.series;

    println!("Data set: {}", import.label);
    println!("Points: {}", series.len());
    let x_min = series.x.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = series.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    println!("x range: {} - {}", x_min, x_max);
    if let Some(instrument) = records.instrument {
        println!("Instrument: {}", instrument.code());
    }
    if let Some(wavelength) = records.wavelength {
        println!("Wavelength: {}", wavelength);
    }
    println!("Temperature: {}", records.temperature);
    if !records.comments.is_empty() {
        println!("Comments:");
        for comment in &records.comments {
            println!("  {}", comment);
        }
    }
    if !records.line_errors.is_empty() {
        println!("Lines with errors: {}", records.line_errors.len());
    }
    if let Some(line) = records.aborted_at {
        println!("Reading stopped at line {}", line);
    }
}

fn print_image(import: &ImageImport) {
    let ImageBuffer {
        metadata, comments, ..
    } = &import.image;

    println!("Image #{} from {}", import.number, import.label);
    println!("Size: {} x {}", metadata.size.0, metadata.size.1);
    println!(
        "Pixel size: {} x {} um",
        metadata.pixel_size.0, metadata.pixel_size.1
    );
    println!("Wavelength: {}", metadata.wavelength);
    println!("Distance: {} mm", metadata.distance);
    println!(
        "Center: ({:.3}, {:.3}) mm",
        metadata.center.0, metadata.center.1
    );
    println!("Header lines: {}", comments.len());
    if import.repeat {
        println!("More images follow");
    }
}

fn export_map(
    registry: &FormatRegistry,
    input: &Path,
    output: &Path,
    phase: Option<String>,
) -> Result<()> {
    let target = registry.exporter_for(output).ok_or_else(|| {
        CliError::Usage(format!(
            "cannot tell the export format from {}",
            output.display()
        ))
    })?;

    let Imported::Map(import) = FormatKind::Ccp4.read(input, &ImportConfig::default())? else {
        return Err(CliError::Usage(format!(
            "{} is not a map file",
            input.display()
        )));
    };
    let phase = phase.unwrap_or_else(|| {
        input
            .file_stem()
            .map_or_else(|| "map".to_string(), |s| s.to_string_lossy().into_owned())
    });

    let writer = MapFileWriter::new(output);
    match target {
        FormatKind::GridText => writer.write_text(&import.map, &MapTitle::new(phase))?,
        FormatKind::Ccp4 => writer.write_ccp4(&import.map, &phase)?,
        other => {
            return Err(CliError::Usage(format!(
                "{} cannot export maps",
                other.info().name
            )))
        }
    }
    println!("Wrote {}", output.display());
    Ok(())
}
