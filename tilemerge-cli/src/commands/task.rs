//! Build a merge task file from command-line flags.

use std::fs;
use std::path::PathBuf;

use clap::Args;

use tilemerge::coord::{GridOrigin, TileBounds};
use tilemerge::format::{FormatStrategy, TileFormat};
use tilemerge::task::{MergeTask, SourceDescriptor, SourceKind, DEFAULT_BATCH_SIZE};

use crate::error::CliError;

/// Arguments for the `task` command.
#[derive(Debug, Args)]
pub struct TaskArgs {
    /// Target tile directory
    #[arg(long)]
    pub target: String,

    /// Grid origin of the target store
    #[arg(long, default_value = "LL")]
    pub target_origin: GridOrigin,

    /// Source store as ORIGIN:PATH (e.g. UL:/tiles/update), repeatable,
    /// highest priority first
    #[arg(long = "source", required = true)]
    pub sources: Vec<String>,

    /// Tile range as z,minx,maxx,miny,maxy (max side exclusive), repeatable
    #[arg(long = "bounds", required = true)]
    pub bounds: Vec<TileBounds>,

    /// Output tile format
    #[arg(long, default_value = "png")]
    pub format: TileFormat,

    /// Output format policy
    #[arg(long, default_value = "mixed")]
    pub strategy: FormatStrategy,

    /// Upload source tiles without reading the target back
    #[arg(long)]
    pub upload_only: bool,

    /// Maximum tiles per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u64,

    /// Write the task JSON here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Assemble and emit the task file.
pub fn run(args: &TaskArgs) -> Result<(), CliError> {
    let sources = args
        .sources
        .iter()
        .map(|spec| parse_source(spec))
        .collect::<Result<Vec<_>, _>>()?;

    let task = MergeTask {
        target: SourceDescriptor {
            path: args.target.clone(),
            kind: SourceKind::Fs,
            origin: args.target_origin,
        },
        sources,
        bounds: args.bounds.clone(),
        format: args.format,
        strategy: args.strategy,
        upload_only: args.upload_only,
        batch_size: args.batch_size,
    };

    let json = task.to_json()?;
    match &args.output {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

/// Parse `ORIGIN:PATH` into a filesystem source descriptor.
fn parse_source(spec: &str) -> Result<SourceDescriptor, CliError> {
    let (origin, path) = spec.split_once(':').ok_or_else(|| {
        CliError::InvalidArgument(format!("source must be ORIGIN:PATH, got {spec:?}"))
    })?;
    let origin: GridOrigin = origin
        .parse()
        .map_err(CliError::InvalidArgument)?;
    if path.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "source has an empty path: {spec:?}"
        )));
    }
    Ok(SourceDescriptor {
        path: path.to_string(),
        kind: SourceKind::Fs,
        origin,
    })
}
