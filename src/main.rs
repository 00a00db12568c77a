use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use topofilter::regions::DEFAULT_EXCLUSION_REGIONS_PATH;
use topofilter::{
    AdoptionTable, ExclusionRegions, FilterConfig, PopulationDensityFilter, PopulationIndex,
    Topology, TopologyGraph,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Topology JSON to prune
    #[arg(long, env = "EDGEFILTER_GRAPH", global = true)]
    graph: Option<PathBuf>,

    /// JSON configuration with a `lengthFilter` section
    #[arg(long, env = "EDGEFILTER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// CSV of populated places: lat,lon,population,country
    #[arg(long, env = "EDGEFILTER_POPULATION", global = true)]
    population: Option<PathBuf>,

    /// CSV of internet adoption percentages: country,percentage
    #[arg(long, env = "EDGEFILTER_ADOPTION", global = true)]
    adoption: Option<PathBuf>,

    /// GeoJSON of mountain ranges; without a value the bundled file is used
    #[arg(
        long,
        env = "EDGEFILTER_EXCLUSION_REGIONS",
        global = true,
        num_args = 0..=1,
        default_missing_value = DEFAULT_EXCLUSION_REGIONS_PATH
    )]
    exclusion_regions: Option<PathBuf>,

    /// Where the pruned topology is written
    #[arg(long, env = "EDGEFILTER_OUTPUT", global = true)]
    output: Option<PathBuf>,

    /// Also write the surviving edges as GeoJSON
    #[arg(long, env = "EDGEFILTER_EXPORT_GEOJSON", global = true)]
    export_geojson: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Delete edges through sparsely populated areas
    Density,
    /// Delete edges longer than the adoption-adjusted maximum length
    Length,
}

fn required(path: Option<PathBuf>, flag: &str) -> Result<PathBuf> {
    path.with_context(|| format!("--{} is required", flag))
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let graph_path = required(args.graph, "graph")?;
    let config_path = required(args.config, "config")?;
    let output_path = required(args.output, "output")?;

    let config = FilterConfig::from_path(&config_path)
        .with_context(|| format!("loading configuration {}", config_path.display()))?;
    let mut topology = Topology::from_path(&graph_path)
        .with_context(|| format!("loading topology {}", graph_path.display()))?;

    let adoption_path = required(args.adoption, "adoption")?;
    let adoption = AdoptionTable::from_path(&adoption_path)
        .with_context(|| format!("loading internet adoption {}", adoption_path.display()))?;

    // the length pass never scores population, so the file is optional there
    let population = match (args.cmd, args.population) {
        (_, Some(path)) => PopulationIndex::from_path(&path)
            .with_context(|| format!("loading population {}", path.display()))?,
        (Command::Length, None) => PopulationIndex::new(Vec::new())?,
        (Command::Density, None) => anyhow::bail!("--population is required"),
    };

    let mut filter = PopulationDensityFilter::new(config, &population, &adoption);
    if let Some(path) = args.exclusion_regions {
        let regions = ExclusionRegions::from_path(&path)
            .with_context(|| format!("loading exclusion regions {}", path.display()))?;
        filter = filter.with_exclusion_regions(regions);
    }

    let edges_before = topology.edge_count();
    let report = match args.cmd {
        Command::Density => filter.filter(&mut topology)?,
        Command::Length => filter.filter_by_length(&mut topology)?,
    };
    info!(
        "{} of {} edges remain after {} deletions",
        topology.edge_count(),
        edges_before,
        report.deleted
    );

    topology
        .save(&output_path)
        .with_context(|| format!("writing {}", output_path.display()))?;
    if let Some(path) = args.export_geojson {
        topology
            .export_geojson(&path)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}
