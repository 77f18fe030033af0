use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use edgebc::graph::io::{load_edge_list, Delimiter};
use edgebc::{BetweennessConfig, Client, EdgeBetweenness, Graph, GraphKind, LocalCluster, Precision};

#[derive(Parser)]
#[command(name = "edgebc")]
#[command(about = "Distributed edge betweenness centrality", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute edge betweenness and print the result table
    Run {
        #[command(flatten)]
        graph: GraphArgs,

        /// Number of workers (1 runs single-process)
        #[arg(long, default_value_t = 1)]
        workers: usize,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,

        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Time the computation for several worker counts
    Bench {
        #[command(flatten)]
        graph: GraphArgs,

        /// Comma-separated worker counts
        #[arg(long, value_delimiter = ',', default_value = "1,2,4")]
        workers: Vec<usize>,

        /// Runs per worker count
        #[arg(long, default_value_t = 3)]
        repeat: usize,
    },
}

#[derive(Args)]
struct GraphArgs {
    /// Edge list (.mtx or .csv)
    file: PathBuf,

    /// Treat edges as directed
    #[arg(long, default_value_t = false)]
    directed: bool,

    /// Column delimiter of .csv input
    #[arg(long, value_enum, default_value_t = DelimiterArg::Space)]
    delimiter: DelimiterArg,

    /// float32 or float64
    #[arg(long)]
    precision: Option<Precision>,

    /// Use edge weights as path lengths
    #[arg(long, default_value_t = false)]
    weighted: bool,

    /// Skip normalization
    #[arg(long, default_value_t = false)]
    unnormalized: bool,

    /// Sample this many source vertices
    #[arg(short)]
    k: Option<usize>,

    /// Seed for source sampling
    #[arg(long)]
    seed: Option<u64>,

    /// JSON configuration; explicit flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DelimiterArg {
    Space,
    Tab,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl GraphArgs {
    fn config(&self) -> Result<BetweennessConfig> {
        let mut config = match &self.config {
            Some(path) => BetweennessConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => BetweennessConfig::default(),
        };
        if let Some(precision) = self.precision {
            config.precision = precision;
        }
        config.weighted |= self.weighted;
        config.normalized &= !self.unnormalized;
        config.k = self.k.or(config.k);
        config.seed = self.seed.or(config.seed);
        Ok(config)
    }

    fn load(&self) -> Result<Graph> {
        let delimiter = match self.delimiter {
            DelimiterArg::Space => Delimiter::Space,
            DelimiterArg::Tab => Delimiter::Tab,
        };
        let edges = load_edge_list(&self.file, delimiter)
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        if self.directed && edges.symmetric {
            tracing::warn!(file = %self.file.display(), "symmetric matrix loaded as a directed graph");
        }
        let kind = if self.directed { GraphKind::Directed } else { GraphKind::Undirected };
        let graph = edges.into_graph(kind)?;
        tracing::info!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            ?kind,
            "graph loaded"
        );
        Ok(graph)
    }
}

fn client(workers: usize) -> Result<Client> {
    match workers {
        0 => bail!("--workers must be at least 1"),
        1 => Ok(Client::local()),
        n => Ok(Client::with_cluster(LocalCluster::new(n))),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            graph,
            workers,
            format,
            output,
        } => {
            let config = graph.config()?;
            let table = EdgeBetweenness::new(config).run(&client(workers)?, &graph.load()?, None)?;

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
                )),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            match format {
                Format::Csv => table.write_csv(&mut out)?,
                Format::Json => {
                    writeln!(out, "{}", table.to_json()?)?;
                    out.flush()?;
                }
            }
        }
        Commands::Bench { graph, workers, repeat } => {
            if repeat == 0 {
                bail!("--repeat must be at least 1");
            }
            let config = graph.config()?;
            let loaded = graph.load()?;
            let algorithm = EdgeBetweenness::new(config);

            println!("{:>8} {:>12} {:>12} {:>8}", "workers", "mean (ms)", "min (ms)", "rows");
            for &n in &workers {
                let client = client(n)?;
                let mut times = Vec::with_capacity(repeat);
                let mut rows = 0;
                for _ in 0..repeat {
                    let start = Instant::now();
                    rows = algorithm.run(&client, &loaded, None)?.len();
                    times.push(start.elapsed());
                }
                let total: Duration = times.iter().sum();
                let mean = total.as_secs_f64() * 1e3 / times.len() as f64;
                let min = times.iter().min().copied().unwrap_or_default().as_secs_f64() * 1e3;
                tracing::info!(workers = n, mean_ms = mean, min_ms = min, "benchmark finished");
                println!("{n:>8} {mean:>12.3} {min:>12.3} {rows:>8}");
            }
        }
    }

    Ok(())
}
