use carousel_rs::{
    BloomConfig, BloomConfigBuilder, CarouselConfigBuilder,
    sim::{
        DatasetKeys, KeySource, RandomKeys, SimSample, SimulationConfigBuilder,
        run_realtime, run_simulation,
    },
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Compare a naive slow sink against one fronted by Carousel
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Buffer size of the sink, also the Carousel target size
    #[arg(short, long, default_value = "5")]
    memory: usize,

    /// Ticks between two entries recorded by the sink
    #[arg(short, long, default_value = "50")]
    interval: u64,

    /// Number of distinct random keys
    #[arg(short, long, default_value = "100")]
    keys: usize,

    /// Events generated per tick
    #[arg(short = 'r', long, default_value = "10")]
    lograte: usize,

    /// Ticks between two output lines
    #[arg(short, long, default_value = "200")]
    output: u64,

    /// Total ticks to simulate
    #[arg(short = 'T', long, default_value = "10000")]
    iterations: u64,

    /// Read keys from a dataset file instead of generating them
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Header lines to skip in the dataset
    #[arg(short = 'S', long, default_value = "0")]
    dataset_skip: usize,

    /// Seed for the random key generator
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Bloom filter size in bits (defaults to a 1% false positive rate at
    /// the target size)
    #[arg(long)]
    filter_bits: Option<usize>,

    /// Run on wall-clock time, one tick per millisecond, with both sinks
    /// drained by background workers
    #[arg(long)]
    realtime: bool,

    /// Print samples as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let filter = match cli.filter_bits {
        Some(bits) => BloomConfigBuilder::default().num_bits(bits).build()?,
        None => BloomConfig::for_capacity(cli.memory.max(1), 0.01)?,
    };
    let carousel = CarouselConfigBuilder::default()
        .target_size(cli.memory)
        .filter(filter)
        .build()?;
    let config = SimulationConfigBuilder::default()
        .memory_size(cli.memory)
        .interval(cli.interval)
        .events_per_tick(cli.lograte)
        .report_every(cli.output)
        .iterations(cli.iterations)
        .carousel(carousel)
        .build()?;

    let mut source: Box<dyn KeySource> = match &cli.dataset {
        Some(path) => Box::new(DatasetKeys::open(path, cli.dataset_skip)?),
        None => Box::new(RandomKeys::new(cli.keys, cli.seed)?),
    };

    let json = cli.json;
    let print_sample = |sample: &SimSample| {
        if json {
            match serde_json::to_string(sample) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("Failed to encode sample: {e}"),
            }
        } else {
            println!(
                "{}:\tNaive: {}\tCarousel: {}\tk: {}",
                sample.iteration,
                sample.naive_keys,
                sample.carousel_keys,
                sample.depth
            );
        }
    };
    let report = if cli.realtime {
        run_realtime(
            &config,
            Duration::from_millis(1),
            source.as_mut(),
            print_sample,
        )?
    } else {
        run_simulation(&config, source.as_mut(), print_sample)?
    };

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "done after {} ticks:\tNaive: {}\tCarousel: {}",
            report.ticks, report.last.naive_keys, report.last.carousel_keys
        );
        println!(
            "forwarded: {}\tduplicates: {}\tout of bucket: {}\toverflows: {}\tunderflows: {}",
            report.carousel.forwarded,
            report.carousel.duplicates,
            report.carousel.out_of_bucket,
            report.carousel.overflows,
            report.carousel.underflows
        );
    }

    Ok(())
}
