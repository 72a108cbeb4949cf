use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sgd_mlp::{Examples, NetworkBuilder, OutputHead, Sampling, TrainConfig, Trainer, io as data_io};

const INPUT_WIDTH: usize = 28 * 28;
const NUM_CLASSES: usize = 10;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Shuffled partition, sequential
    Full,
    /// Indices drawn with replacement, sequential
    Sampled,
    /// Worker pool
    Parallel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SamplingArg {
    WithReplacement,
    ShuffledPartition,
}

impl From<SamplingArg> for Sampling {
    fn from(value: SamplingArg) -> Self {
        match value {
            SamplingArg::WithReplacement => Sampling::WithReplacement,
            SamplingArg::ShuffledPartition => Sampling::ShuffledPartition,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "sgd-mlp")]
#[command(about = "Train a dense classifier on 28x28 grayscale images with minibatch SGD")]
#[command(version)]
struct Cli {
    /// Training images, one comma-separated row of byte pixels per line
    #[arg(long)]
    train_images: PathBuf,

    /// Training labels, one per line
    #[arg(long)]
    train_labels: PathBuf,

    /// Test images
    #[arg(long)]
    test_images: PathBuf,

    /// Test labels
    #[arg(long)]
    test_labels: Option<PathBuf>,

    /// Where to write the predicted test labels
    #[arg(short, long, default_value = "actualTestPredictions")]
    output: PathBuf,

    /// Random seed for initialization and sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Hidden layer widths
    #[arg(long, value_delimiter = ',', default_value = "30")]
    hidden: Vec<usize>,

    #[arg(long, default_value_t = 30)]
    epochs: usize,

    #[arg(long, default_value_t = 60)]
    batch_size: usize,

    /// Learning rate
    #[arg(long, default_value_t = 3.0)]
    eta: f32,

    /// Per-minibatch learning-rate decay factor
    #[arg(long)]
    decay: Option<f32>,

    /// L2 weight-decay coefficient
    #[arg(long)]
    lambda: Option<f32>,

    #[arg(long, value_enum, default_value = "parallel")]
    mode: Mode,

    /// Worker threads (default: hardware concurrency)
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, value_enum, default_value = "with-replacement")]
    sampling: SamplingArg,

    /// Print the trained parameters to stdout
    #[arg(long)]
    report: bool,
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn load_examples(images: &Path, labels: &Path) -> anyhow::Result<Examples> {
    info!(path = %images.display(), "loading images");
    let inputs = data_io::load_images(open(images)?, INPUT_WIDTH)
        .with_context(|| format!("reading {}", images.display()))?;
    info!(path = %labels.display(), "loading labels");
    let labels = data_io::load_labels(open(labels)?)
        .with_context(|| format!("reading {}", labels.display()))?;
    Ok(Examples::new(inputs, labels)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let started = Instant::now();

    let train = load_examples(&cli.train_images, &cli.train_labels)?;
    let test = match &cli.test_labels {
        Some(labels) => Some(load_examples(&cli.test_images, labels)?),
        None => None,
    };
    let test_inputs = match &test {
        Some(test) => test.inputs().to_vec(),
        None => data_io::load_images(open(&cli.test_images)?, INPUT_WIDTH)?,
    };

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut builder = NetworkBuilder::new(INPUT_WIDTH)?;
    for &width in &cli.hidden {
        builder = builder.hidden(width, sgd_mlp::Activation::Sigmoid)?;
    }
    let mut network = builder
        .output(NUM_CLASSES, OutputHead::default())?
        .build_with_rng(&mut rng)?;

    let cfg = TrainConfig {
        epochs: cli.epochs,
        batch_size: cli.batch_size,
        eta: cli.eta,
        decay: cli.decay,
        lambda: cli.lambda,
        workers: cli.workers.unwrap_or_else(sgd_mlp::default_workers),
        sampling: cli.sampling.into(),
    };
    cfg.validate()?;

    info!(mode = ?cli.mode, ?cfg, "training");
    let mut trainer = Trainer::new(&mut network, &train, test.as_ref())?;
    let fit = match cli.mode {
        Mode::Full => trainer.sgd_full(&mut rng, &cfg)?,
        Mode::Sampled => trainer.sgd_sampled(&mut rng, &cfg)?,
        Mode::Parallel => trainer.sgd_parallel(&mut rng, &cfg)?,
    };
    if let Some(last) = fit.last() {
        info!(
            train_accuracy = last.train_accuracy,
            test_accuracy = ?last.test_accuracy,
            "training finished"
        );
    }

    if cli.report {
        network.write_report(&mut io::stdout().lock())?;
    }

    info!(path = %cli.output.display(), "writing test predictions");
    let predicted = network.predict_batch(&test_inputs);
    let out = File::create(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    data_io::save_labels(BufWriter::new(out), &predicted)?;

    info!(elapsed_s = started.elapsed().as_secs_f64(), "done");
    Ok(())
}
