//! svmperf Command Line Interface
//!
//! Train linear models with the SVM-perf executables and score SVM-light
//! samples against them in process.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use svmperf::api::{SvmPerf, TrainedModel};
use svmperf::core::{Contribution, Prediction, Result, SvmPerfError};
use svmperf::learner::SvmPerfCommand;
use svmperf::SampleSet;

#[derive(Parser)]
#[command(name = "svmperf")]
#[command(about = "Train SVM-perf linear models and score samples in process")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "svmperf contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model with svm_perf_learn
    Learn(LearnArgs),
    /// Score samples in process
    Classify(ClassifyArgs),
    /// Display model information
    Info(InfoArgs),
    /// Compare in-process scores with svm_perf_classify
    Verify(VerifyArgs),
}

#[derive(Args)]
struct LearnArgs {
    /// Training data file (SVM-light format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    /// Arguments passed to the learner, e.g. "-c 0.01 -v 0"
    #[arg(short, long, default_value = "", allow_hyphen_values = true)]
    args: String,

    /// Learner executable
    #[arg(long, default_value = "svm_perf_learn")]
    learn_command: String,

    /// Seconds to wait for the learner before killing it
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Keep the learner's work files at <PREFIX>.learn, <PREFIX>.model, ...
    #[arg(long)]
    keep_files: Option<PathBuf>,
}

#[derive(Args)]
struct ClassifyArgs {
    /// Model file written by svm_perf_learn
    #[arg(short, long)]
    model: PathBuf,

    /// Samples to score (SVM-light format)
    #[arg(long)]
    data: PathBuf,

    /// Output file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append the predicted label to each score
    #[arg(long)]
    labels: bool,

    /// Write predictions as JSON
    #[arg(long)]
    json: bool,

    /// Include the N most relevant features of each sample
    #[arg(long, value_name = "N")]
    explain: Option<usize>,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,

    /// Number of largest weights to show
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Args)]
struct VerifyArgs {
    /// Model file written by svm_perf_learn
    #[arg(short, long)]
    model: PathBuf,

    /// Samples to score (SVM-light format)
    #[arg(long)]
    data: PathBuf,

    /// Arguments passed to the classifier
    #[arg(short, long, default_value = "-v 0", allow_hyphen_values = true)]
    args: String,

    /// Classifier executable
    #[arg(long, default_value = "svm_perf_classify")]
    classify_command: String,

    /// Seconds to wait for each classifier run
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Accepted relative difference between the two scores
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,
}

/// One line of `classify --json` output
#[derive(Serialize)]
struct ScoredSample {
    index: usize,
    #[serde(flatten)]
    prediction: Prediction,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<Vec<Contribution>>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Learn(args) => learn_command(args),
        Commands::Classify(args) => classify_command(args),
        Commands::Info(args) => info_command(args),
        Commands::Verify(args) => verify_command(args).map(|mismatches| {
            if mismatches > 0 {
                error!("{mismatches} scores disagree with the reference classifier");
                process::exit(1);
            }
        }),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn learn_command(args: LearnArgs) -> Result<()> {
    info!("Loading training data from: {:?}", args.data);
    let samples = SampleSet::from_file(&args.data)?;
    info!(
        "Loaded {} samples, highest feature index {}",
        samples.len(),
        samples.max_feature()
    );

    let mut learner = SvmPerfCommand::new()
        .with_learn_command(args.learn_command.as_str())
        .with_timeout(Duration::from_secs(args.timeout));
    if let Some(prefix) = &args.keep_files {
        learner = learner.with_file_prefix(prefix);
    }

    info!("Running {} {}", args.learn_command, args.args);
    let svm = SvmPerf::with_learner(learner).with_learn_args(args.args.as_str());
    let model = svm.train(samples.samples())?;

    let model_info = model.info();
    info!("Threshold: {:.8}", model_info.threshold);
    info!("Feature weights: {}", model_info.n_features);

    fs::write(&args.output, model.model_text())?;
    info!("Model saved to: {:?}", args.output);

    let accuracy = model.evaluate(samples.samples())?;
    info!("Training accuracy: {:.2}%", accuracy * 100.0);

    Ok(())
}

fn classify_command(args: ClassifyArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = TrainedModel::from_file(&args.model)?;

    info!("Loading samples from: {:?}", args.data);
    let samples = SampleSet::from_file(&args.data)?;

    let mut scored = Vec::with_capacity(samples.len());
    for (index, sample) in samples.samples().iter().enumerate() {
        let prediction = model.predict(&sample.features)?;
        let explanation = match args.explain {
            Some(limit) => Some(model.explain(&sample.features, limit)?),
            None => None,
        };
        scored.push(ScoredSample {
            index,
            prediction,
            explanation,
        });
    }

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&scored)
            .map_err(|e| SvmPerfError::SerializationError(e.to_string()))?;
        writeln!(writer, "{json}")?;
    } else {
        for sample in &scored {
            write!(writer, "{}", sample.prediction.decision_value)?;
            if args.labels {
                write!(writer, " {}", sample.prediction.label)?;
            }
            if let Some(explanation) = &sample.explanation {
                for c in explanation {
                    write!(writer, " {}:{:+.4}", c.feature, c.relevance)?;
                }
            }
            writeln!(writer)?;
        }
    }
    writer.flush()?;

    if let Some(path) = &args.output {
        info!("Scores saved to: {path:?}");
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = TrainedModel::from_file(&args.model)?;
    let model_info = model.info();

    println!("=== SVM-perf Model Summary ===");
    println!("Threshold b:      {}", model_info.threshold);
    println!("Feature weights:  {}", model_info.n_features);
    println!("Highest feature:  {}", model_info.max_feature);

    let mut weights = model.weights().sorted_features();
    weights.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

    let n_show = weights.len().min(args.top);
    if n_show > 0 {
        println!("\nLargest weights:");
        for &(feature, weight) in weights.iter().take(n_show) {
            println!("  {feature:>8}: {weight:+.8}");
        }
        if weights.len() > n_show {
            println!("  ... ({} more)", weights.len() - n_show);
        }
    }

    Ok(())
}

fn verify_command(args: VerifyArgs) -> Result<usize> {
    info!("Loading model from: {:?}", args.model);
    let model = TrainedModel::from_file(&args.model)?;
    let samples = SampleSet::from_file(&args.data)?;

    let learner = SvmPerfCommand::new()
        .with_classify_command(args.classify_command.as_str())
        .with_timeout(Duration::from_secs(args.timeout));
    let svm = SvmPerf::with_learner(learner).with_classify_args(args.args.as_str());

    let mut mismatches = 0;
    println!("# index in_process reference difference");
    for (index, sample) in samples.samples().iter().enumerate() {
        let check = svm.cross_check(&model, &sample.features)?;
        let agrees = check.agrees(args.tolerance);
        if !agrees {
            warn!(
                "Sample {index}: in-process score {} differs from reference {}",
                check.in_process, check.reference
            );
            mismatches += 1;
        }
        println!(
            "{index} {} {} {:e}{}",
            check.in_process,
            check.reference,
            check.difference(),
            if agrees { "" } else { " MISMATCH" }
        );
    }

    info!(
        "{} of {} samples agree",
        samples.len() - mismatches,
        samples.len()
    );
    Ok(mismatches)
}
