//! smosvm command line interface
//!
//! Train, apply and inspect SVM models stored as JSON, with data in the
//! LibSVM text format.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use smosvm::api::{EvaluationMetrics, RegressionMetrics, SVM};
use smosvm::core::{Formulation, KernelType, Result, SVMError, SvmParams};
use smosvm::persistence::{save_model, SerializableModel};
use smosvm::{Dataset, LibSVMDataset, SvmModel};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "smosvm")]
#[command(about = "SVM training and prediction with an SMO solver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
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
    /// Train a new SVM model
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (LibSVM format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file (not needed with --cross-validation)
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "c-svc")]
    svm_type: CliSvmType,

    #[arg(long, value_enum, default_value = "rbf")]
    kernel: CliKernel,

    /// Regularization parameter C
    #[arg(long = "c", default_value = "1.0")]
    c: f64,

    /// nu for nu-SVC, one-class and nu-SVR
    #[arg(long, default_value = "0.5")]
    nu: f64,

    /// Width of the epsilon-insensitive tube for epsilon-SVR
    #[arg(long = "p", default_value = "0.1")]
    p: f64,

    /// Polynomial degree
    #[arg(long, default_value = "3")]
    degree: u32,

    /// Kernel gamma; 0 means 1 / (largest feature index)
    #[arg(long, default_value = "0")]
    gamma: f64,

    #[arg(long, default_value = "0")]
    coef0: f64,

    /// Stopping tolerance
    #[arg(long, default_value = "0.001")]
    epsilon: f64,

    /// Kernel cache size in MB
    #[arg(long, default_value = "100")]
    cache_size: f64,

    /// Maximum solver iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Class weight as LABEL:WEIGHT, multiplies C for that class
    #[arg(long = "weight", value_parser = parse_weight, allow_hyphen_values = true)]
    weights: Vec<(i32, f64)>,

    /// Fit probability estimates
    #[arg(long)]
    probability: bool,

    /// Disable the shrinking heuristic
    #[arg(long)]
    no_shrinking: bool,

    /// Seed for fold shuffling
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Run N-fold cross-validation instead of saving a model
    #[arg(long)]
    cross_validation: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliSvmType {
    #[value(name = "c-svc")]
    CSvc,
    #[value(name = "nu-svc")]
    NuSvc,
    #[value(name = "one-class")]
    OneClass,
    #[value(name = "epsilon-svr")]
    EpsilonSvr,
    #[value(name = "nu-svr")]
    NuSvr,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernel {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
    Precomputed,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (prints to stdout if not specified)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output class probabilities
    #[arg(long)]
    probability: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn parse_weight(s: &str) -> std::result::Result<(i32, f64), String> {
    let (label, weight) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LABEL:WEIGHT, got '{}'", s))?;
    let label = label
        .trim()
        .parse::<i32>()
        .map_err(|_| format!("invalid class label '{}'", label))?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid weight '{}'", weight))?;
    Ok((label, weight))
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

impl TrainArgs {
    fn params(&self) -> SvmParams {
        let formulation = match self.svm_type {
            CliSvmType::CSvc => Formulation::CSvc { c: self.c },
            CliSvmType::NuSvc => Formulation::NuSvc { nu: self.nu },
            CliSvmType::OneClass => Formulation::OneClass { nu: self.nu },
            CliSvmType::EpsilonSvr => Formulation::EpsilonSvr {
                c: self.c,
                p: self.p,
            },
            CliSvmType::NuSvr => Formulation::NuSvr {
                c: self.c,
                nu: self.nu,
            },
        };
        let kernel = match self.kernel {
            CliKernel::Linear => KernelType::Linear,
            CliKernel::Polynomial => KernelType::Polynomial {
                degree: self.degree,
                gamma: self.gamma,
                coef0: self.coef0,
            },
            CliKernel::Rbf => KernelType::Rbf { gamma: self.gamma },
            CliKernel::Sigmoid => KernelType::Sigmoid {
                gamma: self.gamma,
                coef0: self.coef0,
            },
            CliKernel::Precomputed => KernelType::Precomputed,
        };

        SvmParams {
            formulation,
            kernel,
            eps: self.epsilon,
            cache_size: self.cache_size,
            shrinking: !self.no_shrinking,
            probability: self.probability,
            class_weights: self.weights.clone(),
            max_iterations: self.max_iterations,
            seed: self.seed,
        }
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training SVM model...");
    info!("Data file: {:?}", args.data);

    let dataset = LibSVMDataset::from_file(&args.data)?;
    info!(
        "Loaded {} samples, largest feature index {}",
        dataset.len(),
        dataset.dim()
    );
    let problem = dataset.to_problem()?;

    let params = args.params();
    info!(
        "Parameters: {} with {} kernel, eps={}",
        params.formulation.name(),
        params.kernel.name(),
        params.eps
    );
    let svm = SVM::from_params(params);

    if let Some(nr_fold) = args.cross_validation {
        let predicted = svm.cross_validate(&problem, nr_fold)?;
        if svm.params().formulation.is_regression() {
            let metrics = RegressionMetrics::from_predictions(&predicted, problem.labels());
            println!(
                "Cross Validation Mean squared error = {}",
                metrics.mean_squared_error
            );
            println!(
                "Cross Validation Squared correlation coefficient = {}",
                metrics.squared_correlation
            );
        } else {
            let metrics = EvaluationMetrics::from_predictions(&predicted, problem.labels());
            println!(
                "Cross Validation Accuracy = {:.4}%",
                metrics.accuracy() * 100.0
            );
        }
        return Ok(());
    }

    let output = args.output.as_ref().ok_or_else(|| {
        SVMError::InvalidParameter(
            "--output is required unless --cross-validation is given".to_string(),
        )
    })?;

    let model = svm.train(&problem)?;
    info!("Training completed successfully");
    info!("Support vectors: {}", model.total_sv());

    save_model(&model, problem.len(), dataset.dim(), output)?;
    info!("Model saved to: {:?}", output);

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = SerializableModel::load_from_file(&args.model)?.into_model()?;

    if args.probability && !model.has_probability_model() {
        return Err(SVMError::ProbabilityUnavailable(
            "model does not support probability estimates".to_string(),
        ));
    }

    info!("Loading prediction data from: {:?}", args.data);
    let dataset = LibSVMDataset::from_file(&args.data)?;

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let predicted = write_predictions(&model, &dataset, args.probability, &mut writer)?;
    writer.flush()?;
    drop(writer);

    if let Some(path) = &args.output {
        info!("Predictions saved to: {path:?}");
    }

    let labels = dataset.get_labels();
    if model.svm_type().is_regression() {
        let metrics = RegressionMetrics::from_predictions(&predicted, &labels);
        println!(
            "Mean squared error = {} (regression)",
            metrics.mean_squared_error
        );
        println!(
            "Squared correlation coefficient = {} (regression)",
            metrics.squared_correlation
        );
    } else {
        let metrics = EvaluationMetrics::from_predictions(&predicted, &labels);
        println!(
            "Accuracy = {:.4}% ({}/{}) (classification)",
            metrics.accuracy() * 100.0,
            metrics.correct,
            metrics.total
        );
    }

    Ok(())
}

/// One line per sample; with probabilities, a `labels` header first.
fn write_predictions<W: Write>(
    model: &SvmModel,
    dataset: &LibSVMDataset,
    probability: bool,
    writer: &mut W,
) -> Result<Vec<f64>> {
    let with_classes = probability && model.svm_type().is_classification();
    if with_classes {
        let labels: Vec<String> = model.labels().iter().map(|l| l.to_string()).collect();
        writeln!(writer, "labels {}", labels.join(" "))?;
    }

    let mut predicted = Vec::with_capacity(dataset.len());
    for sample in dataset.samples() {
        let value = if with_classes {
            let (label, probs) = model.predict_probability(&sample.features)?;
            let probs: Vec<String> = probs.iter().map(|p| format!("{:.6}", p)).collect();
            writeln!(writer, "{} {}", label, probs.join(" "))?;
            label
        } else {
            let value = model.predict(&sample.features);
            writeln!(writer, "{}", value)?;
            value
        };
        predicted.push(value);
    }
    Ok(predicted)
}

fn info_command(args: InfoArgs) -> Result<()> {
    let serializable = SerializableModel::load_from_file(&args.model)?;
    serializable.to_model()?;
    serializable.print_summary();
    Ok(())
}
