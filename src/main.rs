//! vapourcast CLI - precipitable water prediction from GNSS observations.
//!
//! Predict from a JSON request (file path, inline JSON or stdin), train a model
//! artifact from a dataset, or run the leave-one-station-out comparison.

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::warn;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vapourcast::spatial::idw::NeighbourLimit;
use vapourcast::training::pipeline::load_dataset;
use vapourcast::validation::loso::nearest_station_interpolation;
use vapourcast::{
    resolve_model_path, train_artifact, BoosterParams, ErrorResponse, LosoHarness, Predictor,
    TrainingConfig,
};

/// Precipitable water estimation from GNSS zenith wet delay.
#[derive(Parser)]
#[command(name = "vapourcast")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Prediction request: a path to a JSON file or an inline JSON string.
    /// Read from stdin when omitted.
    input: Option<String>,

    /// Model artifact. Defaults to $VAPOURCAST_MODEL, then the user data directory.
    #[arg(long, global = true)]
    model: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model artifact from a JSON array of observations.
    Train {
        /// Dataset file.
        #[arg(short, long)]
        dataset: PathBuf,

        /// Where to write the artifact (`.json` for JSON, anything else bincode).
        /// Defaults to the resolved model path.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of boosting stages.
        #[arg(long, default_value = "150")]
        estimators: usize,

        /// Maximum tree depth.
        #[arg(long, default_value = "3")]
        max_depth: usize,

        /// Shrinkage per stage.
        #[arg(long, default_value = "0.08")]
        learning_rate: f64,

        /// Skip the Gaussian-process spatial model.
        #[arg(long)]
        no_spatial: bool,
    },

    /// Leave-one-station-out comparison of physics-only, IDW and residual ML.
    Validate {
        /// Dataset file.
        #[arg(short, long)]
        dataset: PathBuf,

        /// Also interpolate this station from its nearest neighbours.
        #[arg(long)]
        demo_station: Option<String>,

        /// Neighbour count for the interpolation demo.
        #[arg(long, default_value = "5")]
        neighbours: usize,

        /// Ignore neighbours further than this great-circle distance.
        #[arg(long)]
        radius_km: Option<f64>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train {
            dataset,
            output,
            estimators,
            max_depth,
            learning_rate,
            no_spatial,
        }) => {
            let booster = BoosterParams {
                n_estimators: estimators,
                max_depth,
                learning_rate,
                ..BoosterParams::default()
            };
            report(run_train(&dataset, output.or(cli.model), booster, !no_spatial))
        }
        Some(Commands::Validate {
            dataset,
            demo_station,
            neighbours,
            radius_km,
        }) => {
            let limit = NeighbourLimit {
                count: neighbours,
                max_distance_km: radius_km.unwrap_or(f64::INFINITY),
            };
            report(run_validate(&dataset, demo_station.as_deref(), limit))
        }
        None => run_predict(cli.input, cli.model.as_deref()),
    }
}

fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn error_json(error: impl std::fmt::Display) -> String {
    serde_json::to_string(&ErrorResponse::new(&error)).unwrap_or_else(|_| format!("Error: {}", error))
}

/// Input text from a file path, an inline JSON argument, or `stdin`.
/// Blank input is `None`.
fn read_input(input: Option<String>, mut stdin: impl Read) -> anyhow::Result<Option<String>> {
    let text = match input {
        Some(arg) if Path::new(&arg).is_file() => {
            std::fs::read_to_string(&arg).with_context(|| format!("Failed to read input file '{}'", arg))?
        }
        Some(arg) => arg,
        None => {
            let mut buffer = String::new();
            stdin.read_to_string(&mut buffer).context("Failed to read stdin")?;
            buffer
        }
    };
    Ok((!text.trim().is_empty()).then_some(text))
}

/// Answers one request. `Ok` holds the pretty response, `Err` the error payload.
fn respond(text: Option<&str>, predictor: impl FnOnce() -> Predictor) -> Result<String, String> {
    let text = text.ok_or_else(|| error_json("No input data provided"))?;
    let value: Value =
        serde_json::from_str(text).map_err(|e| error_json(format!("Invalid JSON input: {}", e)))?;
    let result = predictor().predict_json(value).map_err(error_json)?;
    serde_json::to_string_pretty(&result).map_err(error_json)
}

fn load_predictor(model: Option<&Path>) -> Predictor {
    match resolve_model_path(model) {
        Ok(path) => Predictor::from_model_path(&path, None),
        Err(e) => {
            warn!("{}", e);
            Predictor::builder().build()
        }
    }
}

fn run_predict(input: Option<String>, model: Option<&Path>) -> ExitCode {
    let text = match read_input(input, std::io::stdin()) {
        Ok(text) => text,
        Err(e) => {
            println!("{}", error_json(format!("{:#}", e)));
            return ExitCode::FAILURE;
        }
    };
    match respond(text.as_deref(), || load_predictor(model)) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(json) => {
            println!("{}", json);
            ExitCode::FAILURE
        }
    }
}

fn run_train(
    dataset: &Path,
    output: Option<PathBuf>,
    booster: BoosterParams,
    fit_spatial_model: bool,
) -> anyhow::Result<()> {
    let output = match output {
        Some(path) => path,
        None => resolve_model_path(None)?,
    };
    let observations = load_dataset(dataset)?;
    let artifact = train_artifact()
        .observations(&observations)
        .config(TrainingConfig {
            booster,
            fit_spatial_model,
            ..TrainingConfig::default()
        })
        .call()?;
    artifact.save(&output)?;
    println!(
        "Trained on {} observations from {} stations, saved to {}",
        observations.len(),
        artifact.station_locations.len(),
        output.display()
    );
    Ok(())
}

fn run_validate(dataset: &Path, demo_station: Option<&str>, limit: NeighbourLimit) -> anyhow::Result<()> {
    let observations = load_dataset(dataset)?;
    let report = LosoHarness::default().run(&observations)?;
    println!("=== FINAL MODEL COMPARISON (LOSO) ===");
    print!("{}", report);

    if let Some(station) = demo_station {
        let demo = nearest_station_interpolation(&observations, station, limit)
            .with_context(|| format!("Station '{}' has no usable neighbours", station))?;
        println!();
        print!("{}", demo);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn no_model() -> Predictor {
        Predictor::builder().build()
    }

    #[test]
    fn test_blank_input_is_none() {
        assert_eq!(read_input(Some(String::new()), std::io::empty()).unwrap(), None);
        assert_eq!(read_input(None, "  \n".as_bytes()).unwrap(), None);
    }

    #[test]
    fn test_input_sources() {
        let inline = r#"{"zwdObservation": 15}"#;
        assert_eq!(
            read_input(Some(inline.to_string()), std::io::empty()).unwrap().as_deref(),
            Some(inline)
        );
        assert_eq!(read_input(None, inline.as_bytes()).unwrap().as_deref(), Some(inline));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"latitude": 1.0, "longitude": 2.0}}"#).unwrap();
        let path = file.path().to_string_lossy().into_owned();
        assert_eq!(
            read_input(Some(path), std::io::empty()).unwrap().as_deref(),
            Some(r#"{"latitude": 1.0, "longitude": 2.0}"#)
        );
    }

    #[test]
    fn test_no_input_error_payload() {
        let err = respond(None, no_model).unwrap_err();
        let value: Value = serde_json::from_str(&err).unwrap();
        assert_eq!(value, json!({"error": "No input data provided"}));
    }

    #[test]
    fn test_invalid_json_and_unsupported_shape() {
        let err = respond(Some("{not json"), no_model).unwrap_err();
        let value: Value = serde_json::from_str(&err).unwrap();
        assert!(value["error"].as_str().unwrap().starts_with("Invalid JSON input"));

        let err = respond(Some(r#"{"foo": 1}"#), no_model).unwrap_err();
        let value: Value = serde_json::from_str(&err).unwrap();
        assert!(value["error"].as_str().unwrap().starts_with("Unsupported input"));
    }

    #[test]
    fn test_prediction_response() {
        let out = respond(Some(r#"{"zwdObservation": 15}"#), no_model).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["predicted_pw"], json!(2.4));
        assert_eq!(value["method"], json!("fallback_conversion"));
    }
}
