//! Command-line interface.
//!
//! With no subcommand the binary serves the HTTP API.

mod config;

pub use config::{ConfigCommand, run_config_command};

use clap::{Args, Parser, Subcommand};

use crate::estimation::{DurationEstimator, EstimationInput, VehicleYear};
use crate::validation::Validator;

#[derive(Parser, Debug)]
#[command(name = "tms-estimator")]
#[command(version)]
#[command(about = "Job duration estimation for service-shop bookings", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API (default)
    Serve,

    /// Estimate a single job and print the hours
    Estimate(EstimateArgs),

    /// Inspect or reset the runtime override
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    /// Service category (e.g. "repair", "maintenance")
    #[arg(short, long)]
    pub service_type: String,

    #[arg(long, default_value = "")]
    pub make: String,

    #[arg(long, default_value = "")]
    pub model: String,

    /// Model year; free text is accepted
    #[arg(long)]
    pub year: Option<String>,

    /// What the customer asked for
    #[arg(value_name = "DESCRIPTION")]
    pub description: String,

    /// Skip the language model and use only the keyword rules
    #[arg(long)]
    pub heuristic_only: bool,
}

impl EstimateArgs {
    fn to_input(&self) -> EstimationInput {
        EstimationInput {
            service_type: self.service_type.clone(),
            vehicle_make: self.make.clone(),
            vehicle_model: self.model.clone(),
            vehicle_year: self.year.clone().map(VehicleYear::Text),
            description: self.description.clone(),
        }
    }
}

/// Estimate one job and print `<hours>` followed by the stage that produced it.
pub async fn run_estimate_command(args: EstimateArgs, estimator: &DurationEstimator) -> anyhow::Result<()> {
    let validator = Validator::new();
    let validation = validator
        .validate("service-type", Some(&args.service_type))
        .merge(validator.validate("description", Some(&args.description)));
    if !validation.is_valid {
        let reasons: Vec<String> = validation
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        anyhow::bail!("Invalid input: {}", reasons.join("; "));
    }

    let input = args.to_input();
    if args.heuristic_only {
        let hours = estimator.heuristic_estimate(&input).await;
        println!("{} hours (heuristic)", hours);
    } else {
        let estimate = estimator.estimate(&input).await;
        println!("{} hours ({})", estimate.hours, estimate.source);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["tms-estimator"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_estimate() {
        let cli = Cli::try_parse_from([
            "tms-estimator",
            "estimate",
            "--service-type",
            "repair",
            "--make",
            "Vespa",
            "--year",
            "2003",
            "brake pads",
        ])
        .unwrap();

        let Some(Command::Estimate(args)) = cli.command else {
            panic!("expected estimate command");
        };
        let input = args.to_input();
        assert_eq!(input.service_type, "repair");
        assert_eq!(input.vehicle_make, "Vespa");
        assert_eq!(input.vehicle_model, "");
        assert_eq!(input.year(), Some(2003));
        assert_eq!(input.description, "brake pads");
        assert!(!args.heuristic_only);
    }

    #[test]
    fn test_estimate_requires_service_type() {
        assert!(Cli::try_parse_from(["tms-estimator", "estimate", "brake pads"]).is_err());
    }

    #[test]
    fn test_parse_config_subcommands() {
        let cli = Cli::try_parse_from(["tms-estimator", "config", "reset"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Reset))));
    }
}
