use clap::{Parser, Subcommand};

use crate::sensor::EnvelopeVariant;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML
    #[arg(long, default_value = "config.toml")]
    pub config: String,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compose every 4-sensor design and tally successes and failures
    Explore {
        /// Worker threads (overrides config)
        #[arg(long)]
        jobs: Option<usize>,

        /// Stop after this many designs (overrides config)
        #[arg(long)]
        limit: Option<usize>,

        /// Enumerate ordered sensor tuples instead of combinations
        #[arg(long, default_value_t = false)]
        ordered: bool,

        /// Envelope variant (overrides config)
        #[arg(long, value_enum)]
        variant: Option<EnvelopeVariant>,

        /// Write successful_design_{i}.json for every success
        #[arg(long, default_value_t = false)]
        save_contracts: bool,

        /// Write design_error_log_{i}.txt for every design
        #[arg(long, default_value_t = false)]
        save_errors: bool,

        /// Per-design CSV report
        #[arg(long, value_name = "FILE")]
        report: Option<String>,

        /// Totals as JSON
        #[arg(long, value_name = "FILE")]
        summary: Option<String>,

        /// Scalability chart (PNG)
        #[arg(long, value_name = "FILE")]
        chart: Option<String>,
    },

    /// Print the lag, linear and saturation contracts of one sensor
    Contracts {
        #[arg(value_name = "SENSOR")]
        sensor: String,

        /// Output variable name
        #[arg(long, default_value = "y")]
        output: String,

        #[arg(long, value_enum)]
        variant: Option<EnvelopeVariant>,

        /// Also write the contracts as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<String>,
    },

    /// Print mean/std summaries of the dose-response datasets
    Summarize {
        /// Absolute values instead of per-replicate normalization
        #[arg(long, default_value_t = false)]
        absolute: bool,

        /// Write one summary CSV per dataset into this directory
        #[arg(long, value_name = "DIR")]
        out_dir: Option<String>,
    },

    /// Write the sensor library with its std column
    Augment {
        #[arg(value_name = "OUT")]
        out: String,
    },

    /// Render envelope, range and contract plots
    Plot {
        /// Sensors to plot (all by default)
        #[arg(value_name = "SENSOR")]
        sensors: Vec<String>,

        #[arg(long, value_enum)]
        variant: Option<EnvelopeVariant>,
    },

    /// Print the JSON schema of the config file
    Schema,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explore_overrides() {
        let args = Args::try_parse_from([
            "sensor-contracts",
            "--config",
            "c.toml",
            "explore",
            "--jobs",
            "4",
            "--ordered",
            "--variant",
            "full",
        ])
        .unwrap();
        assert_eq!(args.config, "c.toml");
        match args.command {
            Command::Explore {
                jobs,
                ordered,
                variant,
                limit,
                ..
            } => {
                assert_eq!(jobs, Some(4));
                assert!(ordered);
                assert_eq!(variant, Some(EnvelopeVariant::Full));
                assert_eq!(limit, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn plot_takes_many_sensors() {
        let args = Args::try_parse_from(["sensor-contracts", "-v", "plot", "IPTG", "aTc"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Plot { sensors, .. } => assert_eq!(sensors, vec!["IPTG", "aTc"]),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
