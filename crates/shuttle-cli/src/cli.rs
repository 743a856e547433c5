//! Command line interface (clap derive).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shuttle_core::ParamValue;

/// Shuttle - workflow engine demo runner.
#[derive(Debug, Parser)]
#[command(name = "shuttle", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and validate a configuration file.
    Validate {
        #[arg(long, short)]
        config: PathBuf,
    },

    /// Run one job on an in-memory engine with the demo workers.
    Run {
        #[arg(long, short)]
        config: PathBuf,

        /// Workflow name to submit.
        #[arg(long, short)]
        workflow: String,

        /// Job parameter as `name=value` (repeatable).
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,

        /// Delay the job start by this many seconds.
        #[arg(long)]
        start_after_secs: Option<i64>,

        /// Fail the job unless it has started within this many seconds.
        #[arg(long)]
        deadline_secs: Option<i64>,
    },
}

/// `count=4` -> Int, `ratio=0.5` -> Float, `dry=true` -> Bool, otherwise Str.
pub fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = if let Ok(n) = value.parse::<i64>() {
        ParamValue::Int(n)
    } else if let Ok(f) = value.parse::<f64>() {
        ParamValue::Float(f)
    } else if let Ok(b) = value.parse::<bool>() {
        ParamValue::Bool(b)
    } else {
        ParamValue::Str(value.to_string())
    };
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from([
            "shuttle", "run", "--config", "shuttle.toml", "--workflow", "squares", "-p", "count=4",
            "-p", "label=demo",
        ]);
        match cli.command {
            Command::Run {
                workflow, params, ..
            } => {
                assert_eq!(workflow, "squares");
                assert_eq!(
                    params,
                    vec![
                        ("count".to_string(), ParamValue::Int(4)),
                        ("label".to_string(), ParamValue::Str("demo".into())),
                    ]
                );
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn param_without_equals_is_rejected() {
        assert!(parse_param("count").is_err());
        assert!(parse_param("=4").is_err());
        assert_eq!(parse_param("on=true").unwrap().1, ParamValue::Bool(true));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
