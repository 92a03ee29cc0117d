use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jsonql::{ErrorSet, JsonQl, Node};
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "jsonql")]
#[command(about = "Select values from and test predicates over JSON documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the value a value expression selects
    Eval {
        expr: String,
        /// Document to read instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Test a predicate; exit status 1 when it does not hold
    Test {
        predicate: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Check expression syntax without evaluating
    Check {
        expr: String,
        /// Parse as a predicate instead of a value expression
        #[arg(long)]
        predicate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();
    let jq = JsonQl::global();

    match cli.command {
        Command::Eval { expr, file } => {
            let document = read_document(file.as_deref())?;
            let mut context = jq.context_of(&document);
            let node = jq.evaluate(&expr, &mut context).await?;
            report(&context.take_errors());
            match node {
                Node::Present(value) => {
                    println!("{}", serde_json::to_string_pretty(value)?);
                    Ok(ExitCode::SUCCESS)
                }
                Node::Missing => {
                    println!("<missing>");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Test { predicate, file } => {
            let document = read_document(file.as_deref())?;
            let mut context = jq.context_of(&document);
            let holds = jq.satisfies(&predicate, &mut context).await?;
            report(&context.take_errors());
            println!("{}", holds);
            Ok(if holds {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Check { expr, predicate } => {
            if predicate {
                jq.check_predicate(&expr).await?;
            } else {
                jq.check_value(&expr).await?;
            }
            println!("ok");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_document(file: Option<&Path>) -> Result<Value> {
    let text = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read document from stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("Document is not valid JSON")
}

fn report(errors: &ErrorSet) {
    for error in errors {
        eprintln!("warning: {}", error);
    }
}
