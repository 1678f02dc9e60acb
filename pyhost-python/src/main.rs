//! pyhost - embedded Python walkthrough
//!
//! Usage:
//!     pyhost demo --count 10
//!     pyhost run script.py
//!     pyhost eval "sum(range(10))"
//!     pyhost call script.py print_list 1 2 3

use clap::{Parser, Subcommand};
use pyhost_python::{CallOutcome, ExecutionConfig, Interpreter, InterpreterConfig};
use std::path::PathBuf;
use tracing::{error, info};

/// Defines the function the walkthrough calls with the marshaled list.
const PRINT_LIST_SCRIPT: &str = r#"
def print_list(values):
    for value in values:
        print(value)
"#;

/// Name the walkthrough looks up to demonstrate the error boundary.
const MISSING_FUNCTION: &str = "function_that_does_not_exist";

#[derive(Parser, Debug)]
#[command(name = "pyhost")]
#[command(about = "Embedded Python interpreter walkthrough")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// JSON interpreter configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory to prepend to sys.path (repeatable)
    #[arg(long = "python-path", global = true)]
    python_paths: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize, redirect, marshal 1..=COUNT, call, catch a failed call, finalize
    Demo {
        /// Length of the integer sequence handed to Python
        #[arg(long, default_value = "10")]
        count: i64,
    },
    /// Execute a Python file with captured output and print the result as JSON
    Run {
        file: PathBuf,

        /// Include top-level variables in the result
        #[arg(long)]
        capture_variables: bool,
    },
    /// Evaluate a Python expression and print the result as JSON
    Eval { expr: String },
    /// Run SCRIPT in __main__, then call FUNCTION with the given integers
    Call {
        script: PathBuf,
        function: String,
        #[arg(allow_negative_numbers = true)]
        values: Vec<i64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: pyhost panicked");
        eprintln!(
            "  Location: {}",
            panic_info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        eprintln!("  Message: {}", panic_message(panic_info.payload()));
    }));

    let args = Args::parse();

    pyhost::tracing::init_with_filter(&args.log_level);

    let config = match &args.config {
        Some(path) => InterpreterConfig::from_file(path)?,
        None => InterpreterConfig::default(),
    }
    .with_python_paths(args.python_paths.clone());

    match args.command {
        Command::Demo { count } => demo(config, count),
        Command::Run {
            file,
            capture_variables,
        } => {
            let interpreter = Interpreter::initialize(config)?;
            let exec_config = ExecutionConfig {
                capture_variables,
                ..Default::default()
            };
            let result = interpreter.execute_file(&file, &exec_config);
            println!("{}", serde_json::to_string_pretty(&result)?);
            interpreter.finalize()?;
            if !result.success {
                return Err(format!("execution of {} failed", file.display()).into());
            }
            Ok(())
        }
        Command::Eval { expr } => {
            let interpreter = Interpreter::initialize(config)?;
            let result = interpreter.evaluate(&expr);
            println!("{}", serde_json::to_string_pretty(&result)?);
            interpreter.finalize()?;
            if !result.success {
                return Err("evaluation failed".into());
            }
            Ok(())
        }
        Command::Call {
            script,
            function,
            values,
        } => {
            let code = std::fs::read_to_string(&script)
                .map_err(|e| format!("failed to read {}: {}", script.display(), e))?;
            let interpreter = Interpreter::initialize(InterpreterConfig {
                redirect_output: true,
                ..config
            })?;
            interpreter.run_script(&code)?;
            let list = interpreter.to_foreign_list(&values)?;
            let outcome = interpreter.call_function_reporting(&function, &list);
            drop(list);
            interpreter.finalize()?;
            if outcome == CallOutcome::Reported {
                return Err(format!("call to {} failed", function).into());
            }
            Ok(())
        }
    }
}

/// Text of a panic payload: `panic!("literal")` carries a `&str`,
/// formatted panics carry a `String`.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<no message>")
}

fn demo(config: InterpreterConfig, count: i64) -> Result<(), Box<dyn std::error::Error>> {
    info!("Initializing interpreter");
    let interpreter = Interpreter::initialize(InterpreterConfig {
        redirect_output: true,
        ..config
    })?;

    interpreter.hello()?;

    interpreter.run_script(PRINT_LIST_SCRIPT)?;
    let values: Vec<i64> = (1..=count).collect();
    let list = interpreter.to_foreign_list(&values)?;
    info!("Calling print_list with {} values", list.len());
    interpreter.call_function("print_list", &list)?;

    info!("Calling {} inside the error boundary", MISSING_FUNCTION);
    match interpreter.call_function_reporting(MISSING_FUNCTION, &list) {
        CallOutcome::Completed => error!("{} unexpectedly succeeded", MISSING_FUNCTION),
        CallOutcome::Reported => info!("Error reported, continuing"),
    }

    drop(list);
    interpreter.finalize()?;
    info!("Interpreter finalized");
    Ok(())
}
