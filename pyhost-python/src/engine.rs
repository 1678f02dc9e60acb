//! Interpreter lifecycle - initialization, state tracking and finalization
//!
//! Provides the process-wide `Interpreter` handle and the execution types
//! shared by the rest of the crate.

use crate::config::InterpreterConfig;
use crate::redirect::{self, ConsoleSink};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use pyhost::error::{Error, Result};
use pyhost::tracing::prefix;
use pyo3::prelude::*;
use pyo3::types::PyList;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

lazy_static! {
    static ref INTERPRETER_STATE: Mutex<InterpreterState> =
        Mutex::new(InterpreterState::Uninitialized);
}

/// Where the process-wide interpreter is in its lifecycle.
///
/// Transitions only move forward: a finalized interpreter cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpreterState {
    Uninitialized,
    Initialized,
    Finalized,
}

/// Result of a captured Python execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Captured stdout output
    pub stdout: String,

    /// Captured stderr output
    pub stderr: String,

    /// Value of `_result` as JSON (if any)
    pub result: Option<serde_json::Value>,

    /// Error message with traceback (if failed)
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub duration_ms: u64,

    /// Variables in the execution scope (for REPL-like usage)
    pub variables: HashMap<String, String>,
}

impl ExecutionResult {
    pub(crate) fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            error: Some(error.into()),
            duration_ms,
            ..Default::default()
        }
    }
}

/// Configuration for a captured Python execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Whether to capture variables after execution
    pub capture_variables: bool,

    /// Additional Python paths to add to sys.path
    pub python_paths: Vec<String>,
}

/// Handle on the embedded Python interpreter.
///
/// At most one handle exists per process. Every operation that touches
/// Python borrows it, so nothing can run before `initialize` or after
/// `finalize`. Dropping a live handle finalizes the interpreter.
#[derive(Debug)]
pub struct Interpreter {
    config: InterpreterConfig,
    live: bool,
}

impl Interpreter {
    /// Start the embedded interpreter.
    ///
    /// Fails with `AlreadyInitialized` while another handle is live and with
    /// `Finalized` once the process has shut its interpreter down.
    pub fn initialize(config: InterpreterConfig) -> Result<Self> {
        {
            let mut state = INTERPRETER_STATE.lock();
            match *state {
                InterpreterState::Initialized => return Err(Error::AlreadyInitialized),
                InterpreterState::Finalized => return Err(Error::Finalized),
                InterpreterState::Uninitialized => {}
            }

            info!("{} Initializing embedded Python interpreter", prefix::OPEN);
            pyo3::prepare_freethreaded_python();

            Python::with_gil(|py| prepend_sys_path(py, &config.python_paths))?;
            *state = InterpreterState::Initialized;
        }

        let interpreter = Self { config, live: true };

        if interpreter.config.redirect_output {
            interpreter.install_redirect(ConsoleSink)?;
        }

        info!("  Python {}", interpreter.python_version());
        Ok(interpreter)
    }

    /// Shut the interpreter down.
    ///
    /// Removes any installed redirect first so buffered Python output is
    /// flushed to the original streams.
    pub fn finalize(mut self) -> Result<()> {
        self.shutdown()
    }

    /// Current lifecycle state of the process-wide interpreter
    pub fn state() -> InterpreterState {
        *INTERPRETER_STATE.lock()
    }

    /// Configuration this interpreter was started with
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Check if a Python module is available
    pub fn check_module(&self, module_name: &str) -> bool {
        Python::with_gil(|py| py.import(module_name).is_ok())
    }

    /// Get Python version info
    pub fn python_version(&self) -> String {
        Python::with_gil(|py| {
            let sys = py.import("sys").ok();
            sys.and_then(|s| s.getattr("version").ok())
                .and_then(|v| v.extract().ok())
                .unwrap_or_else(|| "unknown".to_string())
        })
    }

    fn shutdown(&mut self) -> Result<()> {
        if !self.live {
            return Ok(());
        }
        self.live = false;

        if let Err(e) = self.remove_redirect() {
            warn!("Failed to restore python output streams: {}", e);
        }

        let mut state = INTERPRETER_STATE.lock();
        info!("{} Finalizing embedded Python interpreter", prefix::CLOSE);

        // Py_FinalizeEx must run with the GIL held; the thread state is torn
        // down with the interpreter so it is never released.
        let status = unsafe {
            pyo3::ffi::PyGILState_Ensure();
            pyo3::ffi::Py_FinalizeEx()
        };
        *state = InterpreterState::Finalized;
        redirect::clear_sink();

        if status != 0 {
            return Err(Error::Finalize(status));
        }
        Ok(())
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Error finalizing python interpreter: {}", e);
        }
    }
}

/// Insert paths at the front of `sys.path`, skipping ones already present.
pub(crate) fn prepend_sys_path(py: Python<'_>, python_paths: &[String]) -> Result<()> {
    if python_paths.is_empty() {
        return Ok(());
    }

    let sys = py
        .import("sys")
        .map_err(|e| Error::context("failed to import sys module", e))?;

    let path: Bound<'_, PyList> = sys
        .getattr("path")
        .map_err(|e| Error::context("failed to get sys.path", e))?
        .extract()
        .map_err(|e| Error::context("failed to extract sys.path as list", e))?;

    for p in python_paths {
        let present = path
            .contains(p)
            .map_err(|e| Error::context("failed to search sys.path", e))?;
        if present {
            continue;
        }
        path.insert(0, p)
            .map_err(|e| Error::context(format!("failed to add path '{}' to sys.path", p), e))?;
        debug!(path = %p, "Added to sys.path");
    }

    Ok(())
}
