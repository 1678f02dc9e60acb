//! Python code execution - scripts in `__main__`, captured execution, evaluation
//!
//! `run_script` and `hello` run in the interpreter's `__main__` namespace and
//! write through whatever `sys.stdout` currently is (usually the redirect).
//! `execute` and friends run in a fresh namespace and collect output through
//! the same host redirect.

use crate::engine::{prepend_sys_path, ExecutionConfig, ExecutionResult, Interpreter};
use crate::redirect::Stream;
use pyhost::error::{Error, ForeignError, Result};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::collections::HashMap;
use std::ffi::CString;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Variable reprs longer than this many characters are cut
const MAX_VARIABLE_LENGTH: usize = 1000;

const TRUNCATION_SUFFIX: &str = "...";

/// Name whose value `execute` reports as the result
const RESULT_NAME: &str = "_result";

/// Script run by [`Interpreter::hello`]
pub const HELLO_SCRIPT: &str = r#"import sys
print("Hello from Python", sys.version.split()[0])
"#;

impl Interpreter {
    /// Run the fixed greeting script.
    pub fn hello(&self) -> Result<()> {
        self.run_script(HELLO_SCRIPT)
    }

    /// Execute source text in `__main__`.
    ///
    /// Definitions stay in `__main__` and can be called later with
    /// `call_function`. The code runs with the host's full privileges.
    pub fn run_script(&self, code: &str) -> Result<()> {
        let code_cstr = source_cstring(code)?;
        debug!(bytes = code.len(), "Running script in __main__");

        Python::with_gil(|py| {
            let main = py
                .import("__main__")
                .map_err(|e| Error::context("failed to import __main__", e))?;
            let globals = main.dict();
            py.run(code_cstr.as_c_str(), Some(&globals), None)
                .map_err(|e| Error::Foreign(foreign_error(py, &e)))
        })
    }

    /// Execute Python code in a fresh namespace and capture its output.
    ///
    /// Output is collected through the host redirect, so a sink installed
    /// beforehand still sees everything the code prints.
    pub fn execute(&self, code: &str, config: &ExecutionConfig) -> ExecutionResult {
        let start = Instant::now();
        let mut result = self
            .execute_captured(code, config)
            .unwrap_or_else(|e| ExecutionResult::failure(e.to_string(), 0));
        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    fn execute_captured(&self, code: &str, config: &ExecutionConfig) -> Result<ExecutionResult> {
        let source = source_cstring(code)?;

        Python::with_gil(|py| {
            prepend_sys_path(py, &config.python_paths)?;
            let scope = fresh_scope(py)?;

            let (outcome, output) =
                self.with_captured_output(|| py.run(source.as_c_str(), Some(&scope), None))?;

            let mut result = ExecutionResult {
                success: outcome.is_ok(),
                stdout: output.contents(Stream::Stdout),
                stderr: output.contents(Stream::Stderr),
                ..Default::default()
            };
            match outcome {
                Ok(()) => {
                    result.result = scope
                        .get_item(RESULT_NAME)
                        .ok()
                        .flatten()
                        .map(|value| to_json(py, &value));
                    if config.capture_variables {
                        result.variables = snapshot_variables(&scope);
                    }
                }
                Err(e) => result.error = Some(format_python_error(py, &e)),
            }
            Ok(result)
        })
    }

    /// Read a file and [`execute`](Self::execute) it.
    pub fn execute_file(&self, path: impl AsRef<Path>, config: &ExecutionConfig) -> ExecutionResult {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(code) => self.execute(&code, config),
            Err(e) => ExecutionResult::failure(
                format!("Failed to read file {}: {}", path.display(), e),
                0,
            ),
        }
    }

    /// Evaluate an expression; its value comes back as `result`.
    pub fn evaluate(&self, expr: &str) -> ExecutionResult {
        self.execute(
            &format!("{} = ({})", RESULT_NAME, expr),
            &ExecutionConfig::default(),
        )
    }
}

/// Namespace holding only `__builtins__`
fn fresh_scope(py: Python<'_>) -> Result<Bound<'_, PyDict>> {
    let scope = PyDict::new(py);
    let builtins = py
        .import("builtins")
        .map_err(|e| Error::context("failed to import builtins module", e))?;
    scope
        .set_item("__builtins__", builtins)
        .map_err(|e| Error::context("failed to seed execution scope", e))?;
    Ok(scope)
}

fn source_cstring(code: &str) -> Result<CString> {
    CString::new(code).map_err(|e| {
        Error::InvalidInput(format!(
            "source contains a NUL byte at offset {}",
            e.nul_position()
        ))
    })
}

/// Convert a Python exception into host data.
pub(crate) fn foreign_error(py: Python<'_>, err: &PyErr) -> ForeignError {
    let kind = err
        .get_type(py)
        .name()
        .map(|name| name.to_string())
        .unwrap_or_else(|_| "Exception".to_string());
    let message = err
        .value(py)
        .str()
        .map(|s| s.to_string())
        .unwrap_or_default();
    let traceback = err.traceback(py).map(|_| format_python_error(py, err));

    ForeignError {
        kind,
        message,
        traceback,
    }
}

/// `traceback.format_exception` text, or the exception's display form when
/// no traceback is attached.
pub(crate) fn format_python_error(py: Python<'_>, err: &PyErr) -> String {
    let Some(tb) = err.traceback(py) else {
        return err.to_string();
    };

    py.import("traceback")
        .and_then(|module| {
            module.call_method1("format_exception", (err.get_type(py), err.value(py), tb))
        })
        .and_then(|lines| lines.extract::<Vec<String>>())
        .map(|lines| lines.concat())
        .ok()
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| err.to_string())
}

/// JSON form of a Python value. Anything `json.dumps` rejects, or that
/// serde cannot read back (NaN), becomes its repr.
fn to_json(py: Python<'_>, value: &Bound<'_, PyAny>) -> serde_json::Value {
    let dumped = py
        .import("json")
        .and_then(|json| json.call_method1("dumps", (value,)))
        .and_then(|text| text.extract::<String>());

    dumped
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_else(|| serde_json::Value::String(repr_of(value)))
}

fn repr_of(value: &Bound<'_, PyAny>) -> String {
    value
        .repr()
        .map(|r| r.to_string())
        .unwrap_or_else(|_| "<unrepresentable>".to_string())
}

/// Public names left in `scope`, each with its (truncated) repr
fn snapshot_variables(scope: &Bound<'_, PyDict>) -> HashMap<String, String> {
    scope
        .iter()
        .filter_map(|(name, value)| {
            let name: String = name.extract().ok()?;
            if name.starts_with('_') {
                return None;
            }
            Some((name, truncate_value(repr_of(&value))))
        })
        .collect()
}

fn truncate_value(value: String) -> String {
    match value.char_indices().nth(MAX_VARIABLE_LENGTH) {
        Some((cut, _)) => format!("{}{}", &value[..cut], TRUNCATION_SUFFIX),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redirect::{redirect_installed, BufferSink};
    use crate::testing;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_execute_captures_print() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let result = interpreter.execute("print('Hello, World!')", &ExecutionConfig::default());
        assert!(result.success);
        assert_eq!(result.stdout, "Hello, World!\n");
    }

    #[test]
    fn test_stderr_capture() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let result = interpreter.execute(
            "import sys\nprint('warn', file=sys.stderr)",
            &ExecutionConfig::default(),
        );
        assert!(result.success);
        assert_eq!(result.stderr, "warn\n");
        assert_eq!(result.stdout, "");
    }

    #[test]
    fn test_execute_output_reaches_installed_sink() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let sink = BufferSink::new();
        interpreter.install_redirect(sink.clone()).unwrap();

        let result = interpreter.execute("print('from execute')", &ExecutionConfig::default());
        let still_installed = redirect_installed();
        interpreter.remove_redirect().unwrap();

        assert!(result.success);
        assert_eq!(result.stdout, "from execute\n");
        assert_eq!(sink.contents(Stream::Stdout), "from execute\n");
        assert!(still_installed);
    }

    #[test]
    fn test_execute_without_redirect_leaves_none_installed() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let result = interpreter.execute("print('quiet')", &ExecutionConfig::default());
        assert_eq!(result.stdout, "quiet\n");
        assert!(!redirect_installed());
    }

    #[test]
    fn test_evaluate_arithmetic() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let result = interpreter.evaluate("1 + 2");
        assert!(result.success);
        assert_eq!(result.result, Some(serde_json::json!(3)));
    }

    #[test]
    fn test_unserializable_result_falls_back_to_repr() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let result = interpreter.evaluate("object");
        assert!(result.success);
        assert_eq!(
            result.result,
            Some(serde_json::Value::String("<class 'object'>".to_string()))
        );
    }

    #[test]
    fn test_syntax_error() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let result = interpreter.execute("def foo(", &ExecutionConfig::default());
        assert!(!result.success);
        assert!(result.error.unwrap().contains("SyntaxError"));
    }

    #[test]
    fn test_runtime_error_has_traceback() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let result = interpreter.execute(
            "print('before')\nraise ValueError('boom')",
            &ExecutionConfig::default(),
        );
        assert!(!result.success);
        assert_eq!(result.stdout, "before\n");
        let error = result.error.unwrap();
        assert!(error.contains("Traceback"), "{}", error);
        assert!(error.contains("ValueError: boom"), "{}", error);
    }

    #[test]
    fn test_execute_snapshots_public_variables() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let config = ExecutionConfig {
            capture_variables: true,
            ..Default::default()
        };
        let result = interpreter.execute("x = 42\ny = 'hello'\n_hidden = 1", &config);
        assert!(result.success);
        assert_eq!(result.variables.get("x").map(String::as_str), Some("42"));
        assert_eq!(result.variables.get("y").map(String::as_str), Some("'hello'"));
        assert!(!result.variables.contains_key("_hidden"));
    }

    #[test]
    fn test_execute_does_not_touch_main() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let result = interpreter.execute("isolated_value = 1", &ExecutionConfig::default());
        assert!(result.success);
        let err = interpreter.run_script("isolated_value").unwrap_err();
        match err {
            Error::Foreign(foreign) => assert_eq!(foreign.kind, "NameError"),
            other => panic!("expected NameError, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_file() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.py");
        std::fs::write(&path, "_result = sum(range(5))\nprint('done')\n").unwrap();

        let result = interpreter.execute_file(&path, &ExecutionConfig::default());
        assert!(result.success);
        assert_eq!(result.stdout, "done\n");
        assert_eq!(result.result, Some(serde_json::json!(10)));

        let missing = interpreter.execute_file(dir.path().join("nope.py"), &ExecutionConfig::default());
        assert!(!missing.success);
        assert!(missing.error.unwrap().contains("Failed to read file"));
    }

    #[test]
    fn test_run_script_defines_in_main() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        interpreter.run_script("exec_defined = 41").unwrap();
        interpreter.run_script("exec_defined += 1").unwrap();
        Python::with_gil(|py| {
            let main = py.import("__main__").unwrap();
            let value: i64 = main.getattr("exec_defined").unwrap().extract().unwrap();
            assert_eq!(value, 42);
        });
    }

    #[test]
    fn test_run_script_rejects_nul() {
        let interpreter = testing::interpreter();
        let err = interpreter.run_script("x = 1\0").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_foreign_error_fields() {
        let _serial = testing::serial();
        let interpreter = testing::interpreter();
        let err = interpreter
            .run_script("def explode():\n    raise KeyError('k')\nexplode()\n")
            .unwrap_err();
        match err {
            Error::Foreign(foreign) => {
                assert_eq!(foreign.kind, "KeyError");
                assert_eq!(foreign.message, "'k'");
                let traceback = foreign.traceback.unwrap();
                assert!(traceback.contains("explode"), "{}", traceback);
            }
            other => panic!("expected foreign error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncate_value() {
        let long = "x".repeat(MAX_VARIABLE_LENGTH + 5);
        let truncated = truncate_value(long);
        assert_eq!(truncated.len(), MAX_VARIABLE_LENGTH + TRUNCATION_SUFFIX.len());
        assert!(truncated.ends_with(TRUNCATION_SUFFIX));
        assert_eq!(truncate_value("short".to_string()), "short");
    }
}
