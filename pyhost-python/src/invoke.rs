//! Calling functions defined in `__main__`
//!
//! [`Interpreter::call_function`] surfaces every failure as an [`Error`].
//! [`Interpreter::call_function_reporting`] is the catch-and-print boundary:
//! failures are printed through Python's own error printer (which writes to
//! `sys.stderr`, i.e. the redirect when one is installed) and the call
//! returns normally.

use crate::engine::Interpreter;
use crate::execution::foreign_error;
use crate::marshal::ForeignList;
use pyhost::error::{Error, Result};
use pyo3::exceptions::{PyAttributeError, PyTypeError};
use pyo3::prelude::*;
use pyo3::types::PyList;
use tracing::{debug, warn};

/// How a reporting call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The function ran without raising
    Completed,
    /// A Python error was printed to `sys.stderr`
    Reported,
}

impl CallOutcome {
    pub fn is_completed(self) -> bool {
        self == CallOutcome::Completed
    }
}

/// Which step of a call failed, with the pending Python exception
enum CallFailure {
    Lookup(PyErr),
    NotCallable(PyErr),
    Raised(PyErr),
}

impl CallFailure {
    fn into_error(self, py: Python<'_>, name: &str) -> Error {
        match self {
            CallFailure::Lookup(_) => Error::Lookup(name.to_string()),
            CallFailure::NotCallable(_) => Error::NotCallable(name.to_string()),
            CallFailure::Raised(err) => Error::Foreign(foreign_error(py, &err)),
        }
    }

    fn into_pyerr(self) -> PyErr {
        match self {
            CallFailure::Lookup(err) | CallFailure::NotCallable(err) | CallFailure::Raised(err) => {
                err
            }
        }
    }
}

fn invoke<'py>(
    py: Python<'py>,
    name: &str,
    arg: &Bound<'py, PyList>,
) -> std::result::Result<(), CallFailure> {
    let main = py.import("__main__").map_err(CallFailure::Raised)?;

    let function = main.getattr(name).map_err(|err| {
        if err.is_instance_of::<PyAttributeError>(py) {
            CallFailure::Lookup(err)
        } else {
            CallFailure::Raised(err)
        }
    })?;

    if !function.is_callable() {
        let type_name = function
            .get_type()
            .name()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "object".to_string());
        return Err(CallFailure::NotCallable(PyTypeError::new_err(format!(
            "'{}' object bound to '{}' is not callable",
            type_name, name
        ))));
    }

    function.call1((arg,)).map_err(CallFailure::Raised)?;
    Ok(())
}

impl Interpreter {
    /// Call `__main__.<name>(arg)`, discarding the return value.
    pub fn call_function(&self, name: &str, arg: &ForeignList<'_>) -> Result<()> {
        debug!(function = name, "Calling python function");
        Python::with_gil(|py| invoke(py, name, arg.bind(py)).map_err(|f| f.into_error(py, name)))
    }

    /// Call `__main__.<name>(arg)` and print any Python error instead of returning it.
    ///
    /// The traceback goes through `PyErr_Print`, so it lands wherever
    /// `sys.stderr` points.
    pub fn call_function_reporting(&self, name: &str, arg: &ForeignList<'_>) -> CallOutcome {
        debug!(function = name, "Calling python function inside error boundary");
        Python::with_gil(|py| match invoke(py, name, arg.bind(py)) {
            Ok(()) => CallOutcome::Completed,
            Err(failure) => {
                warn!(function = name, "Python call failed, printing traceback");
                failure.into_pyerr().print(py);
                CallOutcome::Reported
            }
        })
    }
}
