//! Host sequences as Python lists
//!
//! A [`ForeignList`] owns one strong reference to a Python `list`. The
//! object itself lives in the interpreter's heap; dropping the handle only
//! gives up the host's reference.

use crate::engine::Interpreter;
use crate::execution::foreign_error;
use pyhost::error::{Error, Result};
use pyo3::prelude::*;
use pyo3::types::PyList;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Opaque handle to a Python list, valid while its interpreter is borrowed.
pub struct ForeignList<'i> {
    list: Py<PyList>,
    _interpreter: PhantomData<&'i Interpreter>,
}

impl<'i> ForeignList<'i> {
    /// Build a new Python list holding `values` in order.
    ///
    /// The list starts empty and each value is appended in turn.
    pub fn from_ints(_interpreter: &'i Interpreter, values: &[i64]) -> Result<Self> {
        let list = Python::with_gil(|py| {
            let list = PyList::empty(py);
            for value in values {
                list.append(*value)
                    .map_err(|e| Error::context("failed to append to python list", e))?;
            }
            Ok::<_, Error>(list.unbind())
        })?;

        debug!(len = values.len(), "Marshaled integer sequence into python list");
        Ok(Self {
            list,
            _interpreter: PhantomData,
        })
    }

    /// Read the list back as host integers.
    ///
    /// Fails with a `Foreign` error if Python code has put a non-integer
    /// into the list since it was created.
    pub fn to_vec(&self) -> Result<Vec<i64>> {
        Python::with_gil(|py| {
            self.bind(py)
                .extract::<Vec<i64>>()
                .map_err(|e| Error::Foreign(foreign_error(py, &e)))
        })
    }

    pub fn len(&self) -> usize {
        Python::with_gil(|py| self.bind(py).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish the list in `__main__` under `name`, sharing the same object.
    pub fn bind_global(&self, name: &str) -> Result<()> {
        Python::with_gil(|py| {
            let main = py
                .import("__main__")
                .map_err(|e| Error::context("failed to import __main__", e))?;
            main.dict()
                .set_item(name, self.bind(py))
                .map_err(|e| Error::context(format!("failed to set global '{}'", name), e))
        })
    }

    pub(crate) fn bind<'py>(&self, py: Python<'py>) -> &Bound<'py, PyList> {
        self.list.bind(py)
    }
}

impl fmt::Debug for ForeignList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignList").finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Convert a host integer sequence into a Python list.
    pub fn to_foreign_list(&self, values: &[i64]) -> Result<ForeignList<'_>> {
        ForeignList::from_ints(self, values)
    }
}
