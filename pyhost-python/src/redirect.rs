//! Route the interpreter's `sys.stdout`/`sys.stderr` into the host.
//!
//! Installing a redirect registers a `pyhost_io` module in `sys.modules`
//! holding a `write(stream, text)` function and a `HostWriter` class, then
//! points `sys.stdout` and `sys.stderr` at `HostWriter` instances. Every
//! `write` call on those objects is delivered as one chunk to the installed
//! [`OutputSink`].

use crate::engine::Interpreter;
use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};
use pyhost::error::{Error, Result};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the module the redirect registers in `sys.modules`
pub const HOST_IO_MODULE: &str = "pyhost_io";

lazy_static! {
    static ref SINK: RwLock<Option<Arc<dyn OutputSink>>> = RwLock::new(None);
    static ref SAVED_STREAMS: Mutex<Option<SavedStreams>> = Mutex::new(None);
}

/// Streams as they were before the first install
struct SavedStreams {
    stdout: PyObject,
    stderr: PyObject,
}

/// Which Python stream a chunk was written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "stdout" => Some(Stream::Stdout),
            "stderr" => Some(Stream::Stderr),
            _ => None,
        }
    }
}

/// Host-side receiver for text the interpreter writes.
pub trait OutputSink: Send + Sync {
    fn write(&self, stream: Stream, text: &str);
}

impl<F> OutputSink for F
where
    F: Fn(Stream, &str) + Send + Sync,
{
    fn write(&self, stream: Stream, text: &str) {
        self(stream, text)
    }
}

/// Writes to the host process's own stdout/stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn write(&self, stream: Stream, text: &str) {
        // Host console failures have nowhere better to go.
        let _ = match stream {
            Stream::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(text.as_bytes()).and_then(|_| out.flush())
            }
            Stream::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(text.as_bytes()).and_then(|_| err.flush())
            }
        };
    }
}

/// Collects chunks in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    chunks: Arc<Mutex<Vec<(Stream, String)>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every chunk received so far, in arrival order
    pub fn chunks(&self) -> Vec<(Stream, String)> {
        self.chunks.lock().clone()
    }

    /// Concatenated text written to one stream
    pub fn contents(&self, stream: Stream) -> String {
        self.chunks
            .lock()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    pub fn clear(&self) {
        self.chunks.lock().clear();
    }
}

impl OutputSink for BufferSink {
    fn write(&self, stream: Stream, text: &str) {
        self.chunks.lock().push((stream, text.to_string()));
    }
}

/// File-like object installed as `sys.stdout` / `sys.stderr`.
#[pyclass(module = "pyhost_io", name = "HostWriter")]
struct HostWriter {
    stream: Stream,
}

#[pymethods]
impl HostWriter {
    fn write(&self, text: &str) -> usize {
        forward(self.stream, text);
        text.chars().count()
    }

    fn flush(&self) {}

    fn isatty(&self) -> bool {
        false
    }

    fn writable(&self) -> bool {
        true
    }

    #[getter]
    fn encoding(&self) -> &'static str {
        "utf-8"
    }

    #[getter]
    fn name(&self) -> String {
        format!("<pyhost {}>", self.stream.as_str())
    }
}

/// Python-callable sink: `pyhost_io.write("stdout", text)`.
#[pyfunction]
#[pyo3(name = "write")]
fn host_write(stream: &str, text: &str) -> PyResult<()> {
    let stream = Stream::from_name(stream)
        .ok_or_else(|| PyValueError::new_err(format!("unknown stream '{}'", stream)))?;
    forward(stream, text);
    Ok(())
}

fn forward(stream: Stream, text: &str) {
    let sink = SINK.read().clone();
    if let Some(sink) = sink {
        sink.write(stream, text);
    }
}

/// Forget the installed sink without touching Python state.
pub(crate) fn clear_sink() {
    *SINK.write() = None;
    *SAVED_STREAMS.lock() = None;
}

/// Whether `sys.stdout`/`sys.stderr` currently point at the host sink
pub fn redirect_installed() -> bool {
    SAVED_STREAMS.lock().is_some()
}

/// Add `pyhost_io` to `sys.modules` unless an earlier install already did.
fn register_host_io(py: Python<'_>, sys: &Bound<'_, PyModule>) -> PyResult<()> {
    let modules = sys.getattr("modules")?.downcast_into::<PyDict>()?;
    if modules.contains(HOST_IO_MODULE)? {
        return Ok(());
    }

    let module = PyModule::new(py, HOST_IO_MODULE)?;
    module.add_function(wrap_pyfunction!(host_write, &module)?)?;
    module.add_class::<HostWriter>()?;
    modules.set_item(HOST_IO_MODULE, module)?;
    Ok(())
}

/// Sink active during a captured execution: keeps every chunk and still
/// passes it on to the sink that was installed before.
struct CaptureSink {
    buffer: BufferSink,
    outer: Option<Arc<dyn OutputSink>>,
}

impl OutputSink for CaptureSink {
    fn write(&self, stream: Stream, text: &str) {
        self.buffer.write(stream, text);
        if let Some(outer) = &self.outer {
            outer.write(stream, text);
        }
    }
}

impl Interpreter {
    /// Send everything Python writes to `sys.stdout`/`sys.stderr` to `sink`.
    ///
    /// Installing again replaces the sink; the streams saved by the first
    /// install are the ones `remove_redirect` restores. The sink only becomes
    /// active once both streams point at the host.
    pub fn install_redirect<S>(&self, sink: S) -> Result<()>
    where
        S: OutputSink + 'static,
    {
        self.point_streams_at_host()?;
        *SINK.write() = Some(Arc::new(sink));

        info!("Python output redirected to host sink");
        Ok(())
    }

    /// Put back the streams that were active before `install_redirect`.
    ///
    /// A no-op when no redirect is installed. The saved streams are kept
    /// until both are restored, so a failed removal can be retried.
    pub fn remove_redirect(&self) -> Result<()> {
        let restored = Python::with_gil(|py| -> Result<bool> {
            let mut saved = SAVED_STREAMS.lock();
            let Some(streams) = saved.as_ref() else {
                return Ok(false);
            };

            let sys = py
                .import("sys")
                .map_err(|e| Error::context("failed to import sys module", e))?;
            sys.setattr("stdout", streams.stdout.bind(py))
                .map_err(|e| Error::context("failed to restore sys.stdout", e))?;
            sys.setattr("stderr", streams.stderr.bind(py))
                .map_err(|e| Error::context("failed to restore sys.stderr", e))?;

            *saved = None;
            Ok(true)
        })?;

        if restored {
            debug!("Python output streams restored");
        }
        *SINK.write() = None;
        Ok(())
    }

    /// Run `f` while collecting everything Python writes into a fresh buffer.
    ///
    /// A sink installed before the call keeps receiving every chunk; one
    /// installed by this call is removed again afterwards.
    pub(crate) fn with_captured_output<R>(
        &self,
        f: impl FnOnce() -> R,
    ) -> Result<(R, BufferSink)> {
        let outer = SINK.read().clone();
        let was_installed = redirect_installed();
        let buffer = BufferSink::new();

        self.point_streams_at_host()?;
        *SINK.write() = Some(Arc::new(CaptureSink {
            buffer: buffer.clone(),
            outer: outer.clone(),
        }));

        let value = f();

        if was_installed {
            *SINK.write() = outer;
        } else {
            self.remove_redirect()?;
        }
        Ok((value, buffer))
    }

    /// Register `pyhost_io`, remember the current streams on first use and
    /// point `sys.stdout`/`sys.stderr` at fresh `HostWriter`s.
    fn point_streams_at_host(&self) -> Result<()> {
        Python::with_gil(|py| {
            let sys = py
                .import("sys")
                .map_err(|e| Error::context("failed to import sys module", e))?;

            register_host_io(py, &sys)
                .map_err(|e| Error::context("failed to register pyhost_io module", e))?;

            let mut saved = SAVED_STREAMS.lock();
            let first_install = saved.is_none();
            if first_install {
                let stdout = sys
                    .getattr("stdout")
                    .map_err(|e| Error::context("failed to get original sys.stdout", e))?;
                let stderr = sys
                    .getattr("stderr")
                    .map_err(|e| Error::context("failed to get original sys.stderr", e))?;
                *saved = Some(SavedStreams {
                    stdout: stdout.unbind(),
                    stderr: stderr.unbind(),
                });
            }

            let swapped = Bound::new(py, HostWriter { stream: Stream::Stdout })
                .and_then(|writer| sys.setattr("stdout", writer))
                .and_then(|_| Bound::new(py, HostWriter { stream: Stream::Stderr }))
                .and_then(|writer| sys.setattr("stderr", writer));

            if let Err(e) = swapped {
                if first_install {
                    // Put back whatever was swapped so far
                    if let Some(streams) = saved.take() {
                        let _ = sys.setattr("stdout", streams.stdout);
                        let _ = sys.setattr("stderr", streams.stderr);
                    }
                }
                return Err(Error::context("failed to point sys streams at host", e));
            }
            Ok(())
        })
    }
}
