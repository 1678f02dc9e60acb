//! pyhost Python embedding
//!
//! Embeds a CPython interpreter in a Rust host with PyO3: explicit
//! lifecycle, output redirection into the host, integer sequences marshaled
//! into Python lists, and calls into functions defined in `__main__`.
//!
//! ## Module Structure
//!
//! - `engine` - Interpreter handle, lifecycle state and execution types
//! - `config` - Interpreter configuration
//! - `redirect` - `sys.stdout`/`sys.stderr` routing into host sinks
//! - `marshal` - Host integer sequences as Python lists
//! - `invoke` - Calling `__main__` functions, with and without the reporting boundary
//! - `execution` - Scripts in `__main__`, captured execution and evaluation
//!
//! ```rust,ignore
//! use pyhost_python::{BufferSink, Interpreter, InterpreterConfig};
//!
//! let interpreter = Interpreter::initialize(InterpreterConfig::default())?;
//! interpreter.install_redirect(BufferSink::new())?;
//! interpreter.run_script("def show(xs):\n    for x in xs: print(x)\n")?;
//! let list = interpreter.to_foreign_list(&[1, 2, 3])?;
//! interpreter.call_function("show", &list)?;
//! drop(list);
//! interpreter.finalize()?;
//! ```

pub mod config;
pub mod engine;
pub mod execution;
pub mod invoke;
pub mod marshal;
pub mod redirect;

pub use config::InterpreterConfig;
pub use engine::{ExecutionConfig, ExecutionResult, Interpreter, InterpreterState};
pub use invoke::CallOutcome;
pub use marshal::ForeignList;
pub use pyhost::error::{Error, ForeignError, Result};
pub use redirect::{BufferSink, ConsoleSink, OutputSink, Stream};

#[cfg(test)]
pub(crate) mod testing {
    //! One interpreter per test binary. Tests that swap `sys.stdout` or
    //! write to `__main__` hold `serial()` while they do.

    use crate::{Interpreter, InterpreterConfig};
    use parking_lot::{Mutex, MutexGuard};
    use std::sync::OnceLock;

    static INTERPRETER: OnceLock<Interpreter> = OnceLock::new();
    static SERIAL: Mutex<()> = Mutex::new(());

    pub(crate) fn interpreter() -> &'static Interpreter {
        INTERPRETER.get_or_init(|| {
            Interpreter::initialize(InterpreterConfig::default())
                .expect("failed to initialize test interpreter")
        })
    }

    pub(crate) fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock()
    }
}
