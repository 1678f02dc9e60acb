//! Dropping a live handle shuts the interpreter down. Like an explicit
//! finalize this is one-way for the process, so it gets its own binary.

use pyhost_python::{BufferSink, Error, Interpreter, InterpreterConfig, InterpreterState};

#[test]
fn test_drop_finalizes() {
    let interpreter = Interpreter::initialize(InterpreterConfig::default()).unwrap();
    interpreter.install_redirect(BufferSink::new()).unwrap();
    assert_eq!(Interpreter::state(), InterpreterState::Initialized);

    drop(interpreter);

    assert_eq!(Interpreter::state(), InterpreterState::Finalized);
    assert!(!pyhost_python::redirect::redirect_installed());
    let err = Interpreter::initialize(InterpreterConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Finalized));
}
