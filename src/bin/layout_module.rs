//! Version module executable wrapping the built-in layered engine.
//!
//! Speaks the module protocol on stdin/stdout; logs go to stderr.

use std::io::{stdin, stdout};
use std::process::ExitCode;

use diagram_server::error::ErrorCode;
use diagram_server::layout::engine::LayeredEngine;
use diagram_server::modules::protocol;

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match protocol::serve(&LayeredEngine, &args, stdin().lock(), stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "layout module failed");
            ExitCode::FAILURE
        }
    }
}
