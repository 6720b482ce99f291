use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match glotd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(io::stderr(), "glotd: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
