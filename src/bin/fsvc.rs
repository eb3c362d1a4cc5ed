#![deny(unsafe_code)]

use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(u8::try_from(cli::run()).unwrap_or(1))
}
