use std::process::ExitCode;

fn main() -> ExitCode {
    govflow_cli::run()
}
