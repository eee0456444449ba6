use std::process::ExitCode;

fn main() -> ExitCode {
    portgate_cli::run()
}
