use std::process::ExitCode;

fn main() -> ExitCode {
    bookflow_cli::run()
}
