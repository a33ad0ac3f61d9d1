use std::process::ExitCode;

fn main() -> ExitCode {
    confparse_cli::run()
}
