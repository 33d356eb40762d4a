use std::process::ExitCode;

fn main() -> ExitCode {
    pricewatch_cli::run()
}
