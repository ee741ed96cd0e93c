use std::process::ExitCode;

use cloud_setup::setup;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = setup::run(&args) {
        // Use eprintln! here in case logger does not initialize.
        eprintln!("cloud-setup failed: {:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
