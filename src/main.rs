use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use usp_bolsas::{config::Config, error_time, info_time, process::process_site};

#[tokio::main]
async fn main() -> ExitCode {
    let start_time = Local::now();
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error_time!("Couldn't load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = process_site(config).await {
        error_time!("{}", e);
        return ExitCode::FAILURE;
    }
    info_time!(start_time, "Full program time:");

    ExitCode::SUCCESS
}
