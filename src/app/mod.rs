mod config;
mod error;
mod logging;
mod runtime;

pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    let config = bootstrap()?;

    runtime::run_sync(config)
}

pub fn run_push_total() -> Result<(), AppError> {
    let config = bootstrap()?;

    runtime::run_push_total(config)
}

pub fn run_purge_readings() -> Result<(), AppError> {
    let config = bootstrap()?;

    runtime::run_purge_readings(config)
}

fn bootstrap() -> Result<config::AppConfig, AppError> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let config = config::AppConfig::from_cli()?;

    tracing::info!(
        home_id = config.home_id,
        token_file = %config.token_file.display(),
        mode = ?config.mode,
        "application bootstrap initialized"
    );

    Ok(config)
}
