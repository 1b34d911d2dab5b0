use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::app::AppError;
use crate::domain::reconciliation::ReconcileMode;

pub const DEFAULT_TOKEN_FILE: &str = "/tmp/tado_refresh_token";
pub const DEFAULT_HOME_ID: u64 = 1898784;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    MeterReadings,
    HeatingBills,
}

impl From<ModeArg> for ReconcileMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::MeterReadings => ReconcileMode::MeterReadings,
            ModeArg::HeatingBills => ReconcileMode::HeatingBills,
        }
    }
}

/// Raw command line. Every credential flag is optional at parse time and
/// validated by the operation that needs it, with an env-var fallback for
/// unattended runs.
#[derive(Debug, Parser)]
#[command(name = "octopus_tado_sync", about = "Tado and Octopus reconciliation job")]
pub struct CliArgs {
    /// Tado account email
    #[arg(long, env = "TADO_EMAIL")]
    pub tado_email: Option<String>,
    /// Tado account password
    #[arg(long, env = "TADO_PASSWORD")]
    pub tado_password: Option<String>,
    /// MPRN (Meter Point Reference Number) for the gas meter
    #[arg(long, env = "OCTOPUS_MPRN")]
    pub mprn: Option<String>,
    /// Gas meter serial number
    #[arg(long, env = "OCTOPUS_GAS_SERIAL_NUMBER")]
    pub gas_serial_number: Option<String>,
    /// Octopus API key
    #[arg(long, env = "OCTOPUS_API_KEY")]
    pub octopus_api_key: Option<String>,
    /// Path of the persisted refresh token
    #[arg(long, env = "TADO_TOKEN_FILE", default_value = DEFAULT_TOKEN_FILE)]
    pub token_file: PathBuf,
    /// Tado home id owning the Energy Insights resources
    #[arg(long, env = "TADO_HOME_ID", default_value_t = DEFAULT_HOME_ID)]
    pub home_id: u64,
    /// Vendor resource the reconciliation writes to
    #[arg(long, value_enum, default_value_t = ModeArg::MeterReadings)]
    pub mode: ModeArg,
    /// Cumulative reading for the push binary
    #[arg(long)]
    pub reading: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tado_email: String,
    pub tado_password: String,
    pub mprn: Option<String>,
    pub gas_serial_number: Option<String>,
    pub octopus_api_key: Option<String>,
    pub token_file: PathBuf,
    pub home_id: u64,
    pub mode: ReconcileMode,
    pub reading: Option<i64>,
}

impl AppConfig {
    pub fn from_cli() -> Result<Self, AppError> {
        Self::from_args(CliArgs::parse())
    }

    fn from_args(args: CliArgs) -> Result<Self, AppError> {
        Ok(Self {
            tado_email: required(args.tado_email, "--tado-email")?,
            tado_password: required(args.tado_password, "--tado-password")?,
            mprn: args.mprn,
            gas_serial_number: args.gas_serial_number,
            octopus_api_key: args.octopus_api_key,
            token_file: args.token_file,
            home_id: args.home_id,
            mode: args.mode.into(),
            reading: args.reading,
        })
    }

    /// The retailer triple the sync run needs; push and purge never touch
    /// the retailer and skip this check.
    pub fn retailer_meter(&self) -> Result<(String, String, String), AppError> {
        let mprn = required(self.mprn.clone(), "--mprn")?;
        let serial = required(self.gas_serial_number.clone(), "--gas-serial-number")?;
        let api_key = required(self.octopus_api_key.clone(), "--octopus-api-key")?;
        Ok((mprn, serial, api_key))
    }

    pub fn push_reading(&self) -> Result<i64, AppError> {
        self.reading
            .ok_or_else(|| AppError::config("--reading is required"))
    }
}

fn required(value: Option<String>, flag: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::config(format!("{flag} is required")))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::domain::reconciliation::ReconcileMode;

    use super::{AppConfig, CliArgs, DEFAULT_HOME_ID, DEFAULT_TOKEN_FILE};

    fn parse(args: &[&str]) -> CliArgs {
        let mut argv = vec!["octopus_tado_sync"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).expect("args should parse")
    }

    #[test]
    fn rejects_missing_tado_email() {
        let args = parse(&["--tado-password", "pw"]);

        let result = AppConfig::from_args(args);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid configuration: --tado-email is required"
        );
    }

    #[test]
    fn applies_defaults_for_optional_fields() {
        let args = parse(&["--tado-email", "me@example.com", "--tado-password", "pw"]);

        let config = AppConfig::from_args(args).expect("config should be valid");

        assert_eq!(config.tado_email, "me@example.com");
        assert_eq!(config.token_file.to_string_lossy(), DEFAULT_TOKEN_FILE);
        assert_eq!(config.home_id, DEFAULT_HOME_ID);
        assert_eq!(config.mode, ReconcileMode::MeterReadings);
        assert_eq!(config.reading, None);
    }

    #[test]
    fn retailer_meter_requires_all_three_flags() {
        let args = parse(&[
            "--tado-email",
            "me@example.com",
            "--tado-password",
            "pw",
            "--mprn",
            "123456789",
            "--gas-serial-number",
            "G4-META-1",
        ]);
        let config = AppConfig::from_args(args).expect("config should be valid");

        let result = config.retailer_meter();

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid configuration: --octopus-api-key is required"
        );
    }

    #[test]
    fn parses_heating_bills_mode() {
        let args = parse(&[
            "--tado-email",
            "me@example.com",
            "--tado-password",
            "pw",
            "--mode",
            "heating-bills",
        ]);

        let config = AppConfig::from_args(args).expect("config should be valid");

        assert_eq!(config.mode, ReconcileMode::HeatingBills);
    }

    #[test]
    fn push_reading_requires_the_flag() {
        let args = parse(&["--tado-email", "me@example.com", "--tado-password", "pw"]);
        let config = AppConfig::from_args(args).expect("config should be valid");

        assert!(config.push_reading().is_err());

        let args = parse(&[
            "--tado-email",
            "me@example.com",
            "--tado-password",
            "pw",
            "--reading",
            "2044",
        ]);
        let config = AppConfig::from_args(args).expect("config should be valid");

        assert_eq!(config.push_reading().expect("reading should be set"), 2044);
    }
}
