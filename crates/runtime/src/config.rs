use std::{env, path::PathBuf};

use chrono::NaiveDate;
use connectors::DEFAULT_BATCH_SIZE;

use crate::error::{Result, RuntimeError};

/// Which of the four original single-purpose services this process stands
/// in for. Only `PgSink` actually drives an end-to-end run in this crate
/// (§1 Non-goals drops the Pulsar broker the other three talk over); the
/// others are kept so `APP_NAME` continues to select a config shape and a
/// log identity the way it does in the original deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRole {
    Reader,
    ContentParser,
    EventCreator,
    PgSink,
}

impl AppRole {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "reader" => Ok(AppRole::Reader),
            "contentparser" => Ok(AppRole::ContentParser),
            "eventcreator" => Ok(AppRole::EventCreator),
            "pgsink" => Ok(AppRole::PgSink),
            other => Err(RuntimeError::InvalidEnv {
                name: "APP_NAME",
                value: other.to_string(),
            }),
        }
    }
}

/// Boot-time configuration, assembled from the environment variables named
/// in §6. Every field a role's run needs is required at boot (fail fast);
/// fields that belong to the not-implemented Pulsar broker path are parsed
/// for validation only and otherwise unused.
#[derive(Debug, Clone)]
pub struct EkeConfig {
    pub app_name: AppRole,
    pub pulsar_input_topic: String,
    pub pulsar_output_topic: String,
    pub pulsar_conn_str: String,
    pub pulsar_client_name: String,
    pub postgres_conn_str: String,
    pub postgres_target_table: String,
    pub az_storage_connection_string: String,
    pub az_storage_container: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub batch_size: usize,
    pub balise_data_file: PathBuf,
}

impl EkeConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            app_name: AppRole::parse(&required("APP_NAME")?)?,
            pulsar_input_topic: required("PULSAR_INPUT_TOPIC")?,
            pulsar_output_topic: required("PULSAR_OUTPUT_TOPIC")?,
            pulsar_conn_str: required("PULSAR_CONN_STR")?,
            pulsar_client_name: required("PULSAR_CLIENT_NAME")?,
            postgres_conn_str: required("POSTGRES_CONN_STR")?,
            postgres_target_table: required("POSTGRES_TARGET_TABLE")?,
            az_storage_connection_string: required("AZ_STORAGE_CONNECTION_STRING")?,
            az_storage_container: required("AZ_STORAGE_CONTAINER")?,
            start_date: optional_date("START_DATE")?,
            end_date: optional_date("END_DATE")?,
            batch_size: optional("BYTEWAX_BATCH_SIZE")?
                .map(|value| {
                    value.parse().map_err(|_| RuntimeError::InvalidEnv {
                        name: "BYTEWAX_BATCH_SIZE",
                        value,
                    })
                })
                .transpose()?
                .unwrap_or(DEFAULT_BATCH_SIZE),
            balise_data_file: PathBuf::from(required("BALISE_DATA_FILE")?),
        })
    }
}

/// Installs `env_logger`, reading `LOG_LEVEL` (falling back to `RUST_LOG`,
/// then `info`) the way the collector and actor-supervision code already
/// does.
pub fn init_logging() {
    let filter = env::var("LOG_LEVEL")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn required(name: &'static str) -> Result<String> {
    env::var(name).map_err(|_| RuntimeError::MissingEnv(name))
}

fn optional(name: &'static str) -> Result<Option<String>> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(RuntimeError::InvalidEnv {
            name,
            value: "<non-utf8>".to_string(),
        }),
    }
}

fn optional_date(name: &'static str) -> Result<Option<NaiveDate>> {
    optional(name)?
        .map(|value| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| RuntimeError::InvalidEnv {
                name,
                value,
            })
        })
        .transpose()
}
