//! Subcommand handlers. Each one returns the JSON printed on stdout.

use crate::cli::{App, AskArg, Commands, HistoryArg, MethodArg, RateArg};
use crate::error::CliError;

use fortune_core::config::{ClientConfig, default_config_path};
use fortune_core::logger::{DEFAULT_LOG_LEVEL, initialize as LoggerInitialize};
use fortune_core::{ClientContext, FortuneClient};

use models::{
    AuthSession, CastingMethod, DivinationRequest, HistoryQuery, LoginRequest, RegisterRequest,
    UserRating,
};

use std::path::PathBuf;

use log::{LevelFilter, info};
use serde_json::{Value, json};

const LOG_DIR_NAME: &str = "logs";
const APP_DIR_NAME: &str = "fortune";
const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Load config, start logging, open the credential store, build the client.
pub fn setup(app: &App) -> Result<FortuneClient, CliError> {
    let config_path = app.config.clone().unwrap_or_else(default_config_path);
    let config = ClientConfig::load_with_env(&config_path)?;

    let log_dir = app.log_dir.clone().unwrap_or_else(default_log_dir);
    let level = if app.verbose {
        LevelFilter::Debug
    } else {
        DEFAULT_LOG_LEVEL
    };
    LoggerInitialize(&log_dir, level)?;

    info!("fortune starting against {}", config.api.base_url);
    let context = ClientContext::persistent(config)?;
    Ok(FortuneClient::connect(context)?)
}

pub async fn execute(client: &FortuneClient, command: &Commands) -> Result<Value, CliError> {
    match command {
        Commands::Login(arg) => {
            let session = client
                .login(&LoginRequest {
                    identifier: arg.identifier.clone(),
                    password: arg.password.clone(),
                    remember_me: arg.remember_me,
                })
                .await?;
            session_json(&session)
        }
        Commands::Register(arg) => {
            let session = match &arg.username {
                Some(username) => {
                    client
                        .register(&RegisterRequest {
                            username: username.clone(),
                            email: arg.email.clone(),
                            password: arg.password.clone(),
                        })
                        .await?
                }
                None => client.register_with_email(&arg.email, &arg.password).await?,
            };
            session_json(&session)
        }
        Commands::Logout => {
            client.logout().await?;
            Ok(json!({ "loggedOut": true }))
        }
        Commands::Profile => {
            let profile = client.profile().await?;
            let free_count = client.divination_count().await?;
            Ok(json!({ "user": profile, "freeCount": free_count }))
        }
        Commands::History(arg) => Ok(serde_json::to_value(
            client.history(&history_query(arg)).await?,
        )?),
        Commands::Stats => Ok(serde_json::to_value(client.stats().await?)?),
        Commands::Show(arg) => Ok(serde_json::to_value(client.divination(&arg.id).await?)?),
        Commands::Ask(arg) => {
            let request = divination_request(arg)?;
            Ok(serde_json::to_value(client.perform(&request).await?)?)
        }
        Commands::Rate(arg) => {
            let rating = user_rating(arg)?;
            let stored = client.rate(&arg.id, &rating).await?;
            Ok(json!({ "rated": true, "rating": stored }))
        }
    }
}

pub fn history_query(arg: &HistoryArg) -> HistoryQuery {
    let query = HistoryQuery::page(arg.page);
    match arg.limit {
        Some(limit) => query.with_limit(limit),
        None => query,
    }
}

pub fn divination_request(arg: &AskArg) -> Result<DivinationRequest, CliError> {
    let method = match arg.method {
        MethodArg::Time => CastingMethod::Time {
            datetime: arg.datetime.clone(),
        },
        MethodArg::Number => CastingMethod::Number {
            numbers: arg.numbers.clone(),
        },
        MethodArg::Manual => CastingMethod::Manual {
            upper_trigram: arg.upper.clone().unwrap_or_default(),
            lower_trigram: arg.lower.clone().unwrap_or_default(),
            moving_line: arg
                .moving_line
                .ok_or_else(|| CliError::input("Manual casting needs --moving-line"))?,
        },
    };

    DivinationRequest::builder()
        .with_question(arg.question.clone())
        .with_method(method)
        .build()
        .map_err(|e| CliError::input(e.to_string()))
}

pub fn user_rating(arg: &RateArg) -> Result<UserRating, CliError> {
    let scores = [Some(arg.overall), arg.accuracy, arg.helpfulness];
    if let Some(score) = scores
        .into_iter()
        .flatten()
        .find(|score| !RATING_RANGE.contains(score))
    {
        return Err(CliError::input(format!("Ratings must be 1-5, got {score}")));
    }

    Ok(UserRating {
        overall: Some(arg.overall),
        accuracy: arg.accuracy,
        helpfulness: arg.helpfulness,
        feedback: arg.feedback.clone(),
    })
}

/// Tokens stay out of the output.
fn session_json(session: &AuthSession) -> Result<Value, CliError> {
    Ok(json!({
        "user": serde_json::to_value(&session.user)?,
        "freeCount": session.free_count,
        "isFirstLogin": session.is_first_login,
    }))
}

fn default_log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(LOG_DIR_NAME)
}
