use fortune::cli::App;
use fortune::commands::{execute, setup};
use fortune::error::CliError;

use std::process::ExitCode;

use clap::Parser;
use log::error;

#[tokio::main]
async fn main() -> ExitCode {
    let app = App::parse();

    match run(&app).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            match serde_json::to_string_pretty(&e) {
                Ok(rendered) => eprintln!("{rendered}"),
                Err(_) => eprintln!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(app: &App) -> Result<(), CliError> {
    let client = setup(app)?;
    let output = execute(&client, &app.cmd).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
