mod args;
mod client;

use clap::Parser;
use larder_api_types::{GenerateRequest, OneOrMany};
use serde::Serialize;

use args::{Cli, Commands, GenerateArgs};
use client::{CliError, Gateway};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let gateway = Gateway::new(cli.server, cli.request_id)?;

    match cli.command {
        Commands::Health => print_json(&gateway.health().await?),
        Commands::Info => print_json(&gateway.info().await?),
        Commands::Generate(args) => {
            let body = generate_body(args).await?;
            print_json(&gateway.generate(&body).await?)
        }
    }
}

async fn generate_body(args: GenerateArgs) -> Result<GenerateRequest, CliError> {
    if let Some(path) = args.file {
        let raw = tokio::fs::read(path).await?;
        return Ok(serde_json::from_slice(&raw)?);
    }

    // Empty lists are sent as-is so the gateway reports which field is missing.
    Ok(GenerateRequest {
        ingredients: Some(args.ingredients),
        allergies: (!args.allergies.is_empty()).then_some(args.allergies),
        cuisine: Some(OneOrMany::Many(args.cuisines)),
        meal_type: Some(OneOrMany::Many(args.meal_types)),
        diet: args.diet,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
