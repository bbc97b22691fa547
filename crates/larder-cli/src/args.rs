use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "larder-cli",
    version,
    about = "Client for the Larder recipe generation gateway"
)]
pub struct Cli {
    /// Base URL of the gateway, e.g. http://127.0.0.1:3000
    #[arg(long, env = "LARDER_SERVER", value_name = "URL")]
    pub server: Option<String>,

    /// Request id forwarded as `x-request-id`; one is generated when omitted.
    #[arg(long = "request-id", value_name = "ID")]
    pub request_id: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that the gateway is up.
    Health,
    /// Show the gateway's service descriptor.
    Info,
    /// Ask the gateway for recipes.
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Read the request body from a JSON file instead of flags.
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with_all = ["ingredients", "cuisines", "meal_types"]
    )]
    pub file: Option<PathBuf>,

    /// Ingredient available in the fridge; repeat for more.
    #[arg(long = "ingredient", short = 'i', value_name = "NAME")]
    pub ingredients: Vec<String>,

    /// Allergen to exclude; repeat for more.
    #[arg(long = "allergy", short = 'a', value_name = "NAME")]
    pub allergies: Vec<String>,

    /// Cuisine preference; repeat for more.
    #[arg(long = "cuisine", short = 'c', value_name = "NAME")]
    pub cuisines: Vec<String>,

    /// Meal type; repeat for more.
    #[arg(long = "meal-type", short = 'm', value_name = "NAME")]
    pub meal_types: Vec<String>,

    /// Diet preference.
    #[arg(long = "diet", short = 'd', value_name = "DIET")]
    pub diet: Option<String>,
}
