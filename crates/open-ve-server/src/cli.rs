//! CLI surface: `run` starts the server, `gen openapi` derives a
//! schema skeleton from an OpenAPI document, `test` runs a schema's
//! offline test cases.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "open-ve",
    about = "Open-VE: a centralized validation service with a single, simple API across frontend, BFF, and microservices."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the Open-VE server.
    Run {
        /// Path to a YAML configuration file.
        #[arg(long, env = "OPEN_VE_CONFIG")]
        config: Option<String>,
    },
    /// Generate an Open-VE schema file.
    Gen {
        #[command(subcommand)]
        source: GenSource,
    },
    /// Test an Open-VE schema file.
    Test {
        /// Path to the DSL YAML file.
        dsl_file: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum GenSource {
    /// Derive a skeleton schema from an OpenAPI 2.0 (Swagger) document.
    Openapi {
        /// Path to the OpenAPI 2.0 document.
        schema_file: String,
        /// Directory the generated `<unix-timestamp>.yml` is written to.
        output_dir: String,
    },
}
