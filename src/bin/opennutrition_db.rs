use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use opennutrition_db::app::App;
use opennutrition_db::config::{ConfigLoader, SettingsOverrides};
use opennutrition_db::error::NutritionError;
use opennutrition_db::output::{ConsoleOutput, JsonOutput, OutputMode};
use opennutrition_db::source::DatasetHttpClient;
use opennutrition_db::store::Store;

#[derive(Parser)]
#[command(name = "opennutrition-db")]
#[command(about = "Download the OpenNutrition dataset and load it into the meal planner database")]
#[command(version, author)]
struct Cli {
    /// JSON config file (defaults to ./opennutrition-db.json when present)
    #[arg(long)]
    config: Option<String>,

    /// Directory holding the dataset file and used for extraction
    #[arg(long)]
    workspace: Option<Utf8PathBuf>,

    /// Dataset archive URL
    #[arg(long)]
    url: Option<String>,

    /// Write the database here instead of the application-data directory
    #[arg(long)]
    data_dir: Option<Utf8PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<NutritionError>() {
            return ExitCode::from(error.exit_code());
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    let overrides = SettingsOverrides {
        workspace: cli.workspace,
        dataset_url: cli.url,
        data_dir: cli.data_dir,
    };
    let settings = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
    let store = Store::from_settings(&settings)?;
    let client = DatasetHttpClient::new()?;
    let app = App::new(settings, store, client);

    match output_mode {
        OutputMode::Console => {
            let result = app.run(&ConsoleOutput)?;
            ConsoleOutput::print_setup(&result).into_diagnostic()?;
        }
        OutputMode::Json => {
            let result = app.run(&JsonOutput)?;
            JsonOutput::print_setup(&result).into_diagnostic()?;
        }
    }
    Ok(())
}
