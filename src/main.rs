use clap::Parser;
use finviz::args::{Args, Command};
use finviz::model::{FinanceReport, Year};
use finviz::staging::StagedUpload;
use finviz::{commands, Config, Error, ErrorType, Result};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.details() {
                Some(details) => error!("Exiting with error: {e}: {details}"),
                None => error!("Exiting with error: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().finviz_home().path();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.frontend())
            .await?
            .print(),

        Command::Serve(serve_args) => {
            let mut config = Config::load(home).await.map_err(config_error)?;
            if let Some(port) = serve_args.port() {
                config.set_port(port);
            }
            if let Some(dir) = serve_args.frontend() {
                config.set_frontend_dir(dir.to_path_buf());
            }
            commands::serve(config).await?.print()
        }

        Command::AddUser(user_args) => {
            let config = Config::load(home).await.map_err(config_error)?;
            commands::add_user(&config, user_args.id(), user_args.name())
                .await?
                .print()
        }

        Command::Upload(upload_args) => {
            let config = Config::load(home).await.map_err(config_error)?;
            let year = parse_year(upload_args.year())?;
            let staged = StagedUpload::copy_from(config.uploads(), upload_args.file()).await?;
            commands::upload(&config, upload_args.user(), year, staged)
                .await?
                .print()
        }

        Command::Show(show_args) => {
            let config = Config::load(home).await.map_err(config_error)?;
            let year = parse_year(show_args.year())?;
            let out = commands::retrieve(&config, show_args.user(), year).await?;
            out.print();
            if let Some(report) = out.structure() {
                print_report(report);
            }
        }
    };
    Ok(())
}

fn config_error(e: anyhow::Error) -> Error {
    Error::with_source(ErrorType::Config, "Unable to load the finviz configuration", e)
}

fn parse_year(s: &str) -> Result<Year> {
    Year::from_str(s)
        .map_err(|e| Error::with_source(ErrorType::BadRequest, format!("Invalid year '{s}'"), e))
}

fn print_report(report: &FinanceReport) {
    println!("{} ({})", report.user.name, report.year);
    for record in &report.records {
        println!("  {:<10} {:>16}", record.month.to_string(), record.amount.currency());
    }
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level,
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
