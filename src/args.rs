//! These structs provide the CLI interface for the finviz CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// finviz: upload yearly spreadsheets of monthly amounts and chart them in the browser.
///
/// Each user keeps one spreadsheet per year with a `Month` column and an `Amount` column.
/// Uploading the spreadsheet replaces whatever was stored for that user and year. The `serve`
/// subcommand runs the HTTP API and the dashboard.
#[derive(Debug, Parser, Clone)]
#[command(name = "finviz", version)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, the configuration file and the database.
    ///
    /// By default the data directory is $HOME/finviz. Pass --finviz-home or set FINVIZ_HOME to
    /// put it somewhere else. Pass --frontend to record the dashboard directory so that `serve`
    /// finds it without further flags.
    Init(InitArgs),
    /// Run the HTTP API and serve the dashboard.
    ///
    /// The dashboard is served from --frontend, or else from the directory recorded by
    /// `init --frontend` (frontend_dir in config.json). With neither, only the API is served.
    Serve(ServeArgs),
    /// Create a user, or rename an existing one.
    AddUser(AddUserArgs),
    /// Replace a user's records for a year with the contents of a local .xlsx file.
    Upload(UploadArgs),
    /// Print a user's records for a year.
    Show(ShowArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where finviz data and configuration is held. Defaults to ~/finviz
    #[arg(long, env = "FINVIZ_HOME", default_value_t = default_finviz_home())]
    finviz_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, finviz_home: PathBuf) -> Self {
        Self {
            log_level,
            finviz_home: finviz_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn finviz_home(&self) -> &DisplayPath {
        &self.finviz_home
    }
}

/// Args for the `finviz init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The directory of the dashboard's static files, e.g. the `frontend` directory of the
    /// finviz source tree. Stored in config.json as an absolute path.
    #[arg(long)]
    frontend: Option<PathBuf>,
}

impl InitArgs {
    pub fn new(frontend: Option<PathBuf>) -> Self {
        Self { frontend }
    }

    pub fn frontend(&self) -> Option<&Path> {
        self.frontend.as_deref()
    }
}

/// Args for the `finviz serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The port to listen on. Overrides the port in config.json.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// The directory of the dashboard's static files. Overrides frontend_dir in config.json.
    #[arg(long)]
    frontend: Option<PathBuf>,
}

impl ServeArgs {
    pub fn new(port: Option<u16>, frontend: Option<PathBuf>) -> Self {
        Self { port, frontend }
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn frontend(&self) -> Option<&Path> {
        self.frontend.as_deref()
    }
}

/// Args for the `finviz add-user` command.
#[derive(Debug, Parser, Clone)]
pub struct AddUserArgs {
    /// The user's identifier, as it appears in the API paths.
    #[arg(long)]
    id: String,

    /// The display name shown on the dashboard.
    #[arg(long)]
    name: String,
}

impl AddUserArgs {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Args for the `finviz upload` command.
#[derive(Debug, Parser, Clone)]
pub struct UploadArgs {
    /// The user the records belong to.
    #[arg(long)]
    user: String,

    /// The four-digit year the spreadsheet covers.
    #[arg(long)]
    year: String,

    /// The .xlsx file to upload. It is copied before processing and left in place.
    file: PathBuf,
}

impl UploadArgs {
    pub fn new(user: impl Into<String>, year: impl Into<String>, file: PathBuf) -> Self {
        Self {
            user: user.into(),
            year: year.into(),
            file,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Args for the `finviz show` command.
#[derive(Debug, Parser, Clone)]
pub struct ShowArgs {
    #[arg(long)]
    user: String,

    #[arg(long)]
    year: String,
}

impl ShowArgs {
    pub fn new(user: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            year: year.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn year(&self) -> &str {
        &self.year
    }
}

fn default_finviz_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("finviz"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --finviz-home or FINVIZ_HOME instead of relying on the default \
                finviz home directory.",
            );
            PathBuf::from("finviz")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
