//! Configuration file handling for finviz.
//!
//! The configuration file is stored at `$FINVIZ_HOME/config.json` and holds the settings of the
//! HTTP server and the location of the SQLite database.

use crate::db::Db;
use crate::utils;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "finviz";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const FINVIZ_SQLITE: &str = "finviz.sqlite";
const UPLOADS: &str = "uploads";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPLOAD_LIMIT: u64 = 10 * 1024 * 1024;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$FINVIZ_HOME` and from there it loads `$FINVIZ_HOME/config.json` and opens the
/// database.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
    uploads: PathBuf,
}

impl Config {
    /// Creates the home directory and:
    /// - writes an initial `config.json` with default settings
    /// - creates the `uploads` staging directory
    /// - creates and initializes the SQLite database
    ///
    /// # Errors
    /// - Returns an error if a config file already exists or any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::create_with_frontend(dir, None).await
    }

    /// Like `create`, also recording `frontend_dir` as the dashboard directory `serve` uses.
    pub async fn create_with_frontend(
        dir: impl Into<PathBuf>,
        frontend_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the finviz home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!("A config file already exists at '{}'", config_path.display());
        }
        let config_file = ConfigFile {
            frontend_dir,
            ..ConfigFile::default()
        };

        // config.json is written last: its presence marks a finished init.
        let sqlite_path = config_file.database_path(&root);
        let db = Db::init(&sqlite_path)
            .await
            .context("Unable to create SQLite DB")?;

        let uploads = root.join(UPLOADS);
        let saved = match utils::make_dir(&uploads).await {
            Ok(()) => config_file.save(&config_path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            db.remove(&sqlite_path).await;
            return Err(e);
        }

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
            uploads,
        })
    }

    /// This will
    /// - validate that `finviz_home` and its config file exist
    /// - load the config file
    /// - make sure the uploads directory exists
    /// - open the database, bringing its schema up to date
    pub async fn load(finviz_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = finviz_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The finviz home directory is missing, run 'finviz init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let uploads = root.join(UPLOADS);
        utils::make_dir(&uploads).await?;

        let sqlite_path = config_file.database_path(&root);
        let db = Db::load(&sqlite_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
            uploads,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    /// The directory uploaded spreadsheets are staged in while they are processed.
    pub fn uploads(&self) -> &Path {
        &self.uploads
    }

    pub fn port(&self) -> u16 {
        self.config_file.port
    }

    pub fn upload_limit(&self) -> u64 {
        self.config_file.upload_limit_bytes
    }

    /// The directory of the dashboard's static files, resolved against the home directory.
    pub fn frontend_dir(&self) -> Option<PathBuf> {
        self.config_file
            .frontend_dir
            .as_ref()
            .map(|p| resolve(&self.root, p))
    }

    /// Overrides the port from the config file, e.g. with `--port` or `$PORT`.
    pub fn set_port(&mut self, port: u16) {
        self.config_file.port = port;
    }

    /// Overrides the dashboard directory from the config file.
    pub fn set_frontend_dir(&mut self, dir: PathBuf) {
        self.config_file.frontend_dir = Some(dir);
    }

    #[cfg(test)]
    pub(crate) fn set_upload_limit(&mut self, limit: u64) {
        self.config_file.upload_limit_bytes = limit;
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "finviz",
///   "config_version": 1,
///   "port": 3000,
///   "upload_limit_bytes": 10485760,
///   "frontend_dir": "/srv/finviz/frontend",
///   "database_path": "finviz.sqlite"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "finviz"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The port the HTTP server listens on
    #[serde(default = "default_port")]
    port: u16,

    /// The largest spreadsheet, in bytes, that will be accepted for upload
    #[serde(default = "default_upload_limit")]
    upload_limit_bytes: u64,

    /// Directory of the static dashboard files (relative to the home directory or absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frontend_dir: Option<PathBuf>,

    /// Path to the SQLite database (relative to the home directory or absolute)
    /// Defaults to $FINVIZ_HOME/finviz.sqlite if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database_path: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_upload_limit() -> u64 {
    DEFAULT_UPLOAD_LIMIT
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            port: DEFAULT_PORT,
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT,
            frontend_dir: None,
            database_path: None,
        }
    }
}

impl ConfigFile {
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.upload_limit_bytes > 0,
            "Invalid upload_limit_bytes in config file: must be greater than zero"
        );
        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }

    fn database_path(&self, root: &Path) -> PathBuf {
        match &self.database_path {
            Some(p) => resolve(root, p),
            None => root.join(FINVIZ_SQLITE),
        }
    }
}

/// Returns `p` unchanged if it is absolute, otherwise joins it onto `root`.
fn resolve(root: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}
