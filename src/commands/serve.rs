use crate::commands::Out;
use crate::{server, Config, Result};
use tracing::{info, warn};

/// Runs the HTTP server until it receives Ctrl-C.
pub async fn serve(config: Config) -> Result<Out<()>> {
    match config.frontend_dir() {
        Some(dir) if dir.is_dir() => info!("Dashboard directory: {}", dir.display()),
        Some(dir) => warn!(
            "The dashboard directory {} does not exist, only the API will be served",
            dir.display()
        ),
        None => info!("No dashboard directory is configured, only the API will be served"),
    }
    server::serve(config).await?;
    Ok(Out::new_message("The server has stopped"))
}
