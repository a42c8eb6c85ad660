//! Application container for vls

use std::sync::Arc;

use crate::cli::Cli;
use crate::models::config::VlsConfig;
use crate::server::LanguageServer;
use crate::services::config::{ConfigService, DefaultConfigService};
use crate::services::session::SessionController;

pub struct App {
    pub(crate) config_service: Arc<dyn ConfigService>,
    pub(crate) config: VlsConfig,
}

impl App {
    /// Load layered config and apply command-line flags on top
    pub async fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config_service: Arc<dyn ConfigService> =
            Arc::new(DefaultConfigService::new(cli.config.as_deref()));
        let mut config = config_service.load().await?;
        cli.apply(&mut config);

        tracing::debug!(
            "Config loaded from {:?} ({} features enabled)",
            config_service.config_path(),
            config.features.len()
        );

        Ok(Self {
            config_service,
            config,
        })
    }

    pub fn config(&self) -> &VlsConfig {
        &self.config
    }

    pub fn config_service(&self) -> &Arc<dyn ConfigService> {
        &self.config_service
    }

    /// Serve one session over stdio and return the process exit code
    pub async fn run(self) -> anyhow::Result<i32> {
        let session = SessionController::new(self.config);
        let mut server = LanguageServer::new(session);
        let code = server.run_stdio().await?;
        tracing::info!("Session ended with exit code {}", code);
        Ok(code)
    }
}
