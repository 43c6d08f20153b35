//! Application container for Symscope

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::OutputContext;
use crate::cli::output::OutputFormat;
use crate::config;
use crate::infra::manifest::{self, LoadedSolution};
use crate::models::config::SymscopeConfig;
use crate::services::config::{ConfigService, DefaultConfigService};
use crate::services::references::DefaultReferenceService;
use crate::services::store::SolutionStore;

pub struct App {
    root: PathBuf,
    manifest: PathBuf,
    pub(crate) output: OutputContext,
    pub(crate) config_service: Arc<dyn ConfigService>,
    pub(crate) config: SymscopeConfig,
}

impl App {
    /// Root is the manifest's directory, or the working directory when the
    /// manifest does not exist yet
    pub async fn new(manifest: &Path) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let manifest = if manifest.is_absolute() {
            manifest.to_path_buf()
        } else {
            cwd.join(manifest)
        };
        let root = match manifest.parent().map(Path::canonicalize) {
            Some(Ok(dir)) if manifest.exists() => dir,
            _ => cwd,
        };

        tracing::debug!("Initializing Symscope at {:?}", root);

        let config_service = Arc::new(DefaultConfigService::new(&root));
        let config = match config_service.load(false).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config: {}", e);
                SymscopeConfig::default()
            }
        };
        config::init(&config);

        let output = OutputContext::new(root.clone())
            .with_format(OutputFormat::from_name(&config.output.format));

        Ok(Self {
            root,
            manifest,
            output,
            config_service,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    pub fn config(&self) -> &SymscopeConfig {
        &self.config
    }

    pub async fn load_solution(&self) -> anyhow::Result<LoadedSolution> {
        Ok(manifest::load_solution(&self.manifest, config::max_file_size_bytes()).await?)
    }

    /// Load the solution and build a reference service over it
    ///
    /// The loaded snapshot is returned alongside so callers can diff
    /// against it after a rename.
    pub async fn reference_service(
        &self,
    ) -> anyhow::Result<(LoadedSolution, DefaultReferenceService)> {
        let loaded = self.load_solution().await?;
        let store = SolutionStore::new(loaded.solution.clone());
        Ok((loaded, DefaultReferenceService::with_defaults(store)))
    }
}
