use crate::config::toml_config::{StoreConfig, StoreKind};
use crate::domain::model::ProjectGraph;
use crate::domain::ports::ProjectStore;
use crate::utils::error::{Result, ScaffoldError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Reads saved projects from `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct LocalProjectStore {
    base_path: PathBuf,
}

impl LocalProjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

#[async_trait]
impl ProjectStore for LocalProjectStore {
    async fn load_project(&self, id: &str) -> Result<ProjectGraph> {
        if !is_plain_id(id) {
            return Err(ScaffoldError::ProjectNotFound { id: id.to_string() });
        }

        let path = self.base_path.join(format!("{}.json", id));
        tracing::debug!("Loading project from {}", path.display());
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScaffoldError::ProjectNotFound { id: id.to_string() })
            }
            Err(e) => return Err(e.into()),
        };
        ProjectGraph::from_json_str(&content)
    }
}

/// Reads saved projects from `GET <base>/api/projects/<id>`.
#[derive(Debug, Clone)]
pub struct HttpProjectStore {
    base_url: Url,
    client: Client,
}

impl HttpProjectStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ScaffoldError::InvalidConfigValueError {
            field: "store.base_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    fn project_url(&self, id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ScaffoldError::ConfigError {
                message: format!("store base URL '{}' cannot have a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["api", "projects", id]);
        Ok(url)
    }
}

#[async_trait]
impl ProjectStore for HttpProjectStore {
    async fn load_project(&self, id: &str) -> Result<ProjectGraph> {
        let url = self.project_url(id)?;
        tracing::debug!("Fetching project from {}", url);

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ScaffoldError::ProjectNotFound { id: id.to_string() });
        }
        let graph = response.error_for_status()?.json::<ProjectGraph>().await?;
        Ok(graph)
    }
}

/// Builds the store named in the configuration, if any.
pub fn build_store(config: &StoreConfig) -> Result<Option<Arc<dyn ProjectStore>>> {
    match config.kind {
        StoreKind::None => Ok(None),
        StoreKind::Local => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| ScaffoldError::MissingConfigError {
                    field: "store.path".to_string(),
                })?;
            Ok(Some(Arc::new(LocalProjectStore::new(path))))
        }
        StoreKind::Http => {
            let base_url =
                config
                    .base_url
                    .as_deref()
                    .ok_or_else(|| ScaffoldError::MissingConfigError {
                        field: "store.base_url".to_string(),
                    })?;
            let store =
                HttpProjectStore::new(base_url, Duration::from_secs(config.timeout_seconds))?;
            Ok(Some(Arc::new(store)))
        }
    }
}

fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
