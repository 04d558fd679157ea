//! # Function Deployer
//!
//! Publishes access-control functions ahead of a resync. Each configured
//! `(endpoint, scope, collection)` gets its source uploaded in config order;
//! a failed upload is recorded and the next one still runs.

use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use resync_core::DeployOutcome;

use crate::client::AccessFunctionPublisher;
use crate::config::{EndpointSettings, ResyncConfig};
use crate::error::{EngineError, EngineResult};

const MODULE_EXPORTS: &str = "module.exports";

// =============================================================================
// Assets
// =============================================================================

/// One function source bound to its keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAsset {
    pub endpoint: String,
    pub scope: String,
    pub collection: String,
    pub path: PathBuf,
}

impl FunctionAsset {
    /// Assets for the given endpoints, with paths resolved against the
    /// config file's directory.
    pub fn from_config(config: &ResyncConfig, endpoints: &[&EndpointSettings]) -> Vec<Self> {
        endpoints
            .iter()
            .flat_map(|endpoint| {
                endpoint.functions.iter().map(|function| FunctionAsset {
                    endpoint: endpoint.name.clone(),
                    scope: endpoint.scope.clone(),
                    collection: function.collection.clone(),
                    path: config.resolve_path(&function.file),
                })
            })
            .collect()
    }

    /// Reads the source and strips a `module.exports = \`...\`` wrapper.
    pub async fn load_source(&self) -> EngineResult<String> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            EngineError::FunctionSourceUnreadable {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(unwrap_source(&raw).to_string())
    }
}

/// Returns the template body of an exported source, or the trimmed source.
pub fn unwrap_source(raw: &str) -> &str {
    let code = raw.trim();
    if !code.starts_with(MODULE_EXPORTS) {
        return code;
    }

    match (code.find('`'), code.rfind('`')) {
        (Some(open), Some(close)) if open < close => code[open + 1..close].trim(),
        _ => code,
    }
}

// =============================================================================
// Deployer
// =============================================================================

/// Uploads function sources one after another.
#[derive(Clone)]
pub struct FunctionDeployer {
    publisher: Arc<dyn AccessFunctionPublisher>,
}

impl FunctionDeployer {
    pub fn new(publisher: Arc<dyn AccessFunctionPublisher>) -> Self {
        FunctionDeployer { publisher }
    }

    /// Deploys every asset in order. Stops early only on cancellation.
    pub async fn deploy_all(
        &self,
        assets: &[FunctionAsset],
        cancel: &CancellationToken,
    ) -> Vec<DeployOutcome> {
        let mut outcomes = Vec::with_capacity(assets.len());

        for asset in assets {
            if cancel.is_cancelled() {
                warn!(remaining = assets.len() - outcomes.len(), "Deploy cancelled");
                break;
            }
            outcomes.push(self.deploy(asset).await);
        }

        outcomes
    }

    /// Deploys a single asset.
    pub async fn deploy(&self, asset: &FunctionAsset) -> DeployOutcome {
        let result = match asset.load_source().await {
            Ok(source) => {
                self.publisher
                    .publish_access_function(
                        &asset.endpoint,
                        &asset.scope,
                        &asset.collection,
                        &source,
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(
                    endpoint = %asset.endpoint,
                    collection = %asset.collection,
                    path = %asset.path.display(),
                    "Function deployed"
                );
                DeployOutcome::deployed(&asset.endpoint, &asset.scope, &asset.collection)
            }
            Err(e) => {
                error!(
                    endpoint = %asset.endpoint,
                    collection = %asset.collection,
                    error = %e,
                    "Function deploy failed"
                );
                DeployOutcome::failed(
                    &asset.endpoint,
                    &asset.scope,
                    &asset.collection,
                    e.to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, ScriptedClient};
    use resync_core::RemoteOperation;
    use std::io::Write;

    fn asset(endpoint: &str, collection: &str, path: PathBuf) -> FunctionAsset {
        FunctionAsset {
            endpoint: endpoint.into(),
            scope: "data".into(),
            collection: collection.into(),
            path,
        }
    }

    fn source_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_unwrap_source() {
        assert_eq!(
            unwrap_source("module.exports = `\nfunction (doc) { channel(doc.type); }\n`;\n"),
            "function (doc) { channel(doc.type); }"
        );
        assert_eq!(unwrap_source("  function (doc) {}\n"), "function (doc) {}");
        assert_eq!(unwrap_source("module.exports = fn;"), "module.exports = fn;");
    }

    #[tokio::test]
    async fn test_deploys_in_order_and_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let first = source_file(&dir, "a.js", "module.exports = `function a() {}`;");
        let second = source_file(&dir, "b.js", "function b() {}");

        let client = Arc::new(
            ScriptedClient::new().failing("broken", RemoteOperation::PublishFunction, 500),
        );
        let deployer = FunctionDeployer::new(client.clone());

        let assets = vec![
            asset("broken", "UserInfo", first.clone()),
            asset("lite", "UserInfo", first),
            asset("lite", "Missing", dir.path().join("missing.js")),
            asset("lite", "Reports", second),
        ];

        let outcomes = deployer
            .deploy_all(&assets, &CancellationToken::new())
            .await;

        let deployed: Vec<bool> = outcomes.iter().map(|o| o.deployed).collect();
        assert_eq!(deployed, vec![false, true, false, true]);
        assert!(outcomes[2].error.as_deref().unwrap().contains("missing.js"));

        let published: Vec<Call> = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Publish(..)))
            .collect();
        assert_eq!(published.len(), 3);
        assert_eq!(
            published[1],
            Call::Publish(
                "lite".into(),
                "data".into(),
                "UserInfo".into(),
                "function a() {}".into()
            )
        );
    }

    #[tokio::test]
    async fn test_cancelled_deploy_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = source_file(&dir, "a.js", "function a() {}");
        let client = Arc::new(ScriptedClient::new());
        let deployer = FunctionDeployer::new(client.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = deployer
            .deploy_all(&[asset("lite", "UserInfo", path)], &cancel)
            .await;

        assert!(outcomes.is_empty());
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_assets_from_config_resolve_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = source_file(
            &dir,
            "resync.toml",
            r#"
[connection]
organization_id = "org"
project_id = "proj"
cluster_id = "cluster"
app_service_id = "svc"
api_key = "key"

[[endpoints]]
name = "lite"
scope = "data"
resync_collections = ["UserInfo"]
functions = [{ collection = "UserInfo", file = "functions/user_info.js" }]

[[endpoints]]
name = "other"
scope = "data"
"#,
        );

        let config = ResyncConfig::from_file(&config_path).unwrap();
        let selected = config.select_endpoints(&[]).unwrap();
        let assets = FunctionAsset::from_config(&config, &selected);

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].endpoint, "lite");
        assert_eq!(assets[0].path, dir.path().join("functions/user_info.js"));
    }
}
