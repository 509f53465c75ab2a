//! Tarball attachments fetched from an npm-style registry.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;
use warehouse_store::Record;

use crate::error::{ModelError, ModelResult};

/// MIME type recorded on every attachment.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Registry tarballs are fetched from unless configured otherwise.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Default request timeout of [`HttpTarballSource`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where tarball bytes come from.
#[async_trait]
pub trait TarballSource: Send + Sync {
    /// Download the tarball at `url`. A status >= 400 is an error.
    async fn fetch(&self, url: &Url) -> ModelResult<Vec<u8>>;
}

/// [`TarballSource`] backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTarballSource {
    client: reqwest::Client,
}

impl HttpTarballSource {
    pub fn new(timeout: Duration) -> ModelResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("warehouse-models")
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Fetch(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TarballSource for HttpTarballSource {
    async fn fetch(&self, url: &Url) -> ModelResult<Vec<u8>> {
        debug!(%url, "fetching tarball");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ModelError::Fetch(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(ModelError::HttpStatus(status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ModelError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// `<name>-<version>.tgz`
pub fn tarball_filename(name: &str, version: &str) -> String {
    format!("{name}-{version}.tgz")
}

/// `<registry>/<name>/-/<name>-<version>.tgz`, keeping any path prefix of
/// the registry URL.
pub fn tarball_url(registry: &str, name: &str, version: &str) -> ModelResult<Url> {
    let mut url =
        Url::parse(registry).map_err(|e| ModelError::InvalidUrl(format!("{registry}: {e}")))?;
    let base = url.path().trim_end_matches('/').to_string();
    let file = tarball_filename(name, version);
    url.set_path(&format!("{base}/{name}/-/{file}"));
    Ok(url)
}

/// Attach `bytes` to `target` under `_attachments[file]`.
///
/// `length` is the byte length of the base64 text, not of the raw tarball.
pub fn attach(target: &mut Record, file: &str, bytes: &[u8]) {
    let data = STANDARD.encode(bytes);
    let entry = json!({
        "content_type": CONTENT_TYPE,
        "length": data.len(),
        "data": data,
    });

    let attachments = target
        .entry("_attachments")
        .or_insert_with(|| Value::Object(Record::new()));
    if !attachments.is_object() {
        *attachments = Value::Object(Record::new());
    }
    if let Value::Object(attachments) = attachments {
        attachments.insert(file.to_string(), entry);
    }
}
