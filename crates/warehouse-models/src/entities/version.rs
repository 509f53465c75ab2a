//! Version: the published document of one `(name, version)`.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde_json::Value;
use warehouse_store::{AttributeType, Record, TableSchema};

use crate::attachment::{self, TarballSource};
use crate::compat::CompatModel;
use crate::error::{ModelError, ModelResult};
use crate::keys::{KEY_FIELD, KeyDeriver};

pub const TABLE: &str = "WarehouseVersion";

pub const KEYS: KeyDeriver = KeyDeriver::composite(&["name", "version"]);

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, KEY_FIELD)
        .attribute("name", AttributeType::String)
        .attribute("version", AttributeType::String)
        // JSON kept as text; readers hand it out without parsing.
        .attribute("value", AttributeType::String)
}

/// Version adapter with tarball attachment.
#[derive(Clone)]
pub struct Version {
    compat: CompatModel,
    tarballs: Arc<dyn TarballSource>,
    registry: String,
}

impl Version {
    /// `registry` is the base URL used by [`Version::get_attachment`] and
    /// [`Version::for_build`].
    pub fn new(
        compat: CompatModel,
        tarballs: Arc<dyn TarballSource>,
        registry: impl Into<String>,
    ) -> Self {
        Self {
            compat,
            tarballs,
            registry: registry.into(),
        }
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Copy of `version` with its tarball from the configured registry
    /// attached under `_attachments["<name>-<version>.tgz"]`.
    pub async fn get_attachment(&self, version: &Record) -> ModelResult<Record> {
        self.get_attachment_from(version, &self.registry).await
    }

    /// [`Version::get_attachment`] against an explicit registry.
    pub async fn get_attachment_from(
        &self,
        version: &Record,
        registry: &str,
    ) -> ModelResult<Record> {
        let mut document = version.clone();
        self.attach_tarball(version, &mut document, registry).await?;
        Ok(document)
    }

    /// The parsed `value` document of `version` with its tarball from the
    /// configured registry attached.
    pub async fn for_build(&self, version: &Record) -> ModelResult<Record> {
        self.for_build_from(version, &self.registry).await
    }

    /// [`Version::for_build`] against an explicit registry.
    pub async fn for_build_from(&self, version: &Record, registry: &str) -> ModelResult<Record> {
        let text = version
            .get("value")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::invalid("value", "expected JSON text"))?;
        let mut document = match serde_json::from_str(text) {
            Ok(Value::Object(document)) => document,
            Ok(_) => return Err(ModelError::invalid("value", "expected a JSON object")),
            Err(e) => return Err(ModelError::invalid("value", e.to_string())),
        };
        self.attach_tarball(version, &mut document, registry).await?;
        Ok(document)
    }

    async fn attach_tarball(
        &self,
        version: &Record,
        target: &mut Record,
        registry: &str,
    ) -> ModelResult<()> {
        let name = required_str(version, "name")?;
        let number = required_str(version, "version")?;
        let url = attachment::tarball_url(registry, name, number)?;
        let bytes = self.tarballs.fetch(&url).await?;
        attachment::attach(target, &attachment::tarball_filename(name, number), &bytes);
        Ok(())
    }
}

fn required_str<'a>(record: &'a Record, field: &str) -> ModelResult<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ModelError::invalid(field, "expected a non-empty string"))
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Version")
            .field("compat", &self.compat)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Deref for Version {
    type Target = CompatModel;

    fn deref(&self) -> &CompatModel {
        &self.compat
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use url::Url;
    use warehouse_store::{MemoryBackend, Model};

    use super::*;

    #[derive(Default)]
    struct StubSource {
        status: Option<u16>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TarballSource for StubSource {
        async fn fetch(&self, url: &Url) -> ModelResult<Vec<u8>> {
            self.seen.lock().unwrap().push(url.to_string());
            match self.status {
                Some(status) => Err(ModelError::HttpStatus(status)),
                None => Ok(b"tarball".to_vec()),
            }
        }
    }

    fn version(source: Arc<StubSource>) -> Version {
        let model = Model::define(Arc::new(MemoryBackend::new()), schema());
        Version::new(
            CompatModel::new(model, KEYS),
            source,
            "https://npm.example.com/registry/",
        )
    }

    fn record() -> Record {
        json!({
            "name": "my-package",
            "version": "1.0.0",
            "value": r#"{"name":"my-package","version":"1.0.0","main":"index.js"}"#,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[tokio::test]
    async fn get_attachment_decorates_the_record() {
        let source = Arc::new(StubSource::default());
        let out = version(source.clone())
            .get_attachment_from(&record(), "http://registry.npmjs.org/")
            .await
            .unwrap();

        let entry = &out["_attachments"]["my-package-1.0.0.tgz"];
        assert_eq!(entry["content_type"], "application/octet-stream");
        assert_eq!(entry["data"], "dGFyYmFsbA==");
        assert_eq!(entry["length"], 12);
        assert_eq!(out["value"], record()["value"]);
        assert_eq!(
            source.seen.lock().unwrap().as_slice(),
            ["http://registry.npmjs.org/my-package/-/my-package-1.0.0.tgz"]
        );
    }

    #[tokio::test]
    async fn for_build_attaches_to_parsed_value() {
        let source = Arc::new(StubSource::default());
        let out = version(source)
            .for_build(&record())
            .await
            .unwrap();

        assert_eq!(out["main"], "index.js");
        assert!(out.get("value").is_none());
        assert!(out["_attachments"]["my-package-1.0.0.tgz"].is_object());
    }

    #[tokio::test]
    async fn configured_registry_is_the_default_base() {
        let source = Arc::new(StubSource::default());
        let version = version(source.clone());
        version.get_attachment(&record()).await.unwrap();
        version.for_build(&record()).await.unwrap();

        let expected = "https://npm.example.com/registry/my-package/-/my-package-1.0.0.tgz";
        assert_eq!(version.registry(), "https://npm.example.com/registry/");
        assert_eq!(source.seen.lock().unwrap().as_slice(), [expected, expected]);
    }

    #[tokio::test]
    async fn http_error_status_is_surfaced() {
        let source = Arc::new(StubSource {
            status: Some(404),
            ..Default::default()
        });
        let err = version(source)
            .get_attachment(&record())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP statuscode 404");
    }

    #[tokio::test]
    async fn for_build_rejects_non_json_value() {
        let mut rec = record();
        rec.insert("value".into(), json!("not json"));
        let err = version(Arc::new(StubSource::default()))
            .for_build(&rec)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidValue { .. }));
    }
}
