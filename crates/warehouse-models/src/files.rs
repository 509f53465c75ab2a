//! File-list resolution shared by Build and BuildHead.

use std::path::Path;

use serde_json::Value;
use tracing::debug;
use warehouse_store::Record;

use crate::compat::CompatModel;
use crate::error::{ModelError, ModelResult};
use crate::fanout::eager_abort;

/// Suffix of the canonical (compressed) variant of every build file.
const CANONICAL_SUFFIX: &str = ".gz";

/// Content attributes dropped from resolved files.
const HEAVY_FIELDS: [&str; 3] = ["source", "sourcemap", "shrinkwrap"];

/// Fingerprints of `owner` whose extension is `.gz`, in record order.
pub fn canonical_fingerprints(owner: &Record) -> Vec<String> {
    owner
        .get("fingerprints")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|print| Path::new(print).extension().is_some_and(|ext| ext == "gz"))
        .map(str::to_string)
        .collect()
}

/// Resolve every canonical fingerprint of `owner` through `build_files`.
///
/// Lookups run concurrently and the first failure aborts the call. Returned
/// files carry the fingerprint without its `.gz` suffix and none of the
/// content attributes.
pub async fn fetch_files(build_files: &CompatModel, owner: &Record) -> ModelResult<Vec<Record>> {
    let prints = canonical_fingerprints(owner);
    debug!(count = prints.len(), "resolving build files");

    let lookups = prints.into_iter().map(|print| async move {
        let mut key = Record::new();
        key.insert("fingerprint".to_string(), Value::from(print.as_str()));
        match build_files.get(&key).await? {
            Some(file) => Ok(strip(file, &print)),
            None => Err(ModelError::MissingBuildFile(print)),
        }
    });
    eager_abort(lookups).await
}

fn strip(mut file: Record, print: &str) -> Record {
    let fingerprint = print
        .strip_suffix(CANONICAL_SUFFIX)
        .unwrap_or(print)
        .to_string();
    file.insert("fingerprint".to_string(), Value::from(fingerprint));
    for field in HEAVY_FIELDS {
        file.remove(field);
    }
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_gz_fingerprints_are_canonical() {
        let build = json!({ "fingerprints": ["a.gz", "a", "b.js", ".gz", "c.min.js.gz"] });
        let prints = canonical_fingerprints(build.as_object().unwrap());
        assert_eq!(prints, ["a.gz", "c.min.js.gz"]);
    }

    #[test]
    fn missing_fingerprints_resolve_to_nothing() {
        assert!(canonical_fingerprints(&Record::new()).is_empty());
    }

    #[test]
    fn strip_drops_heavy_fields() {
        let file = json!({
            "fingerprint": "a.gz",
            "source": "c291cmNl",
            "sourcemap": "bWFw",
            "shrinkwrap": {},
            "url": "https://cdn/a.js"
        });
        let out = strip(file.as_object().cloned().unwrap(), "a.gz");
        assert_eq!(
            Value::Object(out),
            json!({ "fingerprint": "a", "url": "https://cdn/a.js" })
        );
    }
}
