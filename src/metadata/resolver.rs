//! Resolution of external schema references (`schemaUri`).

use std::future::Future;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::util::{Error, Result};

/// Asynchronous source of schema JSON for a `schemaUri`.
///
/// Implemented for any `Fn(&str) -> impl Future<Output = Result<Value>>`,
/// so a closure can be passed wherever a resolver is expected.
pub trait SchemaResolver {
    fn resolve(&self, uri: &str) -> impl Future<Output = Result<Value>>;
}

impl<F, Fut> SchemaResolver for F
where
    F: Fn(&str) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    fn resolve(&self, uri: &str) -> impl Future<Output = Result<Value>> {
        self(uri)
    }
}

/// Resolves URIs as paths relative to a base directory.
#[derive(Clone, Debug)]
pub struct DirectorySchemaResolver {
    base_dir: PathBuf,
}

impl DirectorySchemaResolver {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self { base_dir: base_dir.as_ref().to_path_buf() }
    }

    #[inline]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl SchemaResolver for DirectorySchemaResolver {
    fn resolve(&self, uri: &str) -> impl Future<Output = Result<Value>> {
        let path = self.base_dir.join(uri);
        let uri = uri.to_string();
        async move {
            tracing::debug!("reading schema {}", path.display());
            let bytes = std::fs::read(&path)
                .map_err(|e| Error::SchemaResolution { uri: uri.clone(), reason: e.to_string() })?;
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::SchemaResolution { uri, reason: e.to_string() })
        }
    }
}

/// Resolver for documents that must not reference external schemas.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSchemaResolver;

impl SchemaResolver for NoSchemaResolver {
    fn resolve(&self, uri: &str) -> impl Future<Output = Result<Value>> {
        futures::future::ready(Err(Error::SchemaResolution {
            uri: uri.to_string(),
            reason: "no schema resolver configured".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_closure_resolver() {
        let resolver = |uri: &str| {
            let uri = uri.to_string();
            async move { Ok::<_, Error>(json!({ "id": uri })) }
        };
        let value = block_on(resolver.resolve("a.json")).unwrap();
        assert_eq!(value["id"], "a.json");
    }

    #[test]
    fn test_directory_resolver() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("schema.json"), br#"{"id":"ext"}"#).unwrap();
        let resolver = DirectorySchemaResolver::new(dir.path());

        let value = block_on(resolver.resolve("schema.json")).unwrap();
        assert_eq!(value["id"], "ext");

        let err = block_on(resolver.resolve("missing.json")).unwrap_err();
        assert!(matches!(err, Error::SchemaResolution { ref uri, .. } if uri == "missing.json"));
    }

    #[test]
    fn test_no_resolver_fails() {
        let err = block_on(NoSchemaResolver.resolve("x")).unwrap_err();
        assert_eq!(err.kind(), crate::util::ErrorKind::Resolution);
    }
}
