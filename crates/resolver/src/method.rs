use crate::cancel::CancelSignal;
use crate::error::{ResolveError, Result};
use crate::imports::{find_import_of, parse_imports};
use crate::mapping::PackageMapping;
use crate::source::RepositorySource;
use crate::types::{RepositoryRef, SearchHit, SearchScope};
use navigator_protocol::truncate_chars;
use serde::Serialize;
use std::sync::Arc;

pub const MAX_USAGES: usize = 5;
pub const USAGE_SNIPPET_CHARS: usize = 200;
pub const IMPLEMENTATION_SNIPPET_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Dotted package when the signature was fully qualified.
    pub package: Option<String>,
    pub class_name: String,
    pub method_name: String,
}

impl MethodSignature {
    /// Accepts `Class.method`, `pkg.Class.method` and an optional `(...)` suffix.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || ResolveError::InvalidRequest(format!("expected Class.method, got '{raw}'"));
        let head = raw.trim().split('(').next().unwrap_or_default().trim();
        let (owner, method) = head.rsplit_once('.').ok_or_else(invalid)?;
        let (package, class) = match owner.rsplit_once('.') {
            Some((pkg, class)) => (Some(pkg.to_string()), class),
            None => (None, owner),
        };
        if class.is_empty() || method.is_empty() || package.as_deref() == Some("") {
            return Err(invalid());
        }
        Ok(Self {
            package,
            class_name: class.to_string(),
            method_name: method.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodUsage {
    pub path: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodImplementation {
    pub repository: RepositoryRef,
    pub path: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodTrace {
    pub repository: RepositoryRef,
    pub method: String,
    pub class_name: String,
    pub method_name: String,
    pub usages: Vec<MethodUsage>,
    pub source_package: Option<String>,
    pub upstream: Option<RepositoryRef>,
    pub implementation: Option<MethodImplementation>,
}

/// Locates where a library method is called and where its upstream body lives.
#[derive(Clone)]
pub struct MethodTracer {
    source: Arc<dyn RepositorySource>,
    mapping: Arc<PackageMapping>,
}

impl MethodTracer {
    pub fn new(source: Arc<dyn RepositorySource>, mapping: Arc<PackageMapping>) -> Self {
        Self { source, mapping }
    }

    pub async fn trace(
        &self,
        repo: &RepositoryRef,
        signature: &str,
        cancel: &CancelSignal,
    ) -> Result<MethodTrace> {
        let sig = MethodSignature::parse(signature)?;

        let hits = self.search(repo, &sig.method_name, cancel).await?;
        let usages: Vec<MethodUsage> = hits
            .iter()
            .take(MAX_USAGES)
            .map(|hit| MethodUsage {
                path: hit.path.clone(),
                snippet: truncate_chars(&hit.snippet, USAGE_SNIPPET_CHARS).0,
            })
            .collect();

        let source_package = match &sig.package {
            Some(pkg) => Some(pkg.clone()),
            None => self.identify_package(repo, &usages, &sig.class_name, cancel).await?,
        };

        let upstream = source_package
            .as_deref()
            .and_then(|pkg| self.mapping.resolve(pkg))
            .map(|(_, r)| r.clone());

        let implementation = match &upstream {
            Some(upstream) => {
                let query = format!("{}(", sig.method_name);
                self.search(upstream, &query, cancel)
                    .await?
                    .into_iter()
                    .next()
                    .map(|hit| MethodImplementation {
                        repository: upstream.clone(),
                        path: hit.path,
                        snippet: truncate_chars(&hit.snippet, IMPLEMENTATION_SNIPPET_CHARS).0,
                    })
            }
            None => None,
        };

        log::info!(
            "trace method {signature} in {repo}: {} usage(s), upstream {}",
            usages.len(),
            upstream.as_ref().map(|r| r.full_name()).unwrap_or_else(|| "-".to_string())
        );

        Ok(MethodTrace {
            repository: repo.clone(),
            method: signature.trim().to_string(),
            class_name: sig.class_name,
            method_name: sig.method_name,
            usages,
            source_package,
            upstream,
            implementation,
        })
    }

    async fn search(
        &self,
        repo: &RepositoryRef,
        query: &str,
        cancel: &CancelSignal,
    ) -> Result<Vec<SearchHit>> {
        let scope = SearchScope::default();
        match cancel.run(self.source.search_text(repo, query, &scope)).await? {
            Ok(hits) => Ok(hits),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Package of the first `import ...Class;` found in a usage file.
    async fn identify_package(
        &self,
        repo: &RepositoryRef,
        usages: &[MethodUsage],
        class_name: &str,
        cancel: &CancelSignal,
    ) -> Result<Option<String>> {
        let mut seen: Vec<&str> = Vec::new();
        for usage in usages {
            if seen.contains(&usage.path.as_str()) {
                continue;
            }
            seen.push(&usage.path);

            let bytes = match cancel.run(self.source.read_file(repo, &usage.path, None)).await? {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err.into()),
            };
            let text = String::from_utf8_lossy(&bytes);
            let imports = parse_imports(&text);
            if let Some(decl) = find_import_of(&imports, class_name) {
                return Ok(decl.package().map(str::to_string));
            }
        }
        Ok(None)
    }
}
