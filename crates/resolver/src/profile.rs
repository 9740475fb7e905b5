use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::error::ResolveError;
use crate::mapping::PackageMapping;
use crate::similarity::SimilarityRanker;
use crate::types::RepositoryRef;

const BUILTIN_DEFAULT: &str = include_str!("../../../profiles/default.json");

pub const NAME_PLACEHOLDER: &str = "{name}";

/// Every bound the resolver enforces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolverLimits {
    pub max_fallback: usize,
    pub max_depth: usize,
    pub max_suggestions: usize,
    pub ratio_threshold: f64,
    pub snippet_max_chars: usize,
    pub structure_max_depth: usize,
    pub structure_max_entries: usize,
    /// Depth of the walk behind `find_files`; Maven sources sit far below the root.
    pub finder_max_depth: usize,
    pub finder_limit: usize,
    /// Characters of file content `read_file` returns before cutting.
    pub read_max_chars: usize,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        Self {
            max_fallback: 3,
            max_depth: 5,
            max_suggestions: 5,
            ratio_threshold: 0.6,
            snippet_max_chars: 500,
            structure_max_depth: 3,
            structure_max_entries: 2000,
            finder_max_depth: 12,
            finder_limit: 20,
            read_max_chars: 100_000,
        }
    }
}

impl ResolverLimits {
    pub fn ranker(&self) -> SimilarityRanker {
        SimilarityRanker::new(self.ratio_threshold, self.max_suggestions)
    }

    pub fn validate(&self) -> std::result::Result<(), ResolveError> {
        let positive = [
            ("max_depth", self.max_depth),
            ("max_suggestions", self.max_suggestions),
            ("snippet_max_chars", self.snippet_max_chars),
            ("structure_max_entries", self.structure_max_entries),
            ("finder_max_depth", self.finder_max_depth),
            ("finder_limit", self.finder_limit),
            ("read_max_chars", self.read_max_chars),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ResolveError::Profile(format!(
                    "limits.{field} must be greater than 0"
                )));
            }
        }
        if !(0.0..1.0).contains(&self.ratio_threshold) {
            return Err(ResolveError::Profile(format!(
                "limits.ratio_threshold {} must be in [0, 1)",
                self.ratio_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ResolverProfile {
    name: String,
    description: Option<String>,
    limits: ResolverLimits,
    definition_queries: Vec<String>,
    package_mapping: PackageMapping,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProfile {
    #[serde(default)]
    schema_version: Option<u32>,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    limits: RawLimits,
    #[serde(default)]
    definition_queries: Option<Vec<String>>,
    #[serde(default)]
    package_mappings: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLimits {
    max_fallback: Option<usize>,
    max_depth: Option<usize>,
    max_suggestions: Option<usize>,
    ratio_threshold: Option<f64>,
    snippet_max_chars: Option<usize>,
    structure_max_depth: Option<usize>,
    structure_max_entries: Option<usize>,
    finder_max_depth: Option<usize>,
    finder_limit: Option<usize>,
    read_max_chars: Option<usize>,
}

impl RawLimits {
    fn resolve(self) -> ResolverLimits {
        let d = ResolverLimits::default();
        ResolverLimits {
            max_fallback: self.max_fallback.unwrap_or(d.max_fallback),
            max_depth: self.max_depth.unwrap_or(d.max_depth),
            max_suggestions: self.max_suggestions.unwrap_or(d.max_suggestions),
            ratio_threshold: self.ratio_threshold.unwrap_or(d.ratio_threshold),
            snippet_max_chars: self.snippet_max_chars.unwrap_or(d.snippet_max_chars),
            structure_max_depth: self.structure_max_depth.unwrap_or(d.structure_max_depth),
            structure_max_entries: self.structure_max_entries.unwrap_or(d.structure_max_entries),
            finder_max_depth: self.finder_max_depth.unwrap_or(d.finder_max_depth),
            finder_limit: self.finder_limit.unwrap_or(d.finder_limit),
            read_max_chars: self.read_max_chars.unwrap_or(d.read_max_chars),
        }
    }
}

impl ResolverProfile {
    /// Profile compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_bytes("default", BUILTIN_DEFAULT.as_bytes())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read profile file {}", path.display()))?;
        let fallback = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom");
        Self::from_bytes(fallback, &bytes)
    }

    pub fn from_bytes(profile_name: &str, bytes: &[u8]) -> Result<Self> {
        let raw: RawProfile = serde_json::from_slice(bytes)
            .with_context(|| format!("Profile '{profile_name}' is not valid JSON configuration"))?;
        Self::from_raw(raw, profile_name)
    }

    fn from_raw(raw: RawProfile, fallback_name: &str) -> Result<Self> {
        if let Some(schema_version) = raw.schema_version {
            if schema_version != 1 {
                return Err(anyhow!(
                    "profile.schema_version {schema_version} is not supported (expected 1)"
                ));
            }
        }

        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        let limits = raw.limits.resolve();
        limits
            .validate()
            .with_context(|| format!("Invalid limits for profile '{name}'"))?;

        let definition_queries = match raw.definition_queries {
            Some(queries) => queries,
            None => vec![
                "class {name}".to_string(),
                "interface {name}".to_string(),
                "enum {name}".to_string(),
            ],
        };
        validate_queries(&definition_queries)
            .with_context(|| format!("Invalid definition_queries for profile '{name}'"))?;

        let mut package_mapping = PackageMapping::new();
        for (prefix, repo) in raw.package_mappings {
            if prefix.trim().is_empty() || prefix.starts_with('.') || prefix.ends_with('.') {
                return Err(anyhow!("package_mappings key '{prefix}' is not a package name"));
            }
            let repo: RepositoryRef = repo
                .parse()
                .with_context(|| format!("package_mappings.{prefix}"))?;
            package_mapping.insert(prefix, repo);
        }

        Ok(Self {
            name,
            description: raw.description,
            limits,
            definition_queries,
            package_mapping,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn limits(&self) -> &ResolverLimits {
        &self.limits
    }

    pub fn with_limits(mut self, limits: ResolverLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn definition_queries(&self) -> &[String] {
        &self.definition_queries
    }

    pub fn package_mapping(&self) -> &PackageMapping {
        &self.package_mapping
    }
}

fn validate_queries(queries: &[String]) -> Result<()> {
    if queries.is_empty() {
        return Err(anyhow!("at least one query template is required"));
    }
    for query in queries {
        if !query.contains(NAME_PLACEHOLDER) {
            return Err(anyhow!("template '{query}' has no {NAME_PLACEHOLDER} placeholder"));
        }
    }
    Ok(())
}
