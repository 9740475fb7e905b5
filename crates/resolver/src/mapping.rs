use crate::types::RepositoryRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Package-name prefix to upstream repository table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMapping {
    entries: BTreeMap<String, RepositoryRef>,
}

impl PackageMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>, repo: RepositoryRef) {
        self.entries.insert(prefix.into(), repo);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RepositoryRef)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Longest registered prefix of `name`, matched on `.` boundaries.
    ///
    /// `org.slf4j` covers `org.slf4j.Logger` but not `org.slf4jx.Foo`.
    pub fn resolve(&self, name: &str) -> Option<(&str, &RepositoryRef)> {
        if let Some((prefix, repo)) = self.entries.get_key_value(name) {
            return Some((prefix.as_str(), repo));
        }
        self.entries
            .iter()
            .filter(|(prefix, _)| {
                name.starts_with(prefix.as_str())
                    && name.as_bytes().get(prefix.len()) == Some(&b'.')
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, repo)| (prefix.as_str(), repo))
    }

    pub fn map_dependencies(&self, list: &DependencyList) -> Vec<MappedDependency> {
        list.dependencies
            .iter()
            .map(|dep| {
                let hit = self.resolve(&dep.group_id);
                MappedDependency {
                    dependency: dep.clone(),
                    matched_prefix: hit.map(|(p, _)| p.to_string()),
                    repository: hit.map(|(_, r)| r.clone()),
                }
            })
            .collect()
    }
}

/// Build coordinates of one declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(alias = "groupId")]
    pub group_id: String,
    #[serde(alias = "artifactId")]
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyList {
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedDependency {
    #[serde(flatten)]
    pub dependency: Dependency,
    pub repository: Option<RepositoryRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapping() -> PackageMapping {
        let mut m = PackageMapping::new();
        m.insert("org.apache", "apache/root".parse().unwrap());
        m.insert("org.apache.commons", "apache/commons-lang".parse().unwrap());
        m.insert("cn.hutool", "hutool/hutool".parse().unwrap());
        m
    }

    #[test]
    fn longest_prefix_wins() {
        let m = mapping();
        let (prefix, repo) = m.resolve("org.apache.commons.lang3.StringUtils").unwrap();
        assert_eq!(prefix, "org.apache.commons");
        assert_eq!(repo.full_name(), "apache/commons-lang");

        let (prefix, _) = m.resolve("org.apache.tomcat.Foo").unwrap();
        assert_eq!(prefix, "org.apache");
    }

    #[test]
    fn prefix_respects_segment_boundary() {
        let m = mapping();
        assert!(m.resolve("cn.hutoolx.Foo").is_none());
        assert_eq!(m.resolve("cn.hutool").unwrap().0, "cn.hutool");
    }

    #[test]
    fn maps_dependency_coordinates() {
        let list: DependencyList = serde_json::from_str(
            r#"{"dependencies":[
                {"groupId":"cn.hutool","artifactId":"hutool-all","version":"5.8.0"},
                {"group_id":"com.example","artifact_id":"lib"}
            ]}"#,
        )
        .unwrap();
        let mapped = mapping().map_dependencies(&list);
        assert_eq!(mapped.len(), 2);
        assert_eq!(
            mapped[0].repository.as_ref().map(|r| r.full_name()),
            Some("hutool/hutool".to_string())
        );
        assert_eq!(mapped[1].repository, None);

        let json = serde_json::to_value(&mapped[0]).unwrap();
        assert_eq!(json["group_id"], "cn.hutool");
        assert_eq!(json["repository"], "hutool/hutool");
    }
}
