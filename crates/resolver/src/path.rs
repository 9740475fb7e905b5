//! Repository-relative path helpers. The repository root is the empty path.

pub fn normalize(raw: &str) -> String {
    let raw = raw.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

pub fn is_root(path: &str) -> bool {
    path.is_empty()
}

/// Parent of a normalized path; `None` for the root.
pub fn parent_of(path: &str) -> Option<String> {
    if is_root(path) {
        return None;
    }
    Some(match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    })
}

pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn join(base: &str, segment: &str) -> String {
    if is_root(base) {
        segment.to_string()
    } else {
        format!("{base}/{segment}")
    }
}

pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// True when `path` equals `prefix` or lives below it.
pub fn is_within(prefix: &str, path: &str) -> bool {
    if is_root(prefix) || path == prefix {
        return true;
    }
    if !path.starts_with(prefix) {
        return false;
    }
    path.as_bytes().get(prefix.len()) == Some(&b'/')
}

pub fn display(path: &str) -> &str {
    if is_root(path) {
        "/"
    } else {
        path
    }
}

/// Include/exclude prefixes plus an optional substring or glob pattern.
#[derive(Debug, Clone, Default)]
pub struct PathFilters {
    include_paths: Vec<String>,
    exclude_paths: Vec<String>,
    file_pattern: Option<String>,
}

impl PathFilters {
    pub fn new(include_paths: &[String], exclude_paths: &[String], file_pattern: Option<&str>) -> Self {
        let clean = |paths: &[String]| {
            paths
                .iter()
                .map(|p| normalize(p))
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            include_paths: clean(include_paths),
            exclude_paths: clean(exclude_paths),
            file_pattern: file_pattern
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.include_paths.is_empty() || !self.exclude_paths.is_empty() || self.file_pattern.is_some()
    }

    pub fn allows(&self, path: &str) -> bool {
        if !self.include_paths.is_empty() && !self.include_paths.iter().any(|p| is_within(p, path)) {
            return false;
        }
        if self.exclude_paths.iter().any(|p| is_within(p, path)) {
            return false;
        }
        matches_file_pattern(path, self.file_pattern.as_deref())
    }
}

fn matches_file_pattern(path: &str, pattern: Option<&str>) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };

    if !pattern.contains('*') && !pattern.contains('?') {
        return path.contains(pattern);
    }

    glob::Pattern::new(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_noise() {
        assert_eq!(normalize("/src//filter/./AuthFilter.java/"), "src/filter/AuthFilter.java");
        assert_eq!(normalize("src\\main"), "src/main");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("  /  "), "");
        assert_eq!(normalize("../.."), "");
    }

    #[test]
    fn parent_walks_to_root() {
        assert_eq!(parent_of("a/b/c").as_deref(), Some("a/b"));
        assert_eq!(parent_of("a").as_deref(), Some(""));
        assert_eq!(parent_of(""), None);
    }

    #[test]
    fn within_is_segment_aware() {
        assert!(is_within("src", "src/lib.rs"));
        assert!(is_within("src", "src"));
        assert!(is_within("", "anything"));
        assert!(!is_within("src", "src2/lib.rs"));
    }

    #[test]
    fn filters_combine_prefix_and_pattern() {
        let filters = PathFilters::new(
            &["src".to_string()],
            &["src/gen".to_string()],
            Some("*.java"),
        );
        assert!(filters.is_active());
        assert!(filters.allows("src/main/App.java"));
        assert!(!filters.allows("src/gen/Stub.java"));
        assert!(!filters.allows("docs/App.java"));
        assert!(!filters.allows("src/main/App.kt"));
    }

    #[test]
    fn blank_filters_are_inactive() {
        let filters = PathFilters::new(&["".to_string(), "./".to_string()], &[], Some("  "));
        assert!(!filters.is_active());
        assert!(filters.allows("README.md"));
    }
}
