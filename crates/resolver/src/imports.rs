//! Import/using declarations recognised by name only, no parsing.

use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:import|using)\s+(static\s+)?([A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)(\.\*)?\s*;?\s*$",
    )
    .expect("Invalid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Dotted path as written, without a trailing `.*`.
    pub path: String,
    pub wildcard: bool,
    pub is_static: bool,
}

impl ImportDecl {
    /// Last dotted segment (the imported type for a non-wildcard import).
    pub fn simple_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn package(&self) -> Option<&str> {
        self.path.rsplit_once('.').map(|(pkg, _)| pkg)
    }

    /// Whether it names a single type that can be followed.
    pub fn is_type_import(&self) -> bool {
        !self.wildcard && !self.is_static && self.package().is_some()
    }
}

/// Declarations in source order.
pub fn parse_imports(source: &str) -> Vec<ImportDecl> {
    IMPORT_RE
        .captures_iter(source)
        .filter_map(|caps| {
            let path = caps.get(2)?.as_str().to_string();
            Some(ImportDecl {
                path,
                wildcard: caps.get(3).is_some(),
                is_static: caps.get(1).is_some(),
            })
        })
        .collect()
}

/// First single-type import whose simple name is `class_name`.
pub fn find_import_of<'a>(imports: &'a [ImportDecl], class_name: &str) -> Option<&'a ImportDecl> {
    imports
        .iter()
        .find(|decl| decl.is_type_import() && decl.simple_name() == class_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAVA: &str = "package com.example.web;\n\
        \n\
        import cn.hutool.core.util.StrUtil;\n\
        import static org.junit.Assert.assertTrue;\n\
        import java.util.*;\n\
        import org.springframework.web.filter.OncePerRequestFilter;\n\
        \n\
        public class AuthFilter extends OncePerRequestFilter {}\n";

    #[test]
    fn parses_java_imports_in_order() {
        let imports = parse_imports(JAVA);
        let paths: Vec<_> = imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "cn.hutool.core.util.StrUtil",
                "org.junit.Assert.assertTrue",
                "java.util",
                "org.springframework.web.filter.OncePerRequestFilter",
            ]
        );
        assert!(imports[1].is_static);
        assert!(imports[2].wildcard);
        assert!(!imports[2].is_type_import());
        assert_eq!(imports[0].simple_name(), "StrUtil");
        assert_eq!(imports[0].package(), Some("cn.hutool.core.util"));
    }

    #[test]
    fn parses_csharp_using() {
        let imports = parse_imports("using System.Text;\nusing Newtonsoft.Json;\n");
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[1].simple_name(), "Json");
    }

    #[test]
    fn ignores_imports_inside_code_lines() {
        let imports = parse_imports("String s = \"import a.b.C;\";\n// see import x.y\n");
        assert!(imports.is_empty());
    }

    #[test]
    fn finds_import_by_class() {
        let imports = parse_imports(JAVA);
        let hit = find_import_of(&imports, "StrUtil").unwrap();
        assert_eq!(hit.path, "cn.hutool.core.util.StrUtil");
        assert!(find_import_of(&imports, "Missing").is_none());
    }
}
