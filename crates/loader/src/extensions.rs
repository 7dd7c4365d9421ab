//! The set of file extensions that mark a file as a command candidate.

use std::collections::BTreeSet;
use std::path::Path;

use dynacmd_core::LanguageSetup;

/// Case-insensitive, immutable set of command file extensions.
///
/// Built once from the configured languages; there is no way to mutate it
/// after construction. Extensions are stored lowercased without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExtensionSet {
    extensions: BTreeSet<String>,
}

impl CommandExtensionSet {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| normalize(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Union of every extension declared by the given languages.
    pub fn from_languages(languages: &[LanguageSetup]) -> Self {
        Self::new(languages.iter().flat_map(|l| l.extensions.iter()))
    }

    /// Whether `ext` (with or without a leading dot, any case) is recognized.
    pub fn contains(&self, ext: &str) -> bool {
        self.extensions.contains(&normalize(ext))
    }

    /// Whether the path's extension is recognized. Paths without an extension never match.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.contains(e))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

fn normalize(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_ignores_case_and_dots() {
        let set = CommandExtensionSet::new([".PY", "rb"]);
        assert!(set.contains("py"));
        assert!(set.contains(".Py"));
        assert!(set.contains("RB"));
        assert!(!set.contains("js"));

        assert!(set.matches(Path::new("/cmd/Greet.PY")));
        assert!(set.matches(Path::new("/cmd/farewell.rb")));
        assert!(!set.matches(Path::new("/cmd/readme.txt")));
        assert!(!set.matches(Path::new("/cmd/Echo")));
    }

    #[test]
    fn built_from_language_setups() {
        let langs = LanguageSetup::parse_list("python=py,pyw;ruby=rb;other=PY").unwrap();
        let set = CommandExtensionSet::from_languages(&langs);
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["py", "pyw", "rb"]);
    }

    #[test]
    fn empty_entries_are_dropped() {
        let set = CommandExtensionSet::new(["", ".", "  "]);
        assert!(set.is_empty());
    }
}
