/// Path roots treated as static-asset references for mount rewriting.
pub const DEFAULT_ASSET_PREFIXES: &[&str] = &[
    "/assets/", "/static/", "/build/", "/_astro/", "/_next/", "/fonts/",
];

/// Normalized set of asset path roots, each of the form `/X/`.
#[derive(Debug, Clone)]
pub struct AssetPrefixSet {
    prefixes: Vec<String>,
}

impl Default for AssetPrefixSet {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_ASSET_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl AssetPrefixSet {
    /// Defaults merged with user-supplied extras.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for prefix in extra {
            set.insert(prefix.as_ref());
        }
        set
    }

    pub fn insert(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let normalized = normalize_prefix(raw);
        if !self.prefixes.contains(&normalized) {
            self.prefixes.push(normalized);
        }
    }

    /// Whether `path` begins with one of the asset roots.
    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Prefix bodies (anchoring slashes stripped, regex-escaped) joined
    /// into an alternation, e.g. `assets|static|build`.
    pub fn alternation(&self) -> String {
        self.prefixes
            .iter()
            .map(|p| regex::escape(p.trim_matches('/')))
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = String::with_capacity(raw.len() + 2);
    if !raw.starts_with('/') {
        prefix.push('/');
    }
    prefix.push_str(raw);
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}
