//! Ignore resolution for repository scans.
//!
//! Patterns are shell-style globs matched against repository-relative paths
//! with `/` separators. `*` also crosses directory boundaries, so `*.lock`
//! ignores `a/b/c.lock`. A pattern ending in `/**` additionally ignores the
//! directory named by its prefix and everything below it, which is what lets
//! the walker prune whole subtrees.
//!
//! The effective set is the user patterns from settings followed by the
//! non-comment lines of `.devpilotignore` at the repository root.

use glob::Pattern;
use std::path::Path;
use tracing::{debug, warn};

/// Name of the repo-local ignore file.
pub const REPO_IGNORE_FILE: &str = ".devpilotignore";

/// Patterns used when settings carry none of their own.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/**",
    "node_modules/**",
    "dist/**",
    "build/**",
    ".venv/**",
    ".devpilot_backups/**",
    "*.lock",
    "*.min.*",
];

#[derive(Debug, Clone)]
struct IgnoreRule {
    raw: String,
    glob: Option<Pattern>,
    /// Prefix of a `dir/**` pattern, matched against the path and each of
    /// its ancestors.
    dir_prefix: Option<DirPrefix>,
}

#[derive(Debug, Clone)]
enum DirPrefix {
    Glob(Pattern),
    Literal(String),
}

impl DirPrefix {
    fn matches(&self, candidate: &str) -> bool {
        match self {
            DirPrefix::Glob(pattern) => pattern.matches(candidate),
            DirPrefix::Literal(prefix) => prefix == candidate,
        }
    }
}

impl IgnoreRule {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let pattern = trimmed.strip_prefix('/').unwrap_or(trimmed);
        if pattern.is_empty() {
            return None;
        }

        let glob = match Pattern::new(pattern) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Invalid ignore pattern '{}': {}", pattern, e);
                None
            }
        };

        let dir_prefix = pattern
            .strip_suffix("/**")
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| match Pattern::new(prefix) {
                Ok(p) => DirPrefix::Glob(p),
                Err(_) => DirPrefix::Literal(prefix.to_string()),
            });

        if glob.is_none() && dir_prefix.is_none() {
            return None;
        }

        Some(Self {
            raw: pattern.to_string(),
            glob,
            dir_prefix,
        })
    }

    fn covers_subtree(&self, rel: &str) -> bool {
        let Some(prefix) = &self.dir_prefix else {
            return false;
        };
        ancestors_and_self(rel).any(|candidate| prefix.matches(candidate))
    }

    fn matches(&self, rel: &str) -> bool {
        self.glob.as_ref().is_some_and(|g| g.matches(rel)) || self.covers_subtree(rel)
    }
}

/// `a/b/c` yields `a`, `a/b`, `a/b/c`.
fn ancestors_and_self(rel: &str) -> impl Iterator<Item = &str> {
    rel.match_indices('/')
        .map(move |(idx, _)| &rel[..idx])
        .chain(std::iter::once(rel))
}

/// A compiled set of ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreResolver {
    rules: Vec<IgnoreRule>,
}

impl IgnoreResolver {
    /// Compile the given patterns. Blank and invalid patterns are skipped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = patterns
            .into_iter()
            .filter_map(|p| IgnoreRule::parse(p.as_ref()))
            .collect();
        Self { rules }
    }

    /// Build the effective resolver for a repository: user patterns followed
    /// by the contents of `.devpilotignore`, read fresh from disk.
    pub fn load(root: &Path, user_patterns: &[String]) -> Self {
        let repo_patterns = read_repo_patterns(root);
        debug!(
            user = user_patterns.len(),
            repo = repo_patterns.len(),
            "Loaded ignore patterns"
        );
        Self::new(user_patterns.iter().chain(repo_patterns.iter()))
    }

    /// Whether a repository-relative path is ignored.
    pub fn is_ignored(&self, rel: &str) -> bool {
        !rel.is_empty() && self.rules.iter().any(|rule| rule.matches(rel))
    }

    /// Whether everything below a directory is ignored, so a walk may skip it.
    pub fn is_subtree_ignored(&self, rel_dir: &str) -> bool {
        !rel_dir.is_empty() && self.rules.iter().any(|rule| rule.covers_subtree(rel_dir))
    }

    /// The compiled patterns, in order.
    pub fn patterns(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.raw.as_str()).collect()
    }
}

/// Parse ignore-file content: one pattern per line, blank lines and `#`
/// comments skipped.
pub fn parse_patterns(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Render patterns as ignore-file content.
pub fn render_patterns(patterns: &[String]) -> String {
    let mut content = String::new();
    for pattern in normalize_patterns(patterns) {
        content.push_str(&pattern);
        content.push('\n');
    }
    content
}

/// Trim patterns and drop empty ones.
pub fn normalize_patterns(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read `.devpilotignore` from a repository root.
///
/// A missing or unreadable file contributes no patterns.
pub fn read_repo_patterns(root: &Path) -> Vec<String> {
    let path = root.join(REPO_IGNORE_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_patterns(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read repo ignore file");
            Vec::new()
        }
    }
}
