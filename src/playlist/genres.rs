//! Genre tag canonicalization.
//!
//! Free-text genre tags from the media server are noisy: "Synth Pop", "synthpop"
//! and "SYNTH-POP" all mean the same thing. The normalizer lowercases and
//! collapses whitespace, then runs a versioned rewrite table over the result.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Broad meta-genres that say little about a track on their own
pub const DEFAULT_IGNORED_GENRES: &[&str] = &[
    "electronic",
    "electronica",
    "pop",
    "rock",
    "pop/rock",
    "club/dance",
    "dance",
    "alternative",
    "other",
    "unknown",
    "misc",
];

/// One textual rewrite. Rules sharing a category are alternatives: the first
/// one that matches wins and the rest of the category is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub category: String,
    pub pattern: String,
    pub replacement: String,
}

impl RewriteRule {
    fn new(category: &str, pattern: &str, replacement: &str) -> Self {
        Self {
            category: category.to_string(),
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Ordered compound-genre rewrites, versioned so a change in taste is traceable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreRewriteTable {
    pub version: u32,
    pub rules: Vec<RewriteRule>,
}

impl Default for GenreRewriteTable {
    fn default() -> Self {
        let rule = RewriteRule::new;
        Self {
            version: 1,
            rules: vec![
                rule("drum-n-bass", "drum and bass", "drum-n-bass"),
                rule("drum-n-bass", "drum-and-bass", "drum-n-bass"),
                rule("drum-n-bass", "drum & bass", "drum-n-bass"),
                rule("drum-n-bass", "drum&bass", "drum-n-bass"),
                rule("drum-n-bass", "drum 'n' bass", "drum-n-bass"),
                rule("drum-n-bass", "drum'n'bass", "drum-n-bass"),
                rule("drum-n-bass", "drum n bass", "drum-n-bass"),
                rule("drum-n-bass", "drumnbass", "drum-n-bass"),
                rule("drum-n-bass", "d'n'b", "drum-n-bass"),
                rule("drum-n-bass", "d&b", "drum-n-bass"),
                rule("drum-n-bass", "dnb", "drum-n-bass"),
                rule("synth-pop", "synth pop", "synth-pop"),
                rule("synth-pop", "synthpop", "synth-pop"),
                rule("synth-pop", "synth/pop", "synth-pop"),
                rule("hip-hop", "hip hop", "hip-hop"),
                rule("hip-hop", "hiphop", "hip-hop"),
                rule("hip-hop", "hip/hop", "hip-hop"),
                rule("trip-hop", "trip hop", "trip-hop"),
                rule("trip-hop", "triphop", "trip-hop"),
                rule("lo-fi", "lo fi", "lo-fi"),
                rule("lo-fi", "lofi", "lo-fi"),
                rule("post-rock", "post rock", "post-rock"),
                rule("post-rock", "postrock", "post-rock"),
                rule("k-pop", "k pop", "k-pop"),
                rule("k-pop", "kpop", "k-pop"),
                rule("r&b", "r and b", "r&b"),
                rule("r&b", "r 'n' b", "r&b"),
                rule("r&b", "rnb", "r&b"),
                rule("pop/rock", "pop rock", "pop/rock"),
                rule("pop/rock", "pop-rock", "pop/rock"),
                rule("singer/songwriter", "singer-songwriter", "singer/songwriter"),
                rule("singer/songwriter", "singer songwriter", "singer/songwriter"),
                rule("club/dance", "club dance", "club/dance"),
                rule("club/dance", "club-dance", "club/dance"),
            ],
        }
    }
}

impl GenreRewriteTable {
    /// Apply each category's first matching rule, categories in table order
    pub fn apply(&self, genre: &str) -> String {
        let mut current = genre.to_string();
        let mut settled: HashSet<&str> = HashSet::new();

        for rule in &self.rules {
            if settled.contains(rule.category.as_str()) {
                continue;
            }
            if let Some(rewritten) = replace_bounded(&current, &rule.pattern, &rule.replacement) {
                current = rewritten;
                settled.insert(rule.category.as_str());
            }
        }

        current
    }
}

/// Replace every occurrence of `pattern` that is not glued to a letter or digit
fn replace_bounded(haystack: &str, pattern: &str, replacement: &str) -> Option<String> {
    if pattern.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    let mut matched = false;

    for (start, _) in haystack.match_indices(pattern) {
        let end = start + pattern.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());

        if before_ok && after_ok {
            out.push_str(&haystack[last..start]);
            out.push_str(replacement);
            last = end;
            matched = true;
        }
    }

    if !matched {
        return None;
    }
    out.push_str(&haystack[last..]);
    Some(out)
}

/// Rewrite table plus ignore list, as carried in the curator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenreConfig {
    pub table: GenreRewriteTable,
    pub ignore: Vec<String>,
}

impl Default for GenreConfig {
    fn default() -> Self {
        Self {
            table: GenreRewriteTable::default(),
            ignore: DEFAULT_IGNORED_GENRES.iter().map(|g| g.to_string()).collect(),
        }
    }
}

/// Canonicalizes genre strings into a stable vocabulary
#[derive(Debug, Clone)]
pub struct GenreNormalizer {
    table: GenreRewriteTable,
    ignore: Vec<String>,
}

impl Default for GenreNormalizer {
    fn default() -> Self {
        Self::new(&GenreConfig::default())
    }
}

impl GenreNormalizer {
    pub fn new(config: &GenreConfig) -> Self {
        Self {
            table: config.table.clone(),
            ignore: config.ignore.clone(),
        }
    }

    pub fn table_version(&self) -> u32 {
        self.table.version
    }

    /// Canonical form of a single genre string; blank input yields ""
    pub fn normalize(&self, raw: &str) -> String {
        let lowered = raw.to_lowercase().replace('\u{2019}', "'");
        let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return collapsed;
        }
        self.table.apply(&collapsed)
    }

    /// Normalize, drop empties, deduplicate and sort ascending
    pub fn normalize_list<S: AsRef<str>>(&self, raws: &[S]) -> Vec<String> {
        raws.iter()
            .map(|raw| self.normalize(raw.as_ref()))
            .filter(|genre| !genre.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Remove ignored meta-genres, unless that would leave nothing
    pub fn filter_meta<S: AsRef<str>>(&self, genres: &[String], ignore_list: &[S]) -> Vec<String> {
        let ignored: HashSet<String> = ignore_list
            .iter()
            .map(|g| self.normalize(g.as_ref()))
            .collect();

        let kept: Vec<String> = genres
            .iter()
            .filter(|genre| !ignored.contains(&self.normalize(genre)))
            .cloned()
            .collect();

        if kept.is_empty() {
            genres.to_vec()
        } else {
            kept
        }
    }

    /// `normalize_list` then `filter_meta` against the configured ignore list
    pub fn process<S: AsRef<str>>(&self, genres: &[S]) -> Vec<String> {
        self.process_with(genres, &self.ignore)
    }

    pub fn process_with<S: AsRef<str>, I: AsRef<str>>(
        &self,
        genres: &[S],
        ignore_list: &[I],
    ) -> Vec<String> {
        self.filter_meta(&self.normalize_list(genres), ignore_list)
    }

    /// Case-insensitive substring match after normalizing both sides
    pub fn matches_filter(&self, genre: &str, filter_term: &str) -> bool {
        self.normalize(genre).contains(&self.normalize(filter_term))
    }

    /// First tag, in the server's order, that survives `process`
    pub fn primary_genre<S: AsRef<str>>(&self, raws: &[S]) -> Option<String> {
        let kept: HashSet<String> = self.process(raws).into_iter().collect();
        raws.iter()
            .map(|raw| self.normalize(raw.as_ref()))
            .find(|genre| kept.contains(genre))
    }
}
