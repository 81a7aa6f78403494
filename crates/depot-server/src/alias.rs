//! Alias allocator
//!
//! Aliases are unique per workspace. Without a pattern we generate
//! four-word human-readable ids; with a pattern we substitute each
//! `{placeholder}` from the parent's `id_parts` pools. Candidates are
//! probed in one batched existence query; the unique constraint on
//! `(workspace, alias)` remains the final arbiter.

use depot_core::{Error, Result, MAX_ALIAS_ATTEMPTS, MAX_ALIAS_CANDIDATES};
use depot_metadata::ArtifactRepository;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "daring", "eager", "fancy", "gentle", "happy", "icy", "jolly",
    "keen", "lively", "mellow", "nimble", "odd", "proud", "quiet", "rapid", "shiny", "tidy",
    "upbeat", "vivid", "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "comet", "dolphin", "ember", "falcon", "garden", "harbor", "island", "jungle",
    "kestrel", "lagoon", "meadow", "nebula", "otter", "prairie", "quartz", "river", "summit",
    "thicket", "urchin", "valley", "walnut", "yarrow", "zephyr",
];

const VERBS: &[&str] = &[
    "bakes", "carries", "dances", "echoes", "floats", "gathers", "hops", "invents", "jumps",
    "kneels", "laughs", "migrates", "nests", "orbits", "paints", "quivers", "roams", "sails",
    "travels", "unfolds", "vaults", "wanders", "yields", "zooms",
];

const ADVERBS: &[&str] = &[
    "boldly", "calmly", "daily", "early", "freely", "gladly", "hourly", "inward", "jointly",
    "kindly", "lightly", "mildly", "neatly", "openly", "proudly", "quickly", "rarely", "slowly",
    "timely", "upward", "vastly", "warmly", "yearly", "zealously",
];

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").unwrap());

fn choose(words: &[&str]) -> String {
    let mut rng = rand::thread_rng();
    words
        .choose(&mut rng)
        .map(|w| w.to_string())
        .unwrap_or_default()
}

fn hrid() -> String {
    format!(
        "{}-{}-{}-{}",
        choose(ADJECTIVES),
        choose(NOUNS),
        choose(VERBS),
        choose(ADVERBS)
    )
}

fn part_value(parts: &Map<String, JsonValue>, name: &str) -> String {
    match parts.get(name) {
        Some(JsonValue::Array(pool)) => {
            let mut rng = rand::thread_rng();
            pool.as_slice()
                .choose(&mut rng)
                .map(render_scalar)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
        }
        Some(value) => render_scalar(value),
        None => uuid::Uuid::new_v4().to_string(),
    }
}

fn render_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Generate up to `max_candidates` aliases for one probe round.
pub fn candidate_aliases(
    pattern: Option<&str>,
    parts: &Map<String, JsonValue>,
    max_candidates: usize,
) -> Vec<String> {
    let pattern = match pattern {
        None => return (0..max_candidates).map(|_| hrid()).collect(),
        Some(p) => p,
    };
    let placeholders: Vec<String> = PLACEHOLDER
        .captures_iter(pattern)
        .map(|c| c[1].to_string())
        .collect();
    if placeholders.is_empty() {
        return vec![pattern.to_string()];
    }

    let mut candidates = std::collections::HashSet::new();
    let mut attempts = 0;
    while candidates.len() < max_candidates && attempts < max_candidates * 10 {
        attempts += 1;
        let mut alias = pattern.to_string();
        for placeholder in &placeholders {
            alias = alias.replace(
                &format!("{{{}}}", placeholder),
                &part_value(parts, placeholder),
            );
        }
        candidates.insert(alias);
    }
    candidates.into_iter().collect()
}

/// Reserve a unique alias in `workspace`, retrying with fresh candidate
/// batches until one survives the existence probe.
pub async fn generate_unique_alias(
    repo: &dyn ArtifactRepository,
    workspace: &str,
    pattern: Option<&str>,
    parts: &Map<String, JsonValue>,
) -> Result<String> {
    for _ in 0..MAX_ALIAS_ATTEMPTS {
        let candidates = candidate_aliases(pattern, parts, MAX_ALIAS_CANDIDATES);
        let taken = repo.existing_aliases(workspace, &candidates).await?;
        if let Some(alias) = candidates.into_iter().find(|c| !taken.contains(c)) {
            return Ok(alias);
        }
    }
    Err(Error::Internal(
        "Could not generate a unique alias within the maximum attempts".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parts(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_hrid_shape() {
        let alias = hrid();
        let words: Vec<&str> = alias.split('-').collect();
        assert_eq!(words.len(), 4);
        assert!(ADJECTIVES.contains(&words[0]));
        assert!(NOUNS.contains(&words[1]));
        assert!(VERBS.contains(&words[2]));
        assert!(ADVERBS.contains(&words[3]));
    }

    #[test]
    fn test_pattern_without_placeholders() {
        let candidates = candidate_aliases(Some("fixed-name"), &Map::new(), 10);
        assert_eq!(candidates, vec!["fixed-name".to_string()]);
    }

    #[test]
    fn test_pattern_draws_from_pools() {
        let parts = parts(json!({"kind": ["fish", "bird"]}));
        let candidates = candidate_aliases(Some("pet-{kind}"), &parts, 10);
        for candidate in &candidates {
            assert!(candidate == "pet-fish" || candidate == "pet-bird");
        }
    }

    #[test]
    fn test_pattern_scalar_part() {
        let parts = parts(json!({"site": "lab-1"}));
        let candidates = candidate_aliases(Some("{site}-run"), &parts, 10);
        assert_eq!(candidates, vec!["lab-1-run".to_string()]);
    }

    #[test]
    fn test_unknown_placeholder_uses_uuid() {
        let candidates = candidate_aliases(Some("run-{batch}"), &Map::new(), 10);
        for candidate in &candidates {
            let suffix = candidate.strip_prefix("run-").unwrap();
            assert!(depot_core::utils::is_uuid_shaped(suffix));
        }
    }
}
