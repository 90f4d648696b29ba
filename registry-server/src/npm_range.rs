//! npm version constraint handling.
//!
//! npm ranges are translated into one or more [`semver::VersionReq`]
//! alternatives (one per `||` branch). Version selection always picks the
//! highest published version that satisfies any alternative.

use semver::{Version, VersionReq};
use std::collections::HashMap;

/// A dependency constraint as understood by the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Any of the requirements may match.
    Ranges(Vec<VersionReq>),
    /// A dist-tag such as `latest` or `next`.
    Tag(String),
}

const NON_REGISTRY_PREFIXES: &[&str] = &[
    "git:",
    "git+",
    "github:",
    "http:",
    "https:",
    "file:",
    "link:",
    "workspace:",
    "portal:",
];

/// Split an `npm:<name>@<range>` alias into its target name and range.
pub fn split_alias(constraint: &str) -> Option<(&str, &str)> {
    let target = constraint.trim().strip_prefix("npm:")?;
    // Scoped targets start with '@', so search for the separator after it.
    let search_from = usize::from(target.starts_with('@'));
    match target[search_from..].find('@') {
        Some(at) => {
            let at = at + search_from;
            Some((&target[..at], &target[at + 1..]))
        }
        None => Some((target, "")),
    }
}

/// Parse an npm constraint. Returns `None` for specifiers that do not refer
/// to registry versions (git, URLs, local paths, GitHub shorthands).
pub fn parse_constraint(raw: &str) -> Option<Constraint> {
    let raw = raw.trim();

    if NON_REGISTRY_PREFIXES.iter().any(|p| raw.starts_with(p)) || raw.contains('/') {
        return None;
    }

    let mut alternatives = Vec::new();
    for branch in raw.split("||") {
        match canonicalize_branch(branch).and_then(|c| VersionReq::parse(&c).ok()) {
            Some(req) => alternatives.push(req),
            None => {
                return is_tag(raw).then(|| Constraint::Tag(raw.to_string()));
            }
        }
    }

    Some(Constraint::Ranges(alternatives))
}

fn is_tag(raw: &str) -> bool {
    raw.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() && c != 'v')
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Rewrite one `||` branch of an npm range into `semver` crate syntax.
fn canonicalize_branch(branch: &str) -> Option<String> {
    let branch = branch.trim();
    if branch.is_empty() || matches!(branch, "*" | "x" | "X") {
        return Some("*".to_string());
    }

    // Hyphen range: "1.2.3 - 2.3.4"
    if let Some((low, high)) = branch.split_once(" - ") {
        let low = strip_v(low.trim());
        let high = strip_v(high.trim());
        if low.is_empty() || high.is_empty() {
            return None;
        }
        return Some(format!(">={low}, <={high}"));
    }

    // Re-attach operators written apart from their version (">= 1.2.3").
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in branch.split_whitespace() {
        if matches!(token, ">=" | "<=" | ">" | "<" | "=" | "^" | "~") {
            pending_op = Some(token);
            continue;
        }
        let token = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };
        comparators.push(canonicalize_comparator(&token));
    }
    if pending_op.is_some() || comparators.is_empty() {
        return None;
    }

    Some(comparators.join(", "))
}

fn canonicalize_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| c.is_ascii_alphanumeric() || c == '*')
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = strip_v(version);
    let op = if op == "~>" { "~" } else { op };

    if op.is_empty() {
        // npm treats a bare version as exact; partial and wildcard versions
        // keep their x-range meaning.
        let core = version
            .split(|c| c == '-' || c == '+')
            .next()
            .unwrap_or(version);
        if core.contains(&['x', 'X', '*'][..]) {
            version.to_string()
        } else {
            format!("={version}")
        }
    } else {
        format!("{op}{version}")
    }
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

/// Pick the highest version in `versions` satisfying `constraint`.
///
/// Versions that are not valid semver are ignored. Dist-tags resolve through
/// `dist_tags` and must name a listed version.
pub fn select_version<'a, I>(
    versions: I,
    dist_tags: &HashMap<String, String>,
    constraint: &Constraint,
) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    match constraint {
        Constraint::Tag(tag) => {
            let tagged = dist_tags.get(tag)?;
            versions
                .into_iter()
                .find(|v| *v == tagged.as_str())
                .map(str::to_string)
        }
        Constraint::Ranges(alternatives) => versions
            .into_iter()
            .filter_map(|raw| Version::parse(raw).ok().map(|v| (v, raw)))
            .filter(|(v, _)| alternatives.iter().any(|req| req.matches(v)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, raw)| raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLISHED: &[&str] = &[
        "0.9.0",
        "1.0.0",
        "1.2.3",
        "1.4.0",
        "1.9.9",
        "2.0.0-beta.1",
        "2.0.0",
        "2.3.1",
        "3.0.0",
        "not-a-version",
    ];

    fn pick(constraint: &str) -> Option<String> {
        let mut tags = HashMap::new();
        tags.insert("latest".to_string(), "2.3.1".to_string());
        tags.insert("next".to_string(), "2.0.0-beta.1".to_string());
        let parsed = parse_constraint(constraint)?;
        select_version(PUBLISHED.iter().copied(), &tags, &parsed)
    }

    #[test]
    fn test_caret_and_tilde_pick_highest() {
        assert_eq!(pick("^1.0.0").as_deref(), Some("1.9.9"));
        assert_eq!(pick("~1.2.0").as_deref(), Some("1.2.3"));
        assert_eq!(pick("^2.0.0").as_deref(), Some("2.3.1"));
    }

    #[test]
    fn test_bare_versions_are_exact() {
        assert_eq!(pick("1.2.3").as_deref(), Some("1.2.3"));
        assert_eq!(pick("v1.4.0").as_deref(), Some("1.4.0"));
        assert_eq!(pick("1.2.4"), None);
        assert_eq!(pick("1").as_deref(), Some("1.9.9"));
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(pick("*").as_deref(), Some("3.0.0"));
        assert_eq!(pick("").as_deref(), Some("3.0.0"));
        assert_eq!(pick("1.x").as_deref(), Some("1.9.9"));
        assert_eq!(pick("2.3.x").as_deref(), Some("2.3.1"));
    }

    #[test]
    fn test_comparator_sets_and_alternatives() {
        assert_eq!(pick(">=1.0.0 <2.0.0").as_deref(), Some("1.9.9"));
        assert_eq!(pick(">= 1.2.0 < 1.5").as_deref(), Some("1.4.0"));
        assert_eq!(pick("^0.9.0 || ~1.2.0").as_deref(), Some("1.2.3"));
        assert_eq!(pick("1.0.0 - 1.4.0").as_deref(), Some("1.4.0"));
        assert_eq!(pick(">4.0.0"), None);
    }

    #[test]
    fn test_prereleases_need_explicit_opt_in() {
        assert_eq!(pick(">=2.0.0-beta.0 <2.0.0").as_deref(), Some("2.0.0-beta.1"));
        assert_eq!(pick("<2.0.0").as_deref(), Some("1.9.9"));
    }

    #[test]
    fn test_dist_tags() {
        assert_eq!(pick("latest").as_deref(), Some("2.3.1"));
        assert_eq!(pick("next").as_deref(), Some("2.0.0-beta.1"));
        assert_eq!(pick("canary"), None);
    }

    #[test]
    fn test_non_registry_specifiers() {
        assert_eq!(parse_constraint("git+https://github.com/a/b.git"), None);
        assert_eq!(parse_constraint("file:../local"), None);
        assert_eq!(parse_constraint("expressjs/express"), None);
        assert_eq!(parse_constraint(">=>=1"), None);
    }

    #[test]
    fn test_split_alias() {
        assert_eq!(split_alias("npm:lodash@^4.0.0"), Some(("lodash", "^4.0.0")));
        assert_eq!(
            split_alias("npm:@types/node@18.x"),
            Some(("@types/node", "18.x"))
        );
        assert_eq!(split_alias("npm:left-pad"), Some(("left-pad", "")));
        assert_eq!(split_alias("^1.0.0"), None);
    }
}
