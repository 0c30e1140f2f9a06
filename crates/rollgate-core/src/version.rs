//! Semver gate — range parsing and max-satisfying version selection.
//!
//! Clients send npm-style constraints (`^1.2`, `>=1.0.0 <2.0.0`,
//! `1.x || 2.x`). These are normalized into the `semver` crate's
//! comma-separated syntax. A range that still fails to parse degrades to
//! `*`: malformed client input must never take the update channel down.

use std::fmt;

use semver::{Comparator, Op, Version, VersionReq};
use tracing::debug;

/// Canonical text of the match-anything range.
pub const WILDCARD: &str = "*";

/// A parsed version constraint: any of several comparator sets.
#[derive(Debug, Clone, PartialEq)]
pub struct SemverRange {
    text: String,
    alternatives: Vec<VersionReq>,
}

impl SemverRange {
    /// The `*` range.
    pub fn any() -> Self {
        Self {
            text: WILDCARD.to_string(),
            alternatives: vec![VersionReq::STAR],
        }
    }

    /// Parse a range, returning `None` if any alternative is malformed.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let mut alternatives = Vec::new();
        for alt in input.split("||") {
            let normalized = normalize_alternative(alt)?;
            let req = VersionReq::parse(&normalized).ok()?;
            alternatives.push(req);
        }

        // Any alternative without comparators matches every release.
        if alternatives.iter().any(|req| req.comparators.is_empty()) {
            return Some(Self::any());
        }

        Some(Self {
            text: input.to_string(),
            alternatives,
        })
    }

    /// The range actually applied for a caller-supplied constraint.
    ///
    /// Missing, blank and unparsable input all yield `*`.
    pub fn effective(input: Option<&str>) -> Self {
        match input {
            None => Self::any(),
            Some(raw) if raw.trim().is_empty() => Self::any(),
            Some(raw) => Self::parse(raw).unwrap_or_else(|| {
                debug!(range = %raw, "unparsable version range, matching any version");
                Self::any()
            }),
        }
    }

    /// Whether this range places no constraint on the version.
    pub fn is_wildcard(&self) -> bool {
        self.text == WILDCARD
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether `version` satisfies the range.
    ///
    /// With `include_prerelease`, prereleases are compared by plain version
    /// order like npm's `includePrerelease`; otherwise they only match a
    /// comparator naming the same `major.minor.patch`.
    pub fn matches(&self, version: &Version, include_prerelease: bool) -> bool {
        self.alternatives
            .iter()
            .any(|req| req_matches(req, version, include_prerelease))
    }
}

impl Default for SemverRange {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for SemverRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn req_matches(req: &VersionReq, version: &Version, include_prerelease: bool) -> bool {
    if !include_prerelease || version.pre.is_empty() {
        return req.matches(version);
    }
    req.comparators.iter().all(|cmp| compare_in_order(cmp, version))
}

/// Evaluate a comparator by plain version ordering.
///
/// `Comparator::matches` only lets a prerelease through when some comparator
/// names the same `major.minor.patch`. With prereleases requested they are
/// ordered like any other version instead: `<2.0.0` admits `2.0.0-beta.1`,
/// `~1.2.3` does not admit `1.2.3-rc.1`. A partial comparator (`1.2`, `~1`)
/// spans every prerelease of the versions it covers.
fn compare_in_order(cmp: &Comparator, ver: &Version) -> bool {
    match cmp.op {
        Op::Exact | Op::Wildcard => same_as(cmp, ver),
        Op::Greater => above(cmp, ver),
        Op::GreaterEq => same_as(cmp, ver) || above(cmp, ver),
        Op::Less => below(cmp, ver),
        Op::LessEq => same_as(cmp, ver) || below(cmp, ver),
        Op::Tilde => tilde(cmp, ver),
        Op::Caret => caret(cmp, ver),
        _ => cmp.matches(ver),
    }
}

fn same_as(cmp: &Comparator, ver: &Version) -> bool {
    if ver.major != cmp.major {
        return false;
    }
    let Some(minor) = cmp.minor else { return true };
    if ver.minor != minor {
        return false;
    }
    let Some(patch) = cmp.patch else { return true };
    ver.patch == patch && ver.pre == cmp.pre
}

fn above(cmp: &Comparator, ver: &Version) -> bool {
    if ver.major != cmp.major {
        return ver.major > cmp.major;
    }
    let Some(minor) = cmp.minor else { return false };
    if ver.minor != minor {
        return ver.minor > minor;
    }
    let Some(patch) = cmp.patch else { return false };
    if ver.patch != patch {
        return ver.patch > patch;
    }
    ver.pre > cmp.pre
}

fn below(cmp: &Comparator, ver: &Version) -> bool {
    if ver.major != cmp.major {
        return ver.major < cmp.major;
    }
    let Some(minor) = cmp.minor else { return false };
    if ver.minor != minor {
        return ver.minor < minor;
    }
    let Some(patch) = cmp.patch else { return false };
    if ver.patch != patch {
        return ver.patch < patch;
    }
    ver.pre < cmp.pre
}

fn tilde(cmp: &Comparator, ver: &Version) -> bool {
    if ver.major != cmp.major {
        return false;
    }
    let Some(minor) = cmp.minor else { return true };
    if ver.minor != minor {
        return false;
    }
    let Some(patch) = cmp.patch else { return true };
    if ver.patch != patch {
        return ver.patch > patch;
    }
    ver.pre >= cmp.pre
}

fn caret(cmp: &Comparator, ver: &Version) -> bool {
    if ver.major != cmp.major {
        return false;
    }
    let Some(minor) = cmp.minor else { return true };
    let Some(patch) = cmp.patch else {
        return if cmp.major > 0 { ver.minor >= minor } else { ver.minor == minor };
    };
    if cmp.major > 0 {
        if ver.minor != minor {
            return ver.minor > minor;
        }
    } else if ver.minor != minor {
        return false;
    }
    if ver.patch != patch {
        // `^0.0.3` pins the patch; `^0.2.3` and `^1.2.3` float it upward.
        return (cmp.major > 0 || minor > 0) && ver.patch > patch;
    }
    ver.pre >= cmp.pre
}

/// Rewrite one npm-style comparator set into `semver` crate syntax.
///
/// A bare version is an exact pin in npm (`1.2.3`, or `1.2` for all of
/// 1.2.x) but a caret requirement in the `semver` crate, so operator-less
/// versions get an explicit `=`.
fn normalize_alternative(alt: &str) -> Option<String> {
    let tokens: Vec<&str> = alt
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    match tokens.as_slice() {
        [] => return None,
        // Hyphen range: `1.0.0 - 2.0.0`.
        [low, "-", high] => return Some(format!(">={low}, <={high}")),
        _ => {}
    }

    let mut comparators = Vec::with_capacity(tokens.len());
    let mut pending_op = String::new();
    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        if pending_op.is_empty() && is_bare_version(token) {
            pending_op.push('=');
        }
        comparators.push(format!("{pending_op}{token}"));
        pending_op.clear();
    }
    if !pending_op.is_empty() {
        return None;
    }
    Some(comparators.join(", "))
}

/// `1.2.3` or `1.2`, but not an operator form or an `x`/`*` wildcard.
fn is_bare_version(token: &str) -> bool {
    let core = token.split(['-', '+']).next().unwrap_or(token);
    token.starts_with(|c: char| c.is_ascii_digit())
        && !core.split('.').any(|part| matches!(part, "x" | "X" | "*"))
}

/// Parse the valid semver names out of a listing, silently dropping the rest.
pub fn parse_versions<'a, I>(names: I) -> Vec<Version>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter_map(|name| Version::parse(name).ok())
        .collect()
}

/// Highest version in `versions` satisfying `range`.
///
/// Strings that are not valid semver are ignored. Returns `None` when nothing
/// is eligible.
pub fn max_satisfying<'a, I>(versions: I, range: &SemverRange, include_prerelease: bool) -> Option<Version>
where
    I: IntoIterator<Item = &'a str>,
{
    parse_versions(versions)
        .into_iter()
        .filter(|v| range.matches(v, include_prerelease))
        .max()
}
