//! Applicability predicates: attribute filters and when-expressions.
//!
//! A catalog node applies to a host when its filter set matches the host's
//! [`FilterContext`] and its when-expression (if any) renders to the literal
//! string `"true"`. Both predicates are open-by-default: an absent filter
//! list and an empty when-expression always match.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;

use crate::host::FilterContext;

use super::package::Package;

/// A single include/exclude predicate over host attributes.
///
/// Matches iff every include pattern matches its attribute's value and no
/// exclude pattern matches its attribute's value. Attribute names outside
/// the known set (`os`, `distro`, `hostname`, `user`) resolve to the empty
/// string and therefore fail any non-empty include pattern.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    /// Patterns every one of which must match its attribute.
    #[serde(default)]
    pub include: BTreeMap<String, String>,
    /// Patterns none of which may match its attribute.
    #[serde(default)]
    pub exclude: BTreeMap<String, String>,
}

/// Filter evaluation engine with an instance-owned pattern cache.
///
/// Patterns are anchored as `^(pattern)$` and evaluated as regular
/// expressions, so exact literals and alternation (`"ubuntu|debian"`) work
/// uniformly. A pattern that fails to compile falls back to byte-exact
/// string equality rather than erroring, since config authors may
/// legitimately write non-regex punctuation. Compiled matchers are cached
/// keyed by the anchored pattern string; the cache is never invalidated
/// (catalog patterns are a small closed set).
#[derive(Debug, Default)]
pub struct Matcher {
    /// Anchored pattern → compiled regex, or `None` for invalid patterns.
    cache: Mutex<HashMap<String, Option<Regex>>>,
}

impl Matcher {
    /// Create a matcher with an empty pattern cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a single filter against the host context.
    #[must_use]
    pub fn matches(&self, filter: &Filter, ctx: &FilterContext) -> bool {
        let include_ok = filter
            .include
            .iter()
            .all(|(attr, pattern)| self.matches_pattern(pattern, ctx.attribute(attr)));
        let exclude_ok = filter
            .exclude
            .iter()
            .all(|(attr, pattern)| !self.matches_pattern(pattern, ctx.attribute(attr)));
        include_ok && exclude_ok
    }

    /// Evaluate a filter set: OR over filters, vacuously true when empty.
    #[must_use]
    pub fn matches_any(&self, filters: &[Filter], ctx: &FilterContext) -> bool {
        filters.is_empty() || filters.iter().any(|f| self.matches(f, ctx))
    }

    /// Match a single anchored pattern against a value.
    #[must_use]
    pub fn matches_pattern(&self, pattern: &str, value: &str) -> bool {
        let anchored = format!("^({pattern})$");
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let compiled = cache
            .entry(anchored.clone())
            .or_insert_with(|| Regex::new(&anchored).ok());
        match compiled {
            Some(re) => re.is_match(value),
            // Invalid regex: byte-exact comparison against the raw pattern.
            None => pattern == value,
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_pattern_count(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

/// Capability that renders a when-expression template to a string.
///
/// Injected so the engine stays decoupled from any particular templating
/// technology; the CLI supplies [`HostRenderer`].
pub trait WhenRenderer: fmt::Debug {
    /// Render the template to its final string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be rendered; the caller
    /// treats this as a non-match, never as a fatal failure.
    fn render(&self, template: &str) -> Result<String>;
}

/// Evaluate a when-expression against an optional renderer.
///
/// The contract is deliberately strict: only the exact trimmed literal
/// `"true"` matches, so a template that accidentally renders a truthy-looking
/// value (a non-empty OS name, `"TRUE"`, `"1"`) does not silently apply.
/// Empty or whitespace-only expressions always match; a missing renderer or
/// a render error never does.
#[must_use]
pub fn evaluate_when(when: &str, renderer: Option<&dyn WhenRenderer>) -> bool {
    if when.trim().is_empty() {
        return true;
    }
    let Some(renderer) = renderer else {
        return false;
    };
    match renderer.render(when) {
        Ok(rendered) => rendered.trim() == "true",
        Err(e) => {
            tracing::debug!("when-expression '{when}' failed to render: {e}");
            false
        }
    }
}

/// Combined applicability check used by the entry selector.
pub(crate) fn applies(
    matcher: &Matcher,
    filters: &[Filter],
    when: Option<&str>,
    ctx: &FilterContext,
    renderer: Option<&dyn WhenRenderer>,
) -> bool {
    matcher.matches_any(filters, ctx) && evaluate_when(when.unwrap_or(""), renderer)
}

/// Keep only the packages whose own filters/when match the host.
#[must_use]
pub fn filter_packages(
    packages: Vec<Package>,
    matcher: &Matcher,
    ctx: &FilterContext,
    renderer: Option<&dyn WhenRenderer>,
) -> Vec<Package> {
    packages
        .into_iter()
        .filter(|p| applies(matcher, &p.filters, p.when.as_deref(), ctx, renderer))
        .collect()
}

/// Minimal when-expression renderer over host attributes.
///
/// Supports `{{ attr }}` substitution and `{{ attr == "literal" }}` /
/// `{{ attr != "literal" }}` comparisons, which render to `true` or `false`.
/// Text outside `{{ }}` passes through unchanged. Unknown attributes resolve
/// to the empty string, consistent with filter matching.
#[derive(Debug)]
pub struct HostRenderer<'a> {
    ctx: &'a FilterContext,
}

impl<'a> HostRenderer<'a> {
    /// Create a renderer bound to the given host context.
    #[must_use]
    pub fn new(ctx: &'a FilterContext) -> Self {
        Self { ctx }
    }

    fn evaluate_expression(&self, expr: &str) -> Result<String> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        match tokens.as_slice() {
            [attr] => Ok(self.ctx.attribute(attr).to_string()),
            [attr, op, literal] => {
                let value = self.ctx.attribute(attr);
                let literal = literal.trim_matches(|c| c == '"' || c == '\'');
                let result = match *op {
                    "==" => value == literal,
                    "!=" => value != literal,
                    _ => anyhow::bail!("unsupported operator '{op}' in '{expr}'"),
                };
                Ok(result.to_string())
            }
            _ => anyhow::bail!("malformed expression '{expr}'"),
        }
    }
}

impl WhenRenderer for HostRenderer<'_> {
    fn render(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            let Some(head) = rest.get(..start) else { break };
            out.push_str(head);
            let Some(after_open) = rest.get(start + 2..) else {
                anyhow::bail!("unterminated '{{{{' in '{template}'");
            };
            let Some(end) = after_open.find("}}") else {
                anyhow::bail!("unterminated '{{{{' in '{template}'");
            };
            let expr = after_open.get(..end).unwrap_or("");
            out.push_str(&self.evaluate_expression(expr)?);
            rest = after_open.get(end + 2..).unwrap_or("");
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ctx() -> FilterContext {
        FilterContext {
            os: "linux".to_string(),
            distro: "arch".to_string(),
            hostname: "work-laptop".to_string(),
            user: "alice".to_string(),
        }
    }

    fn filter(include: &[(&str, &str)], exclude: &[(&str, &str)]) -> Filter {
        Filter {
            include: include
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            exclude: exclude
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Filter matching
    // -----------------------------------------------------------------------

    #[test]
    fn include_only_matches_when_all_conditions_hold() {
        let m = Matcher::new();
        let f = filter(&[("os", "linux"), ("distro", "arch")], &[]);
        assert!(m.matches(&f, &ctx()));
    }

    #[test]
    fn include_fails_when_any_condition_fails() {
        let m = Matcher::new();
        let f = filter(&[("os", "linux"), ("distro", "ubuntu")], &[]);
        assert!(!m.matches(&f, &ctx()));
    }

    #[test]
    fn matching_exclude_flips_result_to_false() {
        let m = Matcher::new();
        let included = filter(&[("os", "linux")], &[]);
        assert!(m.matches(&included, &ctx()));

        let excluded = filter(&[("os", "linux")], &[("hostname", "work-.*")]);
        assert!(!m.matches(&excluded, &ctx()));
    }

    #[test]
    fn non_matching_exclude_keeps_result() {
        let m = Matcher::new();
        let f = filter(&[("os", "linux")], &[("hostname", "home-.*")]);
        assert!(m.matches(&f, &ctx()));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let m = Matcher::new();
        assert!(m.matches(&Filter::default(), &ctx()));
    }

    #[test]
    fn unknown_attribute_fails_nonempty_include() {
        let m = Matcher::new();
        let f = filter(&[("shell", "zsh")], &[]);
        assert!(!m.matches(&f, &ctx()));
    }

    #[test]
    fn matches_any_is_vacuously_true_for_empty_set() {
        let m = Matcher::new();
        assert!(m.matches_any(&[], &ctx()));
    }

    #[test]
    fn matches_any_ors_over_filters() {
        let m = Matcher::new();
        let miss = filter(&[("os", "windows")], &[]);
        let hit = filter(&[("os", "linux")], &[]);
        assert!(m.matches_any(&[miss.clone(), hit], &ctx()));
        assert!(!m.matches_any(&[miss], &ctx()));
    }

    // -----------------------------------------------------------------------
    // Pattern matching
    // -----------------------------------------------------------------------

    #[test]
    fn pattern_alternation() {
        let m = Matcher::new();
        assert!(m.matches_pattern("linux|darwin", "darwin"));
        assert!(m.matches_pattern("ubuntu|debian|mint", "debian"));
        assert!(!m.matches_pattern("ubuntu|debian", "arch"));
    }

    #[test]
    fn pattern_is_anchored() {
        let m = Matcher::new();
        assert!(m.matches_pattern("work-.*", "work-laptop"));
        assert!(!m.matches_pattern("work-.*", "home-desktop"));
        // A bare substring must not match without anchors written out.
        assert!(!m.matches_pattern("lap", "work-laptop"));
    }

    #[test]
    fn invalid_pattern_falls_back_to_exact_equality() {
        let m = Matcher::new();
        assert!(m.matches_pattern("[linux", "[linux"));
        assert!(!m.matches_pattern("[linux", "linux"));
    }

    #[test]
    fn repeated_patterns_hit_the_cache() {
        let m = Matcher::new();
        assert!(m.matches_pattern("linux", "linux"));
        assert!(!m.matches_pattern("linux", "darwin"));
        assert!(m.matches_pattern("linux", "linux"));
        assert_eq!(m.cached_pattern_count(), 1);
    }

    // -----------------------------------------------------------------------
    // When-expressions
    // -----------------------------------------------------------------------

    #[derive(Debug)]
    struct FixedRenderer(Result<&'static str, ()>);

    impl WhenRenderer for FixedRenderer {
        fn render(&self, _: &str) -> Result<String> {
            match &self.0 {
                Ok(s) => Ok((*s).to_string()),
                Err(()) => anyhow::bail!("render failed"),
            }
        }
    }

    #[test]
    fn empty_when_is_always_true() {
        assert!(evaluate_when("", None));
        assert!(evaluate_when("   ", None));
        assert!(evaluate_when("\t\n", Some(&FixedRenderer(Ok("false")))));
    }

    #[test]
    fn missing_renderer_is_false() {
        assert!(!evaluate_when("{{ os }}", None));
    }

    #[test]
    fn render_error_is_false() {
        assert!(!evaluate_when("{{ broken", Some(&FixedRenderer(Err(())))));
    }

    #[test]
    fn rendered_true_with_whitespace_matches() {
        assert!(evaluate_when("x", Some(&FixedRenderer(Ok(" true ")))));
    }

    #[test]
    fn only_exact_literal_true_matches() {
        assert!(!evaluate_when("x", Some(&FixedRenderer(Ok("TRUE")))));
        assert!(!evaluate_when("x", Some(&FixedRenderer(Ok("1")))));
        assert!(!evaluate_when("x", Some(&FixedRenderer(Ok("linux")))));
        assert!(!evaluate_when("x", Some(&FixedRenderer(Ok("")))));
    }

    // -----------------------------------------------------------------------
    // filter_packages
    // -----------------------------------------------------------------------

    #[test]
    fn filter_packages_applies_package_level_predicates() {
        let entry: crate::config::Entry = serde_yaml::from_str(
            "name: gated\nfilters:\n  - include:\n      distro: arch\nmanagers:\n  pacman: gated\n",
        )
        .unwrap();
        let open: crate::config::Entry =
            serde_yaml::from_str("name: open\nmanagers:\n  pacman: open\n").unwrap();
        let packages = vec![
            Package::from_entry(&entry).unwrap(),
            Package::from_entry(&open).unwrap(),
        ];

        let m = Matcher::new();
        let kept = filter_packages(packages.clone(), &m, &ctx(), None);
        assert_eq!(kept.len(), 2, "arch host keeps both");

        let mut other = ctx();
        other.distro = "ubuntu".to_string();
        let kept = filter_packages(packages, &m, &other, None);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.first().map(|p| p.name.as_str()), Some("open"));
    }

    // -----------------------------------------------------------------------
    // HostRenderer
    // -----------------------------------------------------------------------

    #[test]
    fn host_renderer_substitutes_attributes() {
        let context = ctx();
        let r = HostRenderer::new(&context);
        assert_eq!(r.render("{{ os }}").unwrap(), "linux");
        assert_eq!(r.render("on {{ distro }}!").unwrap(), "on arch!");
    }

    #[test]
    fn host_renderer_equality_comparison() {
        let context = ctx();
        let r = HostRenderer::new(&context);
        assert_eq!(r.render("{{ os == \"linux\" }}").unwrap(), "true");
        assert_eq!(r.render("{{ os == \"windows\" }}").unwrap(), "false");
        assert_eq!(r.render("{{ distro != \"ubuntu\" }}").unwrap(), "true");
    }

    #[test]
    fn host_renderer_unknown_attribute_is_empty() {
        let context = ctx();
        let r = HostRenderer::new(&context);
        assert_eq!(r.render("{{ shell }}").unwrap(), "");
        assert_eq!(r.render("{{ shell == \"zsh\" }}").unwrap(), "false");
    }

    #[test]
    fn host_renderer_rejects_malformed_expressions() {
        let context = ctx();
        let r = HostRenderer::new(&context);
        assert!(r.render("{{ os is linux here }}").is_err());
        assert!(r.render("{{ os < \"linux\" }}").is_err());
        assert!(r.render("{{ unterminated").is_err());
    }

    #[test]
    fn host_renderer_drives_when_evaluation() {
        let context = ctx();
        let r = HostRenderer::new(&context);
        assert!(evaluate_when("{{ os == \"linux\" }}", Some(&r)));
        assert!(!evaluate_when("{{ os == \"windows\" }}", Some(&r)));
        // Substitution alone renders the OS name, which is not "true".
        assert!(!evaluate_when("{{ os }}", Some(&r)));
    }
}
