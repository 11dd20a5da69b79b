//! Rule-based selection of traced classes and methods.
//!
//! The instrumentation layer consults the selector once per class load to
//! decide which methods get hooks; after construction the selector is
//! read-only and safe to share across threads without synchronization.
//!
//! Wildcards are a single trailing `*` meaning prefix match — plain string
//! comparison, not a glob engine. When several wildcard class patterns match
//! the same class, the longest literal prefix wins; an exact entry always
//! beats a wildcard.

use std::collections::{HashMap, HashSet};

use crate::config::{AgentConfig, ClassRule, MethodRule};

/// One method pattern inside a class entry, pre-split into its literal part.
#[derive(Debug, Clone)]
struct MethodMatcher {
    literal: String,
    prefix: bool,
    track_parameters: Option<bool>,
}

impl MethodMatcher {
    fn new(rule: &MethodRule) -> Self {
        match rule.pattern.strip_suffix('*') {
            Some(literal) => Self {
                literal: literal.to_string(),
                prefix: true,
                track_parameters: rule.track_parameters,
            },
            None => Self {
                literal: rule.pattern.clone(),
                prefix: false,
                track_parameters: rule.track_parameters,
            },
        }
    }

    fn matches(&self, method: &str) -> bool {
        if self.prefix {
            method.starts_with(&self.literal)
        } else {
            method == self.literal
        }
    }
}

/// Resolved class entry: the method patterns registered under one class
/// pattern, plus the class-level parameter-capture default.
#[derive(Debug, Clone, Default)]
pub struct ClassEntry {
    methods: Vec<MethodMatcher>,
    track_parameters: Option<bool>,
}

impl ClassEntry {
    fn absorb(&mut self, rule: &ClassRule) {
        self.methods.extend(rule.methods.iter().map(MethodMatcher::new));
        if rule.track_parameters.is_some() {
            self.track_parameters = rule.track_parameters;
        }
    }

    fn matches_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.matches(method))
    }

    fn is_match_all(&self) -> bool {
        self.methods.is_empty()
    }
}

/// One side of the rule configuration (include or exclude), indexed for
/// resolution: exact names in a map, wildcard entries sorted so the longest
/// literal prefix is found first.
#[derive(Debug, Default)]
pub struct RuleSet {
    exact: HashMap<String, ClassEntry>,
    prefixes: Vec<(String, ClassEntry)>,
}

impl RuleSet {
    fn from_rules(rules: &[ClassRule]) -> Self {
        let mut exact: HashMap<String, ClassEntry> = HashMap::new();
        let mut by_prefix: HashMap<String, ClassEntry> = HashMap::new();
        for rule in rules {
            match rule.class.strip_suffix('*') {
                Some(prefix) => by_prefix.entry(prefix.to_string()).or_default().absorb(rule),
                None => exact.entry(rule.class.clone()).or_default().absorb(rule),
            }
        }
        let mut prefixes: Vec<(String, ClassEntry)> = by_prefix.into_iter().collect();
        // Longest literal prefix first; the tie-break that keeps overlapping
        // patterns like "com.acme.*" vs "com.acme.service.*" deterministic.
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { exact, prefixes }
    }

    /// Resolve the entry governing `class_name`, if any. Exact match wins;
    /// otherwise the wildcard entry with the longest matching literal prefix.
    #[must_use]
    pub fn resolve(&self, class_name: &str) -> Option<&ClassEntry> {
        if let Some(entry) = self.exact.get(class_name) {
            return Some(entry);
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| class_name.starts_with(prefix.as_str()))
            .map(|(_, entry)| entry)
    }

    /// The pattern key that `resolve` picked, for diagnostics.
    #[must_use]
    pub fn resolve_pattern(&self, class_name: &str) -> Option<String> {
        if self.exact.contains_key(class_name) {
            return Some(class_name.to_string());
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| class_name.starts_with(prefix.as_str()))
            .map(|(prefix, _)| format!("{prefix}*"))
    }

    fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }
}

/// Pure decision function over the loaded include/exclude rule sets.
#[derive(Debug)]
pub struct MethodSelector {
    include: RuleSet,
    exclude: RuleSet,
    debug_classes: HashSet<String>,
    track_parameters_default: bool,
}

impl MethodSelector {
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            include: RuleSet::from_rules(&config.include),
            exclude: RuleSet::from_rules(&config.exclude),
            debug_classes: config.debug_classes.clone(),
            track_parameters_default: config.track_parameters,
        }
    }

    /// Is this method eligible for tracing?
    ///
    /// An include entry is required. Its empty method set means "all
    /// methods". An exclude entry with no method patterns is vacuous and
    /// excludes nothing; otherwise the method survives only if it matches
    /// no exclude pattern.
    #[must_use]
    pub fn is_tracked(&self, class_name: &str, method_name: &str) -> bool {
        let Some(entry) = self.include.resolve(class_name) else {
            return false;
        };
        if !entry.is_match_all() && !entry.matches_method(method_name) {
            return false;
        }
        match self.exclude.resolve(class_name) {
            None => true,
            Some(excluded) if excluded.is_match_all() => true,
            Some(excluded) => !excluded.matches_method(method_name),
        }
    }

    /// Should the hooks capture parameter values for this method?
    ///
    /// A matching method rule's override beats the include entry's
    /// class-level default, which beats the global flag.
    #[must_use]
    pub fn should_track_parameters(&self, class_name: &str, method_name: &str) -> bool {
        let Some(entry) = self.include.resolve(class_name) else {
            return false;
        };
        entry
            .methods
            .iter()
            .find(|m| m.matches(method_name))
            .and_then(|m| m.track_parameters)
            .or(entry.track_parameters)
            .unwrap_or(self.track_parameters_default)
    }

    /// Hook activity for these classes is logged at debug level.
    #[must_use]
    pub fn debug_enabled(&self, class_name: &str) -> bool {
        self.debug_classes.contains(class_name)
    }

    #[must_use]
    pub fn include_count(&self) -> usize {
        self.include.len()
    }

    #[must_use]
    pub fn exclude_count(&self) -> usize {
        self.exclude.len()
    }

    #[must_use]
    pub fn has_rules(&self) -> bool {
        !self.include.is_empty()
    }
}
