//! Line classification.
//!
//! An ordered list of `(counter, matcher)` pairs. Matching is independent per
//! entry, so one line can bump several counters, or none.

use regex::Regex;

use crate::domain::{AppError, ClassifierConfig, CounterKind, Counters, Result};

/// Decides whether a line belongs to a counter.
pub trait LineMatcher {
    /// Returns true if `line` matches.
    fn matches(&self, line: &str) -> bool;
}

impl LineMatcher for Regex {
    fn matches(&self, line: &str) -> bool {
        self.is_match(line)
    }
}

impl<F> LineMatcher for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, line: &str) -> bool {
        self(line)
    }
}

struct Classifier {
    counter: CounterKind,
    matcher: Box<dyn LineMatcher>,
}

/// Ordered set of classifiers.
#[derive(Default)]
pub struct ClassifierSet {
    classifiers: Vec<Classifier>,
}

impl ClassifierSet {
    /// Compile classifiers from configuration, keeping their order.
    ///
    /// # Errors
    /// Returns `Pattern` for the first pattern that fails to compile.
    pub fn from_config(configs: &[ClassifierConfig]) -> Result<Self> {
        let mut set = Self::default();
        for config in configs {
            let regex = Regex::new(&config.pattern)
                .map_err(|e| AppError::pattern(config.counter.as_str(), e))?;
            set.push(config.counter, regex);
        }
        tracing::debug!(count = set.len(), "Compiled classifiers");
        Ok(set)
    }

    /// Append a classifier.
    pub fn push(&mut self, counter: CounterKind, matcher: impl LineMatcher + 'static) {
        self.classifiers.push(Classifier {
            counter,
            matcher: Box::new(matcher),
        });
    }

    /// Builder form of [`push`](Self::push).
    #[cfg(test)]
    #[must_use]
    pub fn with(mut self, counter: CounterKind, matcher: impl LineMatcher + 'static) -> Self {
        self.push(counter, matcher);
        self
    }

    /// Number of classifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    /// Whether there are no classifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Counters matched by `line`, in classifier order.
    pub fn classify<'a>(&'a self, line: &'a str) -> impl Iterator<Item = CounterKind> + 'a {
        self.classifiers
            .iter()
            .filter(move |c| c.matcher.matches(line))
            .map(|c| c.counter)
    }

    /// Increment every counter `line` matches; returns how many matched.
    pub fn apply(&self, line: &str, counters: &mut Counters) -> usize {
        let mut matched = 0;
        for counter in self.classify(line) {
            counters.increment(counter);
            matched += 1;
        }
        matched
    }
}
