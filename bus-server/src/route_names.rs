//! Matching third-party line names to provider routes.
//!
//! Itinerary providers name bus lines their own way: `"307"` may arrive as
//! `"307"`, as an English name, or as `"299V"` for the provider's `"299副"`.
//! A [`RouteNameMatcher`] tries a list of strategies in order and takes the
//! first route any of them finds.

use tracing::debug;

use crate::domain::Route;

/// One way of finding the route a line name refers to.
pub trait RouteNameStrategy: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    /// The route `line_name` refers to, if this strategy recognises it.
    fn find<'r>(&self, line_name: &str, routes: &'r [Route]) -> Option<&'r Route>;
}

/// The Chinese route name equals the line name.
#[derive(Debug, Clone, Copy)]
pub struct ExactName;

impl RouteNameStrategy for ExactName {
    fn label(&self) -> &'static str {
        "exact"
    }

    fn find<'r>(&self, line_name: &str, routes: &'r [Route]) -> Option<&'r Route> {
        routes.iter().find(|r| r.name == line_name)
    }
}

/// The English route name equals the line name.
#[derive(Debug, Clone, Copy)]
pub struct EnglishName;

impl RouteNameStrategy for EnglishName {
    fn label(&self) -> &'static str {
        "english"
    }

    fn find<'r>(&self, line_name: &str, routes: &'r [Route]) -> Option<&'r Route> {
        routes
            .iter()
            .find(|r| r.name_en.as_deref() == Some(line_name))
    }
}

/// A trailing Latin letter stands for a Chinese variant marker,
/// e.g. `299V` for `299副`.
#[derive(Debug, Clone, Copy)]
pub struct SuffixVariant {
    pub suffix: char,
    pub replacement: &'static str,
}

impl RouteNameStrategy for SuffixVariant {
    fn label(&self) -> &'static str {
        "suffix"
    }

    fn find<'r>(&self, line_name: &str, routes: &'r [Route]) -> Option<&'r Route> {
        let upper = line_name.to_uppercase();
        let base = upper.strip_suffix(self.suffix.to_ascii_uppercase())?;
        if base.is_empty() {
            return None;
        }
        let wanted = format!("{base}{}", self.replacement);
        routes.iter().find(|r| r.name == wanted)
    }
}

/// A fixed line name stands for any route whose name contains a keyword.
#[derive(Debug, Clone, Copy)]
pub struct KeywordAlias {
    pub alias: &'static str,
    pub keyword: &'static str,
}

impl RouteNameStrategy for KeywordAlias {
    fn label(&self) -> &'static str {
        "keyword"
    }

    fn find<'r>(&self, line_name: &str, routes: &'r [Route]) -> Option<&'r Route> {
        if !line_name.eq_ignore_ascii_case(self.alias) {
            return None;
        }
        routes.iter().find(|r| r.name.contains(self.keyword))
    }
}

/// Ordered list of route-name strategies.
pub struct RouteNameMatcher {
    strategies: Vec<Box<dyn RouteNameStrategy>>,
}

impl Default for RouteNameMatcher {
    fn default() -> Self {
        Self::taiwan_default()
    }
}

impl RouteNameMatcher {
    /// A matcher with no strategies; it never matches.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Exact name, English name, `V`→`副`, `E`→`延`, `TIAOWA BUS`→`跳蛙`.
    pub fn taiwan_default() -> Self {
        Self::empty()
            .with_strategy(ExactName)
            .with_strategy(EnglishName)
            .with_strategy(SuffixVariant {
                suffix: 'V',
                replacement: "副",
            })
            .with_strategy(SuffixVariant {
                suffix: 'E',
                replacement: "延",
            })
            .with_strategy(KeywordAlias {
                alias: "TIAOWA BUS",
                keyword: "跳蛙",
            })
    }

    /// Append a strategy, tried after the existing ones.
    pub fn with_strategy(mut self, strategy: impl RouteNameStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// The route `line_name` refers to, or `None` if no strategy finds one.
    pub fn resolve<'r>(&self, line_name: &str, routes: &'r [Route]) -> Option<&'r Route> {
        let line_name = line_name.trim();
        if line_name.is_empty() {
            return None;
        }

        for strategy in &self.strategies {
            if let Some(route) = strategy.find(line_name, routes) {
                debug!(
                    line = line_name,
                    route = %route.uid,
                    name = %route.name,
                    strategy = strategy.label(),
                    "matched line name"
                );
                return Some(route);
            }
        }

        debug!(line = line_name, candidates = routes.len(), "no route matches line name");
        None
    }
}

/// First run of ASCII digits in `name`, if any.
fn first_number(name: &str) -> Option<u64> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn has_cjk(name: &str) -> bool {
    name.chars().any(|c| c > '\u{4E00}')
}

/// Order routes for listing: by the first number in the name (names without
/// one last), then names without Chinese characters first.
pub fn sort_routes(routes: &mut [Route]) {
    routes.sort_by_key(|r| (first_number(&r.name).unwrap_or(u64::MAX), has_cjk(&r.name)));
}

/// Routes whose Chinese or English name contains `text`, ignoring case,
/// in listing order. Blank text keeps every route.
pub fn search_routes(routes: Vec<Route>, text: &str) -> Vec<Route> {
    let needle = text.trim().to_lowercase();
    let mut found: Vec<Route> = if needle.is_empty() {
        routes
    } else {
        routes
            .into_iter()
            .filter(|r| {
                r.name.to_lowercase().contains(&needle)
                    || r.name_en
                        .as_deref()
                        .is_some_and(|en| en.to_lowercase().contains(&needle))
            })
            .collect()
    };
    sort_routes(&mut found);
    found
}
