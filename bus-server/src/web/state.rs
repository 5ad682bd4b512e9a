//! Application state for the web layer.

use std::sync::Arc;

use chrono::FixedOffset;

use crate::alternatives::FinderConfig;
use crate::arrivals::{AlternativesTarget, PollConfig, RouteTarget, StationBoardTarget, Tracker};
use crate::direction::DirectionMappingCache;
use crate::grouping::GroupingConfig;
use crate::route_names::RouteNameMatcher;
use crate::source::{CachedTransitSource, TransitSource};
use crate::tdx::TdxClient;

/// Source used by the server binary.
pub type LiveSource = CachedTransitSource<TdxClient>;

/// Shared application state.
///
/// Holds the transit source, per-module configuration and one tracker per
/// kind of live view.
pub struct AppState<S: TransitSource + 'static = LiveSource> {
    pub source: Arc<S>,

    /// Direction mappings shared by every station board
    pub mappings: Arc<DirectionMappingCache>,

    pub grouping: Arc<GroupingConfig>,
    pub finder: Arc<FinderConfig>,
    pub poll: Arc<PollConfig>,
    pub matcher: Arc<RouteNameMatcher>,

    pub alternatives: Arc<Tracker<AlternativesTarget<S>>>,
    pub board: Arc<Tracker<StationBoardTarget<S>>>,
    pub route: Arc<Tracker<RouteTarget<S>>>,

    /// Offset used for `HH:MM` display
    pub utc_offset: FixedOffset,
}

impl<S: TransitSource + 'static> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            mappings: self.mappings.clone(),
            grouping: self.grouping.clone(),
            finder: self.finder.clone(),
            poll: self.poll.clone(),
            matcher: self.matcher.clone(),
            alternatives: self.alternatives.clone(),
            board: self.board.clone(),
            route: self.route.clone(),
            utc_offset: self.utc_offset,
        }
    }
}

impl<S: TransitSource + 'static> AppState<S> {
    /// Create app state with default grouping, finder and matching rules.
    pub fn new(
        source: S,
        mappings: DirectionMappingCache,
        poll: PollConfig,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            source: Arc::new(source),
            mappings: Arc::new(mappings),
            grouping: Arc::new(GroupingConfig::default()),
            finder: Arc::new(FinderConfig::default()),
            alternatives: Arc::new(Tracker::new(&poll)),
            board: Arc::new(Tracker::new(&poll)),
            route: Arc::new(Tracker::new(&poll)),
            poll: Arc::new(poll),
            matcher: Arc::new(RouteNameMatcher::taiwan_default()),
            utc_offset,
        }
    }

    pub fn with_grouping(mut self, grouping: GroupingConfig) -> Self {
        self.grouping = Arc::new(grouping);
        self
    }

    pub fn with_finder(mut self, finder: FinderConfig) -> Self {
        self.finder = Arc::new(finder);
        self
    }

    pub fn with_matcher(mut self, matcher: RouteNameMatcher) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }
}
