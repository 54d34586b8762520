//! Simulated picker movement.
//!
//! Each poll of a picker's location advances it one step. How a step is
//! taken depends on the configured [`StrategyKind`]:
//!
//! - `route`: walk a fixed waypoint list, cursor kept in process memory
//! - `route-persisted`: same walk, cursor stored under `meta.routeSteps`
//! - `history`: random walk appended to the picker's `locations`
//! - `random-walk`: random walk overwriting the picker's `lat`/`lng`

pub mod random_walk;
pub mod route;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::models::picker::{Coordinate, LocationRecord};
use crate::store::Document;

pub use random_walk::{RandomWalk, WalkMode};
pub use route::RouteCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Route,
    RoutePersisted,
    History,
    RandomWalk,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Route => "route",
            StrategyKind::RoutePersisted => "route-persisted",
            StrategyKind::History => "history",
            StrategyKind::RandomWalk => "random-walk",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "route" => Ok(StrategyKind::Route),
            "route-persisted" => Ok(StrategyKind::RoutePersisted),
            "history" => Ok(StrategyKind::History),
            "random-walk" => Ok(StrategyKind::RandomWalk),
            other => Err(format!(
                "unknown location strategy {other:?}; expected route, route-persisted, history or random-walk"
            )),
        }
    }
}

/// Reply of a route-following poll.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteFix {
    pub picker_id: String,
    pub lat: f64,
    pub lng: f64,
    pub updated_at: String,
}

/// Reply of a raw-coordinate random walk poll.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickerPosition {
    pub id: i64,
    pub picker_id: i64,
    pub lat: f64,
    pub lng: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum LocationReport {
    Route(RouteFix),
    History(LocationRecord),
    Position(PickerPosition),
}

impl LocationReport {
    pub fn coordinate(&self) -> Coordinate {
        match self {
            LocationReport::Route(fix) => Coordinate {
                lat: fix.lat,
                lng: fix.lng,
            },
            LocationReport::History(record) => record.coordinate(),
            LocationReport::Position(position) => Coordinate {
                lat: position.lat,
                lng: position.lng,
            },
        }
    }
}

/// Cursor position a strategy keeps outside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorMove {
    pub picker_id: String,
    pub step: usize,
}

/// One step of a walk. `pending` holds strategy state that must only be
/// applied once the document write carrying `report` has been committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub report: LocationReport,
    pub pending: Option<CursorMove>,
}

impl Step {
    pub fn settled(report: LocationReport) -> Self {
        Self {
            report,
            pending: None,
        }
    }
}

pub trait LocationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Moves the picker one step and reports where it is now. Document
    /// changes go to `doc`; anything else is returned in [`Step::pending`].
    fn advance(
        &self,
        doc: &mut Document,
        picker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Step, AppError>;

    fn supports_reset(&self) -> bool {
        false
    }

    /// Rewinds the picker to the first step of its walk.
    fn reset(&self, _doc: &mut Document, picker_id: &str) -> Result<Option<CursorMove>, AppError> {
        Err(AppError::RouteNotFound(format!(
            "{} strategy cannot reset picker {picker_id}",
            self.kind()
        )))
    }

    /// Applies state staged by [`advance`](Self::advance) or
    /// [`reset`](Self::reset). Call only after the write succeeded.
    fn commit(&self, _pending: &CursorMove) {}
}

pub fn build(kind: StrategyKind) -> Box<dyn LocationStrategy> {
    match kind {
        StrategyKind::Route => Box::new(RouteCursor::in_memory()),
        StrategyKind::RoutePersisted => Box::new(RouteCursor::persisted()),
        StrategyKind::History => Box::new(RandomWalk::new(WalkMode::History)),
        StrategyKind::RandomWalk => Box::new(RandomWalk::new(WalkMode::Position)),
    }
}
