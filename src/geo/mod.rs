use rand::Rng;

use crate::models::picker::Coordinate;

/// Where a picker with no recorded position starts.
pub const ORIGIN: Coordinate = Coordinate {
    lat: 36.7538,
    lng: 3.0588,
};

/// Largest per-axis step of a random walk, in degrees.
pub const MAX_JITTER_DEG: f64 = 0.0004;

/// Moves `from` by an independent uniform offset in
/// `[-MAX_JITTER_DEG, MAX_JITTER_DEG]` on each axis.
pub fn jitter<R: Rng + ?Sized>(from: Coordinate, rng: &mut R) -> Coordinate {
    Coordinate {
        lat: from.lat + rng.random_range(-MAX_JITTER_DEG..=MAX_JITTER_DEG),
        lng: from.lng + rng.random_range(-MAX_JITTER_DEG..=MAX_JITTER_DEG),
    }
}
