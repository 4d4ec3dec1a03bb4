//! Fixed-point math utilities for deterministic simulation.
//!
//! All simulation arithmetic uses fixed-point numbers so that two runs
//! with the same configuration and inputs produce bit-identical state on
//! every platform. Floating-point values only appear at the edges: when a
//! human-authored config file is parsed, and when the headless runner
//! prints a summary.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Milliseconds per second, as a fixed-point constant.
pub const MS_PER_SECOND: Fixed = Fixed::from_bits(1000 << 32);

/// Convert a millisecond duration into seconds.
#[must_use]
pub fn ms_to_seconds(ms: Fixed) -> Fixed {
    ms / MS_PER_SECOND
}

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Serializes optional fixed-point numbers via their raw bit representation,
/// preserving `None` as a serialized `None` value.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(Fixed::to_bits).serialize(serializer)
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

/// Serde support for human-authored fixed-point values.
///
/// Config files carry decimal numbers (`speed: 50.0`). The decimal is
/// converted to fixed-point exactly once, at load time, so the simulation
/// itself never touches floats. Binary formats (save-states) get the raw
/// bits instead, so a round trip is exact.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as a decimal for text formats, raw bits otherwise.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_f64(value.to_num::<f64>())
        } else {
            value.to_bits().serialize(serializer)
        }
    }

    /// Deserialize a decimal (text formats) or raw bits (binary formats).
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        if !deserializer.is_human_readable() {
            return i64::deserialize(deserializer).map(Fixed::from_bits);
        }
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("value {value} out of fixed-point range")))
    }
}

/// Serde support for human-authored points (`(x: 10.0, y: 20.0)`).
pub mod vec2_decimal {
    use super::{Fixed, Vec2Fixed};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Point {
        #[serde(with = "super::fixed_decimal")]
        x: Fixed,
        #[serde(with = "super::fixed_decimal")]
        y: Fixed,
    }

    impl From<Vec2Fixed> for Point {
        fn from(v: Vec2Fixed) -> Self {
            Self { x: v.x, y: v.y }
        }
    }

    /// Serialize a point as decimals.
    pub fn serialize<S>(value: &Vec2Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Point::from(*value).serialize(serializer)
    }

    /// Deserialize a point from decimals.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec2Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p = Point::deserialize(deserializer)?;
        Ok(Vec2Fixed::new(p.x, p.y))
    }

    /// Serde support for a list of decimal points.
    pub mod seq {
        use super::{Point, Vec2Fixed};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        /// Serialize a list of points as decimals.
        pub fn serialize<S>(value: &[Vec2Fixed], serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let points: Vec<Point> = value.iter().copied().map(Point::from).collect();
            points.serialize(serializer)
        }

        /// Deserialize a list of points from decimals.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec2Fixed>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let points = Vec::<Point>::deserialize(deserializer)?;
            Ok(points.into_iter().map(|p| Vec2Fixed::new(p.x, p.y)).collect())
        }
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates at `Fixed::MAX` once the distance passes about 46 340.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        (self - other).dot(self - other)
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Whether `other` lies within `radius` of this point (inclusive).
    #[must_use]
    pub fn within(self, other: Self, radius: Fixed) -> bool {
        self.distance_squared(other) <= radius * radius
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.x)
            .saturating_add(self.y.saturating_mul(other.y))
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Move from `self` toward `target` by at most `step` units.
    ///
    /// Returns the new point; never passes the target.
    #[must_use]
    pub fn step_towards(self, target: Self, step: Fixed) -> Self {
        let diff = target - self;
        let len = diff.length();
        if len <= step || len == Fixed::ZERO {
            return target;
        }
        self + diff.scale(step / len)
    }
}

/// Computes the square root of a fixed-point number using binary search.
pub(crate) fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    // 64 halvings cover the full I32F32 range down to the last fractional bit.
    for _ in 0..64 {
        let mid = low + (high - low) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epsilon() -> Fixed {
        Fixed::ONE / Fixed::from_num(10000)
    }

    #[test]
    fn test_vec2_distance() {
        let a = Vec2Fixed::from_ints(3, 0);
        let b = Vec2Fixed::from_ints(0, 4);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
        assert!((a.distance(b) - Fixed::from_num(5)).abs() < epsilon());
    }

    #[test]
    fn test_distance_squared_saturates_far_apart() {
        let a = Vec2Fixed::from_ints(-40_000, -40_000);
        let b = Vec2Fixed::from_ints(40_000, 40_000);
        assert_eq!(a.distance_squared(b), Fixed::MAX);
        assert!(!a.within(b, Fixed::from_num(1000)));
        assert_eq!(
            Vec2Fixed::from_ints(46_000, 0).distance_squared(Vec2Fixed::ZERO),
            Fixed::from_num(2_116_000_000u32)
        );
    }

    #[test]
    fn test_within_is_inclusive() {
        let a = Vec2Fixed::ZERO;
        let b = Vec2Fixed::from_ints(0, 10);
        assert!(a.within(b, Fixed::from_num(10)));
        assert!(!a.within(b, Fixed::from_num(9)));
    }

    #[test]
    fn test_ms_to_seconds() {
        assert_eq!(ms_to_seconds(Fixed::from_num(500)), Fixed::from_num(0.5));
        assert_eq!(MS_PER_SECOND, Fixed::from_num(1000));
    }

    #[test]
    fn test_vec2_lerp() {
        let a = Vec2Fixed::ZERO;
        let b = Vec2Fixed::from_ints(10, 20);
        let mid = a.lerp(b, Fixed::from_num(0.5));
        assert_eq!(mid, Vec2Fixed::from_ints(5, 10));
    }

    #[test]
    fn test_vec2_normalize() {
        let norm = Vec2Fixed::from_ints(3, 4).normalize();
        let len_sq = norm.dot(norm);
        assert!(
            (len_sq - Fixed::ONE).abs() < epsilon(),
            "normalized vector length² should be ~1, got {:?}",
            len_sq
        );

        // Direction preserved: norm.x * 4 == norm.y * 3
        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(ratio_diff.abs() < epsilon());
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_step_towards_stops_at_target() {
        let start = Vec2Fixed::ZERO;
        let target = Vec2Fixed::from_ints(10, 0);

        let partial = start.step_towards(target, Fixed::from_num(4));
        assert!((partial.x - Fixed::from_num(4)).abs() < epsilon());
        assert_eq!(partial.y, Fixed::ZERO);

        assert_eq!(start.step_towards(target, Fixed::from_num(50)), target);
    }

    #[test]
    fn test_decimal_serde_roundtrip_through_ron() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            #[serde(with = "fixed_decimal")]
            value: Fixed,
            #[serde(with = "vec2_decimal")]
            point: Vec2Fixed,
        }

        let parsed: Wrapper = ron::from_str("(value: 2.5, point: (x: 10.0, y: -4.25))").unwrap();
        assert_eq!(parsed.value, Fixed::from_num(2.5));
        assert_eq!(parsed.point, Vec2Fixed::new(Fixed::from_num(10), Fixed::from_num(-4.25)));
    }

    #[test]
    fn test_decimal_serde_is_exact_in_bincode() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper(#[serde(with = "fixed_decimal")] Fixed);

        // Not representable exactly as f64.
        let value = Fixed::from_bits(0x7FFF_FFFF_0000_0001);
        let bytes = bincode::serialize(&Wrapper(value)).unwrap();
        let back: Wrapper = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.0, value);
    }
}
