use derive_more::Display;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Axis {
    #[default]
    #[display("x")]
    X,
    #[display("y")]
    Y,
    #[display("z")]
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Counts or indices along the three axes of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[display("({x}, {y}, {z})")]
pub struct Dim3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Default for Dim3 {
    #[inline]
    fn default() -> Self {
        Self::ONE
    }
}

impl Dim3 {
    pub const ZERO: Self = Self::new(0, 0, 0);
    pub const ONE: Self = Self::new(1, 1, 1);

    #[inline]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn get(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Returns a copy with the count along `axis` replaced.
    #[inline]
    pub const fn with(mut self, axis: Axis, value: usize) -> Self {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
        self
    }

    #[inline]
    pub const fn to_array(self) -> [usize; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn volume(&self) -> usize {
        self.x.saturating_mul(self.y).saturating_mul(self.z)
    }

    /// Returns `true` if all three counts are non-zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.x > 0 && self.y > 0 && self.z > 0
    }

    /// Combines two values axis by axis.
    #[inline]
    pub fn zip_with(self, other: Self, f: impl Fn(usize, usize) -> usize) -> Self {
        Self::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }

    /// All points `p` with `p < self` on every axis, `x` varying fastest.
    pub fn points(self) -> impl Iterator<Item = Dim3> + Clone {
        itertools::iproduct!(0..self.z, 0..self.y, 0..self.x).map(|(z, y, x)| Dim3::new(x, y, z))
    }
}

impl From<usize> for Dim3 {
    #[inline]
    fn from(x: usize) -> Self {
        Self::new(x, 1, 1)
    }
}

impl From<(usize, usize)> for Dim3 {
    #[inline]
    fn from((x, y): (usize, usize)) -> Self {
        Self::new(x, y, 1)
    }
}

impl From<(usize, usize, usize)> for Dim3 {
    #[inline]
    fn from((x, y, z): (usize, usize, usize)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<[usize; 3]> for Dim3 {
    #[inline]
    fn from([x, y, z]: [usize; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// One coordinate of a topology: a group, and a lane within that group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[display("group {group} lane {lane}")]
pub struct Coord {
    pub group: Dim3,
    pub lane: Dim3,
}

impl Coord {
    pub const ORIGIN: Self = Self {
        group: Dim3::ZERO,
        lane: Dim3::ZERO,
    };
}

/// The hierarchical shape of a launch: a grid of groups, each holding the same block of lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[display("{groups} x {lanes}")]
pub struct Topology {
    /// Number of groups along each axis.
    pub groups: Dim3,
    /// Number of lanes per group along each axis.
    pub lanes: Dim3,
}

impl Topology {
    #[inline]
    pub fn new(groups: impl Into<Dim3>, lanes: impl Into<Dim3>) -> Self {
        let groups = groups.into();
        let lanes = lanes.into();
        Self { groups, lanes }
    }

    /// Sizes a topology with `lanes` per group to cover `extent`.
    ///
    /// With [`Sizing::Direct`] there is one coordinate per index, as far as the `limits` allow.
    /// With [`Sizing::Loop`] the group counts are further capped, leaving loop policies to
    /// cover the rest. A zero extent or lane count along any axis yields zero groups there.
    pub fn cover(
        extent: impl Into<Dim3>,
        lanes: impl Into<Dim3>,
        sizing: Sizing,
        limits: &Limits,
    ) -> Self {
        let extent = extent.into();
        let lanes = lanes.into();
        let groups = extent.zip_with(lanes, |extent, lanes| match lanes {
            0 => 0,
            lanes => extent.div_ceil(lanes),
        });
        let groups = match sizing {
            Sizing::Direct => groups,
            Sizing::Loop { groups: cap } => groups.zip_with(cap, usize::min),
        };
        let groups = groups.zip_with(limits.groups, usize::min);
        Self { groups, lanes }
    }

    /// A topology is viable if it has at least one group and one lane along every axis.
    #[inline]
    pub fn is_viable(&self) -> bool {
        self.groups.is_positive() && self.lanes.is_positive()
    }

    /// Total number of coordinates.
    #[inline]
    pub fn volume(&self) -> usize {
        self.groups.volume().saturating_mul(self.lanes.volume())
    }

    /// All coordinates, groups outermost.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + Clone {
        let lanes = self.lanes;
        self.groups
            .points()
            .flat_map(move |group| lanes.points().map(move |lane| Coord { group, lane }))
    }
}

/// How [`Topology::cover`] sizes the group grid.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Sizing {
    /// One coordinate per index.
    #[default]
    Direct,
    /// At most `groups` groups along each axis.
    Loop { groups: Dim3 },
}

/// Resource limits of an execution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    /// Maximum number of groups along each axis.
    pub groups: Dim3,
    /// Maximum number of lanes per group along each axis.
    pub lanes: Dim3,
    /// Maximum total number of lanes in one group.
    pub lanes_per_group: usize,
    /// Maximum shared scratch memory per group, in bytes.
    pub shared_memory: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            groups: Dim3::new(i32::MAX as usize, 65535, 65535),
            lanes: Dim3::new(1024, 1024, 64),
            lanes_per_group: 1024,
            shared_memory: 48 << 10,
        }
    }
}
