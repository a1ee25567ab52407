use std::num::NonZeroUsize;

use derive_more::Display;
use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::Axis;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("policy error: axis {0} is mapped more than once")]
    Axis(Axis),
    #[error("tile error: tile size along axis {0} is zero")]
    Tile(usize),
    #[error("stride error: stride must be at least 1, got {0}")]
    Stride(isize),
}

/// Which level of the topology a policy axis is mapped to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Role {
    /// The group index; resource count is the number of groups.
    #[display("group")]
    Group,
    /// The lane index within the group; resource count is the number of lanes per group.
    #[default]
    #[display("lane")]
    Lane,
    /// The flattened `lane + lanes * group` index; resource count is lanes times groups.
    #[display("global")]
    Global,
}

/// How a coordinate traverses its segment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// At most one work unit per coordinate; coordinates past the end do nothing.
    #[default]
    #[display("direct")]
    Direct,
    /// The coordinate advances by the resource count until the segment is exhausted.
    #[display("loop")]
    Loop,
}

/// Maps `N` segments onto `N` distinct axes of the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{role}_{}_{mode}", axes.iter().join(""))]
pub struct Policy<const N: usize> {
    role: Role,
    mode: Mode,
    axes: [Axis; N],
}

impl<const N: usize> Policy<N> {
    /// Creates a policy.
    ///
    /// # Panics
    /// Panics if an axis appears more than once. In a `const` context this is a compile error.
    pub const fn new(role: Role, mode: Mode, axes: [Axis; N]) -> Self {
        let mut i = 0;
        while i < N {
            let mut j = i + 1;
            while j < N {
                if axes[i] as usize == axes[j] as usize {
                    panic!("policy error: axis is mapped more than once");
                }
                j += 1;
            }
            i += 1;
        }
        Self { role, mode, axes }
    }

    pub fn try_new(role: Role, mode: Mode, axes: [Axis; N]) -> Result<Self, MappingError> {
        match axes.iter().duplicates().next() {
            Some(&axis) => Err(MappingError::Axis(axis)),
            None => Ok(Self { role, mode, axes }),
        }
    }

    #[inline]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub const fn axes(&self) -> [Axis; N] {
        self.axes
    }

    /// The topology axis that segment `k` is mapped to.
    #[inline]
    pub const fn axis(&self, k: usize) -> Axis {
        self.axes[k]
    }
}

/// Fixed tile sizes, one per segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile<const N: usize>([NonZeroUsize; N]);

impl<const N: usize> Tile<N> {
    /// Creates tile sizes.
    ///
    /// # Panics
    /// Panics if any size is zero.
    pub fn new(sizes: [usize; N]) -> Self {
        match Self::try_new(sizes) {
            Ok(tile) => tile,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_new(sizes: [usize; N]) -> Result<Self, MappingError> {
        let mut tile = [NonZeroUsize::MIN; N];
        for (k, (size, &value)) in tile.iter_mut().zip_eq(sizes.iter()).enumerate() {
            *size = NonZeroUsize::new(value).ok_or(MappingError::Tile(k))?;
        }
        Ok(Self(tile))
    }

    /// The tile size of segment `k`.
    #[inline]
    pub fn size(&self, k: usize) -> usize {
        self.0[k].get()
    }
}

impl From<NonZeroUsize> for Tile<1> {
    #[inline]
    fn from(value: NonZeroUsize) -> Self {
        Self([value])
    }
}

macro_rules! policies {
    ($($name:ident: $role:ident $mode:ident [$($axis:ident),+];)+) => {
        $(
            #[doc = concat!(
                "`", stringify!($role), "` role, `", stringify!($mode), "` mode over axes ",
                $(stringify!($axis),)+ "."
            )]
            pub const $name: Policy<{ [$(Axis::$axis),+].len() }> =
                Policy::new(Role::$role, Mode::$mode, [$(Axis::$axis),+]);
        )+
    };
}

policies! {
    GROUP_X_DIRECT: Group Direct [X];
    GROUP_Y_DIRECT: Group Direct [Y];
    GROUP_Z_DIRECT: Group Direct [Z];
    GROUP_X_LOOP: Group Loop [X];
    GROUP_Y_LOOP: Group Loop [Y];
    GROUP_Z_LOOP: Group Loop [Z];
    LANE_X_DIRECT: Lane Direct [X];
    LANE_Y_DIRECT: Lane Direct [Y];
    LANE_Z_DIRECT: Lane Direct [Z];
    LANE_X_LOOP: Lane Loop [X];
    LANE_Y_LOOP: Lane Loop [Y];
    LANE_Z_LOOP: Lane Loop [Z];
    GLOBAL_X: Global Direct [X];
    GLOBAL_Y: Global Direct [Y];
    GLOBAL_Z: Global Direct [Z];
    GLOBAL_X_LOOP: Global Loop [X];
    GLOBAL_Y_LOOP: Global Loop [Y];
    GLOBAL_Z_LOOP: Global Loop [Z];

    GROUP_XY_DIRECT: Group Direct [X, Y];
    GROUP_XZ_DIRECT: Group Direct [X, Z];
    GROUP_YX_DIRECT: Group Direct [Y, X];
    GROUP_YZ_DIRECT: Group Direct [Y, Z];
    GROUP_ZX_DIRECT: Group Direct [Z, X];
    GROUP_ZY_DIRECT: Group Direct [Z, Y];
    GROUP_XY_LOOP: Group Loop [X, Y];
    GROUP_XZ_LOOP: Group Loop [X, Z];
    GROUP_YX_LOOP: Group Loop [Y, X];
    GROUP_YZ_LOOP: Group Loop [Y, Z];
    GROUP_ZX_LOOP: Group Loop [Z, X];
    GROUP_ZY_LOOP: Group Loop [Z, Y];
    LANE_XY_DIRECT: Lane Direct [X, Y];
    LANE_YX_DIRECT: Lane Direct [Y, X];
    LANE_XY_LOOP: Lane Loop [X, Y];
    LANE_YX_LOOP: Lane Loop [Y, X];
    GLOBAL_XY: Global Direct [X, Y];
    GLOBAL_XZ: Global Direct [X, Z];
    GLOBAL_YX: Global Direct [Y, X];
    GLOBAL_YZ: Global Direct [Y, Z];
    GLOBAL_ZX: Global Direct [Z, X];
    GLOBAL_ZY: Global Direct [Z, Y];
    GLOBAL_XY_LOOP: Global Loop [X, Y];

    GROUP_XYZ_DIRECT: Group Direct [X, Y, Z];
    GROUP_XZY_DIRECT: Group Direct [X, Z, Y];
    GROUP_YXZ_DIRECT: Group Direct [Y, X, Z];
    GROUP_YZX_DIRECT: Group Direct [Y, Z, X];
    GROUP_ZXY_DIRECT: Group Direct [Z, X, Y];
    GROUP_ZYX_DIRECT: Group Direct [Z, Y, X];
    GROUP_XYZ_LOOP: Group Loop [X, Y, Z];
    GROUP_XZY_LOOP: Group Loop [X, Z, Y];
    GROUP_YXZ_LOOP: Group Loop [Y, X, Z];
    GROUP_YZX_LOOP: Group Loop [Y, Z, X];
    GROUP_ZXY_LOOP: Group Loop [Z, X, Y];
    GROUP_ZYX_LOOP: Group Loop [Z, Y, X];
    LANE_XYZ_DIRECT: Lane Direct [X, Y, Z];
    LANE_XYZ_LOOP: Lane Loop [X, Y, Z];
    GLOBAL_XYZ: Global Direct [X, Y, Z];
    GLOBAL_XZY: Global Direct [X, Z, Y];
    GLOBAL_YXZ: Global Direct [Y, X, Z];
    GLOBAL_YZX: Global Direct [Y, Z, X];
    GLOBAL_ZXY: Global Direct [Z, X, Y];
    GLOBAL_ZYX: Global Direct [Z, Y, X];
    GLOBAL_XYZ_LOOP: Global Loop [X, Y, Z];
}
