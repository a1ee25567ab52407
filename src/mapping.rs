//! Decides which work units the current coordinate owns, and runs the loop body on them.
//!
//! Every entry point takes the [`LaunchContext`] of one coordinate. Invoked once for every
//! coordinate of a topology, they visit each index (or tile) of the segments exactly once,
//! provided the topology has enough coordinates along the mapped axes for direct policies.
//!
//! | entry point          | body arguments                                  |
//! |----------------------|-------------------------------------------------|
//! | `loop_N`             | one offset per segment                          |
//! | `loop_icount_N`      | one offset per segment, then one element index  |
//! | `tile_N`             | one sub-segment per segment                     |
//! | `tile_icount_N`      | one sub-segment per segment, then one tile index|

use weft_derive::build_mapping;

use crate::{
    iter::Offset,
    policy::{Mode, Policy, Role, Tile},
    segment::Segment,
    topology::{Axis, Coord, Topology},
};

/// What a loop body can see of the launch it runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchContext {
    topology: Topology,
    coord: Coord,
    shared_memory: usize,
}

impl LaunchContext {
    #[inline]
    pub fn new(topology: Topology, coord: Coord) -> Self {
        Self {
            topology,
            coord,
            shared_memory: 0,
        }
    }

    #[inline]
    pub fn with_shared_memory(self, shared_memory: usize) -> Self {
        Self {
            shared_memory,
            ..self
        }
    }

    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[inline]
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Bytes of shared scratch memory requested per group.
    #[inline]
    pub fn shared_memory(&self) -> usize {
        self.shared_memory
    }

    /// Index of this coordinate along `axis` at the level of `role`.
    #[inline]
    pub fn index(&self, role: Role, axis: Axis) -> usize {
        let group = self.coord.group.get(axis);
        let lane = self.coord.lane.get(axis);
        match role {
            Role::Group => group,
            Role::Lane => lane,
            Role::Global => self
                .topology
                .lanes
                .get(axis)
                .saturating_mul(group)
                .saturating_add(lane),
        }
    }

    /// Number of coordinates along `axis` at the level of `role`.
    #[inline]
    pub fn count(&self, role: Role, axis: Axis) -> usize {
        let groups = self.topology.groups.get(axis);
        let lanes = self.topology.lanes.get(axis);
        match role {
            Role::Group => groups,
            Role::Lane => lanes,
            Role::Global => lanes.saturating_mul(groups),
        }
    }
}

/// Offsets into one segment owned by one coordinate, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Walk {
    next: usize,
    step: usize,
    len: usize,
}

impl Walk {
    /// Walks a segment of `len` elements in units of `tile` elements.
    pub fn new(
        ctx: &LaunchContext,
        role: Role,
        mode: Mode,
        axis: Axis,
        len: usize,
        tile: usize,
    ) -> Self {
        let next = ctx.index(role, axis).saturating_mul(tile);
        let step = match mode {
            Mode::Direct => 0,
            Mode::Loop => ctx.count(role, axis).saturating_mul(tile),
        };
        Self { next, step, len }
    }
}

impl Iterator for Walk {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let current = self.next;
        self.next = match self.step {
            0 => self.len,
            step => current.saturating_add(step),
        };
        Some(current)
    }
}

impl<const N: usize> Policy<N> {
    /// Walks segment `k` of `len` elements in units of `tile` elements from `ctx`.
    #[inline]
    pub fn walk(&self, ctx: &LaunchContext, k: usize, len: usize, tile: usize) -> Walk {
        Walk::new(ctx, self.role(), self.mode(), self.axis(k), len, tile)
    }
}

build_mapping!(1);
build_mapping!(2);
build_mapping!(3);

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

    use super::{
        LaunchContext, Walk, loop_1, loop_2, loop_3, loop_icount_1, loop_icount_2, loop_icount_3,
        tile_1, tile_2, tile_3, tile_icount_1, tile_icount_2, tile_icount_3,
    };
    use crate::{
        iter::Offset,
        policy::{self, Mode, Policy, Role, Tile},
        segment::{RangeSegment, Segment, StridedSegment},
        topology::{Axis, Coord, Dim3, Topology},
    };

    /// Runs `f` once for every coordinate of `topology`, in order.
    fn emulate(topology: Topology, mut f: impl FnMut(&LaunchContext)) {
        for coord in topology.coords() {
            f(&LaunchContext::new(topology, coord));
        }
    }

    #[test]
    fn test_context_index() {
        let topology = Topology::new((4, 2), (8, 3));
        let coord = Coord {
            group: Dim3::new(2, 1, 0),
            lane: Dim3::new(5, 2, 0),
        };
        let ctx = LaunchContext::new(topology, coord);
        assert_eq!(ctx.index(Role::Group, Axis::X), 2);
        assert_eq!(ctx.index(Role::Lane, Axis::X), 5);
        assert_eq!(ctx.index(Role::Global, Axis::X), 21);
        assert_eq!(ctx.index(Role::Global, Axis::Y), 5);
        assert_eq!(ctx.count(Role::Group, Axis::Y), 2);
        assert_eq!(ctx.count(Role::Lane, Axis::Y), 3);
        assert_eq!(ctx.count(Role::Global, Axis::X), 32);
        assert_eq!(ctx.count(Role::Global, Axis::Z), 1);
    }

    #[test]
    fn test_context_index_saturates() {
        let topology = Topology::new(usize::MAX, 4);
        let coord = Coord {
            group: Dim3::new(usize::MAX - 1, 0, 0),
            lane: Dim3::new(3, 0, 0),
        };
        let ctx = LaunchContext::new(topology, coord);
        assert_eq!(ctx.index(Role::Global, Axis::X), usize::MAX);
        assert_eq!(ctx.count(Role::Global, Axis::X), usize::MAX);

        // a saturated index lies past any segment, so the walk is empty
        let walk = Walk::new(&ctx, Role::Global, Mode::Direct, Axis::X, 100, 1);
        assert_eq!(walk.count(), 0);
    }

    #[test]
    fn test_walk() {
        let topology = Topology::new(1, 8);
        let coord = Coord {
            lane: Dim3::new(3, 0, 0),
            ..Coord::ORIGIN
        };
        let ctx = LaunchContext::new(topology, coord);

        let walk = Walk::new(&ctx, Role::Lane, Mode::Direct, Axis::X, 100, 1);
        assert_eq!(walk.collect_vec(), [3]);
        let walk = Walk::new(&ctx, Role::Lane, Mode::Direct, Axis::X, 3, 1);
        assert_eq!(walk.count(), 0);
        let walk = Walk::new(&ctx, Role::Lane, Mode::Loop, Axis::X, 30, 1);
        assert_eq!(walk.collect_vec(), [3, 11, 19, 27]);
        let walk = Walk::new(&ctx, Role::Lane, Mode::Loop, Axis::X, 100, 4);
        assert_eq!(walk.collect_vec(), [12, 44, 76]);
    }

    #[test]
    fn test_direct_1d() {
        let topology = Topology::new(1, 32);
        let segment = RangeSegment::new(40, 57);
        assert_eq!(segment.len(), 17);

        let mut calls: HashMap<usize, Vec<Offset>> = HashMap::default();
        emulate(topology, |ctx| {
            loop_1(ctx, &policy::LANE_X_DIRECT, &segment, |i| {
                calls.entry(ctx.coord().lane.x).or_default().push(i)
            })
        });

        assert_eq!(calls.len(), 17);
        for lane in 0..32 {
            match lane < 17 {
                true => assert_eq!(calls[&lane], [40 + lane as Offset]),
                false => assert!(!calls.contains_key(&lane)),
            }
        }
    }

    #[test]
    fn test_loop_1d() {
        let topology = Topology::new(1, 8);
        let segment = RangeSegment::new(0, 100);

        let mut calls: HashMap<usize, Vec<Offset>> = HashMap::default();
        emulate(topology, |ctx| {
            loop_1(ctx, &policy::LANE_X_LOOP, &segment, |i| {
                calls.entry(ctx.coord().lane.x).or_default().push(i)
            })
        });

        for (&lane, indices) in &calls {
            let expected = (lane as Offset..100).step_by(8).collect_vec();
            assert_eq!(indices, &expected);
        }
        let visited = calls.values().flatten().copied().sorted().collect_vec();
        assert_eq!(visited, (0..100).collect_vec());
    }

    #[test]
    fn test_group_loop_1d() {
        let topology = Topology::new(3, 4);
        let segment = RangeSegment::new(0, 10);

        let mut visited = vec![];
        emulate(topology, |ctx| {
            loop_1(ctx, &policy::GROUP_X_LOOP, &segment, |i| visited.push((ctx.coord().group.x, i)))
        });

        // every lane of a group visits the group's indices
        assert_eq!(visited.len(), 10 * 4);
        assert!(visited.iter().all(|&(group, i)| i as usize % 3 == group));
    }

    #[test]
    fn test_global_direct_1d() {
        let topology = Topology::new(4, 8);
        let segment = RangeSegment::new(0, 29);

        let mut visited = vec![];
        emulate(topology, |ctx| loop_1(ctx, &policy::GLOBAL_X, &segment, |i| visited.push(i)));
        assert_eq!(visited.into_iter().sorted().collect_vec(), (0..29).collect_vec());
    }

    #[test]
    fn test_strided_segment() {
        let topology = Topology::new(1, 4);
        let segment = StridedSegment::new(1, 20, 3);

        let mut visited = vec![];
        emulate(topology, |ctx| loop_1(ctx, &policy::LANE_X_LOOP, &segment, |i| visited.push(i)));
        assert_eq!(visited.into_iter().sorted().collect_vec(), [1, 4, 7, 10, 13, 16, 19]);
    }

    #[test]
    fn test_direct_2d() {
        let topology = Topology::new(1, (8, 8));
        let x = RangeSegment::new(0, 5);
        let y = RangeSegment::new(0, 3);

        let mut visited = vec![];
        emulate(topology, |ctx| {
            loop_2(ctx, &policy::LANE_XY_DIRECT, &x, &y, |i, j| visited.push((i, j)))
        });

        assert_eq!(visited.len(), 15);
        let unique: HashSet<_> = visited.iter().copied().collect();
        assert_eq!(unique.len(), 15);
        assert!(unique.iter().all(|&(i, j)| (0..5).contains(&i) && (0..3).contains(&j)));
    }

    #[test]
    fn test_loop_2d_order() {
        let topology = Topology::new((2, 2), 1);
        let x = RangeSegment::new(0, 4);
        let y = RangeSegment::new(10, 13);

        let mut calls: HashMap<Dim3, Vec<(Offset, Offset)>> = HashMap::default();
        emulate(topology, |ctx| {
            loop_2(ctx, &policy::GROUP_XY_LOOP, &x, &y, |i, j| {
                calls.entry(ctx.coord().group).or_default().push((i, j))
            })
        });

        assert_eq!(calls.values().map(Vec::len).sum::<usize>(), 12);
        // axis 0 is the outer loop
        assert_eq!(calls[&Dim3::new(0, 0, 0)], [(0, 10), (0, 12), (2, 10), (2, 12)]);
        assert_eq!(calls[&Dim3::new(1, 1, 0)], [(1, 11), (3, 11)]);
    }

    #[test]
    fn test_swapped_axes() {
        let topology = Topology::new(1, (2, 6));
        let a = RangeSegment::new(0, 6);
        let b = RangeSegment::new(0, 2);

        let mut visited = vec![];
        emulate(topology, |ctx| {
            loop_2(ctx, &policy::LANE_YX_DIRECT, &a, &b, |i, j| {
                assert_eq!(i as usize, ctx.coord().lane.y);
                assert_eq!(j as usize, ctx.coord().lane.x);
                visited.push((i, j));
            })
        });
        assert_eq!(visited.len(), 12);
    }

    #[test]
    fn test_direct_3d() -> Result<(), Box<dyn std::error::Error>> {
        fastrand::seed(42);

        let policy = Policy::try_new(Role::Global, Mode::Direct, [Axis::X, Axis::Y, Axis::Z])?;
        for _ in 0..8 {
            let extent = Dim3::new(
                fastrand::usize(1..12),
                fastrand::usize(1..12),
                fastrand::usize(1..6),
            );
            let topology = Topology::new((3, 3, 2), (4, 4, 3));
            let x = RangeSegment::new(0, extent.x as Offset);
            let y = RangeSegment::new(100, 100 + extent.y as Offset);
            let z = RangeSegment::new(-50, -50 + extent.z as Offset);

            let mut visited = vec![];
            emulate(topology, |ctx| {
                loop_3(ctx, &policy, &x, &y, &z, |i, j, k| visited.push((i, j, k)))
            });

            let expected = itertools::iproduct!(x.iter(), y.iter(), z.iter())
                .sorted()
                .collect_vec();
            assert_eq!(visited.into_iter().sorted().collect_vec(), expected);
        }
        Ok(())
    }

    #[test]
    fn test_loop_3d_coverage() {
        let topology = Topology::new((2, 3, 2), 1);
        let x = RangeSegment::new(0, 5);
        let y = RangeSegment::new(0, 7);
        let z = RangeSegment::new(0, 3);

        let mut visited = vec![];
        emulate(topology, |ctx| {
            loop_icount_3(ctx, &policy::GROUP_XYZ_LOOP, &x, &y, &z, |i, j, k, ci, cj, ck| {
                assert_eq!((i, j, k), (ci as Offset, cj as Offset, ck as Offset));
                visited.push((i, j, k));
            })
        });
        assert_eq!(visited.len(), 5 * 7 * 3);
        let unique: HashSet<_> = visited.into_iter().collect();
        assert_eq!(unique.len(), 5 * 7 * 3);
    }

    #[test]
    fn test_icount() {
        let topology = Topology::new(1, 4);
        let segment = RangeSegment::new(10, 20);

        let mut visited = vec![];
        emulate(topology, |ctx| {
            loop_icount_1(ctx, &policy::LANE_X_LOOP, &segment, |i, count| visited.push((i, count)))
        });
        assert_eq!(visited.len(), 10);
        assert!(visited.iter().all(|&(i, count)| i == 10 + count as Offset));
    }

    #[test]
    fn test_icount_swapped_axes() {
        // segment `a` runs along y (3 lanes), segment `b` along x (2 lanes)
        let topology = Topology::new(1, (2, 3));
        let a = RangeSegment::new(10, 17);
        let b = RangeSegment::new(-5, 0);

        let mut counts = vec![];
        emulate(topology, |ctx| {
            loop_icount_2(ctx, &policy::LANE_YX_LOOP, &a, &b, |i, j, ci, cj| {
                assert_eq!(i, 10 + ci as Offset);
                assert_eq!(j, -5 + cj as Offset);
                assert_eq!(ci % 3, ctx.coord().lane.y);
                assert_eq!(cj % 2, ctx.coord().lane.x);
                counts.push((ci, cj));
            })
        });
        let expected = itertools::iproduct!(0..7, 0..5).collect_vec();
        assert_eq!(counts.into_iter().sorted().collect_vec(), expected);
    }

    #[test]
    fn test_tile() {
        let segment = RangeSegment::new(0, 10);
        let tile = Tile::new([4]);

        for policy in [policy::LANE_X_DIRECT, policy::LANE_X_LOOP] {
            let topology = Topology::new(1, 3);
            let mut tiles = vec![];
            emulate(topology, |ctx| tile_1(ctx, &policy, &tile, &segment, |t| tiles.push(t)));
            assert_eq!(
                tiles,
                [RangeSegment::new(0, 4), RangeSegment::new(4, 8), RangeSegment::new(8, 10)]
            );
        }

        // two lanes looping over three tiles
        let topology = Topology::new(1, 2);
        let mut tiles = vec![];
        emulate(topology, |ctx| {
            tile_icount_1(ctx, &policy::LANE_X_LOOP, &tile, &segment, |t, index| {
                tiles.push((ctx.coord().lane.x, index, t.len()))
            })
        });
        assert_eq!(tiles, [(0, 0, 4), (0, 2, 2), (1, 1, 4)]);

        // direct mapping leaves the third tile out
        let mut tiles = vec![];
        emulate(topology, |ctx| {
            tile_1(ctx, &policy::LANE_X_DIRECT, &tile, &segment, |t| tiles.push(t))
        });
        assert_eq!(tiles.len(), 2);
    }

    #[test]
    fn test_tile_2d() {
        let topology = Topology::new((2, 2), 1);
        let x = RangeSegment::new(0, 10);
        let y = RangeSegment::new(0, 5);
        let tile = Tile::new([4, 3]);

        let mut covered = vec![];
        emulate(topology, |ctx| {
            tile_2(ctx, &policy::GROUP_XY_LOOP, &tile, &x, &y, |tx, ty| {
                assert!(tx.len() <= 4 && ty.len() <= 3);
                covered.extend(itertools::iproduct!(tx.iter(), ty.iter()));
            })
        });
        let expected = itertools::iproduct!(x.iter(), y.iter()).collect_vec();
        assert_eq!(covered.into_iter().sorted().collect_vec(), expected);
    }

    #[test]
    fn test_tile_icount_2d() {
        let topology = Topology::new(1, (2, 2));
        let x = RangeSegment::new(0, 10);
        let y = RangeSegment::new(0, 5);
        let tile = Tile::new([4, 3]);

        let mut tiles = vec![];
        emulate(topology, |ctx| {
            tile_icount_2(ctx, &policy::LANE_XY_LOOP, &tile, &x, &y, |tx, ty, ix, iy| {
                tiles.push((ix, iy, tx.at(0), tx.len(), ty.at(0), ty.len()))
            })
        });
        assert_eq!(
            tiles.into_iter().sorted().collect_vec(),
            [
                (0, 0, 0, 4, 0, 3),
                (0, 1, 0, 4, 3, 2),
                (1, 0, 4, 4, 0, 3),
                (1, 1, 4, 4, 3, 2),
                (2, 0, 8, 2, 0, 3),
                (2, 1, 8, 2, 3, 2),
            ]
        );
    }

    #[test]
    fn test_tile_3d() {
        let topology = Topology::new((2, 1, 2), 1);
        let x = RangeSegment::new(0, 5);
        let y = RangeSegment::new(0, 3);
        let z = StridedSegment::new(0, 10, 2);
        let tile = Tile::new([2, 3, 4]);
        let groups = policy::GROUP_XYZ_LOOP;

        let mut indices = vec![];
        let mut covered = vec![];
        emulate(topology, |ctx| {
            tile_icount_3(ctx, &groups, &tile, &x, &y, &z, |tx, ty, tz, ix, iy, iz| {
                assert_eq!(tx.at(0), 2 * ix as Offset);
                assert_eq!(tx.len(), usize::min(2, 5 - 2 * ix));
                assert_eq!((iy, ty.len()), (0, 3));
                assert_eq!(tz.at(0), 8 * iz as Offset);
                assert_eq!(tz.len(), usize::min(4, 5 - 4 * iz));
                indices.push((ix, iy, iz));
                covered.extend(itertools::iproduct!(tx.iter(), ty.iter(), tz.iter()));
            })
        });
        let expected = itertools::iproduct!(0..3, 0..1, 0..2).collect_vec();
        assert_eq!(indices.into_iter().sorted().collect_vec(), expected);

        let expected = itertools::iproduct!(x.iter(), y.iter(), z.iter()).sorted().collect_vec();
        assert_eq!(covered.into_iter().sorted().collect_vec(), expected);

        let mut covered = vec![];
        emulate(topology, |ctx| {
            tile_3(ctx, &groups, &tile, &x, &y, &z, |tx, ty, tz| {
                covered.extend(itertools::iproduct!(tx.iter(), ty.iter(), tz.iter()))
            })
        });
        assert_eq!(covered.into_iter().sorted().collect_vec(), expected);
    }

    #[test]
    fn test_empty() {
        let segment = RangeSegment::new(0, 10);
        let mut calls = 0;
        for topology in [Topology::new(0, 8), Topology::new(1, 0)] {
            emulate(topology, |ctx| loop_1(ctx, &policy::LANE_X_LOOP, &segment, |_| calls += 1));
        }
        assert_eq!(calls, 0);

        let empty = RangeSegment::new(0, 0);
        emulate(Topology::new(2, 8), |ctx| {
            loop_1(ctx, &policy::GLOBAL_X_LOOP, &empty, |_| calls += 1)
        });
        assert_eq!(calls, 0);
    }
}
