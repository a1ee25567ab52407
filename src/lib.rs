//! `weft` maps multidimensional iteration spaces onto grouped parallel execution topologies.
//! A loop body is written once over abstract index segments; a mapping policy decides which
//! coordinate of the topology runs which indices.
//!
//! ## Key Components
//! 1. **Iteration Spaces**:
//!    - Index cursors over integral offsets (`NumericIndex`, `StridedIndex`).
//!    - Contiguous and strided segments (`RangeSegment`, `StridedSegment`), sliceable into tiles.
//!
//! 2. **Topologies**:
//!    - A grid of groups, each holding the same block of lanes, on up to three axes (`Topology`).
//!    - Sizing a topology to cover an extent within hardware `Limits`.
//!
//! 3. **Mapping Policies**:
//!    - Group, lane or flattened global coordinates, traversed directly or in a grid-stride loop.
//!    - One named constant per common combination (`policy::LANE_X_DIRECT`, ...).
//!    - Index or tile granularity through the `loop_*` and `tile_*` entry points.
//!
//! 4. **Execution Model**:
//!    - The `Runtime` trait for backends that run one invocation per coordinate.
//!    - A `Launcher` that sizes, submits and optionally waits for launches.
//!    - An in-process `Host` runtime with ordered streams and parallel groups.
//!
//! ## Design Principles
//! - **Portability**: bodies see only their `LaunchContext`, never the backend.
//! - **Static Checking**: policy arity is part of the type; duplicate axes fail at compile time.
//! - **Explicit Failure**: empty, rejected and faulted launches are distinct outcomes.

pub mod iter;
pub mod launch;
pub mod mapping;
pub mod platform;
pub mod policy;
pub mod segment;
pub mod topology;

pub use iter::{Cursor, NumericIndex, Offset, StridedIndex};
pub use launch::{
    Host, HostBuilder, LaunchCounters, LaunchError, LaunchOptions, LaunchStatus, Launcher,
    Runtime, RuntimeError, StreamId,
};
pub use mapping::LaunchContext;
pub use policy::{MappingError, Mode, Policy, Role, Tile};
pub use segment::{RangeSegment, Segment, StridedSegment};
pub use topology::{Axis, Coord, Dim3, Limits, Sizing, Topology};
