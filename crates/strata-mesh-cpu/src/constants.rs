//! Shared constants for strata-mesh-cpu.

pub const VERTS_PER_FACE: usize = 4;
pub const INDICES_PER_FACE: usize = 6;

/// Largest vertex count whose indices still fit a `u16` buffer.
pub const MAX_U16_VERTICES: usize = 1 << 16;

/// Per-vertex material slots are `u8`.
pub const MAX_MATERIALS_PER_CATEGORY: usize = 256;

// Fixed-point scales for narrowed geometry
pub const POSITION_SCALE: f32 = 1024.0;
pub const NORMAL_SCALE: f32 = 127.0;

pub(crate) const EMPTY_CELL: u32 = u32::MAX;
