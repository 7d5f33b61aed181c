//! Fixed cube mesh shared by every drawable.

/// Number of vertices in the cube (four per face).
pub const CUBE_VERTEX_COUNT: usize = 24;

/// Number of indices in the cube (two triangles per face).
pub const CUBE_INDEX_COUNT: usize = 36;

#[rustfmt::skip]
pub const CUBE_POSITIONS: [f32; CUBE_VERTEX_COUNT * 3] = [
    // front
    -0.5, -0.5, -0.5,   0.5, -0.5, -0.5,   0.5,  0.5, -0.5,  -0.5,  0.5, -0.5,
    // rear
    -0.5, -0.5,  0.5,  -0.5,  0.5,  0.5,   0.5,  0.5,  0.5,   0.5, -0.5,  0.5,
    // top
    -0.5,  0.5,  0.5,  -0.5,  0.5, -0.5,   0.5,  0.5, -0.5,   0.5,  0.5,  0.5,
    // bottom
    -0.5, -0.5,  0.5,   0.5, -0.5,  0.5,   0.5, -0.5, -0.5,  -0.5, -0.5, -0.5,
    // right
     0.5, -0.5,  0.5,   0.5,  0.5,  0.5,   0.5,  0.5, -0.5,   0.5, -0.5, -0.5,
    // left
    -0.5, -0.5,  0.5,  -0.5, -0.5, -0.5,  -0.5,  0.5, -0.5,  -0.5,  0.5,  0.5,
];

#[rustfmt::skip]
pub const CUBE_COLORS: [f32; CUBE_VERTEX_COUNT * 3] = [
    0.5, 0.0, 0.0,  0.5, 0.0, 0.0,  0.5, 0.0, 0.0,  0.5, 0.0, 0.0,
    0.0, 0.5, 0.0,  0.0, 0.5, 0.0,  0.0, 0.5, 0.0,  0.0, 0.5, 0.0,
    0.0, 0.0, 0.5,  0.0, 0.0, 0.5,  0.0, 0.0, 0.5,  0.0, 0.0, 0.5,
    0.5, 0.5, 0.0,  0.5, 0.5, 0.0,  0.5, 0.5, 0.0,  0.5, 0.5, 0.0,
    0.0, 0.5, 0.5,  0.0, 0.5, 0.5,  0.0, 0.5, 0.5,  0.0, 0.5, 0.5,
    0.5, 0.5, 0.5,  0.5, 0.5, 0.5,  0.5, 0.5, 0.5,  0.5, 0.5, 0.5,
];

pub const CUBE_INDICES: [u16; CUBE_INDEX_COUNT] = [
    0, 1, 2, 0, 2, 3, // front
    4, 5, 6, 4, 6, 7, // rear
    8, 9, 10, 8, 10, 11, // top
    12, 13, 14, 12, 14, 15, // bottom
    16, 17, 18, 16, 18, 19, // right
    20, 21, 22, 20, 22, 23, // left
];

/// Borrowed view over the vertex and index arrays of a mesh.
///
/// Positions and colors are tightly packed `f32x3` streams living in separate
/// vertex buffers; indices are `u16`.
#[derive(Debug, Clone, Copy)]
pub struct MeshData<'a> {
    pub positions: &'a [f32],
    pub colors: &'a [f32],
    pub indices: &'a [u16],
}

impl MeshData<'static> {
    /// The built-in unit cube centred on the origin.
    pub const fn cube() -> Self {
        Self {
            positions: &CUBE_POSITIONS,
            colors: &CUBE_COLORS,
            indices: &CUBE_INDICES,
        }
    }
}

impl MeshData<'_> {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Size in bytes a GPU buffer needs to hold `byte_len` bytes, rounded up to
/// the 4 byte copy alignment.
pub const fn padded_size(byte_len: usize) -> u64 {
    ((byte_len + 3) & !3) as u64
}
