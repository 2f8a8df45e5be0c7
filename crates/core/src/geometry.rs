/// Shared geometric primitives for display space and image space.

/// A pixel coordinate in source-image space.
///
/// Signed so that a box corner dragged past the image edge keeps its real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImagePoint {
    pub x: i32,
    pub y: i32,
}

impl ImagePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A position on the display surface, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

impl DisplayPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether `point` lies inside `[0, width) x [0, height)`.
    pub fn contains(self, point: ImagePoint) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as i64) < self.width as i64
            && (point.y as i64) < self.height as i64
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}

impl DisplaySize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}
