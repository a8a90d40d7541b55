//! Primitive topologies and element/primitive count conversions

use crate::error::CacheError;

/// Primitive topology of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveKind {
    /// Isolated points
    PointList,
    /// Independent line segments, two elements each
    LineList,
    /// Connected line segments
    LineStrip,
    /// Independent triangles, three elements each
    TriangleList,
    /// Connected triangles
    TriangleStrip,
}

impl PrimitiveKind {
    /// Number of supported primitive kinds
    pub const COUNT: usize = 5;

    /// Every supported primitive kind
    pub const ALL: [Self; Self::COUNT] = [
        Self::PointList,
        Self::LineList,
        Self::LineStrip,
        Self::TriangleList,
        Self::TriangleStrip,
    ];

    /// Number of primitives described by `elements` vertices or indices
    ///
    /// List kinds use truncating division; an element count that is not a
    /// multiple of the list stride loses the trailing partial primitive.
    pub const fn primitive_count(self, elements: usize) -> usize {
        match self {
            Self::PointList => elements,
            Self::LineList => elements / 2,
            Self::LineStrip => elements.saturating_sub(1),
            Self::TriangleList => elements / 3,
            Self::TriangleStrip => elements.saturating_sub(2),
        }
    }

    /// Number of elements needed to draw `primitives` primitives
    pub const fn element_count(self, primitives: usize) -> usize {
        if primitives == 0 {
            return 0;
        }
        match self {
            Self::PointList => primitives,
            Self::LineList => primitives * 2,
            Self::LineStrip => primitives + 1,
            Self::TriangleList => primitives * 3,
            Self::TriangleStrip => primitives + 2,
        }
    }

    /// Whether primitives are independent of their neighbours
    pub const fn is_list(self) -> bool {
        matches!(self, Self::PointList | Self::LineList | Self::TriangleList)
    }

    /// Dense index, suitable for fixed-size registries
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Device numbering: 1 = point list through 5 = triangle strip
impl TryFrom<u32> for PrimitiveKind {
    type Error = CacheError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::PointList),
            2 => Ok(Self::LineList),
            3 => Ok(Self::LineStrip),
            4 => Ok(Self::TriangleList),
            5 => Ok(Self::TriangleStrip),
            other => Err(CacheError::UnsupportedPrimitive(other)),
        }
    }
}
