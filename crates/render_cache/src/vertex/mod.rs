//! # Vertex Layouts
//!
//! The fixed set of vertex record shapes the cache batches. Each layout is a
//! combination of [`VertexComponents`]; the byte stride and the device-level
//! [`VertexDeclaration`] are both derived from that combination and never
//! change for the lifetime of the process.
//!
//! Typed vertex records implement [`Vertex`] so callers can submit slices of
//! plain structs instead of raw bytes.

mod primitive;

pub use primitive::PrimitiveKind;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::error::CacheError;

bitflags! {
    /// Components present in a vertex record, in declaration order
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VertexComponents: u32 {
        /// Untransformed position, 3 floats
        const POSITION = 1 << 0;
        /// Screen-space position with reciprocal w, 4 floats
        const TRANSFORMED = 1 << 1;
        /// Normal vector, 3 floats
        const NORMAL = 1 << 2;
        /// Packed ARGB diffuse color, 4 bytes
        const DIFFUSE = 1 << 3;
        /// First texture coordinate set, 2 floats
        const TEX1 = 1 << 4;
        /// Second texture coordinate set, 2 floats
        const TEX2 = 1 << 5;
    }
}

impl VertexComponents {
    /// Byte stride of a record containing these components
    pub const fn stride(self) -> usize {
        let mut stride = 0;
        if self.contains(Self::POSITION) {
            stride += 12;
        }
        if self.contains(Self::TRANSFORMED) {
            stride += 16;
        }
        if self.contains(Self::NORMAL) {
            stride += 12;
        }
        if self.contains(Self::DIFFUSE) {
            stride += 4;
        }
        if self.contains(Self::TEX1) {
            stride += 8;
        }
        if self.contains(Self::TEX2) {
            stride += 8;
        }
        stride
    }
}

/// Supported vertex record shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexLayout {
    /// Position only
    Position,
    /// Position + one uv set
    PositionTex,
    /// Position + normal + one uv set (lit, textured models)
    PositionNormalTex,
    /// Position + normal + two uv sets (lightmapped models)
    PositionNormalTex2,
    /// Position + diffuse color
    PositionColor,
    /// Position + diffuse color + one uv set
    PositionColorTex,
    /// Position + diffuse color + two uv sets (terrain)
    PositionColorTex2,
    /// Screen-space position + diffuse color
    TransformedColor,
    /// Screen-space position + diffuse color + one uv set (UI, text)
    TransformedColorTex,
}

impl VertexLayout {
    /// Number of supported layouts
    pub const COUNT: usize = 9;

    /// Every supported layout, indexed by [`VertexLayout::index`]
    pub const ALL: [Self; Self::COUNT] = [
        Self::Position,
        Self::PositionTex,
        Self::PositionNormalTex,
        Self::PositionNormalTex2,
        Self::PositionColor,
        Self::PositionColorTex,
        Self::PositionColorTex2,
        Self::TransformedColor,
        Self::TransformedColorTex,
    ];

    /// Dense index of this layout, suitable for fixed-size registries
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Components making up this layout
    pub const fn components(self) -> VertexComponents {
        use VertexComponents as C;
        match self {
            Self::Position => C::POSITION,
            Self::PositionTex => C::POSITION.union(C::TEX1),
            Self::PositionNormalTex => C::POSITION.union(C::NORMAL).union(C::TEX1),
            Self::PositionNormalTex2 => C::POSITION.union(C::NORMAL).union(C::TEX1).union(C::TEX2),
            Self::PositionColor => C::POSITION.union(C::DIFFUSE),
            Self::PositionColorTex => C::POSITION.union(C::DIFFUSE).union(C::TEX1),
            Self::PositionColorTex2 => C::POSITION.union(C::DIFFUSE).union(C::TEX1).union(C::TEX2),
            Self::TransformedColor => C::TRANSFORMED.union(C::DIFFUSE),
            Self::TransformedColorTex => C::TRANSFORMED.union(C::DIFFUSE).union(C::TEX1),
        }
    }

    /// Byte stride of one vertex record
    pub const fn stride(self) -> usize {
        self.components().stride()
    }

    /// Whether positions are already in screen space
    pub const fn is_transformed(self) -> bool {
        self.components().contains(VertexComponents::TRANSFORMED)
    }

    /// Device-level declaration describing this layout
    pub fn declaration(self) -> VertexDeclaration {
        VertexDeclaration::from_components(self, self.components())
    }
}

impl TryFrom<u32> for VertexLayout {
    type Error = CacheError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(CacheError::UnsupportedLayout(value))
    }
}

/// Storage format of one declaration element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementFormat {
    /// Two 32-bit floats
    Float2,
    /// Three 32-bit floats
    Float3,
    /// Four 32-bit floats
    Float4,
    /// Packed 8-bit-per-channel ARGB color
    Color,
}

impl ElementFormat {
    /// Size of the element in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::Color => 4,
        }
    }
}

/// Semantic of one declaration element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementUsage {
    /// Object or world space position
    Position,
    /// Screen-space position with reciprocal w
    PositionTransformed,
    /// Normal vector
    Normal,
    /// Diffuse color
    Color,
    /// Texture coordinate set
    TexCoord(u8),
}

/// One element of a vertex declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// Byte offset within the vertex record
    pub offset: usize,
    /// Storage format
    pub format: ElementFormat,
    /// Semantic
    pub usage: ElementUsage,
}

/// Ordered element list for one vertex layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDeclaration {
    /// Layout this declaration describes
    pub layout: VertexLayout,
    /// Elements in record order
    pub elements: Vec<VertexElement>,
    /// Total record size in bytes
    pub stride: usize,
}

impl VertexDeclaration {
    fn from_components(layout: VertexLayout, components: VertexComponents) -> Self {
        const ORDER: [(VertexComponents, ElementFormat, ElementUsage); 6] = [
            (VertexComponents::POSITION, ElementFormat::Float3, ElementUsage::Position),
            (VertexComponents::TRANSFORMED, ElementFormat::Float4, ElementUsage::PositionTransformed),
            (VertexComponents::NORMAL, ElementFormat::Float3, ElementUsage::Normal),
            (VertexComponents::DIFFUSE, ElementFormat::Color, ElementUsage::Color),
            (VertexComponents::TEX1, ElementFormat::Float2, ElementUsage::TexCoord(0)),
            (VertexComponents::TEX2, ElementFormat::Float2, ElementUsage::TexCoord(1)),
        ];

        let mut elements = Vec::with_capacity(ORDER.len());
        let mut offset = 0;
        for (component, format, usage) in ORDER {
            if components.contains(component) {
                elements.push(VertexElement { offset, format, usage });
                offset += format.size();
            }
        }

        Self {
            layout,
            elements,
            stride: offset,
        }
    }
}

/// A plain vertex record with a fixed layout
pub trait Vertex: Pod {
    /// Layout the record's memory matches
    const LAYOUT: VertexLayout;
}

/// Position-only vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    /// Position
    pub position: [f32; 3],
}

impl Vertex for PositionVertex {
    const LAYOUT: VertexLayout = VertexLayout::Position;
}

/// Position + packed ARGB color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    /// Position
    pub position: [f32; 3],
    /// Packed ARGB color
    pub color: u32,
}

impl Vertex for ColorVertex {
    const LAYOUT: VertexLayout = VertexLayout::PositionColor;
}

/// Position + normal + uv, the common model vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    /// Position
    pub position: [f32; 3],
    /// Normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex for ModelVertex {
    const LAYOUT: VertexLayout = VertexLayout::PositionNormalTex;
}

/// Position + color + two uv sets, used by terrain
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// Position
    pub position: [f32; 3],
    /// Packed ARGB color
    pub color: u32,
    /// Base texture coordinates
    pub uv0: [f32; 2],
    /// Detail texture coordinates
    pub uv1: [f32; 2],
}

impl Vertex for TerrainVertex {
    const LAYOUT: VertexLayout = VertexLayout::PositionColorTex2;
}

/// Screen-space color + uv vertex, used by UI and text
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ScreenVertex {
    /// Screen position with reciprocal w
    pub position: [f32; 4],
    /// Packed ARGB color
    pub color: u32,
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex for ScreenVertex {
    const LAYOUT: VertexLayout = VertexLayout::TransformedColorTex;
}

/// Pack an RGBA color into the ARGB layout used by [`VertexComponents::DIFFUSE`]
pub const fn pack_argb(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}
