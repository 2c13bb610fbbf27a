//! 2D primitive builders.

use flightdeck_rhi::vertex::{Index, Vertex};
use glam::{Vec2, Vec3};
use tracing::trace;

/// Red.
pub const RED: Vec3 = Vec3::new(1.0, 0.0, 0.0);
/// Green.
pub const GREEN: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Growing vertex/index arrays that primitives append to.
///
/// Every primitive records its indices relative to the vertex count at the
/// time it was added, so primitives never alias each other's vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    /// Vertex array.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices.
    pub indices: Vec<Index>,
}

impl Geometry {
    /// Creates empty geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all primitives, keeping the allocations.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Returns true if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Consumes the builder, returning `(vertices, indices)`.
    pub fn into_parts(self) -> (Vec<Vertex>, Vec<Index>) {
        (self.vertices, self.indices)
    }

    fn offset(&self) -> Index {
        self.vertices.len() as Index
    }

    fn push_point(&mut self, point: Vec2, color: Vec3) {
        self.vertices
            .push(Vertex::new(point.extend(0.0), color, Vec2::ZERO));
    }

    /// Appends a triangle with the points in the given order.
    pub fn add_triangle(&mut self, a: Vec2, b: Vec2, c: Vec2, color: Vec3) {
        let offset = self.offset();
        for point in [a, b, c] {
            self.push_point(point, color);
        }
        self.indices
            .extend_from_slice(&[offset, offset + 1, offset + 2]);
    }

    /// Appends an axis-aligned square grown up and to the right from
    /// `bottom_left`.
    ///
    /// Vertices go counter-clockwise starting at the bottom-left corner.
    pub fn add_square(&mut self, bottom_left: Vec2, length: f32, color: Vec3) {
        let corners = [
            bottom_left,
            bottom_left + Vec2::new(length, 0.0),
            bottom_left + Vec2::new(length, length),
            bottom_left + Vec2::new(0.0, length),
        ];
        self.add_quad(corners, color);
    }

    /// Appends a rectangle of the given thickness centered on the segment
    /// from `start` to `end`.
    ///
    /// A zero-length segment has no direction and emits nothing.
    pub fn add_line(&mut self, start: Vec2, end: Vec2, thickness: f32, color: Vec3) {
        let Some(normal) = unit_normal(end - start) else {
            trace!("Skipping zero-length line at {start}");
            return;
        };
        let half = normal * (thickness / 2.0);
        self.add_quad([start - half, end - half, end + half, start + half], color);
    }

    fn add_quad(&mut self, corners: [Vec2; 4], color: Vec3) {
        let offset = self.offset();
        for corner in corners {
            self.push_point(corner, color);
        }
        self.indices.extend(
            [0, 1, 2, 2, 3, 0]
                .iter()
                .map(|i| offset + i),
        );
    }
}

/// Left-hand perpendicular of `direction`, normalized.
///
/// Returns `None` for a zero vector.
pub fn unit_normal(direction: Vec2) -> Option<Vec2> {
    direction.perp().try_normalize()
}

/// Two textured quads stacked along Z, used when no geometry is supplied.
pub fn default_quads() -> Geometry {
    let corners = [
        (Vec2::new(-0.5, -0.5), Vec3::new(1.0, 0.0, 0.0), Vec2::new(1.0, 0.0)),
        (Vec2::new(0.5, -0.5), Vec3::new(0.0, 1.0, 0.0), Vec2::new(0.0, 0.0)),
        (Vec2::new(0.5, 0.5), Vec3::new(0.0, 0.0, 1.0), Vec2::new(0.0, 1.0)),
        (Vec2::new(-0.5, 0.5), Vec3::new(1.0, 1.0, 1.0), Vec2::new(1.0, 1.0)),
    ];

    let mut geometry = Geometry::new();
    for z in [0.0, -0.5] {
        let offset = geometry.offset();
        for (xy, color, uv) in corners {
            geometry.vertices.push(Vertex::new(xy.extend(z), color, uv));
        }
        geometry
            .indices
            .extend([0, 1, 2, 2, 3, 0].iter().map(|i| offset + i));
    }
    geometry
}
