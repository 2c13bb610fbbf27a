//! Integration tests for the demo geometry.

use flightdeck_scene::Geometry;
use flightdeck_scene::shapes::{GREEN, RED};
use glam::{Vec2, Vec3};

/// Signed area of a 2D polygon; positive when counter-clockwise.
fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum::<f32>()
        / 2.0
}

#[test]
fn test_unit_square_at_origin() {
    let mut geometry = Geometry::new();
    geometry.add_square(Vec2::ZERO, 0.1, RED);

    assert_eq!(geometry.vertices.len(), 4);
    assert_eq!(geometry.indices, vec![0, 1, 2, 2, 3, 0]);
    assert_eq!(geometry.vertices[0].position, Vec3::ZERO);
    assert!(geometry.vertices.iter().all(|v| v.color == RED));

    let corners: Vec<Vec2> = geometry
        .vertices
        .iter()
        .map(|v| v.position.truncate())
        .collect();
    assert!(signed_area(&corners) > 0.0, "square must wind counter-clockwise");
    assert!((signed_area(&corners) - 0.01).abs() < 1e-6);
}

#[test]
fn test_both_square_triangles_are_ccw() {
    let mut geometry = Geometry::new();
    geometry.add_square(Vec2::new(-0.3, 0.2), 0.4, GREEN);

    for triangle in geometry.indices.chunks(3) {
        let points: Vec<Vec2> = triangle
            .iter()
            .map(|&i| geometry.vertices[i as usize].position.truncate())
            .collect();
        assert!(signed_area(&points) > 0.0);
    }
}

#[test]
fn test_regenerated_square_keeps_counts() {
    // The demo swaps the square for a bigger one through a same-size update.
    let mut geometry = Geometry::new();
    geometry.add_square(Vec2::ZERO, 0.1, RED);
    let (vertices, indices) = (geometry.vertices.len(), geometry.indices.clone());

    for step in 1..10 {
        geometry.clear();
        geometry.add_square(Vec2::ZERO, step as f32 / 10.0, GREEN);
        assert_eq!(geometry.vertices.len(), vertices);
        assert_eq!(geometry.indices, indices);
    }
}

#[test]
fn test_line_winding() {
    let mut geometry = Geometry::new();
    geometry.add_line(Vec2::new(-0.5, -0.5), Vec2::new(0.5, 0.25), 0.05, RED);

    let corners: Vec<Vec2> = geometry
        .vertices
        .iter()
        .map(|v| v.position.truncate())
        .collect();
    assert!(signed_area(&corners) > 0.0);
}
