//! Built-in meshes.

use hearth_render::{MeshData, Secondary};

/// Unit cube centred on the origin: 8 shared corners, 12 counter-clockwise
/// triangles. Each corner carries a colour and its normalised corner
/// direction as the normal.
pub fn cube() -> MeshData {
    #[rustfmt::skip]
    let positions = vec![
        -0.5,  0.5,  0.5,
        -0.5, -0.5,  0.5,
         0.5, -0.5,  0.5,
         0.5,  0.5,  0.5,
        -0.5,  0.5, -0.5,
         0.5,  0.5, -0.5,
        -0.5, -0.5, -0.5,
         0.5, -0.5, -0.5,
    ];
    #[rustfmt::skip]
    let colors = vec![
        0.5, 0.0, 0.0,
        0.0, 0.5, 0.0,
        0.0, 0.0, 0.5,
        0.0, 0.5, 0.5,
        0.5, 0.0, 0.0,
        0.0, 0.5, 0.0,
        0.0, 0.0, 0.5,
        0.0, 0.5, 0.5,
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 1, 3, 3, 1, 2, // front
        4, 0, 3, 5, 4, 3, // top
        3, 2, 7, 5, 3, 7, // right
        6, 1, 0, 6, 0, 4, // left
        2, 1, 6, 2, 6, 7, // bottom
        7, 6, 4, 7, 4, 5, // back
    ];
    let normals = positions
        .chunks_exact(3)
        .flat_map(|p: &[f32]| {
            let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            [p[0] / len, p[1] / len, p[2] / len]
        })
        .collect();

    MeshData {
        positions,
        secondary: Secondary::Colors(colors),
        normals,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(data: &MeshData, i: u32) -> [f32; 3] {
        let i = i as usize * 3;
        [data.positions[i], data.positions[i + 1], data.positions[i + 2]]
    }

    #[test]
    fn cube_has_8_vertices_and_12_triangles() {
        let cube = cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn cube_faces_point_outwards() {
        let cube = cube();
        for tri in cube.indices.chunks_exact(3) {
            let [a, b, c] = [corner(&cube, tri[0]), corner(&cube, tri[1]), corner(&cube, tri[2])];
            let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let n = [
                u[1] * v[2] - u[2] * v[1],
                u[2] * v[0] - u[0] * v[2],
                u[0] * v[1] - u[1] * v[0],
            ];
            let centroid = [
                a[0] + b[0] + c[0],
                a[1] + b[1] + c[1],
                a[2] + b[2] + c[2],
            ];
            let facing = n[0] * centroid[0] + n[1] * centroid[1] + n[2] * centroid[2];
            assert!(facing > 0.0, "triangle {tri:?} faces inwards");
        }
    }
}
