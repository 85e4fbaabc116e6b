//! Mesh data structures produced by isosurface extraction

use crate::point::*;
use serde::{Deserialize, Serialize};

/// Triangle soup emitted by marching cubes.
///
/// `vertices` and `scalars` always have the same length, a multiple of 3;
/// every three consecutive entries form one triangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IsoMesh {
    pub vertices: Vec<Point3f>,
    pub scalars: Vec<f32>,
}

impl IsoMesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh from parallel vertex and scalar buffers
    pub fn from_buffers(vertices: Vec<Point3f>, scalars: Vec<f32>) -> Self {
        debug_assert_eq!(vertices.len(), scalars.len());
        debug_assert_eq!(vertices.len() % 3, 0);
        Self { vertices, scalars }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterate over triangles as vertex triples
    pub fn triangles(&self) -> impl Iterator<Item = [Point3f; 3]> + '_ {
        self.vertices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
    }

    /// Raw bytes of the vertex buffer (`3 * f32` per vertex), ready for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw bytes of the scalar buffer
    pub fn scalar_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.scalars)
    }

    /// Convert to an indexed mesh; face `t` references vertices `3t..3t+3`
    pub fn to_triangle_mesh(&self) -> TriangleMesh {
        let faces = (0..self.triangle_count())
            .map(|t| [3 * t, 3 * t + 1, 3 * t + 2])
            .collect();
        TriangleMesh {
            vertices: self.vertices.clone(),
            faces,
            scalars: Some(self.scalars.clone()),
        }
    }
}

/// A triangle mesh with vertices and faces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub scalars: Option<Vec<f32>>,
}

impl TriangleMesh {
    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            scalars: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Calculate face normals
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let edge1 = v1 - v0;
                let edge2 = v2 - v0;

                edge1.cross(&edge2).normalize()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn single_triangle() -> IsoMesh {
        IsoMesh::from_buffers(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![0.5, 1.5, 2.5],
        )
    }

    #[test]
    fn test_iso_mesh_counts() {
        let mesh = single_triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(!mesh.is_empty());
        assert!(IsoMesh::new().is_empty());
        assert_eq!(mesh.triangles().count(), 1);
    }

    #[test]
    fn test_vertex_bytes_layout() {
        let mesh = single_triangle();
        let bytes = mesh.vertex_bytes();
        assert_eq!(bytes.len(), 3 * 3 * std::mem::size_of::<f32>());
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(&floats[3..6], &[1.0, 0.0, 0.0]);
        assert_eq!(mesh.scalar_bytes().len(), 12);
    }

    #[test]
    fn test_to_triangle_mesh() {
        let mesh = single_triangle().to_triangle_mesh();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert_eq!(mesh.scalars.as_deref(), Some(&[0.5, 1.5, 2.5][..]));

        let normals = mesh.calculate_face_normals();
        assert_relative_eq!(normals[0], Vector3f::new(0.0, 0.0, 1.0));
    }
}
