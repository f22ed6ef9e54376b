//! Free-surface extraction from tetrahedral connectivity.
//!
//! Every tetrahedron contributes four triangular faces. A face owned by two
//! elements is interior; a face owned by exactly one is on the boundary.
//! Faces are matched by their sorted node triple, so winding does not
//! matter for matching, while the emitted boundary triangles keep the
//! owning element's winding.

use crate::element::Tet4;
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::info;

/// A triangle on the free surface of the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryTriangle {
    /// Node indices in the owning element's winding.
    pub nodes: [usize; 3],
    /// Owning element.
    pub element: usize,
    /// Local face number (0-3), the face opposite local node `face`.
    pub face: usize,
}

/// Boundary of a tetrahedral mesh.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    nodes: Vec<usize>,
    triangles: Vec<BoundaryTriangle>,
    elements: Vec<usize>,
    element_mask: Vec<bool>,
}

impl Surface {
    /// Boundary node indices, ascending.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Boundary triangles in element order.
    pub fn triangles(&self) -> &[BoundaryTriangle] {
        &self.triangles
    }

    /// Boundary element indices, ascending.
    pub fn elements(&self) -> &[usize] {
        &self.elements
    }

    /// Whether an element owns at least one boundary face.
    pub fn is_boundary_element(&self, element: usize) -> bool {
        self.element_mask.get(element).copied().unwrap_or(false)
    }

    /// Whether local face `face` of `element` is on the boundary.
    pub fn is_boundary_face(&self, element: usize, face: usize) -> bool {
        let start = self.triangles.partition_point(|t| t.element < element);
        self.triangles[start..]
            .iter()
            .take_while(|t| t.element == element)
            .any(|t| t.face == face)
    }
}

/// Node triple of local face `face` of `tet`, in the element's winding.
pub fn face_nodes(face: usize, tet: &[usize; 4]) -> [usize; 3] {
    Tet4::FACES[face].map(|local| tet[local])
}

/// Node triple of local face `face` of `tet`, ascending.
pub fn sorted_face(face: usize, tet: &[usize; 4]) -> [usize; 3] {
    let mut tri = face_nodes(face, tet);
    tri.sort_unstable();
    tri
}

/// Extract the free surface of a tetrahedral mesh.
///
/// # Errors
///
/// Returns [`Error::Topology`] if a face is shared by more than two
/// elements, if two elements have the same node set, or if an element
/// references a node outside `0..n_nodes`.
pub fn find_surface(n_nodes: usize, elements: &[[usize; 4]]) -> Result<Surface> {
    let mut owners: HashMap<[usize; 3], u32> = HashMap::with_capacity(elements.len() * 4);
    let mut seen: HashMap<[usize; 4], usize> = HashMap::with_capacity(elements.len());

    for (e, tet) in elements.iter().enumerate() {
        if let Some(&node) = tet.iter().find(|&&n| n >= n_nodes) {
            return Err(Error::Topology(format!(
                "element {} references node {} (mesh has {} nodes)",
                e, node, n_nodes
            )));
        }

        let mut key = *tet;
        key.sort_unstable();
        if let Some(&first) = seen.get(&key) {
            return Err(Error::Topology(format!(
                "elements {} and {} share the same nodes {:?}",
                first, e, key
            )));
        }
        seen.insert(key, e);

        for face in 0..4 {
            let count = owners.entry(sorted_face(face, tet)).or_insert(0);
            *count += 1;
            if *count > 2 {
                return Err(Error::Topology(format!(
                    "face {:?} is shared by more than two elements",
                    sorted_face(face, tet)
                )));
            }
        }
    }

    let mut node_mask = vec![false; n_nodes];
    let mut element_mask = vec![false; elements.len()];
    let mut triangles = Vec::new();

    for (e, tet) in elements.iter().enumerate() {
        for face in 0..4 {
            if owners[&sorted_face(face, tet)] != 1 {
                continue;
            }
            let nodes = face_nodes(face, tet);
            for &n in &nodes {
                node_mask[n] = true;
            }
            element_mask[e] = true;
            triangles.push(BoundaryTriangle {
                nodes,
                element: e,
                face,
            });
        }
    }

    let nodes: Vec<usize> = (0..n_nodes).filter(|&n| node_mask[n]).collect();
    let boundary_elements: Vec<usize> = (0..elements.len()).filter(|&e| element_mask[e]).collect();

    info!(
        triangles = triangles.len(),
        nodes = nodes.len(),
        elements = boundary_elements.len(),
        "extracted mesh surface"
    );

    Ok(Surface {
        nodes,
        triangles,
        elements: boundary_elements,
        element_mask,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sorted(mut tri: [usize; 3]) -> [usize; 3] {
        tri.sort_unstable();
        tri
    }

    #[test]
    fn test_single_tetrahedron_is_all_boundary() {
        let surface = find_surface(4, &[[0, 1, 2, 3]]).unwrap();

        assert_eq!(surface.triangles().len(), 4);
        assert_eq!(surface.nodes(), &[0, 1, 2, 3]);
        assert_eq!(surface.elements(), &[0]);
        assert!(surface.is_boundary_element(0));
    }

    #[test]
    fn test_winding_preserved() {
        let surface = find_surface(4, &[[0, 1, 2, 3]]).unwrap();
        let tris: Vec<[usize; 3]> = surface.triangles().iter().map(|t| t.nodes).collect();
        assert_eq!(tris, vec![[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]]);
        assert_eq!(surface.triangles()[2].face, 2);
    }

    #[test]
    fn test_shared_face_is_interior() {
        // Two tets glued on face (0, 1, 2)
        let elements = [[0, 1, 2, 3], [2, 1, 0, 4]];
        let surface = find_surface(5, &elements).unwrap();

        assert_eq!(surface.triangles().len(), 6);
        let faces: HashSet<[usize; 3]> =
            surface.triangles().iter().map(|t| sorted(t.nodes)).collect();
        assert!(!faces.contains(&[0, 1, 2]));
        for expected in [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 4], [0, 2, 4], [1, 2, 4]] {
            assert!(faces.contains(&expected), "missing face {:?}", expected);
        }
        assert_eq!(surface.nodes(), &[0, 1, 2, 3, 4]);
        assert_eq!(surface.elements(), &[0, 1]);
        assert!(!surface.is_boundary_face(0, 3));
        assert!(!surface.is_boundary_face(1, 3));
        assert!(surface.is_boundary_face(1, 0));
    }

    #[test]
    fn test_interior_node_and_element() {
        // Node 4 at the centroid of the outer tet, splitting it into four.
        // Every face of the inner split touches node 4 and is interior,
        // only the four outer faces remain.
        let elements = [[1, 2, 3, 4], [0, 2, 3, 4], [0, 1, 3, 4], [0, 1, 2, 4]];
        let surface = find_surface(5, &elements).unwrap();

        assert_eq!(surface.triangles().len(), 4);
        assert_eq!(surface.nodes(), &[0, 1, 2, 3]);
        assert_eq!(surface.elements(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_face_shared_by_three_elements() {
        let elements = [[0, 1, 2, 3], [0, 1, 2, 4], [0, 1, 2, 5]];
        let err = find_surface(6, &elements).unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }

    #[test]
    fn test_duplicate_element_rejected() {
        let elements = [[0, 1, 2, 3], [3, 2, 1, 0]];
        assert!(find_surface(4, &elements).is_err());
    }

    #[test]
    fn test_out_of_range_node_rejected() {
        assert!(find_surface(3, &[[0, 1, 2, 3]]).is_err());
    }

    #[test]
    fn test_sorted_face() {
        let tet = [9, 4, 7, 1];
        assert_eq!(sorted_face(0, &tet), [1, 4, 7]);
        assert_eq!(sorted_face(3, &tet), [4, 7, 9]);
        assert_eq!(face_nodes(1, &tet), [9, 7, 1]);
    }
}
