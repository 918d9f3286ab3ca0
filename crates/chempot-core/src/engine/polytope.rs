use super::constraints::HalfSpace;
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace};

const SINGULAR_PIVOT: f64 = 1e-10;

/// A vertex of the feasible region together with the indices of every
/// half-space that is tight there.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub point: Vec<f64>,
    pub active: Vec<usize>,
}

/// Result of intersecting every `dim`-subset of hyperplanes.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// Feasible, deduplicated vertices.
    pub vertices: Vec<Vertex>,
    /// The infeasible intersection point closest to feasibility, with the
    /// indices of the half-spaces it violates. Only set when no feasible
    /// vertex exists.
    pub closest_infeasible: Option<(Vec<f64>, Vec<usize>)>,
}

/// Enumerates the vertices of `{x : a·x ≤ b for every half-space}` by solving
/// each `dim × dim` subsystem of tight constraints and keeping the solutions
/// that satisfy all others within `tolerance`.
///
/// Exhaustive over `C(m, dim)` subsets, which is cheap for the handful of
/// elements and few dozen phases in a chemical system.
pub fn enumerate_vertices(halfspaces: &[HalfSpace], dim: usize, tolerance: f64) -> Enumeration {
    let mut result = Enumeration::default();

    if dim == 0 {
        let violated = violated_by(halfspaces, &[], tolerance);
        if violated.is_empty() {
            result.vertices.push(Vertex {
                point: Vec::new(),
                active: tight_at(halfspaces, &[], tolerance),
            });
        } else {
            result.closest_infeasible = Some((Vec::new(), violated));
        }
        return result;
    }

    let mut best_violation = f64::INFINITY;
    for subset in (0..halfspaces.len()).combinations(dim) {
        let Some(point) = intersect(halfspaces, &subset, dim) else {
            continue;
        };

        let worst = halfspaces
            .iter()
            .map(|h| h.evaluate(&point))
            .fold(f64::NEG_INFINITY, f64::max);

        if worst <= tolerance {
            merge_vertex(&mut result.vertices, point, halfspaces, tolerance);
        } else if result.vertices.is_empty() && worst < best_violation {
            best_violation = worst;
            let violated = violated_by(halfspaces, &point, tolerance);
            result.closest_infeasible = Some((point, violated));
        }
    }

    if !result.vertices.is_empty() {
        result.closest_infeasible = None;
    }
    debug!(
        "Enumerated {} feasible vertex/vertices from {} half-spaces.",
        result.vertices.len(),
        halfspaces.len()
    );
    result
}

fn intersect(halfspaces: &[HalfSpace], subset: &[usize], dim: usize) -> Option<Vec<f64>> {
    let a = DMatrix::from_fn(dim, dim, |r, c| halfspaces[subset[r]].normal[c]);
    let b = DVector::from_iterator(dim, subset.iter().map(|&i| halfspaces[i].offset));

    let lu = a.lu();
    let u = lu.u();
    if u.diagonal().iter().any(|pivot| pivot.abs() < SINGULAR_PIVOT) {
        trace!("Skipping singular subsystem {:?}.", subset);
        return None;
    }
    let x = lu.solve(&b)?;
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(x.iter().copied().collect())
}

fn merge_vertex(vertices: &mut Vec<Vertex>, point: Vec<f64>, halfspaces: &[HalfSpace], tolerance: f64) {
    let duplicate = vertices.iter().any(|v| {
        v.point
            .iter()
            .zip(&point)
            .all(|(a, b)| (a - b).abs() <= tolerance)
    });
    if duplicate {
        return;
    }
    let active = tight_at(halfspaces, &point, tolerance);
    vertices.push(Vertex { point, active });
}

fn tight_at(halfspaces: &[HalfSpace], point: &[f64], tolerance: f64) -> Vec<usize> {
    halfspaces
        .iter()
        .enumerate()
        .filter(|(_, h)| h.evaluate(point).abs() <= tolerance)
        .map(|(idx, _)| idx)
        .collect()
}

fn violated_by(halfspaces: &[HalfSpace], point: &[f64], tolerance: f64) -> Vec<usize> {
    halfspaces
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_satisfied(point, tolerance))
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::constraints::ConstraintSource;

    fn h(normal: &[f64], offset: f64, name: &str) -> HalfSpace {
        HalfSpace {
            normal: normal.to_vec(),
            offset,
            source: ConstraintSource::Phase(name.to_string()),
        }
    }

    fn sorted_points(e: &Enumeration) -> Vec<Vec<f64>> {
        let mut points: Vec<_> = e.vertices.iter().map(|v| v.point.clone()).collect();
        points.sort_by(|a, b| a.partial_cmp(b).unwrap());
        points
    }

    #[test]
    fn interval_in_one_dimension() {
        let halfspaces = vec![h(&[1.0], 0.0, "upper"), h(&[-1.0], 2.0, "lower")];
        let e = enumerate_vertices(&halfspaces, 1, 1e-9);
        assert_eq!(sorted_points(&e), vec![vec![-2.0], vec![0.0]]);
        assert!(e.closest_infeasible.is_none());
    }

    #[test]
    fn unit_square_has_four_vertices() {
        let halfspaces = vec![
            h(&[1.0, 0.0], 1.0, "x<=1"),
            h(&[-1.0, 0.0], 0.0, "x>=0"),
            h(&[0.0, 1.0], 1.0, "y<=1"),
            h(&[0.0, -1.0], 0.0, "y>=0"),
        ];
        let e = enumerate_vertices(&halfspaces, 2, 1e-9);
        assert_eq!(
            sorted_points(&e),
            vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]]
        );
        assert!(e.vertices.iter().all(|v| v.active.len() == 2));
    }

    #[test]
    fn redundant_constraints_collapse_to_one_vertex() {
        // Three lines through the origin plus a box: the origin appears from
        // several subsets but is reported once, with all tight constraints.
        let halfspaces = vec![
            h(&[1.0, 0.0], 0.0, "a"),
            h(&[0.0, 1.0], 0.0, "b"),
            h(&[1.0, 1.0], 0.0, "c"),
            h(&[-1.0, 0.0], 1.0, "d"),
            h(&[0.0, -1.0], 1.0, "e"),
        ];
        let e = enumerate_vertices(&halfspaces, 2, 1e-9);
        let origin: Vec<_> = e
            .vertices
            .iter()
            .filter(|v| v.point.iter().all(|x| x.abs() < 1e-12))
            .collect();
        assert_eq!(origin.len(), 1);
        assert_eq!(origin[0].active, vec![0, 1, 2]);
    }

    #[test]
    fn empty_region_reports_closest_violation() {
        let halfspaces = vec![h(&[1.0], -1.0, "x<=-1"), h(&[-1.0], -1.0, "x>=1")];
        let e = enumerate_vertices(&halfspaces, 1, 1e-9);
        assert!(e.vertices.is_empty());
        let (_, violated) = e.closest_infeasible.unwrap();
        assert_eq!(violated.len(), 1);
    }

    #[test]
    fn zero_dimensional_problem_checks_offsets() {
        let feasible = enumerate_vertices(&[h(&[], 0.0, "ref")], 0, 1e-9);
        assert_eq!(feasible.vertices.len(), 1);
        assert_eq!(feasible.vertices[0].active, vec![0]);

        let infeasible = enumerate_vertices(&[h(&[], -0.5, "bad")], 0, 1e-9);
        assert!(infeasible.vertices.is_empty());
        assert!(infeasible.closest_infeasible.is_some());
    }
}
