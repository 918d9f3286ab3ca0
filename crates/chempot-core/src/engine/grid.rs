//! Regular sampling of the stability region, for heat maps of defect
//! formation energies across the allowed chemical potentials.

use super::error::EngineError;
use super::limits::ChemicalPotentialLimits;
use crate::core::io::limits_table::{LimitsRow, LimitsTable};
use itertools::Itertools;
use tracing::debug;

const POINT_TOLERANCE: f64 = 1e-9;

/// Chemical potential points sampled inside the stability region. Every
/// point carries all intrinsic elements, with the dependent element filled
/// in from the target equality.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemicalPotentialGrid {
    pub elements: Vec<String>,
    pub points: Vec<Vec<f64>>,
}

impl ChemicalPotentialGrid {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rows labelled `point-1`, `point-2`, ... in sampling order.
    pub fn to_table(&self) -> LimitsTable {
        LimitsTable {
            species: self.elements.clone(),
            rows: self
                .points
                .iter()
                .enumerate()
                .map(|(i, point)| LimitsRow {
                    label: format!("point-{}", i + 1),
                    values: point.clone(),
                })
                .collect(),
        }
    }
}

/// Samples `num_points` values along each independent axis and keeps those
/// inside the region. The vertices themselves are always included.
pub fn sample(
    limits: &ChemicalPotentialLimits,
    num_points: usize,
) -> Result<ChemicalPotentialGrid, EngineError> {
    let dependent = limits
        .elements
        .iter()
        .position(|el| *el == limits.dependent_element)
        .ok_or_else(|| EngineError::InvalidDependentElement {
            element: limits.dependent_element.clone(),
            target: limits.target.clone(),
        })?;
    let independent: Vec<usize> = (0..limits.elements.len()).filter(|&i| i != dependent).collect();
    let vertices: Vec<Vec<f64>> = limits
        .intrinsic
        .iter()
        .map(|limit| independent.iter().map(|&i| limit.mu[i]).collect())
        .collect();

    let mut interior = match independent.len() {
        0 => Vec::new(),
        1 => sample_interval(&vertices, num_points),
        2 => sample_polygon(&vertices, num_points),
        dimension => return Err(EngineError::UnsupportedGridDimension { dimension }),
    };
    // Grid lines through the bounding box hit vertices exactly at its corners.
    interior.retain(|point| !vertices.iter().any(|vertex| coincide(point, vertex)));
    interior.extend(vertices);

    let target_amount = limits.target_composition.get(&limits.dependent_element);
    let points: Vec<Vec<f64>> = interior
        .into_iter()
        .map(|coords| {
            let mut mu = vec![0.0; limits.elements.len()];
            let mut partial = 0.0;
            for (&idx, value) in independent.iter().zip(&coords) {
                mu[idx] = *value;
                partial += limits.target_composition.get(&limits.elements[idx]) * value;
            }
            mu[dependent] = (limits.target_formation_energy - partial) / target_amount;
            mu
        })
        .collect();

    debug!("Sampled {} chemical potential point(s).", points.len());
    Ok(ChemicalPotentialGrid {
        elements: limits.elements.clone(),
        points,
    })
}

/// Evenly spaced chemical potentials from limit `from` to limit `to`, both
/// included. Limits are named by label or as `"<El>-rich"` / `"<El>-poor"`;
/// every species, extrinsic ones included, is interpolated.
pub fn interpolate(
    limits: &ChemicalPotentialLimits,
    from: &str,
    to: &str,
    num_points: usize,
) -> Result<ChemicalPotentialGrid, EngineError> {
    let resolve = |name: &str| {
        limits.values(name).ok_or_else(|| EngineError::UnknownLimit {
            name: name.to_string(),
        })
    };
    let start = resolve(from)?;
    let end = resolve(to)?;

    let points: Vec<Vec<f64>> = linspace(0.0, 1.0, num_points)
        .into_iter()
        .map(|t| start.iter().zip(&end).map(|(a, b)| a + (b - a) * t).collect())
        .collect();
    debug!(
        "Interpolated {} point(s) between {} and {}.",
        points.len(),
        from,
        to
    );
    Ok(ChemicalPotentialGrid {
        elements: limits.species(),
        points,
    })
}

fn coincide(a: &[f64], b: &[f64]) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() < POINT_TOLERANCE)
}

fn linspace(start: f64, end: f64, num_points: usize) -> Vec<f64> {
    match num_points {
        0 => Vec::new(),
        1 => vec![start],
        n => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

fn sample_interval(vertices: &[Vec<f64>], num_points: usize) -> Vec<Vec<f64>> {
    let (lo, hi) = match vertices.iter().map(|v| v[0]).minmax().into_option() {
        Some(range) => range,
        None => return Vec::new(),
    };
    // Endpoints are the vertices, which are appended by the caller.
    linspace(lo, hi, num_points)
        .into_iter()
        .filter(|x| *x > lo && *x < hi)
        .map(|x| vec![x])
        .collect()
}

fn sample_polygon(vertices: &[Vec<f64>], num_points: usize) -> Vec<Vec<f64>> {
    let hull = convex_hull(vertices.iter().map(|v| (v[0], v[1])).collect());
    if hull.len() < 3 {
        return Vec::new();
    }
    let (x_lo, x_hi) = hull.iter().map(|p| p.0).minmax().into_option().unwrap_or_default();
    let (y_lo, y_hi) = hull.iter().map(|p| p.1).minmax().into_option().unwrap_or_default();

    linspace(x_lo, x_hi, num_points)
        .into_iter()
        .cartesian_product(linspace(y_lo, y_hi, num_points))
        .filter(|&(x, y)| inside(&hull, x, y))
        .map(|(x, y)| vec![x, y])
        .collect()
}

/// Andrew's monotone chain; returns the hull counter-clockwise without the
/// closing point.
fn convex_hull(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };
    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn inside(hull: &[(f64, f64)], x: f64, y: f64) -> bool {
    hull.iter().zip(hull.iter().cycle().skip(1)).all(|(a, b)| {
        (b.0 - a.0) * (y - a.1) - (b.1 - a.1) * (x - a.0) >= -1e-9
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::phase::{Phase, PhaseTable};
    use crate::core::models::system::ChemicalSystem;
    use crate::engine::limits::solve;

    fn phase(formula: &str, formation_energy: f64) -> Phase {
        Phase::new(formula, formation_energy, formation_energy, formation_energy).unwrap()
    }

    #[test]
    fn binary_grid_spans_the_interval() {
        let table = PhaseTable::from_phases(vec![phase("Cd", 0.0), phase("Te", 0.0), phase("CdTe", -2.0)]);
        let system = ChemicalSystem::new(&["Cd", "Te"]).unwrap();
        let limits = solve(&system, &table, "CdTe", None, 1e-6).unwrap();

        let grid = sample(&limits, 5).unwrap();
        assert_eq!(grid.elements, vec!["Cd", "Te"]);
        assert_eq!(grid.len(), 5);
        for point in &grid.points {
            assert!((point[0] + point[1] + 2.0).abs() < 1e-9);
            assert!(point[0] <= 1e-9 && point[0] >= -2.0 - 1e-9);
        }

        let table = grid.to_table();
        assert_eq!(table.species, vec!["Cd", "Te"]);
        assert_eq!(table.rows.len(), 5);
        assert_eq!(table.rows[0].label, "point-1");
        assert_eq!(table.rows[4].values, grid.points[4]);
    }

    #[test]
    fn ternary_grid_stays_inside_the_region() {
        let table = PhaseTable::from_phases(vec![
            phase("Mg", 0.0),
            phase("Si", 0.0),
            phase("O2", 0.0),
            phase("MgO", -5.0),
            phase("SiO2", -7.0),
            phase("MgSiO3", -15.0),
        ]);
        let system = ChemicalSystem::new(&["Mg", "Si", "O"]).unwrap();
        let limits = solve(&system, &table, "MgSiO3", None, 1e-6).unwrap();
        assert_eq!(limits.len(), 4);

        let grid = sample(&limits, 10).unwrap();
        assert!(grid.len() > limits.len());
        for point in &grid.points {
            assert!((point[0] + point[1] + 3.0 * point[2] + 15.0).abs() < 1e-6);
            assert!(point[0] + point[2] <= -5.0 + 1e-6);
            assert!(point[1] + 2.0 * point[2] <= -7.0 + 1e-6);
            assert!(point.iter().all(|mu| *mu <= 1e-6));
        }
    }

    #[test]
    fn vertices_on_grid_lines_appear_once() {
        // Without competing phases the region is a triangle whose vertices
        // are corners of its bounding box.
        let table = PhaseTable::from_phases(vec![
            phase("Mg", 0.0),
            phase("Si", 0.0),
            phase("O2", 0.0),
            phase("MgSiO3", -15.0),
        ]);
        let system = ChemicalSystem::new(&["Mg", "Si", "O"]).unwrap();
        let limits = solve(&system, &table, "MgSiO3", None, 1e-6).unwrap();
        assert_eq!(limits.len(), 3);

        let grid = sample(&limits, 4).unwrap();
        for (i, a) in grid.points.iter().enumerate() {
            for b in &grid.points[i + 1..] {
                assert!(!coincide(a, b), "duplicate point {:?}", a);
            }
        }
        for limit in &limits.intrinsic {
            let count = grid
                .points
                .iter()
                .filter(|p| p.iter().zip(&limit.mu).all(|(a, b)| (a - b).abs() < 1e-6))
                .count();
            assert_eq!(count, 1, "vertex {} sampled {} times", limit.label, count);
        }
    }

    #[test]
    fn quaternary_grid_is_rejected() {
        let table = PhaseTable::from_phases(vec![phase("LiFePO4", -20.0)]);
        let system = ChemicalSystem::new(&["Li", "Fe", "P", "O"]).unwrap();
        let limits = solve(&system, &table, "LiFePO4", None, 1e-6).unwrap();
        assert!(matches!(
            sample(&limits, 4),
            Err(EngineError::UnsupportedGridDimension { dimension: 3 })
        ));
    }

    #[test]
    fn interpolation_runs_between_rich_and_poor_limits() {
        let table = PhaseTable::from_phases(vec![phase("Cd", 0.0), phase("Te", 0.0), phase("CdTe", -2.0)]);
        let system = ChemicalSystem::new(&["Cd", "Te"]).unwrap();
        let limits = solve(&system, &table, "CdTe", None, 1e-6).unwrap();

        let path = interpolate(&limits, "Cd-rich", "Te-rich", 5).unwrap();
        assert_eq!(path.elements, vec!["Cd", "Te"]);
        assert_eq!(path.len(), 5);
        let close = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9);
        assert!(close(&path.points[0], &[0.0, -2.0]));
        assert!(close(&path.points[4], &[-2.0, 0.0]));
        assert!(close(&path.points[2], &[-1.0, -1.0]));
        for point in &path.points {
            assert!((point[0] + point[1] + 2.0).abs() < 1e-9);
        }

        let by_label = interpolate(&limits, "Cd-CdTe", "CdTe-Te", 5).unwrap();
        assert_eq!(by_label, path);
    }

    #[test]
    fn interpolation_rejects_unknown_limits() {
        let table = PhaseTable::from_phases(vec![phase("Cd", 0.0), phase("Te", 0.0), phase("CdTe", -2.0)]);
        let system = ChemicalSystem::new(&["Cd", "Te"]).unwrap();
        let limits = solve(&system, &table, "CdTe", None, 1e-6).unwrap();
        assert!(matches!(
            interpolate(&limits, "Cd-rich", "O-poor", 3),
            Err(EngineError::UnknownLimit { ref name }) if name == "O-poor"
        ));
    }

    #[test]
    fn convex_hull_drops_interior_points() {
        let hull = convex_hull(vec![(0.0, 0.0), (1.0, 0.0), (0.5, 0.2), (1.0, 1.0), (0.0, 1.0)]);
        assert_eq!(hull.len(), 4);
        assert!(inside(&hull, 0.5, 0.5));
        assert!(!inside(&hull, 1.5, 0.5));
    }
}
