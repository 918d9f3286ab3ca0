//! Translation of phase stability conditions into linear inequalities over
//! the independent chemical potentials.
//!
//! With elements `e_0..e_n`, every competing phase `p` gives
//! `Σ c_i μ_i ≤ ΔH_p`, every element gives `μ_i ≤ 0`, and the target `t`
//! fixes `Σ t_i μ_i = ΔH_t`. The equality is used to eliminate the dependent
//! element `d`, `μ_d = (ΔH_t − Σ_{i≠d} t_i μ_i) / t_d`, leaving half-spaces
//! in `n − 1` dimensions.

use crate::core::models::composition::Composition;
use crate::core::models::phase::{Phase, PhaseTable};
use crate::core::models::system::ChemicalSystem;
use tracing::{debug, warn};

const ZERO_NORMAL: f64 = 1e-12;

/// What a half-space came from; used to label vertices and report
/// violations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintSource {
    /// A competing phase, by formula.
    Phase(String),
    /// The `μ ≤ 0` bound of an element's reference phase.
    ElementalReference(String),
}

impl ConstraintSource {
    pub fn name(&self) -> &str {
        match self {
            Self::Phase(formula) => formula,
            Self::ElementalReference(element) => element,
        }
    }
}

/// `normal · x ≤ offset` in the independent coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfSpace {
    pub normal: Vec<f64>,
    pub offset: f64,
    pub source: ConstraintSource,
}

impl HalfSpace {
    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.normal
            .iter()
            .zip(point)
            .map(|(a, x)| a * x)
            .sum::<f64>()
            - self.offset
    }

    pub fn is_satisfied(&self, point: &[f64], tolerance: f64) -> bool {
        self.evaluate(point) <= tolerance
    }
}

/// The reduced stability problem of one target compound.
#[derive(Debug, Clone)]
pub struct StabilityProblem {
    elements: Vec<String>,
    dependent: usize,
    target_amounts: Vec<f64>,
    target_formation_energy: f64,
    pub halfspaces: Vec<HalfSpace>,
    /// Constraints that lost every independent coordinate and are violated
    /// regardless of the chemical potentials.
    pub unconditionally_violated: Vec<ConstraintSource>,
}

impl StabilityProblem {
    /// Builds the problem for `target` over `system`, eliminating the element
    /// at index `dependent`. Phases with elements outside the system and the
    /// target's own stoichiometry are skipped.
    pub fn build(
        system: &ChemicalSystem,
        phases: &PhaseTable,
        target: &Phase,
        dependent: usize,
        tolerance: f64,
    ) -> Self {
        let elements = system.elements().to_vec();
        let target_amounts = amounts(target.composition(), &elements);
        let mut problem = Self {
            elements,
            dependent,
            target_amounts,
            target_formation_energy: target.formation_energy,
            halfspaces: Vec::new(),
            unconditionally_violated: Vec::new(),
        };

        for element in system.elements() {
            let unit: Vec<f64> = system
                .elements()
                .iter()
                .map(|el| if el == element { 1.0 } else { 0.0 })
                .collect();
            problem.push(
                &unit,
                0.0,
                ConstraintSource::ElementalReference(element.clone()),
                tolerance,
            );
        }

        for phase in phases.within(system.elements()) {
            if phase.composition().same_stoichiometry(target.composition()) {
                continue;
            }
            if phase.is_elemental() {
                if phase.formation_energy.abs() > tolerance {
                    warn!(
                        "Elemental phase {} has a non-zero formation energy ({:.4} eV); its reference bound is used instead.",
                        phase.formula(),
                        phase.formation_energy
                    );
                }
                continue;
            }
            let row = amounts(phase.composition(), system.elements());
            problem.push(
                &row,
                phase.formation_energy,
                ConstraintSource::Phase(phase.reduced_formula()),
                tolerance,
            );
        }

        debug!(
            "Built stability problem with {} half-spaces in {} dimension(s).",
            problem.halfspaces.len(),
            problem.dimension()
        );
        problem
    }

    /// Substitutes the dependent element into `Σ c_i μ_i ≤ b` and stores the
    /// result.
    fn push(&mut self, row: &[f64], bound: f64, source: ConstraintSource, tolerance: f64) {
        let t_d = self.target_amounts[self.dependent];
        let c_d = row[self.dependent];
        let normal: Vec<f64> = self
            .independent_indices()
            .map(|i| row[i] - c_d * self.target_amounts[i] / t_d)
            .collect();
        let offset = bound - c_d * self.target_formation_energy / t_d;

        if normal.iter().all(|a| a.abs() < ZERO_NORMAL) {
            if offset < -tolerance {
                self.unconditionally_violated.push(source);
            }
            return;
        }
        self.halfspaces.push(HalfSpace {
            normal,
            offset,
            source,
        });
    }

    pub fn dimension(&self) -> usize {
        self.elements.len() - 1
    }

    pub fn independent_indices(&self) -> impl Iterator<Item = usize> + use<> {
        let dependent = self.dependent;
        (0..self.elements.len()).filter(move |&i| i != dependent)
    }

    /// Recovers the full chemical potential vector from independent
    /// coordinates.
    pub fn lift(&self, point: &[f64]) -> Vec<f64> {
        let mut mu = vec![0.0; self.elements.len()];
        let mut partial = 0.0;
        for (value, idx) in point.iter().zip(self.independent_indices()) {
            mu[idx] = *value;
            partial += self.target_amounts[idx] * value;
        }
        mu[self.dependent] =
            (self.target_formation_energy - partial) / self.target_amounts[self.dependent];
        mu
    }
}

/// Amounts of `composition` laid out in `elements` order.
pub fn amounts(composition: &Composition, elements: &[String]) -> Vec<f64> {
    elements.iter().map(|el| composition.get(el)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(formula: &str, formation_energy: f64) -> Phase {
        Phase::new(formula, 0.0, 0.0, formation_energy).unwrap()
    }

    fn binary_problem() -> StabilityProblem {
        let system = ChemicalSystem::new(&["Cd", "Te"]).unwrap();
        let target = phase("CdTe", -1.25);
        let table = PhaseTable::from_phases(vec![
            phase("Cd", 0.0),
            phase("Te", 0.0),
            target.clone(),
            phase("CdTe2", -1.0),
        ]);
        StabilityProblem::build(&system, &table, &target, 1, 1e-6)
    }

    #[test]
    fn eliminates_dependent_element() {
        let problem = binary_problem();
        assert_eq!(problem.dimension(), 1);
        // Cd ≤ 0, Te ≤ 0 (→ -μ_Cd ≤ 1.25), CdTe2 (→ -μ_Cd ≤ -1.0 + 2.5)
        assert_eq!(problem.halfspaces.len(), 3);

        let te_bound = problem
            .halfspaces
            .iter()
            .find(|h| h.source == ConstraintSource::ElementalReference("Te".to_string()))
            .unwrap();
        assert_eq!(te_bound.normal, vec![-1.0]);
        assert!((te_bound.offset - 1.25).abs() < 1e-12);

        let cdte2 = problem
            .halfspaces
            .iter()
            .find(|h| h.source == ConstraintSource::Phase("CdTe2".to_string()))
            .unwrap();
        assert_eq!(cdte2.normal, vec![-1.0]);
        assert!((cdte2.offset - 1.5).abs() < 1e-12);
    }

    #[test]
    fn lift_satisfies_target_equality() {
        let problem = binary_problem();
        let mu = problem.lift(&[-0.5]);
        assert!((mu[0] + 0.5).abs() < 1e-12);
        assert!((mu[0] + mu[1] + 1.25).abs() < 1e-12);
    }

    #[test]
    fn phases_outside_system_are_ignored() {
        let system = ChemicalSystem::new(&["Cd", "Te"]).unwrap();
        let target = phase("CdTe", -1.25);
        let table = PhaseTable::from_phases(vec![target.clone(), phase("CdO", -2.0)]);
        let problem = StabilityProblem::build(&system, &table, &target, 1, 1e-6);
        assert_eq!(problem.halfspaces.len(), 2);
    }

    #[test]
    fn degenerate_constraint_is_flagged_when_violated() {
        // Cd2Te2 reduces to the target stoichiometry and is skipped, but a
        // phase parallel to the target with lower energy cannot be satisfied.
        let system = ChemicalSystem::new(&["Cd", "Te"]).unwrap();
        let target = phase("CdTe", -1.25);
        let mut problem = StabilityProblem::build(
            &system,
            &PhaseTable::from_phases(vec![target.clone()]),
            &target,
            1,
            1e-6,
        );
        problem.push(
            &[2.0, 2.0],
            -3.0,
            ConstraintSource::Phase("Cd2Te2".to_string()),
            1e-6,
        );
        assert_eq!(
            problem.unconditionally_violated,
            vec![ConstraintSource::Phase("Cd2Te2".to_string())]
        );
    }
}
