use super::constraints::{ConstraintSource, StabilityProblem, amounts};
use super::error::EngineError;
use super::polytope::{self, Vertex};
use crate::core::io::limits_table::{LimitsRow, LimitsTable};
use crate::core::models::composition::Composition;
use crate::core::models::phase::{Phase, PhaseTable};
use crate::core::models::system::ChemicalSystem;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Chemical potentials closer than this are treated as equal when picking
/// rich and poor limits.
const TIE_TOLERANCE: f64 = 1e-9;

/// One vertex of the stability region: a chemical potential per element,
/// relative to the elemental references.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemicalPotentialLimit {
    /// Binding phases joined with `-`, e.g. `"La2O3-LaMnO3-MnO"`.
    pub label: String,
    pub mu: Vec<f64>,
}

/// Extrinsic chemical potentials evaluated at each intrinsic vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrinsicLimits {
    pub species: Vec<String>,
    /// `values[vertex][species]`.
    pub values: Vec<Vec<f64>>,
    /// The phase that sets each value, `limiting_phases[vertex][species]`.
    pub limiting_phases: Vec<Vec<String>>,
}

/// The stability region of a target compound.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemicalPotentialLimits {
    pub target: String,
    pub elements: Vec<String>,
    pub dependent_element: String,
    pub target_composition: Composition,
    pub target_formation_energy: f64,
    /// Energy per atom of each element's reference phase, where known.
    pub elemental_refs: BTreeMap<String, f64>,
    pub intrinsic: Vec<ChemicalPotentialLimit>,
    pub extrinsic: Option<ExtrinsicLimits>,
}

impl ChemicalPotentialLimits {
    pub fn len(&self) -> usize {
        self.intrinsic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intrinsic.is_empty()
    }

    /// Looks a limit up by its label, or by `"<El>-rich"` / `"<El>-poor"`.
    pub fn limit(&self, name: &str) -> Option<&ChemicalPotentialLimit> {
        self.position(name).map(|vertex| &self.intrinsic[vertex])
    }

    /// The limit with the highest chemical potential of `element`. Ties go to
    /// the earlier limit.
    pub fn rich_limit(&self, element: &str) -> Option<&ChemicalPotentialLimit> {
        self.rich_vertex(element).map(|vertex| &self.intrinsic[vertex])
    }

    /// The limit with the lowest chemical potential of `element`. Ties go to
    /// the earlier limit.
    pub fn poor_limit(&self, element: &str) -> Option<&ChemicalPotentialLimit> {
        self.poor_vertex(element).map(|vertex| &self.intrinsic[vertex])
    }

    /// Chemical potentials of every species at the named limit, in
    /// [`species`](Self::species) order.
    pub fn values(&self, name: &str) -> Option<Vec<f64>> {
        let vertex = self.position(name)?;
        self.species().iter().map(|s| self.mu(vertex, s)).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        if let Some(vertex) = self.intrinsic.iter().position(|l| l.label == name) {
            return Some(vertex);
        }
        if let Some(element) = name.strip_suffix("-rich") {
            return self.rich_vertex(element);
        }
        name.strip_suffix("-poor")
            .and_then(|element| self.poor_vertex(element))
    }

    fn rich_vertex(&self, element: &str) -> Option<usize> {
        self.extreme_vertex(element, |candidate, best| candidate > best + TIE_TOLERANCE)
    }

    fn poor_vertex(&self, element: &str) -> Option<usize> {
        self.extreme_vertex(element, |candidate, best| candidate < best - TIE_TOLERANCE)
    }

    fn extreme_vertex(&self, element: &str, better: impl Fn(f64, f64) -> bool) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for vertex in 0..self.intrinsic.len() {
            let value = self.mu(vertex, element)?;
            if best.is_none_or(|(_, current)| better(value, current)) {
                best = Some((vertex, value));
            }
        }
        best.map(|(vertex, _)| vertex)
    }

    pub fn mu(&self, vertex: usize, element: &str) -> Option<f64> {
        let limit = self.intrinsic.get(vertex)?;
        if let Some(idx) = self.elements.iter().position(|el| el == element) {
            return limit.mu.get(idx).copied();
        }
        let extrinsic = self.extrinsic.as_ref()?;
        let idx = extrinsic.species.iter().position(|el| el == element)?;
        extrinsic.values.get(vertex)?.get(idx).copied()
    }

    /// All species: intrinsic elements followed by extrinsic species.
    pub fn species(&self) -> Vec<String> {
        let mut species = self.elements.clone();
        if let Some(extrinsic) = &self.extrinsic {
            species.extend(extrinsic.species.iter().cloned());
        }
        species
    }

    /// Limits relative to the elemental references (μ − μ_ref), with the
    /// extrinsic columns appended.
    pub fn to_table(&self) -> LimitsTable {
        self.build_table(|_, _, value| Some(value))
            .unwrap_or_default()
    }

    /// Absolute chemical potentials (μ_ref + Δμ). `None` when a reference
    /// energy is unknown for any species.
    pub fn to_absolute_table(&self) -> Option<LimitsTable> {
        self.build_table(|refs, species, value| refs.get(species).map(|r| r + value))
    }

    fn build_table(
        &self,
        transform: impl Fn(&BTreeMap<String, f64>, &str, f64) -> Option<f64>,
    ) -> Option<LimitsTable> {
        let species = self.species();
        let mut rows = Vec::with_capacity(self.intrinsic.len());
        for vertex in 0..self.intrinsic.len() {
            let values = species
                .iter()
                .map(|s| {
                    let value = self.mu(vertex, s)?;
                    transform(&self.elemental_refs, s, value)
                })
                .collect::<Option<Vec<f64>>>()?;
            rows.push(LimitsRow {
                label: self.intrinsic[vertex].label.clone(),
                values,
            });
        }
        Some(LimitsTable { species, rows })
    }
}

/// Picks the dependent element when the user does not: the element with the
/// smallest amount in the target, ties going to the later element in system
/// order (the anion for conventional formula ordering).
pub fn default_dependent_element(system: &ChemicalSystem, target: &Composition) -> usize {
    let mut best = 0;
    let mut best_amount = f64::INFINITY;
    for (idx, el) in system.elements().iter().enumerate() {
        let amount = target.get(el);
        if amount > 0.0 && amount <= best_amount {
            best = idx;
            best_amount = amount;
        }
    }
    best
}

/// Energy per atom of the lowest-energy elemental phase of each element.
pub fn elemental_references(table: &PhaseTable, elements: &[String]) -> BTreeMap<String, f64> {
    elements
        .iter()
        .filter_map(|el| {
            table
                .elemental(el)
                .map(|phase| (el.clone(), phase.energy_per_atom()))
        })
        .collect()
}

/// Solves for the intrinsic stability region of `target_formula`.
#[instrument(skip_all, name = "limit_solver", fields(target = target_formula))]
pub fn solve(
    system: &ChemicalSystem,
    table: &PhaseTable,
    target_formula: &str,
    dependent_element: Option<&str>,
    tolerance: f64,
) -> Result<ChemicalPotentialLimits, EngineError> {
    let target = find_target(system, table, target_formula)?;
    let dependent = resolve_dependent(system, target, dependent_element)?;
    info!(
        "Solving stability region of {} in the {} system (dependent element: {}).",
        target.formula(),
        system.elements().join("-"),
        system.elements()[dependent]
    );

    let problem = StabilityProblem::build(system, table, target, dependent, tolerance);
    if !problem.unconditionally_violated.is_empty() {
        return Err(infeasible(target, &problem.unconditionally_violated));
    }

    let enumeration = polytope::enumerate_vertices(&problem.halfspaces, problem.dimension(), tolerance);
    if enumeration.vertices.is_empty() {
        let violated: Vec<ConstraintSource> = enumeration
            .closest_infeasible
            .map(|(_, indices)| {
                indices
                    .into_iter()
                    .map(|i| problem.halfspaces[i].source.clone())
                    .collect()
            })
            .unwrap_or_default();
        return Err(infeasible(target, &violated));
    }

    let mut intrinsic: Vec<ChemicalPotentialLimit> = enumeration
        .vertices
        .iter()
        .map(|vertex| ChemicalPotentialLimit {
            label: label_for(vertex, &problem, target),
            mu: problem.lift(&vertex.point).into_iter().map(clean_zero).collect(),
        })
        .collect();
    sort_limits(&mut intrinsic, tolerance);
    verify_limits(&intrinsic, system, table, target, tolerance)?;

    for limit in &intrinsic {
        debug!("Limit {}: {:?}", limit.label, limit.mu);
    }
    info!("Found {} chemical potential limit(s).", intrinsic.len());

    Ok(ChemicalPotentialLimits {
        target: target.reduced_formula(),
        elements: system.elements().to_vec(),
        dependent_element: system.elements()[dependent].clone(),
        target_composition: target.composition().clone(),
        target_formation_energy: target.formation_energy,
        elemental_refs: elemental_references(table, system.elements()),
        intrinsic,
        extrinsic: None,
    })
}

fn find_target<'a>(
    system: &ChemicalSystem,
    table: &'a PhaseTable,
    target_formula: &str,
) -> Result<&'a Phase, EngineError> {
    let composition: Composition = target_formula.parse()?;
    if !system.covers(&composition) {
        return Err(EngineError::InvalidTarget {
            target: target_formula.to_string(),
            reason: format!(
                "its elements are not all within the chemical system {}",
                system.elements().join("-")
            ),
        });
    }
    // An element absent from the target only has upper bounds, so the
    // region would be unbounded along it.
    let absent: Vec<&str> = system
        .elements()
        .iter()
        .map(String::as_str)
        .filter(|el| !composition.contains(el))
        .collect();
    if !absent.is_empty() {
        return Err(EngineError::InvalidTarget {
            target: target_formula.to_string(),
            reason: format!(
                "it does not contain {}; list such elements as extrinsic species instead",
                absent.join(", ")
            ),
        });
    }
    table
        .get(target_formula)
        .ok_or_else(|| EngineError::TargetNotFound {
            target: target_formula.to_string(),
        })
}

fn resolve_dependent(
    system: &ChemicalSystem,
    target: &Phase,
    requested: Option<&str>,
) -> Result<usize, EngineError> {
    match requested {
        Some(element) => system
            .index_of(element)
            .filter(|_| target.composition().contains(element))
            .ok_or_else(|| EngineError::InvalidDependentElement {
                element: element.to_string(),
                target: target.formula().to_string(),
            }),
        None => Ok(default_dependent_element(system, target.composition())),
    }
}

fn infeasible(target: &Phase, violated: &[ConstraintSource]) -> EngineError {
    let mut names: Vec<String> = violated.iter().map(|s| s.name().to_string()).collect();
    names.sort();
    names.dedup();
    warn!(
        "{} is not stable anywhere in chemical potential space (violated: {}).",
        target.formula(),
        names.join(", ")
    );
    EngineError::InfeasibleSystem {
        target: target.reduced_formula(),
        violated: names,
    }
}

fn label_for(vertex: &Vertex, problem: &StabilityProblem, target: &Phase) -> String {
    let mut names: Vec<String> = vertex
        .active
        .iter()
        .map(|&i| problem.halfspaces[i].source.name().to_string())
        .collect();
    names.push(target.reduced_formula());
    names.sort();
    names.dedup();
    names.join("-")
}

fn clean_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

/// Orders limits richest-first in the first element, then the second, and so
/// on. Values within `tolerance` compare equal.
fn sort_limits(limits: &mut [ChemicalPotentialLimit], tolerance: f64) {
    limits.sort_by(|a, b| {
        for (x, y) in a.mu.iter().zip(&b.mu) {
            if (x - y).abs() > tolerance {
                return y.partial_cmp(x).unwrap_or(Ordering::Equal);
            }
        }
        a.label.cmp(&b.label)
    });
}

/// Re-checks every vertex against the untransformed constraints.
fn verify_limits(
    limits: &[ChemicalPotentialLimit],
    system: &ChemicalSystem,
    table: &PhaseTable,
    target: &Phase,
    tolerance: f64,
) -> Result<(), EngineError> {
    let elements = system.elements();
    let target_row = amounts(target.composition(), elements);
    for limit in limits {
        let dot = |row: &[f64]| row.iter().zip(&limit.mu).map(|(c, m)| c * m).sum::<f64>();
        if (dot(&target_row) - target.formation_energy).abs() > tolerance {
            return Err(EngineError::InfeasibleSystem {
                target: target.reduced_formula(),
                violated: vec![target.reduced_formula()],
            });
        }
        let mut violated: Vec<String> = table
            .within(elements)
            .filter(|p| !p.is_elemental())
            .filter(|p| !p.composition().same_stoichiometry(target.composition()))
            .filter(|p| dot(&amounts(p.composition(), elements)) > p.formation_energy + tolerance)
            .map(|p| p.reduced_formula())
            .collect();
        violated.extend(
            elements
                .iter()
                .zip(&limit.mu)
                .filter(|(_, mu)| **mu > tolerance)
                .map(|(el, _)| el.clone()),
        );
        if !violated.is_empty() {
            return Err(EngineError::InfeasibleSystem {
                target: target.reduced_formula(),
                violated,
            });
        }
    }
    Ok(())
}
