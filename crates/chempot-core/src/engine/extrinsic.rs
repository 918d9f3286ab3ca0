use super::error::EngineError;
use super::limits::{ChemicalPotentialLimits, ExtrinsicLimits, elemental_references};
use crate::core::models::composition::Composition;
use crate::core::models::phase::{Phase, PhaseTable};
use crate::core::models::system::ChemicalSystem;
use tracing::{debug, info, instrument, warn};

/// Bound on one extrinsic chemical potential at one vertex, and what sets it.
#[derive(Debug, Clone, PartialEq)]
struct Bound {
    value: f64,
    limiting: String,
}

/// Evaluates the upper bound on each extrinsic species at every intrinsic
/// vertex.
///
/// The bound at a vertex is the smallest of the elemental limit `μ_x ≤ 0` and
/// `(ΔH_p − Σ_i c_i μ_i) / c_x` over every phase `p` made of `x` and the
/// intrinsic elements. The intrinsic vertices are left unchanged; phases
/// with more than one extrinsic species are ignored.
#[instrument(skip_all, name = "extrinsic_extension")]
pub fn extend(
    limits: &mut ChemicalPotentialLimits,
    system: &ChemicalSystem,
    table: &PhaseTable,
) -> Result<(), EngineError> {
    let species = system.extrinsic().to_vec();
    if species.is_empty() {
        limits.extrinsic = None;
        return Ok(());
    }

    let mut values = vec![Vec::with_capacity(species.len()); limits.intrinsic.len()];
    let mut limiting_phases = vec![Vec::with_capacity(species.len()); limits.intrinsic.len()];

    for x in &species {
        let mut allowed = limits.elements.clone();
        allowed.push(x.clone());
        let hosts: Vec<&Phase> = table
            .within(&allowed)
            .filter(|p| !p.is_elemental() && p.composition().contains(x))
            .collect();
        if hosts.is_empty() {
            warn!(
                "No phase containing extrinsic species {} was found; its limit is the elemental reference.",
                x
            );
        }
        debug!("Extrinsic species {} is bounded by {} phase(s).", x, hosts.len());

        for (vertex, limit) in limits.intrinsic.iter().enumerate() {
            let bound = bound_at(x, &limits.elements, &limit.mu, &hosts);
            values[vertex].push(bound.value);
            limiting_phases[vertex].push(bound.limiting);
        }
    }

    for (el, reference) in elemental_references(table, &species) {
        limits.elemental_refs.insert(el, reference);
    }
    info!(
        "Extended {} limit(s) with extrinsic species {}.",
        limits.intrinsic.len(),
        species.join(", ")
    );
    limits.extrinsic = Some(ExtrinsicLimits {
        species,
        values,
        limiting_phases,
    });
    Ok(())
}

fn bound_at(x: &str, elements: &[String], mu: &[f64], hosts: &[&Phase]) -> Bound {
    let mut best = Bound {
        value: 0.0,
        limiting: x.to_string(),
    };
    for phase in hosts {
        let composition: &Composition = phase.composition();
        let host_energy: f64 = elements
            .iter()
            .zip(mu)
            .map(|(el, m)| composition.get(el) * m)
            .sum();
        let value = (phase.formation_energy - host_energy) / composition.get(x);
        if value < best.value {
            best = Bound {
                value,
                limiting: phase.reduced_formula(),
            };
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::limits::solve;

    const TOL: f64 = 1e-6;

    fn phase(formula: &str, formation_energy: f64) -> Phase {
        Phase::new(formula, formation_energy, formation_energy, formation_energy).unwrap()
    }

    fn cdte_with_dopant(cl_energy: f64) -> (ChemicalSystem, PhaseTable, ChemicalPotentialLimits) {
        let table = PhaseTable::from_phases(vec![
            phase("Cd", 0.0),
            phase("Te", 0.0),
            phase("Cl2", 0.0),
            phase("CdTe", -2.0),
            phase("CdCl2", cl_energy),
            phase("TeCl4", -3.0),
        ]);
        let system = ChemicalSystem::new(&["Cd", "Te"])
            .unwrap()
            .with_extrinsic(&["Cl"])
            .unwrap();
        let limits = solve(&system, &table, "CdTe", None, TOL).unwrap();
        (system, table, limits)
    }

    #[test]
    fn extrinsic_limit_is_minimum_over_phases() {
        let (system, table, mut limits) = cdte_with_dopant(-4.0);
        extend(&mut limits, &system, &table).unwrap();
        let extrinsic = limits.extrinsic.as_ref().unwrap();

        assert_eq!(extrinsic.species, vec!["Cl"]);
        assert_eq!(extrinsic.values.len(), limits.intrinsic.len());

        // Cd-rich (μ_Cd = 0, μ_Te = -2): CdCl2 gives -2, TeCl4 gives -0.25.
        assert!((extrinsic.values[0][0] + 2.0).abs() < 1e-9);
        assert_eq!(extrinsic.limiting_phases[0][0], "CdCl2");
        // Te-rich (μ_Cd = -2, μ_Te = 0): CdCl2 gives -1, TeCl4 gives -0.75.
        assert!((extrinsic.values[1][0] + 1.0).abs() < 1e-9);
        assert_eq!(limits.mu(1, "Cl"), Some(extrinsic.values[1][0]));
    }

    #[test]
    fn lowering_a_host_phase_energy_never_raises_the_bound() {
        let (system, table, mut before) = cdte_with_dopant(-4.0);
        extend(&mut before, &system, &table).unwrap();
        let (system, table, mut after) = cdte_with_dopant(-5.0);
        extend(&mut after, &system, &table).unwrap();

        let before = before.extrinsic.unwrap();
        let after = after.extrinsic.unwrap();
        for (b, a) in before.values.iter().zip(&after.values) {
            assert!(a[0] <= b[0] + 1e-12);
        }
    }

    #[test]
    fn species_without_host_phases_is_bounded_by_reference() {
        let (_, table, mut limits) = cdte_with_dopant(-4.0);
        let system = ChemicalSystem::new(&["Cd", "Te"])
            .unwrap()
            .with_extrinsic(&["Na"])
            .unwrap();
        extend(&mut limits, &system, &table).unwrap();
        let extrinsic = limits.extrinsic.unwrap();
        assert!(extrinsic.values.iter().all(|v| v[0] == 0.0));
        assert!(extrinsic.limiting_phases.iter().all(|p| p[0] == "Na"));
    }

    #[test]
    fn intrinsic_limits_are_unchanged() {
        let (system, table, limits) = cdte_with_dopant(-4.0);
        let mut extended = limits.clone();
        extend(&mut extended, &system, &table).unwrap();
        assert_eq!(extended.intrinsic, limits.intrinsic);
        assert_eq!(extended.species(), vec!["Cd", "Te", "Cl"]);
    }
}
