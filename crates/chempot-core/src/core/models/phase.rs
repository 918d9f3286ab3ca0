use super::composition::{Composition, FormulaError};
use tracing::debug;

/// A computed phase: one row of the phase table.
///
/// `energy_per_fu` and `formation_energy` refer to the formula unit described
/// by `formula` (so `Mn2O4` and `MnO2` rows carry different per-fu values).
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    formula: String,
    composition: Composition,
    pub energy: f64,
    pub energy_per_fu: f64,
    pub formation_energy: f64,
    pub energy_above_hull: Option<f64>,
}

impl Phase {
    pub fn new(
        formula: &str,
        energy: f64,
        energy_per_fu: f64,
        formation_energy: f64,
    ) -> Result<Self, FormulaError> {
        let composition: Composition = formula.parse()?;
        Ok(Self {
            formula: formula.trim().to_string(),
            composition,
            energy,
            energy_per_fu,
            formation_energy,
            energy_above_hull: None,
        })
    }

    pub fn with_energy_above_hull(mut self, energy_above_hull: f64) -> Self {
        self.energy_above_hull = Some(energy_above_hull);
        self
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn reduced_formula(&self) -> String {
        self.composition.reduced_formula()
    }

    pub fn is_elemental(&self) -> bool {
        self.composition.is_elemental()
    }

    pub fn energy_per_atom(&self) -> f64 {
        self.energy_per_fu / self.composition.num_atoms()
    }

    pub fn formation_energy_per_atom(&self) -> f64 {
        self.formation_energy / self.composition.num_atoms()
    }
}

/// A deduplicated collection of phases, one per stoichiometry.
///
/// Polymorphs sharing a reduced formula collapse to the one with the lowest
/// formation energy per atom. Phases are kept sorted by number of elements,
/// then reduced formula, so the table is independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseTable {
    phases: Vec<Phase>,
}

impl PhaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_phases(phases: impl IntoIterator<Item = Phase>) -> Self {
        let mut table = Self::new();
        for phase in phases {
            table.insert(phase);
        }
        table
    }

    /// Inserts a phase, returning `true` if it is now the representative of
    /// its stoichiometry.
    pub fn insert(&mut self, phase: Phase) -> bool {
        let existing = self
            .phases
            .iter()
            .position(|p| p.composition.same_stoichiometry(&phase.composition));

        match existing {
            Some(idx) => {
                let current = &self.phases[idx];
                let candidate_energy = phase.formation_energy_per_atom();
                let current_energy = current.formation_energy_per_atom();
                let replaces = candidate_energy < current_energy
                    || (candidate_energy == current_energy && phase.formula < current.formula);
                if replaces {
                    debug!(
                        "Replacing {} ({:.4} eV/atom) with lower-energy polymorph {} ({:.4} eV/atom).",
                        current.formula, current_energy, phase.formula, candidate_energy
                    );
                    self.phases[idx] = phase;
                    self.sort();
                } else {
                    debug!(
                        "Discarding higher-energy polymorph {} ({:.4} eV/atom).",
                        phase.formula, candidate_energy
                    );
                }
                replaces
            }
            None => {
                self.phases.push(phase);
                self.sort();
                true
            }
        }
    }

    fn sort(&mut self) {
        self.phases.sort_by(|a, b| {
            a.composition
                .num_elements()
                .cmp(&b.composition.num_elements())
                .then_with(|| a.reduced_formula().cmp(&b.reduced_formula()))
        });
    }

    /// Looks up a phase by formula, matching on stoichiometry.
    pub fn get(&self, formula: &str) -> Option<&Phase> {
        let composition: Composition = formula.parse().ok()?;
        self.phases
            .iter()
            .find(|p| p.composition.same_stoichiometry(&composition))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.phases.iter()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Phases whose elements all belong to `elements`.
    pub fn within<S: AsRef<str>>(&self, elements: &[S]) -> impl Iterator<Item = &Phase> {
        self.phases
            .iter()
            .filter(move |p| p.composition.is_within(elements))
    }

    pub fn elemental(&self, element: &str) -> Option<&Phase> {
        self.phases
            .iter()
            .find(|p| p.is_elemental() && p.composition.contains(element))
    }
}

impl IntoIterator for PhaseTable {
    type Item = Phase;
    type IntoIter = std::vec::IntoIter<Phase>;

    fn into_iter(self) -> Self::IntoIter {
        self.phases.into_iter()
    }
}
