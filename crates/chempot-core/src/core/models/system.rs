use super::composition::{Composition, FormulaError};
use super::element;

/// The ordered element set spanning the chemical potential space, plus any
/// extrinsic species whose limits are derived at the intrinsic vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChemicalSystem {
    elements: Vec<String>,
    extrinsic: Vec<String>,
}

impl ChemicalSystem {
    /// Builds a system from element symbols, dropping duplicates while keeping
    /// the first-seen order.
    pub fn new<S: AsRef<str>>(elements: &[S]) -> Result<Self, FormulaError> {
        let mut unique: Vec<String> = Vec::with_capacity(elements.len());
        for symbol in elements {
            let symbol = symbol.as_ref().trim();
            if !element::is_element(symbol) {
                return Err(FormulaError::UnknownElement(symbol.to_string()));
            }
            if !unique.iter().any(|el| el == symbol) {
                unique.push(symbol.to_string());
            }
        }
        if unique.is_empty() {
            return Err(FormulaError::Empty);
        }
        Ok(Self {
            elements: unique,
            extrinsic: Vec::new(),
        })
    }

    /// The system spanned by the elements of a target compound, in formula order.
    pub fn from_composition(composition: &Composition) -> Self {
        Self {
            elements: composition.elements().map(str::to_string).collect(),
            extrinsic: Vec::new(),
        }
    }

    /// Adds extrinsic species. Species already part of the intrinsic system
    /// are ignored.
    pub fn with_extrinsic<S: AsRef<str>>(mut self, species: &[S]) -> Result<Self, FormulaError> {
        for symbol in species {
            let symbol = symbol.as_ref().trim();
            if !element::is_element(symbol) {
                return Err(FormulaError::UnknownElement(symbol.to_string()));
            }
            if !self.contains(symbol) && !self.extrinsic.iter().any(|el| el == symbol) {
                self.extrinsic.push(symbol.to_string());
            }
        }
        Ok(self)
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn extrinsic(&self) -> &[String] {
        &self.extrinsic
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, element: &str) -> bool {
        self.elements.iter().any(|el| el == element)
    }

    pub fn index_of(&self, element: &str) -> Option<usize> {
        self.elements.iter().position(|el| el == element)
    }

    /// Intrinsic elements followed by extrinsic species.
    pub fn all_elements(&self) -> Vec<String> {
        self.elements
            .iter()
            .chain(self.extrinsic.iter())
            .cloned()
            .collect()
    }

    pub fn covers(&self, composition: &Composition) -> bool {
        composition.is_within(&self.elements)
    }
}
