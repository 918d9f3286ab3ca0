use super::element;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const AMOUNT_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Formula is empty")]
    Empty,
    #[error("Unknown element symbol '{0}'")]
    UnknownElement(String),
    #[error("Unexpected character '{ch}' at position {position} in formula '{formula}'")]
    UnexpectedCharacter {
        formula: String,
        ch: char,
        position: usize,
    },
    #[error("Unbalanced parentheses in formula '{0}'")]
    UnbalancedParentheses(String),
    #[error("Invalid amount '{amount}' in formula '{formula}'")]
    InvalidAmount { formula: String, amount: String },
}

/// Element amounts of a formula unit, kept in the order the elements first
/// appeared in the formula.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    amounts: Vec<(String, f64)>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` of `element`, merging with any existing entry.
    pub fn add(&mut self, element: &str, amount: f64) {
        if let Some(entry) = self.amounts.iter_mut().find(|(el, _)| el == element) {
            entry.1 += amount;
        } else {
            self.amounts.push((element.to_string(), amount));
        }
    }

    pub fn get(&self, element: &str) -> f64 {
        self.amounts
            .iter()
            .find(|(el, _)| el == element)
            .map_or(0.0, |(_, amount)| *amount)
    }

    pub fn contains(&self, element: &str) -> bool {
        self.get(element).abs() > AMOUNT_TOLERANCE
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.amounts.iter().map(|(el, _)| el.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(el, amount)| (el.as_str(), *amount))
    }

    pub fn num_elements(&self) -> usize {
        self.amounts.len()
    }

    pub fn num_atoms(&self) -> f64 {
        self.amounts.iter().map(|(_, amount)| amount).sum()
    }

    pub fn is_elemental(&self) -> bool {
        self.amounts.len() == 1
    }

    pub fn is_within<S: AsRef<str>>(&self, elements: &[S]) -> bool {
        self.elements()
            .all(|el| elements.iter().any(|allowed| allowed.as_ref() == el))
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            amounts: self
                .amounts
                .iter()
                .map(|(el, amount)| (el.clone(), amount * factor))
                .collect(),
        }
    }

    /// Atomic fraction of `element`.
    pub fn fraction(&self, element: &str) -> f64 {
        let total = self.num_atoms();
        if total.abs() < AMOUNT_TOLERANCE {
            0.0
        } else {
            self.get(element) / total
        }
    }

    /// Largest factor `f` such that every amount divided by `f` is still an
    /// integer. Non-integer compositions have a factor of 1.
    pub fn reduction_factor(&self) -> f64 {
        let mut divisor: u64 = 0;
        for (_, amount) in &self.amounts {
            let rounded = amount.round();
            if (amount - rounded).abs() > AMOUNT_TOLERANCE || rounded < 1.0 {
                return 1.0;
            }
            divisor = gcd(divisor, rounded as u64);
        }
        if divisor == 0 { 1.0 } else { divisor as f64 }
    }

    pub fn reduced(&self) -> Self {
        self.scaled(1.0 / self.reduction_factor())
    }

    pub fn reduced_formula(&self) -> String {
        self.reduced().to_string()
    }

    /// Whether both compositions describe the same stoichiometry, regardless
    /// of formula-unit size and element order.
    pub fn same_stoichiometry(&self, other: &Composition) -> bool {
        if self.num_elements() != other.num_elements() {
            return false;
        }
        self.elements()
            .all(|el| (self.fraction(el) - other.fraction(el)).abs() < 1e-6)
    }

    pub fn has_integer_amounts(&self) -> bool {
        self.amounts
            .iter()
            .all(|(_, amount)| (amount - amount.round()).abs() < AMOUNT_TOLERANCE)
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn format_amount(amount: f64) -> String {
    if (amount - amount.round()).abs() < AMOUNT_TOLERANCE {
        format!("{}", amount.round() as i64)
    } else {
        format!("{}", amount)
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (el, amount) in &self.amounts {
            if (amount - 1.0).abs() < AMOUNT_TOLERANCE {
                write!(f, "{}", el)?;
            } else {
                write!(f, "{}{}", el, format_amount(*amount))?;
            }
        }
        Ok(())
    }
}

impl FromStr for Composition {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let formula = s.trim();
        if formula.is_empty() {
            return Err(FormulaError::Empty);
        }
        let chars: Vec<char> = formula.chars().collect();
        let mut parser = FormulaParser {
            formula,
            chars: &chars,
            pos: 0,
        };
        let composition = parser.parse_group()?;
        if parser.pos != chars.len() {
            return Err(FormulaError::UnbalancedParentheses(formula.to_string()));
        }
        if composition.amounts.is_empty() {
            return Err(FormulaError::Empty);
        }
        Ok(composition)
    }
}

struct FormulaParser<'a> {
    formula: &'a str,
    chars: &'a [char],
    pos: usize,
}

impl FormulaParser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse_group(&mut self) -> Result<Composition, FormulaError> {
        let mut composition = Composition::new();
        while let Some(ch) = self.peek() {
            match ch {
                '(' | '[' => {
                    self.pos += 1;
                    let inner = self.parse_group()?;
                    match self.peek() {
                        Some(')') | Some(']') => self.pos += 1,
                        _ => {
                            return Err(FormulaError::UnbalancedParentheses(
                                self.formula.to_string(),
                            ));
                        }
                    }
                    let multiplier = self.parse_amount()?.unwrap_or(1.0);
                    for (el, amount) in inner.iter() {
                        composition.add(el, amount * multiplier);
                    }
                }
                ')' | ']' => break,
                c if c.is_ascii_uppercase() => {
                    let start = self.pos;
                    self.pos += 1;
                    while self.peek().is_some_and(|c| c.is_ascii_lowercase()) {
                        self.pos += 1;
                    }
                    let symbol: String = self.chars[start..self.pos].iter().collect();
                    if !element::is_element(&symbol) {
                        return Err(FormulaError::UnknownElement(symbol));
                    }
                    let amount = self.parse_amount()?.unwrap_or(1.0);
                    composition.add(&symbol, amount);
                }
                c if c.is_whitespace() => self.pos += 1,
                c => {
                    return Err(FormulaError::UnexpectedCharacter {
                        formula: self.formula.to_string(),
                        ch: c,
                        position: self.pos,
                    });
                }
            }
        }
        Ok(composition)
    }

    fn parse_amount(&mut self) -> Result<Option<f64>, FormulaError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(value) if value > 0.0 => Ok(Some(value)),
            _ => Err(FormulaError::InvalidAmount {
                formula: self.formula.to_string(),
                amount: text,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(formula: &str) -> Composition {
        formula.parse().unwrap()
    }

    #[test]
    fn parses_simple_formulas_in_order() {
        let comp = parse("LaMnO3");
        let elements: Vec<_> = comp.elements().collect();
        assert_eq!(elements, vec!["La", "Mn", "O"]);
        assert_eq!(comp.get("O"), 3.0);
        assert_eq!(comp.num_atoms(), 5.0);
    }

    #[test]
    fn parses_parentheses_and_merges_repeated_elements() {
        let comp = parse("Mn(OH)2");
        assert_eq!(comp.get("Mn"), 1.0);
        assert_eq!(comp.get("O"), 2.0);
        assert_eq!(comp.get("H"), 2.0);

        let comp = parse("CH3COOH");
        assert_eq!(comp.get("C"), 2.0);
        assert_eq!(comp.get("O"), 2.0);
        assert_eq!(comp.get("H"), 4.0);
    }

    #[test]
    fn parses_fractional_amounts() {
        let comp = parse("Li0.5CoO2");
        assert!((comp.get("Li") - 0.5).abs() < 1e-12);
        assert!(!comp.has_integer_amounts());
        assert_eq!(comp.reduction_factor(), 1.0);
    }

    #[test]
    fn rejects_malformed_formulas() {
        assert_eq!("".parse::<Composition>(), Err(FormulaError::Empty));
        assert_eq!(
            "Xy2".parse::<Composition>(),
            Err(FormulaError::UnknownElement("Xy".to_string()))
        );
        assert!(matches!(
            "Mn(OH2".parse::<Composition>(),
            Err(FormulaError::UnbalancedParentheses(_))
        ));
        assert!(matches!(
            "MnO)2".parse::<Composition>(),
            Err(FormulaError::UnbalancedParentheses(_))
        ));
        assert!(matches!(
            "Mn-O".parse::<Composition>(),
            Err(FormulaError::UnexpectedCharacter { ch: '-', .. })
        ));
        assert!(matches!(
            "Mn1.2.3".parse::<Composition>(),
            Err(FormulaError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn reduced_formula_divides_by_common_factor() {
        assert_eq!(parse("Mn2O4").reduced_formula(), "MnO2");
        assert_eq!(parse("O2").reduced_formula(), "O");
        assert_eq!(parse("La2Mn2O6").reduced_formula(), "LaMnO3");
        assert_eq!(parse("La2O3").reduced_formula(), "La2O3");
        assert_eq!(parse("Mn2O4").reduction_factor(), 2.0);
    }

    #[test]
    fn same_stoichiometry_ignores_order_and_size() {
        assert!(parse("Mn2O4").same_stoichiometry(&parse("O2Mn")));
        assert!(!parse("MnO").same_stoichiometry(&parse("MnO2")));
        assert!(!parse("MnO").same_stoichiometry(&parse("LaMnO")));
    }

    #[test]
    fn is_within_checks_element_subset() {
        let comp = parse("LaMnO3");
        assert!(comp.is_within(&["La", "Mn", "O", "Sr"]));
        assert!(!comp.is_within(&["La", "O"]));
    }

    #[test]
    fn display_omits_unit_amounts() {
        assert_eq!(parse("LaMnO3").to_string(), "LaMnO3");
        assert_eq!(parse("Li0.5CoO2").to_string(), "Li0.5CoO2");
    }
}
