//! Additive model formulas such as `grassland_500 + dist_water + conservancy`

use crate::io::error::{Result, invalid_parameter};
use std::collections::BTreeSet;

/// A named right-hand side of a binomial model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Model name used in reports
    pub name: String,
    /// Covariate names in formula order; empty for the intercept-only model
    pub terms: Vec<String>,
}

impl ModelSpec {
    /// Parse an additive formula
    ///
    /// A leading `~` is accepted. An empty formula or `1` is the intercept-only
    /// model; an explicit `1 +` term is ignored since every model has an intercept.
    ///
    /// # Errors
    ///
    /// Returns an error for empty terms, repeated terms, or names containing
    /// characters other than ASCII letters, digits and underscores
    pub fn parse(name: &str, formula: &str) -> Result<Self> {
        let body = formula.trim().trim_start_matches('~').trim();
        let mut terms = Vec::new();
        let mut seen = BTreeSet::new();

        if !body.is_empty() {
            for raw in body.split('+') {
                let term = raw.trim();
                if term == "1" {
                    continue;
                }
                if term.is_empty() {
                    return Err(invalid_parameter("formula", &formula, &"empty term"));
                }
                if !term.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(invalid_parameter(
                        "formula",
                        &formula,
                        &format!("'{term}' is not a covariate name"),
                    ));
                }
                if !seen.insert(term.to_string()) {
                    return Err(invalid_parameter(
                        "formula",
                        &formula,
                        &format!("'{term}' appears twice"),
                    ));
                }
                terms.push(term.to_string());
            }
        }

        Ok(Self {
            name: name.to_string(),
            terms,
        })
    }

    /// The intercept-only model
    pub fn null(name: &str) -> Self {
        Self {
            name: name.to_string(),
            terms: Vec::new(),
        }
    }

    /// Formula text in canonical form
    pub fn formula(&self) -> String {
        if self.terms.is_empty() {
            "1".to_string()
        } else {
            self.terms.join(" + ")
        }
    }
}
