/// AIC ranking of candidate models
pub mod comparison;
/// Binomial family and logit link
pub mod family;
/// Additive model formulas
pub mod formula;
/// IRLS fitting of binomial GLMs
pub mod glm;
