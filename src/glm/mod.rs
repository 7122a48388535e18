//! Generalized linear model fitting for negative binomial data

mod design;
mod fitting;
mod linalg;
mod negative_binomial;

pub use design::{check_full_rank, GroupDesign};
pub use fitting::{fit_gene, GeneFit, GlmFitParams};
pub(crate) use linalg::{invert_symmetric, log_det_symmetric, solve_symmetric};
pub use negative_binomial::{nb_log_likelihood, nb_mean, nb_variance, nb_weight, MAX_LFC_BETA, MIN_MU};
