//! Outlier flagging and replacement, independent filtering, and significance views

mod cooks;
mod independent;
mod significance;

pub use cooks::{
    calculate_cooks_distance, default_cooks_cutoff, flag_cooks_outliers, has_replicated_group, replace_outliers,
    replaceable_samples, robust_method_of_moments_disp, OutlierReplacement,
};
pub use independent::{independent_filtering, IndependentFilter};
pub use significance::{significant, SignificantView, DEFAULT_SIGNIFICANCE};
