//! irt::core — data, grid, statistics and configuration shared by both item
//! models.
//!
//! - [`data`]: validated sparse responses and group labels.
//! - [`quadrature`]: the latent-trait grid and normal group priors.
//! - [`stats`]: E-step sufficient statistics with an explicit merge.
//! - [`groups`]: group distributions and their closed-form update.
//! - [`options`]: stopping rules and EM options.

pub mod data;
pub mod groups;
pub mod options;
pub mod quadrature;
pub mod stats;

pub use self::data::ResponseData;
pub use self::groups::{GroupDistribution, ReferencePolicy, update_groups};
pub use self::options::{EmOptions, StoppingRule};
pub use self::quadrature::{QuadratureGrid, group_prior, group_priors};
pub use self::stats::SufficientStats;
