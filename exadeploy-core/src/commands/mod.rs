//! Command implementations: deploy, plan.

pub mod deploy;
pub mod plan;
