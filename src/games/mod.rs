pub mod batch;
pub mod error;
pub mod freshness;
pub mod reconciler;
pub mod schedule;

#[cfg(test)]
pub mod testing;

pub use batch::resolve_all;
pub use error::FetchFailure;
pub use freshness::FreshnessPolicy;
pub use reconciler::GameReconciler;
pub use schedule::LeagueSchedule;
