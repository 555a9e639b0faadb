mod metrics;
mod no_cache;

pub(crate) use self::{metrics::Metrics, no_cache::NoCache};
