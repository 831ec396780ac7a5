// Provider-facing HTTP plumbing
//
// - fetcher: per-video metadata request
// - normalize: both known response shapes into StreamCandidate
// - health: cheap liveness probe
// - source: where the instance list comes from

mod fetcher;
mod health;
mod normalize;
mod source;

pub use fetcher::HttpStreamFetcher;
pub use health::HttpHealthProbe;
pub use normalize::{normalize, parse_metadata};
pub use source::{load_with_fallback, RemoteProviderSource, StaticProviderSource};
