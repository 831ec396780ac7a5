// Stream resolution - provider chain, selection and yt-dlp fallback
//
// Structure:
// - models, errors, traits: shared types and the seams to the outside world
// - providers: HTTP fetcher, health probe, provider sources, response normalization
// - registry: candidate ordering and advisory provider health
// - selector: pure best-stream selection
// - extractors: yt-dlp fallback and failure diagnostics
// - orchestrator: the Resolver state machine
// - config: file + environment configuration

pub mod config;
pub mod errors;
pub mod extractors;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod selector;
pub mod traits;
pub mod utils;

pub use config::{ConfigError, ResolverConfig};
pub use errors::{ResolveError, ResolverFailure};
pub use extractors::{BlockingReason, ExtractorMode, YtDlpExtractor};
pub use models::{
    ExtractedStream, Liveness, Provider, ProviderKind, RawMetadata, ResolvedStream,
    StreamCandidate, StreamKind, StreamSource, VideoId,
};
pub use orchestrator::{Resolver, ResolverSettings};
pub use registry::{CandidateOrder, ProviderRegistry, ProviderStatus};
pub use selector::{SelectionPolicy, StreamSelector};
pub use traits::{FallbackExtractor, HealthProbe, ProviderSource, StreamFetcher};
pub use utils::{attachment_url, display_title, sanitize_title};
