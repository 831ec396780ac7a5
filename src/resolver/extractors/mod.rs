// Last-resort extraction when every provider failed
//
// - ytdlp: yt-dlp in CLI or Python mode
// - diagnostics: classify extractor stderr into a blocking reason

mod diagnostics;
mod ytdlp;

pub use diagnostics::{diagnose_error, BlockingReason};
pub use ytdlp::{ExtractorConfig, ExtractorMode, YtDlpExtractor};
