//! Media extraction adapter
//!
//! The job lifecycle never talks to the extraction tool directly. It goes
//! through the [`Extractor`] trait, which downloads one URL into a scratch
//! directory and reports progress through a callback.
//!
//! ## Implementations
//!
//! - [`YtDlpExtractor`]: runs the external `yt-dlp` binary
//! - [`UnavailableExtractor`]: fails every request when no binary is installed,
//!   so the service still starts and reports the problem per job
//!
//! ## Usage
//!
//! ```no_run
//! use media_dl::extractor::{Extractor, YtDlpExtractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = YtDlpExtractor::from_path().expect("yt-dlp binary not found");
//!
//!     let info = extractor.probe("https://www.youtube.com/watch?v=abc").await?;
//!     println!("{} by {} ({}s)", info.title, info.uploader, info.duration);
//!
//!     if !extractor.capabilities().can_merge_formats {
//!         println!("ffmpeg missing, only progressive formats are available");
//!     }
//!
//!     Ok(())
//! }
//! ```

mod cli;
mod parser;
mod traits;
mod unavailable;

pub use cli::{FormatSelection, YtDlpExtractor};
pub use parser::{ToolLine, parse_line, parse_media_info, parse_result};
pub use traits::{Extractor, ExtractorCapabilities, ProgressCallback};
pub use unavailable::UnavailableExtractor;
