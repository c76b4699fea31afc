//! Core library for OutfitCheck: sends outfit photos to a vision model for
//! fashion critique and keeps user data, check history, and preferences in a
//! local on-device record store. UI layers call into [`AnalysisClient`] and
//! [`LocalRecordStore`]; the two never call each other directly.

pub mod analyzer;
pub mod error;
pub mod storage;

pub use analyzer::{AnalysisClient, AnalysisOptions, AnalysisResult, ClientConfig, EncodedImage};
pub use error::OutfitCheckError;
pub use storage::{HistoryRecord, HistoryStats, LocalRecordStore, PreferenceRecord, UserRecord};

/// Install the default tracing subscriber, honoring `RUST_LOG` and falling
/// back to `info`. Call once from the embedding application.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
