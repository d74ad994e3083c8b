pub mod events;
pub mod instrument;
pub mod settings;
pub mod track;

pub use events::{
    ChannelMessage, Event, EventId, EventKind, EventPatch, EventType, MetaMessage, NewEvent,
    Subtype,
};
pub use instrument::InstrumentNames;
pub use settings::{SettingsError, TrackSettings};
pub use track::{Parameter, Track, TrackChange, Transaction};

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Calling it again is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
