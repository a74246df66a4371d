pub mod audio;
pub mod audio_api;
pub mod dispatcher;
pub mod loader;
pub mod middle;
pub mod pipeline;
pub mod shared;
pub mod transport;
pub mod tui;
pub mod voices;
