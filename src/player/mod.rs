pub mod controller;
pub mod memory;
pub mod queue;
pub mod rodio_sink;
pub mod sources;
pub mod state;
pub mod traits;

pub use controller::{
    ControllerEvent, ControllerOptions, PlayOutcome, PlaybackController, Preferences,
};
pub use memory::{LoadBehavior, MemorySink, MemorySinkHandle, SinkCall};
pub use queue::QueueStore;
pub use rodio_sink::RodioSink;
pub use state::{format_time, PlayerStore};
pub use traits::{
    MediaSink, PlaybackState, RepeatMode, SinkEvent, SinkEventKind, SinkEventReceiver,
    SinkEventSender,
};
