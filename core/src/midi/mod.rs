pub mod decoder;
pub mod encoder;
pub mod events;
pub mod file;
pub mod types;
pub mod vlq;

pub use self::events::{ChannelEvent, MetaEvent, MidiEvent, NodeEvent};
pub use self::file::{Format, MidiFile, TrackChunk};
