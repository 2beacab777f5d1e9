pub mod channel;
pub mod meta;
pub mod node;

pub use self::channel::{ChannelEvent, ChannelKind, Status};
pub use self::meta::{MetaData, MetaEvent};
pub use self::node::{Generator, Identifier, NodeData, NodeEvent, Trajectory};

use crate::error::{Result, SequencerError};
use crate::time::{BarBeatTime, TicksTime};

#[derive(Debug, Clone, PartialEq)]
pub enum MidiEvent {
  Meta(MetaEvent),
  Channel(ChannelEvent),
  Node(NodeEvent),
}

impl MidiEvent {
  /// Parses exactly one event (without its delta time)
  pub fn parse(delta: TicksTime, bytes: &[u8]) -> Result<MidiEvent> {
    match bytes.first() {
      None => Err(SequencerError::InvalidLength {
        expected: 1,
        actual: 0,
      }),
      Some(&meta::META_STATUS) => match bytes.get(1) {
        Some(&node::CUE_POINT) => NodeEvent::parse(delta, bytes).map(MidiEvent::Node),
        _ => MetaEvent::parse(delta, bytes).map(MidiEvent::Meta),
      },
      Some(_) => ChannelEvent::parse(delta, bytes).map(MidiEvent::Channel),
    }
  }

  pub fn bytes(&self) -> Result<Vec<u8>> {
    match self {
      MidiEvent::Meta(event) => event.bytes(),
      MidiEvent::Channel(event) => Ok(event.bytes()),
      MidiEvent::Node(event) => event.bytes(),
    }
  }

  pub fn time(&self) -> BarBeatTime {
    match self {
      MidiEvent::Meta(event) => event.time,
      MidiEvent::Channel(event) => event.time,
      MidiEvent::Node(event) => event.time,
    }
  }

  pub fn ticks(&self) -> TicksTime {
    self.time().ticks()
  }

  pub fn delta(&self) -> Option<TicksTime> {
    match self {
      MidiEvent::Meta(event) => event.delta,
      MidiEvent::Channel(event) => event.delta,
      MidiEvent::Node(event) => event.delta,
    }
  }

  /// Rebuilds the event with another time, keeping the variant
  pub fn with_time(self, time: BarBeatTime) -> MidiEvent {
    match self {
      MidiEvent::Meta(event) => MidiEvent::Meta(MetaEvent { time, ..event }),
      MidiEvent::Channel(event) => MidiEvent::Channel(ChannelEvent { time, ..event }),
      MidiEvent::Node(event) => MidiEvent::Node(NodeEvent { time, ..event }),
    }
  }

  pub fn with_delta(self, delta: Option<TicksTime>) -> MidiEvent {
    match self {
      MidiEvent::Meta(event) => MidiEvent::Meta(MetaEvent { delta, ..event }),
      MidiEvent::Channel(event) => MidiEvent::Channel(ChannelEvent { delta, ..event }),
      MidiEvent::Node(event) => MidiEvent::Node(NodeEvent { delta, ..event }),
    }
  }

  pub fn set_time(&mut self, time: BarBeatTime) {
    let event = std::mem::replace(self, MidiEvent::Meta(MetaEvent::end_of_track(time)));
    *self = event.with_time(time);
  }

  pub fn as_meta(&self) -> Option<&MetaEvent> {
    match self {
      MidiEvent::Meta(event) => Some(event),
      _ => None,
    }
  }

  pub fn as_channel(&self) -> Option<&ChannelEvent> {
    match self {
      MidiEvent::Channel(event) => Some(event),
      _ => None,
    }
  }

  pub fn as_node(&self) -> Option<&NodeEvent> {
    match self {
      MidiEvent::Node(event) => Some(event),
      _ => None,
    }
  }

  pub fn is_tempo(&self) -> bool {
    match self {
      MidiEvent::Meta(MetaEvent {
        data: MetaData::Tempo(_),
        ..
      }) => true,
      _ => false,
    }
  }

  pub fn is_time_signature(&self) -> bool {
    match self {
      MidiEvent::Meta(MetaEvent {
        data: MetaData::TimeSignature { .. },
        ..
      }) => true,
      _ => false,
    }
  }

  pub fn is_end_of_track(&self) -> bool {
    match self {
      MidiEvent::Meta(MetaEvent {
        data: MetaData::EndOfTrack,
        ..
      }) => true,
      _ => false,
    }
  }
}

impl From<MetaEvent> for MidiEvent {
  fn from(event: MetaEvent) -> Self {
    MidiEvent::Meta(event)
  }
}

impl From<ChannelEvent> for MidiEvent {
  fn from(event: ChannelEvent) -> Self {
    MidiEvent::Channel(event)
  }
}

impl From<NodeEvent> for MidiEvent {
  fn from(event: NodeEvent) -> Self {
    MidiEvent::Node(event)
  }
}

#[cfg(test)]
mod test {

  use uuid::Uuid;

  use super::*;
  use crate::time::{Signature, Tempo};

  fn events() -> Vec<MidiEvent> {
    let zero = BarBeatTime::zero();
    vec![
      MetaEvent::track_name("lead").into(),
      MetaEvent::tempo(zero, Tempo::new(90.0)).into(),
      MetaEvent::time_signature(zero, Signature::new(3, 4)).into(),
      MetaEvent::end_of_track(zero).into(),
      ChannelEvent::note_on(zero, 3, 61, 99).into(),
      ChannelEvent::program_change(zero, 3, 12).into(),
      NodeEvent::add(
        zero,
        Identifier::new(Uuid::new_v4()),
        Trajectory::new(1.0, 2.0, 3.0, 4.0),
        Generator::new(0, 60, 100, 240),
      )
      .into(),
      NodeEvent::remove(zero, Identifier::with_loop(Uuid::new_v4(), Uuid::new_v4())).into(),
    ]
  }

  #[test]
  pub fn parse_dispatches_on_leading_bytes() {
    for event in events() {
      let bytes = event.bytes().unwrap();
      let parsed = MidiEvent::parse(TicksTime::new(5), &bytes).unwrap();
      assert_eq!(parsed, event);
      assert_eq!(parsed.delta(), Some(TicksTime::new(5)));
    }
  }

  #[test]
  pub fn parse_empty_input() {
    assert!(matches!(
      MidiEvent::parse(TicksTime::zero(), &[]),
      Err(SequencerError::InvalidLength { .. })
    ));
  }

  #[test]
  pub fn set_time_keeps_variant() {
    let time = BarBeatTime::from_ticks(TicksTime::new(960), Signature::default(), 480);
    for mut event in events() {
      let before = event.clone();
      event.set_time(time);
      assert_eq!(event.time(), time);
      assert_eq!(event.bytes().unwrap(), before.bytes().unwrap());
      assert_eq!(
        std::mem::discriminant(&event),
        std::mem::discriminant(&before)
      );
    }
  }

  #[test]
  pub fn predicates() {
    let events = events();
    assert!(events[1].is_tempo());
    assert!(events[2].is_time_signature());
    assert!(events[3].is_end_of_track());
    assert!(!events[4].is_tempo());
    assert!(events[4].as_channel().is_some());
    assert!(events[6].as_node().is_some());
    assert!(events[0].as_meta().is_some());
  }
}
