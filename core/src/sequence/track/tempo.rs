use crate::error::Result;
use crate::midi::events::{MetaData, MetaEvent, MidiEvent};
use crate::sequence::container::EventContainer;
use crate::time::{BarBeatTime, Signature, Tempo, TicksTime};
use crate::transport::Transport;

/// Values the tempo track starts with when its events don't say otherwise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoSettings {
  pub tempo: Tempo,
  pub signature: Signature,
}

impl Default for TempoSettings {
  fn default() -> Self {
    TempoSettings {
      tempo: Tempo::default(),
      signature: Signature::default(),
    }
  }
}

impl TempoSettings {
  pub fn new(tempo: Tempo, signature: Signature) -> TempoSettings {
    TempoSettings { tempo, signature }
  }

  pub(super) fn head(&self, events: &EventContainer) -> Vec<MidiEvent> {
    let zero = BarBeatTime::zero();
    let at_zero = events.events_at(TicksTime::zero()).unwrap_or(&[]);
    let mut head = Vec::with_capacity(2);
    if !at_zero.iter().any(MidiEvent::is_tempo) {
      head.push(MetaEvent::tempo(zero, self.tempo).into());
    }
    if !at_zero.iter().any(MidiEvent::is_time_signature) {
      head.push(MetaEvent::time_signature(zero, self.signature).into());
    }
    head
  }
}

pub(super) fn is_registered(event: &MidiEvent) -> bool {
  event.is_tempo() || event.is_time_signature()
}

pub(super) fn dispatch(event: &MidiEvent, transport: &mut Transport) -> Result<()> {
  match event {
    MidiEvent::Meta(MetaEvent {
      data: MetaData::Tempo(tempo),
      ..
    }) => transport.set_tempo(*tempo),
    MidiEvent::Meta(MetaEvent {
      data: MetaData::TimeSignature { signature, .. },
      ..
    }) => transport.set_signature(*signature),
    _ => {}
  }
  Ok(())
}

#[cfg(test)]
mod test {

  use super::*;
  use crate::midi::events::ChannelEvent;

  #[test]
  pub fn head_fills_missing_defaults() {
    let settings = TempoSettings::new(Tempo::new(100.0), Signature::new(6, 8));
    let mut events = EventContainer::new();
    let head = settings.head(&events);
    assert_eq!(head.len(), 2);
    assert!(head[0].is_tempo());
    assert!(head[1].is_time_signature());

    events.append(MetaEvent::tempo(BarBeatTime::zero(), Tempo::new(90.0)).into());
    let head = settings.head(&events);
    assert_eq!(head.len(), 1);
    assert!(head[0].is_time_signature());
  }

  #[test]
  pub fn dispatch_applies_to_transport() {
    let mut transport = Transport::new(Tempo::default(), Signature::default(), 480);
    let zero = BarBeatTime::zero();
    dispatch(&MetaEvent::tempo(zero, Tempo::new(75.0)).into(), &mut transport).unwrap();
    let signature = MetaEvent::time_signature(zero, Signature::new(7, 8));
    dispatch(&signature.into(), &mut transport).unwrap();
    dispatch(&ChannelEvent::note_on(zero, 0, 1, 1).into(), &mut transport).unwrap();
    assert_eq!(transport.tempo(), Tempo::new(75.0));
    assert_eq!(transport.signature(), Signature::new(7, 8));
  }
}
