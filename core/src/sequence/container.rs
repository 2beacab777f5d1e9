use std::collections::BTreeMap;
use std::iter::FromIterator;

use crate::midi::events::{ChannelEvent, MetaEvent, MidiEvent, NodeEvent};
use crate::time::{BarBeatTime, TicksTime};

type Bucket = Vec<MidiEvent>;

/// Events ordered by time. Events sharing a time keep their insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventContainer {
  events: BTreeMap<TicksTime, Bucket>,
}

impl EventContainer {
  pub fn new() -> EventContainer {
    EventContainer::default()
  }

  pub fn append(&mut self, event: MidiEvent) -> &mut Self {
    self
      .events
      .entry(event.ticks())
      .or_insert_with(Vec::new)
      .push(event);
    self
  }

  pub fn append_all<I>(&mut self, events: I) -> &mut Self
  where
    I: IntoIterator<Item = MidiEvent>,
  {
    events.into_iter().for_each(|event| {
      self.append(event);
    });
    self
  }

  pub fn events_at(&self, time: TicksTime) -> Option<&[MidiEvent]> {
    self.events.get(&time).map(|bucket| bucket.as_slice())
  }

  /// Events in `[start, end)`
  pub fn range<'a>(
    &'a self,
    start: TicksTime,
    end: TicksTime,
  ) -> impl Iterator<Item = &'a MidiEvent> + 'a {
    self
      .events
      .range(start..end.max(start))
      .flat_map(|(_ticks, bucket)| bucket.iter())
  }

  pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
    self.events.values().flat_map(|bucket| bucket.iter())
  }

  pub fn filter<P>(&self, predicate: P) -> Vec<&MidiEvent>
  where
    P: Fn(&MidiEvent) -> bool,
  {
    self.iter().filter(|event| predicate(event)).collect()
  }

  pub fn retain<P>(&mut self, mut predicate: P)
  where
    P: FnMut(&MidiEvent) -> bool,
  {
    for bucket in self.events.values_mut() {
      bucket.retain(|event| predicate(event));
    }
    self.events.retain(|_ticks, bucket| !bucket.is_empty());
  }

  pub fn meta_events(&self) -> Vec<&MetaEvent> {
    self.iter().filter_map(MidiEvent::as_meta).collect()
  }

  pub fn channel_events(&self) -> Vec<&ChannelEvent> {
    self.iter().filter_map(MidiEvent::as_channel).collect()
  }

  pub fn node_events(&self) -> Vec<&NodeEvent> {
    self.iter().filter_map(MidiEvent::as_node).collect()
  }

  pub fn tempo_events(&self) -> Vec<&MetaEvent> {
    self
      .iter()
      .filter(|event| event.is_tempo())
      .filter_map(MidiEvent::as_meta)
      .collect()
  }

  pub fn time_events(&self) -> Vec<&MetaEvent> {
    self
      .iter()
      .filter(|event| event.is_time_signature())
      .filter_map(MidiEvent::as_meta)
      .collect()
  }

  pub fn times(&self) -> impl Iterator<Item = TicksTime> + '_ {
    self.events.keys().cloned()
  }

  pub fn min_time(&self) -> Option<BarBeatTime> {
    self
      .events
      .values()
      .next()
      .and_then(|bucket| bucket.first())
      .map(MidiEvent::time)
  }

  pub fn max_time(&self) -> Option<BarBeatTime> {
    self
      .events
      .values()
      .next_back()
      .and_then(|bucket| bucket.first())
      .map(MidiEvent::time)
  }

  pub fn len(&self) -> usize {
    self.events.values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }

  pub fn clear(&mut self) {
    self.events.clear();
  }

  /// A copy with every event moved `offset` ticks later
  pub fn shifted(&self, offset: TicksTime) -> EventContainer {
    self
      .iter()
      .map(|event| {
        let time = event.time() + offset;
        event.clone().with_time(time)
      })
      .collect()
  }
}

impl Extend<MidiEvent> for EventContainer {
  fn extend<I: IntoIterator<Item = MidiEvent>>(&mut self, events: I) {
    self.append_all(events);
  }
}

impl FromIterator<MidiEvent> for EventContainer {
  fn from_iter<I: IntoIterator<Item = MidiEvent>>(events: I) -> Self {
    let mut container = EventContainer::new();
    container.append_all(events);
    container
  }
}
