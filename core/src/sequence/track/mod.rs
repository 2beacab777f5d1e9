pub mod instrument;
pub mod tempo;

pub use self::instrument::{Instrument, InstrumentSettings, SoundFont};
pub use self::tempo::TempoSettings;

use std::collections::HashMap;

use log::{debug, error, trace};
use uuid::Uuid;

use crate::error::{Result, SequencerError};
use crate::midi::events::{ChannelEvent, MetaData, MetaEvent, MidiEvent, NodeData};
use crate::midi::file::TrackChunk;
use crate::sequence::container::EventContainer;
use crate::sequence::loops::Loop;
use crate::sequence::node::NodeManager;
use crate::time::{BarBeatTime, TicksTime};
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackKind {
  Instrument(InstrumentSettings),
  Tempo(TempoSettings),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
  Idle,
  Recording,
}

/// What a track needs to act on the session when one of its events is dispatched
pub struct DispatchContext<'a> {
  pub transport: &'a mut Transport,
  pub nodes: &'a mut dyn NodeManager,
}

#[derive(Debug, Clone)]
struct LoopCapture {
  identifier: Uuid,
  start: BarBeatTime,
  repetitions: i32,
  repeat_delay: TicksTime,
  events: EventContainer,
}

#[derive(Debug, Clone)]
pub struct Track {
  id: Uuid,
  name: String,
  kind: TrackKind,

  events: EventContainer,
  head: Vec<MidiEvent>,
  tail: MidiEvent,
  modified: bool,

  recording: RecordingState,
  capture: Option<LoopCapture>,
  loops: HashMap<Uuid, Loop>,
}

impl Track {
  pub fn new<T>(name: T, kind: TrackKind) -> Track
  where
    T: Into<String>,
  {
    Track {
      id: Uuid::new_v4(),
      name: name.into(),
      kind,
      events: EventContainer::new(),
      head: Vec::new(),
      tail: MetaEvent::end_of_track(BarBeatTime::zero()).into(),
      modified: false,
      recording: RecordingState::Idle,
      capture: None,
      loops: HashMap::new(),
    }
  }

  pub fn instrument<T: Into<String>>(name: T) -> Track {
    Track::new(name, TrackKind::Instrument(InstrumentSettings::default()))
  }

  pub fn tempo(settings: TempoSettings) -> Track {
    Track::new("Tempo", TrackKind::Tempo(settings))
  }

  /// Rebuilds a track from a decoded chunk
  pub fn from_chunk(chunk: &TrackChunk, kind: TrackKind) -> Track {
    let name = match kind {
      TrackKind::Tempo(_) => "Tempo",
      TrackKind::Instrument(_) => "",
    };
    let mut track = Track::new(name, kind);
    track.add(chunk.events.iter().cloned());
    track.modified = false;
    track
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn name(&self) -> &str {
    self.name.as_str()
  }

  pub fn set_name<T: Into<String>>(&mut self, name: T) {
    self.name = name.into();
    self.modified = true;
  }

  pub fn kind(&self) -> &TrackKind {
    &self.kind
  }

  pub fn is_tempo(&self) -> bool {
    matches!(self.kind, TrackKind::Tempo(_))
  }

  pub fn instrument_settings(&self) -> Option<&InstrumentSettings> {
    match &self.kind {
      TrackKind::Instrument(settings) => Some(settings),
      TrackKind::Tempo(_) => None,
    }
  }

  pub fn set_instrument(&mut self, instrument: &dyn Instrument) -> Result<()> {
    match &mut self.kind {
      TrackKind::Instrument(settings) => {
        *settings = InstrumentSettings::from_instrument(instrument);
        self.modified = true;
        Ok(())
      }
      TrackKind::Tempo(_) => Err(SequencerError::not_permitted(
        "the tempo track has no instrument",
      )),
    }
  }

  pub fn events(&self) -> &EventContainer {
    &self.events
  }

  pub fn head(&self) -> &[MidiEvent] {
    self.head.as_slice()
  }

  pub fn tail(&self) -> &MidiEvent {
    &self.tail
  }

  pub fn is_modified(&self) -> bool {
    self.modified
  }

  pub fn mark_saved(&mut self) {
    self.modified = false;
  }

  /// Stores the events, keeping instrument configuration and bookkeeping events aside
  pub fn add<I>(&mut self, events: I)
  where
    I: IntoIterator<Item = MidiEvent>,
  {
    for event in events {
      match &event {
        MidiEvent::Meta(MetaEvent {
          data: MetaData::SequenceTrackName(name),
          ..
        }) => {
          self.name = name.clone();
          continue;
        }
        MidiEvent::Meta(MetaEvent {
          data: MetaData::EndOfTrack,
          ..
        }) => continue,
        _ => {}
      }

      if let TrackKind::Instrument(settings) = &mut self.kind {
        if settings.absorb(&event) {
          continue;
        }
      }

      self.events.append(event.with_delta(None));
    }
    self.modified = true;
  }

  fn is_registered(&self, event: &MidiEvent) -> bool {
    match event {
      MidiEvent::Node(_) => true,
      _ => self.is_tempo() && tempo::is_registered(event),
    }
  }

  /// Times at which the transport has to dispatch this track for the given events
  pub fn registration_times<'a, I>(&self, events: I) -> Vec<TicksTime>
  where
    I: IntoIterator<Item = &'a MidiEvent>,
  {
    let mut times: Vec<TicksTime> = events
      .into_iter()
      .filter(|event| self.is_registered(event))
      .map(MidiEvent::ticks)
      .collect();
    times.sort();
    times.dedup();
    times
  }

  pub fn all_registration_times(&self) -> Vec<TicksTime> {
    self.registration_times(self.events.iter())
  }

  pub fn dispatch_events(&self, time: TicksTime, context: &mut DispatchContext) {
    for event in self.events.events_at(time).unwrap_or(&[]) {
      if let Err(err) = self.dispatch(event, context) {
        error!(
          "Failed to dispatch {:?} from track {} at {}: {}",
          event, self.name, time, err
        );
      }
    }
  }

  pub fn dispatch(&self, event: &MidiEvent, context: &mut DispatchContext) -> Result<()> {
    trace!("Dispatching {:?}", event);
    match event {
      MidiEvent::Node(node) => match &node.data {
        NodeData::Add {
          identifier,
          trajectory,
          generator,
        } => context.nodes.add_node(identifier, trajectory, generator),
        NodeData::Remove { identifier } => context.nodes.remove_node(identifier),
      },
      _ if self.is_tempo() => tempo::dispatch(event, context.transport),
      _ => Ok(()),
    }
  }

  /// Recomputes the synthesized head and tail events
  pub fn validate(&mut self) {
    let mut head: Vec<MidiEvent> = vec![MetaEvent::track_name(self.name.as_str()).into()];
    match &self.kind {
      TrackKind::Instrument(settings) => head.extend(settings.head()),
      TrackKind::Tempo(settings) => head.extend(settings.head(&self.events)),
    }
    let end = self.events.max_time().unwrap_or_else(BarBeatTime::zero);
    self.head = head;
    self.tail = MetaEvent::end_of_track(end).into();
  }

  pub fn chunk(&mut self) -> TrackChunk {
    self.validate();
    let mut events = Vec::with_capacity(self.head.len() + self.events.len() + 1);
    events.extend(self.head.iter().cloned());
    events.extend(self.events.iter().cloned());
    events.push(self.tail.clone());
    TrackChunk::new(events)
  }

  pub fn recording_state(&self) -> RecordingState {
    self.recording
  }

  pub fn is_recording(&self) -> bool {
    self.recording == RecordingState::Recording
  }

  pub fn set_recording(&mut self, recording: bool) {
    let state = if recording {
      RecordingState::Recording
    } else {
      RecordingState::Idle
    };
    if self.recording != state {
      debug!("Track {} recording state {:?}", self.name, state);
      self.recording = state;
    }
  }

  pub fn toggle_recording(&mut self) -> RecordingState {
    self.set_recording(!self.is_recording());
    self.recording
  }

  /// Stores a raw channel packet received at `time`. Returns whether it was kept.
  pub fn record(&mut self, packet: &[u8], time: BarBeatTime) -> Result<bool> {
    let event = ChannelEvent::parse(TicksTime::zero(), packet)?;
    if !self.is_recording() {
      return Ok(false);
    }
    let event = MidiEvent::Channel(event).with_delta(None);
    match self.capture.as_mut() {
      Some(capture) => {
        let relative = time - capture.start.ticks();
        capture.events.append(event.with_time(relative));
      }
      None => {
        self.events.append(event.with_time(time));
        self.modified = true;
      }
    }
    Ok(true)
  }

  pub fn is_capturing_loop(&self) -> bool {
    self.capture.is_some()
  }

  /// Routes recorded events into a new loop starting at `start`
  pub fn begin_loop(
    &mut self,
    start: BarBeatTime,
    repetitions: i32,
    repeat_delay: TicksTime,
  ) -> Result<Uuid> {
    if self.capture.is_some() {
      return Err(SequencerError::not_permitted("a loop is already being captured"));
    }
    let identifier = Uuid::new_v4();
    debug!("Track {} capturing loop {} from {}", self.name, identifier, start);
    self.capture = Some(LoopCapture {
      identifier,
      start,
      repetitions,
      repeat_delay,
      events: EventContainer::new(),
    });
    Ok(identifier)
  }

  pub fn end_loop(&mut self, end: BarBeatTime) -> Result<Loop> {
    let capture = self
      .capture
      .take()
      .ok_or_else(|| SequencerError::not_permitted("no loop is being captured"))?;
    if end < capture.start {
      let start = capture.start;
      self.capture = Some(capture);
      return Err(SequencerError::not_permitted(format!(
        "loop end {} is before its start {}",
        end, start
      )));
    }
    Ok(Loop::new(
      capture.identifier,
      capture.repetitions,
      capture.repeat_delay,
      capture.start,
      end,
      capture.events,
    ))
  }

  /// Merges the loop stream up to `bound` and keeps the loop. Returns the new registration times.
  pub fn add_loop(&mut self, lp: Loop, bound: TicksTime) -> Vec<TicksTime> {
    let merged: Vec<MidiEvent> = lp.bounded(bound).collect();
    debug!(
      "Track {} merging loop {} with {} events",
      self.name,
      lp.identifier(),
      merged.len()
    );
    let times = self.registration_times(merged.iter());
    self.events.append_all(merged);
    self.loops.insert(lp.identifier(), lp);
    self.modified = true;
    times
  }

  pub fn loops(&self) -> impl Iterator<Item = &Loop> {
    self.loops.values()
  }

  pub fn get_loop(&self, identifier: &Uuid) -> Option<&Loop> {
    self.loops.get(identifier)
  }
}
