pub mod clock;

pub use self::clock::{ClockSource, ManualClock, ThreadClock, TickCallback};

use std::collections::BTreeMap;

use log::{debug, info};
use uuid::Uuid;

use crate::error::{Result, SequencerError};
use crate::time::{BarBeatTime, Signature, Tempo, TicksTime};

/// Where the transport goes back to when jogging ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
  Stopped,
  Playing,
  Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
  Stopped,
  Playing,
  Paused,
  Jogging { resume: Resume },
}

impl From<Resume> for TransportState {
  fn from(resume: Resume) -> Self {
    match resume {
      Resume::Stopped => TransportState::Stopped,
      Resume::Playing => TransportState::Playing,
      Resume::Paused => TransportState::Paused,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
  State(TransportState),
  Recording(bool),
  Tempo(Tempo),
  Signature(Signature),
  Position(TicksTime),
}

pub type Listener = Box<dyn FnMut(&TransportEvent) + Send>;

/// A due registration: the time it was registered at and its target
pub type Registration = (TicksTime, Uuid);

/// Play/pause/stop/jog control over the session position.
///
/// Targets register the times at which they want to be dispatched. `cursor` is the
/// first time that has not been dispatched yet, so moving forward dispatches every
/// registration in `[cursor, target]` whether the move comes from the clock or a jog.
pub struct Transport {
  state: TransportState,
  recording: bool,

  tempo: Tempo,
  signature: Signature,
  division: u16,

  position: TicksTime,
  cursor: TicksTime,

  registrations: BTreeMap<TicksTime, Vec<Uuid>>,
  listeners: Vec<Listener>,
}

impl Transport {
  pub fn new(tempo: Tempo, signature: Signature, division: u16) -> Transport {
    Transport {
      state: TransportState::Stopped,
      recording: false,
      tempo,
      signature,
      division: division.max(1),
      position: TicksTime::zero(),
      cursor: TicksTime::zero(),
      registrations: BTreeMap::new(),
      listeners: Vec::new(),
    }
  }

  pub fn state(&self) -> TransportState {
    self.state
  }

  pub fn is_playing(&self) -> bool {
    self.state == TransportState::Playing
  }

  pub fn is_jogging(&self) -> bool {
    matches!(self.state, TransportState::Jogging { .. })
  }

  pub fn is_recording(&self) -> bool {
    self.recording
  }

  pub fn tempo(&self) -> Tempo {
    self.tempo
  }

  pub fn set_tempo(&mut self, tempo: Tempo) {
    if self.tempo != tempo {
      debug!("Tempo changed to {:.3} bpm", tempo.bpm());
      self.tempo = tempo;
      self.notify(TransportEvent::Tempo(tempo));
    }
  }

  pub fn signature(&self) -> Signature {
    self.signature
  }

  pub fn set_signature(&mut self, signature: Signature) {
    if self.signature != signature {
      debug!("Time signature changed to {}", signature);
      self.signature = signature;
      self.notify(TransportEvent::Signature(signature));
    }
  }

  pub fn division(&self) -> u16 {
    self.division
  }

  pub fn position(&self) -> TicksTime {
    self.position
  }

  pub fn time(&self) -> BarBeatTime {
    self.time_at(self.position)
  }

  pub fn time_at(&self, ticks: TicksTime) -> BarBeatTime {
    BarBeatTime::from_ticks(ticks, self.signature, u64::from(self.division))
  }

  pub fn cursor(&self) -> TicksTime {
    self.cursor
  }

  pub fn add_listener(&mut self, listener: Listener) {
    self.listeners.push(listener);
  }

  fn notify(&mut self, event: TransportEvent) {
    for listener in self.listeners.iter_mut() {
      listener(&event);
    }
  }

  fn set_state(&mut self, state: TransportState) {
    if self.state != state {
      info!("Transport {:?} -> {:?}", self.state, state);
      self.state = state;
      self.notify(TransportEvent::State(state));
    }
  }

  pub fn register(&mut self, time: TicksTime, target: Uuid) {
    let targets = self.registrations.entry(time).or_insert_with(Vec::new);
    if !targets.contains(&target) {
      targets.push(target);
    }
  }

  pub fn unregister(&mut self, target: Uuid) {
    for targets in self.registrations.values_mut() {
      targets.retain(|registered| *registered != target);
    }
    self.registrations.retain(|_time, targets| !targets.is_empty());
  }

  pub fn clear_registrations(&mut self) {
    self.registrations.clear();
  }

  pub fn registrations_at(&self, time: TicksTime) -> &[Uuid] {
    self
      .registrations
      .get(&time)
      .map(|targets| targets.as_slice())
      .unwrap_or(&[])
  }

  pub fn registration_count(&self) -> usize {
    self.registrations.values().map(Vec::len).sum()
  }

  pub fn play(&mut self) -> Result<()> {
    match self.state {
      TransportState::Jogging { .. } => Err(SequencerError::not_permitted(
        "cannot play while jogging",
      )),
      _ => {
        self.set_state(TransportState::Playing);
        Ok(())
      }
    }
  }

  pub fn pause(&mut self) -> Result<()> {
    match self.state {
      TransportState::Playing | TransportState::Paused => {
        self.set_state(TransportState::Paused);
        Ok(())
      }
      state => Err(SequencerError::not_permitted(format!(
        "cannot pause while {:?}",
        state
      ))),
    }
  }

  /// Stops, turns recording off and rewinds to the beginning
  pub fn stop(&mut self) -> Result<()> {
    if self.is_jogging() {
      return Err(SequencerError::not_permitted("cannot stop while jogging"));
    }
    self.set_state(TransportState::Stopped);
    self.set_recording(false);
    self.rewind();
    Ok(())
  }

  /// Rewinds to the beginning keeping the current state
  pub fn reset(&mut self) -> Result<()> {
    if self.is_jogging() {
      return Err(SequencerError::not_permitted("cannot reset while jogging"));
    }
    self.rewind();
    Ok(())
  }

  fn rewind(&mut self) {
    self.position = TicksTime::zero();
    self.cursor = TicksTime::zero();
    self.notify(TransportEvent::Position(self.position));
  }

  pub fn toggle_recording(&mut self) -> bool {
    let recording = !self.recording;
    self.set_recording(recording);
    recording
  }

  pub fn set_recording(&mut self, recording: bool) {
    if self.recording != recording {
      info!("Recording {}", if recording { "on" } else { "off" });
      self.recording = recording;
      self.notify(TransportEvent::Recording(recording));
    }
  }

  pub fn begin_jog(&mut self) -> Result<()> {
    let resume = match self.state {
      TransportState::Stopped => Resume::Stopped,
      TransportState::Playing => Resume::Playing,
      TransportState::Paused => Resume::Paused,
      TransportState::Jogging { .. } => {
        return Err(SequencerError::not_permitted("already jogging"));
      }
    };
    self.set_state(TransportState::Jogging { resume });
    Ok(())
  }

  /// Moves to `target`. Forward moves return the registrations that were skipped over,
  /// backward moves return nothing and leave `target` pending.
  pub fn jog(&mut self, target: TicksTime) -> Result<Vec<Registration>> {
    if !self.is_jogging() {
      return Err(SequencerError::not_permitted("jog requires begin_jog"));
    }
    let due = self.seek(target);
    self.notify(TransportEvent::Position(self.position));
    Ok(due)
  }

  pub fn end_jog(&mut self) -> Result<()> {
    match self.state {
      TransportState::Jogging { resume } => {
        self.set_state(resume.into());
        Ok(())
      }
      _ => Err(SequencerError::not_permitted("not jogging")),
    }
  }

  /// Advances the position by `elapsed` ticks while playing
  pub fn advance(&mut self, elapsed: TicksTime) -> Vec<Registration> {
    if !self.is_playing() {
      return Vec::new();
    }
    let target = self.position + elapsed;
    self.advance_to(target)
  }

  fn seek(&mut self, target: TicksTime) -> Vec<Registration> {
    if target < self.position {
      debug!("Jog back {} -> {}", self.position, target);
      self.position = target;
      self.cursor = target;
      Vec::new()
    } else {
      self.advance_to(target)
    }
  }

  fn advance_to(&mut self, target: TicksTime) -> Vec<Registration> {
    self.position = target;
    if target < self.cursor {
      return Vec::new();
    }
    let due = self
      .registrations
      .range(self.cursor..=target)
      .flat_map(|(time, targets)| targets.iter().map(move |target| (*time, *target)))
      .collect();
    self.cursor = target + TicksTime::new(1);
    due
  }
}
