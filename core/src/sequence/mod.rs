pub mod container;
pub mod loops;
pub mod node;
pub mod track;
pub mod worker;

pub use self::container::EventContainer;
pub use self::loops::{Loop, LoopMarker};
pub use self::node::{NodeArena, NodeManager};
pub use self::track::{DispatchContext, Instrument, Track, TrackKind};
pub use self::worker::{Protocol, SequencerWorker};

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::SequencerConfig;
use crate::error::{Result, SequencerError};
use crate::midi::events::MidiEvent;
use crate::midi::file::{Format, MidiFile, TrackChunk};
use crate::time::{BarBeatTime, TicksTime};
use crate::transport::{Listener, Registration, Transport, TransportState};

use self::track::{InstrumentSettings, TempoSettings};

/// A sequencing session: the transport, the tempo track, the instrument tracks
/// and the node manager their node events go to.
pub struct Sequencer {
  division: u16,
  transport: Transport,
  tempo_track: Track,
  tracks: HashMap<Uuid, Track>,
  order: Vec<Uuid>,
  nodes: Box<dyn NodeManager + Send>,
  armed: Option<Uuid>,
}

impl Sequencer {
  pub fn new(config: &SequencerConfig, nodes: Box<dyn NodeManager + Send>) -> Sequencer {
    let tempo = config.tempo();
    let signature = config.signature();
    let division = config.division();
    Sequencer {
      division,
      transport: Transport::new(tempo, signature, division),
      tempo_track: Track::tempo(TempoSettings::new(tempo, signature)),
      tracks: HashMap::new(),
      order: Vec::new(),
      nodes,
      armed: None,
    }
  }

  /// Builds a session from a decoded file. The first track of a multi-track file
  /// is the tempo track, a single track file has its tempo events split out.
  pub fn from_file(
    file: &MidiFile,
    config: &SequencerConfig,
    nodes: Box<dyn NodeManager + Send>,
  ) -> Result<Sequencer> {
    let config = SequencerConfig {
      division: file.header.division,
      ..config.clone()
    };
    let mut sequencer = Sequencer::new(&config, nodes);
    let settings = TempoSettings::new(config.tempo(), config.signature());

    match (file.header.format, file.tracks.split_first()) {
      (_, None) => {}
      (Format::SingleTrack, Some((chunk, _))) => {
        let (tempo_events, events): (Vec<MidiEvent>, Vec<MidiEvent>) = chunk
          .events
          .iter()
          .cloned()
          .partition(|event| event.is_tempo() || event.is_time_signature());
        let tempo_chunk = TrackChunk::new(tempo_events);
        sequencer.tempo_track = Track::from_chunk(&tempo_chunk, TrackKind::Tempo(settings));
        sequencer.insert_track(Track::from_chunk(
          &TrackChunk::new(events),
          TrackKind::Instrument(InstrumentSettings::default()),
        ));
      }
      (_, Some((tempo_chunk, chunks))) => {
        sequencer.tempo_track = Track::from_chunk(tempo_chunk, TrackKind::Tempo(settings));
        for chunk in chunks {
          sequencer.insert_track(Track::from_chunk(
            chunk,
            TrackKind::Instrument(InstrumentSettings::default()),
          ));
        }
      }
    }

    sequencer.register_all();
    info!(
      "Loaded {} tracks, division {}",
      sequencer.order.len(),
      sequencer.division
    );
    Ok(sequencer)
  }

  pub fn load<P: AsRef<Path>>(
    path: P,
    config: &SequencerConfig,
    nodes: Box<dyn NodeManager + Send>,
  ) -> Result<Sequencer> {
    let file = MidiFile::from_path(path)?;
    Self::from_file(&file, config, nodes)
  }

  /// Serializes the tempo track followed by the instrument tracks
  pub fn to_file(&mut self) -> MidiFile {
    let mut chunks = Vec::with_capacity(self.order.len() + 1);
    chunks.push(self.tempo_track.chunk());
    for id in self.order.iter() {
      if let Some(track) = self.tracks.get_mut(id) {
        chunks.push(track.chunk());
      }
    }
    MidiFile::new(Format::MultipleTrack, self.division, chunks)
  }

  pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
    self.to_file().write_to(path)?;
    self.tempo_track.mark_saved();
    self.tracks.values_mut().for_each(Track::mark_saved);
    Ok(())
  }

  pub fn division(&self) -> u16 {
    self.division
  }

  pub fn transport(&self) -> &Transport {
    &self.transport
  }

  pub fn add_listener(&mut self, listener: Listener) {
    self.transport.add_listener(listener);
  }

  pub fn state(&self) -> TransportState {
    self.transport.state()
  }

  pub fn position(&self) -> BarBeatTime {
    self.transport.time()
  }

  pub fn tempo_track(&self) -> &Track {
    &self.tempo_track
  }

  pub fn track(&self, id: &Uuid) -> Option<&Track> {
    if *id == self.tempo_track.id() {
      Some(&self.tempo_track)
    } else {
      self.tracks.get(id)
    }
  }

  fn track_mut(&mut self, id: &Uuid) -> Result<&mut Track> {
    if *id == self.tempo_track.id() {
      Ok(&mut self.tempo_track)
    } else {
      self
        .tracks
        .get_mut(id)
        .ok_or(SequencerError::TrackNotFound { id: *id })
    }
  }

  /// Instrument tracks in creation order
  pub fn tracks(&self) -> impl Iterator<Item = &Track> {
    self.order.iter().filter_map(move |id| self.tracks.get(id))
  }

  pub fn armed(&self) -> Option<Uuid> {
    self.armed
  }

  fn insert_track(&mut self, track: Track) -> Uuid {
    let id = track.id();
    debug!("Adding track {} ({})", track.name(), id);
    self.order.push(id);
    self.tracks.insert(id, track);
    id
  }

  fn register_all(&mut self) {
    self.transport.clear_registrations();
    let mut registrations: Vec<(Uuid, Vec<TicksTime>)> =
      vec![(self.tempo_track.id(), self.tempo_track.all_registration_times())];
    for track in self.tracks.values() {
      registrations.push((track.id(), track.all_registration_times()));
    }
    for (id, times) in registrations {
      for time in times {
        self.transport.register(time, id);
      }
    }
  }

  pub fn add_instrument_track<T: Into<String>>(&mut self, name: T) -> Uuid {
    self.insert_track(Track::instrument(name))
  }

  pub fn set_instrument(&mut self, id: &Uuid, instrument: &dyn Instrument) -> Result<()> {
    self.track_mut(id)?.set_instrument(instrument)
  }

  pub fn remove_track(&mut self, id: &Uuid) -> Result<Track> {
    if *id == self.tempo_track.id() {
      return Err(SequencerError::not_permitted("the tempo track cannot be removed"));
    }
    let track = self
      .tracks
      .remove(id)
      .ok_or(SequencerError::TrackNotFound { id: *id })?;
    self.order.retain(|other| other != id);
    self.transport.unregister(*id);
    if self.armed == Some(*id) {
      self.armed = None;
    }
    Ok(track)
  }

  /// Adds events to a track and registers their dispatch times
  pub fn add_events(&mut self, id: &Uuid, events: Vec<MidiEvent>) -> Result<()> {
    let track = self.track_mut(id)?;
    let times = track.registration_times(&events);
    track.add(events);
    for time in times {
      self.transport.register(time, *id);
    }
    Ok(())
  }

  /// Latest event time over every track
  pub fn session_end(&self) -> TicksTime {
    std::iter::once(&self.tempo_track)
      .chain(self.tracks.values())
      .filter_map(|track| track.events().max_time())
      .map(|time| time.ticks())
      .max()
      .unwrap_or_else(TicksTime::zero)
  }

  /// Feeds ticks from the clock
  pub fn tick(&mut self, elapsed: TicksTime) {
    let due = self.transport.advance(elapsed);
    self.dispatch(due);
  }

  /// Dispatches every track registered at `time`
  pub fn dispatch_events(&mut self, time: TicksTime) {
    let due: Vec<Registration> = self
      .transport
      .registrations_at(time)
      .iter()
      .map(|id| (time, *id))
      .collect();
    self.dispatch(due);
  }

  fn dispatch(&mut self, due: Vec<Registration>) {
    let Sequencer {
      transport,
      tempo_track,
      tracks,
      nodes,
      ..
    } = self;

    for (time, id) in due {
      let track = if id == tempo_track.id() {
        Some(&*tempo_track)
      } else {
        tracks.get(&id)
      };
      match track {
        Some(track) => {
          let mut context = DispatchContext {
            transport: &mut *transport,
            nodes: &mut **nodes,
          };
          track.dispatch_events(time, &mut context);
        }
        None => warn!("Registration at {} for unknown track {}", time, id),
      }
    }
  }

  pub fn play(&mut self) -> Result<()> {
    self.transport.play()
  }

  pub fn pause(&mut self) -> Result<()> {
    self.transport.pause()
  }

  /// Stops, rewinds and drops every live node
  pub fn stop(&mut self) -> Result<()> {
    self.transport.stop()?;
    self.sync_recording();
    self.nodes.clear();
    Ok(())
  }

  pub fn reset(&mut self) -> Result<()> {
    self.transport.reset()?;
    self.nodes.clear();
    Ok(())
  }

  pub fn begin_jog(&mut self) -> Result<()> {
    self.transport.begin_jog()
  }

  pub fn jog(&mut self, target: TicksTime) -> Result<()> {
    let due = self.transport.jog(target)?;
    self.dispatch(due);
    Ok(())
  }

  /// Jogs to a bar/beat/subbeat position under the current signature.
  /// Fails with `InvalidBarBeatTime` when the position is not normalized.
  pub fn jog_to(&mut self, bar: u64, beat: u64, subbeat: u64) -> Result<()> {
    let target = BarBeatTime::new(
      bar,
      beat,
      subbeat,
      self.transport.signature(),
      u64::from(self.division()),
    )?;
    self.jog(target.ticks())
  }

  pub fn end_jog(&mut self) -> Result<()> {
    self.transport.end_jog()
  }

  pub fn toggle_recording(&mut self) -> bool {
    let recording = self.transport.toggle_recording();
    self.sync_recording();
    recording
  }

  fn sync_recording(&mut self) {
    let recording = self.transport.is_recording();
    if let Some(id) = self.armed {
      if let Some(track) = self.tracks.get_mut(&id) {
        track.set_recording(recording);
      }
    }
  }

  /// Makes `id` the track that receives recorded packets
  pub fn arm(&mut self, id: &Uuid) -> Result<()> {
    if !self.tracks.contains_key(id) {
      return Err(SequencerError::TrackNotFound { id: *id });
    }
    if let Some(previous) = self.armed {
      if let Some(track) = self.tracks.get_mut(&previous) {
        track.set_recording(false);
      }
    }
    self.armed = Some(*id);
    self.sync_recording();
    Ok(())
  }

  fn armed_track_mut(&mut self) -> Result<&mut Track> {
    let id = self
      .armed
      .ok_or_else(|| SequencerError::not_permitted("no track is armed"))?;
    self
      .tracks
      .get_mut(&id)
      .ok_or(SequencerError::TrackNotFound { id })
  }

  /// Records a raw MIDI packet that arrived on the input of `track`. Only the armed
  /// track keeps what it receives.
  pub fn receive_packet(&mut self, track: &Uuid, packet: &[u8]) -> Result<bool> {
    if !self.tracks.contains_key(track) {
      return Err(SequencerError::TrackNotFound { id: *track });
    }
    if self.armed != Some(*track) {
      return Ok(false);
    }
    let time = self.transport.time();
    self.armed_track_mut()?.record(packet, time)
  }

  pub fn begin_loop(&mut self, repetitions: i32, repeat_delay: TicksTime) -> Result<Uuid> {
    let start = self.transport.time();
    self.armed_track_mut()?.begin_loop(start, repetitions, repeat_delay)
  }

  /// Ends the loop capture and merges the loop into the armed track up to the session end
  pub fn end_loop(&mut self) -> Result<Uuid> {
    let end = self.transport.time();
    let session_end = self.session_end();
    let track = self.armed_track_mut()?;
    let lp = track.end_loop(end)?;
    let identifier = lp.identifier();
    let bound = session_end.max(lp.end().ticks());
    let times = track.add_loop(lp, bound);
    let id = track.id();
    for time in times {
      self.transport.register(time, id);
    }
    Ok(identifier)
  }
}
