use std::path::{Path, PathBuf};

use crate::midi::events::{ChannelEvent, ChannelKind, MetaData, MetaEvent, MidiEvent};
use crate::midi::types::{U4, U7};
use crate::time::BarBeatTime;

/// Sound source an instrument track plays through
pub trait Instrument {
  fn channel(&self) -> U4;
  fn program(&self) -> U7;
  fn sound_font(&self) -> &Path;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundFont {
  path: PathBuf,
  channel: U4,
  program: U7,
}

impl SoundFont {
  pub fn new<P: Into<PathBuf>>(path: P, channel: U4, program: U7) -> SoundFont {
    SoundFont {
      path: path.into(),
      channel: channel & 0x0f,
      program: program & 0x7f,
    }
  }
}

impl Instrument for SoundFont {
  fn channel(&self) -> U4 {
    self.channel
  }

  fn program(&self) -> U7 {
    self.program
  }

  fn sound_font(&self) -> &Path {
    &self.path
  }
}

/// Instrument configuration kept aside from the track events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentSettings {
  pub name: Option<String>,
  pub channel: U4,
  pub program: Option<U7>,
}

impl InstrumentSettings {
  pub fn from_instrument(instrument: &dyn Instrument) -> InstrumentSettings {
    let name = instrument
      .sound_font()
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned());
    InstrumentSettings {
      name,
      channel: instrument.channel(),
      program: Some(instrument.program()),
    }
  }

  /// Takes the event when it configures the instrument
  pub(super) fn absorb(&mut self, event: &MidiEvent) -> bool {
    match event {
      MidiEvent::Meta(MetaEvent {
        data: MetaData::InstrumentName(name),
        ..
      }) => {
        self.name = Some(name.clone());
        true
      }
      MidiEvent::Channel(channel) if channel.kind() == ChannelKind::ProgramChange => {
        self.channel = channel.channel();
        self.program = Some(channel.data1);
        true
      }
      _ => false,
    }
  }

  pub(super) fn head(&self) -> Vec<MidiEvent> {
    let zero = BarBeatTime::zero();
    let mut head = Vec::with_capacity(2);
    if let Some(name) = self.name.as_ref() {
      head.push(MetaEvent::new(zero, MetaData::InstrumentName(name.clone())).into());
    }
    if let Some(program) = self.program {
      head.push(ChannelEvent::program_change(zero, self.channel, program).into());
    }
    head
  }
}

#[cfg(test)]
mod test {

  use super::*;

  #[test]
  pub fn settings_from_instrument() {
    let font = SoundFont::new("/fonts/Grand Piano.sf2", 2, 5);
    let settings = InstrumentSettings::from_instrument(&font);
    assert_eq!(settings.name, Some("Grand Piano".to_string()));
    assert_eq!(settings.channel, 2);
    assert_eq!(settings.program, Some(5));
  }

  #[test]
  pub fn absorb_configuration_events() {
    let mut settings = InstrumentSettings::default();
    let zero = BarBeatTime::zero();
    let name = MetaEvent::new(zero, MetaData::InstrumentName("organ".into()));
    assert!(settings.absorb(&name.into()));
    assert!(settings.absorb(&ChannelEvent::program_change(zero, 9, 19).into()));
    assert!(!settings.absorb(&ChannelEvent::note_on(zero, 9, 60, 100).into()));
    assert!(!settings.absorb(&MetaEvent::track_name("organ").into()));
    assert_eq!(settings.name, Some("organ".to_string()));
    assert_eq!(settings.channel, 9);
    assert_eq!(settings.program, Some(19));
  }

  #[test]
  pub fn head_events() {
    assert!(InstrumentSettings::default().head().is_empty());
    let settings = InstrumentSettings::from_instrument(&SoundFont::new("strings.sf2", 1, 48));
    let head = settings.head();
    assert_eq!(head.len(), 2);
    assert_eq!(head[1].bytes().unwrap(), vec![0xC1, 48]);
  }
}
