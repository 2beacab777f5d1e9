use failure;
use failure::Error;

use serde;
use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

use crate::time::{Signature, Tempo, TicksTime};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SequencerConfig {
  /// Ticks per quarter note
  pub division: u16,
  pub tempo: f64,
  pub beats_per_bar: u8,
  pub beat_unit: u8,
}

impl Default for SequencerConfig {
  fn default() -> SequencerConfig {
    SequencerConfig {
      division: crate::time::ticks::DEFAULT_TICKS_PER_BEAT,
      tempo: 120.0,
      beats_per_bar: 4,
      beat_unit: 4,
    }
  }
}

impl SequencerConfig {
  pub fn tempo(&self) -> Tempo {
    Tempo::new(self.tempo)
  }

  pub fn signature(&self) -> Signature {
    Signature::new(self.beats_per_bar, self.beat_unit)
  }

  pub fn division(&self) -> u16 {
    self.division.max(1)
  }

  pub fn ticks_per_bar(&self) -> TicksTime {
    TicksTime::new(u64::from(self.division()) * u64::from(self.beats_per_bar.max(1)))
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Playback {
  /// Where to write the session back as a MIDI file
  pub output: Option<String>,
  /// Bars to play when the session has no events
  pub bars: u32,
}

impl Default for Playback {
  fn default() -> Playback {
    Playback {
      output: None,
      bars: 4,
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  pub sequencer: SequencerConfig,
  pub playback: Playback,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      sequencer: SequencerConfig::default(),
      playback: Playback::default(),
    }
  }
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
  }

  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}

#[cfg(test)]
mod test {

  use std::io::Write;

  use super::*;

  #[test]
  pub fn defaults() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.sequencer.division, 480);
    assert_eq!(config.sequencer.tempo(), Tempo::new(120.0));
    assert_eq!(config.sequencer.signature(), Signature::new(4, 4));
    assert_eq!(config.playback.bars, 4);
    assert_eq!(config.playback.output, None);
  }

  #[test]
  pub fn partial_sections() {
    let config = Config::from_str(
      r#"
      [sequencer]
      tempo = 90.0
      beats_per_bar = 3

      [playback]
      output = "out.mid"
      "#,
    )
    .unwrap();
    assert_eq!(config.sequencer.tempo, 90.0);
    assert_eq!(config.sequencer.signature(), Signature::new(3, 4));
    assert_eq!(config.sequencer.division, 480);
    assert_eq!(config.sequencer.ticks_per_bar(), TicksTime::new(1440));
    assert_eq!(config.playback.output, Some("out.mid".to_string()));
    assert_eq!(config.playback.bars, 4);
  }

  #[test]
  pub fn invalid_content() {
    assert!(Config::from_str("[sequencer]\ndivision = \"many\"").is_err());
  }

  #[test]
  pub fn from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[sequencer]\ndivision = 96").unwrap();
    let path = file.path().to_str().unwrap().to_string();
    let config = Config::from_file(path.as_str()).unwrap();
    assert_eq!(config.sequencer.division, 96);
  }

  #[test]
  pub fn missing_file() {
    assert!(Config::from_file("/nonexistent/sequencer.toml").is_err());
  }
}
