use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Result, SequencerError};
use crate::midi::decoder::Decoder;
use crate::midi::encoder::Encoder;
use crate::midi::events::{MetaData, MidiEvent};
use crate::time::{Signature, TicksTime};

pub const HEADER_TAG: &[u8; 4] = b"MThd";
pub const TRACK_TAG: &[u8; 4] = b"MTrk";
pub const HEADER_LENGTH: u32 = 6;
pub const HEADER_SIZE: usize = 14;
pub const CHUNK_PREFIX_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  SingleTrack,
  MultipleTrack,
  MultipleSong,
}

impl Format {
  pub fn value(self) -> u16 {
    match self {
      Format::SingleTrack => 0,
      Format::MultipleTrack => 1,
      Format::MultipleSong => 2,
    }
  }

  pub fn from_value(value: u16) -> Result<Format> {
    match value {
      0 => Ok(Format::SingleTrack),
      1 => Ok(Format::MultipleTrack),
      2 => Ok(Format::MultipleSong),
      other => Err(SequencerError::InvalidHeader {
        cause: format!("unknown format {}", other),
      }),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  pub format: Format,
  pub track_count: u16,
  /// Ticks per quarter note
  pub division: u16,
}

impl Header {
  fn parse(data: &[u8]) -> Result<Header> {
    if data.len() < HEADER_SIZE {
      return Err(SequencerError::unsound(format!(
        "{} bytes are not enough for a header",
        data.len()
      )));
    }
    if &data[0..4] != HEADER_TAG {
      return Err(SequencerError::InvalidHeader {
        cause: format!("unexpected tag {:?}", String::from_utf8_lossy(&data[0..4])),
      });
    }
    let length = read_u32(&data[4..8]);
    if length != HEADER_LENGTH {
      return Err(SequencerError::InvalidLength {
        expected: HEADER_LENGTH as usize,
        actual: length as usize,
      });
    }
    let format = Format::from_value(read_u16(&data[8..10]))?;
    let track_count = read_u16(&data[10..12]);
    let division = read_u16(&data[12..14]);
    if division & 0x8000 != 0 {
      return Err(SequencerError::InvalidHeader {
        cause: "SMPTE time division is not supported".to_string(),
      });
    }
    if division == 0 {
      return Err(SequencerError::InvalidHeader {
        cause: "division must be greater than zero".to_string(),
      });
    }
    Ok(Header {
      format,
      track_count,
      division,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackChunk {
  pub events: Vec<MidiEvent>,
}

impl TrackChunk {
  pub fn new(events: Vec<MidiEvent>) -> TrackChunk {
    TrackChunk { events }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MidiFile {
  pub header: Header,
  pub tracks: Vec<TrackChunk>,
}

fn read_u16(bytes: &[u8]) -> u16 {
  (u16::from(bytes[0]) << 8) | u16::from(bytes[1])
}

fn read_u32(bytes: &[u8]) -> u32 {
  bytes
    .iter()
    .take(4)
    .fold(0u32, |value, byte| (value << 8) | u32::from(*byte))
}

/// Time signature changes of the tempo track, which rule every track of a format 1 file
fn time_signatures(events: &[MidiEvent]) -> Vec<(TicksTime, Signature)> {
  events
    .iter()
    .filter_map(|event| match event.as_meta().map(|meta| &meta.data) {
      Some(MetaData::TimeSignature { signature, .. }) => Some((event.ticks(), *signature)),
      _ => None,
    })
    .collect()
}

impl MidiFile {
  pub fn new(format: Format, division: u16, tracks: Vec<TrackChunk>) -> MidiFile {
    MidiFile {
      header: Header {
        format,
        track_count: tracks.len() as u16,
        division,
      },
      tracks,
    }
  }

  pub fn from_bytes(data: &[u8]) -> Result<MidiFile> {
    let header = Header::parse(data)?;
    let mut pos = HEADER_SIZE;
    let mut tracks = Vec::with_capacity(header.track_count as usize);
    let mut signatures = Vec::new();

    for index in 0..header.track_count {
      if data.len() - pos < CHUNK_PREFIX_SIZE {
        return Err(SequencerError::unsound(format!(
          "track {} of {} is missing",
          index + 1,
          header.track_count
        )));
      }
      let tag = &data[pos..pos + 4];
      if tag != TRACK_TAG {
        return Err(SequencerError::InvalidHeader {
          cause: format!(
            "unexpected chunk tag {:?} for track {}",
            String::from_utf8_lossy(tag),
            index + 1
          ),
        });
      }
      let length = read_u32(&data[pos + 4..pos + 8]) as usize;
      let start = pos + CHUNK_PREFIX_SIZE;
      if data.len() - start < length {
        return Err(SequencerError::unsound(format!(
          "track {} declares {} bytes but only {} remain",
          index + 1,
          length,
          data.len() - start
        )));
      }
      let chunk = &data[start..start + length];
      let events = Decoder::with_signatures(chunk, header.division, &signatures)
        .collect::<Result<Vec<MidiEvent>>>()?;
      if index == 0 && header.format == Format::MultipleTrack {
        signatures = time_signatures(&events);
      }
      tracks.push(TrackChunk::new(events));
      pos = start + length;
    }

    debug!(
      "Parsed MIDI file: {:?}, {} tracks, division {}",
      header.format, header.track_count, header.division
    );

    Ok(MidiFile { header, tracks })
  }

  pub fn from_path<P: AsRef<Path>>(path: P) -> Result<MidiFile> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|err| SequencerError::ReadFailure {
      cause: format!("{}: {}", path.display(), err),
    })?;
    Self::from_bytes(&data)
  }

  pub fn bytes(&self) -> Result<Vec<u8>> {
    let header = Header {
      track_count: self.tracks.len() as u16,
      ..self.header
    };
    let mut out = Encoder::header(&header);
    for track in self.tracks.iter() {
      out.extend(Encoder::track(&track.events)?);
    }
    Ok(out)
  }

  pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let path = path.as_ref();
    let data = self.bytes()?;
    fs::write(path, data).map_err(|err| SequencerError::ReadFailure {
      cause: format!("{}: {}", path.display(), err),
    })?;
    debug!("Wrote {} tracks to {}", self.tracks.len(), path.display());
    Ok(())
  }
}
