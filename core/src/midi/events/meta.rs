//! Meta events: `FF type VLQ(len) data`.

use crate::error::{Result, SequencerError};
use crate::midi::vlq;
use crate::time::{BarBeatTime, Signature, Tempo, TicksTime};

pub const META_STATUS: u8 = 0xFF;

pub const TEXT: u8 = 0x01;
pub const COPYRIGHT: u8 = 0x02;
pub const SEQUENCE_TRACK_NAME: u8 = 0x03;
pub const INSTRUMENT_NAME: u8 = 0x04;
pub const MARKER: u8 = 0x06;
pub const PROGRAM_NAME: u8 = 0x08;
pub const DEVICE_NAME: u8 = 0x09;
pub const END_OF_TRACK: u8 = 0x2F;
pub const SET_TEMPO: u8 = 0x51;
pub const TIME_SIGNATURE: u8 = 0x58;

const TEMPO_LENGTH: usize = 3;
const TIME_SIGNATURE_LENGTH: usize = 4;

pub const DEFAULT_CLOCKS_PER_CLICK: u8 = 24;
pub const DEFAULT_NOTATED_32NDS_PER_QUARTER: u8 = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum MetaData {
  Text(String),
  Copyright(String),
  SequenceTrackName(String),
  InstrumentName(String),
  Marker(String),
  DeviceName(String),
  ProgramName(String),
  EndOfTrack,
  Tempo(Tempo),
  TimeSignature {
    signature: Signature,
    clocks: u8,
    notes: u8,
  },
}

impl MetaData {
  pub fn type_byte(&self) -> u8 {
    match self {
      MetaData::Text(_) => TEXT,
      MetaData::Copyright(_) => COPYRIGHT,
      MetaData::SequenceTrackName(_) => SEQUENCE_TRACK_NAME,
      MetaData::InstrumentName(_) => INSTRUMENT_NAME,
      MetaData::Marker(_) => MARKER,
      MetaData::DeviceName(_) => DEVICE_NAME,
      MetaData::ProgramName(_) => PROGRAM_NAME,
      MetaData::EndOfTrack => END_OF_TRACK,
      MetaData::Tempo(_) => SET_TEMPO,
      MetaData::TimeSignature { .. } => TIME_SIGNATURE,
    }
  }

  pub fn payload(&self) -> Vec<u8> {
    match self {
      MetaData::Text(text)
      | MetaData::Copyright(text)
      | MetaData::SequenceTrackName(text)
      | MetaData::InstrumentName(text)
      | MetaData::Marker(text)
      | MetaData::DeviceName(text)
      | MetaData::ProgramName(text) => text.as_bytes().to_vec(),
      MetaData::EndOfTrack => Vec::new(),
      MetaData::Tempo(tempo) => tempo.micros_per_quarter().to_be_bytes()[1..].to_vec(),
      MetaData::TimeSignature {
        signature,
        clocks,
        notes,
      } => vec![
        signature.beats_per_bar(),
        signature.beat_unit_exponent(),
        *clocks,
        *notes,
      ],
    }
  }

  pub fn parse(type_byte: u8, payload: &[u8]) -> Result<MetaData> {
    let text = || String::from_utf8_lossy(payload).into_owned();
    match type_byte {
      TEXT => Ok(MetaData::Text(text())),
      COPYRIGHT => Ok(MetaData::Copyright(text())),
      SEQUENCE_TRACK_NAME => Ok(MetaData::SequenceTrackName(text())),
      INSTRUMENT_NAME => Ok(MetaData::InstrumentName(text())),
      MARKER => Ok(MetaData::Marker(text())),
      DEVICE_NAME => Ok(MetaData::DeviceName(text())),
      PROGRAM_NAME => Ok(MetaData::ProgramName(text())),
      END_OF_TRACK => {
        expect_length(0, payload)?;
        Ok(MetaData::EndOfTrack)
      }
      SET_TEMPO => {
        expect_length(TEMPO_LENGTH, payload)?;
        let micros =
          u32::from(payload[0]) << 16 | u32::from(payload[1]) << 8 | u32::from(payload[2]);
        Ok(MetaData::Tempo(Tempo::from_micros_per_quarter(micros)))
      }
      TIME_SIGNATURE => {
        expect_length(TIME_SIGNATURE_LENGTH, payload)?;
        if payload[0] == 0 {
          return Err(SequencerError::unsupported(
            "time signature with zero beats per bar",
          ));
        }
        let signature = Signature::from_exponent(payload[0], payload[1]).ok_or_else(|| {
          SequencerError::unsupported(format!("time signature exponent {}", payload[1]))
        })?;
        Ok(MetaData::TimeSignature {
          signature,
          clocks: payload[2],
          notes: payload[3],
        })
      }
      other => Err(SequencerError::unsupported(format!(
        "meta event type 0x{:02X}",
        other
      ))),
    }
  }
}

fn expect_length(expected: usize, payload: &[u8]) -> Result<()> {
  if payload.len() != expected {
    Err(SequencerError::InvalidLength {
      expected,
      actual: payload.len(),
    })
  } else {
    Ok(())
  }
}

/// Splits a raw meta event into its type and payload, checking the declared length
pub(crate) fn split_meta(bytes: &[u8]) -> Result<(u8, &[u8])> {
  match bytes.first() {
    Some(&META_STATUS) => {}
    Some(other) => {
      return Err(SequencerError::unsupported(format!(
        "expected a meta event but found status 0x{:02X}",
        other
      )))
    }
    None => {
      return Err(SequencerError::InvalidLength {
        expected: 3,
        actual: 0,
      })
    }
  }
  let type_byte = *bytes.get(1).ok_or(SequencerError::InvalidLength {
    expected: 3,
    actual: bytes.len(),
  })?;
  let (declared, consumed) = vlq::decode(&bytes[2..])?;
  let payload = &bytes[2 + consumed..];
  if declared as usize != payload.len() {
    return Err(SequencerError::InvalidLength {
      expected: declared as usize,
      actual: payload.len(),
    });
  }
  Ok((type_byte, payload))
}

pub(crate) fn meta_bytes(type_byte: u8, payload: &[u8]) -> Result<Vec<u8>> {
  let mut bytes = Vec::with_capacity(payload.len() + 6);
  bytes.push(META_STATUS);
  bytes.push(type_byte);
  vlq::encode_into(payload.len() as u32, &mut bytes)?;
  bytes.extend_from_slice(payload);
  Ok(bytes)
}

#[derive(Debug, Clone)]
pub struct MetaEvent {
  pub time: BarBeatTime,
  pub delta: Option<TicksTime>,
  pub data: MetaData,
}

impl MetaEvent {
  pub fn new(time: BarBeatTime, data: MetaData) -> MetaEvent {
    MetaEvent {
      time,
      delta: None,
      data,
    }
  }

  pub fn track_name<T: Into<String>>(name: T) -> MetaEvent {
    MetaEvent::new(BarBeatTime::zero(), MetaData::SequenceTrackName(name.into()))
  }

  pub fn end_of_track(time: BarBeatTime) -> MetaEvent {
    MetaEvent::new(time, MetaData::EndOfTrack)
  }

  pub fn tempo(time: BarBeatTime, tempo: Tempo) -> MetaEvent {
    MetaEvent::new(time, MetaData::Tempo(tempo))
  }

  pub fn time_signature(time: BarBeatTime, signature: Signature) -> MetaEvent {
    MetaEvent::new(
      time,
      MetaData::TimeSignature {
        signature,
        clocks: DEFAULT_CLOCKS_PER_CLICK,
        notes: DEFAULT_NOTATED_32NDS_PER_QUARTER,
      },
    )
  }

  pub fn marker<T: Into<String>>(time: BarBeatTime, text: T) -> MetaEvent {
    MetaEvent::new(time, MetaData::Marker(text.into()))
  }

  pub fn parse(delta: TicksTime, bytes: &[u8]) -> Result<MetaEvent> {
    let (type_byte, payload) = split_meta(bytes)?;
    let data = MetaData::parse(type_byte, payload)?;
    Ok(MetaEvent {
      time: BarBeatTime::zero(),
      delta: Some(delta),
      data,
    })
  }

  pub fn bytes(&self) -> Result<Vec<u8>> {
    meta_bytes(self.data.type_byte(), &self.data.payload())
  }
}

impl PartialEq for MetaEvent {
  fn eq(&self, other: &MetaEvent) -> bool {
    self.time == other.time && self.data == other.data
  }
}
