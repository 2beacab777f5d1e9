//! Channel voice events: `[kind << 4 | channel, data1, data2?]`.

use std::convert::TryFrom;

use crate::error::{Result, SequencerError};
use crate::midi::types::{U14, U4, U7};
use crate::time::{BarBeatTime, TicksTime};

#[inline]
fn u4(d: U4) -> u8 {
  d & 0x0f
}

#[inline]
fn u7(d: U7) -> u8 {
  d & 0x7f
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
  NoteOff,
  NoteOn,
  PolyphonicKeyPressure,
  ControlChange,
  ProgramChange,
  ChannelPressure,
  PitchBendChange,
}

impl ChannelKind {
  pub fn nibble(self) -> u8 {
    match self {
      ChannelKind::NoteOff => 0b1000,
      ChannelKind::NoteOn => 0b1001,
      ChannelKind::PolyphonicKeyPressure => 0b1010,
      ChannelKind::ControlChange => 0b1011,
      ChannelKind::ProgramChange => 0b1100,
      ChannelKind::ChannelPressure => 0b1101,
      ChannelKind::PitchBendChange => 0b1110,
    }
  }

  /// Size of the whole message including the status byte
  pub fn byte_count(self) -> usize {
    match self {
      ChannelKind::ProgramChange | ChannelKind::ChannelPressure => 2,
      _ => 3,
    }
  }
}

impl TryFrom<u8> for ChannelKind {
  type Error = SequencerError;

  fn try_from(nibble: u8) -> Result<ChannelKind> {
    match nibble {
      0b1000 => Ok(ChannelKind::NoteOff),
      0b1001 => Ok(ChannelKind::NoteOn),
      0b1010 => Ok(ChannelKind::PolyphonicKeyPressure),
      0b1011 => Ok(ChannelKind::ControlChange),
      0b1100 => Ok(ChannelKind::ProgramChange),
      0b1101 => Ok(ChannelKind::ChannelPressure),
      0b1110 => Ok(ChannelKind::PitchBendChange),
      other => Err(SequencerError::unsupported(format!(
        "channel event kind 0x{:X}",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
  pub kind: ChannelKind,
  pub channel: U4,
}

impl Status {
  pub fn new(kind: ChannelKind, channel: U4) -> Status {
    Status {
      kind,
      channel: u4(channel),
    }
  }

  pub fn from_byte(byte: u8) -> Result<Status> {
    let kind = ChannelKind::try_from(byte >> 4)?;
    Ok(Status::new(kind, byte & 0x0f))
  }

  pub fn byte(&self) -> u8 {
    (self.kind.nibble() << 4) | u4(self.channel)
  }
}

#[derive(Debug, Clone)]
pub struct ChannelEvent {
  pub time: BarBeatTime,
  pub delta: Option<TicksTime>,
  pub status: Status,
  pub data1: U7,
  pub data2: Option<U7>,
}

impl ChannelEvent {
  /// `data2` must be present exactly when the kind uses three bytes
  pub fn new(
    time: BarBeatTime,
    status: Status,
    data1: U7,
    data2: Option<U7>,
  ) -> Result<ChannelEvent> {
    let actual = 2 + data2.map_or(0, |_| 1);
    let expected = status.kind.byte_count();
    if actual != expected {
      return Err(SequencerError::InvalidLength { expected, actual });
    }
    Ok(ChannelEvent {
      time,
      delta: None,
      status,
      data1: u7(data1),
      data2: data2.map(u7),
    })
  }

  fn two_data(time: BarBeatTime, kind: ChannelKind, channel: U4, data1: U7, data2: U7) -> Self {
    ChannelEvent {
      time,
      delta: None,
      status: Status::new(kind, channel),
      data1: u7(data1),
      data2: Some(u7(data2)),
    }
  }

  fn one_data(time: BarBeatTime, kind: ChannelKind, channel: U4, data1: U7) -> Self {
    ChannelEvent {
      time,
      delta: None,
      status: Status::new(kind, channel),
      data1: u7(data1),
      data2: None,
    }
  }

  pub fn note_on(time: BarBeatTime, channel: U4, key: U7, velocity: U7) -> ChannelEvent {
    Self::two_data(time, ChannelKind::NoteOn, channel, key, velocity)
  }

  pub fn note_off(time: BarBeatTime, channel: U4, key: U7, velocity: U7) -> ChannelEvent {
    Self::two_data(time, ChannelKind::NoteOff, channel, key, velocity)
  }

  pub fn polyphonic_key_pressure(
    time: BarBeatTime,
    channel: U4,
    key: U7,
    pressure: U7,
  ) -> ChannelEvent {
    Self::two_data(time, ChannelKind::PolyphonicKeyPressure, channel, key, pressure)
  }

  pub fn control_change(time: BarBeatTime, channel: U4, controller: U7, value: U7) -> ChannelEvent {
    Self::two_data(time, ChannelKind::ControlChange, channel, controller, value)
  }

  pub fn program_change(time: BarBeatTime, channel: U4, program: U7) -> ChannelEvent {
    Self::one_data(time, ChannelKind::ProgramChange, channel, program)
  }

  pub fn channel_pressure(time: BarBeatTime, channel: U4, pressure: U7) -> ChannelEvent {
    Self::one_data(time, ChannelKind::ChannelPressure, channel, pressure)
  }

  pub fn pitch_bend(time: BarBeatTime, channel: U4, value: U14) -> ChannelEvent {
    let lsb = (value & 0x7f) as u8;
    let msb = ((value >> 7) & 0x7f) as u8;
    Self::two_data(time, ChannelKind::PitchBendChange, channel, lsb, msb)
  }

  pub fn kind(&self) -> ChannelKind {
    self.status.kind
  }

  pub fn channel(&self) -> U4 {
    self.status.channel
  }

  pub fn parse(delta: TicksTime, bytes: &[u8]) -> Result<ChannelEvent> {
    let status_byte = *bytes.first().ok_or(SequencerError::InvalidLength {
      expected: 2,
      actual: 0,
    })?;
    let status = Status::from_byte(status_byte)?;
    let expected = status.kind.byte_count();
    if bytes.len() != expected {
      return Err(SequencerError::InvalidLength {
        expected,
        actual: bytes.len(),
      });
    }
    if let Some(byte) = bytes[1..].iter().find(|byte| *byte & 0x80 != 0) {
      return Err(SequencerError::unsupported(format!(
        "data byte 0x{:02X} has the status bit set",
        byte
      )));
    }
    Ok(ChannelEvent {
      time: BarBeatTime::zero(),
      delta: Some(delta),
      status,
      data1: bytes[1],
      data2: bytes.get(2).cloned(),
    })
  }

  pub fn bytes(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(3);
    bytes.push(self.status.byte());
    bytes.push(u7(self.data1));
    if let Some(data2) = self.data2 {
      bytes.push(u7(data2));
    }
    bytes
  }
}

impl PartialEq for ChannelEvent {
  fn eq(&self, other: &ChannelEvent) -> bool {
    self.time == other.time
      && self.status == other.status
      && self.data1 == other.data1
      && self.data2 == other.data2
  }
}

#[cfg(test)]
mod test {

  use super::*;

  fn assert_encoding(event: ChannelEvent, expected: &[u8]) {
    let bytes = event.bytes();
    assert_eq!(bytes, expected);
    let parsed = ChannelEvent::parse(TicksTime::new(7), &bytes).unwrap();
    assert_eq!(parsed, event);
    assert_eq!(parsed.delta, Some(TicksTime::new(7)));
  }

  #[test]
  pub fn note_events() {
    let time = BarBeatTime::zero();
    assert_encoding(ChannelEvent::note_on(time, 1, 64, 127), &[0x91, 64, 127]);
    assert_encoding(ChannelEvent::note_off(time, 0x0a, 0, 12), &[0x8a, 0, 12]);
  }

  #[test]
  pub fn control_and_pressure_events() {
    let time = BarBeatTime::zero();
    assert_encoding(
      ChannelEvent::polyphonic_key_pressure(time, 2, 60, 90),
      &[0xa2, 60, 90],
    );
    assert_encoding(ChannelEvent::control_change(time, 3, 7, 100), &[0xb3, 7, 100]);
    assert_encoding(ChannelEvent::channel_pressure(time, 4, 33), &[0xd4, 33]);
  }

  #[test]
  pub fn program_change() {
    assert_encoding(
      ChannelEvent::program_change(BarBeatTime::zero(), 9, 0b0101_0101),
      &[0xc9, 0b0101_0101],
    );
  }

  #[test]
  pub fn pitch_bend() {
    assert_encoding(
      ChannelEvent::pitch_bend(BarBeatTime::zero(), 5, 0b10_1010_1010_1010),
      &[0xe5, 0b010_1010, 0b101_0101],
    );
  }

  #[test]
  pub fn data_is_masked_to_seven_bits() {
    let event = ChannelEvent::note_on(BarBeatTime::zero(), 0x1f, 0xff, 0x80);
    assert_eq!(event.bytes(), vec![0x9f, 0x7f, 0x00]);
  }

  #[test]
  pub fn new_enforces_byte_count() {
    let time = BarBeatTime::zero();
    let note_on = Status::new(ChannelKind::NoteOn, 0);
    let program = Status::new(ChannelKind::ProgramChange, 0);
    assert!(ChannelEvent::new(time, note_on, 60, Some(100)).is_ok());
    assert!(ChannelEvent::new(time, note_on, 60, None).is_err());
    assert!(ChannelEvent::new(time, program, 1, None).is_ok());
    assert!(ChannelEvent::new(time, program, 1, Some(2)).is_err());
  }

  #[test]
  pub fn unknown_kind_is_rejected() {
    for status in [0x00u8, 0x45, 0x7f, 0xf0, 0xff].iter() {
      let result = ChannelEvent::parse(TicksTime::zero(), &[*status, 1, 2]);
      assert!(
        matches!(result, Err(SequencerError::UnsupportedEvent { .. })),
        "status {:02X}",
        status
      );
    }
  }

  #[test]
  pub fn wrong_length_is_rejected() {
    let result = ChannelEvent::parse(TicksTime::zero(), &[0x90, 60]);
    assert!(matches!(
      result,
      Err(SequencerError::InvalidLength {
        expected: 3,
        actual: 2
      })
    ));
    let result = ChannelEvent::parse(TicksTime::zero(), &[0xc0, 1, 2]);
    assert!(matches!(result, Err(SequencerError::InvalidLength { .. })));
  }

  #[test]
  pub fn status_bit_in_data_is_rejected() {
    let result = ChannelEvent::parse(TicksTime::zero(), &[0x90, 0x90, 0x40]);
    assert!(matches!(result, Err(SequencerError::UnsupportedEvent { .. })));
  }

  #[test]
  pub fn status_byte() {
    let status = Status::from_byte(0b1010_0101).unwrap();
    assert_eq!(status.kind, ChannelKind::PolyphonicKeyPressure);
    assert_eq!(status.channel, 0b0101);
    assert_eq!(status.byte(), 0b1010_0101);
  }
}
