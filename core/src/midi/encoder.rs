use std::convert::TryFrom;

use crate::error::{Result, SequencerError};
use crate::midi::events::MidiEvent;
use crate::midi::file::{Header, HEADER_LENGTH, HEADER_TAG, TRACK_TAG};
use crate::midi::vlq;
use crate::time::TicksTime;

#[inline]
fn u16_be(value: u16) -> [u8; 2] {
  [(value >> 8) as u8, value as u8]
}

#[inline]
fn u32_be(value: u32) -> [u8; 4] {
  [
    (value >> 24) as u8,
    (value >> 16) as u8,
    (value >> 8) as u8,
    value as u8,
  ]
}

pub struct Encoder;

impl Encoder {
  pub fn header(header: &Header) -> Vec<u8> {
    let mut out = Vec::with_capacity(14);
    out.extend_from_slice(HEADER_TAG);
    out.extend_from_slice(&u32_be(HEADER_LENGTH));
    out.extend_from_slice(&u16_be(header.format.value()));
    out.extend_from_slice(&u16_be(header.track_count));
    out.extend_from_slice(&u16_be(header.division));
    out
  }

  /// Encodes `(delta, event)` pairs in time order.
  /// Deltas are recomputed from the absolute event times.
  pub fn events<'a, I>(events: I) -> Result<Vec<u8>>
  where
    I: IntoIterator<Item = &'a MidiEvent>,
  {
    let mut sorted: Vec<&MidiEvent> = events.into_iter().collect();
    sorted.sort_by_key(|event| event.ticks());

    let mut out = Vec::new();
    let mut previous = TicksTime::zero();
    for event in sorted {
      let delta = u64::from(event.ticks() - previous);
      let delta = u32::try_from(delta).map_err(|_| SequencerError::VlqOutOfRange {
        value: u32::max_value(),
      })?;
      vlq::encode_into(delta, &mut out)?;
      out.extend(event.bytes()?);
      previous = event.ticks();
    }
    Ok(out)
  }

  pub fn track<'a, I>(events: I) -> Result<Vec<u8>>
  where
    I: IntoIterator<Item = &'a MidiEvent>,
  {
    let data = Self::events(events)?;
    let length = u32::try_from(data.len()).map_err(|_| {
      SequencerError::unsound(format!("track chunk of {} bytes is too large", data.len()))
    })?;
    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(TRACK_TAG);
    out.extend_from_slice(&u32_be(length));
    out.extend(data);
    Ok(out)
  }
}
