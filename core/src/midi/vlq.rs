//! MIDI variable length quantities: 7 bits per byte, most significant group first,
//! bit 7 set on every byte except the last one.

use crate::error::{Result, SequencerError};

pub const MAX_VLQ_BYTES: usize = 4;
pub const MAX_VLQ_VALUE: u32 = 0x0FFF_FFFF;

const CONTINUATION: u8 = 0b1000_0000;
const DATA_MASK: u8 = 0b0111_1111;

pub fn encode(value: u32) -> Result<Vec<u8>> {
  let mut out = Vec::with_capacity(MAX_VLQ_BYTES);
  encode_into(value, &mut out)?;
  Ok(out)
}

/// Appends the encoded value and returns the number of bytes written
pub fn encode_into(value: u32, out: &mut Vec<u8>) -> Result<usize> {
  if value > MAX_VLQ_VALUE {
    return Err(SequencerError::VlqOutOfRange { value });
  }

  let mut groups = [0u8; MAX_VLQ_BYTES];
  let mut count = 0;
  let mut remaining = value;
  loop {
    groups[count] = (remaining as u8) & DATA_MASK;
    count += 1;
    remaining >>= 7;
    if remaining == 0 {
      break;
    }
  }

  for index in (0..count).rev() {
    let continuation = if index > 0 { CONTINUATION } else { 0 };
    out.push(groups[index] | continuation);
  }

  Ok(count)
}

/// Returns the decoded value and how many bytes were consumed
pub fn decode(bytes: &[u8]) -> Result<(u32, usize)> {
  let mut value = 0u32;
  for (index, byte) in bytes.iter().take(MAX_VLQ_BYTES).enumerate() {
    value = (value << 7) | u32::from(byte & DATA_MASK);
    if byte & CONTINUATION == 0 {
      return Ok((value, index + 1));
    }
  }
  Err(SequencerError::MalformedVlq)
}

#[cfg(test)]
mod test {

  use super::*;

  #[test]
  pub fn encode_known_values() {
    assert_eq!(encode(0).unwrap(), vec![0x00]);
    assert_eq!(encode(0x40).unwrap(), vec![0x40]);
    assert_eq!(encode(0x7F).unwrap(), vec![0x7F]);
    assert_eq!(encode(0x80).unwrap(), vec![0x81, 0x00]);
    assert_eq!(encode(0x2000).unwrap(), vec![0xC0, 0x00]);
    assert_eq!(encode(0x3FFF).unwrap(), vec![0xFF, 0x7F]);
    assert_eq!(encode(0x4000).unwrap(), vec![0x81, 0x80, 0x00]);
    assert_eq!(encode(0x10_0000).unwrap(), vec![0xC0, 0x80, 0x00]);
    assert_eq!(encode(0x1F_FFFF).unwrap(), vec![0xFF, 0xFF, 0x7F]);
    assert_eq!(encode(0x20_0000).unwrap(), vec![0x81, 0x80, 0x80, 0x00]);
    assert_eq!(encode(MAX_VLQ_VALUE).unwrap(), vec![0xFF, 0xFF, 0xFF, 0x7F]);
  }

  #[test]
  pub fn encode_out_of_range() {
    match encode(MAX_VLQ_VALUE + 1) {
      Err(SequencerError::VlqOutOfRange { value }) => assert_eq!(value, MAX_VLQ_VALUE + 1),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  pub fn encode_into_appends() {
    let mut out = vec![0xAA];
    assert_eq!(encode_into(0x80, &mut out).unwrap(), 2);
    assert_eq!(out, vec![0xAA, 0x81, 0x00]);
  }

  #[test]
  pub fn decode_ignores_trailing_bytes() {
    assert_eq!(decode(&[0x81, 0x00, 0x55]).unwrap(), (0x80, 2));
    assert_eq!(decode(&[0x00, 0xFF]).unwrap(), (0, 1));
  }

  #[test]
  pub fn decode_malformed() {
    assert!(matches!(decode(&[]), Err(SequencerError::MalformedVlq)));
    assert!(matches!(decode(&[0x81, 0x80]), Err(SequencerError::MalformedVlq)));
    assert!(matches!(
      decode(&[0x81, 0x80, 0x80, 0x80, 0x00]),
      Err(SequencerError::MalformedVlq)
    ));
  }

  #[test]
  pub fn round_trip_is_minimal() {
    let mut values: Vec<u32> = (0..=0x4100).collect();
    for shift in 0..28 {
      let power = 1u32 << shift;
      values.extend_from_slice(&[power - 1, power, power + 1]);
    }
    values.push(MAX_VLQ_VALUE);
    for value in values.into_iter().filter(|value| *value <= MAX_VLQ_VALUE) {
      let bytes = encode(value).unwrap();
      let expected_len = match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        _ => 4,
      };
      assert_eq!(bytes.len(), expected_len, "value {}", value);
      assert_eq!(decode(&bytes).unwrap(), (value, expected_len), "value {}", value);
    }
  }
}
