use std::fmt;

pub const DEFAULT_BEATS_PER_BAR: u8 = 4;
pub const DEFAULT_BEAT_UNIT: u8 = 4;

/// Largest power of two accepted as a beat unit exponent (1/128 notes)
const MAX_BEAT_UNIT_EXPONENT: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
  beats_per_bar: u8, // numerator
  beat_unit: u8,     // denominator
}

impl Signature {
  pub fn new(beats_per_bar: u8, beat_unit: u8) -> Signature {
    Signature {
      beats_per_bar,
      beat_unit,
    }
  }

  /// Builds a signature from the power of two used by the MIDI time signature meta event
  pub fn from_exponent(beats_per_bar: u8, exponent: u8) -> Option<Signature> {
    if exponent > MAX_BEAT_UNIT_EXPONENT {
      None
    } else {
      Some(Signature::new(beats_per_bar, 1 << exponent))
    }
  }

  pub fn beats_per_bar(&self) -> u8 {
    self.beats_per_bar
  }

  pub fn beat_unit(&self) -> u8 {
    self.beat_unit
  }

  pub fn beat_unit_exponent(&self) -> u8 {
    self.beat_unit.max(1).trailing_zeros() as u8
  }
}

impl Default for Signature {
  fn default() -> Signature {
    Signature::new(DEFAULT_BEATS_PER_BAR, DEFAULT_BEAT_UNIT)
  }
}

impl fmt::Display for Signature {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}/{}", self.beats_per_bar, self.beat_unit)
  }
}
