use std::cmp::Ordering;
use std::fmt;

pub const DEFAULT_TEMPO: f64 = 120.0;

pub const MICROS_PER_MINUTE: f64 = 60_000_000.0;

/// The set tempo meta event carries 3 bytes
pub const MAX_MICROS_PER_QUARTER: u32 = 0x00FF_FFFF;

/// Tempo in beats per minute. Two tempos are the same when they encode to the same
/// microseconds per quarter note.
#[derive(Debug, Clone, Copy)]
pub struct Tempo(f64);

impl Tempo {
  pub fn new(bpm: f64) -> Tempo {
    Tempo(bpm)
  }

  pub fn from_micros_per_quarter(micros: u32) -> Tempo {
    Tempo(MICROS_PER_MINUTE / f64::from(micros.max(1)))
  }

  pub fn bpm(&self) -> f64 {
    self.0
  }

  /// Rounds to the nearest microsecond and clamps to what fits in 3 bytes
  pub fn micros_per_quarter(&self) -> u32 {
    let micros = (MICROS_PER_MINUTE / self.0).round();
    micros.max(1.0).min(f64::from(MAX_MICROS_PER_QUARTER)) as u32
  }
}

impl Default for Tempo {
  fn default() -> Tempo {
    Tempo(DEFAULT_TEMPO)
  }
}

impl PartialEq for Tempo {
  fn eq(&self, other: &Tempo) -> bool {
    self.micros_per_quarter() == other.micros_per_quarter()
  }
}

impl Eq for Tempo {}

impl PartialOrd for Tempo {
  fn partial_cmp(&self, other: &Tempo) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Tempo {
  fn cmp(&self, other: &Tempo) -> Ordering {
    other.micros_per_quarter().cmp(&self.micros_per_quarter())
  }
}

impl From<Tempo> for f64 {
  fn from(item: Tempo) -> Self {
    item.0
  }
}

impl fmt::Display for Tempo {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:.2} bpm", self.0)
  }
}

#[cfg(test)]
mod test {

  use super::{Tempo, MAX_MICROS_PER_QUARTER};

  #[test]
  pub fn tempo_new() {
    let tempo = Tempo::new(120.0);
    assert_eq!(tempo.bpm(), 120.0);
  }

  #[test]
  pub fn tempo_micros_exact() {
    assert_eq!(Tempo::new(120.0).micros_per_quarter(), 500_000);
    assert_eq!(Tempo::from_micros_per_quarter(500_000).bpm(), 120.0);
  }

  #[test]
  pub fn tempo_micros_rounding() {
    // 60_000_000 / 7 = 8_571_428.57...
    assert_eq!(Tempo::new(7.0).micros_per_quarter(), 8_571_429);
    // 60_000_000 / 140 = 428_571.43...
    assert_eq!(Tempo::new(140.0).micros_per_quarter(), 428_571);
  }

  #[test]
  pub fn tempo_micros_stable_after_one_pass() {
    for bpm in 4..=400 {
      let micros = Tempo::new(f64::from(bpm)).micros_per_quarter();
      let decoded = Tempo::from_micros_per_quarter(micros);
      assert_eq!(decoded.micros_per_quarter(), micros, "bpm {}", bpm);
      assert!((decoded.bpm() - f64::from(bpm)).abs() < 0.01, "bpm {}", bpm);
    }
  }

  #[test]
  pub fn equality_follows_encoded_micros() {
    assert_eq!(Tempo::from_micros_per_quarter(666_667), Tempo::new(90.0));
    assert_ne!(Tempo::new(90.0), Tempo::new(90.1));
    assert!(Tempo::new(140.0) > Tempo::new(120.0));
    assert_eq!(Tempo::new(1.0), Tempo::new(2.0));
  }

  #[test]
  pub fn tempo_micros_clamped() {
    assert_eq!(Tempo::new(1.0).micros_per_quarter(), MAX_MICROS_PER_QUARTER);
    assert_eq!(Tempo::new(0.0).micros_per_quarter(), MAX_MICROS_PER_QUARTER);
    assert_eq!(Tempo::from_micros_per_quarter(0).micros_per_quarter(), 1);
  }
}
