use std::{
  fmt,
  ops::{Add, AddAssign, Div, Mul, Sub, SubAssign},
};

use crate::time::{clock, ClockTime, Tempo};

/// Default number of ticks per quarter note (the MIDI file division)
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Default)]
pub struct TicksTime(u64);

impl TicksTime {
  pub fn new(ticks: u64) -> TicksTime {
    TicksTime(ticks)
  }

  pub fn zero() -> TicksTime {
    TicksTime(0)
  }

  pub fn ticks(&self) -> u64 {
    self.0
  }

  pub fn per_minute(tempo: Tempo, division: u16) -> f64 {
    f64::from(division) * tempo.bpm()
  }

  pub fn to_clock(&self, tempo: Tempo, division: u16) -> ClockTime {
    let ticks_per_minute = TicksTime::per_minute(tempo, division);
    if ticks_per_minute <= 0.0 {
      return ClockTime::zero();
    }
    let units = self.0 as f64 * clock::UNITS_PER_MINUTE as f64 / ticks_per_minute;
    ClockTime::new(units.round() as u64)
  }
}

impl Add for TicksTime {
  type Output = TicksTime;
  fn add(self, rhs: TicksTime) -> Self {
    TicksTime::new(self.0 + rhs.0)
  }
}

impl AddAssign for TicksTime {
  fn add_assign(&mut self, rhs: TicksTime) {
    *self = *self + rhs;
  }
}

impl Sub for TicksTime {
  type Output = TicksTime;
  fn sub(self, rhs: TicksTime) -> Self {
    TicksTime::new(self.0.saturating_sub(rhs.0))
  }
}

impl SubAssign for TicksTime {
  fn sub_assign(&mut self, rhs: TicksTime) {
    *self = *self - rhs;
  }
}

impl Mul<u64> for TicksTime {
  type Output = TicksTime;
  fn mul(self, rhs: u64) -> Self {
    TicksTime::new(self.0 * rhs)
  }
}

impl Div<u64> for TicksTime {
  type Output = TicksTime;
  fn div(self, rhs: u64) -> Self {
    TicksTime::new(self.0 / rhs)
  }
}

impl From<u64> for TicksTime {
  fn from(ticks: u64) -> Self {
    TicksTime(ticks)
  }
}

impl From<TicksTime> for f64 {
  fn from(item: TicksTime) -> Self {
    item.0 as f64
  }
}

impl From<TicksTime> for u64 {
  fn from(item: TicksTime) -> Self {
    item.0
  }
}

impl fmt::Display for TicksTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
