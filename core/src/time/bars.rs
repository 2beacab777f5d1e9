use std::{
  cmp::Ordering,
  fmt,
  hash::{Hash, Hasher},
  ops::{Add, Sub},
};

use crate::error::{Result, SequencerError};
use crate::time::{ticks::DEFAULT_TICKS_PER_BEAT, Signature, TicksTime};

/// Musical coordinates (bar, beat, subbeat) of a tick count.
///
/// The tick count is the only stored position. Bars, beats and subbeats are derived
/// from it using the signature and the subbeat divisor (ticks per beat), and are
/// 1-indexed for display. Equality, ordering and hashing only look at the ticks.
#[derive(Clone, Copy)]
pub struct BarBeatTime {
  ticks: TicksTime,
  signature: Signature,
  subbeat_divisor: u64,
}

impl BarBeatTime {
  pub fn zero() -> BarBeatTime {
    BarBeatTime::default()
  }

  pub fn from_ticks(ticks: TicksTime, signature: Signature, subbeat_divisor: u64) -> BarBeatTime {
    BarBeatTime {
      ticks,
      signature,
      subbeat_divisor,
    }
  }

  /// Builds a time from 1-indexed components, rejecting anything not normalized
  pub fn new(
    bar: u64,
    beat: u64,
    subbeat: u64,
    signature: Signature,
    subbeat_divisor: u64,
  ) -> Result<BarBeatTime> {
    let beats_per_bar = u64::from(signature.beats_per_bar());
    if subbeat_divisor == 0 || beats_per_bar == 0 {
      return Err(SequencerError::InvalidBarBeatTime {
        cause: format!("degenerate grid {} with divisor {}", signature, subbeat_divisor),
      });
    }
    if bar < 1 || beat < 1 || beat > beats_per_bar || subbeat < 1 || subbeat > subbeat_divisor {
      return Err(SequencerError::InvalidBarBeatTime {
        cause: format!(
          "{}:{}.{} is not normalized for {} with divisor {}",
          bar, beat, subbeat, signature, subbeat_divisor
        ),
      });
    }
    let beats = (bar - 1) * beats_per_bar + (beat - 1);
    let ticks = beats * subbeat_divisor + (subbeat - 1);
    Ok(BarBeatTime::from_ticks(
      TicksTime::new(ticks),
      signature,
      subbeat_divisor,
    ))
  }

  /// Parses the canonical `bar:beat.subbeat` form
  pub fn parse(text: &str, signature: Signature, subbeat_divisor: u64) -> Result<BarBeatTime> {
    let invalid = || SequencerError::InvalidBarBeatTime {
      cause: format!("unable to parse '{}'", text),
    };
    let mut bar_rest = text.trim().splitn(2, ':');
    let bar = bar_rest.next().ok_or_else(invalid)?;
    let rest = bar_rest.next().ok_or_else(invalid)?;
    let mut beat_subbeat = rest.splitn(2, '.');
    let beat = beat_subbeat.next().ok_or_else(invalid)?;
    let subbeat = beat_subbeat.next().ok_or_else(invalid)?;
    let parse = |value: &str| value.parse::<u64>().map_err(|_| invalid());
    BarBeatTime::new(
      parse(bar)?,
      parse(beat)?,
      parse(subbeat)?,
      signature,
      subbeat_divisor,
    )
  }

  fn beats_per_bar(&self) -> u64 {
    u64::from(self.signature.beats_per_bar().max(1))
  }

  fn divisor(&self) -> u64 {
    self.subbeat_divisor.max(1)
  }

  fn beats_elapsed(&self) -> u64 {
    self.ticks.ticks() / self.divisor()
  }

  pub fn bar(&self) -> u64 {
    self.beats_elapsed() / self.beats_per_bar() + 1
  }

  pub fn beat(&self) -> u64 {
    self.beats_elapsed() % self.beats_per_bar() + 1
  }

  pub fn subbeat(&self) -> u64 {
    self.ticks.ticks() % self.divisor() + 1
  }

  pub fn ticks(&self) -> TicksTime {
    self.ticks
  }

  /// Recomputes the ticks from the derived coordinates
  pub fn to_ticks(&self) -> TicksTime {
    let beats = (self.bar() - 1) * self.beats_per_bar() + (self.beat() - 1);
    TicksTime::new(beats * self.divisor() + (self.subbeat() - 1))
  }

  pub fn signature(&self) -> Signature {
    self.signature
  }

  pub fn subbeat_divisor(&self) -> u64 {
    self.subbeat_divisor
  }

  pub fn with_signature(&self, signature: Signature) -> BarBeatTime {
    BarBeatTime {
      signature,
      ..*self
    }
  }

  /// Same grid, another position
  pub fn with_ticks(&self, ticks: TicksTime) -> BarBeatTime {
    BarBeatTime { ticks, ..*self }
  }

  pub fn is_zero(&self) -> bool {
    self.ticks == TicksTime::zero()
  }
}

impl Default for BarBeatTime {
  fn default() -> BarBeatTime {
    BarBeatTime::from_ticks(
      TicksTime::zero(),
      Signature::default(),
      u64::from(DEFAULT_TICKS_PER_BEAT),
    )
  }
}

impl PartialEq for BarBeatTime {
  fn eq(&self, other: &BarBeatTime) -> bool {
    self.ticks == other.ticks
  }
}

impl Eq for BarBeatTime {}

impl Ord for BarBeatTime {
  fn cmp(&self, other: &BarBeatTime) -> Ordering {
    self.ticks.cmp(&other.ticks)
  }
}

impl PartialOrd for BarBeatTime {
  fn partial_cmp(&self, other: &BarBeatTime) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Hash for BarBeatTime {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.ticks.hash(state);
  }
}

impl Add<TicksTime> for BarBeatTime {
  type Output = BarBeatTime;
  fn add(self, rhs: TicksTime) -> BarBeatTime {
    self.with_ticks(self.ticks + rhs)
  }
}

impl Add for BarBeatTime {
  type Output = BarBeatTime;
  fn add(self, rhs: BarBeatTime) -> BarBeatTime {
    self + rhs.ticks
  }
}

impl Sub<TicksTime> for BarBeatTime {
  type Output = BarBeatTime;
  fn sub(self, rhs: TicksTime) -> BarBeatTime {
    self.with_ticks(self.ticks - rhs)
  }
}

impl Sub for BarBeatTime {
  type Output = BarBeatTime;
  fn sub(self, rhs: BarBeatTime) -> BarBeatTime {
    self - rhs.ticks
  }
}

impl fmt::Display for BarBeatTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}:{}.{}", self.bar(), self.beat(), self.subbeat())
  }
}

impl fmt::Debug for BarBeatTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "{}:{}.{}/{}@{}",
      self.bar(),
      self.beat(),
      self.subbeat(),
      self.subbeat_divisor,
      self.ticks
    )
  }
}

#[cfg(test)]
mod test {

  use super::BarBeatTime;
  use crate::time::{Signature, TicksTime};

  #[test]
  pub fn from_ticks() {
    let signature = Signature::new(3, 4);
    // 10 bars, 2 beats and 30 ticks
    let ticks = TicksTime::new(480 * 3 * 10 + 480 * 2 + 30);
    let time = BarBeatTime::from_ticks(ticks, signature, 480);
    assert_eq!(time.bar(), 11);
    assert_eq!(time.beat(), 3);
    assert_eq!(time.subbeat(), 31);
    assert_eq!(time.to_string(), "11:3.31");
  }

  #[test]
  pub fn zero_is_minimum() {
    let zero = BarBeatTime::zero();
    assert_eq!(zero.bar(), 1);
    assert_eq!(zero.beat(), 1);
    assert_eq!(zero.subbeat(), 1);
    assert!(zero.is_zero());
    let later = BarBeatTime::from_ticks(TicksTime::new(1), Signature::default(), 480);
    assert!(zero < later);
    assert_eq!(BarBeatTime::default(), zero);
  }

  #[test]
  pub fn to_ticks_inverse() {
    let signatures = [
      Signature::new(4, 4),
      Signature::new(3, 4),
      Signature::new(7, 8),
      Signature::new(1, 2),
    ];
    for signature in signatures.iter() {
      for divisor in [1u64, 24, 96, 480].iter() {
        for ticks in (0..20_000u64).step_by(37).chain(std::iter::once(123_456_789)) {
          let time = BarBeatTime::from_ticks(TicksTime::new(ticks), *signature, *divisor);
          assert_eq!(time.to_ticks(), TicksTime::new(ticks));
          let rebuilt = BarBeatTime::new(
            time.bar(),
            time.beat(),
            time.subbeat(),
            *signature,
            *divisor,
          )
          .unwrap();
          assert_eq!(rebuilt.ticks(), TicksTime::new(ticks));
        }
      }
    }
  }

  #[test]
  pub fn new_rejects_non_normalized() {
    let signature = Signature::new(4, 4);
    assert!(BarBeatTime::new(0, 1, 1, signature, 480).is_err());
    assert!(BarBeatTime::new(1, 5, 1, signature, 480).is_err());
    assert!(BarBeatTime::new(1, 1, 481, signature, 480).is_err());
    assert!(BarBeatTime::new(1, 1, 0, signature, 480).is_err());
    assert!(BarBeatTime::new(2, 4, 480, signature, 480).is_ok());
  }

  #[test]
  pub fn ordering_follows_ticks() {
    let a = BarBeatTime::from_ticks(TicksTime::new(10), Signature::new(3, 4), 24);
    let b = BarBeatTime::from_ticks(TicksTime::new(10), Signature::new(4, 4), 480);
    let c = BarBeatTime::from_ticks(TicksTime::new(11), Signature::new(4, 4), 480);
    assert_eq!(a, b);
    assert!(b < c);
    assert!(c > a);
  }

  #[test]
  pub fn arithmetic() {
    let a = BarBeatTime::from_ticks(TicksTime::new(100), Signature::default(), 480);
    let b = BarBeatTime::from_ticks(TicksTime::new(30), Signature::default(), 480);
    assert_eq!((a + b).ticks(), TicksTime::new(130));
    assert_eq!((a - b).ticks(), TicksTime::new(70));
    assert_eq!((b - a).ticks(), TicksTime::zero());
    assert_eq!((a + TicksTime::new(5)).ticks(), TicksTime::new(105));
  }

  #[test]
  pub fn parse_canonical_form() {
    let signature = Signature::new(4, 4);
    let time = BarBeatTime::parse("3:2.17", signature, 480).unwrap();
    assert_eq!(time.ticks(), TicksTime::new((2 * 4 + 1) * 480 + 16));
    assert_eq!(time.to_string(), "3:2.17");
    assert!(BarBeatTime::parse("3:2", signature, 480).is_err());
    assert!(BarBeatTime::parse("a:b.c", signature, 480).is_err());
    assert!(BarBeatTime::parse("1:9.1", signature, 480).is_err());
  }
}
