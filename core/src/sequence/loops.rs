use std::fmt;

use uuid::Uuid;

use crate::midi::events::{MetaData, MetaEvent, MidiEvent, NodeData};
use crate::sequence::container::EventContainer;
use crate::time::{BarBeatTime, TicksTime};

pub const INFINITE_REPETITIONS: i32 = -1;

/// Text payload of the marker events that delimit a merged loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopMarker {
  Start {
    identifier: Uuid,
    repetitions: i32,
    repeat_delay: TicksTime,
  },
  End {
    identifier: Uuid,
  },
}

impl LoopMarker {
  pub fn identifier(&self) -> Uuid {
    match self {
      LoopMarker::Start { identifier, .. } | LoopMarker::End { identifier } => *identifier,
    }
  }

  pub fn parse(text: &str) -> Option<LoopMarker> {
    if let Some(rest) = text.strip_prefix("start(") {
      let close = rest.find(')')?;
      let identifier = Uuid::parse_str(&rest[..close]).ok()?;
      let mut fields = rest[close + 1..].strip_prefix(':')?.splitn(2, ':');
      let repetitions = fields.next()?.parse::<i32>().ok()?;
      let repeat_delay = fields.next()?.parse::<u64>().ok()?;
      Some(LoopMarker::Start {
        identifier,
        repetitions,
        repeat_delay: TicksTime::new(repeat_delay),
      })
    } else {
      let inner = text.strip_prefix("end(")?.strip_suffix(')')?;
      let identifier = Uuid::parse_str(inner).ok()?;
      Some(LoopMarker::End { identifier })
    }
  }

  pub fn from_event(event: &MidiEvent) -> Option<LoopMarker> {
    match event {
      MidiEvent::Meta(MetaEvent {
        data: MetaData::Marker(text),
        ..
      }) => LoopMarker::parse(text),
      _ => None,
    }
  }

  pub fn event(&self, time: BarBeatTime) -> MidiEvent {
    MetaEvent::marker(time, self.to_string()).into()
  }
}

impl fmt::Display for LoopMarker {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      LoopMarker::Start {
        identifier,
        repetitions,
        repeat_delay,
      } => write!(
        f,
        "start({}):{}:{}",
        identifier.to_hyphenated(),
        repetitions,
        repeat_delay.ticks()
      ),
      LoopMarker::End { identifier } => write!(f, "end({})", identifier.to_hyphenated()),
    }
  }
}

/// A recorded phrase that repeats `repetitions` times (or forever when negative),
/// with `repeat_delay` ticks of silence between passes.
///
/// Event times inside the loop are relative to `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
  identifier: Uuid,
  repetitions: i32,
  repeat_delay: TicksTime,
  start: BarBeatTime,
  end: BarBeatTime,
  events: EventContainer,
}

impl Loop {
  pub fn new(
    identifier: Uuid,
    repetitions: i32,
    repeat_delay: TicksTime,
    start: BarBeatTime,
    end: BarBeatTime,
    events: EventContainer,
  ) -> Loop {
    Loop {
      identifier,
      repetitions,
      repeat_delay,
      start,
      end,
      events,
    }
  }

  pub fn identifier(&self) -> Uuid {
    self.identifier
  }

  pub fn repetitions(&self) -> i32 {
    self.repetitions
  }

  pub fn is_infinite(&self) -> bool {
    self.repetitions < 0
  }

  pub fn repeat_delay(&self) -> TicksTime {
    self.repeat_delay
  }

  pub fn start(&self) -> BarBeatTime {
    self.start
  }

  pub fn end(&self) -> BarBeatTime {
    self.end
  }

  pub fn events(&self) -> &EventContainer {
    &self.events
  }

  pub fn length(&self) -> TicksTime {
    self.end.ticks() - self.start.ticks()
  }

  /// Distance between the starts of two consecutive passes
  pub fn period(&self) -> TicksTime {
    self.length() + self.repeat_delay
  }

  pub fn begin_marker(&self) -> LoopMarker {
    LoopMarker::Start {
      identifier: self.identifier,
      repetitions: self.repetitions,
      repeat_delay: self.repeat_delay,
    }
  }

  pub fn end_marker(&self) -> LoopMarker {
    LoopMarker::End {
      identifier: self.identifier,
    }
  }

  /// Unbounded stream. Infinite loops never end, take what you need.
  pub fn iter(&self) -> LoopIter {
    LoopIter::new(self, None)
  }

  /// Stream where no pass starts after `bound`
  pub fn bounded(&self, bound: TicksTime) -> LoopIter {
    LoopIter::new(self, Some(bound))
  }
}

/// Node events coming out of a loop belong to it
fn tag_nodes(event: MidiEvent, loop_identifier: Uuid) -> MidiEvent {
  match event {
    MidiEvent::Node(mut node) => {
      match &mut node.data {
        NodeData::Add { identifier, .. } | NodeData::Remove { identifier } => {
          identifier.loop_identifier = Some(loop_identifier)
        }
      }
      MidiEvent::Node(node)
    }
    other => other,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
  Begin,
  Events,
  End,
  Done,
}

pub struct LoopIter<'a> {
  source: &'a Loop,
  events: Vec<&'a MidiEvent>,
  bound: Option<TicksTime>,
  stage: Stage,
  index: usize,
  passes: i32,
  offset: TicksTime,
}

impl<'a> LoopIter<'a> {
  fn new(source: &'a Loop, bound: Option<TicksTime>) -> LoopIter<'a> {
    LoopIter {
      source,
      events: source.events.iter().collect(),
      bound,
      stage: Stage::Begin,
      index: 0,
      passes: 0,
      offset: TicksTime::zero(),
    }
  }

  fn at(&self, ticks: TicksTime) -> BarBeatTime {
    self.source.start.with_ticks(ticks)
  }

  fn may_repeat(&self) -> bool {
    let source = self.source;
    let budget_left = self.passes < source.repetitions || source.is_infinite();
    if !budget_left || self.events.is_empty() || source.period() == TicksTime::zero() {
      return false;
    }
    let next_start = source.start.ticks() + self.offset + source.period();
    match self.bound {
      Some(bound) => next_start <= bound,
      None => true,
    }
  }
}

impl<'a> Iterator for LoopIter<'a> {
  type Item = MidiEvent;

  fn next(&mut self) -> Option<MidiEvent> {
    loop {
      match self.stage {
        Stage::Begin => {
          self.stage = Stage::Events;
          return Some(self.source.begin_marker().event(self.source.start));
        }
        Stage::Events => {
          if let Some(event) = self.events.get(self.index).copied() {
            self.index += 1;
            let ticks = event.ticks() + self.source.start.ticks() + self.offset;
            let event = tag_nodes(event.clone(), self.source.identifier);
            return Some(event.with_time(self.at(ticks)).with_delta(None));
          }
          self.passes += 1;
          if self.may_repeat() {
            self.offset += self.source.period();
            self.index = 0;
          } else {
            self.stage = Stage::End;
          }
        }
        Stage::End => {
          self.stage = Stage::Done;
          let ticks = self.source.start.ticks() + self.offset + self.source.length();
          return Some(self.source.end_marker().event(self.at(ticks)));
        }
        Stage::Done => return None,
      }
    }
  }
}

#[cfg(test)]
mod test {

  use super::*;
  use crate::midi::events::ChannelEvent;
  use crate::time::Signature;

  fn at(ticks: u64) -> BarBeatTime {
    BarBeatTime::from_ticks(TicksTime::new(ticks), Signature::default(), 480)
  }

  fn phrase(times: &[u64]) -> EventContainer {
    times
      .iter()
      .map(|ticks| ChannelEvent::note_on(at(*ticks), 0, 60, 100).into())
      .collect()
  }

  fn ticks_of(events: &[MidiEvent]) -> Vec<u64> {
    events.iter().map(|event| event.ticks().ticks()).collect()
  }

  #[test]
  pub fn two_repetitions() {
    let identifier = Uuid::new_v4();
    let lp = Loop::new(identifier, 2, TicksTime::zero(), at(0), at(20), phrase(&[0, 10]));
    let events: Vec<MidiEvent> = lp.iter().collect();

    assert_eq!(ticks_of(&events), vec![0, 0, 10, 20, 30, 40]);
    assert_eq!(
      LoopMarker::from_event(&events[0]),
      Some(LoopMarker::Start {
        identifier,
        repetitions: 2,
        repeat_delay: TicksTime::zero()
      })
    );
    assert_eq!(
      LoopMarker::from_event(&events[5]),
      Some(LoopMarker::End { identifier })
    );
    for event in &events[1..5] {
      assert!(event.as_channel().is_some());
    }
  }

  #[test]
  pub fn iteration_is_restartable() {
    let lp = Loop::new(Uuid::new_v4(), 3, TicksTime::new(5), at(100), at(120), phrase(&[0, 10]));
    let first: Vec<MidiEvent> = lp.iter().collect();
    let second: Vec<MidiEvent> = lp.iter().collect();
    assert_eq!(first, second);
    assert_eq!(ticks_of(&first), vec![100, 100, 110, 125, 135, 150, 160, 170]);
  }

  #[test]
  pub fn single_pass() {
    let lp = Loop::new(Uuid::new_v4(), 1, TicksTime::zero(), at(0), at(20), phrase(&[5]));
    assert_eq!(ticks_of(&lp.iter().collect::<Vec<MidiEvent>>()), vec![0, 5, 20]);
  }

  #[test]
  pub fn infinite_loop_without_bound_keeps_repeating() {
    let lp = Loop::new(
      Uuid::new_v4(),
      INFINITE_REPETITIONS,
      TicksTime::zero(),
      at(0),
      at(20),
      phrase(&[0]),
    );
    let events: Vec<MidiEvent> = lp.iter().take(10).collect();
    assert_eq!(ticks_of(&events), vec![0, 0, 20, 40, 60, 80, 100, 120, 140, 160]);
    assert!(events[1..].iter().all(|event| event.as_channel().is_some()));
  }

  #[test]
  pub fn infinite_loop_is_truncated_by_bound() {
    let lp = Loop::new(
      Uuid::new_v4(),
      INFINITE_REPETITIONS,
      TicksTime::zero(),
      at(0),
      at(20),
      phrase(&[0, 10]),
    );
    let events: Vec<MidiEvent> = lp.bounded(TicksTime::new(45)).collect();
    assert_eq!(ticks_of(&events), vec![0, 0, 10, 20, 30, 40, 50, 60]);
  }

  #[test]
  pub fn bound_truncates_counted_loops() {
    let lp = Loop::new(Uuid::new_v4(), 10, TicksTime::zero(), at(0), at(20), phrase(&[0]));
    let events: Vec<MidiEvent> = lp.bounded(TicksTime::new(20)).collect();
    assert_eq!(ticks_of(&events), vec![0, 0, 20, 40]);
  }

  #[test]
  pub fn empty_or_zero_length_loops_play_once() {
    let empty = Loop::new(
      Uuid::new_v4(),
      INFINITE_REPETITIONS,
      TicksTime::zero(),
      at(0),
      at(20),
      EventContainer::new(),
    );
    assert_eq!(ticks_of(&empty.iter().collect::<Vec<MidiEvent>>()), vec![0, 20]);

    let zero = Loop::new(
      Uuid::new_v4(),
      INFINITE_REPETITIONS,
      TicksTime::zero(),
      at(8),
      at(8),
      phrase(&[0]),
    );
    assert_eq!(ticks_of(&zero.iter().collect::<Vec<MidiEvent>>()), vec![8, 8, 8]);
    assert_eq!(
      ticks_of(&zero.bounded(TicksTime::new(1000)).collect::<Vec<MidiEvent>>()),
      vec![8, 8, 8]
    );
  }

  #[test]
  pub fn node_events_are_tagged_with_the_loop() {
    use crate::midi::events::{Generator, Identifier, NodeEvent, Trajectory};

    let identifier = Uuid::new_v4();
    let node = Identifier::new(Uuid::new_v4());
    let events: EventContainer = vec![
      NodeEvent::add(
        at(0),
        node,
        Trajectory::new(0.0, 0.0, 0.0, 0.0),
        Generator::new(0, 60, 100, 5),
      )
      .into(),
      NodeEvent::remove(at(10), node).into(),
    ]
    .into_iter()
    .collect();
    let lp = Loop::new(identifier, 2, TicksTime::zero(), at(0), at(20), events);
    let nodes: Vec<Identifier> = lp
      .iter()
      .filter_map(|event| event.as_node().map(|node| *node.identifier()))
      .collect();
    assert_eq!(nodes.len(), 4);
    for tagged in nodes {
      assert_eq!(tagged, Identifier::with_loop(identifier, node.node_identifier));
    }
  }

  #[test]
  pub fn marker_text() {
    let identifier = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let start = LoopMarker::Start {
      identifier,
      repetitions: -1,
      repeat_delay: TicksTime::new(240),
    };
    assert_eq!(
      start.to_string(),
      "start(67e55044-10b1-426f-9247-bb680e5fe0c8):-1:240"
    );
    assert_eq!(LoopMarker::parse(&start.to_string()), Some(start));

    let end = LoopMarker::End { identifier };
    assert_eq!(end.to_string(), "end(67e55044-10b1-426f-9247-bb680e5fe0c8)");
    assert_eq!(LoopMarker::parse(&end.to_string()), Some(end));

    assert_eq!(LoopMarker::parse("verse"), None);
    assert_eq!(LoopMarker::parse("start(nope):1:0"), None);
  }
}
