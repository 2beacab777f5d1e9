//! Node events ride on the Cue Point meta event (`FF 07 len payload`) and keep the
//! lifecycle of spatial/audio nodes in sync with the timeline.
//!
//! Payload layout:
//!
//! ```text
//! Add:    identifier | u32 len | trajectory | u32 len | generator
//! Remove: identifier
//! ```
//!
//! where `identifier` is `u32 len | [loop uuid] | ':' | node uuid`.
//! All integers are big-endian.

use std::fmt;

use uuid::Uuid;

use super::meta::{meta_bytes, split_meta};
use crate::error::{Result, SequencerError};
use crate::midi::types::{U4, U7};
use crate::time::{BarBeatTime, TicksTime};

pub const CUE_POINT: u8 = 0x07;

const LENGTH_SIZE: usize = 4;
const UUID_SIZE: usize = 16;
const SEPARATOR: u8 = b':';

pub const TRAJECTORY_SIZE: usize = 16;
pub const GENERATOR_SIZE: usize = 7;

fn read_length(bytes: &[u8]) -> Result<(usize, &[u8])> {
  if bytes.len() < LENGTH_SIZE {
    return Err(SequencerError::InvalidLength {
      expected: LENGTH_SIZE,
      actual: bytes.len(),
    });
  }
  let mut length = [0u8; LENGTH_SIZE];
  length.copy_from_slice(&bytes[..LENGTH_SIZE]);
  Ok((u32::from_be_bytes(length) as usize, &bytes[LENGTH_SIZE..]))
}

/// Reads a length prefixed block and returns it with whatever follows
fn read_block(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
  let (length, rest) = read_length(bytes)?;
  if rest.len() < length {
    return Err(SequencerError::InvalidLength {
      expected: length,
      actual: rest.len(),
    });
  }
  Ok(rest.split_at(length))
}

fn write_block(block: &[u8], out: &mut Vec<u8>) {
  out.extend_from_slice(&(block.len() as u32).to_be_bytes());
  out.extend_from_slice(block);
}

fn read_uuid(bytes: &[u8]) -> Uuid {
  let mut raw = [0u8; UUID_SIZE];
  raw.copy_from_slice(&bytes[..UUID_SIZE]);
  Uuid::from_bytes(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier {
  pub loop_identifier: Option<Uuid>,
  pub node_identifier: Uuid,
}

impl Identifier {
  pub fn new(node_identifier: Uuid) -> Identifier {
    Identifier {
      loop_identifier: None,
      node_identifier,
    }
  }

  pub fn with_loop(loop_identifier: Uuid, node_identifier: Uuid) -> Identifier {
    Identifier {
      loop_identifier: Some(loop_identifier),
      node_identifier,
    }
  }

  pub fn bytes(&self) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 * UUID_SIZE + 1);
    if let Some(loop_identifier) = self.loop_identifier {
      body.extend_from_slice(loop_identifier.as_bytes());
    }
    body.push(SEPARATOR);
    body.extend_from_slice(self.node_identifier.as_bytes());

    let mut bytes = Vec::with_capacity(LENGTH_SIZE + body.len());
    write_block(&body, &mut bytes);
    bytes
  }

  /// Returns the identifier and the bytes that follow it
  pub fn parse(bytes: &[u8]) -> Result<(Identifier, &[u8])> {
    let (body, rest) = read_block(bytes)?;
    let identifier = match body.len() {
      len if len == UUID_SIZE + 1 => {
        expect_separator(body[0])?;
        Identifier::new(read_uuid(&body[1..]))
      }
      len if len == 2 * UUID_SIZE + 1 => {
        expect_separator(body[UUID_SIZE])?;
        Identifier::with_loop(read_uuid(body), read_uuid(&body[UUID_SIZE + 1..]))
      }
      len => {
        return Err(SequencerError::InvalidLength {
          expected: UUID_SIZE + 1,
          actual: len,
        })
      }
    };
    Ok((identifier, rest))
  }
}

fn expect_separator(byte: u8) -> Result<()> {
  if byte == SEPARATOR {
    Ok(())
  } else {
    Err(SequencerError::unsupported(format!(
      "node identifier separator 0x{:02X}",
      byte
    )))
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self.loop_identifier {
      Some(loop_identifier) => write!(f, "{}:{}", loop_identifier, self.node_identifier),
      None => write!(f, "{}", self.node_identifier),
    }
  }
}

/// Initial placement and velocity of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
  pub x: f32,
  pub y: f32,
  pub dx: f32,
  pub dy: f32,
}

impl Trajectory {
  pub fn new(x: f32, y: f32, dx: f32, dy: f32) -> Trajectory {
    Trajectory { x, y, dx, dy }
  }

  pub fn bytes(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(TRAJECTORY_SIZE);
    for value in [self.x, self.y, self.dx, self.dy].iter() {
      bytes.extend_from_slice(&value.to_bits().to_be_bytes());
    }
    bytes
  }

  pub fn parse(bytes: &[u8]) -> Result<Trajectory> {
    if bytes.len() != TRAJECTORY_SIZE {
      return Err(SequencerError::InvalidLength {
        expected: TRAJECTORY_SIZE,
        actual: bytes.len(),
      });
    }
    let mut values = [0f32; 4];
    for (index, chunk) in bytes.chunks(4).enumerate() {
      let mut raw = [0u8; 4];
      raw.copy_from_slice(chunk);
      values[index] = f32::from_bits(u32::from_be_bytes(raw));
    }
    Ok(Trajectory::new(values[0], values[1], values[2], values[3]))
  }
}

/// Parameters of the notes a node plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generator {
  pub channel: U4,
  pub note: U7,
  pub velocity: U7,
  pub duration: u32,
}

impl Generator {
  pub fn new(channel: U4, note: U7, velocity: U7, duration: u32) -> Generator {
    Generator {
      channel,
      note,
      velocity,
      duration,
    }
  }

  pub fn bytes(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(GENERATOR_SIZE);
    bytes.extend_from_slice(&[self.channel, self.note, self.velocity]);
    bytes.extend_from_slice(&self.duration.to_be_bytes());
    bytes
  }

  pub fn parse(bytes: &[u8]) -> Result<Generator> {
    if bytes.len() != GENERATOR_SIZE {
      return Err(SequencerError::InvalidLength {
        expected: GENERATOR_SIZE,
        actual: bytes.len(),
      });
    }
    let mut duration = [0u8; 4];
    duration.copy_from_slice(&bytes[3..]);
    Ok(Generator::new(
      bytes[0],
      bytes[1],
      bytes[2],
      u32::from_be_bytes(duration),
    ))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
  Add {
    identifier: Identifier,
    trajectory: Trajectory,
    generator: Generator,
  },
  Remove {
    identifier: Identifier,
  },
}

impl NodeData {
  pub fn identifier(&self) -> &Identifier {
    match self {
      NodeData::Add { identifier, .. } | NodeData::Remove { identifier } => identifier,
    }
  }

  pub fn payload(&self) -> Vec<u8> {
    match self {
      NodeData::Add {
        identifier,
        trajectory,
        generator,
      } => {
        let mut bytes = identifier.bytes();
        write_block(&trajectory.bytes(), &mut bytes);
        write_block(&generator.bytes(), &mut bytes);
        bytes
      }
      NodeData::Remove { identifier } => identifier.bytes(),
    }
  }

  pub fn parse(payload: &[u8]) -> Result<NodeData> {
    let (identifier, rest) = Identifier::parse(payload)?;
    if rest.is_empty() {
      return Ok(NodeData::Remove { identifier });
    }
    let (trajectory, rest) = read_block(rest)?;
    let (generator, rest) = read_block(rest)?;
    if !rest.is_empty() {
      return Err(SequencerError::InvalidLength {
        expected: 0,
        actual: rest.len(),
      });
    }
    Ok(NodeData::Add {
      identifier,
      trajectory: Trajectory::parse(trajectory)?,
      generator: Generator::parse(generator)?,
    })
  }
}

#[derive(Debug, Clone)]
pub struct NodeEvent {
  pub time: BarBeatTime,
  pub delta: Option<TicksTime>,
  pub data: NodeData,
}

impl NodeEvent {
  pub fn new(time: BarBeatTime, data: NodeData) -> NodeEvent {
    NodeEvent {
      time,
      delta: None,
      data,
    }
  }

  pub fn add(
    time: BarBeatTime,
    identifier: Identifier,
    trajectory: Trajectory,
    generator: Generator,
  ) -> NodeEvent {
    NodeEvent::new(
      time,
      NodeData::Add {
        identifier,
        trajectory,
        generator,
      },
    )
  }

  pub fn remove(time: BarBeatTime, identifier: Identifier) -> NodeEvent {
    NodeEvent::new(time, NodeData::Remove { identifier })
  }

  pub fn identifier(&self) -> &Identifier {
    self.data.identifier()
  }

  pub fn parse(delta: TicksTime, bytes: &[u8]) -> Result<NodeEvent> {
    let (type_byte, payload) = split_meta(bytes)?;
    if type_byte != CUE_POINT {
      return Err(SequencerError::unsupported(format!(
        "expected a cue point but found meta type 0x{:02X}",
        type_byte
      )));
    }
    Ok(NodeEvent {
      time: BarBeatTime::zero(),
      delta: Some(delta),
      data: NodeData::parse(payload)?,
    })
  }

  pub fn bytes(&self) -> Result<Vec<u8>> {
    meta_bytes(CUE_POINT, &self.data.payload())
  }
}

impl PartialEq for NodeEvent {
  fn eq(&self, other: &NodeEvent) -> bool {
    self.time == other.time && self.data == other.data
  }
}
