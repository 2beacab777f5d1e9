use std::collections::HashMap;

use log::{debug, trace};

use crate::error::{Result, SequencerError};
use crate::midi::events::{Generator, Identifier, Trajectory};

/// Receiver of the node lifecycle carried by node events
pub trait NodeManager {
  fn add_node(
    &mut self,
    identifier: &Identifier,
    trajectory: &Trajectory,
    generator: &Generator,
  ) -> Result<()>;

  fn remove_node(&mut self, identifier: &Identifier) -> Result<()>;

  /// Drops every live node, called when the transport rewinds
  fn clear(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub identifier: Identifier,
  pub trajectory: Trajectory,
  pub generator: Generator,
}

/// Live nodes keyed by their identifier
#[derive(Debug, Default)]
pub struct NodeArena {
  nodes: HashMap<Identifier, Node>,
}

impl NodeArena {
  pub fn new() -> NodeArena {
    NodeArena::default()
  }

  pub fn get(&self, identifier: &Identifier) -> Option<&Node> {
    self.nodes.get(identifier)
  }

  pub fn contains(&self, identifier: &Identifier) -> bool {
    self.nodes.contains_key(identifier)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Node> {
    self.nodes.values()
  }
}

impl NodeManager for NodeArena {
  fn add_node(
    &mut self,
    identifier: &Identifier,
    trajectory: &Trajectory,
    generator: &Generator,
  ) -> Result<()> {
    if self.nodes.contains_key(identifier) {
      return Err(SequencerError::NodeAlreadyConnected {
        identifier: identifier.node_identifier,
      });
    }
    trace!("Adding node {}", identifier);
    self.nodes.insert(
      *identifier,
      Node {
        identifier: *identifier,
        trajectory: *trajectory,
        generator: *generator,
      },
    );
    Ok(())
  }

  fn remove_node(&mut self, identifier: &Identifier) -> Result<()> {
    trace!("Removing node {}", identifier);
    self
      .nodes
      .remove(identifier)
      .map(|_| ())
      .ok_or(SequencerError::NodeNotFound {
        identifier: identifier.node_identifier,
      })
  }

  fn clear(&mut self) {
    debug!("Clearing {} nodes", self.nodes.len());
    self.nodes.clear();
  }
}

#[cfg(test)]
mod test {

  use uuid::Uuid;

  use super::*;

  fn trajectory() -> Trajectory {
    Trajectory::new(0.5, 0.5, 0.0, -1.0)
  }

  fn generator() -> Generator {
    Generator::new(1, 64, 90, 480)
  }

  #[test]
  pub fn add_and_remove() {
    let mut arena = NodeArena::new();
    let identifier = Identifier::new(Uuid::new_v4());
    arena.add_node(&identifier, &trajectory(), &generator()).unwrap();
    assert!(arena.contains(&identifier));
    assert_eq!(arena.get(&identifier).map(|node| node.generator), Some(generator()));
    arena.remove_node(&identifier).unwrap();
    assert!(arena.is_empty());
  }

  #[test]
  pub fn add_twice_is_rejected() {
    let mut arena = NodeArena::new();
    let identifier = Identifier::new(Uuid::new_v4());
    arena.add_node(&identifier, &trajectory(), &generator()).unwrap();
    assert!(matches!(
      arena.add_node(&identifier, &trajectory(), &generator()),
      Err(SequencerError::NodeAlreadyConnected { .. })
    ));
    assert_eq!(arena.len(), 1);
  }

  #[test]
  pub fn loop_copies_are_distinct_nodes() {
    let mut arena = NodeArena::new();
    let node = Uuid::new_v4();
    arena.add_node(&Identifier::new(node), &trajectory(), &generator()).unwrap();
    arena
      .add_node(&Identifier::with_loop(Uuid::new_v4(), node), &trajectory(), &generator())
      .unwrap();
    assert_eq!(arena.len(), 2);
  }

  #[test]
  pub fn remove_missing_is_rejected() {
    let mut arena = NodeArena::new();
    assert!(matches!(
      arena.remove_node(&Identifier::new(Uuid::new_v4())),
      Err(SequencerError::NodeNotFound { .. })
    ));
  }

  #[test]
  pub fn clear_drops_everything() {
    let mut arena = NodeArena::new();
    arena.add_node(&Identifier::new(Uuid::new_v4()), &trajectory(), &generator()).unwrap();
    arena.clear();
    assert!(arena.is_empty());
  }
}
