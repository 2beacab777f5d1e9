use log::{info, warn};

use sequencer_core::midi::events::{Generator, Identifier, Trajectory};
use sequencer_core::sequence::{NodeArena, NodeManager};
use sequencer_core::Result;

/// Keeps the live nodes and reports their lifecycle on the log
#[derive(Debug, Default)]
pub struct LoggingNodes {
  arena: NodeArena,
}

impl LoggingNodes {
  pub fn new() -> LoggingNodes {
    LoggingNodes::default()
  }
}

impl NodeManager for LoggingNodes {
  fn add_node(
    &mut self,
    identifier: &Identifier,
    trajectory: &Trajectory,
    generator: &Generator,
  ) -> Result<()> {
    self.arena.add_node(identifier, trajectory, generator)?;
    info!(
      "+ node {} at ({:.2}, {:.2}) note {} velocity {} [{} live]",
      identifier,
      trajectory.x,
      trajectory.y,
      generator.note,
      generator.velocity,
      self.arena.len()
    );
    Ok(())
  }

  fn remove_node(&mut self, identifier: &Identifier) -> Result<()> {
    self
      .arena
      .remove_node(identifier)
      .map(|()| info!("- node {} [{} live]", identifier, self.arena.len()))
      .map_err(|err| {
        warn!("{}", err);
        err
      })
  }

  fn clear(&mut self) {
    self.arena.clear();
  }
}
