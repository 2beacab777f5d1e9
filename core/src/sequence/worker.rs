use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use failure::Fail;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::midi::events::MidiEvent;
use crate::sequence::Sequencer;
use crate::time::TicksTime;

#[derive(Debug, Fail)]
pub enum WorkerError {
  #[fail(display = "Failed to create the Sequencer thread: {}", cause)]
  Start { cause: String },

  #[fail(display = "Failed to join the Sequencer thread")]
  Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  Play,
  Pause,
  Stop,
  Reset,
  BeginJog,
  Jog(TicksTime),
  JogTo {
    bar: u64,
    beat: u64,
    subbeat: u64,
  },
  EndJog,
  ToggleRecording,
  Arm(Uuid),
}

/// Everything that touches a session goes through its worker, one message at a time
pub enum Protocol {
  Stop,

  Tick(TicksTime),

  Packet {
    track: Uuid,
    packet: Vec<u8>,
  },

  Transport(Command),

  BeginLoop {
    repetitions: i32,
    repeat_delay: TicksTime,
  },

  EndLoop,

  AddEvents {
    track: Uuid,
    events: Vec<MidiEvent>,
  },

  Inspect(Box<dyn FnOnce(&mut Sequencer) + Send>),
}

struct SequencerThread {
  sequencer: Sequencer,
}

impl SequencerThread {
  fn new(sequencer: Sequencer) -> SequencerThread {
    SequencerThread { sequencer }
  }

  fn handle_messages(mut self, protocol_rx: Receiver<Protocol>) -> Sequencer {
    for msg in protocol_rx.iter() {
      match msg {
        Protocol::Stop => break,

        Protocol::Tick(elapsed) => self.sequencer.tick(elapsed),

        Protocol::Packet { track, packet } => {
          if let Err(err) = self.sequencer.receive_packet(&track, &packet) {
            warn!("Dropped packet {:02x?}: {}", packet, err);
          }
        }

        Protocol::Transport(command) => {
          debug!("Transport command {:?}", command);
          if let Err(err) = self.transport(command.clone()) {
            error!("Transport command {:?} failed: {}", command, err);
          }
        }

        Protocol::BeginLoop {
          repetitions,
          repeat_delay,
        } => match self.sequencer.begin_loop(repetitions, repeat_delay) {
          Ok(identifier) => info!("Capturing loop {}", identifier),
          Err(err) => error!("Failed to begin a loop: {}", err),
        },

        Protocol::EndLoop => match self.sequencer.end_loop() {
          Ok(identifier) => info!("Loop {} added", identifier),
          Err(err) => error!("Failed to end the loop: {}", err),
        },

        Protocol::AddEvents { track, events } => {
          if let Err(err) = self.sequencer.add_events(&track, events) {
            error!("Failed to add events to track {}: {}", track, err);
          }
        }

        Protocol::Inspect(inspect) => inspect(&mut self.sequencer),
      }
    }
    self.sequencer
  }

  fn transport(&mut self, command: Command) -> Result<()> {
    let sequencer = &mut self.sequencer;
    match command {
      Command::Play => sequencer.play(),
      Command::Pause => sequencer.pause(),
      Command::Stop => sequencer.stop(),
      Command::Reset => sequencer.reset(),
      Command::BeginJog => sequencer.begin_jog(),
      Command::Jog(target) => sequencer.jog(target),
      Command::JogTo { bar, beat, subbeat } => sequencer.jog_to(bar, beat, subbeat),
      Command::EndJog => sequencer.end_jog(),
      Command::ToggleRecording => {
        sequencer.toggle_recording();
        Ok(())
      }
      Command::Arm(track) => sequencer.arm(&track),
    }
  }
}

/// Owns a session on its own thread
pub struct SequencerWorker {
  handler: JoinHandle<Sequencer>,
  protocol_tx: Sender<Protocol>,
}

impl SequencerWorker {
  pub const CHANNEL_CAPACITY: usize = 16 * 1024;
  pub fn new_channel() -> (Sender<Protocol>, Receiver<Protocol>) {
    crossbeam_channel::bounded::<Protocol>(Self::CHANNEL_CAPACITY)
  }

  pub fn start(sequencer: Sequencer) -> std::result::Result<SequencerWorker, WorkerError> {
    info!("Starting Sequencer ...");

    let (protocol_tx, protocol_rx) = Self::new_channel();
    thread::Builder::new()
      .name("sequencer".into())
      .spawn(move || SequencerThread::new(sequencer).handle_messages(protocol_rx))
      .map_err(|err| WorkerError::Start {
        cause: err.to_string(),
      })
      .map(|handler| SequencerWorker {
        handler,
        protocol_tx,
      })
  }

  pub fn sender(&self) -> Sender<Protocol> {
    self.protocol_tx.clone()
  }

  /// Stops the thread and hands the session back
  pub fn stop(self) -> std::result::Result<Sequencer, WorkerError> {
    info!("Stopping Sequencer ...");

    self
      .protocol_tx
      .send(Protocol::Stop)
      .map_err(|_| WorkerError::Stop)
      .and_then(|()| self.handler.join().map_err(|_| WorkerError::Stop))
  }
}

#[cfg(test)]
mod test {

  use crossbeam_channel::unbounded;

  use super::*;
  use crate::config::SequencerConfig;
  use crate::midi::events::{Generator, Identifier, NodeEvent, Trajectory};
  use crate::sequence::node::NodeArena;
  use crate::time::{BarBeatTime, Signature};
  use crate::transport::TransportState;

  fn at(ticks: u64) -> BarBeatTime {
    BarBeatTime::from_ticks(TicksTime::new(ticks), Signature::default(), 480)
  }

  #[test]
  pub fn messages_are_applied_in_order() {
    let mut sequencer = Sequencer::new(&SequencerConfig::default(), Box::new(NodeArena::new()));
    let track = sequencer.add_instrument_track("worker");

    let worker = SequencerWorker::start(sequencer).unwrap();
    let tx = worker.sender();
    tx.send(Protocol::Transport(Command::Arm(track))).unwrap();
    tx.send(Protocol::Transport(Command::ToggleRecording)).unwrap();
    tx.send(Protocol::Transport(Command::Play)).unwrap();
    tx.send(Protocol::AddEvents {
      track,
      events: vec![NodeEvent::add(
        at(5),
        Identifier::new(Uuid::new_v4()),
        Trajectory::new(0.0, 0.0, 0.0, 0.0),
        Generator::new(0, 60, 100, 10),
      )
      .into()],
    })
    .unwrap();
    tx.send(Protocol::Tick(TicksTime::new(10))).unwrap();
    tx.send(Protocol::Packet {
      track,
      packet: vec![0x90, 60, 100],
    })
    .unwrap();
    tx.send(Protocol::Packet {
      track,
      packet: vec![0x12],
    })
    .unwrap();

    let (state_tx, state_rx) = unbounded();
    tx.send(Protocol::Inspect(Box::new(move |sequencer: &mut Sequencer| {
      state_tx.send(sequencer.state()).unwrap();
    })))
    .unwrap();
    assert_eq!(state_rx.recv().unwrap(), TransportState::Playing);

    let sequencer = worker.stop().unwrap();
    assert_eq!(sequencer.transport().position(), TicksTime::new(10));
    let track = sequencer.track(&track).unwrap();
    assert_eq!(track.events().channel_events().len(), 1);
    assert_eq!(track.events().node_events().len(), 1);
  }

  #[test]
  pub fn failed_commands_keep_the_worker_alive() {
    let sequencer = Sequencer::new(&SequencerConfig::default(), Box::new(NodeArena::new()));
    let worker = SequencerWorker::start(sequencer).unwrap();
    let tx = worker.sender();
    tx.send(Protocol::Transport(Command::Jog(TicksTime::new(10)))).unwrap();
    tx.send(Protocol::EndLoop).unwrap();
    tx.send(Protocol::Transport(Command::BeginJog)).unwrap();
    tx.send(Protocol::Transport(Command::Jog(TicksTime::new(10)))).unwrap();
    tx.send(Protocol::Transport(Command::JogTo {
      bar: 1,
      beat: 9,
      subbeat: 1,
    }))
    .unwrap();
    let sequencer = worker.stop().unwrap();
    assert!(sequencer.transport().is_jogging());
    assert_eq!(sequencer.transport().position(), TicksTime::new(10));
  }
}
