use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

use failure;
use failure::{Error, Fail};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use sequencer_core::config::Config;
use sequencer_core::sequence::worker::Command;
use sequencer_core::sequence::{Protocol, Sequencer, SequencerWorker};
use sequencer_core::time::{Tempo, TicksTime};
use sequencer_core::transport::{ClockSource, ThreadClock, TransportEvent};

mod nodes;
use crate::nodes::LoggingNodes;

const SEQUENCER_CONFIG: &str = "SEQUENCER_CONFIG";
const DEFAULT_SEQUENCER_CONFIG: &str = "sequencer.toml";

const SEQUENCER_LOG_CONFIG: &str = "SEQUENCER_LOG_CONFIG";
const DEFAULT_SEQUENCER_LOG_CONFIG: &str = "log4rs.yaml";

const LOG_PATTERN: &str = "{d(%H:%M:%S%.3f)} {h({l:5})} {t} - {m}{n}";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },

  #[fail(display = "The sequencer thread is gone")]
  SequencerGone,
}

fn main() -> Result<(), Error> {
  init_logging()?;

  let config = init_config()?;

  let (mut sequencer, tempo_rx) = init_sequencer(&config)?;

  let end = playback_end(&sequencer, &config);
  let tempo = sequencer.transport().tempo();
  let division = sequencer.division();
  info!("Playing {} ticks at {:.2} bpm", end, tempo.bpm());

  sequencer.play()?;
  let worker = SequencerWorker::start(sequencer)?;

  let mut clock = init_clock(&worker, tempo, division);
  clock.start()?;

  wait_for(end, &mut clock, &tempo_rx)?;

  clock.stop()?;

  worker
    .sender()
    .send(Protocol::Transport(Command::Stop))
    .map_err(|_| MainError::SequencerGone)?;

  let mut sequencer = worker.stop()?;

  if let Some(output) = config.playback.output.as_ref() {
    info!("Saving the session to {} ...", output);
    sequencer.save(output)?;
  }

  Ok(())
}

fn init_logging() -> Result<(), Error> {
  let log_config_path = std::env::var(SEQUENCER_LOG_CONFIG)
    .unwrap_or_else(|_| DEFAULT_SEQUENCER_LOG_CONFIG.to_string());

  if Path::new(log_config_path.as_str()).exists() {
    log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
      MainError::LoggingInit {
        cause: err.to_string(),
      }
    })?;
  } else {
    let stdout = ConsoleAppender::builder()
      .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
      .build();
    let log_config = LogConfig::builder()
      .appender(Appender::builder().build("stdout", Box::new(stdout)))
      .build(Root::builder().appender("stdout").build(LevelFilter::Info))
      .map_err(|err| MainError::LoggingInit {
        cause: err.to_string(),
      })?;
    log4rs::init_config(log_config).map_err(|err| MainError::LoggingInit {
      cause: err.to_string(),
    })?;
    warn!("{} not found, logging to the console", log_config_path);
  }

  Ok(())
}

fn init_config() -> Result<Config, Error> {
  let config_path =
    std::env::var(SEQUENCER_CONFIG).unwrap_or_else(|_| DEFAULT_SEQUENCER_CONFIG.to_string());

  if !Path::new(config_path.as_str()).exists() {
    warn!("{} not found, using the default configuration", config_path);
    return Ok(Config::default());
  }

  info!("Loading configuration from {} ...", config_path);
  let config = Config::from_file(config_path.as_str())?;
  debug!("{:#?}", config);

  Ok(config)
}

/// Loads the file given on the command line, or starts an empty session
fn init_sequencer(config: &Config) -> Result<(Sequencer, Receiver<Tempo>), Error> {
  let nodes = Box::new(LoggingNodes::new());

  let mut sequencer = match std::env::args().nth(1) {
    Some(path) => {
      info!("Loading {} ...", path);
      Sequencer::load(path, &config.sequencer, nodes)?
    }
    None => {
      info!("Starting an empty session ...");
      Sequencer::new(&config.sequencer, nodes)
    }
  };

  for track in sequencer.tracks() {
    info!(
      "Track {:?} with {} events and {} loops",
      track.name(),
      track.events().len(),
      track.loops().count()
    );
  }

  let (tempo_tx, tempo_rx) = crossbeam_channel::unbounded::<Tempo>();
  sequencer.add_listener(Box::new(move |event: &TransportEvent| match event {
    TransportEvent::Tempo(tempo) => drop(tempo_tx.send(*tempo)),
    TransportEvent::State(state) => info!("Transport {:?}", state),
    _ => {}
  }));

  Ok((sequencer, tempo_rx))
}

fn init_clock(worker: &SequencerWorker, tempo: Tempo, division: u16) -> ThreadClock {
  let protocol_tx = worker.sender();
  ThreadClock::new(
    tempo,
    division,
    Box::new(move |elapsed| drop(protocol_tx.send(Protocol::Tick(elapsed)))),
  )
}

fn playback_end(sequencer: &Sequencer, config: &Config) -> TicksTime {
  let beats_per_bar = u64::from(sequencer.transport().signature().beats_per_bar().max(1));
  let ticks_per_bar = TicksTime::new(u64::from(sequencer.division())) * beats_per_bar;
  sequencer
    .session_end()
    .max(ticks_per_bar * u64::from(config.playback.bars))
}

/// Keeps the clock in step with tempo changes until `end` is reached
fn wait_for(
  end: TicksTime,
  clock: &mut ThreadClock,
  tempo_rx: &Receiver<Tempo>,
) -> Result<(), Error> {
  while clock.ticks() < end {
    match tempo_rx.recv_timeout(POLL_INTERVAL) {
      Ok(tempo) => clock.set_tempo(tempo)?,
      Err(RecvTimeoutError::Timeout) => {}
      Err(RecvTimeoutError::Disconnected) => return Err(MainError::SequencerGone.into()),
    }
  }
  Ok(())
}
