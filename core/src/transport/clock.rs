use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use crate::error::{Result, SequencerError};
use crate::time::{ClockTime, Tempo, TicksTime};

/// Source of monotonically increasing ticks
pub trait ClockSource {
  /// Rewinds to zero and starts ticking
  fn start(&mut self) -> Result<()>;

  fn stop(&mut self) -> Result<()>;

  fn reset(&mut self) -> Result<()>;

  /// Starts ticking from where it was stopped
  fn resume(&mut self) -> Result<()>;

  fn set_tempo(&mut self, tempo: Tempo) -> Result<()>;

  fn ticks(&self) -> TicksTime;

  fn is_running(&self) -> bool;
}

/// Receives the number of ticks elapsed since the previous call
pub type TickCallback = Box<dyn FnMut(TicksTime) + Send>;

enum Command {
  Tempo(Tempo),
  Stop,
}

struct Running {
  command_tx: Sender<Command>,
  handler: JoinHandle<TickCallback>,
}

/// Emits ticks from its own thread at `tempo * division` ticks per minute
pub struct ThreadClock {
  tempo: Tempo,
  division: u16,
  resolution: Duration,
  ticks: Arc<AtomicU64>,
  callback: Option<TickCallback>,
  running: Option<Running>,
}

impl ThreadClock {
  pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(1);

  pub fn new(tempo: Tempo, division: u16, callback: TickCallback) -> ThreadClock {
    ThreadClock {
      tempo,
      division: division.max(1),
      resolution: Self::DEFAULT_RESOLUTION,
      ticks: Arc::new(AtomicU64::new(0)),
      callback: Some(callback),
      running: None,
    }
  }

  pub fn with_resolution(mut self, resolution: Duration) -> ThreadClock {
    self.resolution = resolution;
    self
  }

  pub fn tempo(&self) -> Tempo {
    self.tempo
  }
}

struct ClockThread {
  command_rx: Receiver<Command>,
  ticks: Arc<AtomicU64>,
  tempo: Tempo,
  division: u16,
  resolution: Duration,
  callback: TickCallback,
}

impl ClockThread {
  fn run(mut self) -> TickCallback {
    let mut base_instant = Instant::now();
    let mut base_ticks = TicksTime::new(self.ticks.load(Ordering::SeqCst));

    loop {
      match self.command_rx.recv_timeout(self.resolution) {
        Ok(Command::Tempo(tempo)) => {
          base_instant = Instant::now();
          base_ticks = TicksTime::new(self.ticks.load(Ordering::SeqCst));
          self.tempo = tempo;
        }
        Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
        Err(RecvTimeoutError::Timeout) => {}
      }

      let elapsed = ClockTime::new(base_instant.elapsed().as_nanos() as u64);
      let target = base_ticks + elapsed.to_ticks(self.tempo, self.division);
      let current = TicksTime::new(self.ticks.load(Ordering::SeqCst));
      if target > current {
        self.ticks.store(target.ticks(), Ordering::SeqCst);
        (self.callback)(target - current);
      }
    }

    self.callback
  }
}

impl ClockSource for ThreadClock {
  fn start(&mut self) -> Result<()> {
    self.reset()?;
    self.resume()
  }

  fn stop(&mut self) -> Result<()> {
    if let Some(Running {
      command_tx,
      handler,
    }) = self.running.take()
    {
      info!("Stopping clock ...");
      drop(command_tx.send(Command::Stop));
      let callback = handler
        .join()
        .map_err(|_| SequencerError::not_permitted("the clock thread panicked"))?;
      self.callback = Some(callback);
    }
    Ok(())
  }

  fn reset(&mut self) -> Result<()> {
    if self.running.is_some() {
      return Err(SequencerError::not_permitted(
        "cannot reset a running clock",
      ));
    }
    self.ticks.store(0, Ordering::SeqCst);
    Ok(())
  }

  fn resume(&mut self) -> Result<()> {
    if self.running.is_some() {
      return Ok(());
    }
    let callback = self
      .callback
      .take()
      .ok_or_else(|| SequencerError::not_permitted("the clock callback was lost"))?;

    info!(
      "Starting clock at {:.2} bpm, {} ticks per beat ...",
      self.tempo.bpm(),
      self.division
    );

    let (command_tx, command_rx) = crossbeam_channel::unbounded::<Command>();
    let clock_thread = ClockThread {
      command_rx,
      ticks: self.ticks.clone(),
      tempo: self.tempo,
      division: self.division,
      resolution: self.resolution,
      callback,
    };

    let handler = thread::Builder::new()
      .name("clock".into())
      .spawn(move || clock_thread.run())
      .map_err(|err| SequencerError::not_permitted(format!("failed to start the clock: {}", err)))?;

    self.running = Some(Running {
      command_tx,
      handler,
    });
    Ok(())
  }

  fn set_tempo(&mut self, tempo: Tempo) -> Result<()> {
    self.tempo = tempo;
    if let Some(running) = self.running.as_ref() {
      debug!("Clock tempo set to {:.2} bpm", tempo.bpm());
      running
        .command_tx
        .send(Command::Tempo(tempo))
        .map_err(|_| SequencerError::not_permitted("the clock thread is gone"))?;
    }
    Ok(())
  }

  fn ticks(&self) -> TicksTime {
    TicksTime::new(self.ticks.load(Ordering::SeqCst))
  }

  fn is_running(&self) -> bool {
    self.running.is_some()
  }
}

impl Drop for ThreadClock {
  fn drop(&mut self) {
    if let Err(err) = self.stop() {
      warn!("Failed to stop the clock: {}", err);
    }
  }
}

/// Clock driven by hand, for tests and external time sources
#[derive(Debug, Clone)]
pub struct ManualClock {
  tempo: Tempo,
  ticks: TicksTime,
  running: bool,
}

impl ManualClock {
  pub fn new(tempo: Tempo) -> ManualClock {
    ManualClock {
      tempo,
      ticks: TicksTime::zero(),
      running: false,
    }
  }

  pub fn tempo(&self) -> Tempo {
    self.tempo
  }

  /// Returns the elapsed ticks to feed the session, if the clock is running
  pub fn advance(&mut self, ticks: TicksTime) -> Option<TicksTime> {
    if self.running {
      self.ticks += ticks;
      Some(ticks)
    } else {
      None
    }
  }
}

impl ClockSource for ManualClock {
  fn start(&mut self) -> Result<()> {
    self.ticks = TicksTime::zero();
    self.running = true;
    Ok(())
  }

  fn stop(&mut self) -> Result<()> {
    self.running = false;
    Ok(())
  }

  fn reset(&mut self) -> Result<()> {
    self.ticks = TicksTime::zero();
    Ok(())
  }

  fn resume(&mut self) -> Result<()> {
    self.running = true;
    Ok(())
  }

  fn set_tempo(&mut self, tempo: Tempo) -> Result<()> {
    self.tempo = tempo;
    Ok(())
  }

  fn ticks(&self) -> TicksTime {
    self.ticks
  }

  fn is_running(&self) -> bool {
    self.running
  }
}

#[cfg(test)]
mod test {

  use std::sync::Mutex;

  use super::*;

  #[test]
  pub fn manual_clock() {
    let mut clock = ManualClock::new(Tempo::default());
    assert_eq!(clock.advance(TicksTime::new(3)), None);
    clock.start().unwrap();
    assert_eq!(clock.advance(TicksTime::new(3)), Some(TicksTime::new(3)));
    clock.stop().unwrap();
    assert_eq!(clock.advance(TicksTime::new(3)), None);
    clock.resume().unwrap();
    clock.advance(TicksTime::new(2));
    assert_eq!(clock.ticks(), TicksTime::new(5));
    clock.reset().unwrap();
    assert_eq!(clock.ticks(), TicksTime::zero());
  }

  #[test]
  pub fn thread_clock_ticks() {
    let total = Arc::new(Mutex::new(TicksTime::zero()));
    let sink = total.clone();
    // 600 bpm at 100 ticks per beat is 1000 ticks per second
    let mut clock = ThreadClock::new(
      Tempo::new(600.0),
      100,
      Box::new(move |elapsed| *sink.lock().unwrap() += elapsed),
    );

    clock.start().unwrap();
    assert!(clock.is_running());
    assert!(clock.reset().is_err());
    thread::sleep(Duration::from_millis(50));
    clock.stop().unwrap();
    assert!(!clock.is_running());

    let emitted = *total.lock().unwrap();
    assert!(emitted > TicksTime::zero());
    assert_eq!(emitted, clock.ticks());

    thread::sleep(Duration::from_millis(10));
    assert_eq!(*total.lock().unwrap(), emitted);

    clock.resume().unwrap();
    thread::sleep(Duration::from_millis(20));
    clock.stop().unwrap();
    assert!(clock.ticks() > emitted);
  }

  #[test]
  pub fn thread_clock_tempo_change() {
    let mut clock = ThreadClock::new(Tempo::new(120.0), 480, Box::new(|_| {}));
    clock.start().unwrap();
    clock.set_tempo(Tempo::new(60.0)).unwrap();
    assert_eq!(clock.tempo(), Tempo::new(60.0));
    clock.stop().unwrap();
    clock.set_tempo(Tempo::new(90.0)).unwrap();
    assert_eq!(clock.tempo(), Tempo::new(90.0));
  }
}
