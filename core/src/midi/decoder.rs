use crate::error::{Result, SequencerError};
use crate::midi::events::channel::Status;
use crate::midi::events::{meta, ChannelEvent, MetaData, MidiEvent};
use crate::midi::vlq;
use crate::time::{BarBeatTime, Signature, TicksTime};

/// Walks the event stream of a track chunk: `(VLQ delta, event bytes)` pairs.
///
/// Absolute times are accumulated from the deltas and converted into bar/beat time
/// with the time signature in effect at that point of the track. The first error
/// stops the iteration.
pub struct Decoder<'a> {
  data: &'a [u8],
  pos: usize,
  running_status: Option<u8>,
  ticks: TicksTime,
  signature: Signature,
  signatures: &'a [(TicksTime, Signature)],
  division: u16,
  failed: bool,
}

impl<'a> Decoder<'a> {
  pub fn new(data: &'a [u8], division: u16) -> Decoder<'a> {
    Decoder::with_signatures(data, division, &[])
  }

  /// Decodes a track whose time signatures live in another track, as the
  /// instrument tracks of a multi-track file do. `signatures` is sorted by time.
  pub fn with_signatures(
    data: &'a [u8],
    division: u16,
    signatures: &'a [(TicksTime, Signature)],
  ) -> Decoder<'a> {
    Decoder {
      data,
      pos: 0,
      running_status: None,
      ticks: TicksTime::zero(),
      signature: Signature::default(),
      signatures,
      division,
      failed: false,
    }
  }

  pub fn ticks(&self) -> TicksTime {
    self.ticks
  }

  pub fn signature(&self) -> Signature {
    self.signature
  }

  fn remaining(&self) -> &'a [u8] {
    &self.data[self.pos..]
  }

  fn take(&mut self, len: usize) -> Result<&'a [u8]> {
    let remaining = self.remaining();
    if remaining.len() < len {
      return Err(SequencerError::InvalidLength {
        expected: len,
        actual: remaining.len(),
      });
    }
    self.pos += len;
    Ok(&remaining[..len])
  }

  pub fn decode_meta(&mut self, delta: TicksTime) -> Result<MidiEvent> {
    let remaining = self.remaining();
    if remaining.len() < 2 {
      return Err(SequencerError::InvalidLength {
        expected: 3,
        actual: remaining.len(),
      });
    }
    let (declared, consumed) = vlq::decode(&remaining[2..])?;
    let header = 2 + consumed;
    let available = remaining.len() - header;
    if declared as usize > available {
      return Err(SequencerError::InvalidLength {
        expected: declared as usize,
        actual: available,
      });
    }
    let bytes = self.take(header + declared as usize)?;
    self.running_status = None;
    MidiEvent::parse(delta, bytes)
  }

  pub fn decode_channel(&mut self, delta: TicksTime, status_byte: u8) -> Result<MidiEvent> {
    let status = Status::from_byte(status_byte)?;
    let bytes = self.take(status.kind.byte_count())?;
    self.running_status = Some(status_byte);
    MidiEvent::parse(delta, bytes)
  }

  pub fn decode_running(&mut self, delta: TicksTime) -> Result<MidiEvent> {
    let status_byte = self.running_status.ok_or_else(|| {
      SequencerError::unsupported(format!(
        "data byte 0x{:02X} without a running status",
        self.remaining()[0]
      ))
    })?;
    let status = Status::from_byte(status_byte)?;
    let data = self.take(status.kind.byte_count() - 1)?;
    let mut bytes = Vec::with_capacity(3);
    bytes.push(status_byte);
    bytes.extend_from_slice(data);
    ChannelEvent::parse(delta, &bytes).map(MidiEvent::Channel)
  }

  fn decode_next(&mut self) -> Result<MidiEvent> {
    let (delta, consumed) = vlq::decode(self.remaining())?;
    self.pos += consumed;
    let delta = TicksTime::new(u64::from(delta));

    let first = *self.remaining().first().ok_or(SequencerError::InvalidLength {
      expected: 1,
      actual: 0,
    })?;

    let event = match first {
      meta::META_STATUS => self.decode_meta(delta)?,
      byte if byte & 0x80 != 0 => self.decode_channel(delta, byte)?,
      _ => self.decode_running(delta)?,
    };

    self.ticks += delta;
    while let Some((at, signature)) = self.signatures.first() {
      if *at > self.ticks {
        break;
      }
      self.signature = *signature;
      self.signatures = &self.signatures[1..];
    }
    let time = BarBeatTime::from_ticks(self.ticks, self.signature, u64::from(self.division));
    let event = event.with_time(time);

    if let MidiEvent::Meta(meta_event) = &event {
      if let MetaData::TimeSignature { signature, .. } = meta_event.data {
        self.signature = signature;
      }
    }

    Ok(event)
  }
}

impl<'a> Iterator for Decoder<'a> {
  type Item = Result<MidiEvent>;

  fn next(&mut self) -> Option<Result<MidiEvent>> {
    if self.failed || self.pos >= self.data.len() {
      return None;
    }
    let result = self.decode_next();
    self.failed = result.is_err();
    Some(result)
  }
}
