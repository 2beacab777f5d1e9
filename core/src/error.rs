use failure::Fail;
use uuid::Uuid;

#[derive(Debug, Fail)]
pub enum SequencerError {
  #[fail(display = "Malformed variable length quantity")]
  MalformedVlq,

  #[fail(display = "Value {} does not fit in a variable length quantity", value)]
  VlqOutOfRange { value: u32 },

  #[fail(display = "Invalid header: {}", cause)]
  InvalidHeader { cause: String },

  #[fail(display = "Invalid length: expected {} bytes but found {}", expected, actual)]
  InvalidLength { expected: usize, actual: usize },

  #[fail(display = "File structurally unsound: {}", cause)]
  FileStructurallyUnsound { cause: String },

  #[fail(display = "Unsupported event: {}", cause)]
  UnsupportedEvent { cause: String },

  #[fail(display = "I/O failure: {}", cause)]
  ReadFailure { cause: String },

  #[fail(display = "Node already connected: {}", identifier)]
  NodeAlreadyConnected { identifier: Uuid },

  #[fail(display = "Node not found: {}", identifier)]
  NodeNotFound { identifier: Uuid },

  #[fail(display = "Not permitted: {}", cause)]
  NotPermitted { cause: String },

  #[fail(display = "Invalid bar beat time: {}", cause)]
  InvalidBarBeatTime { cause: String },

  #[fail(display = "Track not found: {}", id)]
  TrackNotFound { id: Uuid },
}

impl SequencerError {
  pub(crate) fn unsupported<T: Into<String>>(cause: T) -> SequencerError {
    SequencerError::UnsupportedEvent {
      cause: cause.into(),
    }
  }

  pub(crate) fn not_permitted<T: Into<String>>(cause: T) -> SequencerError {
    SequencerError::NotPermitted {
      cause: cause.into(),
    }
  }

  pub(crate) fn unsound<T: Into<String>>(cause: T) -> SequencerError {
    SequencerError::FileStructurallyUnsound {
      cause: cause.into(),
    }
  }
}

pub type Result<T> = std::result::Result<T, SequencerError>;
