use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Broad classification of what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultNature {
    Precondition,
    LocalBug,
    OsError,
    NetworkFailure,
    Other,
}

/// Whether retrying the failed operation could succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultDurability {
    Permanent,
    Temporary,
    Overloaded,
}

impl fmt::Display for FaultNature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultNature::Precondition => "precondition",
            FaultNature::LocalBug => "local_bug",
            FaultNature::OsError => "os_error",
            FaultNature::NetworkFailure => "network_failure",
            FaultNature::Other => "other",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for FaultDurability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultDurability::Permanent => "permanent",
            FaultDurability::Temporary => "temporary",
            FaultDurability::Overloaded => "overloaded",
        };
        write!(f, "{}", s)
    }
}

/// The original host exception a fault was derived from.
///
/// Kept type-erased so the native layer never needs to know the host's
/// exception type; the translator downcasts it back on re-raise.
#[derive(Clone)]
pub struct HostPayload(Rc<dyn Any>);

impl HostPayload {
    pub fn new<E: Any>(exception: E) -> Self {
        HostPayload(Rc::new(exception))
    }

    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for HostPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostPayload(..)")
    }
}

/// A native RPC error record crossing the host boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    pub nature: FaultNature,
    pub durability: FaultDurability,
    pub file: String,
    pub line: u32,
    pub description: String,
    #[serde(skip)]
    origin: Option<HostPayload>,
}

impl Fault {
    pub fn new(
        nature: FaultNature,
        durability: FaultDurability,
        file: impl Into<String>,
        line: u32,
        description: impl Into<String>,
    ) -> Self {
        Fault {
            nature,
            durability,
            file: file.into(),
            line,
            description: description.into(),
            origin: None,
        }
    }

    /// A permanent fault of nature `Other`, the classification every
    /// host-raised error receives.
    pub fn other(file: impl Into<String>, line: u32, description: impl Into<String>) -> Self {
        Self::new(
            FaultNature::Other,
            FaultDurability::Permanent,
            file,
            line,
            description,
        )
    }

    pub fn disconnected(file: impl Into<String>, line: u32, description: impl Into<String>) -> Self {
        Self::new(
            FaultNature::NetworkFailure,
            FaultDurability::Temporary,
            file,
            line,
            description,
        )
    }

    pub fn unimplemented(file: impl Into<String>, line: u32, description: impl Into<String>) -> Self {
        Self::new(
            FaultNature::Precondition,
            FaultDurability::Permanent,
            file,
            line,
            description,
        )
    }

    /// Attach the host exception this fault was constructed from.
    pub fn with_origin(mut self, origin: HostPayload) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn origin(&self) -> Option<&HostPayload> {
        self.origin.as_ref()
    }

    /// True when the fault carries a host exception that should be restored
    /// as-is when it reaches host code again.
    pub fn is_reraise(&self) -> bool {
        self.origin.is_some()
    }
}

impl PartialEq for Fault {
    fn eq(&self, other: &Self) -> bool {
        self.nature == other.nature
            && self.durability == other.durability
            && self.file == other.file
            && self.line == other.line
            && self.description == other.description
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({}, {})",
            self.file, self.line, self.description, self.nature, self.durability
        )
    }
}

impl std::error::Error for Fault {}

/// Failures setting up the bridge itself, as opposed to faults flowing
/// through promises.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to start event loop: {0}")]
    EventLoop(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Config(format!("JSON error: {}", err))
    }
}
