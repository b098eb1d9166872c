use serde::{Deserialize, Serialize};
use tracing::warn;

/// One method of an RPC interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSchema {
    pub ordinal: u16,
    pub name: String,
}

/// An already-compiled RPC interface: its id, display name and methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSchema {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodSchema>,
}

impl InterfaceSchema {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        InterfaceSchema {
            id,
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Append a method; its ordinal is its position. Ordinals are `u16`, so
    /// an interface holds at most 65536 methods; past that the method is
    /// not added.
    pub fn with_method(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        match u16::try_from(self.methods.len()) {
            Ok(ordinal) => self.methods.push(MethodSchema { ordinal, name }),
            Err(_) => warn!(interface = %self.name, method = %name, "ordinal space exhausted, method dropped"),
        }
        self
    }

    pub fn method(&self, ordinal: u16) -> Option<&MethodSchema> {
        self.methods.iter().find(|m| m.ordinal == ordinal)
    }

    pub fn method_by_name(&self, name: &str) -> Option<&MethodSchema> {
        self.methods.iter().find(|m| m.name == name)
    }
}
