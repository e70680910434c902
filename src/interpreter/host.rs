use super::environment::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Most arguments an external function receives.
pub const MAX_CALL_ARGS: usize = 5;
/// Most index arguments an external variable access receives.
pub const MAX_ACCESS_ARGS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no external named '{0}'")]
    Unknown(String),
    #[error("{0}")]
    Failed(String),
}

/// The side of the engine that belongs to the embedding program.
///
/// Calls to procedures the program never declares, and accesses to variables it never
/// declares, are routed here by name.
pub trait Host {
    fn external_call(&mut self, name: &str, args: &[Value]) -> Result<Value, DispatchError>;

    fn external_get(&mut self, name: &str, args: &[Value]) -> Result<Value, DispatchError>;

    fn external_set(&mut self, value: Value, name: &str, args: &[Value])
        -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Call { name: String, args: Vec<Value> },
    Set {
        name: String,
        args: Vec<Value>,
        value: Value,
    },
}

// `leds[2]` for an indexed access, the bare name otherwise
fn access_key(name: &str, args: &[Value]) -> String {
    if args.is_empty() {
        return name.to_string();
    }
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    format!("{name}[{}]", args.join(", "))
}

impl std::fmt::Display for HostEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            HostEvent::Call { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "call {name}({})", args.join(", "))
            }
            HostEvent::Set { name, args, value } => {
                write!(f, "set {} := {value}", access_key(name, args))
            }
        }
    }
}

/// A host that accepts every call and assignment and remembers them in order.
///
/// Assigned values are kept, so reading an external variable returns the last value set.
/// Each index of an indexed variable is a separate slot.
/// Calls return `0` unless a result was registered with `returning`.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    events: Vec<HostEvent>,
    variables: HashMap<String, Value>,
    results: HashMap<String, Value>,
    echo: bool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that also prints each event to stdout as it happens.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    pub fn returning(mut self, name: &str, value: Value) -> Self {
        self.results.insert(name.to_string(), value);
        self
    }

    pub fn with_variable(mut self, name: &str, value: Value) -> Self {
        self.variables.insert(name.to_string(), value);
        self
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    fn record(&mut self, event: HostEvent) {
        if self.echo {
            println!("{event}");
        }
        self.events.push(event);
    }
}

impl Host for RecordingHost {
    fn external_call(&mut self, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
        self.record(HostEvent::Call {
            name: name.to_string(),
            args: args.to_vec(),
        });
        Ok(self.results.get(name).cloned().unwrap_or(Value::Int(0)))
    }

    fn external_get(&mut self, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
        let key = access_key(name, args);
        self.variables
            .get(&key)
            .cloned()
            .ok_or(DispatchError::Unknown(key))
    }

    fn external_set(
        &mut self,
        value: Value,
        name: &str,
        args: &[Value],
    ) -> Result<(), DispatchError> {
        self.record(HostEvent::Set {
            name: name.to_string(),
            args: args.to_vec(),
            value: value.clone(),
        });
        self.variables.insert(access_key(name, args), value);
        Ok(())
    }
}
