use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::io;
use crate::io::dummy::DummyIO;
use crate::io::gpio::driver::{DriverError, GpioDriver};
use crate::io::gpio::PinConfiguration;

pub enum ModifyState {
    /// Drive an input pin to a level, as if from outside.
    SetLevel(i64, bool),
    FailOpen(bool),
    FailIo(bool),
    FailClose(bool),
}

/// Number of calls the driver has seen, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverCalls {
    pub open: usize,
    pub write: usize,
    pub read: usize,
    pub close: usize,
}

#[derive(Default)]
struct DummyState {
    levels: HashMap<i64, bool>,
    calls: DriverCalls,
    fail_open: bool,
    fail_io: bool,
    fail_close: bool,
}

/// In-memory driver. A read returns the last level written to the pin.
pub struct Dummy {
    receiver: Mutex<Receiver<ModifyState>>,
    state: Mutex<DummyState>,
}

#[derive(Debug)]
pub struct DummySession {
    pin: i64,
}

impl DummyIO for Dummy {
    type MessageType = ModifyState;
    type Config = ();

    fn new(receiver: Receiver<Self::MessageType>, _config: &Self::Config) -> Self {
        Dummy {
            receiver: Mutex::new(receiver),
            state: Mutex::new(DummyState::default()),
        }
    }
}

impl Dummy {
    pub fn calls(&self) -> DriverCalls {
        self.update_state().calls
    }

    pub fn level(&self, pin: i64) -> Option<bool> {
        self.update_state().levels.get(&pin).copied()
    }

    fn update_state(&self) -> MutexGuard<'_, DummyState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        io::dummy::read_all(&receiver, |message| match message {
            ModifyState::SetLevel(pin, level) => {
                state.levels.insert(pin, level);
            }
            ModifyState::FailOpen(fail) => state.fail_open = fail,
            ModifyState::FailIo(fail) => state.fail_io = fail,
            ModifyState::FailClose(fail) => state.fail_close = fail,
        });
        state
    }
}

impl GpioDriver for Dummy {
    type Session = DummySession;

    fn open(&self, configuration: &PinConfiguration) -> Result<DummySession, DriverError> {
        let mut state = self.update_state();
        state.calls.open += 1;
        if state.fail_open {
            return Err(DriverError::Other(format!("Failed to open pin {}", configuration.pin())));
        }
        debug!("Dummy opened {}", configuration);
        Ok(DummySession {
            pin: configuration.pin(),
        })
    }

    fn write(&self, session: &mut DummySession, value: bool) -> Result<(), DriverError> {
        let mut state = self.update_state();
        state.calls.write += 1;
        if state.fail_io {
            return Err(DriverError::Other(format!("Failed to write pin {}", session.pin)));
        }
        debug!("Dummy setting pin {} to {}", session.pin, value);
        state.levels.insert(session.pin, value);
        Ok(())
    }

    fn read(&self, session: &mut DummySession) -> Result<bool, DriverError> {
        let mut state = self.update_state();
        state.calls.read += 1;
        if state.fail_io {
            return Err(DriverError::Other(format!("Failed to read pin {}", session.pin)));
        }
        Ok(state.levels.get(&session.pin).copied().unwrap_or(false))
    }

    fn close(&self, session: &mut DummySession) -> Result<(), DriverError> {
        let mut state = self.update_state();
        state.calls.close += 1;
        if state.fail_close {
            return Err(DriverError::Other(format!("Failed to close pin {}", session.pin)));
        }
        debug!("Dummy closed pin {}", session.pin);
        Ok(())
    }
}
