use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::io::exit::ForceClose;
use crate::io::gpio::driver::{DriverError, GpioDriver};
use crate::io::gpio::{IntoPinValue, PinConfiguration, PinError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Closed,
    Opening,
    Open,
}

/// The result of an operation running on the blocking pool.
///
/// Resolves exactly once. Dropping it does not cancel the operation.
#[must_use = "the operation runs regardless, but its result is lost unless awaited"]
pub struct Completion<T> {
    task: JoinHandle<Result<T, PinError>>,
}

impl<T> Completion<T> {
    fn new(task: JoinHandle<Result<T, PinError>>) -> Self {
        Self { task }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, PinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task).poll(cx).map(|joined| {
            joined.unwrap_or_else(|err| {
                Err(PinError::Driver(DriverError::Other(format!("driver task failed: {}", err))))
            })
        })
    }
}

struct Slot<S> {
    state: PinState,
    session: Option<S>,
    /// Set when an exit shutdown gave up waiting for the open to finish.
    close_on_open: bool,
}

/// State shared between a handle, its in-flight operations and the exit registry.
struct PinCore<D: GpioDriver> {
    configuration: PinConfiguration,
    driver: Arc<D>,
    slot: Mutex<Slot<D::Session>>,
    /// Notified once an open leaves the `Opening` state.
    settled: Condvar,
}

impl<D: GpioDriver> PinCore<D> {
    fn lock_slot(&self) -> MutexGuard<'_, Slot<D::Session>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> PinState {
        self.lock_slot().state
    }

    fn require_open(&self) -> Result<(), PinError> {
        match self.state() {
            PinState::Open => Ok(()),
            PinState::Closed | PinState::Opening => Err(PinError::NotOpen),
        }
    }

    fn open(&self) -> Result<(), PinError> {
        let result = self.driver.open(&self.configuration);
        let mut slot = self.lock_slot();
        let outcome = match result {
            Ok(mut session) if slot.close_on_open => {
                warn!("Pin {} finished opening after exit shutdown, closing it", self.configuration.pin());
                match self.driver.close(&mut session) {
                    Ok(()) => {
                        slot.state = PinState::Closed;
                        Err(PinError::NotOpen)
                    }
                    Err(err) => {
                        slot.session = Some(session);
                        slot.state = PinState::Open;
                        Err(err.into())
                    }
                }
            }
            Ok(session) => {
                slot.session = Some(session);
                slot.state = PinState::Open;
                info!("Opened {}", self.configuration);
                Ok(())
            }
            Err(err) => {
                slot.state = PinState::Closed;
                Err(err.into())
            }
        };
        self.settled.notify_all();
        outcome
    }

    fn with_session<T>(
        &self,
        op: impl FnOnce(&D, &mut D::Session) -> Result<T, DriverError>,
    ) -> Result<T, PinError> {
        let mut slot = self.lock_slot();
        let session = slot.session.as_mut().ok_or(PinError::NotOpen)?;
        Ok(op(self.driver.as_ref(), session)?)
    }

    fn close_sync(&self) -> Result<(), PinError> {
        let mut slot = self.lock_slot();
        let session = slot.session.as_mut().ok_or(PinError::NotOpen)?;
        self.driver.close(session)?;
        slot.session = None;
        slot.state = PinState::Closed;
        debug!("Closed pin {}", self.configuration.pin());
        Ok(())
    }

    fn take_session(&self) -> Result<D::Session, PinError> {
        let mut slot = self.lock_slot();
        let session = slot.session.take().ok_or(PinError::NotOpen)?;
        slot.state = PinState::Closed;
        Ok(session)
    }
}

impl<D: GpioDriver> ForceClose for PinCore<D> {
    fn pin(&self) -> i64 {
        self.configuration.pin()
    }

    fn is_open(&self) -> bool {
        self.state() == PinState::Open
    }

    fn is_opening(&self) -> bool {
        self.state() == PinState::Opening
    }

    fn force_close(&self, settle: Duration) -> Result<bool, PinError> {
        let mut slot = self.lock_slot();
        if slot.state == PinState::Opening {
            debug!("Waiting for pin {} to finish opening", self.configuration.pin());
            slot = self
                .settled
                .wait_timeout_while(slot, settle, |slot| slot.state == PinState::Opening)
                .map(|(slot, _)| slot)
                .unwrap_or_else(|err| err.into_inner().0);
            if slot.state == PinState::Opening {
                warn!("Pin {} is still opening, it will be closed once the open finishes", self.configuration.pin());
                slot.close_on_open = true;
                return Ok(false);
            }
        }
        let Some(session) = slot.session.as_mut() else {
            return Ok(false);
        };
        self.driver.close(session)?;
        slot.session = None;
        slot.state = PinState::Closed;
        debug!("Force closed pin {}", self.configuration.pin());
        Ok(true)
    }
}

impl<D: GpioDriver> Drop for PinCore<D> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut session) = slot.session.take() {
            slot.state = PinState::Closed;
            debug!("Closing pin {} as its handle was dropped", self.configuration.pin());
            if let Err(err) = self.driver.close(&mut session) {
                warn!("Failed to close dropped pin {}: {}", self.configuration.pin(), err);
            }
        }
    }
}

/// Exclusive owner of one opened pin.
///
/// Created by [`crate::io::gpio::Gpio::open`]. Once closed, a handle stays
/// closed; open a new one to use the pin again.
///
/// Two behaviours worth knowing about:
/// * A driver failure while opening leaves the handle `Closed`, with the error
///   delivered through the open completion.
/// * [`PinHandle::close`] marks the handle `Closed` before the driver has
///   confirmed the close, so an immediate second `close` fails with
///   [`PinError::NotOpen`] even while the first is still in flight.
/// * An exit shutdown that runs while the handle is still opening waits for the
///   open to finish and then closes the pin.
pub struct PinHandle<D: GpioDriver> {
    core: Arc<PinCore<D>>,
    runtime: Handle,
}

impl<D: GpioDriver> PinHandle<D> {
    pub(crate) fn new(configuration: PinConfiguration, driver: Arc<D>, runtime: Handle) -> Self {
        Self {
            core: Arc::new(PinCore {
                configuration,
                driver,
                slot: Mutex::new(Slot {
                    state: PinState::Opening,
                    session: None,
                    close_on_open: false,
                }),
                settled: Condvar::new(),
            }),
            runtime,
        }
    }

    pub(crate) fn exit_entry(&self) -> Weak<dyn ForceClose> {
        let core: Arc<dyn ForceClose> = self.core.clone();
        Arc::downgrade(&core)
    }

    pub(crate) fn dispatch_open(&self) -> Completion<()> {
        let core = self.core.clone();
        self.dispatch(move || core.open())
    }

    pub(crate) fn open_inline(&self) -> Result<(), PinError> {
        self.core.open()
    }

    pub fn configuration(&self) -> &PinConfiguration {
        &self.core.configuration
    }

    pub fn state(&self) -> PinState {
        self.core.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == PinState::Open
    }

    pub fn write(&self, value: impl IntoPinValue) -> Result<Completion<()>, PinError> {
        self.core.require_open()?;
        let level = value.into_pin_value()?.is_high();
        let core = self.core.clone();
        Ok(self.dispatch(move || core.with_session(|driver, session| driver.write(session, level))))
    }

    pub fn write_sync(&self, value: impl IntoPinValue) -> Result<(), PinError> {
        self.core.require_open()?;
        let level = value.into_pin_value()?.is_high();
        self.core.with_session(|driver, session| driver.write(session, level))
    }

    pub fn read(&self) -> Result<Completion<bool>, PinError> {
        self.core.require_open()?;
        let core = self.core.clone();
        Ok(self.dispatch(move || core.with_session(|driver, session| driver.read(session))))
    }

    pub fn read_sync(&self) -> Result<bool, PinError> {
        self.core.require_open()?;
        self.core.with_session(|driver, session| driver.read(session))
    }

    /// Marks the handle closed and closes the driver session in the background.
    pub fn close(&self) -> Result<Completion<()>, PinError> {
        let mut session = self.core.take_session()?;
        let driver = self.core.driver.clone();
        let pin = self.core.configuration.pin();
        Ok(self.dispatch(move || {
            driver.close(&mut session)?;
            debug!("Closed pin {}", pin);
            Ok(())
        }))
    }

    /// Closes the driver session. If the driver fails the handle stays open.
    pub fn close_sync(&self) -> Result<(), PinError> {
        self.core.close_sync()
    }

    fn dispatch<T, F>(&self, op: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, PinError> + Send + 'static,
    {
        Completion::new(self.runtime.spawn_blocking(op))
    }
}
