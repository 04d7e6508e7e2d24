use std::sync::mpsc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};

/// An in-memory stand in for real IO, steered through a channel.
pub trait DummyIO {
    type MessageType;
    type Config;

    fn create(config: &Self::Config) -> (Self, Sender<Self::MessageType>)
    where
        Self: Sized,
    {
        let (sender, receiver) = mpsc::channel();
        let dummy_obj = Self::new(receiver, config);
        (dummy_obj, sender)
    }

    fn new(receiver: Receiver<Self::MessageType>, config: &Self::Config) -> Self;
}

/// Applies every message currently queued, without waiting for more.
pub fn read_all<T, F>(receiver: &Receiver<T>, mut on_value: F)
where
    F: FnMut(T),
{
    loop {
        match receiver.try_recv() {
            Ok(x) => on_value(x),
            Err(TryRecvError::Empty) => break,
            // Nobody is steering any more, what we have stays as is.
            Err(TryRecvError::Disconnected) => break,
        }
    }
}
