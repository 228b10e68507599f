// Background work whose result is delivered once, tagged with the session
// generation that started it.

use std::sync::mpsc::{sync_channel, Receiver, TryRecvError};
use std::thread;

use log::debug;

/// The state of a background task when polled.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TaskPoll<T> {
    Ready(T),
    Waiting,
    /// The worker went away without producing a result.
    Lost,
}

/// A single-assignment slot filled by a worker thread.
pub struct Pending<T> {
    generation: u64,
    receiver: Receiver<T>,
}

impl<T: Send + 'static> Pending<T> {
    pub fn spawn<F>(generation: u64, name: &str, work: F) -> Pending<T>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = sync_channel::<T>(1);
        let task_name = name.to_string();
        thread::spawn(move || {
            let res = work();
            // The receiver is gone when the session moved on.
            if sender.send(res).is_err() {
                debug!(
                    "Pending::spawn: {} (generation {}) finished after being dropped",
                    task_name, generation
                );
            }
        });
        Pending {
            generation,
            receiver,
        }
    }
}

impl<T> Pending<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Takes the result if it is there, without blocking.
    pub fn poll(&self) -> TaskPoll<T> {
        match self.receiver.try_recv() {
            Ok(x) => TaskPoll::Ready(x),
            Err(TryRecvError::Empty) => TaskPoll::Waiting,
            Err(TryRecvError::Disconnected) => TaskPoll::Lost,
        }
    }

    /// Blocks until the result is there. None if the worker died.
    pub fn wait(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn result_is_delivered_once() {
        let (go, gate) = channel::<()>();
        let p = Pending::spawn(3, "test", move || {
            gate.recv().unwrap();
            42
        });
        assert_eq!(p.generation(), 3);
        assert_eq!(p.poll(), TaskPoll::Waiting);
        go.send(()).unwrap();
        assert_eq!(p.wait(), Some(42));
    }

    #[test]
    fn panicking_worker_is_lost() {
        let p: Pending<u32> = Pending::spawn(1, "test", || panic!("boom"));
        assert_eq!(p.wait(), None);
    }
}
