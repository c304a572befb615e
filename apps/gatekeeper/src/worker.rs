//! Background execution of station operations.
//!
//! The operation runs on its own thread and reports its events and final result over a
//! channel, so the front-end thread only renders.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, trace};

use crate::error::{Error, Result};
use crate::flows::{CaptureReport, EnrollmentReport, Event, Identification, Station, Verification};

/// Result of a finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Enrolled(EnrollmentReport),
    Verified(Verification),
    Identified(Option<Identification>),
    Captured(CaptureReport),
}

#[derive(Debug)]
pub enum Message {
    Event(Event),
    Done(Result<Outcome>),
}

/// Operation running on the worker thread.
#[derive(Debug)]
pub struct Job {
    receiver: Receiver<Message>,
    handle: Option<JoinHandle<()>>,
}

/// Runs `task` against `station` on a new thread.
pub fn spawn<F>(station: Arc<Station>, task: F) -> Job
where
    F: FnOnce(&Station, &mut dyn FnMut(Event)) -> Result<Outcome> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || {
        let events = sender.clone();
        let mut report = move |event: Event| {
            trace!(?event, "progress");
            // The receiver only goes away once the front end stopped listening.
            let _ = events.send(Message::Event(event));
        };
        let result = task(&station, &mut report);
        if let Err(error) = &result {
            error!(%error, "operation failed");
        }
        let _ = sender.send(Message::Done(result));
    });

    Job {
        receiver,
        handle: Some(handle),
    }
}

impl Job {
    /// Hands every event to `on_event` until the operation finishes, then returns its result.
    pub fn wait<F: FnMut(&Event)>(mut self, mut on_event: F) -> Result<Outcome> {
        let mut outcome = Err(Error::WorkerGone);
        for message in self.receiver.iter() {
            match message {
                Message::Event(event) => on_event(&event),
                Message::Done(result) => {
                    outcome = result;
                    break;
                }
            }
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                return Err(Error::WorkerGone);
            }
        }

        outcome
    }
}
