//! Event plumbing for the dashboard loop.
//!
//! A dedicated thread blocks on terminal input and forwards key/resize
//! events into an mpsc channel; the background poller signals refreshes on a
//! clone of the same sender, so the foreground loop blocks on exactly one
//! receiver.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvError, Sender};
use std::thread;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};

/// Events consumed by the dashboard loop.
#[derive(Debug)]
pub enum Event {
    /// Keyboard input.
    Key(KeyEvent),
    /// Terminal resize; the next draw picks up the new size.
    Resize,
    /// Fresh stats were pushed into the grids; redraw.
    Refresh,
    /// The input surface failed; treated as fatal by the dashboard.
    Error(io::Error),
}

/// Spawns the input-reader thread and owns the event channel.
pub struct EventHandler {
    rx: Receiver<Event>,
    tx: Sender<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input_tx = tx.clone();

        thread::spawn(move || {
            loop {
                let evt = match event::read() {
                    Ok(CrosstermEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                        Event::Key(key)
                    }
                    Ok(CrosstermEvent::Resize(_, _)) => Event::Resize,
                    Ok(_) => continue,
                    Err(err) => {
                        let _ = input_tx.send(Event::Error(err));
                        break;
                    }
                };
                if input_tx.send(evt).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// Sender handle for the background poller's refresh signals.
    pub fn refresh_sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    /// Blocks until the next event arrives.
    pub fn next(&self) -> Result<Event, RecvError> {
        self.rx.recv()
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
