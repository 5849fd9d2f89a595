//! Line-oriented stand-in for the broker link.
//!
//! Every non-empty input line is delivered as a payload on the command topic;
//! every publish is written to the output as one JSON line
//! `{"topic":..,"retain":..,"payload":..}`. Input is read on a background
//! thread so `poll()` never blocks the station loop.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError, unbounded};
use tracing::{debug, warn};
use waterer_traits::{BoxError, ConnectOptions, Message, Transport};

pub struct StdioTransport<W: Write> {
    lines: Receiver<String>,
    input_closed: Arc<AtomicBool>,
    out: W,
    command_topic: String,
    subscribed: bool,
    connected: bool,
}

impl<W: Write> StdioTransport<W> {
    /// Start a reader thread over `input`.
    pub fn spawn<R>(input: R, out: W, command_topic: impl Into<String>) -> std::io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = closed.clone();
        thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                for line in input.lines() {
                    match line {
                        Ok(l) => {
                            let l = l.trim();
                            if l.is_empty() {
                                continue;
                            }
                            if tx.send(l.to_owned()).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "input read failed");
                            break;
                        }
                    }
                }
                closed_flag.store(true, Ordering::Release);
            })?;
        Ok(Self {
            lines: rx,
            input_closed: closed,
            out,
            command_topic: command_topic.into(),
            subscribed: false,
            connected: false,
        })
    }

    /// Input is exhausted and every line has been handed out.
    pub fn finished(&self) -> bool {
        self.input_closed.load(Ordering::Acquire) && self.lines.is_empty()
    }

    fn write_line(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BoxError> {
        let line = serde_json::json!({
            "topic": topic,
            "retain": retain,
            "payload": String::from_utf8_lossy(payload),
        });
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Transport for StdioTransport<W> {
    fn connect(&mut self, opts: &ConnectOptions) -> Result<(), BoxError> {
        debug!(
            host = %opts.host,
            port = opts.port,
            client_id = %opts.client_id,
            will = opts.last_will.is_some(),
            "stdio link up"
        );
        self.connected = true;
        self.subscribed = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BoxError> {
        if !self.connected {
            return Err("not connected".into());
        }
        self.write_line(topic, payload, retain)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        if topic == self.command_topic {
            self.subscribed = true;
        } else {
            debug!(topic, "stdio link only carries the command topic");
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Message>, BoxError> {
        if !self.connected {
            return Err("not connected".into());
        }
        if !self.subscribed {
            return Ok(None);
        }
        match self.lines.try_recv() {
            Ok(line) => Ok(Some(Message::new(self.command_topic.clone(), line))),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn disconnect(&mut self) -> Result<(), BoxError> {
        self.connected = false;
        self.subscribed = false;
        Ok(())
    }
}
