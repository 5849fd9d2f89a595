//! Main loop: keeps the link up, feeds commands to the controller and
//! publishes whatever the controller reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, trace, warn};
use waterer_traits::{ConnectOptions, Transport};

use crate::command::CommandHandler;
use crate::config::StationCfg;
use crate::controller::{DoseController, DoseEvent};
use crate::error::Result;
use crate::protocol::DispenseStatus;
use crate::reporter::StatusReporter;

pub struct Station<T: Transport> {
    controller: DoseController,
    transport: T,
    handler: CommandHandler,
    reporter: StatusReporter,
    cfg: StationCfg,
    link_up: bool,
}

impl<T: Transport> Station<T> {
    pub fn new(controller: DoseController, transport: T, cfg: StationCfg) -> Self {
        let handler = CommandHandler::new(cfg.payloads.clone());
        let reporter = StatusReporter::new(cfg.topics.clone(), cfg.payloads.clone());
        Self {
            controller,
            transport,
            handler,
            reporter,
            cfg,
            link_up: false,
        }
    }

    pub fn controller(&self) -> &DoseController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut DoseController {
        &mut self.controller
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    /// True once announced and no link error has been seen since.
    pub fn is_link_up(&self) -> bool {
        self.link_up && self.transport.is_connected()
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let link = &self.cfg.link;
        ConnectOptions {
            host: link.host.clone(),
            port: link.port,
            client_id: link.client_id.clone(),
            username: link.username.clone(),
            password: link.password.clone(),
            last_will: Some(self.reporter.last_will()),
        }
    }

    /// Block until connected and announced, retrying every
    /// `reconnect_delay_ms`. Returns `Ok(false)` only when `shutdown` is set.
    ///
    /// Commands are not processed while the link is down, but the controller
    /// keeps being stepped during the retry delay so a running dose still
    /// stops at its target.
    pub fn ensure_connected(&mut self, shutdown: &AtomicBool) -> Result<bool> {
        if self.is_link_up() {
            return Ok(true);
        }
        self.link_up = false;
        let opts = self.connect_options();
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(false);
            }
            match self.transport.connect(&opts) {
                Ok(()) => {
                    let status = self.controller.status();
                    match self.reporter.announce(&mut self.transport, &status) {
                        Ok(()) => {
                            info!(
                                host = %opts.host,
                                port = opts.port,
                                client_id = %opts.client_id,
                                "connected"
                            );
                            self.link_up = true;
                            return Ok(true);
                        }
                        Err(e) => warn!(error = %e, "announce after connect failed"),
                    }
                }
                Err(e) => warn!(
                    host = %opts.host,
                    port = opts.port,
                    error = %e,
                    retry_ms = self.cfg.link.reconnect_delay_ms,
                    "connect failed"
                ),
            }
            self.wait_retry(shutdown)?;
        }
    }

    /// One loop iteration. `Ok(None)` means shutdown was requested while
    /// waiting for the link.
    pub fn tick(&mut self, shutdown: &AtomicBool) -> Result<Option<DoseEvent>> {
        if !self.ensure_connected(shutdown)? {
            return Ok(None);
        }
        self.drain_commands();
        let event = self.controller.step()?;
        if let Some(status) = event.status() {
            self.publish_status(status);
        }
        Ok(Some(event))
    }

    /// Tick until `shutdown` is set, then shut down cleanly.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        self.run_until(shutdown, |_| false)
    }

    /// Like [`run`](Self::run) but also stops once `done` returns true
    /// after a tick.
    pub fn run_until<D>(&mut self, shutdown: &AtomicBool, mut done: D) -> Result<()>
    where
        D: FnMut(&Self) -> bool,
    {
        let outcome = self.run_loop(shutdown, &mut done);
        let stopped = self.shutdown();
        match (outcome, stopped) {
            (Err(e), Err(stop_err)) => {
                warn!(error = %stop_err, "shutdown after loop error also failed");
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// Stop the pump, publish `offline` and disconnect.
    pub fn shutdown(&mut self) -> Result<()> {
        let stopped = self.controller.shutdown();
        if self.is_link_up() {
            if let Err(e) = self.reporter.announce_offline(&mut self.transport) {
                warn!(error = %e, "failed to publish offline");
            }
            if let Err(e) = self.transport.disconnect() {
                warn!(error = %e, "disconnect failed");
            }
        }
        self.link_up = false;
        stopped
    }

    fn run_loop<D>(&mut self, shutdown: &AtomicBool, done: &mut D) -> Result<()>
    where
        D: FnMut(&Self) -> bool,
    {
        let interval = self.cfg.loop_interval();
        while !shutdown.load(Ordering::Relaxed) {
            self.tick(shutdown)?;
            if done(&*self) {
                debug!("station loop done");
                break;
            }
            self.controller.clock().sleep(interval);
        }
        Ok(())
    }

    fn drain_commands(&mut self) {
        loop {
            match self.transport.poll() {
                Ok(Some(msg)) => {
                    if msg.topic != self.reporter.topics().set {
                        trace!(topic = %msg.topic, "ignoring message on foreign topic");
                        continue;
                    }
                    if self
                        .handler
                        .handle(&msg.payload, self.controller.request_mut())
                        .is_ok()
                    {
                        let status = self.controller.status();
                        self.publish_status(&status);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "link lost while polling");
                    self.link_up = false;
                    break;
                }
            }
        }
    }

    fn publish_status(&mut self, status: &DispenseStatus) {
        if !self.link_up {
            return;
        }
        if let Err(e) = self.reporter.publish_status(&mut self.transport, status) {
            warn!(error = %e, "status publish failed; link marked down");
            self.link_up = false;
        }
    }

    fn wait_retry(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let clock = self.controller.clock().clone();
        let slice = self.cfg.loop_interval().max(Duration::from_millis(1));
        let deadline = clock.now() + self.cfg.reconnect_delay();
        while clock.now() < deadline {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
            self.controller.step()?;
            clock.sleep(slice.min(deadline.saturating_duration_since(clock.now())));
        }
        Ok(())
    }
}
