pub mod clock;
pub mod transport;

pub use clock::{Clock, MonotonicClock};
pub use transport::{ConnectOptions, LastWill, Message, Transport};

/// Error type used at every trait boundary in the stack.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// On/off actuator driving the solenoid pump.
pub trait Pump {
    fn start(&mut self) -> Result<(), BoxError>;
    fn stop(&mut self) -> Result<(), BoxError>;
}

/// Pulse-counting flow meter.
///
/// Counting is only active between `begin_counting` and `end_counting`;
/// `begin_counting` resets the count to zero.
pub trait FlowMeter {
    fn begin_counting(&mut self) -> Result<(), BoxError>;
    fn end_counting(&mut self) -> Result<(), BoxError>;
    /// Pulses seen since the last `begin_counting`.
    fn pulses(&mut self) -> u32;
}

impl<P: Pump + ?Sized> Pump for Box<P> {
    fn start(&mut self) -> Result<(), BoxError> {
        (**self).start()
    }
    fn stop(&mut self) -> Result<(), BoxError> {
        (**self).stop()
    }
}

impl<F: FlowMeter + ?Sized> FlowMeter for Box<F> {
    fn begin_counting(&mut self) -> Result<(), BoxError> {
        (**self).begin_counting()
    }
    fn end_counting(&mut self) -> Result<(), BoxError> {
        (**self).end_counting()
    }
    fn pulses(&mut self) -> u32 {
        (**self).pulses()
    }
}
