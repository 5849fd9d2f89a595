pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod pulse;
pub mod sim;

pub use pulse::PulseCounter;
pub use sim::{SimulatedFlowMeter, SimulatedPump};

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::{GpioFlowMeter, GpioPump};
