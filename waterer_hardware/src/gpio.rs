//! Raspberry Pi GPIO backends (rppal).

use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use tracing::{debug, info};
use waterer_traits::{BoxError, FlowMeter, Pump};

use crate::error::{HwError, Result};
use crate::pulse::PulseCounter;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// Solenoid pump on a single active-high output pin.
pub struct GpioPump {
    pin: OutputPin,
}

impl GpioPump {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut out = gpio.get(pin).map_err(gpio_err)?.into_output();
        out.set_low();
        info!(pin, "pump output ready");
        Ok(Self { pin: out })
    }
}

impl Pump for GpioPump {
    fn start(&mut self) -> std::result::Result<(), BoxError> {
        self.pin.set_high();
        debug!("pump on");
        Ok(())
    }

    fn stop(&mut self) -> std::result::Result<(), BoxError> {
        self.pin.set_low();
        debug!("pump off");
        Ok(())
    }
}

impl Drop for GpioPump {
    fn drop(&mut self) {
        self.pin.set_low();
    }
}

/// Flow meter counting falling edges via an rppal async interrupt.
///
/// The interrupt is attached on `begin_counting` and cleared on
/// `end_counting`, so the handler thread only exists during a dose.
pub struct GpioFlowMeter {
    pin: InputPin,
    counter: PulseCounter,
}

impl GpioFlowMeter {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let input = gpio.get(pin).map_err(gpio_err)?.into_input();
        info!(pin, "flow meter input ready");
        Ok(Self {
            pin: input,
            counter: PulseCounter::new(),
        })
    }
}

impl FlowMeter for GpioFlowMeter {
    fn begin_counting(&mut self) -> std::result::Result<(), BoxError> {
        self.counter.arm();
        let counter = self.counter.clone();
        self.pin
            .set_async_interrupt(Trigger::FallingEdge, move |_: Level| counter.on_edge())
            .map_err(|e| HwError::Interrupt(e.to_string()))?;
        Ok(())
    }

    fn end_counting(&mut self) -> std::result::Result<(), BoxError> {
        self.counter.disarm();
        self.pin
            .clear_async_interrupt()
            .map_err(|e| HwError::Interrupt(e.to_string()))?;
        Ok(())
    }

    fn pulses(&mut self) -> u32 {
        self.counter.count()
    }
}
