mod cycle;
mod events;
mod main;
mod state;

pub use main::Device;
pub use state::{CycleSnapshot, DeviceContext};

use crate::al::AlServices;
use crate::sm::SmServices;

/// Everything a host provides to a device: application indications and
/// management confirmations.
pub trait Application: AlServices + SmServices {}

impl<A: AlServices + SmServices + ?Sized> Application for A {}
