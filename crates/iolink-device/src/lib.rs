#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for frames, process data images and service payloads.
extern crate alloc;

// --- Foundation Modules ---
pub mod types;
pub mod hal;
pub mod log;
pub mod timer;
pub mod config;

// --- Protocol Layers ---
pub mod pl;
pub mod frame;
pub mod dl;
pub mod service;
pub mod al;
pub mod sm;

// --- Device Abstraction ---
pub mod device;
pub mod registry;

// --- Top-level Exports ---
pub use types::{DeviceId, Mode};
pub use hal::{IoLinkError, PlIndication, Transceiver, TransferFault};
pub use config::DeviceConfig;
pub use frame::{ControlCode, DeviceFrame, MasterFrame};
pub use dl::{DlState, LinkErrorCounters};
pub use service::{ServiceKind, ServiceResult};
pub use al::{AlServices, IsduRequest, IsduResponse, ProcessDataBuffer};
pub use sm::{DeviceCom, DeviceIdent, SmServices};
pub use device::{Application, CycleSnapshot, Device};
pub use registry::DeviceRegistry;
