// crates/iolink-device/tests/simulator/mod.rs
#![allow(dead_code)]

use iolink_device::frame::checksum;
use iolink_device::{
    AlServices, ControlCode, Device, DeviceConfig, DeviceFrame, DeviceId, IoLinkError,
    IsduRequest, MasterFrame, Mode, PlIndication, ServiceResult, SmServices, Transceiver,
    TransferFault,
};
use std::collections::{BTreeMap, VecDeque};

/// Initialises logging once per test binary; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A scripted master on the other end of the C/Q line.
///
/// Accepted mode switches are confirmed and accepted frames are answered
/// immediately by queueing the matching indication; the device picks them
/// up on its next tick.
pub struct MockMaster {
    pub accept_mode: bool,
    pub confirm_mode: bool,
    /// Confirms this mode instead of the requested one.
    pub confirm_as: Option<Mode>,
    pub accept_transfer: bool,
    pub reply: bool,
    /// Output process data placed in every reply.
    pub pd_out: Vec<u8>,
    /// Control code for the next reply only.
    pub control: Option<ControlCode>,
    /// Parameter request for the next reply only.
    pub isdu: Option<IsduRequest>,
    /// Raw frame used as the next reply instead of an encoded one.
    pub raw_reply: Option<Vec<u8>>,
    /// Number of upcoming replies sent with a broken checksum.
    pub corrupt_replies: usize,
    /// Number of upcoming transfers that fail on the wire with a parity error.
    pub fail_transfers: usize,
    pub mode_requests: Vec<Mode>,
    pub sent: Vec<Vec<u8>>,
    pub indications: VecDeque<PlIndication>,
}

impl Default for MockMaster {
    fn default() -> Self {
        Self {
            accept_mode: true,
            confirm_mode: true,
            confirm_as: None,
            accept_transfer: true,
            reply: true,
            pd_out: Vec::new(),
            control: None,
            isdu: None,
            raw_reply: None,
            corrupt_replies: 0,
            fail_transfers: 0,
            mode_requests: Vec::new(),
            sent: Vec::new(),
            indications: VecDeque::new(),
        }
    }
}

impl MockMaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames sent by the device, decoded.
    pub fn sent_frames(&self) -> Vec<DeviceFrame> {
        self.sent
            .iter()
            .map(|frame| DeviceFrame::decode(frame).expect("device sent an invalid frame"))
            .collect()
    }

    pub fn last_sent(&self) -> Option<DeviceFrame> {
        self.sent_frames().pop()
    }
}

impl Transceiver for MockMaster {
    fn set_mode(&mut self, mode: Mode) -> bool {
        self.mode_requests.push(mode);
        if !self.accept_mode {
            return false;
        }
        if self.confirm_mode {
            let confirmed = self.confirm_as.unwrap_or(mode);
            self.indications.push_back(PlIndication::ModeSwitched(confirmed));
        }
        true
    }

    fn transfer(&mut self, frame: &[u8]) -> bool {
        if !self.accept_transfer {
            return false;
        }
        self.sent.push(frame.to_vec());
        if self.fail_transfers > 0 {
            self.fail_transfers -= 1;
            self.indications
                .push_back(PlIndication::TransferFailed(TransferFault::Parity));
            return true;
        }
        if self.reply {
            let mut reply = self.raw_reply.take().unwrap_or_else(|| {
                MasterFrame {
                    control: self.control.take(),
                    isdu: self.isdu.take(),
                    pd_out: self.pd_out.clone(),
                }
                .encode()
            });
            if self.corrupt_replies > 0 {
                self.corrupt_replies -= 1;
                if let Some(ckt) = reply.last_mut() {
                    *ckt ^= 0x01;
                }
            }
            self.indications.push_back(PlIndication::TransferComplete(reply));
        }
        true
    }

    fn poll_indication(&mut self) -> Option<PlIndication> {
        self.indications.pop_front()
    }
}

/// An application that records every indication and confirmation.
#[derive(Debug, Default)]
pub struct RecordingApp {
    pub accept_output: bool,
    pub accept_control: bool,
    pub cycles: usize,
    pub outputs: Vec<Vec<u8>>,
    pub controls: Vec<ControlCode>,
    pub events: Vec<ServiceResult>,
    pub transfers: Vec<ServiceResult>,
    pub set_ident: Vec<ServiceResult>,
    pub get_ident: Vec<ServiceResult>,
    pub set_com: Vec<ServiceResult>,
    pub get_com: Vec<ServiceResult>,
    pub set_mode: Vec<ServiceResult>,
    pub get_mode: Vec<ServiceResult>,
    pub isdu: Vec<ServiceResult>,
    /// Parameters readable and writable by the master.
    pub parameters: BTreeMap<(u16, u8), Vec<u8>>,
}

impl RecordingApp {
    pub fn accepting() -> Self {
        Self {
            accept_output: true,
            accept_control: true,
            ..Default::default()
        }
    }

    /// Total confirmations received so far.
    pub fn confirmations(&self) -> usize {
        self.events.len()
            + self.transfers.len()
            + self.set_ident.len()
            + self.get_ident.len()
            + self.set_com.len()
            + self.get_com.len()
            + self.set_mode.len()
            + self.get_mode.len()
            + self.isdu.len()
    }
}

impl AlServices for RecordingApp {
    fn al_cycle_ind(&mut self) {
        self.cycles += 1;
    }

    fn al_new_output_ind(&mut self, pd_out: &[u8]) -> bool {
        self.outputs.push(pd_out.to_vec());
        self.accept_output
    }

    fn al_control_ind(&mut self, code: ControlCode) -> bool {
        self.controls.push(code);
        self.accept_control
    }

    fn al_event_cnf(&mut self, result: ServiceResult) -> bool {
        self.events.push(result);
        true
    }

    fn al_transfer_cnf(&mut self, result: ServiceResult) {
        self.transfers.push(result);
    }

    fn al_read_ind(&mut self, index: u16, subindex: u8) -> Result<Vec<u8>, IoLinkError> {
        self.parameters
            .get(&(index, subindex))
            .cloned()
            .ok_or(IoLinkError::InvalidParameter)
    }

    fn al_write_ind(&mut self, index: u16, subindex: u8, data: &[u8]) -> Result<(), IoLinkError> {
        self.parameters.insert((index, subindex), data.to_vec());
        Ok(())
    }

    fn al_isdu_cnf(&mut self, result: ServiceResult) {
        self.isdu.push(result);
    }
}

impl SmServices for RecordingApp {
    fn sm_set_device_ident_cnf(&mut self, result: ServiceResult) {
        self.set_ident.push(result);
    }

    fn sm_get_device_ident_cnf(&mut self, result: ServiceResult) {
        self.get_ident.push(result);
    }

    fn sm_set_device_com_cnf(&mut self, result: ServiceResult) {
        self.set_com.push(result);
    }

    fn sm_get_device_com_cnf(&mut self, result: ServiceResult) {
        self.get_com.push(result);
    }

    fn sm_set_device_mode_cnf(&mut self, result: ServiceResult) {
        self.set_mode.push(result);
    }

    fn sm_get_device_mode_cnf(&mut self, result: ServiceResult) {
        self.get_mode.push(result);
    }
}

/// Appends a valid checksum octet to a hand-built master frame body.
pub fn seal(mut body: Vec<u8>) -> Vec<u8> {
    body.push(0);
    let ckt = checksum(&body);
    if let Some(last) = body.last_mut() {
        *last = ckt;
    }
    body
}

pub type TestDevice = Device<MockMaster, RecordingApp>;

pub fn new_device(config: DeviceConfig) -> TestDevice {
    init_logging();
    Device::new(DeviceId(1), config, MockMaster::new(), RecordingApp::accepting())
        .expect("default test configuration is valid")
}

/// Drives a simulated clock in fixed steps.
pub struct Clock {
    pub now_us: u64,
    pub step_us: u64,
}

impl Clock {
    pub fn new(step_us: u64) -> Self {
        Self { now_us: 0, step_us }
    }

    pub fn tick(&mut self, device: &mut TestDevice) -> iolink_device::DlState {
        let state = device.tick(self.now_us);
        self.now_us += self.step_us;
        state
    }

    pub fn run(&mut self, device: &mut TestDevice, ticks: usize) -> iolink_device::DlState {
        let mut state = device.state();
        for _ in 0..ticks {
            state = self.tick(device);
        }
        state
    }
}

/// Requests `mode` and ticks until the link is up. Returns after the tick
/// that confirmed the mode (the first cyclic frame is then on the wire).
pub fn bring_up(device: &mut TestDevice, clock: &mut Clock, mode: Mode) {
    device
        .sm_set_device_mode_req(mode)
        .expect("mode-set accepted");
    clock.tick(device);
    clock.tick(device);
    assert_eq!(device.mode(), mode);
}
