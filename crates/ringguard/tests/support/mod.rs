//! Shared helpers for ringguard integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use flowrules::{
    Command, MacAddress, PortConfig, PortDescriptor, PortState, SwitchId, ether_type, port_no,
};
use ringguard::{Controller, PacketIn, SwitchHandle, Topology};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

/// Handle that records every command it accepts
#[derive(Default)]
pub struct RecordingHandle {
    sent: Mutex<Vec<Command>>,
}

impl RecordingHandle {
    pub fn commands(&self) -> Vec<Command> {
        self.sent.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl SwitchHandle for RecordingHandle {
    async fn send(&self, command: Command) -> common::Result<()> {
        self.sent.lock().unwrap().push(command);
        Ok(())
    }
}

pub fn h1() -> Ipv4Addr {
    "10.0.1.2".parse().unwrap()
}

pub fn h2() -> Ipv4Addr {
    "10.0.2.2".parse().unwrap()
}

pub fn mac(last: u8) -> MacAddress {
    MacAddress::new([0, 0, 0, 0, 0, last])
}

pub fn port(switch: u64, port_no: u32, state: u32) -> PortDescriptor {
    PortDescriptor {
        name: format!("s{}-eth{}", switch, port_no),
        hw_addr: MacAddress::new([0, 0, 0, switch as u8, 0, port_no as u8]),
        port_no,
        config: PortConfig::default(),
        state: PortState(state),
    }
}

/// Port list as a switch reports it: the bridge-local port, then eth1..eth3
pub fn switch_ports(switch: u64) -> Vec<PortDescriptor> {
    let mut local = port(switch, port_no::LOCAL, PortState::LIVE);
    local.name = format!("s{}", switch);

    let mut ports = vec![local];
    ports.extend((1..=3).map(|n| port(switch, n, PortState::LIVE)));
    ports
}

pub fn controller() -> Controller {
    Controller::new(Topology::default(), None)
}

/// Connect `switch` with a recording handle and report all its ports live
pub async fn connect_and_poll(controller: &Controller, switch: u64) -> Arc<RecordingHandle> {
    let handle = Arc::new(RecordingHandle::default());
    let ports = switch_ports(switch);

    controller
        .on_switch_connect(SwitchId(switch), handle.clone(), &ports)
        .await
        .unwrap();
    controller
        .on_stats_reply(SwitchId(switch), &ports)
        .await
        .unwrap();

    handle
}

pub fn arp(switch: u64, src: MacAddress, dst: MacAddress, in_port: u32) -> PacketIn {
    PacketIn {
        switch_id: SwitchId(switch),
        buffer_id: None,
        eth_type: ether_type::ARP,
        src,
        dst,
        in_port,
        payload: vec![0xaa; 42],
    }
}
