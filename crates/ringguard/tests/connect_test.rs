//! Integration tests for switch registration and baseline rules

mod support;

use flowrules::{Action, Command, MAIN_TABLE, Match, SwitchId, compiler::install_flow};
use ringguard::types::{PRIORITY_FORWARD, PRIORITY_HOST};
use ringguard::{Event, PortStatusReason};
use std::sync::Arc;
use support::{RecordingHandle, arp, connect_and_poll, controller, h1, h2, mac, switch_ports};
use tokio::sync::mpsc;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_connect_installs_baseline_for_host_switch() {
    let controller = controller();
    let handle = Arc::new(RecordingHandle::default());

    let created = assert_ok!(
        controller
            .on_switch_connect(SwitchId(1), handle.clone(), &switch_ports(1))
            .await
    );
    assert!(created);

    let expected = vec![
        install_flow(MAIN_TABLE, 0, Match::any(), vec![Action::to_controller()]),
        install_flow(
            MAIN_TABLE,
            PRIORITY_FORWARD,
            Match::any().in_port(1).ipv4_dst(h1()),
            vec![Action::output(2)],
        ),
        install_flow(
            MAIN_TABLE,
            PRIORITY_FORWARD,
            Match::any().in_port(2).ipv4_dst(h1()),
            vec![Action::output(1)],
        ),
        install_flow(
            MAIN_TABLE,
            PRIORITY_FORWARD,
            Match::any().in_port(1).ipv4_dst(h2()),
            vec![Action::output(2)],
        ),
        install_flow(
            MAIN_TABLE,
            PRIORITY_FORWARD,
            Match::any().in_port(2).ipv4_dst(h2()),
            vec![Action::output(1)],
        ),
        install_flow(
            MAIN_TABLE,
            PRIORITY_HOST,
            Match::any().ipv4_dst(h1()),
            vec![Action::SetEthDst { mac: mac(1) }, Action::output(3)],
        ),
        install_flow(
            MAIN_TABLE,
            PRIORITY_FORWARD,
            Match::any().in_port(3),
            vec![Action::output(1)],
        ),
    ];

    assert_eq!(handle.commands(), expected);

    let ipv4 = expected[1].as_flow().unwrap();
    assert_eq!(ipv4.matcher.eth_type, Some(flowrules::ether_type::IPV4));
}

#[tokio::test]
async fn test_connect_plain_switch() {
    let controller = controller();
    let handle = Arc::new(RecordingHandle::default());

    controller
        .on_switch_connect(SwitchId(3), handle.clone(), &switch_ports(3))
        .await
        .unwrap();

    let commands = handle.commands();
    assert_eq!(commands.len(), 5);
    assert!(commands.iter().all(|c| matches!(c, Command::FlowInstall { .. })));
    assert!(
        commands
            .iter()
            .filter_map(|c| c.as_flow())
            .all(|f| f.priority != PRIORITY_HOST)
    );
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let controller = controller();
    let handle = Arc::new(RecordingHandle::default());

    assert!(controller.on_switch_connect(SwitchId(1), handle.clone(), &[]).await.unwrap());
    let first = handle.commands().len();

    let again = Arc::new(RecordingHandle::default());
    assert!(!controller.on_switch_connect(SwitchId(1), again.clone(), &[]).await.unwrap());

    assert_eq!(handle.commands().len(), first);
    assert!(again.commands().is_empty());
    assert_eq!(controller.registry().len(), 1);
}

#[tokio::test]
async fn test_unconfigured_switch_gets_default_ring() {
    let controller = controller();
    let handle = Arc::new(RecordingHandle::default());

    controller
        .on_switch_connect(SwitchId(42), handle.clone(), &switch_ports(42))
        .await
        .unwrap();

    let second = handle.commands()[1].as_flow().unwrap().clone();
    assert_eq!(second.matcher, Match::any().in_port(1).ipv4_dst(h1()));
    assert_eq!(second.actions, vec![Action::output(2)]);
}

#[tokio::test]
async fn test_stats_reply_tracks_ring_ports_only() {
    let controller = controller();
    connect_and_poll(&controller, 1).await;

    let snapshot = controller.snapshot(SwitchId(1)).await.unwrap();
    assert_eq!(snapshot.active_ports, vec!["s1-eth1".to_string(), "s1-eth2".to_string()]);
    assert_eq!(snapshot.port_ids.get("s1-eth3"), Some(&3));
    assert!(snapshot.tables.overlapping_entries().is_empty());
    assert_eq!(
        snapshot
            .tables
            .flows_with_priority(MAIN_TABLE, PRIORITY_HOST)
            .len(),
        1
    );
}

#[tokio::test]
async fn test_events_for_unknown_switch_fail() {
    let controller = controller();
    let err = controller
        .on_stats_reply(SwitchId(7), &switch_ports(7))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unknown_switch");
}

#[tokio::test]
async fn test_dispatch_loop_survives_handler_errors() {
    let controller = controller();
    let handle = Arc::new(RecordingHandle::default());
    let (tx, rx) = mpsc::channel(8);

    tx.send(Event::PortStatus {
        switch_id: SwitchId(2),
        reason: PortStatusReason::Modify,
        port: support::port(2, 1, flowrules::PortState::LINK_DOWN),
    })
    .await
    .unwrap();
    tx.send(Event::SwitchConnected {
        switch_id: SwitchId(2),
        handle: handle.clone(),
        ports: switch_ports(2),
    })
    .await
    .unwrap();
    tx.send(Event::PacketIn(arp(2, mac(1), mac(2), 1)))
        .await
        .unwrap();
    drop(tx);

    controller.run(rx).await;

    // 5 baseline rules, then a flood for the unknown destination
    let commands = handle.commands();
    assert_eq!(commands.len(), 6);
    assert!(matches!(commands[5], Command::PacketOut(_)));

    let snapshot = controller.snapshot(SwitchId(2)).await.unwrap();
    assert_eq!(snapshot.mac_table.get(&mac(1)), Some(&1));
}
