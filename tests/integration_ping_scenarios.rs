//! Ping scenarios from the design's testable-properties section: a
//! reachable destination behind a switch acknowledges within a few ticks,
//! an unreachable destination times out after its job's TTL expires.

use netsim::node::host::{HostContext, ManLink};
use netsim::node::switch::SwitchContext;
use netsim::port::PipePort;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn expect_reply(rx: &mut mpsc::Receiver<String>, needle: &str, within: Duration) -> String {
    let msg = timeout(within, rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for a reply containing '{needle}'"))
        .expect("reply channel closed unexpectedly");
    assert!(msg.contains(needle), "unexpected reply: {msg}");
    msg
}

fn host_with_man(id: u8, ports: Vec<Box<dyn netsim::port::Port>>) -> (HostContext, mpsc::Sender<String>, mpsc::Receiver<String>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (reply_tx, reply_rx) = mpsc::channel(8);
    let ctx = HostContext::new(id, ports, ManLink { cmd_rx, reply_tx });
    (ctx, cmd_tx, reply_rx)
}

/// Topology H1 -- S2 -- H3; "p 3" from H1 is acknowledged once H3 replies.
#[tokio::test]
async fn ping_reachable_through_switch() {
    let (h1_end, sw_end_a) = PipePort::pair(1, 2);
    let (h3_end, sw_end_b) = PipePort::pair(3, 2);

    let (host1, cmd1, mut reply1) = host_with_man(1, vec![Box::new(h1_end)]);
    let (host3, _cmd3, _reply3) = host_with_man(3, vec![Box::new(h3_end)]);
    let switch = SwitchContext::new(2, vec![Box::new(sw_end_a), Box::new(sw_end_b)]);

    tokio::spawn(host1.run());
    tokio::spawn(host3.run());
    tokio::spawn(switch.run());

    cmd1.send("p 3".to_string()).await.unwrap();
    expect_reply(&mut reply1, "Ping to 3 succeeded", Duration::from_millis(700)).await;
}

/// A ping to a destination that never answers times out after the
/// WaitForResponse job's TTL (20 ticks) is exhausted.
#[tokio::test]
async fn ping_unreachable_times_out() {
    let (h1_end, _sink_end) = PipePort::pair(1, 3);
    let (host1, cmd1, mut reply1) = host_with_man(1, vec![Box::new(h1_end)]);

    tokio::spawn(host1.run());

    cmd1.send("p 3".to_string()).await.unwrap();
    expect_reply(&mut reply1, "Ping request timed out", Duration::from_millis(1000)).await;
}
