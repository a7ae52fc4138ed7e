//! DNS scenario: H1 registers a name with the name server, then H2 pings
//! that name directly (no prior id known), resolving it through a
//! DNS_QUERY/DNS_QUERY_RESPONSE round trip before the ping itself fires.

use netsim::constants::STATIC_DNS_ID;
use netsim::node::host::{HostContext, ManLink};
use netsim::node::nameserver::NameServerContext;
use netsim::port::PipePort;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn host_with_man(id: u8, ports: Vec<Box<dyn netsim::port::Port>>) -> (HostContext, mpsc::Sender<String>, mpsc::Receiver<String>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (reply_tx, reply_rx) = mpsc::channel(8);
    let ctx = HostContext::new(id, ports, ManLink { cmd_rx, reply_tx });
    (ctx, cmd_tx, reply_rx)
}

async fn expect_reply(rx: &mut mpsc::Receiver<String>, needle: &str, within: Duration) -> String {
    let msg = timeout(within, rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for a reply containing '{needle}'"))
        .expect("reply channel closed unexpectedly");
    assert!(msg.contains(needle), "unexpected reply: {msg}");
    msg
}

#[tokio::test]
async fn register_then_resolve_and_ping_by_name() {
    let (h1_to_dns, dns_to_h1) = PipePort::pair(1, STATIC_DNS_ID);
    let (h2_to_dns, dns_to_h2) = PipePort::pair(2, STATIC_DNS_ID);
    let (h1_to_h2, h2_to_h1) = PipePort::pair(1, 2);

    let (host1, cmd1, mut reply1) = host_with_man(1, vec![Box::new(h1_to_dns), Box::new(h1_to_h2)]);
    let (host2, cmd2, mut reply2) = host_with_man(2, vec![Box::new(h2_to_dns), Box::new(h2_to_h1)]);
    let dns = NameServerContext::new(vec![Box::new(dns_to_h1), Box::new(dns_to_h2)]);

    tokio::spawn(host1.run());
    tokio::spawn(host2.run());
    tokio::spawn(dns.run());

    cmd1.send("a alice".to_string()).await.unwrap();
    expect_reply(&mut reply1, "Registered 'alice'", Duration::from_millis(500)).await;

    cmd2.send("p alice".to_string()).await.unwrap();
    expect_reply(&mut reply2, "Ping to 1 succeeded", Duration::from_millis(700)).await;
}
