//! STP loop-break scenario: three switches wired in a ring (S1-S2, S2-S3,
//! S3-S1) must converge on a spanning tree that blocks exactly one of the
//! three inter-switch links, so a broadcast flood cannot loop forever.
//!
//! Real convergence needs more than one broadcast round: a switch's
//! `is_child`/`port_in_tree` computation depends on its neighbors' *current*
//! parent choice, which itself only stabilizes after the first round of
//! adoption. This test drives a handful of real ~500ms control-broadcast
//! periods — comfortably inside the `ALLOWED_CONVERGENCE_ROUNDS` cap of 10 —
//! rather than pretending one burst of ticks is enough.

use netsim::node::switch::SwitchContext;
use netsim::port::PipePort;
use std::time::Duration;

#[tokio::test]
async fn ring_of_three_switches_blocks_exactly_one_link() {
    let (s1_to_s2, s2_to_s1) = PipePort::pair(1, 2);
    let (s2_to_s3, s3_to_s2) = PipePort::pair(2, 3);
    let (s3_to_s1, s1_to_s3) = PipePort::pair(3, 1);

    // Port 0 of every switch faces its "earlier" ring neighbor, port 1 its
    // "later" one, fixed by construction so the final in-tree vectors below
    // are deterministic rather than racing on port order.
    let mut s1 = SwitchContext::new(1, vec![Box::new(s1_to_s2), Box::new(s1_to_s3)]);
    let mut s2 = SwitchContext::new(2, vec![Box::new(s2_to_s1), Box::new(s2_to_s3)]);
    let mut s3 = SwitchContext::new(3, vec![Box::new(s3_to_s2), Box::new(s3_to_s1)]);

    // Each round: every switch gets one tick (letting its periodic
    // broadcast fire once the ~500ms period has elapsed) and drains
    // whatever its neighbors sent last round. A handful of rounds is far
    // more than a 3-node ring needs to settle.
    for _ in 0..6 {
        s1.tick().await;
        s2.tick().await;
        s3.tick().await;
        tokio::time::sleep(Duration::from_millis(520)).await;
    }

    // Root election must settle on the lowest id (1); its own two links are
    // always in-tree since both its ring neighbors treat it as their parent.
    assert_eq!(s1.port_in_tree(), &[true, true]);

    // Exactly one of the three logical ring links — the one that does not
    // lie on a shortest path to the root — ends up blocked. With root
    // distances of 1 (S1-S2, S1-S3 direct) vs 2 (via the other neighbor),
    // the S2-S3 link loses the tie-break on both ends.
    assert_eq!(s2.port_in_tree(), &[true, false], "S2's link to S1 stays in tree, its link to S3 is pruned");
    assert_eq!(s3.port_in_tree(), &[false, true], "S3's link to S2 is pruned, its link to S1 stays in tree");

    let total_blocked = [s1.port_in_tree(), s2.port_in_tree(), s3.port_in_tree()]
        .iter()
        .flat_map(|ports| ports.iter())
        .filter(|&&in_tree| !in_tree)
        .count();
    assert_eq!(total_blocked, 2, "the one pruned logical link shows up as blocked on both of its ends");
}
