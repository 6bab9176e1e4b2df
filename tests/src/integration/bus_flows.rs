//! # Cluster Bus Flows
//!
//! Several gateway instances sharing one bus. Each instance owns its own
//! alias space, so the same island notification is rewritten per instance.

#[cfg(test)]
mod tests {
    use super::super::support::*;
    use bytes::Bytes;
    use comms_gateway::protocol::{ClientMessage, ServerMessage, SubscribeRequest};
    use prost::Message;
    use shared_bus::{
        InMemoryMessageBus, IslandChangedMessage, JoinIslandMessage, LeftIslandMessage,
        MessagePublisher, Position, SUBJECT_PREFIX,
    };
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    async fn subscribe(client: &mut TestClient, topic: &str) {
        client
            .send(ClientMessage::SubscribeRequest(SubscribeRequest {
                topic: topic.to_string(),
            }))
            .await;
    }

    fn position(x: f32) -> Position {
        Position { x, y: 0.0, z: 0.0 }
    }

    /// Let subscribe frames reach the relay.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // =========================================================================
    // ISLAND NOTIFICATIONS
    // =========================================================================

    #[tokio::test]
    async fn test_island_changed_rewritten_per_instance() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let east = ServedGateway::start_on(test_config(1000), bus.clone()).await;
        let west = ServedGateway::start_on(test_config(1000), bus.clone()).await;

        let alice = Identity::from_seed(1);
        let bob = Identity::from_seed(2);
        let carol = Identity::from_seed(3);

        // east: carol then alice, west: alice only
        let mut carol_east = east.client().await;
        assert_eq!(carol_east.authenticate(&carol).await, 1);
        let mut alice_east = east.client().await;
        assert_eq!(alice_east.authenticate(&alice).await, 2);
        let mut alice_west = west.client().await;
        assert_eq!(alice_west.authenticate(&alice).await, 1);

        subscribe(&mut alice_east, "I1.island_changed").await;
        subscribe(&mut alice_west, "I1.island_changed").await;
        settle().await;

        let notification = IslandChangedMessage {
            island_id: "I1".into(),
            conn_str: "livekit:ws://island".into(),
            from_island_id: "I0".into(),
            peers: HashMap::from([
                (alice.address.clone(), position(1.0)),
                (carol.address.clone(), position(2.0)),
                (bob.address.clone(), position(3.0)),
            ]),
        };
        bus.publish(
            &format!("{SUBJECT_PREFIX}I1.island_changed"),
            Bytes::from(notification.encode_to_vec()),
        )
        .await;

        match alice_east.recv().await {
            Some(ServerMessage::IslandChanged(m)) => {
                assert_eq!(m.island_id, "I1");
                assert_eq!(m.conn_str, "livekit:ws://island");
                assert_eq!(m.from_island_id, "I0");
                // bob is unknown here, carol is 1 and alice is 2
                assert_eq!(m.peers.len(), 2);
                assert_eq!(m.peers[&2], position(1.0));
                assert_eq!(m.peers[&1], position(2.0));
            }
            other => panic!("expected island changed, got {other:?}"),
        }

        match alice_west.recv().await {
            Some(ServerMessage::IslandChanged(m)) => {
                assert_eq!(m.peers.len(), 1);
                assert_eq!(m.peers[&1], position(1.0));
            }
            other => panic!("expected island changed, got {other:?}"),
        }

        // carol never subscribed
        assert!(carol_east
            .recv_within(Duration::from_millis(100))
            .await
            .is_none());

        east.stop().await;
        west.stop().await;
    }

    #[tokio::test]
    async fn test_join_and_leave_only_for_local_peers() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let east = ServedGateway::start_on(test_config(1000), bus.clone()).await;
        let west = ServedGateway::start_on(test_config(1000), bus.clone()).await;

        let alice = Identity::from_seed(1);
        let bob = Identity::from_seed(2);

        let mut watcher_east = east.client().await;
        watcher_east.authenticate(&alice).await;
        let mut watcher_west = west.client().await;
        watcher_west.authenticate(&alice).await;
        let mut bob_east = east.client().await;
        let bob_alias = bob_east.authenticate(&bob).await;

        for watcher in [&mut watcher_east, &mut watcher_west] {
            subscribe(watcher, "island.I1.peer_join").await;
            subscribe(watcher, "island.I1.peer_left").await;
        }
        settle().await;

        let join = JoinIslandMessage {
            island_id: "I1".into(),
            peer_id: bob.address.clone(),
        };
        bus.publish(
            &format!("{SUBJECT_PREFIX}island.I1.peer_join"),
            Bytes::from(join.encode_to_vec()),
        )
        .await;

        match watcher_east.recv().await {
            Some(ServerMessage::JoinIsland(m)) => {
                assert_eq!(m.island_id, "I1");
                assert_eq!(m.peer_id, bob_alias);
            }
            other => panic!("expected join island, got {other:?}"),
        }
        // bob has no alias on west, so nothing is forwarded there
        assert!(watcher_west
            .recv_within(Duration::from_millis(100))
            .await
            .is_none());

        let left = LeftIslandMessage {
            island_id: "I1".into(),
            peer_id: bob.address.clone(),
        };
        bus.publish(
            &format!("{SUBJECT_PREFIX}island.I1.peer_left"),
            Bytes::from(left.encode_to_vec()),
        )
        .await;

        match watcher_east.recv().await {
            Some(ServerMessage::LeftIsland(m)) => assert_eq!(m.peer_id, bob_alias),
            other => panic!("expected left island, got {other:?}"),
        }

        settle().await;
        let dropped = west.service.metrics().to_prometheus();
        assert!(dropped.contains("comms_gateway_bus_dropped_total 2"));

        east.stop().await;
        west.stop().await;
    }

    #[tokio::test]
    async fn test_malformed_bus_payload_keeps_bridge_alive() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let server = ServedGateway::start_on(test_config(1000), bus.clone()).await;
        let alice = Identity::from_seed(1);

        let mut client = server.client().await;
        let alias = client.authenticate(&alice).await;
        subscribe(&mut client, "island.I1.peer_join").await;
        settle().await;

        bus.publish(
            &format!("{SUBJECT_PREFIX}island.I1.peer_join"),
            Bytes::from_static(&[0xff, 0xff, 0xff]),
        )
        .await;

        let join = JoinIslandMessage {
            island_id: "I1".into(),
            peer_id: alice.address.clone(),
        };
        bus.publish(
            &format!("{SUBJECT_PREFIX}island.I1.peer_join"),
            Bytes::from(join.encode_to_vec()),
        )
        .await;

        match client.recv().await {
            Some(ServerMessage::JoinIsland(m)) => assert_eq!(m.peer_id, alias),
            other => panic!("expected join island, got {other:?}"),
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn test_shutdown_releases_bus_subscriptions() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let server = ServedGateway::start_on(test_config(1000), bus.clone()).await;
        assert_eq!(bus.subscriber_count(), 3);

        server.stop().await;

        tokio::time::timeout(WAIT, async {
            while bus.subscriber_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("bridge subscriptions dropped on shutdown");
    }
}
