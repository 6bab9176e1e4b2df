//! # End-to-End WebSocket Tests
//!
//! Real clients against a served gateway, signing challenges with real
//! secp256k1 keys and the production chain verifier.

#[cfg(test)]
mod tests {
    use super::super::support::*;
    use chrono::Duration as ChronoDuration;
    use comms_gateway::protocol::{
        ClientMessage, Heartbeat, PublishRequest, ServerMessage, SubscribeRequest,
        UnsubscribeRequest,
    };
    use comms_gateway::AuthLink;
    use shared_bus::{MessageSubscriber, SUBJECT_PREFIX};
    use std::time::Duration;
    use tokio::time::timeout;

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    #[tokio::test]
    async fn test_direct_signature_is_welcomed() {
        let server = ServedGateway::start(test_config(1000)).await;
        let alice = Identity::from_seed(1);

        let mut client = server.client().await;
        let challenge = client.challenge().await;
        assert!(challenge.starts_with("dcl-"));

        client
            .send(signed_response(&alice.direct_chain(&challenge)))
            .await;
        assert_eq!(client.welcome().await, 1);

        client.close().await;
        server.stop().await;
    }

    #[tokio::test]
    async fn test_ephemeral_chain_is_welcomed() {
        let server = ServedGateway::start(test_config(1000)).await;
        let owner = Identity::from_seed(2);
        let ephemeral = Identity::from_seed(3);

        let mut client = server.client().await;
        let challenge = client.challenge().await;
        let chain = owner.ephemeral_chain(&ephemeral, &challenge, ChronoDuration::minutes(10));
        client.send(signed_response(&chain)).await;

        assert_eq!(client.welcome().await, 1);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_expired_ephemeral_closes() {
        let server = ServedGateway::start(test_config(1000)).await;
        let owner = Identity::from_seed(2);
        let ephemeral = Identity::from_seed(3);

        let mut client = server.client().await;
        let challenge = client.challenge().await;
        let chain = owner.ephemeral_chain(&ephemeral, &challenge, ChronoDuration::minutes(-1));
        client.send(signed_response(&chain)).await;

        client.expect_closed().await;
        server.stop().await;
    }

    #[tokio::test]
    async fn test_signature_by_other_key_closes() {
        let server = ServedGateway::start(test_config(1000)).await;
        let alice = Identity::from_seed(1);
        let mallory = Identity::from_seed(9);

        let mut client = server.client().await;
        let challenge = client.challenge().await;

        // Claims alice, signed by mallory
        let mut chain = mallory.direct_chain(&challenge);
        chain.0[0] = AuthLink::signer(&alice.address);
        client.send(signed_response(&chain)).await;

        client.expect_closed().await;
        let metrics = server.service.metrics();
        assert_eq!(metrics.handshake_failures("authentication_failure"), 1);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_signature_over_wrong_challenge_closes() {
        let server = ServedGateway::start(test_config(1000)).await;
        let alice = Identity::from_seed(1);

        let mut client = server.client().await;
        let _ = client.challenge().await;
        client
            .send(signed_response(&alice.direct_chain("dcl-not-the-challenge")))
            .await;

        client.expect_closed().await;
        server.stop().await;
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        let server = ServedGateway::start(test_config(100)).await;

        let mut client = server.client().await;
        let _ = client.challenge().await;

        client.expect_closed().await;
        assert_eq!(server.service.metrics().handshake_failures("timeout"), 1);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_heartbeat_before_auth_closes() {
        let server = ServedGateway::start(test_config(1000)).await;

        let mut client = server.client().await;
        let _ = client.challenge().await;
        client
            .send(ClientMessage::Heartbeat(Heartbeat {
                payload: b"early".to_vec(),
            }))
            .await;

        client.expect_closed().await;
        server.stop().await;
    }

    #[tokio::test]
    async fn test_text_frame_is_ignored() {
        let server = ServedGateway::start(test_config(1000)).await;
        let alice = Identity::from_seed(1);

        let mut client = server.client().await;
        let challenge = client.challenge().await;
        client.send_text("hello").await;
        client
            .send(signed_response(&alice.direct_chain(&challenge)))
            .await;

        assert_eq!(client.welcome().await, 1);
        server.stop().await;
    }

    // =========================================================================
    // TOPIC RELAY
    // =========================================================================

    #[tokio::test]
    async fn test_publish_reaches_other_subscribers_only() {
        let server = ServedGateway::start(test_config(1000)).await;
        let alice = Identity::from_seed(1);
        let bob = Identity::from_seed(2);

        let mut a = server.client().await;
        let mut b = server.client().await;
        let alias_a = a.authenticate(&alice).await;
        let alias_b = b.authenticate(&bob).await;
        assert_ne!(alias_a, alias_b);

        for client in [&mut a, &mut b] {
            client
                .send(ClientMessage::SubscribeRequest(SubscribeRequest {
                    topic: "room".into(),
                }))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        a.send(ClientMessage::PublishRequest(PublishRequest {
            topics: vec!["room".into()],
            payload: b"hi".to_vec(),
        }))
        .await;

        match b.recv().await {
            Some(ServerMessage::SubscriptionMessage(m)) => {
                assert_eq!(m.sender, alias_a);
                assert_eq!(m.topic, "room");
                assert_eq!(m.body, b"hi");
            }
            other => panic!("expected subscription message, got {other:?}"),
        }
        assert!(a.recv_within(Duration::from_millis(100)).await.is_none());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let server = ServedGateway::start(test_config(1000)).await;
        let mut a = server.client().await;
        let mut b = server.client().await;
        a.authenticate(&Identity::from_seed(1)).await;
        b.authenticate(&Identity::from_seed(2)).await;

        b.send(ClientMessage::SubscribeRequest(SubscribeRequest {
            topic: "room".into(),
        }))
        .await;
        b.send(ClientMessage::UnsubscribeRequest(UnsubscribeRequest {
            topic: "room".into(),
        }))
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        a.send(ClientMessage::PublishRequest(PublishRequest {
            topics: vec!["room".into()],
            payload: b"hi".to_vec(),
        }))
        .await;

        assert!(b.recv_within(Duration::from_millis(150)).await.is_none());
        server.stop().await;
    }

    // =========================================================================
    // BUS SIDE EFFECTS
    // =========================================================================

    #[tokio::test]
    async fn test_lifecycle_events_on_bus() {
        let server = ServedGateway::start(test_config(1000)).await;
        let alice = Identity::from_seed(1);
        let mut peer_events = server.bus.subscribe(&format!("{SUBJECT_PREFIX}peer.>"));

        let mut client = server.client().await;
        client.authenticate(&alice).await;

        let connect = timeout(WAIT, peer_events.recv()).await.unwrap().unwrap();
        assert_eq!(
            connect.subject,
            format!("{SUBJECT_PREFIX}peer.{}.connect", alice.address)
        );

        client
            .send(ClientMessage::Heartbeat(Heartbeat {
                payload: b"pos".to_vec(),
            }))
            .await;
        let heartbeat = timeout(WAIT, peer_events.recv()).await.unwrap().unwrap();
        assert_eq!(
            heartbeat.subject,
            format!("{SUBJECT_PREFIX}peer.{}.heartbeat", alice.address)
        );
        assert_eq!(&heartbeat.data[..], b"pos");

        client.close().await;
        let disconnect = timeout(WAIT, peer_events.recv()).await.unwrap().unwrap();
        assert_eq!(
            disconnect.subject,
            format!("{SUBJECT_PREFIX}peer.{}.disconnect", alice.address)
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_alias_released_after_disconnect() {
        let server = ServedGateway::start(test_config(1000)).await;
        let alice = Identity::from_seed(1);
        let mut peer_events = server.bus.subscribe(&format!("{SUBJECT_PREFIX}peer.*.disconnect"));

        let mut first = server.client().await;
        assert_eq!(first.authenticate(&alice).await, 1);
        first.close().await;
        timeout(WAIT, peer_events.recv()).await.unwrap().unwrap();
        assert!(server.service.gateway().aliases().lookup(&alice.address).is_none());

        let mut second = server.client().await;
        assert_eq!(second.authenticate(&alice).await, 2);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_status_and_metrics_after_traffic() {
        let server = ServedGateway::start(test_config(1000)).await;
        let mut client = server.client().await;
        client.authenticate(&Identity::from_seed(1)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let metrics = server.service.metrics();
        let text = metrics.to_prometheus();
        assert!(text.contains("comms_gateway_connections 1"));
        assert!(text.contains("comms_gateway_handshake_success_total 1"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_sockets_and_announces_disconnect() {
        let server = ServedGateway::start(test_config(1000)).await;
        let alice = Identity::from_seed(1);
        let mut disconnects = server
            .bus
            .subscribe(&format!("{SUBJECT_PREFIX}peer.*.disconnect"));

        let mut client = server.client().await;
        client.authenticate(&alice).await;
        server.stop().await;

        client.expect_closed().await;
        let disconnect = timeout(WAIT, disconnects.recv()).await.unwrap().unwrap();
        assert_eq!(
            disconnect.subject,
            format!("{SUBJECT_PREFIX}peer.{}.disconnect", alice.address)
        );
    }
}
