//! Replay protection tests

#[cfg(test)]
mod tests {
    use crate::common::*;
    use crossnode_protocol::anti_replay::ReplayRecord;
    use crossnode_protocol::{
        AntiReplayGuard, InMemoryCacheBackend, ProtocolError, ReplayKey, Stage,
    };
    use futures::future::join_all;
    use std::sync::Arc;
    use std::time::Duration;

    fn all_levels() -> Vec<crossnode_protocol::models::LevelOfAssurance> {
        use crossnode_protocol::models::NotifiedLevel;
        vec![
            NotifiedLevel::High.into(),
            NotifiedLevel::Substantial.into(),
            NotifiedLevel::Low.into(),
        ]
    }

    // ============================================================
    // Requests
    // ============================================================

    #[tokio::test]
    async fn test_replayed_request_is_refused() {
        let h = proxy_service(all_levels());
        let request = inbound_request("_replay1", h.now()).build();
        let inbound = signed_request(&request, SP_KEY);

        assert!(h.engine.validate_request(inbound.clone()).await.is_ok());

        let rejection = h.engine.validate_request(inbound).await.unwrap_err();
        assert_eq!(rejection.stage, Stage::ReplayChecked);
        assert_eq!(
            rejection.error,
            ProtocolError::Replay {
                message_id: "_replay1".to_string(),
                scope: "BE".to_string(),
            }
        );
        // Nothing is sent back for a replay.
        assert!(rejection.context().is_none());
        assert!(h.engine.error_response(&rejection).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repeated_replays_are_all_refused() {
        let h = proxy_service(all_levels());
        let request = inbound_request("_replay2", h.now()).build();
        let inbound = signed_request(&request, SP_KEY);
        h.engine.validate_request(inbound.clone()).await.unwrap();

        for i in 0..10 {
            let result = h.engine.validate_request(inbound.clone()).await;
            assert!(
                matches!(&result, Err(r) if r.stage == Stage::ReplayChecked),
                "Replay attempt {} should have been blocked",
                i + 1
            );
        }
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_are_accepted_once() {
        let h = proxy_service(all_levels());
        let request = inbound_request("_replay3", h.now()).build();
        let inbound = signed_request(&request, SP_KEY);

        let results = join_all((0..16).map(|_| {
            let engine = h.engine.clone();
            let inbound = inbound.clone();
            async move { engine.validate_request(inbound).await }
        }))
        .await;

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        let replays = results
            .iter()
            .filter(|r| matches!(r, Err(e) if matches!(e.error, ProtocolError::Replay { .. })))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(replays, 15);
    }

    #[tokio::test]
    async fn test_identifier_is_scoped_by_origin_country() {
        let h = proxy_service(all_levels());
        let first = inbound_request("_replay4", h.now()).build();
        let second = inbound_request("_replay4", h.now())
            .origin_country(Some("FR".parse().unwrap()))
            .build();

        assert!(h
            .engine
            .validate_request(signed_request(&first, SP_KEY))
            .await
            .is_ok());
        assert!(h
            .engine
            .validate_request(signed_request(&second, SP_KEY))
            .await
            .is_ok());
    }

    // ============================================================
    // Responses
    // ============================================================

    #[tokio::test]
    async fn test_replayed_response_is_refused_before_correlation() {
        let h = connector();
        let prepared = h
            .engine
            .prepare_request(
                outbound_request("_replay5", h.now()).build(),
                &entity(PROXY_SERVICE),
                None,
            )
            .await
            .unwrap();

        let response = response_to("_replay5-resp", &prepared.request, h.now()).build();
        let inbound = signed_response(&response, PS_KEY);

        assert!(h.engine.validate_response(inbound.clone()).await.is_ok());

        let rejection = h.engine.validate_response(inbound).await.unwrap_err();
        assert_eq!(rejection.stage, Stage::ReplayChecked);
    }

    // ============================================================
    // Guard
    // ============================================================

    #[tokio::test]
    async fn test_guard_records_each_key_once_under_contention() {
        let guard = AntiReplayGuard::new(
            Arc::new(InMemoryCacheBackend::<ReplayRecord>::new()),
            Duration::from_secs(3600),
        );
        let key = ReplayKey::new("_contended".parse().unwrap(), "BE");

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let guard = guard.clone();
                let key = key.clone();
                tokio::spawn(async move { guard.mark_if_absent(&key).await.unwrap() })
            })
            .collect();

        let mut recorded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                recorded += 1;
            }
        }
        assert_eq!(recorded, 1);
    }

    #[tokio::test]
    async fn test_guard_keeps_scopes_apart() {
        let guard = AntiReplayGuard::new(
            Arc::new(InMemoryCacheBackend::<ReplayRecord>::new()),
            Duration::from_secs(3600),
        );
        let id: crossnode_core::MessageId = "_scoped".parse().unwrap();

        assert!(guard
            .mark_if_absent(&ReplayKey::new(id.clone(), "BE"))
            .await
            .unwrap());
        assert!(guard
            .mark_if_absent(&ReplayKey::new(id.clone(), "FR"))
            .await
            .unwrap());
        assert!(!guard
            .mark_if_absent(&ReplayKey::new(id, "BE"))
            .await
            .unwrap());
    }
}
