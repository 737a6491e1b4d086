//! Request/response correlation tests

#[cfg(test)]
mod tests {
    use crate::common::*;
    use crossnode_protocol::models::AuthenticationRequest;
    use crossnode_protocol::{
        CorrelationEntry, CorrelationError, CorrelationStore, InMemoryCacheBackend, ProtocolError, Stage,
    };
    use futures::future::join_all;
    use std::sync::Arc;
    use std::time::Duration;

    // ============================================================
    // Pipeline
    // ============================================================

    #[tokio::test]
    async fn test_concurrent_responses_consume_once() {
        let h = connector();
        let prepared = h
            .engine
            .prepare_request(
                outbound_request("_corr1", h.now()).build(),
                &entity(PROXY_SERVICE),
                None,
            )
            .await
            .unwrap();

        // Distinct response identifiers, so only correlation stands between
        // them and acceptance.
        let deliveries: Vec<_> = (0..8)
            .map(|i| {
                let response =
                    response_to(&format!("_corr1-resp{i}"), &prepared.request, h.now()).build();
                signed_response(&response, PS_KEY)
            })
            .collect();

        let results = join_all(deliveries.into_iter().map(|inbound| {
            let engine = h.engine.clone();
            async move { engine.validate_response(inbound).await }
        }))
        .await;

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        let no_session = results
            .iter()
            .filter(|r| matches!(r, Err(e) if matches!(e.error, ProtocolError::InvalidSession(_))))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(no_session, 7);
    }

    #[tokio::test]
    async fn test_response_to_unknown_request_is_refused() {
        let h = connector();
        let orphan = outbound_request("_never-sent", h.now()).build();
        let response = response_to("_corr2-resp", &orphan, h.now()).build();

        let rejection = h
            .engine
            .validate_response(signed_response(&response, PS_KEY))
            .await
            .unwrap_err();
        assert_eq!(rejection.stage, Stage::Correlated);
        assert_eq!(
            rejection.error,
            ProtocolError::InvalidSession("_never-sent".to_string())
        );
    }

    #[tokio::test]
    async fn test_expired_correlation_is_refused() {
        let h = connector();
        let prepared = h
            .engine
            .prepare_request(
                outbound_request("_corr3", h.now()).build(),
                &entity(PROXY_SERVICE),
                None,
            )
            .await
            .unwrap();

        h.clock.advance(chrono::Duration::minutes(11));

        let response = response_to("_corr3-resp", &prepared.request, h.now()).build();
        let rejection = h
            .engine
            .validate_response(signed_response(&response, PS_KEY))
            .await
            .unwrap_err();
        assert_eq!(rejection.stage, Stage::Correlated);
        assert!(matches!(rejection.error, ProtocolError::InvalidSession(_)));
    }

    #[tokio::test]
    async fn test_response_signed_by_another_party_keeps_session() {
        let h = connector();
        let prepared = h
            .engine
            .prepare_request(
                outbound_request("_corr4", h.now()).build(),
                &entity(PROXY_SERVICE),
                None,
            )
            .await
            .unwrap();

        // A forged response must not burn the pending exchange.
        let forged = response_to("_corr4-forged", &prepared.request, h.now()).build();
        let rejection = h
            .engine
            .validate_response(signed_response(&forged, LEGACY_PS_KEY))
            .await
            .unwrap_err();
        assert_eq!(rejection.stage, Stage::SignatureVerified);

        let genuine = response_to("_corr4-resp", &prepared.request, h.now()).build();
        assert!(h
            .engine
            .validate_response(signed_response(&genuine, PS_KEY))
            .await
            .is_ok());
    }

    // ============================================================
    // Store
    // ============================================================

    fn store() -> CorrelationStore<AuthenticationRequest> {
        CorrelationStore::new(
            "test",
            Arc::new(InMemoryCacheBackend::<CorrelationEntry<AuthenticationRequest>>::new()),
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn test_store_take_is_one_shot() {
        let store = store();
        let request = outbound_request("_corr5", chrono::Utc::now()).build();

        store
            .put(request.id(), request.clone(), Some("10.0.0.1".to_string()))
            .await
            .unwrap();

        let entry = store.take(request.id()).await.unwrap();
        assert_eq!(entry.request, request);
        assert_eq!(entry.remote_address.as_deref(), Some("10.0.0.1"));

        assert_eq!(
            store.take(request.id()).await,
            Err(CorrelationError::NotFound("_corr5".to_string()))
        );
    }

    #[tokio::test]
    async fn test_store_refuses_duplicate_identifier() {
        let store = store();
        let request = outbound_request("_corr6", chrono::Utc::now()).build();

        store.put(request.id(), request.clone(), None).await.unwrap();
        assert_eq!(
            store.put(request.id(), request.clone(), None).await,
            Err(CorrelationError::Duplicate("_corr6".to_string()))
        );

        // The original entry is untouched.
        assert!(store.take(request.id()).await.is_ok());
    }
}
