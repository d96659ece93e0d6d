//! Dispatch matching under concurrent rule churn

use futures::future::join_all;
use sip_registry::domain::{
    CreateSipDispatchRule, CreateSipTrunk, DispatchRuleKind, InboundCall,
};
use sip_registry::infrastructure::persistence::MemoryEntityStore;
use sip_registry::{DomainError, SipService};
use std::sync::Arc;

fn call() -> InboundCall {
    InboundCall {
        trunk_address: "10.0.0.5".to_string(),
        called_number: "+15551234".to_string(),
        caller_number: "+15559876".to_string(),
    }
}

fn direct_rule(trunk_ids: Vec<String>, room: &str) -> CreateSipDispatchRule {
    CreateSipDispatchRule {
        rule: DispatchRuleKind::Direct {
            room_name: room.to_string(),
        },
        trunk_ids,
        hide_phone_number: false,
    }
}

async fn service_with_trunk() -> (SipService, String) {
    let service = SipService::new(Some(Arc::new(MemoryEntityStore::new())));
    let trunk = service
        .create_sip_trunk(CreateSipTrunk {
            inbound_addresses: vec!["10.0.0.5".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    (service, trunk.sip_trunk_id)
}

#[tokio::test]
async fn test_repeated_matches_are_identical() {
    let (service, trunk_id) = service_with_trunk().await;
    for i in 0..5 {
        service
            .create_sip_dispatch_rule(direct_rule(vec![trunk_id.clone()], &format!("room-{}", i)))
            .await
            .unwrap();
    }
    service
        .create_sip_dispatch_rule(direct_rule(vec![], "fallback"))
        .await
        .unwrap();

    let first = service.match_sip_dispatch_rule(&call()).await.unwrap();
    let results = join_all((0..50).map(|_| {
        let service = service.clone();
        async move { service.match_sip_dispatch_rule(&call()).await }
    }))
    .await;

    for result in results {
        assert_eq!(result.unwrap(), first);
    }

    let rules = service.list_sip_dispatch_rule().await.unwrap();
    let expected = rules
        .iter()
        .filter(|r| !r.is_wildcard())
        .map(|r| r.sip_dispatch_rule_id.clone())
        .min()
        .unwrap();
    assert_eq!(first.sip_dispatch_rule_id, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deleted_rule_is_never_matched_again() {
    let (service, trunk_id) = service_with_trunk().await;

    for round in 0..20 {
        let rule = service
            .create_sip_dispatch_rule(direct_rule(vec![trunk_id.clone()], "churn"))
            .await
            .unwrap();

        // Matches racing the delete may or may not see the rule, but must
        // never fail with anything other than "no route".
        let matchers: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.match_sip_dispatch_rule(&call()).await })
            })
            .collect();

        service
            .delete_sip_dispatch_rule(&rule.sip_dispatch_rule_id)
            .await
            .unwrap();

        for handle in matchers {
            match handle.await.unwrap() {
                Ok(decision) => assert_eq!(decision.sip_dispatch_rule_id, rule.sip_dispatch_rule_id),
                Err(DomainError::NotFound(_)) => {}
                Err(other) => panic!("round {}: unexpected error {:?}", round, other),
            }
        }

        // Once the delete has completed the rule is gone for good
        let err = service.match_sip_dispatch_rule(&call()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_ids() {
    let (service, trunk_id) = service_with_trunk().await;

    let created = join_all((0..32).map(|i| {
        let service = service.clone();
        let trunk_id = trunk_id.clone();
        async move {
            service
                .create_sip_dispatch_rule(direct_rule(vec![trunk_id], &format!("room-{}", i)))
                .await
        }
    }))
    .await;

    let mut ids: Vec<String> = created
        .into_iter()
        .map(|r| r.unwrap().sip_dispatch_rule_id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 32);

    let listed = service.list_sip_dispatch_rule().await.unwrap();
    assert_eq!(listed.len(), 32);
}

#[tokio::test]
async fn test_stale_rule_after_trunk_removed_out_of_band() {
    let store = Arc::new(MemoryEntityStore::new());
    let service = SipService::new(Some(store.clone()));

    let doomed = service
        .create_sip_trunk(CreateSipTrunk {
            inbound_addresses: vec!["10.0.0.9".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    let live = service
        .create_sip_trunk(CreateSipTrunk {
            inbound_addresses: vec!["10.0.0.5".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    service
        .create_sip_dispatch_rule(direct_rule(vec![doomed.sip_trunk_id.clone()], "gone"))
        .await
        .unwrap();
    let fallback = service
        .create_sip_dispatch_rule(direct_rule(vec![], "fallback"))
        .await
        .unwrap();

    // Simulate the check-then-insert race: the trunk vanishes after the rule
    // referencing it was accepted.
    use sip_registry::domain::{EntityKind, EntityStore};
    assert!(store
        .delete(EntityKind::SipTrunk, &doomed.sip_trunk_id)
        .await
        .unwrap());

    let decision = service.match_sip_dispatch_rule(&call()).await.unwrap();
    assert_eq!(decision.sip_trunk_id, live.sip_trunk_id);
    assert_eq!(decision.sip_dispatch_rule_id, fallback.sip_dispatch_rule_id);

    let err = service
        .match_sip_dispatch_rule(&InboundCall {
            trunk_address: "10.0.0.9".to_string(),
            ..call()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
}
