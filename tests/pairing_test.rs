//! Concurrency tests for matchmaking.
//!
//! These drive the registry and matchmaker directly, racing many attempts
//! at once and checking that the resulting pairs are disjoint and symmetric.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use duet::api::SessionState;
use duet::matchmaking::{MatchOutcome, Matchmaker, UnpairedPool};
use duet::session::{SessionHandle, SessionRegistry};

mod common;

use common::introduction;

async fn waiting_session(registry: &SessionRegistry, first_name: &str) -> SessionHandle {
    let handle = registry.create();
    handle
        .complete_introduction(introduction(first_name))
        .await
        .unwrap();
    handle
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_attempts_produce_disjoint_symmetric_pairs() {
    const N: usize = 16;

    let registry = Arc::new(SessionRegistry::new(Arc::new(UnpairedPool::new())));
    let matchmaker = Arc::new(Matchmaker::new(registry.clone()));

    let mut handles = Vec::with_capacity(N);
    for i in 0..N {
        handles.push(waiting_session(&registry, &format!("User{i}")).await);
    }

    // One attempt per session, all racing.
    let attempts = handles.iter().map(|h| {
        let matchmaker = matchmaker.clone();
        let id = h.id().to_string();
        tokio::spawn(async move { matchmaker.attempt(&id).await })
    });
    for result in join_all(attempts).await {
        result.unwrap().unwrap();
    }

    // Everyone ended up in a chat and the pool drained.
    let mut partner_of = HashMap::new();
    for handle in &handles {
        let view = handle.view().await.unwrap();
        assert_eq!(view.state, SessionState::Chatting, "{} not paired", view.id);
        partner_of.insert(view.id.clone(), view.partner_id.unwrap());
    }
    assert!(registry.pool().is_empty());

    // Pairs are symmetric, disjoint, and never reflexive.
    for (id, partner) in &partner_of {
        assert_ne!(id, partner, "session paired with itself");
        assert_eq!(
            partner_of.get(partner),
            Some(id),
            "{id} -> {partner} is not symmetric"
        );
    }
    let mut partners: Vec<&String> = partner_of.values().collect();
    partners.sort();
    partners.dedup();
    assert_eq!(partners.len(), N, "some session has two partners");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn symmetric_attempts_for_two_sessions_form_one_pair() {
    // Both sides of a would-be pair attempt at the same instant, repeatedly.
    for _ in 0..20 {
        let registry = Arc::new(SessionRegistry::new(Arc::new(UnpairedPool::new())));
        let matchmaker = Arc::new(Matchmaker::new(registry.clone()));

        let a = waiting_session(&registry, "Ana").await;
        let b = waiting_session(&registry, "Ben").await;

        let (ra, rb) = tokio::join!(
            {
                let m = matchmaker.clone();
                let id = a.id().to_string();
                async move { m.attempt(&id).await }
            },
            {
                let m = matchmaker.clone();
                let id = b.id().to_string();
                async move { m.attempt(&id).await }
            }
        );
        ra.unwrap();
        rb.unwrap();

        let a_view = a.view().await.unwrap();
        let b_view = b.view().await.unwrap();
        assert_eq!(a_view.partner_id.as_deref(), Some(b.id()));
        assert_eq!(b_view.partner_id.as_deref(), Some(a.id()));
        assert!(registry.pool().is_empty());
    }
}

#[tokio::test]
async fn attempt_with_empty_pool_leaves_caller_waiting() {
    let registry = Arc::new(SessionRegistry::new(Arc::new(UnpairedPool::new())));
    let matchmaker = Matchmaker::new(registry.clone());

    let a = waiting_session(&registry, "Ana").await;
    let outcome = matchmaker.attempt(a.id()).await.unwrap();

    assert_eq!(outcome, MatchOutcome::NoCandidates);
    assert_eq!(a.view().await.unwrap().state, SessionState::Waiting);
    assert!(registry.pool().contains(a.id()));
}

#[tokio::test]
async fn draw_picks_among_current_pool_members_only() {
    let registry = Arc::new(SessionRegistry::new(Arc::new(UnpairedPool::new())));
    let matchmaker = Matchmaker::new(registry.clone());

    let a = waiting_session(&registry, "Ana").await;
    let b = waiting_session(&registry, "Ben").await;
    let c = waiting_session(&registry, "Cam").await;

    let MatchOutcome::Paired { partner_id } = matchmaker.attempt(a.id()).await.unwrap() else {
        panic!("expected a pairing");
    };
    assert!(partner_id == b.id() || partner_id == c.id());

    // The session that was not drawn is the only one left waiting.
    let leftover = if partner_id == b.id() { &c } else { &b };
    assert_eq!(registry.pool().list(), vec![leftover.id().to_string()]);
    assert_eq!(
        leftover.view().await.unwrap().state,
        SessionState::Waiting
    );
}
