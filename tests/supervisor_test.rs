//! Supervisor integration tests
//!
//! Tests cover:
//! - Unlock, START options and scanning resume
//! - Scanning gated by tier, stop idempotence
//! - Polling cadence across restarts
//! - DAY account attachment and detach
//! - Worker request/response and event handling

mod common;

use std::time::Duration;

use serde_json::json;

use common::{
    day_owner_address, keystore_json, ownership_proof, settle, Harness, PASSWORD,
    TIMENODE_ADDRESS,
};
use timenode::storage::{keys, KeyValueStore};
use timenode::supervisor::{LogView, StrategyUpdate, SupervisorError, SupervisorEvent, SupervisorState};
use timenode::worker::{
    BalancesUpdate, LogEntry, LogLevel, NetworkInfo, StatsUpdate, WorkerCommand, WorkerEvent,
};
use timenode::NodeTier;

fn start_options(harness: &Harness) -> timenode::worker::WorkerOptions {
    harness
        .worker
        .commands()
        .into_iter()
        .find_map(|c| match c {
            WorkerCommand::Start(options) => Some(*options),
            _ => None,
        })
        .expect("START was sent")
}

fn log(level: LogLevel, message: &str) -> WorkerEvent {
    WorkerEvent::Log {
        value: LogEntry {
            level,
            message: message.to_string(),
            timestamp: 0,
        },
    }
}

// =============================================================================
// Unlock
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unlock_starts_worker() {
    let mut h = Harness::with_wallet().await;

    h.supervisor.unlock(PASSWORD).await.unwrap();
    settle().await;

    assert_eq!(h.supervisor.state().await, SupervisorState::Running);
    assert_eq!(h.supervisor.generation(), 1);
    assert_eq!(h.worker.spawns(), 1);

    let options = start_options(&h);
    assert_eq!(options.network.id, 1);
    assert_eq!(options.keystore, vec![keystore_json(TIMENODE_ADDRESS, PASSWORD)]);
    assert_eq!(options.keystore_password, PASSWORD);
    assert!(options.custom_provider_url.is_none());
    assert!(options.day_account_address.is_none());
    assert!(!options.claiming);

    // Every poll fires once on start
    for name in [
        "update-stats",
        "update-balances",
        "get-network-info",
        "bounties-graph-data",
        "processed-transactions",
    ] {
        assert_eq!(h.worker.count(name), 1, "{name}");
    }
    assert_eq!(h.worker.count("start-scanning"), 0);
    assert!(h.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unlock_without_keystore() {
    let mut h = Harness::new();

    let result = h.supervisor.unlock(PASSWORD).await;

    assert!(matches!(result, Err(SupervisorError::MissingKeystore)));
    assert_eq!(h.worker.spawns(), 0);
    assert_eq!(h.supervisor.state().await, SupervisorState::Idle);
    assert_eq!(
        h.notifications(),
        vec!["Unable to unlock the TimeNode. Please try again"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unlock_with_empty_password() {
    let mut h = Harness::with_wallet().await;

    assert!(matches!(
        h.supervisor.unlock("").await,
        Err(SupervisorError::MissingPassword)
    ));
    assert_eq!(h.worker.spawns(), 0);
    assert_eq!(
        h.notifications(),
        vec!["Unable to unlock the TimeNode. Please try again"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unlock_resumes_scanning() {
    let h = Harness::with_wallet().await;
    h.storage.set_flag(keys::SCANNING, true).unwrap();

    h.supervisor.unlock(PASSWORD).await.unwrap();
    settle().await;

    assert_eq!(h.supervisor.state().await, SupervisorState::Scanning);
    assert!(h.supervisor.session().await.scanning_active);
    assert_eq!(h.worker.count("start-scanning"), 1);
    // One from the immediate poll, one requested by start_scanning
    assert_eq!(h.worker.count("update-stats"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_options_carry_provider_and_strategy() {
    let h = Harness::with_wallet().await;
    h.supervisor
        .set_custom_provider(42, "http://kovan.local:8545")
        .await
        .unwrap();
    h.supervisor
        .save_claiming_strategy(
            true,
            &StrategyUpdate {
                max_deposit: Some("1.5".to_string()),
                max_gas_subsidy: Some("50".to_string()),
                ..StrategyUpdate::default()
            },
        )
        .await
        .unwrap();

    h.supervisor.unlock(PASSWORD).await.unwrap();

    let options = start_options(&h);
    assert_eq!(options.network.id, 42);
    assert_eq!(options.network.name, "Kovan");
    assert_eq!(
        options.custom_provider_url.as_deref(),
        Some("http://kovan.local:8545")
    );
    assert!(options.claiming);
    assert_eq!(options.economic_strategy.max_deposit, 1_500_000_000_000_000_000);
    assert_eq!(options.economic_strategy.max_gas_subsidy, 50);
    assert_eq!(options.economic_strategy.min_claim_window, 30);
}

#[tokio::test(start_paused = true)]
async fn test_worker_that_never_starts() {
    let h = Harness::with_wallet().await;
    h.worker.silent_start();

    let supervisor = h.supervisor.clone();
    let unlock = tokio::spawn(async move { supervisor.unlock(PASSWORD).await });
    settle().await;

    assert_eq!(h.supervisor.state().await, SupervisorState::Starting);
    assert_eq!(h.worker.count("start"), 1);
    // No polls before STARTED
    assert_eq!(h.worker.count("update-stats"), 0);

    h.worker.emit(WorkerEvent::Started).await;
    unlock.await.unwrap().unwrap();
    assert_eq!(h.supervisor.state().await, SupervisorState::Running);
}

// =============================================================================
// Scanning
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_scanning_is_idempotent() {
    let h = Harness::new();

    h.supervisor.stop_scanning().await.unwrap();
    h.supervisor.stop_scanning().await.unwrap();

    assert!(h.worker.commands().is_empty());
    assert!(!h.scanning_flag());
    assert!(!h.supervisor.session().await.scanning_active);
    assert_eq!(h.supervisor.state().await, SupervisorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_scanning_twice_with_worker() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();
    h.supervisor.start_scanning().await.unwrap();
    assert!(h.scanning_flag());

    h.supervisor.stop_scanning().await.unwrap();
    h.supervisor.stop_scanning().await.unwrap();
    settle().await;

    assert!(!h.scanning_flag());
    assert!(!h.supervisor.session().await.scanning_active);
    assert_eq!(h.supervisor.state().await, SupervisorState::Running);
    assert!(h.supervisor.has_worker().await);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_tier_cannot_scan() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();

    h.worker
        .emit(WorkerEvent::UpdateBalances(BalancesUpdate {
            balance_eth: Some(0.5),
            balance_day: Some(10),
            is_time_mint: Some(false),
        }))
        .await;
    settle().await;
    assert_eq!(h.supervisor.node_tier().await, NodeTier::Disabled);

    h.worker.clear();
    h.supervisor.start_scanning().await.unwrap();
    settle().await;

    assert!(h.worker.commands().is_empty());
    assert!(!h.scanning_flag());
    assert!(!h.supervisor.session().await.scanning_active);
    assert_eq!(h.supervisor.state().await, SupervisorState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_liveness_while_scanning() {
    let mut h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();
    h.supervisor.start_scanning().await.unwrap();
    settle().await;

    let liveness = |events: Vec<SupervisorEvent>| {
        events
            .into_iter()
            .filter(|e| matches!(e, SupervisorEvent::Liveness { .. }))
            .count()
    };
    let mut drain = || {
        let mut seen = Vec::new();
        while let Ok(event) = h.events.try_recv() {
            seen.push(event);
        }
        seen
    };

    assert_eq!(liveness(drain()), 1);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(liveness(drain()), 1);

    h.supervisor.stop_scanning().await.unwrap();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(liveness(drain()), 0);
}

// =============================================================================
// Polling across restarts
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_restart_keeps_one_timer_per_poll() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();

    h.supervisor.restart(PASSWORD).await.unwrap();
    h.supervisor.restart(PASSWORD).await.unwrap();
    settle().await;

    assert_eq!(h.worker.spawns(), 3);
    assert_eq!(h.supervisor.generation(), 3);
    assert_eq!(h.supervisor.state().await, SupervisorState::Scanning);

    h.worker.clear();
    tokio::time::sleep(Duration::from_secs(15)).await;

    // One timer each: stats every 5s, balances and network info every 15s
    assert_eq!(h.worker.count("update-stats"), 3);
    assert_eq!(h.worker.count("update-balances"), 1);
    assert_eq!(h.worker.count("get-network-info"), 1);
    assert_eq!(h.worker.count("bounties-graph-data"), 0);
    assert_eq!(h.worker.count("processed-transactions"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_started_restarts_timers() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();

    h.worker.emit(WorkerEvent::Started).await;
    h.worker.emit(WorkerEvent::Started).await;
    settle().await;
    h.worker.clear();

    tokio::time::sleep(Duration::from_secs(15)).await;

    assert_eq!(h.worker.count("update-stats"), 3);
    assert_eq!(h.worker.count("update-balances"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_worker_events_ignored() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();
    h.supervisor.restart(PASSWORD).await.unwrap();
    assert_eq!(h.supervisor.generation(), 2);

    let update = |discovered| {
        WorkerEvent::UpdateStats(StatsUpdate {
            discovered: Some(discovered),
            ..StatsUpdate::default()
        })
    };

    h.worker.emit_from(1, update(99)).await;
    settle().await;
    assert_eq!(h.supervisor.session().await.stats.discovered, 0);

    h.worker.emit_from(2, update(7)).await;
    settle().await;
    assert_eq!(h.supervisor.session().await.stats.discovered, 7);
}

// =============================================================================
// DAY account
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_attach_day_account() {
    let mut h = Harness::with_wallet().await;
    h.chain.set_balance(1000, 0);

    let tier = h
        .supervisor
        .attach_day_account(&ownership_proof(TIMENODE_ADDRESS))
        .await
        .unwrap();

    assert_eq!(tier, NodeTier::ChronoNode);
    assert_eq!(h.supervisor.node_tier().await, NodeTier::ChronoNode);
    assert_eq!(h.notifications(), vec!["Success."]);

    // Persisted encrypted
    let sealed = h.persisted(keys::ATTACHED_DAY_ACCOUNT).unwrap();
    assert!(!sealed.contains(&day_owner_address()[2..]));
    assert_eq!(
        h.supervisor.attached_day_address().unwrap(),
        Some(day_owner_address())
    );
}

#[tokio::test(start_paused = true)]
async fn test_attached_account_sent_with_start() {
    let h = Harness::with_wallet().await;
    h.chain.set_balance(5000, 0);
    h.supervisor
        .attach_day_account(&ownership_proof(TIMENODE_ADDRESS))
        .await
        .unwrap();

    h.supervisor.unlock(PASSWORD).await.unwrap();

    assert_eq!(
        start_options(&h).day_account_address,
        Some(day_owner_address())
    );
    assert_eq!(h.supervisor.node_tier().await, NodeTier::MasterChronoNode);
}

#[tokio::test(start_paused = true)]
async fn test_minting_power_reaches_timenode_tier() {
    let h = Harness::with_wallet().await;
    h.chain.set_balance(100, 1);

    let tier = h
        .supervisor
        .attach_day_account(&ownership_proof(TIMENODE_ADDRESS))
        .await
        .unwrap();

    assert_eq!(tier, NodeTier::TimeNode);
}

#[tokio::test(start_paused = true)]
async fn test_attach_with_insufficient_balance() {
    let mut h = Harness::with_wallet().await;
    h.chain.set_balance(100, 0);

    let result = h
        .supervisor
        .attach_day_account(&ownership_proof(TIMENODE_ADDRESS))
        .await;

    assert!(matches!(result, Err(SupervisorError::InsufficientBalance(100))));
    assert_eq!(
        h.notifications(),
        vec!["Not enough DAY tokens. Current balance: 100"]
    );
    assert!(h.persisted(keys::ATTACHED_DAY_ACCOUNT).is_none());
    assert_eq!(h.supervisor.node_tier().await, NodeTier::Loading);
}

#[tokio::test(start_paused = true)]
async fn test_attach_on_network_without_day_token() {
    let mut h = Harness::with_wallet().await;
    h.supervisor
        .set_custom_provider(1337, "http://devnet:8545")
        .await
        .unwrap();
    h.chain.set_balance(5000, 0);

    let result = h
        .supervisor
        .attach_day_account(&ownership_proof(TIMENODE_ADDRESS))
        .await;

    assert!(matches!(result, Err(SupervisorError::UnsupportedProvider)));
    assert_eq!(h.notifications(), vec!["Unsupported custom provider."]);
    assert_eq!(h.chain.balance_lookups.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_attach_proof_for_other_timenode() {
    let h = Harness::with_wallet().await;
    h.chain.set_balance(5000, 0);

    let result = h
        .supervisor
        .attach_day_account(&ownership_proof("0x1111111111111111111111111111111111111111"))
        .await;

    assert!(matches!(result, Err(SupervisorError::Signature(_))));
    assert!(h.persisted(keys::ATTACHED_DAY_ACCOUNT).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_detach_wallet() {
    let mut h = Harness::with_wallet().await;
    h.chain.set_balance(1000, 0);
    h.supervisor
        .attach_day_account(&ownership_proof(TIMENODE_ADDRESS))
        .await
        .unwrap();
    h.supervisor
        .save_claiming_strategy(true, &StrategyUpdate::default())
        .await
        .unwrap();
    h.supervisor.unlock(PASSWORD).await.unwrap();
    h.supervisor.start_scanning().await.unwrap();
    h.notifications();

    h.supervisor.detach_wallet().await.unwrap();
    settle().await;

    for key in [
        keys::TIMENODE,
        keys::ATTACHED_DAY_ACCOUNT,
        keys::CLAIMING,
        keys::SCANNING,
    ] {
        assert!(h.persisted(key).is_none(), "{key}");
    }
    assert!(!h.supervisor.has_worker().await);
    assert_eq!(h.supervisor.state().await, SupervisorState::Stopped);
    assert_eq!(h.supervisor.generation(), 2);
    assert_eq!(h.supervisor.node_tier().await, NodeTier::Loading);
    assert_eq!(h.supervisor.my_address().unwrap(), None);
    assert_eq!(h.notifications(), vec!["Your wallet has been detached."]);

    // Polls stopped with the worker
    h.worker.clear();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.worker.commands().is_empty());
}

// =============================================================================
// Keystore
// =============================================================================

#[tokio::test]
async fn test_password_check_notifies() {
    let mut h = Harness::with_wallet().await;

    assert!(h.supervisor.password_matches_keystore(PASSWORD));
    assert!(!h.supervisor.password_matches_keystore("wrong"));
    assert_eq!(
        h.notifications(),
        vec!["Success.", "Please enter a valid password."]
    );
}

#[tokio::test]
async fn test_keystore_encrypted_at_rest() {
    let h = Harness::with_wallet().await;

    let sealed = h.persisted(keys::TIMENODE).unwrap();
    assert!(!sealed.contains("crypto"));
    assert_eq!(
        h.supervisor.my_address().unwrap().as_deref(),
        Some(TIMENODE_ADDRESS)
    );
}

#[tokio::test]
async fn test_session_restored_from_storage() {
    let first = Harness::with_wallet().await;
    first
        .supervisor
        .save_claiming_strategy(
            true,
            &StrategyUpdate {
                min_balance: Some("2".to_string()),
                ..StrategyUpdate::default()
            },
        )
        .await
        .unwrap();

    let second = Harness::with_storage(first.storage.clone());
    let session = second.supervisor.session().await;

    assert!(session.wallet_keystore.is_some());
    assert!(session.claiming_enabled);
    assert_eq!(session.economic_strategy.min_balance, 2_000_000_000_000_000_000);
}

// =============================================================================
// Worker requests and events
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_claimed_transactions_round_trip() {
    let h = Harness::with_wallet().await;
    h.worker
        .set_claimed(vec![json!({"address": "0x01"}), json!({"address": "0x02"})]);
    h.supervisor.unlock(PASSWORD).await.unwrap();

    let claimed = h
        .supervisor
        .get_claimed_not_executed_transactions()
        .await
        .unwrap();

    assert_eq!(claimed.len(), 2);
    assert_eq!(claimed[1]["address"], "0x02");
}

#[tokio::test(start_paused = true)]
async fn test_claimed_request_in_flight_rejected() {
    let h = Harness::with_wallet().await;
    h.worker.hold_claimed();
    h.supervisor.unlock(PASSWORD).await.unwrap();

    let supervisor = h.supervisor.clone();
    let first =
        tokio::spawn(async move { supervisor.get_claimed_not_executed_transactions().await });
    settle().await;

    assert!(matches!(
        h.supervisor.get_claimed_not_executed_transactions().await,
        Err(SupervisorError::RequestInFlight)
    ));
    assert_eq!(h.worker.count("get-claimed-not-executed-transactions"), 1);

    h.worker
        .emit(WorkerEvent::ReceivedClaimedNotExecutedTransactions {
            transactions: vec![json!({"address": "0x03"})],
        })
        .await;

    let claimed = first.await.unwrap().unwrap();
    assert_eq!(claimed, vec![json!({"address": "0x03"})]);

    // Unrequested replies are dropped, the slot is free again
    h.worker
        .emit(WorkerEvent::ReceivedClaimedNotExecutedTransactions {
            transactions: vec![json!({"address": "0x04"})],
        })
        .await;
    settle().await;
    let supervisor = h.supervisor.clone();
    let second =
        tokio::spawn(async move { supervisor.get_claimed_not_executed_transactions().await });
    settle().await;
    h.worker
        .emit(WorkerEvent::ReceivedClaimedNotExecutedTransactions {
            transactions: vec![],
        })
        .await;
    assert!(second.await.unwrap().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_claimed_request_fails_when_worker_exits() {
    let h = Harness::with_wallet().await;
    h.worker.hold_claimed();
    h.supervisor.unlock(PASSWORD).await.unwrap();

    let supervisor = h.supervisor.clone();
    let pending =
        tokio::spawn(async move { supervisor.get_claimed_not_executed_transactions().await });
    settle().await;

    h.worker.crash();
    settle().await;
    assert!(matches!(
        pending.await.unwrap(),
        Err(SupervisorError::WorkerLost)
    ));

    // The slot is free for the next worker
    h.supervisor.restart(PASSWORD).await.unwrap();
    let supervisor = h.supervisor.clone();
    let next =
        tokio::spawn(async move { supervisor.get_claimed_not_executed_transactions().await });
    settle().await;
    h.worker
        .emit(WorkerEvent::ReceivedClaimedNotExecutedTransactions {
            transactions: vec![json!({"address": "0x05"})],
        })
        .await;
    assert_eq!(next.await.unwrap().unwrap(), vec![json!({"address": "0x05"})]);
}

#[tokio::test(start_paused = true)]
async fn test_claimed_request_fails_on_restart() {
    let h = Harness::with_wallet().await;
    h.worker.hold_claimed();
    h.supervisor.unlock(PASSWORD).await.unwrap();

    let supervisor = h.supervisor.clone();
    let pending =
        tokio::spawn(async move { supervisor.get_claimed_not_executed_transactions().await });
    settle().await;

    h.supervisor.restart(PASSWORD).await.unwrap();
    assert!(matches!(
        pending.await.unwrap(),
        Err(SupervisorError::WorkerLost)
    ));
    assert_eq!(h.worker.spawns(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_requests_need_a_worker() {
    let h = Harness::with_wallet().await;

    assert!(matches!(
        h.supervisor.get_claimed_not_executed_transactions().await,
        Err(SupervisorError::NotRunning)
    ));
    assert!(matches!(
        h.supervisor.clear_stats().await,
        Err(SupervisorError::NotRunning)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_clear_stats() {
    let mut h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();
    h.worker.emit(log(LogLevel::Info, "scanning block 100")).await;
    settle().await;
    assert_eq!(h.supervisor.session().await.logs.len(), 1);
    h.worker.clear();

    h.supervisor.clear_stats().await.unwrap();
    settle().await;

    assert!(h.supervisor.session().await.logs.is_empty());
    assert_eq!(h.notifications(), vec!["Cleared the stats."]);
    assert_eq!(h.worker.count("clear-stats"), 1);
    assert_eq!(h.worker.count("update-stats"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_worker_logs() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();

    h.worker.emit(log(LogLevel::Cache, "cache hit")).await;
    h.worker.emit(log(LogLevel::Debug, "tick")).await;
    h.worker.emit(log(LogLevel::Error, "claim failed")).await;
    settle().await;

    let session = h.supervisor.session().await;
    assert_eq!(session.logs.len(), 2);
    let basic: Vec<_> = session.visible_logs().into_iter().map(|e| e.message).collect();
    assert_eq!(basic, vec!["claim failed"]);

    h.supervisor.set_log_view(LogView::Detailed).await;
    assert_eq!(h.supervisor.session().await.visible_logs().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_log_buffer_is_capped() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();

    for i in 0..1005 {
        h.worker
            .emit(log(LogLevel::Info, &format!("entry {i}")))
            .await;
    }
    settle().await;

    let session = h.supervisor.session().await;
    assert_eq!(session.logs.len(), 1000);
    assert_eq!(session.logs.iter().next().unwrap().message, "entry 5");
}

#[tokio::test(start_paused = true)]
async fn test_network_change_published() {
    let mut h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();
    settle().await;
    while h.events.try_recv().is_ok() {}

    let info = |block, net| {
        WorkerEvent::GetNetworkInfo(NetworkInfo {
            provider_block_number: Some(block),
            net_id: Some(net),
        })
    };

    h.worker.emit(info(100, 1)).await;
    h.worker.emit(info(101, 1)).await;
    h.worker.emit(info(102, 3)).await;
    settle().await;

    let mut changes = Vec::new();
    while let Ok(event) = h.events.try_recv() {
        if let SupervisorEvent::NetworkChanged { net_id } = event {
            changes.push(net_id);
        }
    }
    assert_eq!(changes, vec![3]);

    let session = h.supervisor.session().await;
    assert_eq!(session.provider_block_number, Some(102));
    assert_eq!(session.net_id, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_graph_polls_tracked() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();
    settle().await;

    let session = h.supervisor.session().await;
    assert!(session.updating_bounties_graph_in_progress);
    assert!(session.updating_processed_txs_in_progress);

    h.worker
        .emit(WorkerEvent::BountiesGraphData {
            data: json!({"labels": ["a"], "values": [1]}),
        })
        .await;
    settle().await;

    let session = h.supervisor.session().await;
    assert!(!session.updating_bounties_graph_in_progress);
    assert!(session.updating_processed_txs_in_progress);
    assert_eq!(session.bounties_graph_data.unwrap()["values"][0], 1);
}

#[tokio::test(start_paused = true)]
async fn test_worker_exit_stops_supervisor() {
    let mut h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();
    h.supervisor.start_scanning().await.unwrap();

    h.worker.crash();
    settle().await;

    assert_eq!(h.supervisor.state().await, SupervisorState::Stopped);
    assert!(!h.supervisor.has_worker().await);
    assert!(!h.supervisor.session().await.scanning_active);
    while h.events.try_recv().is_ok() {}

    // Polls and liveness died with the worker
    h.worker.clear();
    tokio::time::sleep(Duration::from_secs(901)).await;
    assert!(h.worker.commands().is_empty());
    let mut liveness = 0;
    while let Ok(event) = h.events.try_recv() {
        if matches!(event, SupervisorEvent::Liveness { .. }) {
            liveness += 1;
        }
    }
    assert_eq!(liveness, 0);

    // A restart brings it back
    h.supervisor.restart(PASSWORD).await.unwrap();
    assert_eq!(h.supervisor.state().await, SupervisorState::Scanning);
    assert_eq!(h.worker.spawns(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_detach_twice() {
    let h = Harness::with_wallet().await;
    h.supervisor.unlock(PASSWORD).await.unwrap();

    h.supervisor.detach_wallet().await.unwrap();
    h.supervisor.detach_wallet().await.unwrap();

    assert_eq!(h.supervisor.state().await, SupervisorState::Stopped);
    assert!(!h.supervisor.session().await.scanning_active);
}
