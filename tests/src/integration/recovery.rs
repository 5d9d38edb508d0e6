//! # Recovery Scenarios
//!
//! What a restarted node does with the state a stopped or crashed node left
//! behind:
//!
//! | Left behind | Outcome |
//! |-------------|---------|
//! | clean stop | continues at the next height |
//! | commit record missing | re-recorded from the application |
//! | application state lost | every block replayed, same app hashes |
//! | block log edited | `AppHashMismatch`, node does not start |
//! | `unsafe-reset-all` | fresh chain, same genesis |

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use node_runtime::consensus::{BlockStore, ConsensusEngineError};
    use node_runtime::{reset_all, LifecycleError, NodeRuntime};

    use crate::integration::fixtures::{start_options, wait_for_height, RecordingFatal, TestHome};

    /// Run a node until `height`, then stop it. Returns the block log height.
    async fn run_until(home: &TestHome, extra: &[&str], txs: &[&str], height: i64) -> i64 {
        let node = NodeRuntime::start_with(
            &home.config_path(),
            home.kv_gateway(),
            start_options(extra, Arc::default()),
        )
        .await
        .unwrap();
        for tx in txs {
            node.submit_tx(*tx).unwrap();
        }
        wait_for_height(&node, height).await;
        node.stop().await.unwrap();
        BlockStore::open(home.config().block_log_file())
            .unwrap()
            .height()
    }

    #[tokio::test]
    async fn test_missing_commit_record_is_restored() {
        let home = TestHome::new();
        let height = run_until(&home, &[], &["a=1"], 2).await;
        let expected = BlockStore::open(home.config().block_log_file())
            .unwrap()
            .app_hash(height)
            .cloned();

        // Crash after the application committed, before the commit record.
        let mut lines = home.block_log_lines();
        let last = lines.pop().unwrap();
        assert!(last.contains("\"commit\""));
        home.write_block_log_lines(&lines);

        let node = NodeRuntime::start_with(
            &home.config_path(),
            home.kv_gateway(),
            start_options(&["consensus.create_empty_blocks=false"], Arc::default()),
        )
        .await
        .unwrap();
        assert_eq!(node.last_committed_height(), height);
        node.stop().await.unwrap();

        let store = BlockStore::open(home.config().block_log_file()).unwrap();
        assert_eq!(store.app_hash(height).cloned(), expected);
    }

    #[tokio::test]
    async fn test_uncommitted_block_is_executed_on_restart() {
        let home = TestHome::new();
        let height = run_until(&home, &[], &[], 1).await;

        // Crash after the block record, before the application saw the block.
        let mut lines = home.block_log_lines();
        lines.push(format!(
            r#"{{"type":"block","height":{},"time":0,"proposer":"","txs":["{}"]}}"#,
            height + 1,
            hex::encode("late=1")
        ));
        home.write_block_log_lines(&lines);

        let node = NodeRuntime::start_with(
            &home.config_path(),
            home.kv_gateway(),
            start_options(&["consensus.create_empty_blocks=false"], Arc::default()),
        )
        .await
        .unwrap();
        assert_eq!(node.last_committed_height(), height + 1);
        assert_eq!(node.gateway().get(b"late"), Some(b"1".to_vec()));
        node.stop().await.unwrap();

        let store = BlockStore::open(home.config().block_log_file()).unwrap();
        assert!(store.app_hash(height + 1).is_some());
    }

    #[tokio::test]
    async fn test_lost_application_state_replays_identically() {
        let home = TestHome::new();
        let height = run_until(&home, &[], &["x=1", "y=2"], 3).await;
        let recorded: Vec<_> = {
            let store = BlockStore::open(home.config().block_log_file()).unwrap();
            (1..=height).map(|h| store.app_hash(h).cloned()).collect()
        };

        std::fs::remove_file(home.config().application_state_file()).unwrap();

        let node = NodeRuntime::start_with(
            &home.config_path(),
            home.kv_gateway(),
            start_options(&["consensus.create_empty_blocks=false"], Arc::default()),
        )
        .await
        .unwrap();
        assert_eq!(node.last_committed_height(), height);
        assert_eq!(node.gateway().get(b"y"), Some(b"2".to_vec()));
        node.stop().await.unwrap();

        let store = BlockStore::open(home.config().block_log_file()).unwrap();
        let replayed: Vec<_> = (1..=height).map(|h| store.app_hash(h).cloned()).collect();
        assert_eq!(replayed, recorded);
    }

    #[tokio::test]
    async fn test_edited_block_log_detected() {
        let home = TestHome::new();
        run_until(&home, &[], &["k=v"], 2).await;

        let original = hex::encode("k=v");
        let edited = hex::encode("k=w");
        let lines: Vec<String> = home
            .block_log_lines()
            .into_iter()
            .map(|line| line.replace(&original, &edited))
            .collect();
        home.write_block_log_lines(&lines);
        std::fs::remove_file(home.config().application_state_file()).unwrap();

        let fatal = Arc::new(RecordingFatal::default());
        let result = NodeRuntime::start_with(
            &home.config_path(),
            home.kv_gateway(),
            start_options(&[], Arc::clone(&fatal)),
        )
        .await;

        assert!(matches!(
            result,
            Err(LifecycleError::Consensus(
                ConsensusEngineError::AppHashMismatch { .. }
            ))
        ));
        assert!(fatal.errors().is_empty());
    }

    #[tokio::test]
    async fn test_reset_all_starts_fresh_chain() {
        let home = TestHome::new();
        run_until(&home, &[], &["k=v"], 3).await;
        let genesis_before = std::fs::read(home.config().genesis_file()).unwrap();

        reset_all(&home.config()).unwrap();
        assert!(!home.config().block_log_file().exists());
        assert!(!home.config().application_state_file().exists());

        let node = NodeRuntime::start_with(
            &home.config_path(),
            home.kv_gateway(),
            start_options(&["consensus.create_empty_blocks=false"], Arc::default()),
        )
        .await
        .unwrap();
        assert_eq!(node.last_committed_height(), 0);
        assert_eq!(node.gateway().get(b"k"), None);
        node.stop().await.unwrap();

        assert_eq!(
            std::fs::read(home.config().genesis_file()).unwrap(),
            genesis_before
        );
    }
}
