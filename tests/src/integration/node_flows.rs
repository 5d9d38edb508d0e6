//! # Node Flows
//!
//! Transactions through a running node:
//!
//! ```text
//! submit_tx ──CheckTx(New)──→ mempool ──PrepareProposal──→ block log
//!                                           │
//!            BeginBlock(h) DeliverTx* EndBlock Commit ──→ reference engine
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use abci_bridge::{Application, RequestQuery, CODE_UNSUPPORTED};
    use execution_gateway::{GatewayCall, JsonFileStore, KvStoreGateway, RecordingGateway};
    use node_runtime::consensus::BlockStore;
    use node_runtime::{MempoolError, NodeRuntime};
    use shared_types::{BlockHeight, KeyType};

    use crate::integration::fixtures::{start_options, wait_for_height, TestHome};

    type Recorded = RecordingGateway<KvStoreGateway<JsonFileStore>>;

    async fn start_recorded(home: &TestHome, extra: &[&str]) -> NodeRuntime<Recorded> {
        let gateway = RecordingGateway::new(home.kv_gateway());
        NodeRuntime::start_with(
            &home.config_path(),
            gateway,
            start_options(extra, Arc::default()),
        )
        .await
        .unwrap()
    }

    /// Split lifecycle calls into per-height groups, checking the shape of
    /// each group on the way.
    fn blocks(calls: &[GatewayCall]) -> Vec<(BlockHeight, Vec<Vec<u8>>)> {
        let mut blocks = Vec::new();
        let mut iter = calls.iter().peekable();
        while let Some(call) = iter.next() {
            let GatewayCall::BeginBlock(height) = call else {
                panic!("expected BeginBlock, got {call:?}");
            };
            let mut txs = Vec::new();
            while let Some(GatewayCall::DeliverTx(tx)) = iter.peek() {
                txs.push(tx.clone());
                iter.next();
            }
            match (iter.next(), iter.next()) {
                (Some(GatewayCall::EndBlock), Some(GatewayCall::Commit)) => {}
                other => panic!("block {height} not closed by EndBlock, Commit: {other:?}"),
            }
            blocks.push((*height, txs));
        }
        blocks
    }

    #[tokio::test]
    async fn test_lifecycle_order_and_delivery_order() {
        let home = TestHome::new();
        let node = start_recorded(&home, &["consensus.create_empty_blocks=false"]).await;

        for tx in ["tx-a", "tx-b", "tx-c"] {
            node.submit_tx(tx).unwrap();
        }
        wait_for_height(&node, 1).await;
        node.submit_tx("tx-d").unwrap();
        wait_for_height(&node, 2).await;

        let lifecycle = node.gateway().lifecycle_calls();
        let blocks = blocks(&lifecycle);
        assert!(blocks.len() >= 2);
        for (i, (height, _)) in blocks.iter().enumerate() {
            assert_eq!(*height, i as BlockHeight + 1);
        }
        assert_eq!(
            blocks[0].1,
            vec![b"tx-a".to_vec(), b"tx-b".to_vec(), b"tx-c".to_vec()]
        );
        assert_eq!(blocks[1].1, vec![b"tx-d".to_vec()]);

        // Admission ran before the block that included the transaction.
        let calls = node.gateway().calls();
        let check = calls
            .iter()
            .position(|c| *c == GatewayCall::CheckTx(b"tx-a".to_vec()))
            .unwrap();
        let begin = calls
            .iter()
            .position(|c| *c == GatewayCall::BeginBlock(1))
            .unwrap();
        assert!(check < begin);

        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_every_gateway_buffer_released() {
        let home = TestHome::new();
        let node = start_recorded(&home, &[]).await;
        wait_for_height(&node, 3).await;

        let ledger = node.gateway().inner().ledger();
        assert!(ledger.issued() >= 3);
        assert_eq!(ledger.outstanding(), 0);

        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_admission_failures() {
        let home = TestHome::new();
        let node = start_recorded(
            &home,
            &["mempool.max_tx_bytes=8", "consensus.create_empty_blocks=false"],
        )
        .await;

        assert!(matches!(
            node.submit_tx("=no-key"),
            Err(MempoolError::Rejected { code: 3, .. })
        ));
        assert!(matches!(
            node.submit_tx("much-too-long=1"),
            Err(MempoolError::TooLarge { max: 8, .. })
        ));

        node.submit_tx("k=v").unwrap();
        assert!(matches!(
            node.submit_tx("k=v"),
            Err(MempoolError::Duplicate(_))
        ));
        wait_for_height(&node, 1).await;

        // Only the admitted transaction was executed.
        let delivered: Vec<_> = node
            .gateway()
            .lifecycle_calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::DeliverTx(_)))
            .collect();
        assert_eq!(delivered, vec![GatewayCall::DeliverTx(b"k=v".to_vec())]);
        assert_eq!(node.gateway().inner().get(b"k"), Some(b"v".to_vec()));

        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_secp256k1_validator_node() {
        let home = TestHome::new();
        let node = start_recorded(&home, &["key=secp256k1"]).await;

        let genesis = &node.context().genesis;
        assert_eq!(
            genesis.consensus_params.validator.pub_key_types,
            vec![KeyType::Secp256k1]
        );
        assert_eq!(genesis.validators[0].pub_key.key_type, KeyType::Secp256k1);
        assert_eq!(genesis.validators[0].power, 10);

        wait_for_height(&node, 1).await;
        node.stop().await.unwrap();

        let store = BlockStore::open(home.config().block_log_file()).unwrap();
        assert_eq!(
            store.block(1).unwrap().proposer,
            genesis_proposer(&home)
        );
    }

    fn genesis_proposer(home: &TestHome) -> Vec<u8> {
        let genesis = node_runtime::GenesisDoc::load(&home.config().genesis_file()).unwrap();
        genesis.validators[0].address.clone()
    }

    #[tokio::test]
    async fn test_unsupported_hooks_answer_explicitly() {
        let home = TestHome::new();
        let node = start_recorded(&home, &["consensus.create_empty_blocks=false"]).await;

        let response = node.app().query(RequestQuery {
            path: "/store".into(),
            ..RequestQuery::default()
        });
        assert_eq!(response.code, CODE_UNSUPPORTED);
        assert!(!response.log.is_empty());

        node.stop().await.unwrap();
    }
}
