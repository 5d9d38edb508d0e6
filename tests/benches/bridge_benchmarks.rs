//! # Bridge Benchmarks
//!
//! | Path | Measured |
//! |------|----------|
//! | Block lifecycle | `BeginBlock` … `Commit` per block size |
//! | CheckTx | admission against committed state |
//! | Mempool | insert and reap under the block byte limit |

use std::time::Duration;

use abci_bridge::{
    Application, BridgeAdapter, BridgeConfig, RequestBeginBlock, RequestCheckTx,
    RequestDeliverTx, RequestEndBlock, RequestInfo, RequestInitChain,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use execution_gateway::{KvStoreGateway, MemoryStore};
use node_runtime::consensus::Mempool;
use node_runtime::container::MempoolConfig;
use shared_types::{BlockHeader, CheckResult, CheckTxKind, Transaction};

fn fresh_adapter() -> BridgeAdapter<KvStoreGateway<MemoryStore>> {
    let gateway = KvStoreGateway::open(MemoryStore::new()).expect("open engine");
    let app = BridgeAdapter::new(gateway, BridgeConfig::default());
    app.info(RequestInfo::default()).expect("info");
    app.init_chain(RequestInitChain::default()).expect("init chain");
    app
}

fn txs(count: usize, salt: i64) -> Vec<Transaction> {
    (0..count)
        .map(|i| Transaction::from(format!("key-{i}=value-{salt}").into_bytes()))
        .collect()
}

fn bench_block_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("block-lifecycle");
    group.measurement_time(Duration::from_secs(10));

    for size in [0usize, 10, 100, 1000] {
        let app = fresh_adapter();
        let mut height = 0;

        group.throughput(Throughput::Elements(size.max(1) as u64));
        group.bench_with_input(BenchmarkId::new("block", size), &size, |b, &size| {
            b.iter(|| {
                height += 1;
                let header = BlockHeader {
                    chain_id: "bench-chain".into(),
                    height,
                    ..BlockHeader::default()
                };
                app.begin_block(RequestBeginBlock {
                    hash: vec![],
                    header,
                })
                .expect("begin block");
                for tx in txs(size, height) {
                    app.deliver_tx(RequestDeliverTx { tx }).expect("deliver tx");
                }
                app.end_block(RequestEndBlock { height }).expect("end block");
                black_box(app.commit().expect("commit"))
            })
        });
    }
    group.finish();
}

fn bench_check_tx(c: &mut Criterion) {
    let app = fresh_adapter();
    let tx = Transaction::from("account=100");

    c.bench_function("check-tx/new", |b| {
        b.iter(|| {
            black_box(app.check_tx(RequestCheckTx {
                tx: tx.clone(),
                kind: CheckTxKind::New,
            }))
        })
    });
}

fn bench_mempool(c: &mut Criterion) {
    let mut group = c.benchmark_group("mempool");
    let accepted = CheckResult {
        code: 0,
        sender: "bench".into(),
        priority: 10,
        log: String::new(),
    };

    for size in [100usize, 1000, 5000] {
        let batch = txs(size, 0);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("insert-reap", size), &batch, |b, batch| {
            b.iter(|| {
                let mut mempool = Mempool::new(MempoolConfig::default());
                for tx in batch {
                    mempool.insert(tx.clone(), &accepted).expect("insert");
                }
                black_box(mempool.reap(22_020_096))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_block_lifecycle, bench_check_tx, bench_mempool);
criterion_main!(benches);
