//! End-to-end execution: compile a program, load blocks into the
//! in-memory reader, run the plan, and check the emitted blocks.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use ifql::{compile, execute, EngineConfig, Error, Time, Value};
use ifql_core::block::{Block, ColMeta, VALUE_COL_LABEL};
use ifql_core::time::Bounds;
use ifql_core::values::DataType;
use ifql_exec::MemoryStorage;
use ifql_functions::ExecutionRegistry;

fn float_block(bounds: Bounds, rows: &[(i64, f64)]) -> Block {
    let mut b = Block::new(
        bounds,
        vec![
            ColMeta::time(),
            ColMeta::value(VALUE_COL_LABEL, DataType::Float),
        ],
    );
    for (t, v) in rows {
        b.push_row(vec![Value::Time(Time(*t)), Value::Float(*v)]);
    }
    b
}

fn tagged_block(bounds: Bounds, host: &str, rows: &[(i64, f64)]) -> Block {
    let mut b = Block::new(
        bounds,
        vec![
            ColMeta::time(),
            ColMeta::value(VALUE_COL_LABEL, DataType::Float),
            ColMeta::tag("host", true),
        ],
    );
    for (t, v) in rows {
        b.push_row(vec![
            Value::Time(Time(*t)),
            Value::Float(*v),
            Value::Str(host.into()),
        ]);
    }
    b
}

fn run(query: &str, storage: Arc<MemoryStorage>) -> Vec<Block> {
    let plan = compile(query, Time(1_000)).unwrap();
    let mut results = execute(&plan, storage, &EngineConfig::default()).unwrap();
    assert_eq!(results.len(), 1);
    results.remove(0).blocks
}

#[test]
fn count_over_one_window() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(Bounds::new(Time(0), Time(10)), &[(1, 1.0), (2, 2.0), (3, 3.0)]),
    );
    let blocks = run(r#"from(db:"db").range(start:0, stop:10).count()"#, storage);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].num_rows(), 1);
    assert_eq!(blocks[0].row_time(0), Some(Time(10)));
    assert_eq!(blocks[0].data[1][0], Value::Int(3));
}

#[test]
fn stddev_uses_sample_variance() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(
            Bounds::new(Time(0), Time(10)),
            &[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)],
        ),
    );
    let blocks = run(r#"from(db:"db").range(start:0, stop:10).stddev()"#, storage);
    let Value::Float(v) = blocks[0].data[1][0] else {
        panic!("expected float");
    };
    assert!((v - 1.2909944487358056).abs() < 1e-9);
}

#[test]
fn aggregates_partition_by_common_tags() {
    let storage = Arc::new(MemoryStorage::new());
    let bounds = Bounds::new(Time(0), Time(10));
    storage.insert("db", tagged_block(bounds, "a", &[(1, 1.0), (2, 2.0)]));
    storage.insert("db", tagged_block(bounds, "b", &[(1, 10.0)]));
    let blocks = run(r#"from(db:"db").range(start:0, stop:10).count()"#, storage);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].common_tags(), vec![("host".into(), "a".into())]);
    assert_eq!(blocks[0].data[1][0], Value::Int(2));
    assert_eq!(blocks[1].common_tags(), vec![("host".into(), "b".into())]);
    assert_eq!(blocks[1].data[1][0], Value::Int(1));
}

#[test]
fn min_selector_picks_row_and_stop_time() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(
            Bounds::new(Time(0), Time(100)),
            &[(0, 4.0), (40, 1.0), (90, 7.0)],
        ),
    );
    let blocks = run(r#"from(db:"db").range(start:0, stop:100).min()"#, storage);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].row_time(0), Some(Time(100)));
    assert_eq!(blocks[0].data[1][0], Value::Float(1.0));
}

#[test]
fn first_selector_with_use_row_time() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(Bounds::new(Time(0), Time(100)), &[(7, 4.0), (40, 1.0)]),
    );
    let blocks = run(
        r#"from(db:"db").range(start:0, stop:100).first(useRowTime:true)"#,
        storage,
    );
    assert_eq!(blocks[0].row_time(0), Some(Time(7)));
    assert_eq!(blocks[0].data[1][0], Value::Float(4.0));
}

#[test]
fn merge_join_adds_matching_values() {
    let storage = Arc::new(MemoryStorage::new());
    let bounds = Bounds::new(Time(0), Time(10));
    storage.insert(
        "dbA",
        float_block(bounds, &[(1, 1.0), (2, 2.0), (3, 3.0)]),
    );
    storage.insert(
        "dbB",
        float_block(bounds, &[(1, 10.0), (1, 10.1), (2, 20.0), (3, 30.0), (3, 30.1)]),
    );
    let blocks = run(
        r#"
var a = from(db:"dbA").range(start:0, stop:10)
var b = from(db:"dbB").range(start:0, stop:10)
join(tables:[a,b], f:(a,b) => a["_value"] + b["_value"])
"#,
        storage,
    );
    assert_eq!(blocks.len(), 1);
    let got: Vec<(i64, f64)> = (0..blocks[0].num_rows())
        .map(|i| {
            (
                blocks[0].row_time(i).unwrap().0,
                blocks[0].data[1][i].as_f64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        got,
        vec![(1, 11.0), (1, 11.1), (2, 22.0), (3, 33.0), (3, 33.1)]
    );
}

#[test]
fn window_then_count_emits_per_window() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(
            Bounds::new(Time(0), Time(20)),
            &[(1, 1.0), (5, 5.0), (12, 12.0)],
        ),
    );
    let mut blocks = run(
        r#"from(db:"db").range(start:0, stop:20).window(every:10ns).count()"#,
        storage,
    );
    blocks.sort_by_key(|b| b.sort_key());
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].bounds, Bounds::new(Time(0), Time(10)));
    assert_eq!(blocks[0].data[1][0], Value::Int(2));
    assert_eq!(blocks[1].bounds, Bounds::new(Time(10), Time(20)));
    assert_eq!(blocks[1].data[1][0], Value::Int(1));
}

#[test]
fn merge_regroups_series_before_count() {
    let storage = Arc::new(MemoryStorage::new());
    let bounds = Bounds::new(Time(0), Time(10));
    storage.insert("db", tagged_block(bounds, "a", &[(1, 1.0), (2, 2.0)]));
    storage.insert("db", tagged_block(bounds, "b", &[(3, 10.0)]));
    let blocks = run(
        r#"from(db:"db").range(start:0, stop:10).merge(keys:[]).count()"#,
        storage,
    );
    // All series collapse into one group.
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].data[1][0], Value::Int(3));
}

#[test]
fn where_predicate_filters_at_the_source() {
    let storage = Arc::new(MemoryStorage::new());
    let bounds = Bounds::new(Time(0), Time(10));
    storage.insert("db", tagged_block(bounds, "a", &[(1, 1.0), (2, 5.0)]));
    storage.insert("db", tagged_block(bounds, "b", &[(1, 9.0)]));
    let blocks = run(
        r#"from(db:"db").where(exp:{"host" == "a" and $ > 2.0}).range(start:0, stop:10).count()"#,
        storage,
    );
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].common_tags(), vec![("host".into(), "a".into())]);
    assert_eq!(blocks[0].data[1][0], Value::Int(1));
}

#[test]
fn limit_caps_rows_per_series() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(
            Bounds::new(Time(0), Time(10)),
            &[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)],
        ),
    );
    let blocks = run(
        r#"from(db:"db").range(start:0, stop:10).limit(n:2).count()"#,
        storage,
    );
    assert_eq!(blocks[0].data[1][0], Value::Int(2));
}

#[test]
fn exhausted_memory_budget_fails_the_query() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(Bounds::new(Time(0), Time(10)), &[(1, 1.0), (2, 2.0)]),
    );
    let plan = compile(r#"from(db:"db").range(start:0, stop:10).count()"#, Time(0)).unwrap();
    let config = EngineConfig {
        mem_cap_bytes: 16,
        ..EngineConfig::default()
    };
    let err = execute(&plan, storage, &config).unwrap_err();
    assert!(
        matches!(err, Error::ResourceExhausted { .. }),
        "got: {err}"
    );
}

#[test]
fn cancellation_unwinds_the_query() {
    let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(Bounds::new(Time(0), Time(10)), &[(1, 1.0)]),
    );
    let plan = compile(r#"from(db:"db").range(start:0, stop:10).count()"#, Time(0)).unwrap();
    let registry = ExecutionRegistry::new();
    let err = ifql_exec::execute(
        &plan,
        &registry,
        storage,
        &EngineConfig::default(),
        Arc::new(AtomicBool::new(true)),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Cancelled), "got: {err}");
}

#[test]
fn watermarks_advance_monotonically_per_window() {
    use ifql_core::id::DatasetId;
    use ifql_exec::{
        Allocator, ExecutionContext, PartitionKey, ReadSpec, SourceNode, StorageSource,
        Transformation, Window,
    };
    use std::sync::Mutex;

    struct WatermarkProbe {
        seen: Mutex<Vec<Time>>,
    }

    impl Transformation for WatermarkProbe {
        fn process(&self, _parent: DatasetId, _block: &Block) -> ifql::Result<()> {
            Ok(())
        }
        fn retract_block(&self, _parent: DatasetId, _key: &PartitionKey) -> ifql::Result<()> {
            Ok(())
        }
        fn update_watermark(&self, _parent: DatasetId, t: Time) -> ifql::Result<()> {
            self.seen.lock().unwrap().push(t);
            Ok(())
        }
        fn update_processing_time(&self, _parent: DatasetId, _t: Time) -> ifql::Result<()> {
            Ok(())
        }
        fn finish(&self, _parent: DatasetId, _err: Option<Error>) {}
    }

    let storage = Arc::new(MemoryStorage::new());
    storage.insert(
        "db",
        float_block(Bounds::new(Time(0), Time(30)), &[(1, 1.0), (15, 2.0), (25, 3.0)]),
    );
    let source = StorageSource::new(
        DatasetId::new(0),
        storage,
        ReadSpec {
            database: "db".into(),
            ..Default::default()
        },
        Bounds::new(Time(0), Time(30)),
        Window {
            every: ifql::Duration(10),
            period: ifql::Duration(10),
        },
    );
    let probe = Arc::new(WatermarkProbe {
        seen: Mutex::new(Vec::new()),
    });
    use ifql_exec::Node;
    source.add_transformation(probe.clone());
    let cx = ExecutionContext::new(
        Time(0),
        Allocator::unlimited(),
        Arc::new(AtomicBool::new(false)),
    );
    source.run(&cx).unwrap();

    let seen = probe.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![Time(10), Time(20), Time(30)]);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}
