use cdc_augmenter::coordinator::{LeaderGroup, MemoryCheckpointStore, MemoryLeaderElection};
use cdc_augmenter::destination::memory::MemorySink;
use cdc_augmenter::pipeline::Pipeline;
use cdc_augmenter::test_utils::config::replicator_config;
use cdc_augmenter::test_utils::event::EventBuilder;
use cdc_augmenter::test_utils::logging::init_test_tracing;
use cdc_augmenter::test_utils::schema::{MemorySchemaSource, orders_schema};
use cdc_augmenter::test_utils::sink::TestSinkWrapper;
use cdc_augmenter::test_utils::supplier::MemorySupplier;
use cdc_augmenter::types::{RawChangeEvent, RawValue};
use cdc_config::shared::ReplicatorConfig;
use cdc_mysql::types::TableName;

type TestPipeline = Pipeline<
    MemoryLeaderElection,
    MemorySchemaSource,
    MemorySupplier,
    TestSinkWrapper<MemorySink>,
    MemoryCheckpointStore,
>;

struct Setup {
    schema_source: MemorySchemaSource,
    supplier: MemorySupplier,
    sink: TestSinkWrapper<MemorySink>,
    checkpoints: MemoryCheckpointStore,
}

impl Setup {
    fn new() -> Self {
        let schema_source = MemorySchemaSource::new();
        schema_source.set_table(orders_schema());

        Self {
            schema_source,
            supplier: MemorySupplier::new(),
            sink: TestSinkWrapper::wrap(MemorySink::new()),
            checkpoints: MemoryCheckpointStore::new(),
        }
    }

    fn pipeline(&self, config: &ReplicatorConfig) -> TestPipeline {
        Pipeline::new(
            config,
            LeaderGroup::new().member(),
            self.schema_source.clone(),
            self.supplier.clone(),
            self.sink.clone(),
            self.checkpoints.clone(),
        )
    }
}

fn orders() -> TableName {
    TableName::new("shop", "orders")
}

fn order(id: i64, price: &str, status: Option<&str>) -> Vec<Option<RawValue>> {
    vec![
        Some(RawValue::Int(id)),
        Some(RawValue::Decimal(price.to_string())),
        Some(RawValue::from(status)),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn update_is_replicated_as_changed_cells() {
    init_test_tracing();
    let setup = Setup::new();
    let mut events = EventBuilder::new("mysql-bin.000001", 4);
    setup.supplier.push_all(events.transaction(
        "3e11fa47-71ca-11e1-9e33-c80aa9429562:23",
        77,
        vec![RawChangeEvent::update(
            orders(),
            order(7, "10.00", Some("paid")),
            order(7, "12.00", Some("paid")),
        )],
    ));

    let mut pipeline = setup.pipeline(&replicator_config());
    let delivered = setup.sink.wait_for_mutations(1).await;
    pipeline.start().unwrap();
    delivered.notified().await;
    pipeline.shutdown_and_wait().await.unwrap();

    let mutations = setup.sink.mutations().await;
    assert_eq!(mutations.len(), 1);
    let mutation = &mutations[0];
    assert_eq!(mutation.table, "orders");
    assert_eq!(mutation.row_key, "7");
    assert_eq!(mutation.source_row_uri.as_deref(), Some("mysql://shop/orders?id=7"));

    let cells: Vec<(&str, &str)> = mutation
        .cells
        .iter()
        .map(|cell| (cell.qualifier.as_str(), cell.value.as_str()))
        .collect();
    assert_eq!(
        cells,
        vec![
            ("price", "12.00"),
            ("row_status", "U"),
            ("_transaction_uuid", "3e11fa47-71ca-11e1-9e33-c80aa9429562:23"),
            ("_transaction_xid", "77"),
        ]
    );

    let checkpoint = setup.checkpoints.get("checkpoint").unwrap();
    assert_eq!(checkpoint.binlog, Some(events.position()));
    assert!(setup.sink.shutdown_called().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_transaction_loses_no_rows() {
    init_test_tracing();
    let setup = Setup::new();
    let mut config = replicator_config();
    config.transaction.size_limit = 3;

    let mut events = EventBuilder::new("mysql-bin.000001", 4);
    let inserts = (1..=10)
        .map(|id| RawChangeEvent::insert(orders(), order(id, "1.00", None)))
        .collect();
    setup.supplier.push_all(events.transaction("uuid:1", 5, inserts));

    let mut pipeline = setup.pipeline(&config);
    let delivered = setup.sink.wait_for_mutations(10).await;
    pipeline.start().unwrap();
    delivered.notified().await;
    pipeline.shutdown_and_wait().await.unwrap();

    let mutations = setup.sink.mutations().await;
    let keys: Vec<String> = mutations.iter().map(|m| m.row_key.clone()).collect();
    let expected: Vec<String> = (1..=10).map(|id: i64| id.to_string()).collect();
    assert_eq!(keys, expected);
    assert!(mutations.iter().all(|m| m.transaction_uuid.as_deref() == Some("uuid:1")));
    assert!(setup.sink.write_calls().await >= 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_ddl_keeps_previous_schema() {
    init_test_tracing();
    let setup = Setup::new();
    setup.schema_source.fail_next_executes(1);

    let mut events = EventBuilder::new("mysql-bin.000001", 4);
    setup.supplier.push_all(events.transaction(
        "uuid:1",
        1,
        vec![RawChangeEvent::insert(orders(), order(1, "1.00", None))],
    ));
    setup
        .supplier
        .push(events.query("shop", "ALTER TABLE orders ADD COLUMN broken"));
    setup.supplier.push_all(events.transaction(
        "uuid:2",
        2,
        vec![RawChangeEvent::insert(orders(), order(2, "2.00", Some("new")))],
    ));

    let mut pipeline = setup.pipeline(&replicator_config());
    let delivered = setup.sink.wait_for_mutations(2).await;
    pipeline.start().unwrap();
    delivered.notified().await;

    assert_eq!(
        pipeline.schema_cache().cached(&orders()).as_deref(),
        Some(&orders_schema())
    );
    pipeline.shutdown_and_wait().await.unwrap();

    let mutations = setup.sink.mutations().await;
    assert_eq!(mutations[1].cell("status").unwrap().value, "new");
    assert!(setup.schema_source.executed().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn sink_failure_replays_transaction_in_next_term() {
    init_test_tracing();
    let setup = Setup::new();
    setup.sink.fail_next_writes(1).await;

    let mut events = EventBuilder::new("mysql-bin.000001", 4);
    setup.supplier.push_all(events.transaction(
        "uuid:9",
        9,
        vec![
            RawChangeEvent::insert(orders(), order(1, "1.00", None)),
            RawChangeEvent::insert(orders(), order(2, "2.00", None)),
        ],
    ));

    let mut pipeline = setup.pipeline(&replicator_config());
    let delivered = setup.sink.wait_for_mutations(2).await;
    pipeline.start().unwrap();
    delivered.notified().await;
    pipeline.shutdown_and_wait().await.unwrap();

    let mutations = setup.sink.mutations().await;
    assert_eq!(mutations.len(), 2);
    assert!(mutations.iter().all(|m| m.transaction_uuid.as_deref() == Some("uuid:9")));
    assert_eq!(setup.sink.write_calls().await, 2);
    assert!(setup.supplier.starts().len() >= 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn restarted_pipeline_resumes_after_checkpoint() {
    init_test_tracing();
    let setup = Setup::new();
    let mut events = EventBuilder::new("mysql-bin.000001", 4);
    setup.supplier.push_all(events.transaction(
        "uuid:1",
        1,
        vec![RawChangeEvent::insert(orders(), order(1, "1.00", None))],
    ));

    let mut first = setup.pipeline(&replicator_config());
    let delivered = setup.sink.wait_for_mutations(1).await;
    first.start().unwrap();
    delivered.notified().await;
    first.shutdown_and_wait().await.unwrap();
    let checkpoint = setup.checkpoints.get("checkpoint").unwrap();

    setup.supplier.push_all(events.transaction(
        "uuid:2",
        2,
        vec![RawChangeEvent::insert(orders(), order(2, "2.00", None))],
    ));

    let mut second = setup.pipeline(&replicator_config());
    let delivered = setup.sink.wait_for_mutations(2).await;
    second.start().unwrap();
    delivered.notified().await;
    second.shutdown_and_wait().await.unwrap();

    let keys: Vec<String> = setup
        .sink
        .mutations()
        .await
        .iter()
        .map(|m| m.row_key.clone())
        .collect();
    assert_eq!(keys, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(setup.supplier.starts().last().cloned(), Some(Some(checkpoint)));
}
