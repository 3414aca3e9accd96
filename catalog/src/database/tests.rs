use super::*;

use crate::config::DefaultsConfig;
use crate::factory::{DataFileFactory, DataSetFactory, DataVersionFactory, NewDataFile, NewDataSet, NewDataVersion};
use crate::testing::memory_store;
use quarry::hash::ContentHash;

async fn seed_file(store: &CatalogStore, dataset: &str, file: &str) -> (DataSetModel, DataFileModel) {
    let dataset = DataSetFactory::new(&DefaultsConfig::default())
        .build(NewDataSet::new(dataset))
        .unwrap();
    store.save_dataset(&dataset).await.unwrap();

    let datafile = DataFileFactory.build(&dataset, NewDataFile::new(file)).unwrap();
    store.save_datafile(&datafile).await.unwrap();

    (dataset, datafile)
}

async fn insert_version(
    store: &CatalogStore,
    datafile: &DataFileModel,
    new: NewDataVersion<'_>,
) -> DataVersionModel {
    let factory = DataVersionFactory::new(&DefaultsConfig::default());
    let template = factory.prepare(new).await.unwrap();
    let ordinal = store.next_version_ordinal(&datafile.id).await.unwrap();
    let version = factory.build(&datafile.id, ordinal, &template);
    store.save_version(&version).await.unwrap();

    version
}

fn committed(value: &str) -> NewDataVersion<'static> {
    NewDataVersion::from_hash(ContentHash::new(value, "md5"))
}

#[tokio::test]
async fn test_dataset_round_trip() {
    let store = memory_store().await;

    let mut dataset = DataSetFactory::new(&DefaultsConfig::default())
        .build(
            NewDataSet::new("cifar10")
                .description("Tiny images")
                .project("vision")
                .owner("alice")
                .metadata("classes", serde_json::json!(10)),
        )
        .unwrap();
    store.save_dataset(&dataset).await.unwrap();

    let found = store.find_dataset(&dataset.id).await.unwrap().unwrap();
    assert_eq!(dataset, found);

    let by_name = store.find_dataset_by_name("cifar10").await.unwrap().unwrap();
    assert_eq!(dataset, by_name);

    dataset.description = "Tiny images, 32x32".to_owned();
    store.save_dataset(&dataset).await.unwrap();
    let updated = store.find_dataset(&dataset.id).await.unwrap().unwrap();
    assert_eq!("Tiny images, 32x32", updated.description);
    assert_eq!(1, store.list_datasets(true).await.unwrap().len());

    assert!(store.find_dataset("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_dataset_name_is_unique() {
    let store = memory_store().await;
    let factory = DataSetFactory::new(&DefaultsConfig::default());

    store
        .save_dataset(&factory.build(NewDataSet::new("cifar10")).unwrap())
        .await
        .unwrap();

    let result = store
        .save_dataset(&factory.build(NewDataSet::new("cifar10")).unwrap())
        .await;
    assert!(matches!(
        result,
        Err(CatalogError::DuplicateName { kind: EntityKind::DataSet, .. })
    ));
}

#[tokio::test]
async fn test_datafile_requires_dataset() {
    let store = memory_store().await;

    let orphan = DataSetFactory::new(&DefaultsConfig::default())
        .build(NewDataSet::new("never-saved"))
        .unwrap();
    let datafile = DataFileFactory.build(&orphan, NewDataFile::new("a.csv")).unwrap();

    assert!(matches!(
        store.save_datafile(&datafile).await,
        Err(CatalogError::ConstraintViolation(_))
    ));
}

#[tokio::test]
async fn test_list_filters_deleted() {
    let store = memory_store().await;
    let (dataset, _) = seed_file(&store, "cifar10", "train.csv").await;

    let mut test = DataFileFactory.build(&dataset, NewDataFile::new("test.csv")).unwrap();
    store.save_datafile(&test).await.unwrap();

    test.status = EntityStatus::Deleted;
    store.save_datafile(&test).await.unwrap();

    let live = store.list_datafiles(&dataset.id, false).await.unwrap();
    assert_eq!(vec!["train.csv"], live.iter().map(|f| f.name.as_str()).collect::<Vec<_>>());

    let all = store.list_datafiles(&dataset.id, true).await.unwrap();
    assert_eq!(
        vec!["test.csv", "train.csv"],
        all.iter().map(|f| f.name.as_str()).collect::<Vec<_>>()
    );

    assert_eq!(1, store.count_live_files(&dataset.id).await.unwrap());
}

#[tokio::test]
async fn test_next_version_ordinal() {
    let store = memory_store().await;
    let (_, datafile) = seed_file(&store, "cifar10", "train.csv").await;

    assert_eq!(VersionOrdinal::FIRST, store.next_version_ordinal(&datafile.id).await.unwrap());

    let v1 = insert_version(&store, &datafile, committed("aaa")).await;
    let mut v2 = insert_version(&store, &datafile, committed("bbb")).await;
    assert_eq!(1, v1.version_ordinal);
    assert_eq!(2, v2.version_ordinal);

    // deleted versions keep their ordinal
    v2.status = VersionStatus::Deleted;
    store.save_version(&v2).await.unwrap();
    assert_eq!(3, store.next_version_ordinal(&datafile.id).await.unwrap().get());
}

#[tokio::test]
async fn test_ordinal_conflict() {
    let store = memory_store().await;
    let (_, datafile) = seed_file(&store, "cifar10", "train.csv").await;

    let v1 = insert_version(&store, &datafile, committed("aaa")).await;

    let mut clash = v1.clone();
    clash.id = "another-id".to_owned();
    let result = store.save_version(&clash).await;

    assert!(matches!(result, Err(CatalogError::OrdinalConflict { ordinal: 1, .. })));
    assert!(result.unwrap_err().is_retryable());
}

#[tokio::test]
async fn test_latest_committed_version() {
    let store = memory_store().await;
    let (_, datafile) = seed_file(&store, "cifar10", "train.csv").await;

    assert!(store.find_latest_committed_version(&datafile.id).await.unwrap().is_none());

    insert_version(&store, &datafile, committed("aaa")).await;
    let v2 = insert_version(&store, &datafile, committed("bbb")).await;
    insert_version(&store, &datafile, NewDataVersion::draft()).await;

    let latest = store.find_latest_committed_version(&datafile.id).await.unwrap().unwrap();
    assert_eq!(v2.id, latest.id);

    let by_ordinal = store
        .find_version_by_ordinal(&datafile.id, VersionOrdinal::new(3).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(VersionStatus::Draft, by_ordinal.status);
    assert!(by_ordinal.content_hash().is_empty());
}

#[tokio::test]
async fn test_version_round_trip() {
    let store = memory_store().await;
    let (_, datafile) = seed_file(&store, "cifar10", "train.csv").await;

    let version = insert_version(
        &store,
        &datafile,
        committed("abc123")
            .address("gs://bucket/train.csv")
            .transformer("resize.py --size 32")
            .metadata("rows", serde_json::json!(50000)),
    )
    .await;

    let found = store.find_version(&version.id).await.unwrap().unwrap();
    assert_eq!(version, found);
    assert_eq!(ContentHash::new("abc123", "md5"), found.content_hash());
    assert_eq!(entity::dataversion::StorageKind::Gcs, found.storage_kind);
}

#[tokio::test]
async fn test_lineage_chain() {
    let store = memory_store().await;
    let (_, raw) = seed_file(&store, "cifar10", "raw.csv").await;
    let (_, clean) = seed_file(&store, "cifar10-clean", "clean.csv").await;

    let v1 = insert_version(&store, &raw, committed("aaa")).await;
    let v2 = insert_version(&store, &clean, committed("bbb").derived_from(&v1.id)).await;
    let v3 = insert_version(&store, &clean, committed("ccc").derived_from(&v2.id)).await;

    let ids = |chain: Vec<DataVersionModel>| chain.into_iter().map(|v| v.id).collect::<Vec<_>>();

    assert_eq!(vec![v1.id.clone()], ids(store.lineage_chain(&v1.id, 100).await.unwrap()));
    assert_eq!(
        vec![v3.id.clone(), v2.id.clone(), v1.id.clone()],
        ids(store.lineage_chain(&v3.id, 100).await.unwrap())
    );
    assert_eq!(
        vec![v3.id.clone(), v2.id.clone()],
        ids(store.lineage_chain(&v3.id, 2).await.unwrap())
    );
    assert!(store.lineage_chain(&v3.id, 0).await.unwrap().is_empty());
    assert!(store.lineage_chain("missing", 100).await.unwrap().is_empty());

    let derived = store.find_derived_versions(&v1.id).await.unwrap();
    assert_eq!(vec![v2.id.clone()], ids(derived));
}

#[tokio::test]
async fn test_transaction_rolls_back() {
    let store = memory_store().await;

    let factory = DataSetFactory::new(&DefaultsConfig::default());
    let dataset = factory.build(NewDataSet::new("atomic")).unwrap();
    let first = DataFileFactory.build(&dataset, NewDataFile::new("a.csv")).unwrap();
    let second = DataFileFactory.build(&dataset, NewDataFile::new("a.csv")).unwrap();

    let result = store
        .with_transaction::<_, ()>(|txn| {
            let (dataset, first, second) = (dataset.clone(), first.clone(), second.clone());
            Box::pin(async move {
                txn.save_dataset(&dataset).await?;
                txn.save_datafile(&first).await?;
                txn.save_datafile(&second).await
            })
        })
        .await;

    assert!(matches!(result, Err(CatalogError::DuplicateName { .. })));
    assert!(store.find_dataset_by_name("atomic").await.unwrap().is_none());
    assert!(store.find_datafile(&first.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_transaction_gives_up_when_busy() {
    let mut store = memory_store().await;
    store.retry = RetryPolicy {
        max_retries: 2,
        backoff: Duration::from_millis(1),
    };

    let attempts = std::sync::atomic::AtomicU32::new(0);
    let result = store
        .with_transaction::<_, ()>(|_txn| {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async move {
                Err(CatalogError::DatabaseBusy(anyhow::anyhow!("database is locked")))
            })
        })
        .await;

    assert!(matches!(result, Err(CatalogError::Busy { attempts: 3 })));
    assert_eq!(3, attempts.load(std::sync::atomic::Ordering::SeqCst));
}
