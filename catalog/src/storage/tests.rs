use super::*;

use tempfile::TempDir;
use tokio::fs;

use crate::error::CatalogError;

async fn gateway() -> (TempDir, LocalGateway) {
    let dir = tempfile::tempdir().unwrap();
    let gateway = LocalGateway::new(LocalStorageConfig {
        path: dir.path().join("objects"),
    })
    .await
    .unwrap();

    (dir, gateway)
}

async fn write_source(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).await.unwrap();
    path
}

#[tokio::test]
async fn test_push_pull() {
    let (dir, gateway) = gateway().await;
    let options = TransferOptions::default();
    let source = write_source(&dir, "train.csv", b"a,b\n1,2\n").await;

    let hash = gateway
        .push(&source, &StorageAddress::default(), &options)
        .await
        .unwrap();
    assert_eq!(ContentHash::sha256_from_bytes(b"a,b\n1,2\n"), hash);
    assert!(gateway.verify(&hash, &options).await.unwrap());

    let dest = dir.path().join("out/train.csv");
    let pulled = gateway.pull(&hash, &dest, &options).await.unwrap();
    assert_eq!(dest, pulled);
    assert_eq!(b"a,b\n1,2\n".to_vec(), fs::read(&dest).await.unwrap());
}

#[tokio::test]
async fn test_push_is_idempotent() {
    let (dir, gateway) = gateway().await;
    let options = TransferOptions::default();
    let first = write_source(&dir, "first", b"same bytes").await;
    let second = write_source(&dir, "second", b"same bytes").await;

    let a = gateway.push(&first, &StorageAddress::default(), &options).await.unwrap();
    let b = gateway.push(&second, &StorageAddress::default(), &options).await.unwrap();
    let c = gateway.push(&first, &StorageAddress::default(), &options).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a, c);
    assert!(gateway.verify(&a, &options).await.unwrap());
}

#[tokio::test]
async fn test_missing_object() {
    let (dir, gateway) = gateway().await;
    let options = TransferOptions::default();
    let hash = ContentHash::sha256_from_bytes(b"never pushed");

    assert!(!gateway.verify(&hash, &options).await.unwrap());
    assert!(matches!(
        gateway.pull(&hash, &dir.path().join("out"), &options).await,
        Err(CatalogError::NotFoundRemote { .. })
    ));
    assert!(!gateway.transfer(&hash, "default", "backup", &options).await.unwrap());
}

#[tokio::test]
async fn test_corrupted_object() {
    let (dir, gateway) = gateway().await;
    let options = TransferOptions::default();
    let source = write_source(&dir, "blob", b"original").await;

    let hash = gateway.push(&source, &StorageAddress::default(), &options).await.unwrap();
    let stored = gateway.address_for(&hash, &options).unwrap();
    fs::write(stored.as_str(), b"tampered").await.unwrap();

    assert!(!gateway.verify(&hash, &options).await.unwrap());
    assert!(matches!(
        gateway.pull(&hash, &dir.path().join("out"), &options).await,
        Err(CatalogError::IntegrityMismatch { .. })
    ));
}

#[tokio::test]
async fn test_transfer_between_remotes() {
    let (dir, gateway) = gateway().await;
    let source = write_source(&dir, "blob", b"replicate me").await;

    let hash = gateway
        .push(&source, &StorageAddress::default(), &TransferOptions::default())
        .await
        .unwrap();

    let backup = TransferOptions {
        remote: Some("backup".to_owned()),
        jobs: None,
    };
    assert!(!gateway.verify(&hash, &backup).await.unwrap());

    assert!(gateway.transfer(&hash, "default", "backup", &backup).await.unwrap());
    assert!(gateway.verify(&hash, &backup).await.unwrap());

    // already there
    assert!(gateway.transfer(&hash, "default", "backup", &backup).await.unwrap());
}

#[tokio::test]
async fn test_rejects_bad_input() {
    let (dir, gateway) = gateway().await;
    let options = TransferOptions::default();

    let md5 = ContentHash::new("d41d8cd98f00b204e9800998ecf8427e", "md5");
    assert!(matches!(
        gateway.verify(&md5, &options).await,
        Err(CatalogError::QuarryError(_))
    ));

    let traversal = TransferOptions {
        remote: Some("../elsewhere".to_owned()),
        jobs: None,
    };
    let source = write_source(&dir, "blob", b"x").await;
    assert!(matches!(
        gateway.push(&source, &StorageAddress::default(), &traversal).await,
        Err(CatalogError::InvalidArgument(_))
    ));

    assert!(matches!(
        gateway
            .push(&dir.path().join("missing"), &StorageAddress::default(), &options)
            .await,
        Err(CatalogError::StorageError(_))
    ));
}
