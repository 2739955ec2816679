use s31_core::S31Error;
use s31_hal::{RamScratch, ResetCause};
use s31_store::fs_backend::FileSystemBackend;
use s31_store::{ConfigLoad, PersistentStateStore, StorageBackend, CONFIG_FILE, SNAPSHOT_FILE};

fn temp_root(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("s31-store-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn test_write_read_delete() {
    let root = temp_root("basic");
    let mut fs = FileSystemBackend::new(&root).unwrap();
    assert_eq!(fs.read("missing.bin"), Err(S31Error::NotFound));

    assert_eq!(fs.write("rtc.bin", &[1, 2, 3, 4]).unwrap(), 4);
    assert!(fs.exists("rtc.bin"));
    assert!(!root.join("rtc.tmp").exists());
    assert_eq!(fs.read("rtc.bin").unwrap(), vec![1, 2, 3, 4]);

    fs.write("rtc.bin", &[9]).unwrap();
    assert_eq!(fs.read("rtc.bin").unwrap(), vec![9]);

    fs.delete("rtc.bin").unwrap();
    fs.delete("rtc.bin").unwrap();
    assert!(!fs.exists("rtc.bin"));

    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn test_state_survives_restart_on_disk() {
    let root = temp_root("restart");
    {
        let fs = FileSystemBackend::new(&root).unwrap();
        let (mut store, report) =
            PersistentStateStore::open(Box::new(fs), Box::new(RamScratch::new()), ResetCause::PowerOn, 0).unwrap();
        assert_eq!(report.config, ConfigLoad::Missing);
        store.update_config(|c| c.host_name = "bench".into());
        store.set_relay_on(true).unwrap();
        store.poll(1);
    }
    assert!(root.join(SNAPSHOT_FILE).exists());
    assert!(root.join(CONFIG_FILE).exists());

    // Fresh scratch: a power cut.
    let fs = FileSystemBackend::new(&root).unwrap();
    let (store, report) =
        PersistentStateStore::open(Box::new(fs), Box::new(RamScratch::new()), ResetCause::PowerOn, 0).unwrap();
    assert_eq!(report.config, ConfigLoad::Loaded);
    assert!(store.relay_on());
    assert_eq!(store.config().host_name, "bench");
    assert!(store.backend().exists(SNAPSHOT_FILE));

    std::fs::remove_dir_all(&root).unwrap();
}
