use s31_core::S31Error;
use s31_store::{
    digest_hex, ConfigData, ConfigLoad, ConfigStore, MemoryBackend, StorageBackend,
    CONFIG_CHECKSUM_FILE, CONFIG_FILE,
};

fn saved_backend(data_edit: impl FnOnce(&mut ConfigData)) -> MemoryBackend {
    let mut backend = MemoryBackend::new();
    let (mut store, _) = ConfigStore::load(&backend);
    store.update(data_edit);
    store.save(&mut backend).unwrap();
    backend
}

#[test]
fn test_roundtrip_through_flash() {
    let backend = saved_backend(|c| {
        c.host_name = "garage-heater".into();
        c.max_power = 1800;
        c.max_power_hold_ms = 3_000;
        c.power_calibration_ratio = 1.02;
    });

    let (store, outcome) = ConfigStore::load(&backend);
    assert_eq!(outcome, ConfigLoad::Loaded);
    assert!(!store.save_pending());
    assert_eq!(store.data().host_name, "garage-heater");
    assert_eq!(store.data().max_power, 1800);
    assert_eq!(store.data().power_calibration_ratio, 1.02);
    assert_eq!(store.data().web_password.expose(), "admin");
}

#[test]
fn test_missing_config_uses_defaults_and_saves() {
    let mut backend = MemoryBackend::new();
    let (mut store, outcome) = ConfigStore::load(&backend);
    assert_eq!(outcome, ConfigLoad::Missing);
    assert_eq!(store.data(), &ConfigData::default());
    assert!(store.poll(&mut backend));
    assert!(backend.exists(CONFIG_FILE));
    assert!(backend.exists(CONFIG_CHECKSUM_FILE));
}

#[test]
fn test_corrupt_checksum_self_heals_with_one_save() {
    let mut backend = saved_backend(|c| c.max_power = 900);
    backend.plant(CONFIG_CHECKSUM_FILE, b"0000");
    let writes_before = backend.write_count(CONFIG_FILE);

    let (mut store, outcome) = ConfigStore::load(&backend);
    assert_eq!(outcome, ConfigLoad::Corrupt);
    assert_eq!(store.data().max_power, 0);
    assert!(store.save_pending());

    for _ in 0..5 {
        store.poll(&mut backend);
    }
    assert_eq!(backend.write_count(CONFIG_FILE), writes_before + 1);
    assert_eq!(backend.write_count(CONFIG_CHECKSUM_FILE), writes_before + 1);

    let (_, outcome) = ConfigStore::load(&backend);
    assert_eq!(outcome, ConfigLoad::Loaded);
}

#[test]
fn test_unparseable_document_is_corrupt() {
    let mut backend = MemoryBackend::new();
    let doc = b"{\"max_power\": ";
    backend.plant(CONFIG_FILE, doc);
    backend.plant(CONFIG_CHECKSUM_FILE, digest_hex(doc).as_bytes());
    let (store, outcome) = ConfigStore::load(&backend);
    assert_eq!(outcome, ConfigLoad::Corrupt);
    assert!(store.save_pending());
}

#[test]
fn test_checksum_compare_ignores_case() {
    let mut backend = saved_backend(|c| c.wattage_threshold = 40);
    let upper = digest_hex(backend.file(CONFIG_FILE).unwrap()).to_uppercase();
    backend.plant(CONFIG_CHECKSUM_FILE, upper.as_bytes());
    let (store, outcome) = ConfigStore::load(&backend);
    assert_eq!(outcome, ConfigLoad::Loaded);
    assert_eq!(store.data().wattage_threshold, 40);
}

#[test]
fn test_missing_fields_take_defaults() {
    let mut backend = MemoryBackend::new();
    let doc = br#"{"max_power": 250}"#;
    backend.plant(CONFIG_FILE, doc);
    backend.plant(CONFIG_CHECKSUM_FILE, digest_hex(doc).as_bytes());
    let (store, outcome) = ConfigStore::load(&backend);
    assert_eq!(outcome, ConfigLoad::Loaded);
    assert_eq!(store.data().max_power, 250);
    assert_eq!(store.data().max_power_hold_ms, 10_000);
    assert_eq!(store.data().voltage_calibration_ratio, 1.0);
}

#[test]
fn test_short_write_stays_pending() {
    let mut backend = MemoryBackend::new();
    let (mut store, _) = ConfigStore::load(&backend);
    backend.write_limit = Some(4);
    assert!(!store.poll(&mut backend));
    assert!(store.save_pending());
    assert_eq!(store.revision(), 0);

    backend.write_limit = None;
    assert!(store.poll(&mut backend));
    assert_eq!(store.revision(), 1);
}

#[test]
fn test_restore_requires_matching_digest() {
    let mut backend = saved_backend(|c| c.max_power = 100);
    let (mut store, _) = ConfigStore::load(&backend);

    let upload = br#"{"host_name":"lab","max_power":2000}"#;
    assert_eq!(
        store.restore_json(&mut backend, upload, "deadbeef"),
        Err(S31Error::ChecksumMismatch)
    );
    assert_eq!(store.data().max_power, 100);

    assert_eq!(
        store.restore_json(&mut backend, b"not json", &digest_hex(b"not json")),
        Err(S31Error::Corrupted)
    );

    store.restore_json(&mut backend, upload, &digest_hex(upload)).unwrap();
    assert_eq!(store.data().max_power, 2000);
    assert_eq!(backend.file(CONFIG_FILE).unwrap(), &upload[..]);

    let (reloaded, outcome) = ConfigStore::load(&backend);
    assert_eq!(outcome, ConfigLoad::Loaded);
    assert_eq!(reloaded.data().host_name, "lab");
}

#[test]
fn test_export_flushes_pending_edit() {
    let mut backend = MemoryBackend::new();
    let (mut store, _) = ConfigStore::load(&backend);
    store.update(|c| c.report_send_interval_ms = 5_000);
    let json = store.export_json(&mut backend).unwrap();
    let parsed: ConfigData = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed.report_send_interval_ms, 5_000);
    assert!(!store.save_pending());
}

#[test]
fn test_password_not_in_debug_output() {
    let data = ConfigData::default();
    let dbg = format!("{:?}", data);
    assert!(dbg.contains("Password(***)"));
}

#[test]
fn test_digest_is_lowercase_sha256_hex() {
    assert_eq!(
        digest_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(digest_hex(b"").len(), 64);
}
