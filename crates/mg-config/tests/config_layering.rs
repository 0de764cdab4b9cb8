//! End-to-end precedence check: defaults, then a config file, then CLI
//! overrides, each layer free to shadow the last.

use mg_config::ConfigStore;

#[test]
fn three_tier_precedence_resolves_to_the_last_layer_applied() {
    let mut store = ConfigStore::new();
    store.register_default("MonitorSampleDelay", "1.0");
    store.register_default("ROMVerboseLoad", "true");

    store.load_file("MonitorSampleDelay = 0.5\nROMVerboseLoad = true\n").unwrap();
    assert_eq!(store.get::<f64>("MonitorSampleDelay").unwrap(), 0.5);

    for entry in ["MonitorSampleDelay=0.1", "ROMVerboseLoad=false"] {
        store.apply_override(entry).unwrap();
    }
    assert_eq!(store.get::<f64>("MonitorSampleDelay").unwrap(), 0.1);
    assert!(!store.get::<bool>("ROMVerboseLoad").unwrap());
}
