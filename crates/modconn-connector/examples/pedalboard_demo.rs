//! Pedalboard demo: load an empty bank, drop a plugin into the first cell,
//! tweak a parameter, and switch scenes — against a dummy (socket-free)
//! engine client.
//!
//! Run with: MOD_DEV_HOST=1 cargo run -p modconn-connector --example pedalboard_demo

use modconn_connector::Connector;
use modconn_metadata::{InMemoryCatalogue, ParameterMetadata, PluginMetadata};
use modconn_model::{persist, Preset, SceneMode};
use modconn_proto::EngineClient;

fn main() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    // SAFETY-ish note: this demo sets MOD_DEV_HOST itself for convenience;
    // running it under `cargo run` with the var already exported also works.
    std::env::set_var("MOD_DEV_HOST", "1");
    let engine = EngineClient::connect().expect("dummy engine always connects");

    let mut catalogue = InMemoryCatalogue::new();
    catalogue.insert(
        PluginMetadata::new("urn:demo:gain", 1, 1)
            .with_parameter(ParameterMetadata::new("gain", -60.0, 12.0, 0.0)),
    );

    let dir = std::env::temp_dir().join("modconn-pedalboard-demo");
    std::fs::create_dir_all(&dir).expect("scratch dir");
    let paths: Vec<_> = (0..modconn_model::NUM_PRESETS_PER_BANK)
        .map(|i| {
            let path = dir.join(format!("preset_{i}.json"));
            persist::save_preset_file(&path, &Preset::empty()).expect("write scratch preset");
            path
        })
        .collect();

    let mut connector = Connector::new(engine);
    let diagnostics = connector
        .load_bank_from_preset_files(&paths, 0, &catalogue)
        .expect("load empty bank");
    println!("loaded bank, {} diagnostics", diagnostics.len());

    connector
        .replace_block(0, 0, "urn:demo:gain", false, &catalogue)
        .expect("load gain plugin into cell (0, 0)");
    println!(
        "cell (0, 0): uri={} gain={}",
        connector.current().preset.block(0, 0).unwrap().uri,
        connector.current().preset.block(0, 0).unwrap().parameters[0].value,
    );

    connector
        .set_block_parameter(0, 0, "gain", -6.0, SceneMode::Activate)
        .expect("set gain, enabling scene tracking");
    connector.switch_scene(1).expect("switch to scene 1");
    connector
        .set_block_parameter(0, 0, "gain", 3.0, SceneMode::Activate)
        .expect("set gain in scene 1");

    connector.switch_scene(0).expect("switch back to baseline scene");
    println!("scene 0 (baseline) gain: {}", connector.current().preset.block(0, 0).unwrap().parameters[0].value);
    connector.switch_scene(1).expect("switch to scene 1 again");
    println!("scene 1 gain: {}", connector.current().preset.block(0, 0).unwrap().parameters[0].value);

    let _ = std::fs::remove_dir_all(&dir);
}
