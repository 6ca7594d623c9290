//! Dummy-mode session demo: add a plugin instance, set a parameter, and
//! read it back, without a live engine socket.
//!
//! Run with: MOD_DEV_HOST=1 cargo run -p modconn-proto --example dummy_session_demo

use modconn_proto::EngineClient;

fn main() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    std::env::set_var("MOD_DEV_HOST", "1");
    let mut client = EngineClient::connect().expect("dummy engine always connects");

    client.add("http://example.org/plugins/gain", 0).expect("add plugin instance 0");
    client.param_set(0, "gain", -6.0).expect("set gain");
    let value = client.param_get(0, "gain").expect("read gain back");
    println!("gain after set: {value}");

    {
        let mut batch = client.batch();
        batch.client().bypass(0, false).expect("enable instance");
        batch.client().connect("system:capture_1", "effect_0:in").expect("wire input");
    }
    println!("batch scope closed, requests flushed");

    client.remove(0).expect("tear down instance 0");
}
