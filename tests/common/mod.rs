use std::sync::Arc;

use sospf::config::ProtocolSettings;
use sospf::network::RouterServer;
use sospf::types::RouterIdentity;
use sospf::Router;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A router bound to an ephemeral loopback port with its server running.
pub async fn spawn_router(simulated_address: &str) -> Arc<Router> {
    let settings = ProtocolSettings {
        io_timeout_ms: 1_000,
        ..ProtocolSettings::default()
    };
    let server = RouterServer::bind("127.0.0.1", 0, settings.worker_pool_size)
        .await
        .unwrap();
    let port = server.local_addr().unwrap().port();
    let router = Router::new(RouterIdentity::new("127.0.0.1", port, simulated_address), settings);
    server.spawn(Arc::clone(&router));
    router
}

pub fn port_of(router: &Router) -> u16 {
    router.identity().process_port
}

/// Operator `attach` from `from` to `to`.
pub async fn attach(from: &Router, to: &Router, weight: u16) -> usize {
    let peer = to.identity();
    from.attach(&peer.process_host, peer.process_port, &peer.simulated_address, weight)
        .await
        .unwrap()
}

/// Polls `$cond` until it holds; floods are asynchronous.
macro_rules! eventually {
    ($what:expr, $cond:expr) => {{
        let mut held = false;
        for _ in 0..100 {
            if $cond {
                held = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(held, "timed out waiting for {}", $what);
    }};
}
