pub mod server;
pub mod topology;
pub mod transport;

pub use server::RouterServer;
pub use topology::Topology;
pub use transport::{deliver, PeerConnection};
