pub mod flood;
pub mod link;
pub mod lsd;
pub mod messages;
pub mod routing_table;

pub use flood::*;
pub use link::*;
pub use lsd::*;
pub use messages::*;
pub use routing_table::*;
