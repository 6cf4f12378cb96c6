pub mod activity;
pub mod admission;
pub mod attendance;
pub mod evaluation;
pub mod role;
pub mod subscription;
pub mod ticket;
