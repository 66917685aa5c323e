pub mod audit;
pub mod handlers;
pub mod items;
pub mod middleware;
pub mod notifications;
pub mod program;
pub mod queues;
pub mod routes;

pub use routes::create_router;
