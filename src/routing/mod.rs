pub mod cache;
pub mod client;

pub use cache::RouteCache;
pub use client::{HttpRouteClient, NullRouteClient, RouteClient, RouteResponse};
