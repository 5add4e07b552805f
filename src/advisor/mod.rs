pub mod client;

pub use client::{AdvisorClient, HttpAdvisorClient, NullAdvisorClient};
