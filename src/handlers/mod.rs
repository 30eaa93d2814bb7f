pub mod blogs;
pub mod http;
pub mod users;
pub mod ws;
