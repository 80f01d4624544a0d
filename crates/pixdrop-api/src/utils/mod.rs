pub mod ip_extraction;

pub use ip_extraction::{client_ip, ClientIp};
