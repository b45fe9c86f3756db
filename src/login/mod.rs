/// IMS login helper: redirect parsing, session snapshots and profile lookups
pub mod avatar;
pub mod expiry;
pub mod flow;
pub mod profile;
pub mod redact;
pub mod redirect;
pub mod session;
