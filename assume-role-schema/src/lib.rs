pub mod credentials;
pub mod profile;
pub mod shell;
