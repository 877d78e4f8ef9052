pub mod init;
pub mod init_types;

pub use init::setup;
