pub mod hash;
pub mod remote;
