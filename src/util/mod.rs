//! Process and filesystem helpers.

pub mod etcdctl;
pub mod fs;
