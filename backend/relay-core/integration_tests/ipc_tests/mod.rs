pub(crate) mod helpers;
mod ipc;
