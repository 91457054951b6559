mod ipc_tests;
mod relay_tests;
