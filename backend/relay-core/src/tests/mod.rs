mod connection_state;
mod outbound;
mod registry;
mod relay;
mod router;
mod support;
