/// Oblivious HTTP encapsulation: key configuration, the gateway core, and
/// the client half used by tests and smoke tooling.
pub mod client;
pub mod gateway;
pub mod keys;
