pub mod agent_client;
mod client_helper;
