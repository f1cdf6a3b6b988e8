pub mod credential_verifier;
pub mod http_client;
