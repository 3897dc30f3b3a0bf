//! Persisted key names
//!
//! Economic-strategy parameters are stored under their own field names,
//! see `supervisor::strategy`.

/// Encrypted address of the DAY-holding account
pub const ATTACHED_DAY_ACCOUNT: &str = "attachedDAYAccount";

/// Encrypted wallet keystore
pub const TIMENODE: &str = "tn";

/// Present when bounty claiming is enabled
pub const CLAIMING: &str = "claiming";

/// Present while scanning, so an unlock resumes it
pub const SCANNING: &str = "isTimenodeScanning";

/// Custom provider chain id
pub const PROVIDER_ID: &str = "selectedProviderId";

/// Custom provider RPC endpoint
pub const PROVIDER_ENDPOINT: &str = "selectedProviderEndpoint";
