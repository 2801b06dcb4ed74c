//! シミュレータ用のI/O実装.
pub use self::deterministic::{DeterministicIo, DeterministicIoBuilder, DeterministicRegistration};
pub use self::registry::Registry;
pub use self::transport::MessageBroker;

pub mod configs;
pub mod futures;

mod deterministic;
mod registry;
mod transport;

/// I/O関連の構成設定.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    #[serde(default)]
    pub channel: configs::ChannelConfig,

    #[serde(default)]
    pub registry: configs::RegistryConfig,
}
