//! I/O関連の構成設定を集めたモジュール.
use crate::types::{LogicalDuration, Probability, Range};

/// メンバシップレジストリの構成設定.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// メンバシップビューやプロバイダ群の変更が、各購読者に届くまでの遅延.
    ///
    /// 一つの購読者に対する通知の順序は、遅延に関わらず保存される.
    #[serde(default = "RegistryConfig::default_delay")]
    pub delay: Range<LogicalDuration>,
}
impl RegistryConfig {
    /// `1..30`
    pub fn default_delay() -> Range<LogicalDuration> {
        Range { min: 1, max: 30 }
    }
}
impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            delay: RegistryConfig::default_delay(),
        }
    }
}

/// 通信チャンネルの構成設定.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// コマンドの消失率.
    ///
    /// `1.0`なら全てのコマンドが相手に届くことなく消失する.
    /// 消失した場合でも、送信側には成功したように見える.
    #[serde(default = "ChannelConfig::default_drop")]
    pub drop: Probability,

    /// コマンドの重複率.
    ///
    /// `1.0`なら(消失しなかった)全てのコマンドが複製される.
    #[serde(default = "ChannelConfig::default_duplicate")]
    pub duplicate: Probability,

    /// コマンドの遅延.
    ///
    /// 宛先がダウンしている場合には、この遅延の後に送信が失敗する.
    #[serde(default = "ChannelConfig::default_delay")]
    pub delay: Range<LogicalDuration>,
}
impl ChannelConfig {
    /// `10..50`
    pub fn default_delay() -> Range<LogicalDuration> {
        Range { min: 10, max: 50 }
    }

    /// `0.05`
    pub fn default_drop() -> Probability {
        Probability { prob: 0.05 }
    }

    /// `0.01`
    pub fn default_duplicate() -> Probability {
        Probability { prob: 0.01 }
    }
}
impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            delay: ChannelConfig::default_delay(),
            drop: ChannelConfig::default_drop(),
            duplicate: ChannelConfig::default_duplicate(),
        }
    }
}
