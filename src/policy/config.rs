use std::time::Duration;

use super::{ElectionPolicy, Preference, Quorum};
use crate::coordinator::CoordinatorOptions;
use crate::retry::BackoffSchedule;
use crate::Result;

/// 選出に関する設定.
///
/// TOMLないしJSONからデシリアライズされることを想定している:
///
/// ```toml
/// quorum = 2
/// backoff_ms = [0, 10, 100]
///
/// [policy]
/// type = "preferred"
/// preferences = [{ name = "B" }, { location = "10.0.0.2:7600" }]
/// base = { type = "position", position = 0 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// 選出に必要な最小の候補者数.
    #[serde(default = "default_quorum")]
    pub quorum: usize,

    /// 活性化コマンドの再送間隔(ミリ秒).
    ///
    /// 要素数が試行回数となる.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,

    /// 選出ポリシー.
    #[serde(default)]
    pub policy: PolicyConfig,
}
impl ElectionConfig {
    /// 設定を検証して、コーディネータの実行時オプションを生成する.
    ///
    /// # Errors
    ///
    /// クォーラムが`0`の場合や、再送間隔が空の場合には`ErrorKind::InvalidInput`が返される.
    pub fn build(&self) -> Result<CoordinatorOptions> {
        let quorum = track!(Quorum::new(self.quorum))?;
        let delays = self
            .backoff_ms
            .iter()
            .map(|&ms| Duration::from_millis(ms))
            .collect();
        let backoff = track!(BackoffSchedule::new(delays))?;
        Ok(CoordinatorOptions {
            policy: self.policy.to_policy(),
            quorum,
            backoff,
        })
    }
}
impl Default for ElectionConfig {
    fn default() -> Self {
        ElectionConfig {
            policy: PolicyConfig::default(),
            quorum: default_quorum(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// 選出ポリシーの設定.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// `ElectionPolicy::Random`.
    Random {
        #[serde(default)]
        seed: Option<u64>,
    },

    /// `ElectionPolicy::Position`.
    Position {
        #[serde(default)]
        position: isize,
    },

    /// `ElectionPolicy::Preferred`.
    ///
    /// `base`が省略された場合には`position = 0`となる.
    Preferred {
        preferences: Vec<Preference>,
        #[serde(default)]
        base: Option<Box<PolicyConfig>>,
    },
}
impl PolicyConfig {
    /// 対応する`ElectionPolicy`を返す.
    pub fn to_policy(&self) -> ElectionPolicy {
        match *self {
            PolicyConfig::Random { seed } => ElectionPolicy::Random { seed },
            PolicyConfig::Position { position } => ElectionPolicy::Position(position),
            PolicyConfig::Preferred {
                ref preferences,
                ref base,
            } => {
                let base = base
                    .as_ref()
                    .map(|b| b.to_policy())
                    .unwrap_or_default();
                ElectionPolicy::preferred(preferences.clone(), base)
            }
        }
    }
}
impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Position { position: 0 }
    }
}

fn default_quorum() -> usize {
    1
}

fn default_backoff_ms() -> Vec<u64> {
    vec![0, 10, 100]
}
