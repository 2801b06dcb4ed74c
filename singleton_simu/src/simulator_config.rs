use rand::rngs::StdRng;
use rand::SeedableRng;
use singleton::node::Member;
use singleton::policy::{ElectionConfig, PolicyConfig};
use singleton::service::ServiceId;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::io::IoConfig;
use crate::types::{LogicalDuration, Probability, Range, SharedRng};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// シミュレータで使われる乱数のシード.
    ///
    /// この値によって、シミュレータ上で発生するイベントが全て決定される.
    #[serde(default = "SimulatorConfig::default_seed")]
    pub seed: u64,

    #[serde(default = "SimulatorConfig::default_loop_count")]
    pub loop_count: usize,

    /// トポロジーの変化が途絶えてから、不変条件を検査するまでの論理時間.
    ///
    /// 通知やコマンドの最大遅延(再送を含む)よりも十分に長い必要がある.
    #[serde(default = "SimulatorConfig::default_settle_ticks")]
    pub settle_ticks: LogicalDuration,

    #[serde(default = "SimulatorConfig::default_nodes")]
    pub nodes: BTreeSet<String>,

    #[serde(default = "SimulatorConfig::default_services")]
    pub services: BTreeSet<String>,

    #[serde(default = "SimulatorConfig::default_node_down")]
    pub node_down: Probability,

    #[serde(default = "SimulatorConfig::default_node_restart_interval")]
    pub node_restart_interval: Range<LogicalDuration>,

    #[serde(default = "SimulatorConfig::default_toggle_candidacy")]
    pub toggle_candidacy: Probability,

    /// 各コーディネータに適用される選出設定.
    ///
    /// 全メンバの合意を検査するために、選出ポリシーは決定的である必要がある.
    #[serde(default)]
    pub election: ElectionConfig,

    #[serde(default)]
    pub io: IoConfig,
}
impl SimulatorConfig {
    /// 現在のUNIXタイムスタンプをマイクロ秒単位で返す.
    pub fn default_seed() -> u64 {
        let unixtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Never fails");
        unixtime.as_secs() * 1_000_000 + u64::from(unixtime.subsec_nanos()) / 1000
    }

    /// `10000`
    pub fn default_loop_count() -> usize {
        10000
    }

    /// `["foo", "bar", "baz", "qux", "quux"]`
    pub fn default_nodes() -> BTreeSet<String> {
        ["foo", "bar", "baz", "qux", "quux"]
            .iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// `["cache-expiration", "scheduler"]`
    pub fn default_services() -> BTreeSet<String> {
        ["cache-expiration", "scheduler"]
            .iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// `0.001`
    pub fn default_node_down() -> Probability {
        Probability { prob: 0.001 }
    }

    /// `100...2000`
    pub fn default_node_restart_interval() -> Range<LogicalDuration> {
        Range {
            min: 100,
            max: 2000,
        }
    }

    /// `0.002`
    pub fn default_toggle_candidacy() -> Probability {
        Probability { prob: 0.002 }
    }

    /// `500`
    pub fn default_settle_ticks() -> LogicalDuration {
        500
    }

    pub fn make_rng(&self) -> SharedRng {
        SharedRng::new(StdRng::seed_from_u64(self.seed))
    }

    /// ノード群を、参加順に並べたメンバ群に変換する.
    ///
    /// 各メンバには`127.0.0.1:7600`から順にアドレスが割り当てられる.
    pub fn members(&self) -> Vec<Member> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7600 + i as u16);
                Member::with_address(node.as_str(), addr)
            })
            .collect()
    }

    pub fn services(&self) -> Vec<ServiceId> {
        self.services
            .iter()
            .map(|s| ServiceId::new(s.as_str()))
            .collect()
    }

    /// 選出ポリシーが、同じ候補者プールに対して常に同じ結果を返すかどうかを判定する.
    pub fn has_deterministic_policy(&self) -> bool {
        is_deterministic(&self.election.policy)
    }
}
impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            seed: SimulatorConfig::default_seed(),
            loop_count: SimulatorConfig::default_loop_count(),
            nodes: SimulatorConfig::default_nodes(),
            services: SimulatorConfig::default_services(),
            node_down: SimulatorConfig::default_node_down(),
            node_restart_interval: SimulatorConfig::default_node_restart_interval(),
            toggle_candidacy: SimulatorConfig::default_toggle_candidacy(),
            settle_ticks: SimulatorConfig::default_settle_ticks(),
            election: ElectionConfig::default(),
            io: IoConfig::default(),
        }
    }
}

fn is_deterministic(policy: &PolicyConfig) -> bool {
    match *policy {
        PolicyConfig::Random { seed } => seed.is_some(),
        PolicyConfig::Position { .. } => true,
        PolicyConfig::Preferred { ref base, .. } => {
            base.as_ref().map_or(true, |b| is_deterministic(b))
        }
    }
}
