//! 選出ポリシー関連.
//!
//! 選出ポリシーは、順序付けられた候補者リストから一つのメンバを選ぶ純粋な関数であり、
//! 全てのメンバが同じプールに同じ決定的ポリシーを適用することで、同じ結果に合意する.
use rand::rngs::StdRng;
use rand::{thread_rng, Rng, SeedableRng};
use std::str::FromStr;

pub use self::config::{ElectionConfig, PolicyConfig};
pub use self::preference::Preference;

use crate::node::Member;
use crate::{Error, ErrorKind, Result};

mod config;
mod preference;

/// 選出ポリシー.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionPolicy {
    /// 候補者の中から一様ランダムに選ぶ.
    ///
    /// `seed`が指定されていない場合には、メンバ毎に異なる結果となり得るので、
    /// 厳密な相互排他が不要な場合にのみ用いること.
    Random { seed: Option<u64> },

    /// 指定位置の候補者を選ぶ.
    ///
    /// 位置はリストの範囲に丸められる.
    /// `0`は先頭(最古)のメンバで、負数は末尾からの位置(`-1`が最新のメンバ)を表す.
    Position(isize),

    /// 優先条件に合致する候補者を前方に並べ替えた上で、基底ポリシーに委譲する.
    ///
    /// 複数の優先条件は指定順に評価され、最初に合致したものが採用される.
    /// どれにも合致しない候補者の相対順序は維持される.
    Preferred {
        preferences: Vec<Preference>,
        base: Box<ElectionPolicy>,
    },
}
impl ElectionPolicy {
    /// `base`を基底とした`Preferred`ポリシーを生成する.
    pub fn preferred(preferences: Vec<Preference>, base: ElectionPolicy) -> Self {
        ElectionPolicy::Preferred {
            preferences,
            base: Box::new(base),
        }
    }

    /// `candidates`の中から一つのメンバを選出する.
    ///
    /// 候補者が空の場合には`None`が、一人だけの場合にはポリシーに関わらずその候補者が返される.
    pub fn elect(&self, candidates: &[Member]) -> Option<Member> {
        match candidates.len() {
            0 => return None,
            1 => return Some(candidates[0].clone()),
            _ => {}
        }
        match *self {
            ElectionPolicy::Random { seed } => {
                let i = if let Some(seed) = seed {
                    StdRng::seed_from_u64(seed).gen_range(0..candidates.len())
                } else {
                    thread_rng().gen_range(0..candidates.len())
                };
                Some(candidates[i].clone())
            }
            ElectionPolicy::Position(position) => {
                let i = clamp_position(position, candidates.len());
                Some(candidates[i].clone())
            }
            ElectionPolicy::Preferred {
                ref preferences,
                ref base,
            } => {
                let mut sorted = candidates.to_vec();
                sorted.sort_by_key(|m| {
                    preferences
                        .iter()
                        .position(|p| p.matches(m))
                        .unwrap_or_else(|| preferences.len())
                });
                base.elect(&sorted)
            }
        }
    }
}
impl Default for ElectionPolicy {
    fn default() -> Self {
        ElectionPolicy::Position(0)
    }
}
impl FromStr for ElectionPolicy {
    type Err = Error;

    /// `random`, `random:SEED`, `position:N`, `preferred:PREF[,PREF...]`形式の文字列を解釈する.
    ///
    /// `PREF`は`name=NAME`ないし`location=IP:PORT`であり、基底ポリシーは`position:0`となる.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, arg) = match s.find(':') {
            Some(i) => (&s[..i], Some(&s[i + 1..])),
            None => (s, None),
        };
        match (kind, arg) {
            ("random", None) => Ok(ElectionPolicy::Random { seed: None }),
            ("random", Some(seed)) => {
                let seed = track!(seed.parse::<u64>().map_err(Error::from), "seed={:?}", seed)?;
                Ok(ElectionPolicy::Random { seed: Some(seed) })
            }
            ("position", None) => Ok(ElectionPolicy::Position(0)),
            ("position", Some(n)) => {
                let n = track!(n.parse::<isize>().map_err(Error::from), "position={:?}", n)?;
                Ok(ElectionPolicy::Position(n))
            }
            ("preferred", Some(prefs)) => {
                let preferences = track!(prefs
                    .split(',')
                    .map(|p| p.trim().parse::<Preference>())
                    .collect::<Result<Vec<_>>>())?;
                track_assert!(!preferences.is_empty(), ErrorKind::InvalidInput);
                Ok(ElectionPolicy::preferred(
                    preferences,
                    ElectionPolicy::default(),
                ))
            }
            _ => track_panic!(ErrorKind::InvalidInput, "Unknown election policy: {:?}", s),
        }
    }
}

fn clamp_position(position: isize, len: usize) -> usize {
    debug_assert!(len > 0);
    let len = len as isize;
    let i = if position < 0 { len + position } else { position };
    i.max(0).min(len - 1) as usize
}

/// 選出に必要な最小の候補者数.
///
/// プールの大きさがこの値に満たない場合には、ポリシーに関わらずプライマリは選出されない.
/// 少数派のパーティションでの二重選出を避けるために用いる.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quorum(usize);
impl Quorum {
    /// 新しい`Quorum`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// `size`が`0`の場合には`ErrorKind::InvalidInput`が返される.
    pub fn new(size: usize) -> Result<Self> {
        track_assert_ne!(size, 0, ErrorKind::InvalidInput);
        Ok(Quorum(size))
    }

    /// クォーラムの値を返す.
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// `candidates`がクォーラムを満たしているかどうかを判定する.
    pub fn admit(self, candidates: &[Member]) -> bool {
        candidates.len() >= self.0
    }

    /// 大きさ`pool_size`のプールが、あと一人の離脱でクォーラムを失う状態かどうかを判定する.
    ///
    /// クォーラムが`1`の場合には常に`false`となる.
    pub fn is_fragile(self, pool_size: usize) -> bool {
        self.0 > 1 && pool_size == self.0
    }
}
impl Default for Quorum {
    fn default() -> Self {
        Quorum(1)
    }
}
