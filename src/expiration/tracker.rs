use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// キー毎の失効期限を管理する.
///
/// 期限は、最後に`track`された時刻に固定のタイムアウトを加えたものとなる.
/// 各キーは「期限待ち」と「保留中(期限の判定対象外)」のいずれかの状態で追跡される.
///
/// `poll_expired`で取り出されたキーは、`confirm`ないし`retry`が呼ばれるまで、
/// 元の期限と共に「確認待ち」として保持される.
#[derive(Debug)]
pub struct ExpirationTracker<K> {
    timeout: Duration,
    entries: HashMap<K, Entry>,
    queue: BTreeMap<(Instant, u64), K>,
    unconfirmed: HashMap<K, Instant>,
    seq: u64,
}
impl<K> ExpirationTracker<K>
where
    K: Clone + Eq + Hash,
{
    /// 新しい`ExpirationTracker`インスタンスを生成する.
    pub fn new(timeout: Duration) -> Self {
        ExpirationTracker {
            timeout,
            entries: HashMap::new(),
            queue: BTreeMap::new(),
            unconfirmed: HashMap::new(),
            seq: 0,
        }
    }

    /// タイムアウトを返す.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `key`の期限を`now + timeout`に設定する.
    ///
    /// 既に追跡中の場合には期限が更新され、保留中だった場合には期限待ちに戻る.
    pub fn track(&mut self, key: K, now: Instant) {
        self.unconfirmed.remove(&key);
        let deadline = now + self.timeout;
        self.arm(key, deadline);
    }

    /// `key`の追跡は継続したまま、期限の判定対象から外す.
    ///
    /// 再度`track`されるまで、このキーが失効することはない.
    pub fn invalidate(&mut self, key: &K) {
        if let Some(entry) = self.entries.get_mut(key) {
            if let Some(seq) = entry.armed.take() {
                self.queue.remove(&(entry.deadline, seq));
            }
        }
    }

    /// `key`の追跡を止める.
    pub fn forget(&mut self, key: &K) {
        self.unconfirmed.remove(key);
        if let Some(entry) = self.entries.remove(key) {
            if let Some(seq) = entry.armed {
                self.queue.remove(&(entry.deadline, seq));
            }
        }
    }

    /// `poll_expired`で取り出された`key`の失効処理が失敗した場合に、
    /// 元の期限のまま`key`を再度期限待ちにする.
    ///
    /// 確認待ちではないキーに対しては何もしない.
    pub fn retry(&mut self, key: &K) {
        if let Some((key, deadline)) = self.unconfirmed.remove_entry(key) {
            self.arm(key, deadline);
        }
    }

    /// `poll_expired`で取り出された`key`の失効処理が完了したことを伝える.
    pub fn confirm(&mut self, key: &K) {
        self.unconfirmed.remove(key);
    }

    /// 確認待ちのキーの数を返す.
    pub fn unconfirmed_len(&self) -> usize {
        self.unconfirmed.len()
    }

    /// 最も早い期限を返す.
    ///
    /// 期限待ちのキーが存在しない場合には`None`が返される.
    pub fn next_expiration(&self) -> Option<Instant> {
        self.queue.keys().next().map(|&(deadline, _)| deadline)
    }

    /// 期限が`now`以前のキーの内で、最も期限が早いものを取り出す.
    ///
    /// 取り出されたキーは追跡対象から外れ、確認待ちとなる.
    pub fn poll_expired(&mut self, now: Instant) -> Option<K> {
        let (deadline, seq) = *self.queue.keys().next()?;
        if deadline > now {
            return None;
        }
        let key = self.queue.remove(&(deadline, seq))?;
        self.entries.remove(&key);
        self.unconfirmed.insert(key.clone(), deadline);
        Some(key)
    }

    /// 追跡中(保留中を含む)のキー群を返す.
    pub fn tracked_keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// `key`が追跡中(保留中を含む)かどうかを判定する.
    pub fn is_tracked(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// 追跡中のキーの数を返す.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 追跡中のキーが存在しないかどうかを判定する.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn arm(&mut self, key: K, deadline: Instant) {
        self.seq += 1;
        let seq = self.seq;
        if let Some(old) = self.entries.insert(
            key.clone(),
            Entry {
                deadline,
                armed: Some(seq),
            },
        ) {
            if let Some(old_seq) = old.armed {
                self.queue.remove(&(old.deadline, old_seq));
            }
        }
        self.queue.insert((deadline, seq), key);
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    deadline: Instant,
    armed: Option<u64>,
}
