//! クラスタ内で高々一つのメンバでのみ実行されるべきサービス(シングルトン)の
//! プライマリ選出と、起動/停止の制御を提供するクレート.
//!
//! 各メンバは、同じ候補者プールに同じ決定的な選出ポリシーを適用することで、
//! 定常状態では同じプライマリに合意する.
//! メンバシップの変化の直後には、一時的に複数のメンバ(ないし零個のメンバ)が
//! プライマリとなり得るが、全メンバが同じプールを観測した時点で解消される.
//!
//! このクレート自体は、選出と役割制御のロジックのみに専念しており、
//! 実際に動作するシステムで利用するためには、メンバシップの通知や
//! コマンドの送信を担う`Io`トレイトの実装を別個用意する必要がある.
#![warn(missing_docs)]
extern crate arc_swap;
extern crate futures;
extern crate prometrics;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[cfg(test)]
extern crate serdeconv;
extern crate tracing;
#[macro_use]
extern crate trackable;

pub use crate::coordinator::{CoordinatorOptions, ElectionCoordinator, Event};
pub use crate::error::{Error, ErrorKind};
pub use crate::io::{Io, Registration, Transport};

pub mod cluster;
pub mod election;
pub mod expiration;
pub mod facade;
pub mod listener;
pub mod message;
pub mod metrics;
pub mod node;
pub mod policy;
pub mod retry;
pub mod service;

mod coordinator;
mod error;
mod io;
mod node_state;
mod test_util;

/// クレート固有の`Result`型.
pub type Result<T> = ::std::result::Result<T, Error>;
