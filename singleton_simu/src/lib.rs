//! `singleton`クレート用の決定論的なクラスタシミュレータ.
//!
//! 複数のノード上で、複数のサービスのコーディネータを動作させ、
//! ノードのクラッシュや立候補の反転、コマンドの消失・重複・遅延を発生させながら、
//! 最終的に各サービスのプライマリが高々一つに収束することを検査する.
extern crate futures;
extern crate prometrics;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serdeconv;
extern crate singleton;
#[macro_use]
extern crate trackable;

macro_rules! log {
    ($($arg:expr),*) => {
        {
            use ::std::fmt::Write;
            let _ = writeln!($($arg),*);
        }
    }
}

pub use singleton::{Error, ErrorKind, Result};

#[doc(no_inline)]
pub use crate::io::{DeterministicIo, DeterministicIoBuilder};
pub use crate::logger::Logger;
pub use crate::simulator::Simulator;
pub use crate::simulator_config::SimulatorConfig;

pub mod io;
pub mod process;
pub mod service;
pub mod types;

mod logger;
mod simulator;
mod simulator_config;
