//! # hsk-study - HSK 闪卡复习工具
//!
//! 把 `hsk-algo` 的抽取算法接到真实的学习内容和持久化上:
//!
//! - [`catalog`] - 词汇、课文、问答三种内容的只读目录
//! - [`storage`] - 键值存储后端 (JSON 文件 / SQLite / 内存)
//! - [`weight_store`] - 分区权重的加载、合并与保存
//! - [`session`] - 一次学习会话的抽取与复习流程
//! - [`presenter`] - 终端交互循环

pub mod catalog;
pub mod config;
pub mod logging;
pub mod presenter;
pub mod session;
pub mod storage;
pub mod weight_store;

pub use catalog::{split_pinyin, Catalog, CatalogError, CatalogProvider, PartitionKey, StudyItem, StudyMode};
pub use config::Config;
pub use presenter::{Presenter, PresenterError, RunStats};
pub use session::{ActivationSummary, DraftedItem, SessionError, StudySession};
pub use storage::{open_store, KeyValueStore, MemoryStore, StorageError, StoreBackend};
pub use weight_store::WeightStore;
