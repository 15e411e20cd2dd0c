//! # hsk-algo - 抽卡式复习核心算法库
//!
//! 本 crate 提供纯 Rust 实现的闪卡抽取算法:
//!
//! - **Weighted Drafting** - 按权重比例随机抽取下一张卡片
//! - **Reinforcement** - 复习后对整个分区的权重做有界调整
//! - **Sanitization** - 持久化数据回读时的数值保护与健康诊断
//!
//! ## 设计理念
//!
//! - **无时间戳** - 仅靠每个条目的一个标量权重近似间隔重复
//! - **无 I/O** - 算法只修改调用方传入的权重表，持久化由调用方负责
//! - **可复现** - 支持固定随机种子，键按稳定顺序遍历
//!
//! ## 模块结构
//!
//! - [`drafter`] - 抽取与强化更新
//! - [`sanitize`] - 数值清洗与诊断
//! - [`types`] - 公共类型和常量
//!
//! ## 使用示例
//!
//! ```rust
//! use hsk_algo::{Drafter, ReviewOutcome, WeightMap};
//!
//! let mut weights = WeightMap::with_keys(["你好", "谢谢", "再见"]);
//! let mut drafter = Drafter::with_seed(7);
//!
//! let key = drafter.draft(&weights).unwrap();
//! drafter.reinforce(&mut weights, &key, ReviewOutcome::Success).unwrap();
//! assert_eq!(weights.get(&key), Some(0.1));
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod drafter;
pub mod sanitize;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

/// 重新导出所有公共类型
pub use types::*;

/// 重新导出抽取器
pub use drafter::{
    ranked_probabilities, selection_probabilities, DraftError, Drafter, DrafterOptions,
};

/// 重新导出清洗工具
pub use sanitize::{diagnose_weights, has_invalid_weights, sanitize_weight, sanitize_weights};
