//! 调度引擎配置
//!
//! 配置是显式构造并按引用传递的结构体，不依赖进程级单例，
//! 同一进程内可以运行多个互不影响的调度实例。
//!
//! - **models**: 配置数据模型（调度参数、日志、应用配置）
//!
//! 加载顺序：TOML 文件 → 以 `SCHEDULER` 为前缀的环境变量（嵌套分隔符 `__`）。

pub mod models;

pub use models::*;
