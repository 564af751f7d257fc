//! 可观测性
//!
//! 结构化日志初始化；默认 info，可用 RUST_LOG 覆盖。
//! 技能层的 skill_audit 事件也走这里的订阅器。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();
}
