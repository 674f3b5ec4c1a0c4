//! 组件生命周期钩子
//!
//! 组件通过 [`LifecycleHooks`] 向服务控制器注入特定逻辑，
//! 所有方法都有默认实现，组件只覆盖需要的部分。

use crate::service::descriptor::ServiceDescriptor;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

/// 语法检查命令的输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmdLineOutput {
    /// 配置是否通过检查
    pub syntax_ok: bool,
    /// 检查命令的输出内容
    pub content: String,
}

impl CmdLineOutput {
    pub fn new(syntax_ok: bool, content: impl Into<String>) -> Self {
        Self {
            syntax_ok,
            content: content.into(),
        }
    }
}

/// 生命周期钩子
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// 注册服务前的准备（重建配置、初始化数据目录等）
    async fn prepare_create(&self) -> bool {
        true
    }

    /// 启动服务前的准备
    async fn prepare_start(&self) -> bool {
        true
    }

    /// 组件自带的注册方式，返回 `None` 表示使用后端注册
    async fn custom_install(&self, _descriptor: &ServiceDescriptor) -> Option<bool> {
        None
    }

    /// 组件自带的注销方式，返回 `None` 表示使用后端注销
    async fn custom_uninstall(&self) -> Option<bool> {
        None
    }

    /// 配置语法检查，组件不支持时返回 `None`
    async fn syntax_check(&self) -> Option<CmdLineOutput> {
        None
    }

    /// 组件错误日志路径
    fn error_log(&self) -> Option<PathBuf> {
        None
    }
}
