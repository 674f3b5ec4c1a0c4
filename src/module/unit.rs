//! 可注册为服务的组件
//!
//! 每个具体组件实现 [`ServiceUnit`]，由 [`crate::module::UnitCatalog`] 显式列举。

use crate::common::WaitPolicy;
use crate::config::AppContext;
use crate::module::component::Module;
use crate::service::{
    Backend, CmdLineOutput, LifecycleHooks, ServiceBackend, ServiceController, ServiceDescriptor,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// 可注册为服务的组件
#[async_trait]
pub trait ServiceUnit: Send + Sync {
    /// 组件信息
    fn module(&self) -> &Module;

    /// 服务控制器
    fn controller(&self) -> &ServiceController;

    /// 组件钩子
    fn hooks(&self) -> Arc<dyn LifecycleHooks>;

    /// 监听端口
    fn port(&self) -> Option<u16>;

    fn id(&self) -> &str {
        self.module().id()
    }

    fn name(&self) -> &str {
        self.module().name()
    }

    fn version(&self) -> Option<&str> {
        self.module().version()
    }

    fn is_enabled(&self) -> bool {
        self.module().is_enabled()
    }

    fn service_name(&self) -> &str {
        self.controller().name()
    }

    fn descriptor(&self) -> &ServiceDescriptor {
        self.controller().descriptor()
    }

    /// 后端名称
    fn backend(&self) -> &'static str {
        self.controller().backend_label()
    }

    fn error_log(&self) -> Option<PathBuf> {
        self.hooks().error_log()
    }

    async fn syntax_check(&self) -> Option<CmdLineOutput> {
        self.hooks().syntax_check().await
    }

    async fn prepare_create(&self) -> bool {
        self.hooks().prepare_create().await
    }

    async fn prepare_start(&self) -> bool {
        self.hooks().prepare_start().await
    }

    async fn custom_install(&self) -> Option<bool> {
        self.hooks().custom_install(self.descriptor()).await
    }

    async fn custom_uninstall(&self) -> Option<bool> {
        self.hooks().custom_uninstall().await
    }
}

/// 按服务名和默认后端生成后端实现
pub type BackendResolver = dyn Fn(&str, Backend) -> Box<dyn ServiceBackend> + Send + Sync;

/// 构建组件时的可选覆盖项
#[derive(Clone, Copy, Default)]
pub struct BuildOptions<'a> {
    resolver: Option<&'a BackendResolver>,
    wait_policy: Option<WaitPolicy>,
}

impl<'a> BuildOptions<'a> {
    /// 使用自定义后端
    pub fn with_resolver(mut self, resolver: &'a BackendResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// 覆盖状态轮询策略
    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = Some(policy);
        self
    }

    /// 创建服务控制器
    pub fn controller(
        &self,
        ctx: &AppContext,
        descriptor: ServiceDescriptor,
        backend: Backend,
        hooks: Arc<dyn LifecycleHooks>,
    ) -> ServiceController {
        let controller = match self.resolver {
            Some(resolve) => {
                let control = resolve(&descriptor.name, backend);
                ServiceController::with_backend(descriptor, control)
                    .with_cancellation(ctx.cancellation().clone())
            }
            None => ServiceController::new(descriptor, backend, ctx.runner()),
        };
        let controller = controller.with_hooks(hooks);
        match self.wait_policy {
            Some(policy) => controller.with_wait_policy(policy),
            None => controller,
        }
    }
}

impl std::fmt::Debug for BuildOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("resolver", &self.resolver.is_some())
            .field("wait_policy", &self.wait_policy)
            .finish()
    }
}
