//! `current` 链接维护
//!
//! 组件启用时 `current` 必须指向当前版本目录，每次重载时校正。

use crate::exec::Batch;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// 校正前需要执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymlinkPlan {
    /// 链接已指向正确目标
    Keep,
    /// 链接指向其他位置，删除后重建
    ReplaceLink(PathBuf),
    /// 同名普通文件，删除后创建
    ReplaceFile,
    /// 同名空目录，删除后创建
    ReplaceEmptyDir,
    /// 同名非空目录，放弃
    Blocked,
    /// 不存在，直接创建
    Create,
}

/// 校正结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkOutcome {
    Unchanged,
    Created,
    Blocked,
    Failed,
}

/// 检查链接现状
pub fn plan_symlink(src: &Path, dest: &Path) -> SymlinkPlan {
    let Ok(metadata) = std::fs::symlink_metadata(dest) else {
        return SymlinkPlan::Create;
    };

    if metadata.file_type().is_symlink() {
        return match std::fs::read_link(dest) {
            Ok(target) if same_path(&target, src) => SymlinkPlan::Keep,
            Ok(target) => SymlinkPlan::ReplaceLink(target),
            Err(_) => SymlinkPlan::ReplaceLink(PathBuf::new()),
        };
    }
    if metadata.is_file() {
        return SymlinkPlan::ReplaceFile;
    }
    match std::fs::read_dir(dest) {
        Ok(mut entries) => {
            if entries.next().is_none() {
                SymlinkPlan::ReplaceEmptyDir
            } else {
                SymlinkPlan::Blocked
            }
        }
        Err(_) => SymlinkPlan::Blocked,
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// 让 `dest` 指向 `src`
pub async fn reconcile_symlink(src: &Path, dest: &Path, batch: &Batch) -> SymlinkOutcome {
    let plan = plan_symlink(src, dest);
    debug!(target: "panel", "链接 {} -> {}: {:?}", dest.display(), src.display(), plan);

    let cleared = match plan {
        SymlinkPlan::Keep => return SymlinkOutcome::Unchanged,
        SymlinkPlan::Blocked => {
            error!(
                target: "panel",
                "{} 应为指向 {} 的链接，请删除该目录后重新加载",
                dest.display(),
                src.display()
            );
            return SymlinkOutcome::Blocked;
        }
        SymlinkPlan::ReplaceLink(_) => remove_link(dest, batch).await,
        SymlinkPlan::ReplaceFile => {
            error!(target: "panel", "删除 {}：此处不应是普通文件", dest.display());
            std::fs::remove_file(dest).is_ok()
        }
        SymlinkPlan::ReplaceEmptyDir => std::fs::remove_dir(dest).is_ok(),
        SymlinkPlan::Create => true,
    };

    if cleared && create_link(src, dest, batch).await {
        SymlinkOutcome::Created
    } else {
        error!(target: "panel", "创建链接失败: {} -> {}", dest.display(), src.display());
        SymlinkOutcome::Failed
    }
}

#[cfg(windows)]
async fn create_link(src: &Path, dest: &Path, batch: &Batch) -> bool {
    batch.create_symlink(src, dest).await && dest.exists()
}

#[cfg(windows)]
async fn remove_link(dest: &Path, batch: &Batch) -> bool {
    batch.remove_symlink(dest).await && std::fs::symlink_metadata(dest).is_err()
}

#[cfg(not(windows))]
async fn create_link(src: &Path, dest: &Path, _batch: &Batch) -> bool {
    std::os::unix::fs::symlink(src, dest).is_ok()
}

#[cfg(not(windows))]
async fn remove_link(dest: &Path, _batch: &Batch) -> bool {
    std::fs::remove_file(dest).is_ok()
}
