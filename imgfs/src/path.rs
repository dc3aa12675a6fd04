//! # 路径解析
//!
//! 路径按`/`切分为若干段，逐段在目录中查找。
//! 符号链接的目标被展开回待处理的段队列中，而不是递归解析，
//! 展开次数超过 [`MAX_SYMLINK_DEPTH`] 时失败。

use std::collections::VecDeque;

use crate::config::{MAX_SYMLINK_DEPTH, ROOT_INODE};
use crate::permission::{Access, check_permissions};
use crate::{Error, FileSystem, Result};

pub(crate) trait Path {
    fn is_absolute(&self) -> bool;

    fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    /// 返回路径的`(父目录, 文件名)`，忽略末尾的`/`；根目录返回`None`。
    fn parent_file(&self) -> Option<(&Self, &Self)>;

    /// 非空的路径段
    fn segments(&self) -> impl DoubleEndedIterator<Item = &Self>;
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn parent_file(&self) -> Option<(&Self, &Self)> {
        let trimmed = self.trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }

        Some(match trimmed.rsplit_once('/') {
            None => (".", trimmed),
            Some((parent, file)) if parent.trim_end_matches('/').is_empty() => ("/", file),
            Some(pair) => pair,
        })
    }

    fn segments(&self) -> impl DoubleEndedIterator<Item = &Self> {
        self.split('/').filter(|s| !s.is_empty())
    }
}

/// 路径不以`/`开头
pub fn is_relative_path(path: &str) -> bool {
    path.is_relative()
}

/// 拆出父目录与新名字，用于创建或删除目录项
pub(crate) fn split_parent(path: &str) -> Result<(&str, &str)> {
    if path.is_empty() {
        return Err(Error::NoSuchEntry);
    }
    path.parent_file().ok_or(Error::InvalidPath)
}

/// 解析结果：目标 inode 与其绝对路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub inode: u32,
    pub path: String,
}

impl FileSystem {
    /// 解析路径，末段为符号链接时跟随它
    pub fn resolve(&mut self, path: &str) -> Result<ResolvedPath> {
        self.walk(path, true)
    }

    /// 解析路径，末段为符号链接时返回链接本身
    pub fn resolve_nofollow(&mut self, path: &str) -> Result<ResolvedPath> {
        self.walk(path, false)
    }

    /// 切换当前目录；任何错误都不会改变当前状态
    pub fn change_directory(&mut self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        let target = self.get_inode(resolved.inode)?;
        if !target.is_dir() {
            return Err(Error::NotADirectory);
        }
        if !check_permissions(target, Access::Execute.into(), &self.principal) {
            return Err(Error::PermissionDenied);
        }

        self.cwd = resolved.inode;
        self.cwd_path = resolved.path;
        Ok(())
    }

    fn walk(&mut self, path: &str, follow_last: bool) -> Result<ResolvedPath> {
        if path.is_empty() {
            return Err(Error::NoSuchEntry);
        }

        let (mut current, mut components): (u32, Vec<String>) = if path.is_absolute() {
            (ROOT_INODE, Vec::new())
        } else {
            (
                self.cwd,
                self.cwd_path.segments().map(str::to_owned).collect(),
            )
        };
        let mut pending: VecDeque<String> = path.segments().map(str::to_owned).collect();
        let mut depth = 0;
        // 以`/`结尾的路径必须指向目录，末段的符号链接因此总被跟随
        let dir_only = path.ends_with('/');
        let follow_last = follow_last || dir_only;

        while let Some(segment) = pending.pop_front() {
            let dir = self.get_inode(current)?.clone();
            if !dir.is_dir() {
                return Err(Error::NotADirectory);
            }
            if !check_permissions(&dir, Access::Execute.into(), &self.principal) {
                return Err(Error::PermissionDenied);
            }

            match segment.as_str() {
                "." => continue,
                ".." => {
                    current = self.lookup(&dir, "..")?.ok_or(Error::NoSuchEntry)?;
                    components.pop();
                }
                name => {
                    let child = self.lookup(&dir, name)?.ok_or(Error::NoSuchEntry)?;
                    let node = self.get_inode(child)?.clone();
                    if node.is_symlink() && (follow_last || !pending.is_empty()) {
                        depth += 1;
                        if depth > MAX_SYMLINK_DEPTH {
                            return Err(Error::TooManySymlinks);
                        }

                        let target = self.symlink_target(&node)?;
                        log::trace!("follow symlink {name:?} -> {target:?}");
                        if target.is_absolute() {
                            current = ROOT_INODE;
                            components.clear();
                        }
                        // 相对目标从链接所在的目录（即 current）继续
                        for segment in target.segments().rev() {
                            pending.push_front(segment.to_owned());
                        }
                        continue;
                    }

                    current = child;
                    components.push(name.to_owned());
                }
            }
        }

        if dir_only && !self.get_inode(current)?.is_dir() {
            return Err(Error::NotADirectory);
        }

        Ok(ResolvedPath {
            inode: current,
            path: format!("/{}", components.join("/")),
        })
    }
}
