use std::collections::HashMap;

use log::debug;

use crate::shell::error::{Result, ShellError};

/// 解释器内部的 shell 变量，只通过 `${name}` 替换进入子进程，不会写入子进程环境变量
#[derive(Debug, Default)]
pub struct VariableStore {
    local_vars: HashMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            local_vars: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.local_vars.get(name).map(String::as_str)
    }

    /// 插入或覆盖变量；名字或值为空时拒绝，且不修改已有变量
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        if name.is_empty() || value.is_empty() {
            return Err(ShellError::InvalidAssignment(
                "shell variable name and value cannot be empty".to_string(),
            ));
        }

        debug!("设置变量: {}={}", name, value);
        self.local_vars.insert(name, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.local_vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local_vars.is_empty()
    }
}
